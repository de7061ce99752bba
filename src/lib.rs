pub mod config;
pub mod dashboard;
pub mod error;
pub mod hosts;
pub mod manager;
pub mod render;
pub mod scheduler;
pub mod session;
pub mod shutdown;
pub mod transfer;
