//! Remote shell sessions.
//!
//! A render job owns exactly one [`RemoteSession`] to its host. The job only
//! relies on the contract below; how bytes move is up to the adapter:
//!
//! - [`ssh::SshConnector`]: production adapter over the system `ssh` client
//! - [`mock::ScriptedConnector`]: in-memory sessions driven by a test handle
//!
//! Reads never block longer than the timeout handed in, and expected
//! conditions (nothing to read yet, stream closed) come back as
//! [`ReadOutcome`] variants rather than errors.

pub mod mock;
pub mod ssh;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use mock::{ScriptedConnector, ScriptedSession, SessionHandle};
pub use ssh::{SshConnector, SshSession};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("login to {host} failed: {reason}")]
    Login { host: String, reason: String },

    #[error("no remote process to signal")]
    NoProcess,

    #[error("signal {signal} not delivered: {reason}")]
    Signal {
        signal: ProcessSignal,
        reason: String,
    },

    #[error("session closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a bounded read from a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Data(String),
    Timeout,
    EndOfStream,
    Fatal(String),
}

/// Process-control signals a job may deliver to its remote process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessSignal {
    Suspend,
    Continue,
    Interrupt,
    Kill,
}

impl ProcessSignal {
    /// Name understood by `kill -<NAME>`.
    pub fn name(&self) -> &'static str {
        match self {
            ProcessSignal::Suspend => "STOP",
            ProcessSignal::Continue => "CONT",
            ProcessSignal::Interrupt => "INT",
            ProcessSignal::Kill => "KILL",
        }
    }
}

impl std::fmt::Display for ProcessSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SIG{}", self.name())
    }
}

#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Send one command line to the remote shell.
    async fn send_line(&mut self, line: &str) -> Result<(), SessionError>;

    /// Read whatever output is available, waiting at most `timeout`.
    async fn read(&mut self, timeout: Duration) -> ReadOutcome;

    /// Deliver a signal to the process group started by the last command.
    async fn signal(&mut self, signal: ProcessSignal) -> Result<(), SessionError>;

    /// Whether the remote process group is still alive.
    async fn is_alive(&mut self) -> bool;

    /// Tear the session down. Safe to call repeatedly and after failures.
    async fn disconnect(&mut self) -> Result<(), SessionError>;
}

#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self, host: &str, user: &str)
        -> Result<Box<dyn RemoteSession>, SessionError>;
}
