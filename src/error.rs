use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Invalid job configuration: {0}")]
    Configuration(String),

    #[error("Cannot log on to {host}: {reason}")]
    Connection { host: String, reason: String },

    #[error("Render process on {host} exited before start-up completed")]
    PrematureExit { host: String },

    #[error("Session stream failed: {0}")]
    StreamFatal(String),

    #[error("Render process exited with status {0} during start-up")]
    RemoteProcess(i32),

    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error("Job {0} has not completed yet")]
    NotCompleted(Uuid),

    #[error("File transfer failed: {0}")]
    Transfer(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;
