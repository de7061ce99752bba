//! Render jobs: what to render, how to read its log, and the job itself.

pub mod job;
pub mod progress;
pub mod request;

pub use job::{
    error_code_detail, JobSnapshot, JobState, RenderJob, SharedJob, CONNECTION_FAILED,
    KILLED,
};
pub use progress::{parse_log_chunk, LogDelta};
pub use request::{FrameRange, RenderRequest, Resolution};
