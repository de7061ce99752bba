//! Render log parsing.
//!
//! Works on a chunk of newly appended log text and reports what it saw; it
//! keeps no state of its own; the job decides what the markers mean for its
//! counters.

use std::sync::LazyLock;

use regex::Regex;

/// Substring of the line mental ray prints after each finished frame.
pub const FRAME_COMPLETION_MARKER: &str = "rendering statistics";

static PROGRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"JOB\s*\d+\.\d+\s*\d+ MB progr:\s*(\d+\.\d+)%\s*rendered on .*")
        .expect("progress pattern is valid")
});

static EXIT_STATUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"exited with status\s*(-?\d+)").expect("exit status pattern is valid")
});

/// Markers found in one chunk of log text. Line indices are chunk-relative.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LogDelta {
    /// Last progress marker: (line index, percent)
    pub last_progress: Option<(usize, f64)>,
    /// Last frame-completion marker line index
    pub last_frame_completion: Option<usize>,
    /// Number of frame-completion markers
    pub frame_completions: u32,
    /// Exit status reported by the renderer
    pub exit_code: Option<i32>,
}

impl LogDelta {
    pub fn is_empty(&self) -> bool {
        self.last_progress.is_none()
            && self.last_frame_completion.is_none()
            && self.exit_code.is_none()
    }

    /// A progress marker appears after the last frame-completion marker.
    pub fn progress_follows_completion(&self) -> bool {
        match (self.last_progress, self.last_frame_completion) {
            (Some((p, _)), Some(c)) => p > c,
            _ => false,
        }
    }

    /// Frame progress implied by this chunk: the newest percentage, or 100
    /// when the newest marker is a finished frame.
    pub fn frame_progress(&self) -> Option<f64> {
        match (self.last_progress, self.last_frame_completion) {
            (Some((p, percent)), Some(c)) if p > c => Some(percent),
            (Some((_, percent)), None) => Some(percent),
            (_, Some(_)) => Some(100.0),
            (None, None) => None,
        }
    }
}

pub fn parse_log_chunk(chunk: &str) -> LogDelta {
    let mut delta = LogDelta::default();

    for (index, line) in chunk.lines().enumerate() {
        if let Some(caps) = PROGRESS_RE.captures(line) {
            if let Ok(percent) = caps[1].parse::<f64>() {
                delta.last_progress = Some((index, percent.clamp(0.0, 100.0)));
            }
        }
        if line.contains(FRAME_COMPLETION_MARKER) {
            delta.last_frame_completion = Some(index);
            delta.frame_completions += 1;
        }
        if let Some(caps) = EXIT_STATUS_RE.captures(line) {
            if let Ok(code) = caps[1].parse::<i32>() {
                delta.exit_code = Some(code);
            }
        }
    }

    delta
}
