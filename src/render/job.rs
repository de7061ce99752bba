use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::{LogConfig, SessionConfig};
use crate::error::{RenderError, Result};
use crate::render::progress::{parse_log_chunk, LogDelta};
use crate::render::request::{
    expand_home, read_output_prefix, FrameRange, RenderRequest, FAILURE_MARKER, SUCCESS_MARKER,
};
use crate::session::{ProcessSignal, ReadOutcome, RemoteSession, SessionConnector};

/// Error code recorded when the session could not be established.
pub const CONNECTION_FAILED: i32 = -1;

/// Error code recorded when a job is killed before it started.
pub const KILLED: i32 = 137;

const MAX_OUTPUT_LINES: usize = 2000;

/// Jobs are shared between the scheduler's master list and a host queue.
pub type SharedJob = Arc<Mutex<RenderJob>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
    Idle,
    Running,
    Paused,
    Error,
    Finished,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Error | JobState::Finished)
    }

    /// Holding the host's run slot.
    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Running | JobState::Paused)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Idle => write!(f, "Idle"),
            JobState::Running => write!(f, "Running"),
            JobState::Paused => write!(f, "Paused"),
            JobState::Error => write!(f, "Error"),
            JobState::Finished => write!(f, "Finished"),
        }
    }
}

/// Human-readable description of a job's error code.
pub fn error_code_detail(code: Option<i32>) -> &'static str {
    match code {
        None => "n/a",
        Some(0) => "Success",
        Some(CONNECTION_FAILED) => "Connection to host failed",
        Some(1) => "Render failed",
        Some(130) => "Interrupted",
        Some(KILLED) => "Killed",
        Some(143) => "Terminated",
        Some(_) => "Unknown error",
    }
}

/// Read-only view of a job for presentation.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub host: String,
    pub binary_path: String,
    pub scene_path: String,
    pub output_path: String,
    pub output_prefix: String,
    pub frame_range: FrameRange,
    pub camera: String,
    pub resolution: String,
    pub state: String,
    pub current_frame: u32,
    pub total_frames: u32,
    pub frame_progress: f64,
    pub progress: f64,
    pub error_code: Option<i32>,
    pub error_detail: String,
    pub output: Vec<String>,
    pub copied: bool,
    pub log_path: String,
    pub job_log_path: String,
    pub created_at: DateTime<Utc>,
}

/// Start-up output seen since the launch line was sent.
struct Startup {
    deadline: Instant,
    captured: String,
    /// End of the last line already checked for markers
    scanned: usize,
}

/// One render bound to one host, driven through its lifecycle over a
/// dedicated remote session.
pub struct RenderJob {
    id: Uuid,
    request: RenderRequest,
    user: String,
    total_frames: u32,
    log_path: PathBuf,
    job_log_path: PathBuf,
    output_prefix: String,
    created_at: DateTime<Utc>,
    settings: SessionConfig,
    logs: LogConfig,

    state: JobState,
    current_frame: u32,
    frame_progress: f64,
    error_code: Option<i32>,
    output: Vec<String>,
    read_cursor: u64,
    /// A frame finished and the next one has not reported progress yet
    frame_pending: bool,
    /// Session output not yet checked for completion markers
    stream_tail: String,
    copied: Option<DateTime<Utc>>,
    startup: Option<Startup>,

    transcript: Option<File>,
    session: Option<Box<dyn RemoteSession>>,
}

impl RenderJob {
    /// Build a job and log on to its host.
    ///
    /// Invalid requests and local log file failures are errors and no job is
    /// created. A failed login still yields a job, already in `Error` with
    /// [`CONNECTION_FAILED`].
    pub async fn new(
        request: RenderRequest,
        connector: &dyn SessionConnector,
        settings: SessionConfig,
        logs: LogConfig,
    ) -> Result<Self> {
        request.validate()?;

        let id = Uuid::new_v4();
        let host = request.host.clone();
        let user = request.session_user();

        let log_dir = expand_home(&logs.root)
            .join("renderLogs")
            .join(request.scene_stem())
            .join(&host);
        tokio::fs::create_dir_all(&log_dir).await?;
        let stamp = Local::now().format("D%d:%m:%Y_T%H:%M:%S").to_string();
        let log_path = create_unique_log(&log_dir, &stamp).await?;

        let job_log_dir = expand_home(&logs.job_log_dir);
        tokio::fs::create_dir_all(&job_log_dir).await?;
        let job_log_path = job_log_dir.join(format!(
            "{}@{}_{}.log",
            request.scene_basename(),
            host,
            id
        ));
        let transcript = File::create(&job_log_path).await?;

        let output_prefix = match read_output_prefix(&request.scene_path).await {
            Ok(Some(prefix)) => {
                tracing::debug!(job_id = %id, prefix = %prefix, "Image prefix found in scene");
                prefix
            }
            Ok(None) => request.scene_stem(),
            Err(e) => {
                tracing::warn!(
                    job_id = %id,
                    scene = %request.scene_path.display(),
                    error = %e,
                    "Scene not readable locally, using scene name as prefix"
                );
                request.scene_stem()
            }
        };

        let mut job = Self {
            id,
            total_frames: request.frame_range.total_frames(),
            request,
            user,
            log_path,
            job_log_path,
            output_prefix,
            created_at: Utc::now(),
            settings,
            logs,
            state: JobState::Idle,
            current_frame: 0,
            frame_progress: 0.0,
            error_code: None,
            output: Vec::new(),
            read_cursor: 0,
            frame_pending: false,
            stream_tail: String::new(),
            copied: None,
            startup: None,
            transcript: Some(transcript),
            session: None,
        };

        tracing::info!(
            job_id = %id,
            host = %host,
            user = %job.user,
            log_path = %job.log_path.display(),
            "Render job created"
        );
        let log_note = format!("Render log path: {}", job.log_path.display());
        job.note(&log_note).await;

        match connector.connect(&host, &job.user).await {
            Ok(session) => job.session = Some(session),
            Err(e) => {
                let err = RenderError::Connection {
                    host,
                    reason: e.to_string(),
                };
                tracing::error!(job_id = %id, error = %err, "Session login failed");
                job.note(&err.to_string()).await;
                job.error_code = Some(CONNECTION_FAILED);
                job.set_state(JobState::Error);
            }
        }

        Ok(job)
    }

    /// Fresh job from the same request. `self` is left untouched.
    pub async fn restart(&self, connector: &dyn SessionConnector) -> Result<RenderJob> {
        tracing::info!(job_id = %self.id, host = %self.request.host, "Restarting job");
        RenderJob::new(
            self.request.clone(),
            connector,
            self.settings.clone(),
            self.logs.clone(),
        )
        .await
    }

    pub fn into_shared(self) -> SharedJob {
        Arc::new(Mutex::new(self))
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Launch the render and wait for it to come up. No-op unless `Idle`.
    ///
    /// Blocks until the start-up sentinel is seen or the start-up deadline
    /// passes. The scheduler uses [`launch`](Self::launch) and
    /// [`poll_startup`](Self::poll_startup) instead so a slow start never
    /// holds the job for long.
    pub async fn run(&mut self) -> Result<()> {
        self.launch().await?;
        while self.is_starting() {
            self.poll_startup().await?;
        }
        Ok(())
    }

    /// Send the render command and arm the start-up deadline. No-op unless
    /// `Idle` and not already launched.
    pub async fn launch(&mut self) -> Result<()> {
        if self.state != JobState::Idle || self.startup.is_some() {
            return Ok(());
        }

        let line = self.request.launch_line(&self.log_path);
        tracing::info!(job_id = %self.id, host = %self.request.host, "Executing remote render");
        self.note(&format!("Executing: {}", line)).await;

        let sent = match self.session.as_mut() {
            Some(session) => session.send_line(&line).await.map_err(|e| e.to_string()),
            None => Err("no session".to_string()),
        };
        if let Err(reason) = sent {
            self.fail(&format!("Cannot start render: {}", reason)).await;
            return Err(RenderError::StreamFatal(reason));
        }

        self.startup = Some(Startup {
            deadline: Instant::now() + self.settings.startup_timeout,
            captured: String::new(),
            scanned: 0,
        });
        Ok(())
    }

    /// Launched, waiting for the start-up sentinel.
    pub fn is_starting(&self) -> bool {
        self.startup.is_some()
    }

    /// One bounded read of start-up output. Moves the job to `Running` once
    /// the sentinel shows up, or to a terminal state when start-up fails.
    pub async fn poll_startup(&mut self) -> Result<()> {
        let Some(mut startup) = self.startup.take() else {
            return Ok(());
        };

        match self.read_session().await {
            ReadOutcome::Data(text) => {
                self.append_transcript(&text).await;
                startup.captured.push_str(&text);

                while let Some(nl) = startup.captured[startup.scanned..].find('\n') {
                    let next = startup.scanned + nl + 1;
                    let line = startup.captured[startup.scanned..next].trim();

                    if line == FAILURE_MARKER {
                        return self.premature_exit(&startup.captured).await;
                    }
                    if line == SUCCESS_MARKER {
                        self.set_state(JobState::Running);
                        self.scan_log().await;
                        self.complete(true).await;
                        return Ok(());
                    }
                    if line == self.settings.startup_sentinel {
                        self.stream_tail = startup.captured[next..].to_string();
                        self.set_state(JobState::Running);
                        self.note("Render started").await;
                        return Ok(());
                    }
                    startup.scanned = next;
                }
            }
            ReadOutcome::Timeout => {}
            ReadOutcome::EndOfStream => {
                self.fail("Session closed during start-up").await;
                return Err(RenderError::StreamFatal(
                    "end of stream during start-up".into(),
                ));
            }
            ReadOutcome::Fatal(reason) => {
                self.fail(&format!("Session failed during start-up: {}", reason))
                    .await;
                return Err(RenderError::StreamFatal(reason));
            }
        }

        if Instant::now() >= startup.deadline {
            if self.session_alive().await {
                tracing::warn!(
                    job_id = %self.id,
                    host = %self.request.host,
                    "Startup sentinel not seen before deadline, assuming render is running"
                );
                self.stream_tail = startup.captured[startup.scanned..].to_string();
                self.set_state(JobState::Running);
                return Ok(());
            }
            self.fail("Start-up timed out and the session is gone").await;
            return Err(RenderError::StreamFatal("start-up timed out".into()));
        }

        self.startup = Some(startup);
        Ok(())
    }

    /// Read pending session output and newly appended log text, then update
    /// progress and state. Only acts on `Running`/`Paused` jobs.
    pub async fn poll(&mut self) {
        if !self.state.is_active() {
            return;
        }

        match self.read_session().await {
            ReadOutcome::Data(text) => {
                self.append_transcript(&text).await;
                self.stream_tail.push_str(&text);
            }
            ReadOutcome::Timeout => {
                if !self.session_alive().await {
                    self.scan_log().await;
                    if self.state.is_active() {
                        self.fail("Remote process is no longer alive").await;
                    }
                    return;
                }
            }
            ReadOutcome::EndOfStream => {
                self.scan_log().await;
                if self.state.is_active() {
                    self.fail("Session reached end of stream").await;
                }
                return;
            }
            ReadOutcome::Fatal(reason) => {
                self.fail(&format!("Session read failed: {}", reason)).await;
                return;
            }
        }

        let marker = self.take_stream_marker();
        self.scan_log().await;
        if !self.state.is_active() {
            return;
        }
        if let Some(success) = marker {
            self.complete(success).await;
        }
    }

    pub async fn pause(&mut self) {
        if self.state != JobState::Running {
            return;
        }
        if self.send_signal(ProcessSignal::Suspend).await {
            tracing::info!(job_id = %self.id, "Job paused");
            self.set_state(JobState::Paused);
        }
    }

    pub async fn resume(&mut self) {
        if self.state != JobState::Paused {
            return;
        }
        if self.send_signal(ProcessSignal::Continue).await {
            tracing::info!(job_id = %self.id, "Job resumed");
            self.set_state(JobState::Running);
        }
    }

    /// Stop the render. Always ends in a terminal state.
    pub async fn kill(&mut self) {
        match self.state {
            JobState::Idle => {
                tracing::info!(job_id = %self.id, "Killing job before it started");
                if self.startup.take().is_some() {
                    self.terminate_remote().await;
                }
                self.error_code = Some(KILLED);
                self.set_state(JobState::Error);
                self.note("Killed before start").await;
                self.release_session().await;
            }
            JobState::Running | JobState::Paused => {
                tracing::info!(
                    job_id = %self.id,
                    binary = %self.request.binary_path.display(),
                    "Killing render"
                );
                self.terminate_remote().await;
                let next = if self.error_code.is_some() {
                    JobState::Error
                } else {
                    JobState::Finished
                };
                self.set_state(next);
                self.note("Killed").await;
                self.release_session().await;
            }
            JobState::Error | JobState::Finished => {}
        }
    }

    /// Tear the job down from any state. Never fails; disconnect problems are
    /// logged and the session handle is released regardless.
    pub async fn close(&mut self) {
        tracing::info!(job_id = %self.id, host = %self.request.host, "Closing session");
        if self.state.is_active() || self.startup.take().is_some() {
            self.terminate_remote().await;
        }
        if !self.completed() {
            self.set_state(JobState::Error);
            self.note("Closed before completion").await;
        }
        self.release_session().await;
    }

    pub fn completed(&self) -> bool {
        self.state.is_terminal()
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn host(&self) -> &str {
        &self.request.host
    }

    pub fn request(&self) -> &RenderRequest {
        &self.request
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn session_user(&self) -> &str {
        &self.user
    }

    pub fn frame_range(&self) -> FrameRange {
        self.request.frame_range
    }

    pub fn output_path(&self) -> &Path {
        &self.request.output_path
    }

    pub fn output_prefix(&self) -> &str {
        &self.output_prefix
    }

    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    pub fn total_frames(&self) -> u32 {
        self.total_frames
    }

    pub fn frame_progress(&self) -> f64 {
        self.frame_progress
    }

    /// Whole-job progress in percent.
    pub fn overall_progress(&self) -> f64 {
        (100.0 * self.current_frame as f64 + self.frame_progress)
            / (self.total_frames as f64 + 1.0)
    }

    pub fn error_code(&self) -> Option<i32> {
        self.error_code
    }

    pub fn error_detail(&self) -> &'static str {
        error_code_detail(self.error_code)
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn job_log_path(&self) -> &Path {
        &self.job_log_path
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn copied(&self) -> Option<DateTime<Utc>> {
        self.copied
    }

    /// Recorded by the copy step once the output has been fetched.
    pub fn mark_copied(&mut self) {
        self.copied = Some(Utc::now());
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let request = &self.request;
        JobSnapshot {
            id: self.id,
            host: request.host.clone(),
            binary_path: request.binary_path.display().to_string(),
            scene_path: request.scene_path.display().to_string(),
            output_path: request.output_path.display().to_string(),
            output_prefix: self.output_prefix.clone(),
            frame_range: request.frame_range,
            camera: request.camera.clone().unwrap_or_else(|| "n/a".to_string()),
            resolution: request
                .resolution
                .map(|r| r.to_string())
                .unwrap_or_else(|| "n/a".to_string()),
            state: self.state.to_string(),
            current_frame: self.current_frame,
            total_frames: self.total_frames,
            frame_progress: self.frame_progress,
            progress: self.overall_progress(),
            error_code: self.error_code,
            error_detail: self.error_detail().to_string(),
            output: self.output.clone(),
            copied: self.copied.is_some(),
            log_path: self.log_path.display().to_string(),
            job_log_path: self.job_log_path.display().to_string(),
            created_at: self.created_at,
        }
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn set_state(&mut self, next: JobState) {
        tracing::debug!(job_id = %self.id, from = %self.state, to = %next, "State change");
        self.state = next;
    }

    async fn read_session(&mut self) -> ReadOutcome {
        let timeout = self.settings.read_timeout;
        match self.session.as_mut() {
            Some(session) => session.read(timeout).await,
            None => ReadOutcome::EndOfStream,
        }
    }

    async fn session_alive(&mut self) -> bool {
        match self.session.as_mut() {
            Some(session) => session.is_alive().await,
            None => false,
        }
    }

    async fn send_signal(&mut self, signal: ProcessSignal) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        match session.signal(signal).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(job_id = %self.id, %signal, error = %e, "Signal delivery failed");
                false
            }
        }
    }

    /// Continue if paused, then interrupt, then kill. Every step is attempted
    /// even when an earlier one fails.
    async fn terminate_remote(&mut self) {
        if self.state == JobState::Paused {
            self.send_signal(ProcessSignal::Continue).await;
            self.set_state(JobState::Running);
        }
        self.send_signal(ProcessSignal::Interrupt).await;
        self.send_signal(ProcessSignal::Kill).await;
    }

    /// Drain complete lines of session output and report the last
    /// success/failure marker among them.
    fn take_stream_marker(&mut self) -> Option<bool> {
        let end = self.stream_tail.rfind('\n')?;
        let complete: String = self.stream_tail.drain(..=end).collect();
        complete
            .lines()
            .filter_map(|line| match line.trim() {
                SUCCESS_MARKER => Some(true),
                FAILURE_MARKER => Some(false),
                _ => None,
            })
            .last()
    }

    async fn premature_exit(&mut self, captured: &str) -> Result<()> {
        if let Some(last) = captured
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && *l != FAILURE_MARKER)
            .last()
        {
            tracing::error!(job_id = %self.id, line = %last, "Last output before exit");
        }

        let appended = async {
            let mut log = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.log_path)
                .await?;
            log.write_all(captured.as_bytes()).await?;
            log.flush().await
        }
        .await;
        if let Err(e) = appended {
            tracing::warn!(job_id = %self.id, error = %e, "Cannot append start-up output to log");
        }

        tracing::error!(job_id = %self.id, host = %self.request.host, "Render exited prematurely");
        self.note("Prematurely exited process").await;
        self.complete(false).await;
        match self.error_code {
            Some(code) if code != 0 => Err(RenderError::RemoteProcess(code)),
            _ => Err(RenderError::PrematureExit {
                host: self.request.host.clone(),
            }),
        }
    }

    async fn scan_log(&mut self) {
        let chunk = match self.read_new_log().await {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(job_id = %self.id, error = %e, "Cannot read render log");
                return;
            }
        };
        if chunk.is_empty() {
            return;
        }

        self.push_output(&chunk);
        let delta = parse_log_chunk(&chunk);
        self.apply_delta(&delta);

        if let Some(code) = delta.exit_code {
            self.error_code = Some(code);
            if code != 0 {
                tracing::error!(job_id = %self.id, code, "Render exited with error");
            }
            self.complete(code == 0).await;
        }
    }

    /// Appended log text up to the last complete line; the cursor only ever
    /// moves past whole lines.
    async fn read_new_log(&mut self) -> std::io::Result<String> {
        let mut file = File::open(&self.log_path).await?;
        let len = file.metadata().await?.len();
        if len < self.read_cursor {
            // renderer rewrote the log from scratch
            self.read_cursor = 0;
            self.output.clear();
        }
        file.seek(SeekFrom::Start(self.read_cursor)).await?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await?;

        let Some(end) = buf.iter().rposition(|b| *b == b'\n') else {
            return Ok(String::new());
        };
        buf.truncate(end + 1);
        self.read_cursor += buf.len() as u64;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Every completion marker counts one frame, but the newest one is held
    /// back until a progress marker after it shows the next frame started.
    fn apply_delta(&mut self, delta: &LogDelta) {
        let pending = u32::from(self.frame_pending);
        let finished = match (delta.last_progress, delta.last_frame_completion) {
            (_, Some(_)) if delta.progress_follows_completion() => {
                self.frame_pending = false;
                pending + delta.frame_completions
            }
            (_, Some(_)) => {
                self.frame_pending = true;
                pending + delta.frame_completions.saturating_sub(1)
            }
            (Some(_), None) => {
                self.frame_pending = false;
                pending
            }
            (None, None) => 0,
        };

        let target = self
            .current_frame
            .saturating_add(finished)
            .min(self.total_frames);
        if target > self.current_frame {
            self.current_frame = target;
            self.frame_progress = 0.0;
            tracing::debug!(job_id = %self.id, frame = self.current_frame, "Frame counter advanced");
        }

        // progress within a frame never moves backwards
        if let Some(percent) = delta.frame_progress() {
            let percent = percent.clamp(0.0, 100.0);
            if percent >= self.frame_progress {
                self.frame_progress = percent;
            }
        }
    }

    async fn fail(&mut self, reason: &str) {
        tracing::error!(job_id = %self.id, host = %self.request.host, reason, "Render job failed");
        self.note(reason).await;
        self.complete(false).await;
    }

    async fn complete(&mut self, success: bool) {
        if self.completed() {
            return;
        }
        self.startup = None;

        let mut success = success;
        if !success && self.error_code.is_none() {
            self.error_code = self.exit_code_from_log().await;
            success = self.error_code == Some(0);
        }

        if success {
            self.error_code.get_or_insert(0);
            self.set_state(JobState::Finished);
            self.current_frame = self.total_frames;
            self.frame_progress = 0.0;
            self.frame_pending = false;
            tracing::info!(job_id = %self.id, host = %self.request.host, "Render finished");
            self.note("Finished").await;
        } else {
            self.set_state(JobState::Error);
            tracing::error!(
                job_id = %self.id,
                host = %self.request.host,
                error_code = ?self.error_code,
                detail = self.error_detail(),
                "Render ended in error"
            );
            let detail = format!("Error ({})", self.error_detail());
            self.note(&detail).await;
        }

        self.release_session().await;
    }

    async fn exit_code_from_log(&self) -> Option<i32> {
        let bytes = tokio::fs::read(&self.log_path).await.ok()?;
        parse_log_chunk(&String::from_utf8_lossy(&bytes)).exit_code
    }

    /// Load the whole render log into the output buffer and drop the session.
    async fn release_session(&mut self) {
        match tokio::fs::read(&self.log_path).await {
            Ok(bytes) => {
                self.output.clear();
                self.push_output(&String::from_utf8_lossy(&bytes));
            }
            Err(e) => {
                tracing::warn!(job_id = %self.id, error = %e, "Cannot drain render log");
            }
        }

        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.disconnect().await {
                tracing::warn!(job_id = %self.id, error = %e, "Session disconnect failed");
                self.note(&format!("Disconnect failed: {}", e)).await;
            }
        }
    }

    fn push_output(&mut self, text: &str) {
        self.output.extend(text.lines().map(str::to_string));
        if self.output.len() > MAX_OUTPUT_LINES {
            let excess = self.output.len() - MAX_OUTPUT_LINES;
            self.output.drain(..excess);
        }
    }

    async fn note(&mut self, message: &str) {
        let line = format!("{} {}\n", Utc::now().to_rfc3339(), message);
        self.write_transcript(line.as_bytes()).await;
    }

    async fn append_transcript(&mut self, text: &str) {
        self.write_transcript(text.as_bytes()).await;
    }

    async fn write_transcript(&mut self, bytes: &[u8]) {
        let Some(file) = self.transcript.as_mut() else {
            return;
        };
        let written = match file.write_all(bytes).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::warn!(job_id = %self.id, error = %e, "Job log write failed, disabling it");
            self.transcript = None;
        }
    }
}

impl std::fmt::Display for RenderJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] : {}@{} : {{ Frame {}/{} }} {:.2}%",
            self.state,
            self.request.scene_basename(),
            self.request.host,
            self.current_frame,
            self.total_frames,
            self.overall_progress()
        )
    }
}

impl std::fmt::Debug for RenderJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderJob")
            .field("id", &self.id)
            .field("host", &self.request.host)
            .field("state", &self.state)
            .field("current_frame", &self.current_frame)
            .field("frame_progress", &self.frame_progress)
            .field("error_code", &self.error_code)
            .finish_non_exhaustive()
    }
}

/// Create `<stem>.log` in `dir`, adding a counter when a log of that name
/// already exists.
async fn create_unique_log(dir: &Path, stem: &str) -> std::io::Result<PathBuf> {
    let mut attempt = 1;
    loop {
        let name = if attempt == 1 {
            format!("{}.log", stem)
        } else {
            format!("{}_{}.log", stem, attempt)
        };
        let path = dir.join(name);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(_) => return Ok(path),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}
