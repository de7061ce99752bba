use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Line the Maya batch renderer prints once its shell has settled.
pub const DEFAULT_STARTUP_SENTINEL: &str = r#"Locale is: "Locale:en_GB.utf8 CodeSet:UTF-8""#;

pub const DEFAULT_BINARY_PATH: &str = "/opt/autodesk/maya2014-x64/bin/Render";

/// Settings for remote shell sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound for a single non-blocking read
    pub read_timeout: Duration,
    /// How long `run()` waits for the startup sentinel before giving up on it
    pub startup_timeout: Duration,
    /// Passed to ssh as `ConnectTimeout`
    pub connect_timeout: Duration,
    /// Minimum spacing between remote process-group liveness checks
    pub liveness_interval: Duration,
    /// Session output line that marks a started render
    pub startup_sentinel: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(50),
            startup_timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(5),
            liveness_interval: Duration::from_secs(30),
            startup_sentinel: DEFAULT_STARTUP_SENTINEL.to_string(),
        }
    }
}

/// Where render logs and job transcripts are written.
///
/// `root` must be on storage the render hosts can also write to, since the
/// renderer appends its log there directly.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub root: PathBuf,
    pub job_log_dir: PathBuf,
}

impl LogConfig {
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            job_log_dir: root.join("jobLogs"),
            root,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::under(home.join(".rendermanager"))
    }
}

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub hosts: Vec<String>,
    /// Default output directory offered to new jobs
    pub output_dir: PathBuf,
    pub binary_path: PathBuf,
    /// Tick cadence while an operator is watching
    pub active_interval: Duration,
    /// Tick cadence while nobody is around
    pub idle_interval: Duration,
    /// Bandwidth limit for scp, in Kbit/s
    pub copy_limit_kbit: u32,
    pub dashboard_addr: Option<SocketAddr>,
    pub session: SessionConfig,
    pub logs: LogConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            output_dir: PathBuf::from("images"),
            binary_path: PathBuf::from(DEFAULT_BINARY_PATH),
            active_interval: Duration::from_millis(100),
            idle_interval: Duration::from_secs(1800),
            copy_limit_kbit: 8912,
            dashboard_addr: None,
            session: SessionConfig::default(),
            logs: LogConfig::default(),
        }
    }
}

impl ManagerConfig {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.hosts.push(host.into());
        self
    }

    pub fn with_logs(mut self, logs: LogConfig) -> Self {
        self.logs = logs;
        self
    }

    pub fn with_active_interval(mut self, interval: Duration) -> Self {
        self.active_interval = interval;
        self
    }
}
