use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncBufReadExt;

use crate::config::DEFAULT_BINARY_PATH;
use crate::error::{RenderError, Result};

/// Printed by the launch line once the render command has exited cleanly.
pub const SUCCESS_MARKER: &str = "COMPLETE_SUCCESS";
/// Printed by the launch line once the render command has exited with a failure.
pub const FAILURE_MARKER: &str = "COMPLETE_ERROR";

const IMAGE_PREFIX_ATTR: &str = r#"setAttr ".ifp" -type "string""#;

/// Inclusive frame range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    pub start: u32,
    pub end: u32,
}

impl FrameRange {
    pub fn new(start: u32, end: u32) -> Result<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        if self.end < self.start {
            return Err(RenderError::Configuration(format!(
                "negative frame range {}..{}",
                self.start, self.end
            )));
        }
        Ok(())
    }

    /// `end - start`; the range holds one more frame than this.
    pub fn total_frames(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Everything needed to build a render job. Immutable once submitted, and
/// reused verbatim when a job is restarted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub host: String,
    /// Left empty in submitted JSON to use the manager's configured binary
    #[serde(default)]
    pub binary_path: PathBuf,
    pub scene_path: PathBuf,
    pub output_path: PathBuf,
    pub frame_range: FrameRange,
    #[serde(default)]
    pub camera: Option<String>,
    #[serde(default)]
    pub resolution: Option<Resolution>,
    /// Session user; the local user when unset
    #[serde(default)]
    pub user: Option<String>,
}

impl RenderRequest {
    pub fn new(
        host: impl Into<String>,
        scene_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        frame_range: FrameRange,
    ) -> Self {
        Self {
            host: host.into(),
            binary_path: PathBuf::from(DEFAULT_BINARY_PATH),
            scene_path: scene_path.into(),
            output_path: output_path.into(),
            frame_range,
            camera: None,
            resolution: None,
            user: None,
        }
    }

    pub fn with_binary(mut self, binary_path: impl Into<PathBuf>) -> Self {
        self.binary_path = binary_path.into();
        self
    }

    pub fn with_camera(mut self, camera: impl Into<String>) -> Self {
        self.camera = Some(camera.into());
        self
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = Some(Resolution { width, height });
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(RenderError::Configuration("host is required".into()));
        }
        for (name, path) in [
            ("binary path", &self.binary_path),
            ("scene path", &self.scene_path),
            ("output path", &self.output_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(RenderError::Configuration(format!("{} is required", name)));
            }
        }
        if matches!(self.camera.as_deref(), Some(c) if c.trim().is_empty()) {
            return Err(RenderError::Configuration("camera override is empty".into()));
        }
        self.frame_range.validate()
    }

    pub fn session_user(&self) -> String {
        self.user
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "render".to_string())
    }

    pub fn scene_basename(&self) -> String {
        self.scene_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scene".to_string())
    }

    pub fn scene_stem(&self) -> String {
        self.scene_path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scene".to_string())
    }

    /// Batch render invocation writing its log to `log_path`.
    pub fn render_command(&self, log_path: &Path) -> String {
        let range = self.frame_range;
        let mut args = vec![
            self.binary_path.to_string_lossy().replace(' ', "\\ "),
            format!("-s {}", range.start),
            format!("-e {}", range.end),
        ];
        if let Some(res) = self.resolution {
            args.push(format!("-x {}", res.width));
            args.push(format!("-y {}", res.height));
        }
        if let Some(ref camera) = self.camera {
            args.push(format!("-cam {}", camera));
        }
        // verbose mental ray output, needed for progress lines
        args.push("-v 5".to_string());
        args.push("-verb".to_string());
        args.push("-r mr".to_string());
        args.push("-art".to_string());
        args.push("-aml".to_string());
        args.push("-at".to_string());
        args.push(format!("-log {}", log_path.display()));
        args.push(format!("\"{}\"", self.scene_path.display()));
        args.join(" ")
    }

    /// Full shell line: the render command followed by the success/failure
    /// bookkeeping echo.
    pub fn launch_line(&self, log_path: &Path) -> String {
        [
            format!("nice {}", self.render_command(log_path)),
            "RETVAL=$?".to_string(),
            format!("[ $RETVAL -eq 0 ] && echo {}", SUCCESS_MARKER),
            format!("[ $RETVAL -ne 0 ] && echo {}", FAILURE_MARKER),
        ]
        .join(";")
    }
}

/// Expand a leading `~` to `$HOME`.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

/// Image file prefix set in a Maya ASCII scene, if any.
pub async fn read_output_prefix(scene_path: &Path) -> std::io::Result<Option<String>> {
    let file = tokio::fs::File::open(expand_home(scene_path)).await?;
    let mut lines = tokio::io::BufReader::new(file).lines();
    while let Some(line) = lines.next_line().await? {
        if line.contains(IMAGE_PREFIX_ATTR) {
            let fields: Vec<&str> = line.split('"').collect();
            if fields.len() >= 2 {
                return Ok(Some(fields[fields.len() - 2].to_string()));
            }
        }
    }
    Ok(None)
}
