//! Fetching rendered frames back from a host.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{RenderError, Result};
use crate::render::RenderJob;

/// Remote pattern matching every image a job wrote:
/// `<output>/<prefix>*{<start>..<end>}*`.
pub fn remote_glob(job: &RenderJob) -> String {
    let range = job.frame_range();
    format!(
        "{}/{}*{{{}..{}}}*",
        job.output_path().display(),
        job.output_prefix(),
        range.start,
        range.end
    )
}

/// Copy files matching `glob` on `host` into `dest` with scp, compressed and
/// limited to `limit_kbit` Kbit/s. `dest` is created if missing.
pub async fn copy(host: &str, glob: &str, dest: &Path, limit_kbit: u32) -> Result<()> {
    tokio::fs::create_dir_all(dest).await?;

    tracing::info!(host, glob, dest = %dest.display(), limit_kbit, "Copying render output");

    let output = Command::new("scp")
        .args(scp_args(host, glob, dest, limit_kbit))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if output.status.success() {
        tracing::info!(host, dest = %dest.display(), "Copy finished");
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        tracing::error!(host, exit_code = ?output.status.code(), stderr = %stderr, "Copy failed");
        Err(RenderError::Transfer(if stderr.is_empty() {
            format!("scp exited with {:?}", output.status.code())
        } else {
            stderr
        }))
    }
}

fn scp_args(host: &str, glob: &str, dest: &Path, limit_kbit: u32) -> Vec<String> {
    vec![
        "-C".to_string(),
        "-B".to_string(),
        "-l".to_string(),
        limit_kbit.to_string(),
        // quoted so the remote shell expands the glob
        format!("{}:\"{}\"", host, glob),
        dest.display().to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scp_arguments() {
        let args = scp_args("w32307", "/out/fin*{1..5}*", Path::new("/tmp/dest"), 8912);
        assert_eq!(
            args,
            vec!["-C", "-B", "-l", "8912", "w32307:\"/out/fin*{1..5}*\"", "/tmp/dest"]
        );
    }
}
