//! Render host list and reachability.

use std::collections::HashSet;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::task::JoinSet;

use crate::error::{RenderError, Result};

/// Exit status ssh reports when it could not reach the host at all.
const SSH_UNREACHABLE: i32 = 255;

/// Parse a host list: one name per line, blank lines and `#` comments
/// ignored, duplicates dropped keeping the first occurrence.
pub fn parse_hosts(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|host| seen.insert(host.to_string()))
        .map(str::to_string)
        .collect()
}

pub async fn load_hosts(path: &Path) -> Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path).await?;
    let hosts = parse_hosts(&text);
    if hosts.is_empty() {
        return Err(RenderError::Configuration(format!(
            "no hosts listed in {}",
            path.display()
        )));
    }
    tracing::info!(path = %path.display(), count = hosts.len(), "Loaded host list");
    Ok(hosts)
}

/// Whether `host` answers a non-interactive ssh login within `timeout`.
pub async fn probe(host: &str, timeout: Duration) -> bool {
    let result = Command::new("ssh")
        .arg("-o")
        .arg(format!("ConnectTimeout={}", timeout.as_secs().max(1)))
        .arg("-o")
        .arg("BatchMode=yes")
        .arg(host)
        .arg("hostname")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match result {
        Ok(status) if status.code() == Some(SSH_UNREACHABLE) => {
            tracing::warn!(host, "Host unreachable");
            false
        }
        Ok(status) => {
            tracing::debug!(host, exit_code = ?status.code(), "Host reachable");
            true
        }
        Err(e) => {
            tracing::error!(host, error = %e, "Cannot run ssh");
            false
        }
    }
}

/// Probe every host concurrently and keep the reachable ones, in input order.
pub async fn verified_hosts(hosts: &[String], timeout: Duration) -> Vec<String> {
    let mut probes = JoinSet::new();
    for (index, host) in hosts.iter().enumerate() {
        let host = host.clone();
        probes.spawn(async move {
            let up = probe(&host, timeout).await;
            (index, up)
        });
    }

    let mut reachable = vec![false; hosts.len()];
    while let Some(result) = probes.join_next().await {
        match result {
            Ok((index, up)) => reachable[index] = up,
            Err(e) => tracing::error!(error = %e, "Probe task failed"),
        }
    }

    hosts
        .iter()
        .zip(reachable)
        .filter_map(|(host, up)| up.then(|| host.clone()))
        .collect()
}
