use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::Instant;

use crate::config::SessionConfig;
use crate::session::{ProcessSignal, ReadOutcome, RemoteSession, SessionConnector, SessionError};

const READY_MARKER: &str = "__RM_READY__";
const PGID_PREFIX: &str = "__RM_PGID=";
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// Opens sessions through the system `ssh` client. Keys must already be in
/// place; password prompts are disabled.
#[derive(Debug, Clone, Default)]
pub struct SshConnector {
    config: SessionConfig,
}

impl SshConnector {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionConnector for SshConnector {
    async fn connect(
        &self,
        host: &str,
        user: &str,
    ) -> Result<Box<dyn RemoteSession>, SessionError> {
        let session = SshSession::login(host, user, &self.config).await?;
        Ok(Box::new(session))
    }
}

/// Non-interactive shell on a remote host.
///
/// Every command line is started with `setsid` so that the render and the
/// bookkeeping around it form one process group, which is what signals
/// target. The group id comes back in-band and is stripped from the output.
pub struct SshSession {
    host: String,
    user: String,
    connect_timeout: Duration,
    liveness_interval: Duration,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    pgid: Option<u32>,
    /// Partial line that may still turn into a process-group report
    carry: String,
    /// Trailing bytes of a multi-byte character cut by the last read
    undecoded: Vec<u8>,
    last_liveness: Option<(Instant, bool)>,
}

fn ssh_base_args(connect_timeout: Duration) -> Vec<String> {
    vec![
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", connect_timeout.as_secs().max(1)),
    ]
}

async fn wait_for_marker(stdout: &mut ChildStdout, host: &str) -> Result<(), SessionError> {
    let mut seen = String::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = stdout.read(&mut buf).await?;
        if n == 0 {
            return Err(SessionError::Login {
                host: host.to_string(),
                reason: "connection closed".to_string(),
            });
        }
        seen.push_str(&String::from_utf8_lossy(&buf[..n]));
        if seen.lines().any(|l| l.trim() == READY_MARKER) {
            return Ok(());
        }
    }
}

/// Quote a string for a POSIX shell.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

impl SshSession {
    pub async fn login(
        host: &str,
        user: &str,
        config: &SessionConfig,
    ) -> Result<Self, SessionError> {
        tracing::debug!(host, user, "Opening ssh session");

        let mut child = Command::new("ssh")
            .arg("-T")
            .args(ssh_base_args(config.connect_timeout))
            .arg(format!("{}@{}", user, host))
            .arg("sh")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let login_error = |reason: &str| SessionError::Login {
            host: host.to_string(),
            reason: reason.to_string(),
        };

        let mut stdin = child.stdin.take().ok_or_else(|| login_error("no stdin"))?;
        let mut stdout = child.stdout.take().ok_or_else(|| login_error("no stdout"))?;

        stdin
            .write_all(format!("exec 2>&1\necho {}\n", READY_MARKER).as_bytes())
            .await?;
        stdin.flush().await?;

        let wait_ready = wait_for_marker(&mut stdout, host);

        let deadline = config.connect_timeout + EXIT_GRACE;
        match tokio::time::timeout(deadline, wait_ready).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = child.start_kill();
                return Err(e);
            }
            Err(_) => {
                let _ = child.start_kill();
                return Err(login_error("timed out waiting for shell"));
            }
        }

        tracing::info!(host, user, "Logged on");
        Ok(Self {
            host: host.to_string(),
            user: user.to_string(),
            connect_timeout: config.connect_timeout,
            liveness_interval: config.liveness_interval,
            child: Some(child),
            stdin: Some(stdin),
            stdout: Some(stdout),
            pgid: None,
            carry: String::new(),
            undecoded: Vec::new(),
            last_liveness: None,
        })
    }

    /// Run `command` on the host over a separate one-shot connection.
    async fn remote_exec(&self, command: &str) -> std::io::Result<std::process::Output> {
        Command::new("ssh")
            .args(ssh_base_args(self.connect_timeout))
            .arg(format!("{}@{}", self.user, self.host))
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
    }

    /// Remove process-group reports from `text`, remembering the id.
    fn strip_control(&mut self, text: &str) -> String {
        let mut input = std::mem::take(&mut self.carry);
        input.push_str(text);

        let mut out = String::with_capacity(input.len());
        for piece in input.split_inclusive('\n') {
            if !piece.ends_with('\n') {
                // incomplete line: hold it back only if it could be a report
                if piece.starts_with(PGID_PREFIX) || PGID_PREFIX.starts_with(piece) {
                    self.carry = piece.to_string();
                } else {
                    out.push_str(piece);
                }
                continue;
            }
            match piece.trim().strip_prefix(PGID_PREFIX) {
                Some(id) => {
                    self.pgid = id.parse().ok();
                    tracing::debug!(host = %self.host, pgid = ?self.pgid, "Remote process group");
                }
                None => out.push_str(piece),
            }
        }
        out
    }
}

/// Decode `bytes` after whatever `pending` held back. An incomplete
/// character at the end stays in `pending` for the next read; invalid bytes
/// are replaced.
fn decode_utf8(pending: &mut Vec<u8>, bytes: &[u8]) -> String {
    pending.extend_from_slice(bytes);
    let split = pending.len() - incomplete_tail(pending);
    let text = String::from_utf8_lossy(&pending[..split]).into_owned();
    pending.drain(..split);
    text
}

/// Length of a truncated multi-byte sequence at the end of `bytes`.
fn incomplete_tail(bytes: &[u8]) -> usize {
    let mut rest = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(_) => return 0,
            Err(e) => match e.error_len() {
                None => return rest.len() - e.valid_up_to(),
                Some(len) => rest = &rest[e.valid_up_to() + len..],
            },
        }
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn send_line(&mut self, line: &str) -> Result<(), SessionError> {
        let stdin = self.stdin.as_mut().ok_or(SessionError::Closed)?;
        let wrapped = format!(
            "setsid sh -c {} & echo {}$!\n",
            shell_quote(line),
            PGID_PREFIX
        );
        stdin.write_all(wrapped.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn read(&mut self, timeout: Duration) -> ReadOutcome {
        let Some(stdout) = self.stdout.as_mut() else {
            return ReadOutcome::EndOfStream;
        };
        let mut buf = [0u8; 4096];
        match tokio::time::timeout(timeout, stdout.read(&mut buf)).await {
            Err(_) => ReadOutcome::Timeout,
            Ok(Ok(0)) => ReadOutcome::EndOfStream,
            Ok(Ok(n)) => {
                let text = decode_utf8(&mut self.undecoded, &buf[..n]);
                ReadOutcome::Data(self.strip_control(&text))
            }
            Ok(Err(e)) => ReadOutcome::Fatal(e.to_string()),
        }
    }

    async fn signal(&mut self, signal: ProcessSignal) -> Result<(), SessionError> {
        let pgid = self.pgid.ok_or(SessionError::NoProcess)?;
        let command = format!("kill -{} -- -{}", signal.name(), pgid);
        let output = self.remote_exec(&command).await?;
        if output.status.success() {
            tracing::debug!(host = %self.host, pgid, %signal, "Signal delivered");
            Ok(())
        } else {
            Err(SessionError::Signal {
                signal,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn is_alive(&mut self) -> bool {
        match self.child.as_mut().map(|c| c.try_wait()) {
            None | Some(Err(_)) | Some(Ok(Some(_))) => return false,
            Some(Ok(None)) => {}
        }
        let Some(pgid) = self.pgid else {
            return true;
        };
        if let Some((at, alive)) = self.last_liveness {
            if at.elapsed() < self.liveness_interval {
                return alive;
            }
        }
        let alive = match self.remote_exec(&format!("kill -0 -- -{}", pgid)).await {
            Ok(output) => match output.status.code() {
                Some(0) => true,
                // 255: ssh itself failed, which says nothing about the render
                Some(255) => self.last_liveness.map(|(_, a)| a).unwrap_or(true),
                _ => false,
            },
            Err(e) => {
                tracing::warn!(host = %self.host, error = %e, "Liveness check failed to run");
                true
            }
        };
        self.last_liveness = Some((Instant::now(), alive));
        alive
    }

    async fn disconnect(&mut self) -> Result<(), SessionError> {
        if let Some(mut stdin) = self.stdin.take() {
            if let Err(e) = stdin.write_all(b"exit\n").await {
                tracing::debug!(host = %self.host, error = %e, "Shell already gone");
            }
        }
        self.stdout = None;

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        if tokio::time::timeout(EXIT_GRACE, child.wait()).await.is_err() {
            child.start_kill()?;
            child.wait().await?;
        }
        tracing::debug!(host = %self.host, "Session closed");
        Ok(())
    }
}
