//! In-memory sessions for tests.
//!
//! Each session created by [`ScriptedConnector`] is paired with a
//! [`SessionHandle`] that feeds it output and records what the job did to it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::session::{ProcessSignal, ReadOutcome, RemoteSession, SessionConnector, SessionError};

#[derive(Debug)]
struct ScriptState {
    reads: VecDeque<ReadOutcome>,
    /// Queued after every sent line
    reply: Option<String>,
    sent: Vec<String>,
    signals: Vec<ProcessSignal>,
    alive: bool,
    connected: bool,
    disconnects: usize,
    fail_signals: bool,
    fail_disconnect: bool,
}

/// Test-side control of one scripted session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    state: Arc<Mutex<ScriptState>>,
}

impl SessionHandle {
    fn new(reply: Option<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                reads: VecDeque::new(),
                reply,
                sent: Vec::new(),
                signals: Vec::new(),
                alive: true,
                connected: true,
                disconnects: 0,
                fail_signals: false,
                fail_disconnect: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue text for the next read.
    pub fn push_output(&self, text: &str) {
        self.push(ReadOutcome::Data(text.to_string()));
    }

    pub fn push(&self, outcome: ReadOutcome) {
        self.lock().reads.push_back(outcome);
    }

    /// The shell goes away: every read after the queued ones ends the stream.
    pub fn close_stream(&self) {
        let mut state = self.lock();
        state.reads.push_back(ReadOutcome::EndOfStream);
        state.alive = false;
    }

    pub fn set_alive(&self, alive: bool) {
        self.lock().alive = alive;
    }

    pub fn fail_signals(&self, fail: bool) {
        self.lock().fail_signals = fail;
    }

    pub fn fail_disconnect(&self, fail: bool) {
        self.lock().fail_disconnect = fail;
    }

    pub fn sent_lines(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    pub fn signals(&self) -> Vec<ProcessSignal> {
        self.lock().signals.clone()
    }

    pub fn disconnects(&self) -> usize {
        self.lock().disconnects
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }
}

/// Session half of a [`SessionHandle`] pair.
#[derive(Debug)]
pub struct ScriptedSession {
    handle: SessionHandle,
}

impl ScriptedSession {
    pub fn new() -> (Self, SessionHandle) {
        let handle = SessionHandle::new(None);
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }
}

#[async_trait]
impl RemoteSession for ScriptedSession {
    async fn send_line(&mut self, line: &str) -> Result<(), SessionError> {
        let mut state = self.handle.lock();
        if !state.connected {
            return Err(SessionError::Closed);
        }
        state.sent.push(line.to_string());
        if let Some(reply) = state.reply.clone() {
            state.reads.push_back(ReadOutcome::Data(format!("{}\n", reply)));
        }
        Ok(())
    }

    async fn read(&mut self, timeout: Duration) -> ReadOutcome {
        let next = {
            let mut state = self.handle.lock();
            if !state.connected {
                return ReadOutcome::EndOfStream;
            }
            state.reads.pop_front()
        };
        match next {
            Some(outcome) => outcome,
            None => {
                tokio::time::sleep(timeout).await;
                ReadOutcome::Timeout
            }
        }
    }

    async fn signal(&mut self, signal: ProcessSignal) -> Result<(), SessionError> {
        let mut state = self.handle.lock();
        if state.fail_signals || !state.connected {
            return Err(SessionError::Signal {
                signal,
                reason: "scripted failure".to_string(),
            });
        }
        state.signals.push(signal);
        Ok(())
    }

    async fn is_alive(&mut self) -> bool {
        let state = self.handle.lock();
        state.connected && state.alive
    }

    async fn disconnect(&mut self) -> Result<(), SessionError> {
        let mut state = self.handle.lock();
        state.disconnects += 1;
        state.connected = false;
        state.alive = false;
        if state.fail_disconnect {
            return Err(SessionError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "scripted disconnect failure",
            )));
        }
        Ok(())
    }
}

/// Hands out scripted sessions and remembers their handles by host.
#[derive(Debug, Default)]
pub struct ScriptedConnector {
    reply: Option<String>,
    failing: Mutex<HashSet<String>>,
    sessions: Mutex<HashMap<String, Vec<SessionHandle>>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every command line with `line`, typically the startup sentinel.
    pub fn with_startup(mut self, line: impl Into<String>) -> Self {
        self.reply = Some(line.into());
        self
    }

    /// Refuse logins to `host`.
    pub fn fail_host(&self, host: &str) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(host.to_string());
    }

    /// Handle of the most recent session opened to `host`.
    pub fn handle(&self, host: &str) -> Option<SessionHandle> {
        self.sessions(host).pop()
    }

    pub fn sessions(&self, host: &str) -> Vec<SessionHandle> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(host)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl SessionConnector for ScriptedConnector {
    async fn connect(
        &self,
        host: &str,
        _user: &str,
    ) -> Result<Box<dyn RemoteSession>, SessionError> {
        let refused = self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(host);
        if refused {
            return Err(SessionError::Login {
                host: host.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        let handle = SessionHandle::new(self.reply.clone());
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(host.to_string())
            .or_default()
            .push(handle.clone());
        Ok(Box::new(ScriptedSession { handle }))
    }
}
