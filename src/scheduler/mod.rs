//! Per-host job queues and the loop that drives them.
//!
//! Every job lives in the master list (submission order, kept until it is
//! withdrawn) and in the FIFO of its host. A tick walks each host's queue
//! independently:
//!
//! 1. completed jobs at the head are retired from the queue
//! 2. an `Idle` head is launched, or its start-up output is read once if it
//!    was launched on an earlier tick; if start-up fails it is retired too
//! 3. every job still in the queue is polled once
//!
//! Start-up spans ticks: a job lock is never held across more than one
//! session read.
//!
//! Only the head is ever started, so a host runs at most one render at a time.

pub mod queue;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{LogConfig, ManagerConfig, SessionConfig};
use crate::error::{RenderError, Result};
use crate::render::{JobSnapshot, JobState, RenderJob, RenderRequest, SharedJob};
use crate::session::SessionConnector;
use crate::transfer;

pub use queue::HostQueue;

type SharedQueue = Arc<Mutex<HostQueue>>;

struct Entry {
    id: Uuid,
    host: String,
    job: SharedJob,
}

pub struct Scheduler {
    connector: Arc<dyn SessionConnector>,
    binary_path: PathBuf,
    session: SessionConfig,
    logs: LogConfig,
    copy_limit_kbit: u32,
    active_interval: Duration,
    idle_interval: Duration,

    jobs: RwLock<Vec<Entry>>,
    queues: RwLock<HashMap<String, SharedQueue>>,
    interval: watch::Sender<Duration>,
    /// Held for the duration of a tick
    ticking: Mutex<()>,
}

impl Scheduler {
    pub fn new(connector: Arc<dyn SessionConnector>, config: &ManagerConfig) -> Self {
        let queues = config
            .hosts
            .iter()
            .map(|host| (host.clone(), Arc::new(Mutex::new(HostQueue::new(host.clone())))))
            .collect();
        let (interval, _) = watch::channel(config.active_interval);

        Self {
            connector,
            binary_path: config.binary_path.clone(),
            session: config.session.clone(),
            logs: config.logs.clone(),
            copy_limit_kbit: config.copy_limit_kbit,
            active_interval: config.active_interval,
            idle_interval: config.idle_interval,
            jobs: RwLock::new(Vec::new()),
            queues: RwLock::new(queues),
            interval,
            ticking: Mutex::new(()),
        }
    }

    // =========================================================================
    // Submission and lifecycle
    // =========================================================================

    /// Build a job for `request` and queue it behind its host's other jobs.
    ///
    /// A job whose login failed is still queued; it is already in `Error` and
    /// is retired on the next tick. An empty binary path is replaced by the
    /// configured one.
    pub async fn submit(&self, mut request: RenderRequest) -> Result<Uuid> {
        if request.binary_path.as_os_str().is_empty() {
            request.binary_path = self.binary_path.clone();
        }
        let job = RenderJob::new(
            request,
            self.connector.as_ref(),
            self.session.clone(),
            self.logs.clone(),
        )
        .await?;
        Ok(self.enqueue(job).await)
    }

    async fn enqueue(&self, job: RenderJob) -> Uuid {
        let id = job.id();
        let host = job.host().to_string();
        let shared = job.into_shared();

        self.jobs.write().await.push(Entry {
            id,
            host: host.clone(),
            job: shared.clone(),
        });
        let queue = self.queue_for(&host).await;
        let depth = {
            let mut queue = queue.lock().await;
            queue.push(id, shared);
            queue.len()
        };

        tracing::info!(job_id = %id, host = %host, depth, "Job queued");
        id
    }

    async fn queue_for(&self, host: &str) -> SharedQueue {
        let existing = self.queues.read().await.get(host).cloned();
        if let Some(queue) = existing {
            return queue;
        }
        self.queues
            .write()
            .await
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(HostQueue::new(host))))
            .clone()
    }

    async fn find(&self, id: Uuid) -> Result<SharedJob> {
        self.jobs
            .read()
            .await
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.job.clone())
            .ok_or(RenderError::JobNotFound(id))
    }

    pub async fn pause(&self, id: Uuid) -> Result<()> {
        self.find(id).await?.lock().await.pause().await;
        Ok(())
    }

    pub async fn resume(&self, id: Uuid) -> Result<()> {
        self.find(id).await?.lock().await.resume().await;
        Ok(())
    }

    pub async fn kill(&self, id: Uuid) -> Result<()> {
        self.find(id).await?.lock().await.kill().await;
        Ok(())
    }

    pub async fn close(&self, id: Uuid) -> Result<()> {
        self.find(id).await?.lock().await.close().await;
        Ok(())
    }

    /// Replace a job with a fresh one built from the same request.
    ///
    /// The new job takes the old one's place in the master list and joins the
    /// back of the host queue. The old job is closed.
    pub async fn restart(&self, id: Uuid) -> Result<Uuid> {
        let old = self.find(id).await?;
        let fresh = {
            let mut old = old.lock().await;
            let fresh = old.restart(self.connector.as_ref()).await?;
            old.close().await;
            fresh
        };

        let new_id = fresh.id();
        let host = fresh.host().to_string();
        let shared = fresh.into_shared();

        {
            let mut jobs = self.jobs.write().await;
            let entry = Entry {
                id: new_id,
                host: host.clone(),
                job: shared.clone(),
            };
            match jobs.iter().position(|e| e.id == id) {
                Some(index) => jobs[index] = entry,
                // withdrawn while the new session was being opened
                None => jobs.push(entry),
            }
        }
        self.queue_for(&host).await.lock().await.push(new_id, shared);

        tracing::info!(old_job_id = %id, job_id = %new_id, host = %host, "Job restarted");
        Ok(new_id)
    }

    /// Close a job and forget it.
    ///
    /// Logs of a job that finished cleanly are deleted; anything else keeps
    /// them for inspection.
    pub async fn withdraw(&self, id: Uuid) -> Result<()> {
        let job = self.find(id).await?;
        let (host, error_code, log_path, job_log_path) = {
            let mut job = job.lock().await;
            job.close().await;
            (
                job.host().to_string(),
                job.error_code(),
                job.log_path().to_path_buf(),
                job.job_log_path().to_path_buf(),
            )
        };

        self.jobs.write().await.retain(|entry| entry.id != id);
        let queue = self.queues.read().await.get(&host).cloned();
        if let Some(queue) = queue {
            queue.lock().await.remove(&id);
        }

        if error_code == Some(0) {
            for path in [&log_path, &job_log_path] {
                if let Err(e) = tokio::fs::remove_file(path).await {
                    tracing::warn!(job_id = %id, path = %path.display(), error = %e, "Cannot remove log");
                }
            }
        }

        tracing::info!(job_id = %id, host = %host, error_code = ?error_code, "Job withdrawn");
        Ok(())
    }

    /// Close every job. Used on shutdown.
    pub async fn shutdown(&self) {
        let jobs: Vec<SharedJob> = self.jobs.read().await.iter().map(|e| e.job.clone()).collect();
        tracing::info!(count = jobs.len(), "Closing all jobs");
        for job in jobs {
            job.lock().await.close().await;
        }
    }

    // =========================================================================
    // Views
    // =========================================================================

    pub async fn snapshot(&self, id: Uuid) -> Result<JobSnapshot> {
        Ok(self.find(id).await?.lock().await.snapshot())
    }

    /// Snapshots of every job in submission order.
    pub async fn snapshots(&self) -> Vec<JobSnapshot> {
        let jobs: Vec<SharedJob> = self.jobs.read().await.iter().map(|e| e.job.clone()).collect();
        let mut snapshots = Vec::with_capacity(jobs.len());
        for job in jobs {
            snapshots.push(job.lock().await.snapshot());
        }
        snapshots
    }

    pub async fn job_ids(&self) -> Vec<Uuid> {
        self.jobs.read().await.iter().map(|e| e.id).collect()
    }

    /// Ids queued on `host`, head first.
    pub async fn queued_ids(&self, host: &str) -> Vec<Uuid> {
        let queue = self.queues.read().await.get(host).cloned();
        match queue {
            Some(queue) => queue.lock().await.ids(),
            None => Vec::new(),
        }
    }

    pub async fn hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self.queues.read().await.keys().cloned().collect();
        hosts.sort();
        hosts
    }

    /// Jobs currently holding `host`; never more than one.
    pub async fn active_on(&self, host: &str) -> usize {
        let queue = self.queues.read().await.get(host).cloned();
        match queue {
            Some(queue) => queue.lock().await.active_count().await,
            None => 0,
        }
    }

    /// Jobs submitted for `host`, whether queued or not.
    pub async fn jobs_on(&self, host: &str) -> usize {
        self.jobs
            .read()
            .await
            .iter()
            .filter(|entry| entry.host == host)
            .count()
    }

    // =========================================================================
    // Output transfer
    // =========================================================================

    pub async fn mark_copied(&self, id: Uuid) -> Result<()> {
        self.find(id).await?.lock().await.mark_copied();
        Ok(())
    }

    /// Fetch a completed job's images into `dest`.
    pub async fn copy_output(&self, id: Uuid, dest: &Path) -> Result<()> {
        let job = self.find(id).await?;
        let (host, glob) = {
            let job = job.lock().await;
            if !job.completed() {
                return Err(RenderError::NotCompleted(id));
            }
            (job.host().to_string(), transfer::remote_glob(&job))
        };

        transfer::copy(&host, &glob, dest, self.copy_limit_kbit).await?;
        job.lock().await.mark_copied();
        Ok(())
    }

    // =========================================================================
    // Driving
    // =========================================================================

    pub fn tick_interval(&self) -> Duration {
        *self.interval.borrow()
    }

    /// Change the loop cadence. A sleeping loop wakes up and ticks at once.
    pub fn set_tick_interval(&self, interval: Duration) {
        tracing::debug!(interval_ms = interval.as_millis() as u64, "Tick interval changed");
        self.interval.send_replace(interval);
    }

    /// Switch between the watched and unattended cadences.
    pub fn set_activity(&self, active: bool) {
        let interval = if active {
            self.active_interval
        } else {
            self.idle_interval
        };
        self.set_tick_interval(interval);
    }

    /// One pass over every host queue. Hosts are handled concurrently; a
    /// second caller waits for the running pass to finish.
    pub async fn tick(&self) {
        let _ticking = self.ticking.lock().await;

        let queues: Vec<SharedQueue> = self.queues.read().await.values().cloned().collect();
        let mut hosts = JoinSet::new();
        for queue in queues {
            hosts.spawn(Self::tick_host(queue));
        }
        while let Some(result) = hosts.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Host tick task failed");
            }
        }
    }

    async fn tick_host(queue: SharedQueue) {
        let mut queue = queue.lock().await;

        while let Some(head) = queue.head() {
            let mut job = head.lock().await;
            if job.completed() {
                tracing::info!(job_id = %job.id(), host = %queue.host(), state = %job.state(), "Job retired");
                drop(job);
                queue.pop();
                continue;
            }
            if job.state() == JobState::Idle {
                if !job.is_starting() {
                    tracing::info!(job_id = %job.id(), host = %queue.host(), "Dispatching job");
                }
                let started = match job.launch().await {
                    Ok(()) => job.poll_startup().await,
                    Err(e) => Err(e),
                };
                if let Err(e) = started {
                    tracing::error!(job_id = %job.id(), host = %queue.host(), error = %e, "Job failed to start");
                    drop(job);
                    queue.pop();
                    continue;
                }
            }
            break;
        }

        for job in queue.jobs() {
            let mut job = job.lock().await;
            if !job.completed() {
                job.poll().await;
            }
        }
    }

    /// Tick until `token` is cancelled, then close every job.
    pub async fn run_loop(&self, token: CancellationToken) {
        let mut interval = self.interval.subscribe();
        tracing::info!(interval_ms = self.tick_interval().as_millis() as u64, "Scheduler started");

        loop {
            self.tick().await;

            let period = *interval.borrow_and_update();
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(period) => {}
                changed = interval.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Scheduler stopping");
        self.shutdown().await;
    }
}
