use std::collections::VecDeque;

use uuid::Uuid;

use crate::render::SharedJob;

/// FIFO of jobs bound to one host. Only the head may hold the host.
#[derive(Debug)]
pub struct HostQueue {
    host: String,
    jobs: VecDeque<(Uuid, SharedJob)>,
}

impl HostQueue {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            jobs: VecDeque::new(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Add a job at the back of the queue
    pub fn push(&mut self, id: Uuid, job: SharedJob) {
        self.jobs.push_back((id, job));
    }

    /// Oldest job in the queue
    pub fn head(&self) -> Option<SharedJob> {
        self.jobs.front().map(|(_, job)| job.clone())
    }

    /// Remove the oldest job
    pub fn pop(&mut self) -> Option<SharedJob> {
        self.jobs.pop_front().map(|(_, job)| job)
    }

    /// Remove a job wherever it sits. Returns false if it is not queued here.
    pub fn remove(&mut self, id: &Uuid) -> bool {
        let before = self.jobs.len();
        self.jobs.retain(|(queued, _)| queued != id);
        before != self.jobs.len()
    }

    /// Jobs in queue order
    pub fn jobs(&self) -> Vec<SharedJob> {
        self.jobs.iter().map(|(_, job)| job.clone()).collect()
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.jobs.iter().map(|(id, _)| *id).collect()
    }

    /// Number of jobs currently holding the host
    pub async fn active_count(&self) -> usize {
        let mut active = 0;
        for (_, job) in &self.jobs {
            if job.lock().await.state().is_active() {
                active += 1;
            }
        }
        active
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
