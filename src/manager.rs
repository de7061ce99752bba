use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::ManagerConfig;
use crate::dashboard::{run_dashboard, DashboardState};
use crate::scheduler::Scheduler;
use crate::session::{SessionConnector, SshConnector};

/// Top-level process: one scheduler loop plus the optional dashboard.
pub struct Manager {
    pub config: ManagerConfig,
    pub scheduler: Arc<Scheduler>,
}

impl Manager {
    /// Manager that reaches its hosts over ssh.
    pub fn new(config: ManagerConfig) -> Self {
        let connector = Arc::new(SshConnector::new(config.session.clone()));
        Self::with_connector(config, connector)
    }

    pub fn with_connector(config: ManagerConfig, connector: Arc<dyn SessionConnector>) -> Self {
        let scheduler = Arc::new(Scheduler::new(connector, &config));
        Self { config, scheduler }
    }

    /// Run until `token` is cancelled.
    ///
    /// The dashboard, if configured, is spawned and stops with the token. The
    /// scheduler loop runs on the calling task and closes every job before
    /// this returns.
    pub async fn run(self, token: CancellationToken) {
        tracing::info!(
            hosts = ?self.config.hosts,
            log_root = %self.config.logs.root.display(),
            dashboard_addr = ?self.config.dashboard_addr,
            "Starting render manager"
        );

        let dashboard = self.config.dashboard_addr.map(|addr| {
            let state = DashboardState {
                scheduler: self.scheduler.clone(),
                default_dest: self.config.output_dir.clone(),
            };
            tokio::spawn(run_dashboard(addr, state, token.clone()))
        });

        self.scheduler.run_loop(token).await;

        if let Some(handle) = dashboard {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Dashboard task failed");
            }
        }
        tracing::info!("Render manager stopped");
    }
}
