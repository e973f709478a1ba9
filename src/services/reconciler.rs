// Reconciler - periodically pushes unsynced reports and tasks to Notion

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{error, info};

use crate::services::coalescing::CoalescingService;

/// Background worker running `reconcile_unsynced` on a fixed interval
pub struct Reconciler {
    service: Arc<CoalescingService>,
    interval: Duration,
    shutdown: Arc<Notify>,
}

impl Reconciler {
    pub fn new(service: Arc<CoalescingService>, interval: Duration) -> Self {
        Self {
            service,
            interval,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Handle used to stop the loop
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Loop until shutdown is signalled. The first pass runs after one interval.
    pub async fn run(&self) {
        info!(interval_secs = self.interval.as_secs(), "Reconciler started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Reconciler received shutdown signal");
                    break;
                }

                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.service.reconcile_unsynced().await {
                        error!(error = %e, "Reconciliation pass failed");
                    }
                }
            }
        }

        info!("Reconciler stopped");
    }
}
