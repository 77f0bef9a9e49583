//! Confirmation worker.
//!
//! Background task that consumes confirmation jobs and runs the periodic
//! lease-expiry sweep. Jobs are performed one at a time, which linearizes
//! state transitions per subscription on top of the queue's enqueue-time
//! deduplication.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info};

use crate::models::ConfirmationJob;
use crate::queue::ConfirmationQueue;
use crate::services::confirmation_service::ConfirmationService;
use crate::store::SubscriptionStore;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How often to sweep expired leases.
    pub sweep_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(300),
        }
    }
}

/// Handle for requesting graceful shutdown.
#[derive(Clone)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        info!(target: "push_subscription", "Worker shutdown requested");
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Confirmation worker loop.
pub struct ConfirmationWorker {
    rx: mpsc::UnboundedReceiver<ConfirmationJob>,
    service: Arc<ConfirmationService>,
    queue: Arc<ConfirmationQueue>,
    store: Arc<SubscriptionStore>,
    config: WorkerConfig,
    shutdown: Arc<AtomicBool>,
}

impl ConfirmationWorker {
    pub fn new(
        rx: mpsc::UnboundedReceiver<ConfirmationJob>,
        service: Arc<ConfirmationService>,
        queue: Arc<ConfirmationQueue>,
        store: Arc<SubscriptionStore>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            rx,
            service,
            queue,
            store,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown.clone())
    }

    /// Run until the queue closes or shutdown is requested.
    pub async fn run(mut self) {
        info!(
            target: "push_subscription",
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            "Confirmation worker starting"
        );

        let mut sweep = interval(self.config.sweep_interval);
        // The first tick fires immediately; skip it so startup does not
        // race tests that seed the store afterwards.
        sweep.tick().await;

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            tokio::select! {
                job = self.rx.recv() => {
                    match job {
                        Some(job) => {
                            debug!(
                                target: "push_subscription",
                                subscription_id = %job.subscription_id,
                                intent = job.intent.as_str(),
                                "Worker picked up confirmation job"
                            );
                            // Free the dedup digest before performing, so a
                            // re-subscribe that rotates the secret while the
                            // handshake is in flight enqueues a fresh job
                            // instead of being dropped.
                            self.queue.complete(&job);
                            self.service.perform(&job).await;
                        }
                        None => {
                            info!(target: "push_subscription", "Confirmation queue closed");
                            break;
                        }
                    }
                }
                _ = sweep.tick() => {
                    let removed = self.store.expire_stale().await;
                    if removed > 0 {
                        info!(
                            target: "push_subscription",
                            removed,
                            "Expired stale subscriptions"
                        );
                    }
                }
            }
        }

        info!(target: "push_subscription", "Confirmation worker stopped");
    }
}
