//! Confirmation job queue.
//!
//! Thin facade over an mpsc channel with argument-content-addressed
//! deduplication: enqueuing a job whose identity digest is already
//! pending is a no-op, so two rapid subscribe calls for the same callback
//! do not trigger two concurrent handshakes. The worker marks a digest
//! complete when it dequeues the job, so dedup covers the queued-but-not-
//! started window; a follow-up enqueued while the job's handshake is in
//! flight (a secret rotation, say) still lands and runs afterwards.

use std::collections::HashSet;
use std::sync::Mutex;

use sha2::{Digest, Sha256};
use tokio::sync::mpsc;

use crate::models::ConfirmationJob;

/// Producer half of the confirmation queue.
pub struct ConfirmationQueue {
    tx: mpsc::UnboundedSender<ConfirmationJob>,
    pending: Mutex<HashSet<String>>,
}

impl ConfirmationQueue {
    /// Create the queue and the receiver the worker consumes from.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ConfirmationJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                pending: Mutex::new(HashSet::new()),
            },
            rx,
        )
    }

    /// Enqueue a job unless an identical one is already pending.
    ///
    /// Returns true if the job was enqueued, false if it was deduplicated
    /// or the worker side has shut down.
    pub fn enqueue(&self, job: ConfirmationJob) -> bool {
        let digest = job_digest(&job);
        {
            let mut pending = self.pending.lock().expect("queue lock poisoned");
            if !pending.insert(digest.clone()) {
                tracing::debug!(
                    target: "push_subscription",
                    subscription_id = %job.subscription_id,
                    intent = job.intent.as_str(),
                    "Confirmation already pending, deduplicating enqueue"
                );
                return false;
            }
        }

        if self.tx.send(job).is_err() {
            tracing::warn!(target: "push_subscription", "Confirmation worker is gone, dropping job");
            self.pending
                .lock()
                .expect("queue lock poisoned")
                .remove(&digest);
            return false;
        }
        true
    }

    /// Mark a job complete, allowing the same pair to be enqueued again.
    pub fn complete(&self, job: &ConfirmationJob) {
        self.pending
            .lock()
            .expect("queue lock poisoned")
            .remove(&job_digest(job));
    }

    /// Number of digests currently pending (test observability).
    pub fn pending_len(&self) -> usize {
        self.pending.lock().expect("queue lock poisoned").len()
    }
}

/// Content digest identifying a job for deduplication purposes.
///
/// Keyed on `(subscription_id, intent)`: a second subscribe for the same
/// row is the same work even when the lease differs, since the worker
/// reads the row's current values when it runs.
fn job_digest(job: &ConfirmationJob) -> String {
    let mut hasher = Sha256::new();
    hasher.update(job.subscription_id.as_bytes());
    hasher.update(job.intent.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
