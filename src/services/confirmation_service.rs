//! Confirmation handshake executor.
//!
//! Performs the actual subscribe/unsubscribe verification round-trip with
//! the remote party, applying per-attempt timeouts, exponential backoff,
//! and a bounded retry budget. State transitions re-check the row's
//! current state (the store refuses stale transitions), so running the
//! same job twice is a harmless no-op.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use uuid::Uuid;

use crate::crypto;
use crate::error::SubscriptionError;
use crate::models::{ConfirmationJob, Intent, Subscription, SubscriptionState};
use crate::store::SubscriptionStore;

/// Retry/backoff tuning for the confirmation handshake.
#[derive(Debug, Clone)]
pub struct ConfirmationConfig {
    /// Total attempts per job, initial attempt included.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each retry.
    pub base_backoff: Duration,
    /// Backoff ceiling.
    pub max_backoff: Duration,
    /// Per-attempt HTTP timeout.
    pub attempt_timeout: Duration,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(600),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

/// Delay before retry number `attempt` (1-based count of failures so far).
///
/// Exponential: `base * 2^(attempt-1)`, capped at `max`.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(max)
}

/// A single handshake attempt's failure mode.
#[derive(Debug, thiserror::Error)]
enum HandshakeError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("remote answered HTTP {0}")]
    Status(u16),

    #[error("remote did not echo the challenge")]
    ChallengeMismatch,
}

/// Executes confirmation jobs against remote callbacks.
pub struct ConfirmationService {
    store: Arc<SubscriptionStore>,
    http_client: Client,
    config: ConfirmationConfig,
}

impl ConfirmationService {
    /// Build the service with a shared HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `SubscriptionError::Internal` if the HTTP client cannot be
    /// built.
    pub fn new(
        store: Arc<SubscriptionStore>,
        config: ConfirmationConfig,
    ) -> Result<Self, SubscriptionError> {
        let http_client = Client::builder()
            .timeout(config.attempt_timeout)
            .user_agent("fedisub/0.1")
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| SubscriptionError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            store,
            http_client,
            config,
        })
    }

    /// Perform a confirmation job to completion.
    ///
    /// Never returns an error: every failure mode is converted into a
    /// logged state transition (or a no-op when the row disappeared
    /// concurrently, which is an expected race, not a fault).
    pub async fn perform(&self, job: &ConfirmationJob) {
        let Some(sub) = self.store.find_by_id(job.subscription_id).await else {
            tracing::debug!(
                target: "push_subscription",
                subscription_id = %job.subscription_id,
                intent = job.intent.as_str(),
                "Subscription gone before confirmation ran, nothing to do"
            );
            return;
        };

        match job.intent {
            Intent::Subscribe => self.perform_subscribe(job, &sub).await,
            Intent::Unsubscribe => self.perform_unsubscribe(&sub).await,
        }
    }

    async fn perform_subscribe(&self, job: &ConfirmationJob, sub: &Subscription) {
        // Re-check state: an unsubscribe that overtook us wins.
        if !matches!(
            sub.state,
            SubscriptionState::PendingSubscribe | SubscriptionState::Confirmed
        ) {
            tracing::debug!(
                target: "push_subscription",
                subscription_id = %sub.id,
                state = sub.state.as_str(),
                "Skipping subscribe confirmation, row is no longer on the subscribe path"
            );
            return;
        }

        let secret = job.secret.clone().unwrap_or_else(|| sub.secret.clone());
        let lease = job.lease_seconds.unwrap_or(sub.lease_seconds);
        let was_renewal = sub.state == SubscriptionState::Confirmed;

        match self
            .handshake_with_retries(sub, Intent::Subscribe, &secret, Some(lease))
            .await
        {
            Ok(attempts) => {
                // The secret may have rotated while the handshake was in
                // flight; a stale job must not overwrite it, and the job
                // carrying the new secret re-runs the handshake.
                let secret_current = self
                    .store
                    .find_by_id(sub.id)
                    .await
                    .map_or(false, |row| row.secret == secret);
                if !secret_current {
                    tracing::debug!(
                        target: "push_subscription",
                        subscription_id = %sub.id,
                        "Secret rotated during handshake, leaving confirmation to the newer job"
                    );
                } else if self.store.confirm(sub.id, secret, lease).await.is_some() {
                    tracing::info!(
                        target: "push_subscription",
                        subscription_id = %sub.id,
                        attempts,
                        lease_seconds = lease,
                        "Subscribe handshake confirmed"
                    );
                } else {
                    tracing::debug!(
                        target: "push_subscription",
                        subscription_id = %sub.id,
                        "Handshake succeeded but the row moved on, not confirming"
                    );
                }
            }
            Err(last_error) => {
                if was_renewal {
                    // A failed renewal must not tear down a live subscription.
                    tracing::warn!(
                        target: "push_subscription",
                        subscription_id = %sub.id,
                        error = %last_error,
                        "Renewal handshake exhausted retries, keeping subscription confirmed"
                    );
                } else if self.store.reject(sub.id).await.is_some() {
                    tracing::warn!(
                        target: "push_subscription",
                        subscription_id = %sub.id,
                        max_attempts = self.config.max_attempts,
                        error = %last_error,
                        "Subscribe handshake exhausted retries, subscription rejected"
                    );
                }
            }
        }
    }

    async fn perform_unsubscribe(&self, sub: &Subscription) {
        if sub.state != SubscriptionState::PendingUnsubscribe {
            tracing::debug!(
                target: "push_subscription",
                subscription_id = %sub.id,
                state = sub.state.as_str(),
                "Skipping unsubscribe confirmation, row is not pending removal"
            );
            return;
        }

        match self
            .handshake_with_retries(sub, Intent::Unsubscribe, &sub.secret, None)
            .await
        {
            Ok(attempts) => {
                if self.store.remove_pending_unsubscribe(sub.id).await {
                    tracing::info!(
                        target: "push_subscription",
                        subscription_id = %sub.id,
                        attempts,
                        "Unsubscribe handshake confirmed, subscription removed"
                    );
                }
            }
            Err(last_error) => {
                // Silently dropping the row here would let it go stale
                // with no renewal tracking; keep it confirmed and report.
                self.store.revert_to_confirmed(sub.id).await;
                tracing::warn!(
                    target: "push_subscription",
                    subscription_id = %sub.id,
                    max_attempts = self.config.max_attempts,
                    error = %last_error,
                    "Unsubscribe handshake exhausted retries, subscription kept confirmed"
                );
            }
        }
    }

    /// Run the handshake up to the retry ceiling.
    ///
    /// Returns the attempt count on success, or the last failure after
    /// exhaustion.
    async fn handshake_with_retries(
        &self,
        sub: &Subscription,
        intent: Intent,
        secret: &str,
        lease_seconds: Option<u32>,
    ) -> Result<u32, HandshakeError> {
        let mut last_error = HandshakeError::Request("no attempts made".to_string());

        for attempt in 1..=self.config.max_attempts {
            match self
                .send_handshake(sub.id, &sub.callback_url, &sub.topic_url, intent, secret, lease_seconds)
                .await
            {
                Ok(()) => return Ok(attempt),
                Err(e) => {
                    tracing::warn!(
                        target: "push_subscription",
                        subscription_id = %sub.id,
                        intent = intent.as_str(),
                        attempt,
                        max_attempts = self.config.max_attempts,
                        error = %e,
                        "Confirmation handshake attempt failed"
                    );
                    last_error = e;
                    if attempt < self.config.max_attempts {
                        let delay = backoff_delay(
                            attempt,
                            self.config.base_backoff,
                            self.config.max_backoff,
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error)
    }

    /// One verification GET to the remote callback.
    ///
    /// Success requires a 2xx answer whose body echoes the challenge
    /// verbatim; anything else consumes retry budget.
    async fn send_handshake(
        &self,
        subscription_id: Uuid,
        callback_url: &str,
        topic_url: &str,
        intent: Intent,
        secret: &str,
        lease_seconds: Option<u32>,
    ) -> Result<(), HandshakeError> {
        let challenge = crypto::generate_challenge();

        let mut params: Vec<(&str, String)> = vec![
            ("hub.mode", intent.as_str().to_string()),
            ("hub.topic", topic_url.to_string()),
            ("hub.challenge", challenge.clone()),
            ("hub.verify_token", secret.to_string()),
        ];
        if let Some(lease) = lease_seconds {
            params.push(("hub.lease_seconds", lease.to_string()));
        }

        let response = self
            .http_client
            .get(callback_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    HandshakeError::Request("attempt timed out".to_string())
                } else if e.is_connect() {
                    HandshakeError::Request(format!("connection failed: {e}"))
                } else {
                    HandshakeError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HandshakeError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| HandshakeError::Request(e.to_string()))?;

        if body.trim() == challenge {
            Ok(())
        } else {
            tracing::debug!(
                target: "push_subscription",
                subscription_id = %subscription_id,
                "Challenge echo mismatch from remote callback"
            );
            Err(HandshakeError::ChallengeMismatch)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let base = Duration::from_secs(5);
        let max = Duration::from_secs(600);
        assert_eq!(backoff_delay(1, base, max), Duration::from_secs(5));
        assert_eq!(backoff_delay(2, base, max), Duration::from_secs(10));
        assert_eq!(backoff_delay(3, base, max), Duration::from_secs(20));
        assert_eq!(backoff_delay(4, base, max), Duration::from_secs(40));
    }

    #[test]
    fn test_backoff_respects_cap() {
        let base = Duration::from_secs(5);
        let max = Duration::from_secs(600);
        assert_eq!(backoff_delay(10, base, max), max);
        assert_eq!(backoff_delay(32, base, max), max);
    }

    #[test]
    fn test_backoff_zero_attempt_is_base() {
        let base = Duration::from_secs(5);
        assert_eq!(backoff_delay(0, base, Duration::from_secs(600)), base);
    }

    #[test]
    fn test_backoff_is_monotonic_until_cap() {
        let base = Duration::from_millis(10);
        let max = Duration::from_secs(60);
        let mut previous = Duration::ZERO;
        for attempt in 1..=16 {
            let delay = backoff_delay(attempt, base, max);
            assert!(delay >= previous, "backoff regressed at attempt {attempt}");
            previous = delay;
        }
    }

    #[test]
    fn test_default_config_bounds() {
        let cfg = ConfirmationConfig::default();
        assert!(cfg.max_attempts > 0 && cfg.max_attempts < 10);
        assert!(cfg.base_backoff < cfg.max_backoff);
    }
}
