//! Subscription intake: subscribe, unsubscribe, and challenge response.
//!
//! These are the only synchronous entry points into the lifecycle. They
//! validate intent, create or locate the subscription row, and schedule
//! confirmation work; the network handshake itself always happens on the
//! worker, so the request path never blocks on a remote party.

use std::sync::Arc;

use uuid::Uuid;

use crate::collaborators::{DomainBlocklist, TopicResolver};
use crate::error::SubscriptionError;
use crate::models::{
    clamp_lease, ConfirmationJob, Intent, PendingConfirmation, SubscriptionState,
    UnsubscribeOutcome,
};
use crate::queue::ConfirmationQueue;
use crate::store::SubscriptionStore;
use crate::validation;

/// Subscribe/unsubscribe intake service.
pub struct SubscriptionService {
    store: Arc<SubscriptionStore>,
    queue: Arc<ConfirmationQueue>,
    topics: Arc<dyn TopicResolver>,
    blocklist: Arc<dyn DomainBlocklist>,
    allow_internal_callbacks: bool,
}

impl SubscriptionService {
    pub fn new(
        store: Arc<SubscriptionStore>,
        queue: Arc<ConfirmationQueue>,
        topics: Arc<dyn TopicResolver>,
        blocklist: Arc<dyn DomainBlocklist>,
    ) -> Self {
        Self {
            store,
            queue,
            topics,
            blocklist,
            allow_internal_callbacks: false,
        }
    }

    /// Allow callbacks to private/internal hosts (for tests pointing at
    /// local mock servers).
    #[must_use]
    pub fn with_allow_internal_callbacks(mut self, allow: bool) -> Self {
        self.allow_internal_callbacks = allow;
        self
    }

    /// Request a subscription of `account_id`'s feed with delivery to
    /// `callback_url`.
    ///
    /// Validation order is fixed: topic ownership, callback syntax,
    /// domain blocklist. Each failure is distinct and surfaced
    /// synchronously; nothing is persisted or enqueued on failure.
    ///
    /// On success the row exists in a pending (or renewing) state and a
    /// confirmation job is scheduled; the caller gets accepted-pending
    /// semantics immediately.
    pub async fn subscribe(
        &self,
        account_id: Uuid,
        callback_url: &str,
        secret: Option<String>,
        lease_seconds: Option<u32>,
    ) -> Result<PendingConfirmation, SubscriptionError> {
        let topic_url = self
            .topics
            .topic_url(account_id)
            .ok_or(SubscriptionError::InvalidTopic(account_id))?;

        let host =
            validation::validate_callback_url(callback_url, self.allow_internal_callbacks)?;

        if self.blocklist.is_blocked(&host) {
            tracing::info!(
                target: "push_subscription",
                account_id = %account_id,
                host = %host,
                "Rejecting subscribe request for blocklisted callback host"
            );
            return Err(SubscriptionError::CallbackForbidden(host));
        }

        let lease = clamp_lease(lease_seconds);
        let supplied_secret = secret.filter(|s| !s.is_empty());

        let (sub, created) = self
            .store
            .find_or_create(
                account_id,
                callback_url,
                &topic_url,
                supplied_secret.clone(),
                lease,
            )
            .await;

        // A repeat subscribe renews in place when nothing that needs
        // re-verification changed; a changed secret goes back through the
        // pending confirmation path.
        let effective_secret;
        let state;
        if created {
            effective_secret = sub.secret.clone();
            state = sub.state;
        } else {
            let secret_changed = matches!(&supplied_secret, Some(s) if *s != sub.secret);
            if sub.state == SubscriptionState::Confirmed && !secret_changed {
                let renewed = self
                    .store
                    .renew(sub.id, lease)
                    .await
                    .ok_or(SubscriptionError::SubscriptionNotFound)?;
                effective_secret = renewed.secret;
                state = renewed.state;
            } else {
                let new_secret = supplied_secret.unwrap_or_else(|| sub.secret.clone());
                let updated = self
                    .store
                    .set_pending_subscribe(sub.id, new_secret, lease)
                    .await
                    .ok_or(SubscriptionError::SubscriptionNotFound)?;
                effective_secret = updated.secret;
                state = updated.state;
            }
        }

        self.queue.enqueue(ConfirmationJob {
            subscription_id: sub.id,
            intent: Intent::Subscribe,
            secret: Some(effective_secret),
            lease_seconds: Some(lease),
        });

        tracing::info!(
            target: "push_subscription",
            subscription_id = %sub.id,
            account_id = %account_id,
            created,
            lease_seconds = lease,
            "Subscribe request accepted, confirmation pending"
        );

        Ok(PendingConfirmation {
            subscription_id: sub.id,
            state,
        })
    }

    /// Request removal of the subscription for `(account_id, callback_url)`.
    ///
    /// Unknown pairs are an idempotent no-op success. A confirmed row is
    /// marked pending and only deleted once the worker's unsubscribe
    /// handshake completes; a row no handshake ever confirmed is deleted
    /// outright, since the remote never acknowledged it.
    pub async fn unsubscribe(
        &self,
        account_id: Uuid,
        callback_url: &str,
    ) -> Result<UnsubscribeOutcome, SubscriptionError> {
        let Some(sub) = self.store.find(account_id, callback_url).await else {
            return Ok(UnsubscribeOutcome::NotSubscribed);
        };

        if !matches!(
            sub.state,
            SubscriptionState::Confirmed | SubscriptionState::PendingUnsubscribe
        ) {
            self.store.remove(sub.id).await;
            tracing::info!(
                target: "push_subscription",
                subscription_id = %sub.id,
                account_id = %account_id,
                state = sub.state.as_str(),
                "Removed unconfirmed subscription without handshake"
            );
            return Ok(UnsubscribeOutcome::Removed);
        }

        let updated = self
            .store
            .mark_pending_unsubscribe(sub.id)
            .await
            .ok_or(SubscriptionError::SubscriptionNotFound)?;

        self.queue.enqueue(ConfirmationJob {
            subscription_id: sub.id,
            intent: Intent::Unsubscribe,
            secret: None,
            lease_seconds: None,
        });

        tracing::info!(
            target: "push_subscription",
            subscription_id = %sub.id,
            account_id = %account_id,
            "Unsubscribe request accepted, confirmation pending"
        );

        Ok(UnsubscribeOutcome::Pending(PendingConfirmation {
            subscription_id: updated.id,
            state: updated.state,
        }))
    }

    /// Respond to a remote hub's verification GET.
    ///
    /// Echoes the challenge verbatim when a pending subscription matches
    /// the presented topic and verify token; only the original requester
    /// knows the token, so the echo proves the request's provenance. A
    /// mismatch is indistinguishable from an absent subscription.
    pub async fn respond_to_challenge(
        &self,
        account_id: Uuid,
        topic: &str,
        verify_token: &str,
        challenge: &str,
    ) -> Result<String, SubscriptionError> {
        match self
            .store
            .find_pending_challenge(account_id, topic, verify_token)
            .await
        {
            Some(sub) => {
                tracing::debug!(
                    target: "push_subscription",
                    subscription_id = %sub.id,
                    "Echoing verification challenge for pending subscription"
                );
                Ok(challenge.to_string())
            }
            None => {
                tracing::warn!(
                    target: "push_subscription",
                    account_id = %account_id,
                    topic = %topic,
                    "Verification request matched no pending subscription"
                );
                Err(SubscriptionError::SubscriptionNotFound)
            }
        }
    }
}
