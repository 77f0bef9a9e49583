//! Subscription repository.
//!
//! Owns the only shared mutable resource in the core. All state mutation
//! is funneled through the methods here; transition methods re-check the
//! current state before applying, so concurrently running request-path and
//! worker-path callers cannot race a row into an inconsistent state.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::crypto;
use crate::models::{Subscription, SubscriptionState};

#[derive(Default)]
struct Inner {
    by_id: HashMap<Uuid, Subscription>,
    /// Index enforcing at most one row per (account_id, callback_url).
    by_key: HashMap<(Uuid, String), Uuid>,
}

/// In-memory subscription repository.
#[derive(Default)]
pub struct SubscriptionStore {
    inner: RwLock<Inner>,
}

impl SubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Find a subscription by its identity pair.
    pub async fn find(&self, account_id: Uuid, callback_url: &str) -> Option<Subscription> {
        let inner = self.inner.read().await;
        let id = inner.by_key.get(&(account_id, callback_url.to_string()))?;
        inner.by_id.get(id).cloned()
    }

    pub async fn find_by_id(&self, id: Uuid) -> Option<Subscription> {
        self.inner.read().await.by_id.get(&id).cloned()
    }

    /// All subscriptions for a local topic owner.
    pub async fn find_by_account(&self, account_id: Uuid) -> Vec<Subscription> {
        self.inner
            .read()
            .await
            .by_id
            .values()
            .filter(|s| s.account_id == account_id)
            .cloned()
            .collect()
    }

    /// Find the pending subscription matching an inbound verification
    /// request. The verify token must equal the secret recorded at
    /// subscribe time; that token is only known to the original requester.
    pub async fn find_pending_challenge(
        &self,
        account_id: Uuid,
        topic: &str,
        verify_token: &str,
    ) -> Option<Subscription> {
        self.inner
            .read()
            .await
            .by_id
            .values()
            .find(|s| {
                s.account_id == account_id
                    && s.topic_url == topic
                    && s.secret == verify_token
                    && matches!(
                        s.state,
                        SubscriptionState::PendingSubscribe
                            | SubscriptionState::PendingUnsubscribe
                    )
            })
            .cloned()
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.by_id.len()
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Idempotent create: returns the existing row untouched if one exists
    /// for the pair, otherwise creates a pending row with a fresh secret
    /// when the caller supplies none.
    ///
    /// The bool is true when a new row was created.
    pub async fn find_or_create(
        &self,
        account_id: Uuid,
        callback_url: &str,
        topic_url: &str,
        secret: Option<String>,
        lease_seconds: u32,
    ) -> (Subscription, bool) {
        let mut inner = self.inner.write().await;
        let key = (account_id, callback_url.to_string());

        if let Some(id) = inner.by_key.get(&key) {
            if let Some(existing) = inner.by_id.get(id) {
                return (existing.clone(), false);
            }
        }

        let now = Utc::now();
        let sub = Subscription {
            id: Uuid::new_v4(),
            account_id,
            callback_url: callback_url.to_string(),
            topic_url: topic_url.to_string(),
            secret: secret
                .filter(|s| !s.is_empty())
                .unwrap_or_else(crypto::generate_secret),
            lease_seconds,
            expires_at: now + Duration::seconds(i64::from(lease_seconds)),
            confirmed: false,
            state: SubscriptionState::PendingSubscribe,
            created_at: now,
            renewed_at: None,
            last_successful_delivery_at: None,
        };

        inner.by_key.insert(key, sub.id);
        inner.by_id.insert(sub.id, sub.clone());
        (sub, true)
    }

    // -----------------------------------------------------------------------
    // State transitions
    // -----------------------------------------------------------------------

    /// Put a row back on the pending-subscribe path with a (possibly new)
    /// secret and lease. Used when a repeat subscribe changes the secret.
    pub async fn set_pending_subscribe(
        &self,
        id: Uuid,
        secret: String,
        lease_seconds: u32,
    ) -> Option<Subscription> {
        let mut inner = self.inner.write().await;
        let sub = inner.by_id.get_mut(&id)?;
        sub.secret = secret;
        sub.lease_seconds = lease_seconds;
        sub.state = SubscriptionState::PendingSubscribe;
        Some(sub.clone())
    }

    /// Renew the lease without changing the confirmed state.
    pub async fn renew(&self, id: Uuid, lease_seconds: u32) -> Option<Subscription> {
        let mut inner = self.inner.write().await;
        let sub = inner.by_id.get_mut(&id)?;
        let now = Utc::now();
        sub.lease_seconds = lease_seconds;
        sub.renewed_at = Some(now);
        sub.expires_at = now + Duration::seconds(i64::from(lease_seconds));
        Some(sub.clone())
    }

    /// Record a successful subscribe handshake.
    ///
    /// Applies only while the row is pending subscribe or already
    /// confirmed (renewal); a concurrent unsubscribe wins otherwise.
    pub async fn confirm(
        &self,
        id: Uuid,
        secret: String,
        lease_seconds: u32,
    ) -> Option<Subscription> {
        let mut inner = self.inner.write().await;
        let sub = inner.by_id.get_mut(&id)?;
        if !matches!(
            sub.state,
            SubscriptionState::PendingSubscribe | SubscriptionState::Confirmed
        ) {
            return None;
        }
        let now = Utc::now();
        sub.secret = secret;
        sub.lease_seconds = lease_seconds;
        sub.state = SubscriptionState::Confirmed;
        sub.confirmed = true;
        sub.renewed_at = Some(now);
        sub.expires_at = now + Duration::seconds(i64::from(lease_seconds));
        Some(sub.clone())
    }

    /// Record subscribe handshake exhaustion. Applies only while pending;
    /// a row already confirmed by an earlier attempt is left alone.
    pub async fn reject(&self, id: Uuid) -> Option<Subscription> {
        let mut inner = self.inner.write().await;
        let sub = inner.by_id.get_mut(&id)?;
        if sub.state != SubscriptionState::PendingSubscribe {
            return None;
        }
        sub.state = SubscriptionState::Rejected;
        sub.confirmed = false;
        Some(sub.clone())
    }

    /// Mark a row pending removal.
    ///
    /// Applies only to rows a successful subscribe handshake confirmed.
    /// A pending or rejected row was never acknowledged by the remote,
    /// so there is nothing to handshake about; callers delete those
    /// directly instead of routing them through the unsubscribe path.
    pub async fn mark_pending_unsubscribe(&self, id: Uuid) -> Option<Subscription> {
        let mut inner = self.inner.write().await;
        let sub = inner.by_id.get_mut(&id)?;
        if !matches!(
            sub.state,
            SubscriptionState::Confirmed | SubscriptionState::PendingUnsubscribe
        ) {
            return None;
        }
        sub.state = SubscriptionState::PendingUnsubscribe;
        Some(sub.clone())
    }

    /// Delete a row whose unsubscribe handshake the remote party confirmed.
    /// Applies only while pending unsubscribe.
    pub async fn remove_pending_unsubscribe(&self, id: Uuid) -> bool {
        let mut inner = self.inner.write().await;
        match inner.by_id.get(&id) {
            Some(sub) if sub.state == SubscriptionState::PendingUnsubscribe => {
                let key = (sub.account_id, sub.callback_url.clone());
                inner.by_id.remove(&id);
                inner.by_key.remove(&key);
                true
            }
            _ => false,
        }
    }

    /// Revert a failed unsubscribe back to confirmed. A subscription is
    /// never silently dropped by a handshake that could not complete.
    pub async fn revert_to_confirmed(&self, id: Uuid) -> Option<Subscription> {
        let mut inner = self.inner.write().await;
        let sub = inner.by_id.get_mut(&id)?;
        if sub.state != SubscriptionState::PendingUnsubscribe {
            return None;
        }
        sub.state = SubscriptionState::Confirmed;
        sub.confirmed = true;
        Some(sub.clone())
    }

    /// Unconditionally delete a row.
    pub async fn remove(&self, id: Uuid) -> bool {
        let mut inner = self.inner.write().await;
        if let Some(sub) = inner.by_id.remove(&id) {
            inner.by_key.remove(&(sub.account_id, sub.callback_url));
            true
        } else {
            false
        }
    }

    /// Record a verified inbound delivery.
    pub async fn record_delivery(&self, id: Uuid) {
        let mut inner = self.inner.write().await;
        if let Some(sub) = inner.by_id.get_mut(&id) {
            sub.last_successful_delivery_at = Some(Utc::now());
        }
    }

    // -----------------------------------------------------------------------
    // Expiry sweep
    // -----------------------------------------------------------------------

    /// Remove confirmed rows whose lease passed without renewal.
    ///
    /// Runs on the worker's periodic sweep, not per-request. Pending and
    /// rejected rows are left for their own lifecycle paths.
    pub async fn expire_stale(&self) -> usize {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let stale: Vec<(Uuid, (Uuid, String))> = inner
            .by_id
            .values()
            .filter(|s| s.state == SubscriptionState::Confirmed && s.expires_at < now)
            .map(|s| (s.id, (s.account_id, s.callback_url.clone())))
            .collect();

        for (id, key) in &stale {
            inner.by_id.remove(id);
            inner.by_key.remove(key);
        }
        stale.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
