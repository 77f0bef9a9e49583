//! Inbound payload ingestion: push notifications and Salmon slaps.
//!
//! Both paths share one discipline: verify before processing. Raw bytes
//! reach the external processors only after their signature checks out,
//! so unauthenticated input never touches a parser.

use std::sync::Arc;

use uuid::Uuid;

use crate::collaborators::{EnvelopeVerifier, FeedProcessor, InteractionProcessor};
use crate::crypto;
use crate::models::{PushOutcome, SalmonOutcome, SubscriptionState};
use crate::store::SubscriptionStore;

/// Handles inbound pushes and Salmon slaps.
pub struct IngestService {
    store: Arc<SubscriptionStore>,
    feed: Arc<dyn FeedProcessor>,
    interactions: Arc<dyn InteractionProcessor>,
    envelopes: Arc<dyn EnvelopeVerifier>,
}

impl IngestService {
    pub fn new(
        store: Arc<SubscriptionStore>,
        feed: Arc<dyn FeedProcessor>,
        interactions: Arc<dyn InteractionProcessor>,
        envelopes: Arc<dyn EnvelopeVerifier>,
    ) -> Self {
        Self {
            store,
            feed,
            interactions,
            envelopes,
        }
    }

    /// Handle an inbound push addressed to a local topic owner.
    ///
    /// The signature covers the exact raw body bytes; verification runs
    /// against every confirmed subscription for the account (each with a
    /// constant-time comparison). A payload that verifies is recorded and
    /// handed to the feed processor; anything else is dropped unprocessed.
    pub async fn handle_push(
        &self,
        account_id: Uuid,
        raw_body: &[u8],
        signature_header: Option<&str>,
    ) -> PushOutcome {
        let Some(signature) = signature_header else {
            tracing::warn!(
                target: "push_ingest",
                account_id = %account_id,
                "Push rejected: missing signature header"
            );
            return PushOutcome::Unverified;
        };

        let subscriptions = self.store.find_by_account(account_id).await;
        let verified = subscriptions.iter().find(|sub| {
            sub.state == SubscriptionState::Confirmed
                && crypto::verify_signature_header(&sub.secret, raw_body, signature)
        });

        match verified {
            Some(sub) => {
                self.store.record_delivery(sub.id).await;
                tracing::debug!(
                    target: "push_ingest",
                    account_id = %account_id,
                    subscription_id = %sub.id,
                    bytes = raw_body.len(),
                    "Verified push handed to feed processor"
                );
                self.feed.process(account_id, raw_body);
                PushOutcome::Accepted
            }
            None => {
                tracing::warn!(
                    target: "push_ingest",
                    account_id = %account_id,
                    candidate_subscriptions = subscriptions.len(),
                    "Push rejected: signature did not verify against any confirmed subscription"
                );
                PushOutcome::Unverified
            }
        }
    }

    /// Handle an inbound Salmon slap.
    ///
    /// The envelope carries its own signature keyed to the sender's
    /// identity, so this path is stateless with respect to subscriptions;
    /// envelope validation is delegated to the injected verifier.
    pub fn handle_salmon(&self, account_id: Uuid, raw_envelope: &[u8]) -> SalmonOutcome {
        match self.envelopes.verify(raw_envelope) {
            Some(envelope) => {
                tracing::debug!(
                    target: "push_ingest",
                    account_id = %account_id,
                    bytes = envelope.payload.len(),
                    "Verified Salmon slap handed to interaction processor"
                );
                self.interactions.process(account_id, &envelope.payload);
                SalmonOutcome::Accepted
            }
            None => {
                tracing::warn!(
                    target: "push_ingest",
                    account_id = %account_id,
                    "Salmon slap rejected: envelope did not verify"
                );
                SalmonOutcome::Rejected
            }
        }
    }
}
