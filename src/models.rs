//! Domain model for the subscription lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Minimum accepted lease duration (5 minutes).
pub const MIN_LEASE_SECONDS: u32 = 300;

/// Default lease duration when the caller does not request one (7 days).
pub const DEFAULT_LEASE_SECONDS: u32 = 7 * 86_400;

/// Protocol ceiling for lease duration (30 days).
pub const MAX_LEASE_SECONDS: u32 = 30 * 86_400;

/// Clamp a requested lease into the protocol bounds.
pub fn clamp_lease(requested: Option<u32>) -> u32 {
    match requested {
        Some(secs) => secs.clamp(MIN_LEASE_SECONDS, MAX_LEASE_SECONDS),
        None => DEFAULT_LEASE_SECONDS,
    }
}

// ---------------------------------------------------------------------------
// Subscription entity
// ---------------------------------------------------------------------------

/// Protocol state of a subscription.
///
/// Removal is modeled as deletion from the store: a removed subscription
/// has no row, so the live states are the four below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    PendingSubscribe,
    Confirmed,
    PendingUnsubscribe,
    Rejected,
}

impl SubscriptionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionState::PendingSubscribe => "pending_subscribe",
            SubscriptionState::Confirmed => "confirmed",
            SubscriptionState::PendingUnsubscribe => "pending_unsubscribe",
            SubscriptionState::Rejected => "rejected",
        }
    }
}

/// One (local account, remote callback) subscription pair.
///
/// At most one live row exists per `(account_id, callback_url)`;
/// re-subscribing updates the existing row. All mutation goes through
/// [`crate::store::SubscriptionStore`] so the lifecycle invariants hold
/// under concurrent access from the request path and the worker path.
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    /// Local account whose feed is being watched.
    pub account_id: Uuid,
    /// Remote subscriber's receive endpoint.
    pub callback_url: String,
    /// Feed URL of the watched topic, resolved at subscribe time.
    pub topic_url: String,
    /// Shared secret; doubles as the handshake verify token.
    pub secret: String,
    pub lease_seconds: u32,
    pub expires_at: DateTime<Utc>,
    pub confirmed: bool,
    pub state: SubscriptionState,
    pub created_at: DateTime<Utc>,
    pub renewed_at: Option<DateTime<Utc>>,
    pub last_successful_delivery_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Worker payload
// ---------------------------------------------------------------------------

/// What a confirmation job is asking the remote party to verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Subscribe,
    Unsubscribe,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Subscribe => "subscribe",
            Intent::Unsubscribe => "unsubscribe",
        }
    }
}

/// Payload handed to the confirmation worker.
///
/// `secret` and `lease_seconds` are present for subscribe intents; an
/// unsubscribe handshake uses the values already stored on the row.
#[derive(Debug, Clone)]
pub struct ConfirmationJob {
    pub subscription_id: Uuid,
    pub intent: Intent,
    pub secret: Option<String>,
    pub lease_seconds: Option<u32>,
}

// ---------------------------------------------------------------------------
// Service results
// ---------------------------------------------------------------------------

/// Accepted-pending result returned by the subscribe/unsubscribe services.
///
/// The services never perform the network handshake themselves; the state
/// reported here is the state at enqueue time.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PendingConfirmation {
    pub subscription_id: Uuid,
    pub state: SubscriptionState,
}

/// Outcome of an unsubscribe request.
#[derive(Debug, Clone)]
pub enum UnsubscribeOutcome {
    /// A confirmed subscription exists; removal is pending worker
    /// confirmation.
    Pending(PendingConfirmation),
    /// The row was never confirmed by a handshake and was deleted
    /// immediately, with no remote round-trip.
    Removed,
    /// No matching subscription; idempotent no-op success.
    NotSubscribed,
}

/// Outcome of an inbound push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Signature verified; payload handed to the feed processor.
    Accepted,
    /// Signature missing or invalid; payload was not processed.
    Unverified,
}

/// Outcome of an inbound Salmon slap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalmonOutcome {
    /// Envelope verified; payload handed to the interaction processor.
    Accepted,
    /// Envelope invalid; payload was not processed.
    Rejected,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
