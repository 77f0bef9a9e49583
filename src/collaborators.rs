//! External collaborator seams.
//!
//! The subscription core never reaches for ambient singletons; every
//! external dependency is injected as a trait object so the core is
//! testable in isolation. Implementations live in the surrounding
//! application (feed ingestion, interaction side-effects, blocklist
//! storage, account lookup, envelope cryptography).

use uuid::Uuid;

/// Consumes verified push payloads. Called only after signature
/// verification succeeds.
pub trait FeedProcessor: Send + Sync {
    fn process(&self, account_id: Uuid, raw_body: &[u8]);
}

/// Consumes verified Salmon interaction payloads.
pub trait InteractionProcessor: Send + Sync {
    fn process(&self, account_id: Uuid, raw_envelope: &[u8]);
}

/// Blocked-domain lookup consulted synchronously during subscribe.
pub trait DomainBlocklist: Send + Sync {
    fn is_blocked(&self, host: &str) -> bool;
}

/// Resolves a local account to the feed URL it owns as topic.
///
/// `None` means the account is not a known topic owner and subscribe
/// requests for it are rejected.
pub trait TopicResolver: Send + Sync {
    fn topic_url(&self, account_id: Uuid) -> Option<String>;
}

/// A Salmon magic envelope whose embedded signature checked out.
#[derive(Debug, Clone)]
pub struct VerifiedEnvelope {
    /// The decoded payload carried by the envelope.
    pub payload: Vec<u8>,
}

/// Validates Salmon magic envelopes.
///
/// The envelope signature is keyed to the sender's own identity, not to
/// any subscription secret, so verification is stateless per request. The
/// envelope cryptography itself lives behind this seam.
pub trait EnvelopeVerifier: Send + Sync {
    /// Returns the verified payload, or `None` if the envelope is
    /// malformed or its signature does not check out.
    fn verify(&self, raw_envelope: &[u8]) -> Option<VerifiedEnvelope>;
}
