//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;
use wiremock::{Request, Respond, ResponseTemplate};

use fedisub::collaborators::{
    DomainBlocklist, EnvelopeVerifier, FeedProcessor, InteractionProcessor, TopicResolver,
    VerifiedEnvelope,
};
use fedisub::queue::ConfirmationQueue;
use fedisub::services::confirmation_service::{ConfirmationConfig, ConfirmationService};
use fedisub::services::ingest_service::IngestService;
use fedisub::services::subscription_service::SubscriptionService;
use fedisub::store::SubscriptionStore;
use fedisub::worker::{ConfirmationWorker, ShutdownHandle, WorkerConfig};
use fedisub::{Subscription, SubscriptionState};

// ---------------------------------------------------------------------------
// Collaborator doubles
// ---------------------------------------------------------------------------

/// Topic resolver backed by a fixed map.
pub struct StaticTopics {
    topics: HashMap<Uuid, String>,
}

impl StaticTopics {
    pub fn single(account_id: Uuid, topic_url: &str) -> Self {
        let mut topics = HashMap::new();
        topics.insert(account_id, topic_url.to_string());
        Self { topics }
    }

    pub fn empty() -> Self {
        Self {
            topics: HashMap::new(),
        }
    }
}

impl TopicResolver for StaticTopics {
    fn topic_url(&self, account_id: Uuid) -> Option<String> {
        self.topics.get(&account_id).cloned()
    }
}

/// Blocklist backed by a fixed host set.
pub struct StaticBlocklist {
    hosts: HashSet<String>,
}

impl StaticBlocklist {
    pub fn empty() -> Self {
        Self {
            hosts: HashSet::new(),
        }
    }

    pub fn blocking(hosts: &[&str]) -> Self {
        Self {
            hosts: hosts.iter().map(|h| h.to_string()).collect(),
        }
    }
}

impl DomainBlocklist for StaticBlocklist {
    fn is_blocked(&self, host: &str) -> bool {
        self.hosts.contains(host)
    }
}

/// Feed processor that records every payload it receives.
#[derive(Default)]
pub struct SpyFeedProcessor {
    received: Mutex<Vec<(Uuid, Vec<u8>)>>,
}

impl SpyFeedProcessor {
    pub fn received(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.received.lock().unwrap().clone()
    }
}

impl FeedProcessor for SpyFeedProcessor {
    fn process(&self, account_id: Uuid, raw_body: &[u8]) {
        self.received
            .lock()
            .unwrap()
            .push((account_id, raw_body.to_vec()));
    }
}

/// Interaction processor that records every payload it receives.
#[derive(Default)]
pub struct SpyInteractionProcessor {
    received: Mutex<Vec<(Uuid, Vec<u8>)>>,
}

impl SpyInteractionProcessor {
    pub fn received(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.received.lock().unwrap().clone()
    }
}

impl InteractionProcessor for SpyInteractionProcessor {
    fn process(&self, account_id: Uuid, payload: &[u8]) {
        self.received
            .lock()
            .unwrap()
            .push((account_id, payload.to_vec()));
    }
}

/// Envelope verifier accepting bodies prefixed with `valid:`; the payload
/// is everything after the prefix.
pub struct PrefixEnvelopeVerifier;

impl EnvelopeVerifier for PrefixEnvelopeVerifier {
    fn verify(&self, raw_envelope: &[u8]) -> Option<VerifiedEnvelope> {
        let payload = raw_envelope.strip_prefix(b"valid:")?;
        Some(VerifiedEnvelope {
            payload: payload.to_vec(),
        })
    }
}

// ---------------------------------------------------------------------------
// Wiremock responders
// ---------------------------------------------------------------------------

fn query_params(request: &Request) -> HashMap<String, String> {
    request
        .url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Responds like a well-behaved remote callback: echoes `hub.challenge`
/// with a 200, and captures the query of every request it sees.
pub struct EchoChallengeResponder {
    captured: Arc<Mutex<Vec<HashMap<String, String>>>>,
    delay: Option<Duration>,
}

impl EchoChallengeResponder {
    pub fn new() -> Self {
        Self {
            captured: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Delay each response, for tests that need to act mid-handshake.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn captured(&self) -> Arc<Mutex<Vec<HashMap<String, String>>>> {
        self.captured.clone()
    }
}

impl Respond for EchoChallengeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let params = query_params(request);
        let challenge = params.get("hub.challenge").cloned().unwrap_or_default();
        self.captured.lock().unwrap().push(params);
        let mut template = ResponseTemplate::new(200).set_body_string(challenge);
        if let Some(delay) = self.delay {
            template = template.set_delay(delay);
        }
        template
    }
}

/// Fails with 500 for the first `failures` requests, then echoes the
/// challenge. Counts every attempt.
pub struct FlakyChallengeResponder {
    failures: u32,
    attempts: Arc<AtomicU32>,
}

impl FlakyChallengeResponder {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn attempts(&self) -> Arc<AtomicU32> {
        self.attempts.clone()
    }
}

impl Respond for FlakyChallengeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            ResponseTemplate::new(500)
        } else {
            let params = query_params(request);
            let challenge = params.get("hub.challenge").cloned().unwrap_or_default();
            ResponseTemplate::new(200).set_body_string(challenge)
        }
    }
}

/// Always fails with the given status, counting attempts.
pub struct FailingResponder {
    status: u16,
    attempts: Arc<AtomicU32>,
}

impl FailingResponder {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn attempts(&self) -> Arc<AtomicU32> {
        self.attempts.clone()
    }
}

impl Respond for FailingResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        ResponseTemplate::new(self.status)
    }
}

/// Answers 200 but never echoes the challenge correctly.
pub struct WrongEchoResponder {
    attempts: Arc<AtomicU32>,
}

impl WrongEchoResponder {
    pub fn new() -> Self {
        Self {
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn attempts(&self) -> Arc<AtomicU32> {
        self.attempts.clone()
    }
}

impl Respond for WrongEchoResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        ResponseTemplate::new(200).set_body_string("not-the-challenge")
    }
}

// ---------------------------------------------------------------------------
// Stack assembly
// ---------------------------------------------------------------------------

/// Fully wired subscriber stack with a running confirmation worker.
pub struct TestStack {
    pub store: Arc<SubscriptionStore>,
    pub queue: Arc<ConfirmationQueue>,
    pub subscriptions: Arc<SubscriptionService>,
    pub ingest: Arc<IngestService>,
    pub feed: Arc<SpyFeedProcessor>,
    pub interactions: Arc<SpyInteractionProcessor>,
    pub shutdown: ShutdownHandle,
}

/// Retry config fast enough for tests: millisecond backoffs, short
/// per-attempt timeout, default attempt budget.
pub fn fast_confirmation_config() -> ConfirmationConfig {
    ConfirmationConfig {
        max_attempts: 5,
        base_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(50),
        attempt_timeout: Duration::from_secs(2),
    }
}

/// Wire the full stack around the given topic resolver and spawn the
/// confirmation worker on the current runtime.
pub fn spawn_stack(topics: StaticTopics, config: ConfirmationConfig) -> TestStack {
    let store = Arc::new(SubscriptionStore::new());
    let (queue, rx) = ConfirmationQueue::new();
    let queue = Arc::new(queue);

    let subscriptions = Arc::new(
        SubscriptionService::new(
            store.clone(),
            queue.clone(),
            Arc::new(topics),
            Arc::new(StaticBlocklist::empty()),
        )
        .with_allow_internal_callbacks(true),
    );

    let feed = Arc::new(SpyFeedProcessor::default());
    let interactions = Arc::new(SpyInteractionProcessor::default());
    let ingest = Arc::new(IngestService::new(
        store.clone(),
        feed.clone(),
        interactions.clone(),
        Arc::new(PrefixEnvelopeVerifier),
    ));

    let confirmations =
        Arc::new(ConfirmationService::new(store.clone(), config).expect("build http client"));
    let worker = ConfirmationWorker::new(
        rx,
        confirmations,
        queue.clone(),
        store.clone(),
        WorkerConfig {
            sweep_interval: Duration::from_secs(3600),
        },
    );
    let shutdown = worker.shutdown_handle();
    tokio::spawn(worker.run());

    TestStack {
        store,
        queue,
        subscriptions,
        ingest,
        feed,
        interactions,
        shutdown,
    }
}

/// Poll the store until the subscription reaches the wanted state or the
/// deadline passes.
pub async fn wait_for_state(
    store: &SubscriptionStore,
    id: Uuid,
    wanted: SubscriptionState,
) -> Subscription {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(sub) = store.find_by_id(id).await {
            if sub.state == wanted {
                return sub;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "subscription {id} never reached state {wanted:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll the store until the subscription row disappears.
pub async fn wait_for_removal(store: &SubscriptionStore, id: Uuid) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while store.find_by_id(id).await.is_some() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "subscription {id} was never removed"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll until the confirmation queue has no pending jobs.
pub async fn wait_for_queue_drain(queue: &ConfirmationQueue) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while queue.pending_len() > 0 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "confirmation queue never drained"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Signature header value for a push body, as a hub would compute it.
pub fn signature_header(secret: &str, body: &[u8]) -> String {
    format!("sha256={}", fedisub::crypto::sign(secret, body))
}
