//! Subscriber-side PuSH (PubSubHubbub) federation core.
//!
//! Implements the subscriber half of the PuSH protocol plus Salmon slap
//! ingestion: managing subscriptions to remote topic feeds, answering hub
//! verification challenges, verifying HMAC-signed push notifications, and
//! accepting signed remote interactions.
//!
//! # Architecture
//!
//! - **Services** ([`SubscriptionService`], [`IngestService`]) hold the
//!   protocol logic and return immediately; no network I/O happens on the
//!   request path.
//! - **Confirmation** of subscribe/unsubscribe intents is asynchronous:
//!   services enqueue jobs on the [`ConfirmationQueue`] and the
//!   [`ConfirmationWorker`] drives the challenge handshake with retries
//!   and backoff via the [`ConfirmationService`].
//! - **Collaborators** (feed processing, interaction processing, envelope
//!   verification, topic resolution, domain blocking) are injected trait
//!   objects; this crate owns the protocol, not the application around it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fedisub::collaborators::{
//!     DomainBlocklist, EnvelopeVerifier, FeedProcessor, InteractionProcessor, TopicResolver,
//! };
//! use fedisub::queue::ConfirmationQueue;
//! use fedisub::services::confirmation_service::{ConfirmationConfig, ConfirmationService};
//! use fedisub::services::ingest_service::IngestService;
//! use fedisub::services::subscription_service::SubscriptionService;
//! use fedisub::store::SubscriptionStore;
//! use fedisub::worker::{ConfirmationWorker, WorkerConfig};
//!
//! # async fn wire(
//! #     topics: Arc<dyn TopicResolver>,
//! #     blocklist: Arc<dyn DomainBlocklist>,
//! #     feed: Arc<dyn FeedProcessor>,
//! #     interactions: Arc<dyn InteractionProcessor>,
//! #     envelopes: Arc<dyn EnvelopeVerifier>,
//! # ) -> Result<(), fedisub::error::SubscriptionError> {
//! let store = Arc::new(SubscriptionStore::new());
//! let (queue, rx) = ConfirmationQueue::new();
//! let queue = Arc::new(queue);
//!
//! let subscriptions = Arc::new(SubscriptionService::new(
//!     store.clone(),
//!     queue.clone(),
//!     topics,
//!     blocklist,
//! ));
//! let ingest = Arc::new(IngestService::new(store.clone(), feed, interactions, envelopes));
//!
//! let confirmations = Arc::new(ConfirmationService::new(
//!     store.clone(),
//!     ConfirmationConfig::default(),
//! )?);
//! let worker = ConfirmationWorker::new(
//!     rx,
//!     confirmations,
//!     queue,
//!     store,
//!     WorkerConfig::default(),
//! );
//! tokio::spawn(worker.run());
//!
//! let state = fedisub::router::SubscriberState::new(subscriptions, ingest);
//! let app = fedisub::router::subscriber_router(state);
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

pub mod collaborators;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod models;
pub mod queue;
pub mod router;
pub mod services;
pub mod store;
pub mod validation;
pub mod worker;

pub use collaborators::{
    DomainBlocklist, EnvelopeVerifier, FeedProcessor, InteractionProcessor, TopicResolver,
    VerifiedEnvelope,
};
pub use error::{ApiResult, SubscriptionError};
pub use models::{
    ConfirmationJob, Intent, PendingConfirmation, PushOutcome, SalmonOutcome, Subscription,
    SubscriptionState, UnsubscribeOutcome,
};
pub use queue::ConfirmationQueue;
pub use router::{subscriber_router, SubscriberState};
pub use services::confirmation_service::{ConfirmationConfig, ConfirmationService};
pub use services::ingest_service::IngestService;
pub use services::subscription_service::SubscriptionService;
pub use store::SubscriptionStore;
pub use worker::{ConfirmationWorker, ShutdownHandle, WorkerConfig};
