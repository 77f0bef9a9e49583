//! HTTP router for the subscriber-facing endpoints.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::services::ingest_service::IngestService;
use crate::services::subscription_service::SubscriptionService;

/// Shared state for the subscriber HTTP surface.
#[derive(Clone)]
pub struct SubscriberState {
    pub subscriptions: Arc<SubscriptionService>,
    pub ingest: Arc<IngestService>,
}

impl SubscriberState {
    pub fn new(subscriptions: Arc<SubscriptionService>, ingest: Arc<IngestService>) -> Self {
        Self {
            subscriptions,
            ingest,
        }
    }
}

/// Build the subscriber router.
///
/// `/subscriptions/:id` doubles as the PuSH callback for the account with
/// that ID: hubs GET it to verify subscription intents and POST signed
/// content to it. `/salmon/:id` receives signed remote interactions.
pub fn subscriber_router(state: SubscriberState) -> Router {
    Router::new()
        .route(
            "/subscriptions/:id",
            get(crate::handlers::challenge::respond_to_challenge_handler)
                .post(crate::handlers::push::receive_push_handler),
        )
        .route(
            "/salmon/:id",
            post(crate::handlers::salmon::receive_salmon_handler),
        )
        .with_state(state)
}
