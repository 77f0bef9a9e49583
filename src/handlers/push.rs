//! Inbound push handler.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use uuid::Uuid;

use crate::models::PushOutcome;
use crate::router::SubscriberState;

/// Receive a signed push notification for a local topic owner.
///
/// The signature header covers the raw body bytes. An unverified push is
/// answered 202 without processing: the body never reaches the feed
/// pipeline, and the response does not tell a misbehaving sender whether
/// verification failed.
#[utoipa::path(
    post,
    path = "/subscriptions/{id}",
    tag = "Subscriptions",
    params(
        ("id" = Uuid, Path, description = "Local account (topic owner) ID")
    ),
    responses(
        (status = 201, description = "Push verified and handed to the feed processor"),
        (status = 202, description = "Push accepted but not processed"),
    )
)]
pub async fn receive_push_handler(
    State(state): State<SubscriberState>,
    Path(account_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let signature = headers
        .get("x-hub-signature")
        .and_then(|v| v.to_str().ok());

    match state.ingest.handle_push(account_id, &body, signature).await {
        PushOutcome::Accepted => StatusCode::CREATED,
        PushOutcome::Unverified => StatusCode::ACCEPTED,
    }
}
