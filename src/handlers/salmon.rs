//! Salmon slap handler.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::models::SalmonOutcome;
use crate::router::SubscriberState;

/// Receive a Salmon slap (signed remote interaction) for a local account.
///
/// The envelope authenticates itself; no subscription needs to exist. A
/// slap that fails verification is answered 202 and dropped, mirroring
/// the push path's policy of not disclosing verification outcomes.
#[utoipa::path(
    post,
    path = "/salmon/{id}",
    tag = "Salmon",
    params(
        ("id" = Uuid, Path, description = "Local recipient account ID")
    ),
    responses(
        (status = 201, description = "Slap verified and handed to the interaction processor"),
        (status = 202, description = "Slap accepted but not processed"),
    )
)]
pub async fn receive_salmon_handler(
    State(state): State<SubscriberState>,
    Path(account_id): Path<Uuid>,
    body: Bytes,
) -> StatusCode {
    match state.ingest.handle_salmon(account_id, &body) {
        SalmonOutcome::Accepted => StatusCode::CREATED,
        SalmonOutcome::Rejected => StatusCode::ACCEPTED,
    }
}
