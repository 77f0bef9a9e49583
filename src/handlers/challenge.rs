//! Hub challenge responder.

use axum::extract::{Path, Query, State};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::router::SubscriberState;

/// Query parameters of a hub verification request.
#[derive(Debug, Deserialize)]
pub struct ChallengeParams {
    #[serde(rename = "hub.topic")]
    pub topic: String,
    #[serde(rename = "hub.challenge")]
    pub challenge: String,
    #[serde(rename = "hub.verify_token", default)]
    pub verify_token: Option<String>,
}

/// Answer a hub's subscription verification request.
///
/// The hub proves it reached the right callback by sending a challenge;
/// we echo it back only when a pending subscription matches the topic and
/// verify token. Anything else is 404 so probes learn nothing about
/// subscription state.
#[utoipa::path(
    get,
    path = "/subscriptions/{id}",
    tag = "Subscriptions",
    params(
        ("id" = Uuid, Path, description = "Local account (topic owner) ID"),
        ("hub.topic" = String, Query, description = "Topic URL being verified"),
        ("hub.challenge" = String, Query, description = "Challenge to echo back"),
        ("hub.verify_token" = Option<String>, Query, description = "Token from the subscription request"),
    ),
    responses(
        (status = 200, description = "Challenge echoed", body = String),
        (status = 404, description = "No matching pending subscription", body = crate::error::ErrorResponse),
    )
)]
pub async fn respond_to_challenge_handler(
    State(state): State<SubscriberState>,
    Path(account_id): Path<Uuid>,
    Query(params): Query<ChallengeParams>,
) -> ApiResult<String> {
    let echo = state
        .subscriptions
        .respond_to_challenge(
            account_id,
            &params.topic,
            params.verify_token.as_deref().unwrap_or(""),
            &params.challenge,
        )
        .await?;

    Ok(echo)
}
