use axum::{extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    services::billing_sync::{self, WebhookOutcome},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/webhooks/stripe", axum::routing::post(stripe_webhook))
}

/// Inbound payment-processor events. Signature failures are a hard 400;
/// everything past the ledger gate is acknowledged, including dispatch
/// failures (the processor must not retry business-logic errors forever).
async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> AppResult<Json<Value>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            AppError::BadRequest("Missing stripe-signature header.".to_string())
        })?;

    match billing_sync::ingest_webhook(&state, &body, signature).await? {
        WebhookOutcome::Applied | WebhookOutcome::Skipped => {}
        WebhookOutcome::Failed(reason) => {
            // Already logged inside the reconciler; keep the ack observable.
            tracing::warn!(%reason, "webhook acknowledged with failed dispatch");
        }
    }
    Ok(Json(json!({ "received": true })))
}
