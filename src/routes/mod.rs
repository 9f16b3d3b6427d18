use axum::{routing::get, Router};

use crate::state::AppState;

pub mod analytics;
pub mod billing;
pub mod health;
pub mod webhooks;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(analytics::router())
        .merge(billing::router())
        .merge(webhooks::router())
}
