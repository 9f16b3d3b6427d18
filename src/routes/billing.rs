use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use crate::{
    auth::require_user_id,
    error::AppResult,
    repository::billing as billing_repo,
    schemas::{validate_input, BillingOrgQuery, CreateCheckoutInput, CreatePortalInput},
    services::billing_sync,
    state::AppState,
    tenancy::{assert_org_member, assert_org_role},
};

const BILLING_ROLES: &[&str] = &["org_admin"];

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/billing/plans", axum::routing::get(list_plans))
        .route(
            "/billing/subscription",
            axum::routing::get(current_subscription),
        )
        .route("/billing/checkout", axum::routing::post(create_checkout))
        .route("/billing/portal", axum::routing::post(create_portal))
}

/// Static plan catalog (public-safe fields, no auth).
async fn list_plans(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "data": state.plans.all() }))
}

/// Current billing state for an org, enriched with plan caps and usage.
async fn current_subscription(
    State(state): State<AppState>,
    Query(query): Query<BillingOrgQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    assert_org_member(&state, &user_id, &query.org_id).await?;
    let pool = state.db_pool()?;

    let billing = billing_repo::org_billing(pool, &query.org_id).await?;
    let plan = state.plans.get(billing.plan);
    let units = billing_repo::count_units(pool, &query.org_id).await?;
    let seats = billing_repo::count_seats(pool, &query.org_id).await?;

    Ok(Json(json!({
        "subscription": {
            "plan": billing.plan,
            "plan_status": billing.plan_status,
            "stripe_subscription_id": billing.stripe_subscription_id,
            "trial_ends_at": billing.trial_ends_at,
            "current_period_start": billing.current_period_start,
            "current_period_end": billing.current_period_end,
            "cancel_at_period_end": billing.cancel_at_period_end,
        },
        "plan": plan,
        "usage": {
            "units": units,
            "seats": seats,
        }
    })))
}

/// Start a subscription checkout; returns the hosted redirect URL.
async fn create_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateCheckoutInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    let user_id = require_user_id(&state, &headers).await?;
    assert_org_role(&state, &user_id, &payload.org_id, BILLING_ROLES).await?;

    let url = billing_sync::create_checkout(
        &state,
        &payload.org_id,
        &payload.plan,
        &payload.interval,
    )
    .await?;
    Ok(Json(json!({ "url": url })))
}

/// Open the hosted billing-management portal.
async fn create_portal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePortalInput>,
) -> AppResult<Json<Value>> {
    validate_input(&payload)?;
    let user_id = require_user_id(&state, &headers).await?;
    assert_org_role(&state, &user_id, &payload.org_id, BILLING_ROLES).await?;

    let url = billing_sync::create_portal(&state, &payload.org_id).await?;
    Ok(Json(json!({ "url": url })))
}
