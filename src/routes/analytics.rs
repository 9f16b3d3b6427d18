use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};

use crate::{
    auth::require_user_id,
    error::{AppError, AppResult},
    schemas::AnalyticsQuery,
    services::analytics::{self, AnalyticsReport, MAX_MONTHS},
    state::AppState,
    tenancy::assert_org_member,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/analytics", axum::routing::get(organization_analytics))
}

/// Aggregated portfolio analytics over the trailing N calendar months.
async fn organization_analytics(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<AnalyticsReport>> {
    let user_id = require_user_id(&state, &headers).await?;
    assert_org_member(&state, &user_id, &query.org_id).await?;

    if query.months < 1 || query.months > MAX_MONTHS {
        return Err(AppError::BadRequest(format!(
            "months must be between 1 and {MAX_MONTHS}."
        )));
    }

    let report = analytics::organization_analytics(&state, &query.org_id, query.months).await?;
    Ok(Json(report))
}
