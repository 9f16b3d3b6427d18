#![allow(dead_code)]

use sqlx::PgPool;

use crate::error::{map_db_error, AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrgMembership {
    pub organization_id: String,
    pub user_id: String,
    pub role: String,
}

pub async fn get_org_membership(
    state: &AppState,
    user_id: &str,
    org_id: &str,
) -> AppResult<Option<OrgMembership>> {
    let pool: &PgPool = state.db_pool()?;
    sqlx::query_as::<_, OrgMembership>(
        "SELECT organization_id::text AS organization_id, user_id::text AS user_id,
                role::text AS role
         FROM organization_members
         WHERE organization_id = $1::uuid AND user_id = $2::uuid
         LIMIT 1",
    )
    .bind(org_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)
}

pub async fn assert_org_member(
    state: &AppState,
    user_id: &str,
    org_id: &str,
) -> AppResult<OrgMembership> {
    get_org_membership(state, user_id, org_id)
        .await?
        .ok_or_else(|| {
            AppError::Forbidden("Forbidden: not a member of this organization.".to_string())
        })
}

pub async fn assert_org_role(
    state: &AppState,
    user_id: &str,
    org_id: &str,
    allowed_roles: &[&str],
) -> AppResult<OrgMembership> {
    let membership = assert_org_member(state, user_id, org_id).await?;
    if allowed_roles.contains(&membership.role.as_str()) {
        return Ok(membership);
    }

    Err(AppError::Forbidden(format!(
        "Forbidden: role '{}' is not allowed for this action.",
        membership.role
    )))
}
