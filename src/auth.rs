use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, serde::Deserialize)]
struct Claims {
    sub: String,
}

/// Resolve the calling user id from the request headers.
///
/// Accepts a bearer JWT signed with `JWT_SECRET` (the `sub` claim is the
/// user id). Outside production, an `x-user-id` header is honored when dev
/// overrides are enabled.
pub async fn require_user_id(state: &AppState, headers: &HeaderMap) -> AppResult<String> {
    if state.config.auth_dev_overrides_enabled() {
        if let Some(user_id) = header_value(headers, "x-user-id") {
            return Ok(user_id);
        }
    }

    let token = bearer_token(headers).ok_or_else(|| {
        AppError::Unauthorized("Unauthorized: missing bearer token.".to_string())
    })?;

    let secret = state.config.jwt_secret.as_deref().ok_or_else(|| {
        AppError::Dependency("JWT_SECRET is not configured.".to_string())
    })?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_aud = false;

    let data = decode::<Claims>(&token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|error| {
            tracing::debug!(error = %error, "JWT validation failed");
            AppError::Unauthorized("Unauthorized: invalid token.".to_string())
        })?;

    let user_id = data.claims.sub.trim().to_string();
    if user_id.is_empty() {
        return Err(AppError::Unauthorized(
            "Unauthorized: token has no subject.".to_string(),
        ));
    }
    Ok(user_id)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = header_value(headers, "authorization")?;
    raw.strip_prefix("Bearer ")
        .or_else(|| raw.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ToOwned::to_owned)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::bearer_token;
    use axum::http::HeaderMap;

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn rejects_missing_or_empty_token() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());
        headers.insert("authorization", "Bearer ".parse().unwrap());
        assert!(bearer_token(&headers).is_none());
    }
}
