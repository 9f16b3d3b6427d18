use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::Value;
use sha2::Sha256;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// The subscription fields the reconciler cares about, extracted from a
/// processor subscription object (webhook payload or API fetch).
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionSnapshot {
    pub id: String,
    pub status: String,
    pub customer_id: String,
    pub price_id: String,
    pub organization_id: Option<String>,
    pub trial_end: Option<DateTime<Utc>>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}

impl SubscriptionSnapshot {
    pub fn from_object(object: &Value) -> Option<Self> {
        let id = str_field(object, "id")?;
        Some(Self {
            id,
            status: str_field(object, "status").unwrap_or_default(),
            customer_id: str_field(object, "customer").unwrap_or_default(),
            price_id: object
                .pointer("/items/data/0/price/id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            organization_id: object
                .pointer("/metadata/organization_id")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned),
            trial_end: unix_field(object, "trial_end"),
            current_period_start: unix_field(object, "current_period_start"),
            current_period_end: unix_field(object, "current_period_end"),
            cancel_at_period_end: object
                .get("cancel_at_period_end")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Create a processor-side customer for an organization.
pub async fn create_customer(
    client: &Client,
    config: &AppConfig,
    org_id: &str,
    org_name: &str,
) -> AppResult<String> {
    let body = post_form(
        client,
        config,
        "customers",
        &[
            ("name", org_name),
            ("metadata[organization_id]", org_id),
        ],
    )
    .await?;

    str_field(&body, "id")
        .ok_or_else(|| AppError::Dependency("Stripe customer response had no id.".to_string()))
}

/// Create a hosted checkout session for a subscription with a trial.
/// The organization id rides along as correlation metadata on both the
/// session and the subscription it creates.
pub async fn create_subscription_checkout(
    client: &Client,
    config: &AppConfig,
    customer_id: &str,
    price_id: &str,
    org_id: &str,
) -> AppResult<CheckoutSession> {
    let success_url = format!(
        "{}/settings/billing?status=success",
        config.app_public_url
    );
    let cancel_url = format!(
        "{}/settings/billing?status=cancelled",
        config.app_public_url
    );
    let trial_days = config.stripe_trial_days.to_string();

    let body = post_form(
        client,
        config,
        "checkout/sessions",
        &[
            ("mode", "subscription"),
            ("customer", customer_id),
            ("line_items[0][price]", price_id),
            ("line_items[0][quantity]", "1"),
            ("subscription_data[trial_period_days]", &trial_days),
            ("subscription_data[metadata][organization_id]", org_id),
            ("metadata[organization_id]", org_id),
            ("success_url", &success_url),
            ("cancel_url", &cancel_url),
        ],
    )
    .await?;

    let id = str_field(&body, "id").unwrap_or_default();
    let url = str_field(&body, "url").ok_or_else(|| {
        AppError::Dependency("Stripe checkout session had no redirect URL.".to_string())
    })?;
    Ok(CheckoutSession { id, url })
}

/// Create a hosted billing-portal session for subscription self-management.
pub async fn create_portal_session(
    client: &Client,
    config: &AppConfig,
    customer_id: &str,
) -> AppResult<String> {
    let return_url = format!("{}/settings/billing", config.app_public_url);

    let body = post_form(
        client,
        config,
        "billing_portal/sessions",
        &[("customer", customer_id), ("return_url", &return_url)],
    )
    .await?;

    str_field(&body, "url").ok_or_else(|| {
        AppError::Dependency("Stripe portal session had no redirect URL.".to_string())
    })
}

/// Fetch the current state of a subscription from the processor.
pub async fn get_subscription(
    client: &Client,
    config: &AppConfig,
    subscription_id: &str,
) -> AppResult<SubscriptionSnapshot> {
    let secret_key = secret_key(config)?;
    let response = client
        .get(format!("{STRIPE_API_BASE}/subscriptions/{subscription_id}"))
        .basic_auth(secret_key, None::<&str>)
        .send()
        .await
        .map_err(|error| {
            tracing::error!(error = %error, "Stripe API request failed");
            AppError::Dependency("Stripe API request failed.".to_string())
        })?;

    let body = read_response(response).await?;
    SubscriptionSnapshot::from_object(&body).ok_or_else(|| {
        AppError::Dependency("Stripe subscription response was malformed.".to_string())
    })
}

/// Verify a webhook signature using HMAC-SHA256.
///
/// Parses the `stripe-signature` header (`t=<timestamp>,v1=<signature>`),
/// signs `<timestamp>.<body>` with the webhook secret, and compares in
/// constant time. Signatures older than 5 minutes are rejected.
pub fn verify_signature(payload: &str, signature_header: &str, secret: &str) -> AppResult<()> {
    verify_signature_at(payload, signature_header, secret, Utc::now().timestamp())
}

fn verify_signature_at(
    payload: &str,
    signature_header: &str,
    secret: &str,
    now: i64,
) -> AppResult<()> {
    const TOLERANCE_SECS: i64 = 300;

    let mut timestamp: Option<&str> = None;
    let mut signature: Option<&str> = None;
    for part in signature_header.split(',') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix("t=") {
            timestamp = Some(value);
        } else if let Some(value) = part.strip_prefix("v1=") {
            signature = Some(value);
        }
    }

    let (Some(ts_raw), Some(expected_hex)) = (timestamp, signature) else {
        return Err(AppError::BadRequest(
            "Malformed webhook signature header.".to_string(),
        ));
    };
    let Ok(ts) = ts_raw.parse::<i64>() else {
        return Err(AppError::BadRequest(
            "Malformed webhook signature timestamp.".to_string(),
        ));
    };

    if (now - ts).abs() > TOLERANCE_SECS {
        tracing::warn!(delta = (now - ts).abs(), "stale webhook signature");
        return Err(AppError::BadRequest(
            "Webhook signature is too old.".to_string(),
        ));
    }

    let signed_payload = format!("{ts_raw}.{payload}");
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return Err(AppError::BadRequest(
            "Webhook signature verification failed.".to_string(),
        ));
    };
    mac.update(signed_payload.as_bytes());

    let expected = hex_decode(expected_hex).map_err(|()| {
        AppError::BadRequest("Malformed webhook signature encoding.".to_string())
    })?;

    mac.verify_slice(&expected).map_err(|_| {
        AppError::BadRequest("Webhook signature verification failed.".to_string())
    })
}

fn secret_key(config: &AppConfig) -> AppResult<&str> {
    config
        .stripe_secret_key
        .as_deref()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| AppError::Dependency("STRIPE_SECRET_KEY not configured.".to_string()))
}

async fn post_form(
    client: &Client,
    config: &AppConfig,
    path: &str,
    form: &[(&str, &str)],
) -> AppResult<Value> {
    let secret_key = secret_key(config)?;
    let response = client
        .post(format!("{STRIPE_API_BASE}/{path}"))
        .basic_auth(secret_key, None::<&str>)
        .form(form)
        .send()
        .await
        .map_err(|error| {
            tracing::error!(error = %error, path, "Stripe API request failed");
            AppError::Dependency("Stripe API request failed.".to_string())
        })?;

    read_response(response).await
}

async fn read_response(response: reqwest::Response) -> AppResult<Value> {
    let status = response.status();
    let body: Value = response.json().await.unwrap_or_else(|_| {
        serde_json::json!({ "error": { "message": "failed to parse response" } })
    });

    if status.is_success() {
        return Ok(body);
    }
    let message = body
        .pointer("/error/message")
        .and_then(Value::as_str)
        .unwrap_or("Unknown Stripe error");
    Err(AppError::Dependency(format!(
        "Stripe API error ({status}): {message}"
    )))
}

fn str_field(object: &Value, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn unix_field(object: &Value, key: &str) -> Option<DateTime<Utc>> {
    object
        .get(key)
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

fn hex_decode(hex: &str) -> Result<Vec<u8>, ()> {
    if hex.len() % 2 != 0 {
        return Err(());
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{verify_signature_at, SubscriptionSnapshot};
    use hmac::{Hmac, Mac};
    use serde_json::json;
    use sha2::Sha256;

    fn sign(payload: &str, secret: &str, ts: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{ts}.{payload}").as_bytes());
        let digest = mac.finalize().into_bytes();
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        format!("t={ts},v1={hex}")
    }

    #[test]
    fn accepts_valid_signature() {
        let payload = r#"{"id":"evt_1"}"#;
        let header = sign(payload, "whsec_test", 1_700_000_000);
        assert!(verify_signature_at(payload, &header, "whsec_test", 1_700_000_060).is_ok());
    }

    #[test]
    fn rejects_tampered_payload() {
        let header = sign(r#"{"id":"evt_1"}"#, "whsec_test", 1_700_000_000);
        let result =
            verify_signature_at(r#"{"id":"evt_2"}"#, &header, "whsec_test", 1_700_000_060);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_wrong_secret_and_stale_timestamp() {
        let payload = r#"{"id":"evt_1"}"#;
        let header = sign(payload, "whsec_test", 1_700_000_000);
        assert!(verify_signature_at(payload, &header, "whsec_other", 1_700_000_060).is_err());
        assert!(verify_signature_at(payload, &header, "whsec_test", 1_700_001_000).is_err());
    }

    #[test]
    fn rejects_malformed_header() {
        assert!(verify_signature_at("{}", "v1=abc", "whsec_test", 0).is_err());
        assert!(verify_signature_at("{}", "t=notanumber,v1=abc", "whsec_test", 0).is_err());
    }

    #[test]
    fn parses_subscription_object() {
        let object = json!({
            "id": "sub_123",
            "status": "trialing",
            "customer": "cus_9",
            "cancel_at_period_end": true,
            "trial_end": 1_700_000_000,
            "current_period_start": 1_699_000_000,
            "current_period_end": 1_701_000_000,
            "metadata": { "organization_id": "org-1" },
            "items": { "data": [ { "price": { "id": "price_pro_monthly" } } ] }
        });

        let snapshot = SubscriptionSnapshot::from_object(&object).expect("snapshot");
        assert_eq!(snapshot.id, "sub_123");
        assert_eq!(snapshot.status, "trialing");
        assert_eq!(snapshot.price_id, "price_pro_monthly");
        assert_eq!(snapshot.organization_id.as_deref(), Some("org-1"));
        assert!(snapshot.cancel_at_period_end);
        assert!(snapshot.trial_end.is_some());
    }

    #[test]
    fn subscription_without_id_is_rejected() {
        assert!(SubscriptionSnapshot::from_object(&json!({ "status": "active" })).is_none());
    }
}
