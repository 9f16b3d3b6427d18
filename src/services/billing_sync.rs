//! Billing reconciliation against the payment processor: checkout and
//! portal session creation, and webhook-driven subscription/payment sync
//! with an at-most-once delivery gate.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use sqlx::PgPool;

use crate::domain::{BillingInterval, InvoiceStatus, PlanStatus, PlanTier};
use crate::error::{AppError, AppResult};
use crate::repository::billing::{self as billing_repo, PaymentApplication, SubscriptionPatch};
use crate::services::notifications;
use crate::services::plans::PlanCatalog;
use crate::services::stripe::{self, SubscriptionSnapshot};
use crate::state::AppState;

/// What happened to a verified webhook delivery. The HTTP wrapper acks
/// all three; `Failed` stays visible in logs for operational follow-up.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Applied,
    Skipped,
    Failed(String),
}

/// Build a hosted checkout session for a subscription and return its
/// redirect URL. Creates and persists the processor customer on first
/// use; subscription state itself only changes via webhook.
pub async fn create_checkout(
    state: &AppState,
    org_id: &str,
    plan: &str,
    interval: &str,
) -> AppResult<String> {
    let tier = PlanTier::parse(plan)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown plan '{plan}'.")))?;
    let interval = BillingInterval::parse(interval)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown billing interval '{interval}'.")))?;

    let pool = state.db_pool()?;
    let billing = billing_repo::org_billing(pool, org_id).await?;

    let customer_id = match billing.stripe_customer_id {
        Some(existing) => existing,
        None => {
            let org_name = billing_repo::org_name(pool, org_id).await?;
            let created =
                stripe::create_customer(&state.http_client, &state.config, org_id, &org_name)
                    .await?;
            billing_repo::set_stripe_customer_if_absent(pool, org_id, &created).await?
        }
    };

    let price_id = state.plans.price_id(tier, interval).to_string();
    let session = stripe::create_subscription_checkout(
        &state.http_client,
        &state.config,
        &customer_id,
        &price_id,
        org_id,
    )
    .await?;

    tracing::info!(org_id, plan = tier.as_str(), session_id = %session.id, "checkout session created");
    Ok(session.url)
}

/// Hosted billing-portal URL for an organization that already has a
/// processor customer.
pub async fn create_portal(state: &AppState, org_id: &str) -> AppResult<String> {
    let pool = state.db_pool()?;
    let billing = billing_repo::org_billing(pool, org_id).await?;
    let customer_id = billing.stripe_customer_id.ok_or_else(|| {
        AppError::NotFound("Organization has no billing customer yet.".to_string())
    })?;

    stripe::create_portal_session(&state.http_client, &state.config, &customer_id).await
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    pub id: String,
    pub event_type: String,
    pub object: Value,
}

impl WebhookEvent {
    pub fn from_envelope(envelope: &Value) -> Option<Self> {
        let id = envelope.get("id").and_then(Value::as_str)?.trim().to_string();
        let event_type = envelope.get("type").and_then(Value::as_str)?.trim().to_string();
        if id.is_empty() || event_type.is_empty() {
            return None;
        }
        Some(Self {
            id,
            event_type,
            object: envelope
                .pointer("/data/object")
                .cloned()
                .unwrap_or(Value::Null),
        })
    }
}

/// Verify, gate, persist, and dispatch one webhook delivery.
///
/// The ledger insert runs before dispatch, so a crash mid-dispatch means
/// the event is dropped rather than double-applied on redelivery; dispatch
/// errors are logged and acked for the same reason.
pub async fn ingest_webhook(
    state: &AppState,
    payload: &str,
    signature_header: &str,
) -> AppResult<WebhookOutcome> {
    let secret = state
        .config
        .stripe_webhook_secret
        .as_deref()
        .ok_or_else(|| AppError::Dependency("STRIPE_WEBHOOK_SECRET not configured.".to_string()))?;
    stripe::verify_signature(payload, signature_header, secret)?;

    let envelope: Value = serde_json::from_str(payload)
        .map_err(|_| AppError::BadRequest("Malformed webhook payload.".to_string()))?;
    let event = WebhookEvent::from_envelope(&envelope)
        .ok_or_else(|| AppError::BadRequest("Webhook payload missing id or type.".to_string()))?;

    let pool = state.db_pool()?;
    let fresh =
        billing_repo::insert_processed_event(pool, &event.id, &event.event_type, &envelope).await?;
    if !fresh {
        tracing::info!(event_id = %event.id, "duplicate webhook delivery acknowledged");
        return Ok(WebhookOutcome::Skipped);
    }

    match dispatch(state, pool, &event).await {
        Ok(()) => Ok(WebhookOutcome::Applied),
        Err(error) => {
            tracing::error!(
                event_id = %event.id,
                event_type = %event.event_type,
                error = %error,
                "webhook dispatch failed, acknowledging anyway"
            );
            Ok(WebhookOutcome::Failed(error.to_string()))
        }
    }
}

async fn dispatch(state: &AppState, pool: &PgPool, event: &WebhookEvent) -> AppResult<()> {
    match event.event_type.as_str() {
        "customer.subscription.created" | "customer.subscription.updated" => {
            let snapshot = SubscriptionSnapshot::from_object(&event.object).ok_or_else(|| {
                AppError::BadRequest("Subscription payload was malformed.".to_string())
            })?;
            sync_subscription(state, pool, &snapshot).await
        }
        "customer.subscription.deleted" => subscription_deleted(pool, &event.object).await,
        "customer.subscription.trial_will_end" => trial_will_end(pool, &event.object).await,
        "invoice.payment_succeeded" => invoice_payment_succeeded(state, pool, &event.object).await,
        "invoice.payment_failed" => invoice_payment_failed(pool, &event.object).await,
        "checkout.session.completed" => checkout_session_completed(pool, &event.object).await,
        other => {
            tracing::debug!(event_type = other, "unhandled webhook event type");
            Ok(())
        }
    }
}

/// Overwrite the organization's subscription mirror from a processor
/// subscription snapshot.
async fn sync_subscription(
    state: &AppState,
    pool: &PgPool,
    snapshot: &SubscriptionSnapshot,
) -> AppResult<()> {
    let Some(org_id) = resolve_org_id(
        pool,
        snapshot.organization_id.as_deref(),
        &snapshot.customer_id,
    )
    .await?
    else {
        tracing::warn!(subscription_id = %snapshot.id, "no organization matches subscription, ignoring");
        return Ok(());
    };

    let patch = subscription_patch(&state.plans, snapshot);
    billing_repo::apply_subscription_patch(pool, &org_id, &patch).await?;
    tracing::info!(
        org_id = %org_id,
        plan = patch.plan.as_str(),
        plan_status = patch.plan_status.as_str(),
        "subscription state reconciled"
    );
    Ok(())
}

fn subscription_patch(plans: &PlanCatalog, snapshot: &SubscriptionSnapshot) -> SubscriptionPatch {
    SubscriptionPatch {
        plan: plans.tier_for_price_id(&snapshot.price_id),
        plan_status: PlanStatus::from_processor(&snapshot.status),
        stripe_subscription_id: Some(snapshot.id.clone()),
        stripe_price_id: (!snapshot.price_id.is_empty()).then(|| snapshot.price_id.clone()),
        trial_ends_at: snapshot.trial_end,
        current_period_start: snapshot.current_period_start,
        current_period_end: snapshot.current_period_end,
        cancel_at_period_end: snapshot.cancel_at_period_end,
    }
}

async fn subscription_deleted(pool: &PgPool, object: &Value) -> AppResult<()> {
    let Some(org_id) = org_id_from_object(pool, object).await? else {
        return Ok(());
    };

    billing_repo::mark_subscription_deleted(pool, &org_id).await?;
    notifications::notify_billing_admins(
        pool,
        &org_id,
        "subscription_canceled",
        "Subscription canceled",
        "Your subscription has ended and the organization was moved to the Starter plan.",
    )
    .await;
    Ok(())
}

async fn trial_will_end(pool: &PgPool, object: &Value) -> AppResult<()> {
    let Some(org_id) = org_id_from_object(pool, object).await? else {
        return Ok(());
    };
    notifications::notify_billing_admins(
        pool,
        &org_id,
        "trial_ending",
        "Trial ending soon",
        "Your free trial ends in a few days. Add a payment method to keep your plan.",
    )
    .await;
    Ok(())
}

/// A paid subscription invoice is a trigger to resync from the processor
/// rather than a payload to trust on its own.
async fn invoice_payment_succeeded(
    state: &AppState,
    pool: &PgPool,
    object: &Value,
) -> AppResult<()> {
    let subscription_id = object
        .get("subscription")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let Some(subscription_id) = subscription_id else {
        return Ok(());
    };

    let snapshot =
        stripe::get_subscription(&state.http_client, &state.config, subscription_id).await?;
    sync_subscription(state, pool, &snapshot).await
}

async fn invoice_payment_failed(pool: &PgPool, object: &Value) -> AppResult<()> {
    let Some(org_id) = org_id_from_object(pool, object).await? else {
        return Ok(());
    };

    billing_repo::mark_past_due(pool, &org_id).await?;
    notifications::notify_billing_admins(
        pool,
        &org_id,
        "payment_failed",
        "Payment failed",
        "The latest subscription payment failed. Update your payment method to avoid interruption.",
    )
    .await;
    Ok(())
}

/// A completed checkout session tagged with an invoice id is a one-time
/// rent payment; credit it against the invoice ledger. Sessions without
/// the tag (subscription checkouts) are no-ops here.
async fn checkout_session_completed(pool: &PgPool, object: &Value) -> AppResult<()> {
    let invoice_id = object
        .pointer("/metadata/invoice_id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let Some(invoice_id) = invoice_id else {
        return Ok(());
    };

    let session_id = object.get("id").and_then(Value::as_str).unwrap_or_default();
    let amount = object
        .get("amount_total")
        .and_then(Value::as_i64)
        .ok_or_else(|| {
            AppError::BadRequest("Payment session carries no amount.".to_string())
        })?;
    let amount = Decimal::from(amount) / dec!(100);

    let invoice = billing_repo::invoice(pool, invoice_id).await?;
    let application = apply_payment(
        invoice.total_amount,
        invoice.paid_amount,
        amount,
        Utc::now().date_naive(),
    );
    billing_repo::update_invoice_payment(
        pool,
        &invoice.id,
        &application,
        &format!("stripe:{session_id}"),
    )
    .await?;

    tracing::info!(
        invoice_id = %invoice.id,
        paid_amount = %application.paid_amount,
        status = application.status.as_str(),
        "rent payment applied"
    );
    Ok(())
}

/// Credit a payment against an invoice. Balance is clamped at zero and
/// the paid date is stamped only once the invoice is fully settled.
/// At-most-once application is guaranteed by the event ledger, not here.
fn apply_payment(
    total_amount: Decimal,
    already_paid: Decimal,
    amount: Decimal,
    today: NaiveDate,
) -> PaymentApplication {
    let paid_amount = already_paid + amount;
    let balance = (total_amount - paid_amount).max(Decimal::ZERO);
    let fully_paid = balance.is_zero();
    PaymentApplication {
        paid_amount,
        balance,
        status: if fully_paid {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::Partial
        },
        paid_date: fully_paid.then_some(today),
    }
}

/// Resolve the owning organization for a processor object: correlation
/// metadata first, then the stored customer mapping.
async fn resolve_org_id(
    pool: &PgPool,
    metadata_org_id: Option<&str>,
    customer_id: &str,
) -> AppResult<Option<String>> {
    if let Some(org_id) = metadata_org_id.map(str::trim).filter(|value| !value.is_empty()) {
        return Ok(Some(org_id.to_string()));
    }
    if customer_id.is_empty() {
        return Ok(None);
    }
    billing_repo::org_id_by_customer(pool, customer_id).await
}

async fn org_id_from_object(pool: &PgPool, object: &Value) -> AppResult<Option<String>> {
    let metadata_org_id = object
        .pointer("/metadata/organization_id")
        .and_then(Value::as_str);
    let customer_id = object
        .get("customer")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let resolved = resolve_org_id(pool, metadata_org_id, customer_id).await?;
    if resolved.is_none() {
        tracing::warn!("webhook object matches no organization, ignoring");
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::{apply_payment, subscription_patch, WebhookEvent};
    use crate::config::AppConfig;
    use crate::domain::{InvoiceStatus, PlanStatus, PlanTier};
    use crate::services::plans::PlanCatalog;
    use crate::services::stripe::SubscriptionSnapshot;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn partial_payment_leaves_balance_and_no_paid_date() {
        let application = apply_payment(dec!(1200), dec!(0), dec!(600), today());
        assert_eq!(application.paid_amount, dec!(600));
        assert_eq!(application.balance, dec!(600));
        assert_eq!(application.status, InvoiceStatus::Partial);
        assert!(application.paid_date.is_none());
    }

    #[test]
    fn second_payment_settles_the_invoice() {
        let application = apply_payment(dec!(1200), dec!(600), dec!(600), today());
        assert_eq!(application.paid_amount, dec!(1200));
        assert_eq!(application.balance, dec!(0));
        assert_eq!(application.status, InvoiceStatus::Paid);
        assert_eq!(application.paid_date, Some(today()));
    }

    #[test]
    fn overpayment_clamps_balance_at_zero() {
        let application = apply_payment(dec!(1000), dec!(900), dec!(500), today());
        assert_eq!(application.paid_amount, dec!(1400));
        assert_eq!(application.balance, dec!(0));
        assert_eq!(application.status, InvoiceStatus::Paid);
    }

    fn catalog() -> PlanCatalog {
        let mut config = AppConfig::from_env();
        config.stripe_price_pro_monthly = "price_pro_m".to_string();
        PlanCatalog::from_config(&config)
    }

    fn snapshot(price_id: &str, status: &str) -> SubscriptionSnapshot {
        SubscriptionSnapshot::from_object(&json!({
            "id": "sub_1",
            "status": status,
            "customer": "cus_1",
            "cancel_at_period_end": false,
            "trial_end": 1_700_000_000,
            "current_period_start": 1_699_000_000,
            "current_period_end": 1_701_000_000,
            "items": { "data": [ { "price": { "id": price_id } } ] }
        }))
        .unwrap()
    }

    #[test]
    fn patch_maps_price_id_to_tier_and_status() {
        let patch = subscription_patch(&catalog(), &snapshot("price_pro_m", "active"));
        assert_eq!(patch.plan, PlanTier::Pro);
        assert_eq!(patch.plan_status, PlanStatus::Active);
        assert_eq!(patch.stripe_subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(patch.stripe_price_id.as_deref(), Some("price_pro_m"));
        assert!(patch.trial_ends_at.is_some());
    }

    #[test]
    fn unknown_price_id_falls_back_to_starter() {
        let patch = subscription_patch(&catalog(), &snapshot("price_mystery", "trialing"));
        assert_eq!(patch.plan, PlanTier::Starter);
        assert_eq!(patch.plan_status, PlanStatus::Trialing);
    }

    #[test]
    fn parses_webhook_envelope() {
        let event = WebhookEvent::from_envelope(&json!({
            "id": "evt_1",
            "type": "customer.subscription.updated",
            "data": { "object": { "id": "sub_1" } }
        }))
        .expect("event");
        assert_eq!(event.id, "evt_1");
        assert_eq!(event.event_type, "customer.subscription.updated");
        assert_eq!(event.object.get("id").unwrap(), "sub_1");
    }

    #[test]
    fn envelope_without_id_or_type_is_rejected() {
        assert!(WebhookEvent::from_envelope(&json!({ "type": "x" })).is_none());
        assert!(WebhookEvent::from_envelope(&json!({ "id": "evt_1" })).is_none());
        assert!(WebhookEvent::from_envelope(&json!({ "id": "", "type": "x" })).is_none());
    }
}
