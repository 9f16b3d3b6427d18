//! Billing reads/writes: organization subscription state, invoice payment
//! application, the processed-event ledger, and notification fan-out.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;

use crate::domain::{Invoice, InvoiceStatus, OrgBilling, PlanStatus, PlanTier};
use crate::error::{map_db_error, AppError, AppResult};

#[derive(sqlx::FromRow)]
struct OrgBillingRow {
    organization_id: String,
    plan: String,
    plan_status: String,
    stripe_customer_id: Option<String>,
    stripe_subscription_id: Option<String>,
    stripe_price_id: Option<String>,
    trial_ends_at: Option<DateTime<Utc>>,
    current_period_start: Option<DateTime<Utc>>,
    current_period_end: Option<DateTime<Utc>>,
    cancel_at_period_end: bool,
}

/// Fields the subscription reconciliation overwrites in one shot.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionPatch {
    pub plan: PlanTier,
    pub plan_status: PlanStatus,
    pub stripe_subscription_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}

/// Result of applying a payment to an invoice, computed in
/// `services::billing_sync` and persisted here.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentApplication {
    pub paid_amount: Decimal,
    pub balance: Decimal,
    pub status: InvoiceStatus,
    pub paid_date: Option<NaiveDate>,
}

pub async fn org_billing(pool: &PgPool, org_id: &str) -> AppResult<OrgBilling> {
    let row = sqlx::query_as::<_, OrgBillingRow>(
        "SELECT id::text AS organization_id, plan::text AS plan, plan_status::text AS plan_status,
                stripe_customer_id, stripe_subscription_id, stripe_price_id,
                trial_ends_at, current_period_start, current_period_end,
                COALESCE(cancel_at_period_end, false) AS cancel_at_period_end
         FROM organizations
         WHERE id = $1::uuid",
    )
    .bind(org_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Organization not found.".to_string()))?;

    Ok(OrgBilling {
        organization_id: row.organization_id,
        plan: PlanTier::parse(&row.plan).unwrap_or(PlanTier::Starter),
        plan_status: PlanStatus::from_processor(&row.plan_status),
        stripe_customer_id: row.stripe_customer_id,
        stripe_subscription_id: row.stripe_subscription_id,
        stripe_price_id: row.stripe_price_id,
        trial_ends_at: row.trial_ends_at,
        current_period_start: row.current_period_start,
        current_period_end: row.current_period_end,
        cancel_at_period_end: row.cancel_at_period_end,
    })
}

pub async fn org_name(pool: &PgPool, org_id: &str) -> AppResult<String> {
    sqlx::query_scalar::<_, String>("SELECT name FROM organizations WHERE id = $1::uuid")
        .bind(org_id)
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound("Organization not found.".to_string()))
}

/// Store a freshly created processor customer id, unless a concurrent
/// request got there first. Returns the id that won.
pub async fn set_stripe_customer_if_absent(
    pool: &PgPool,
    org_id: &str,
    customer_id: &str,
) -> AppResult<String> {
    sqlx::query_scalar::<_, String>(
        "UPDATE organizations
         SET stripe_customer_id = COALESCE(stripe_customer_id, $2)
         WHERE id = $1::uuid
         RETURNING stripe_customer_id",
    )
    .bind(org_id)
    .bind(customer_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Organization not found.".to_string()))
}

pub async fn org_id_by_customer(pool: &PgPool, customer_id: &str) -> AppResult<Option<String>> {
    sqlx::query_scalar::<_, String>(
        "SELECT id::text FROM organizations WHERE stripe_customer_id = $1 LIMIT 1",
    )
    .bind(customer_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)
}

/// Last-writer-wins overwrite of the subscription mirror; the processor
/// redelivers full state, so no concurrency token is needed.
pub async fn apply_subscription_patch(
    pool: &PgPool,
    org_id: &str,
    patch: &SubscriptionPatch,
) -> AppResult<()> {
    sqlx::query(
        "UPDATE organizations
         SET plan = $2, plan_status = $3, stripe_subscription_id = $4, stripe_price_id = $5,
             trial_ends_at = $6, current_period_start = $7, current_period_end = $8,
             cancel_at_period_end = $9
         WHERE id = $1::uuid",
    )
    .bind(org_id)
    .bind(patch.plan.as_str())
    .bind(patch.plan_status.as_str())
    .bind(&patch.stripe_subscription_id)
    .bind(&patch.stripe_price_id)
    .bind(patch.trial_ends_at)
    .bind(patch.current_period_start)
    .bind(patch.current_period_end)
    .bind(patch.cancel_at_period_end)
    .execute(pool)
    .await
    .map_err(map_db_error)?;
    Ok(())
}

/// Downgrade after the processor deletes the subscription: lowest tier,
/// canceled status, subscription handle and pending-cancel flag cleared.
pub async fn mark_subscription_deleted(pool: &PgPool, org_id: &str) -> AppResult<()> {
    sqlx::query(
        "UPDATE organizations
         SET plan = $2, plan_status = $3, stripe_subscription_id = NULL,
             cancel_at_period_end = false
         WHERE id = $1::uuid",
    )
    .bind(org_id)
    .bind(PlanTier::Starter.as_str())
    .bind(PlanStatus::Canceled.as_str())
    .execute(pool)
    .await
    .map_err(map_db_error)?;
    Ok(())
}

pub async fn mark_past_due(pool: &PgPool, org_id: &str) -> AppResult<()> {
    sqlx::query("UPDATE organizations SET plan_status = $2 WHERE id = $1::uuid")
        .bind(org_id)
        .bind(PlanStatus::PastDue.as_str())
        .execute(pool)
        .await
        .map_err(map_db_error)?;
    Ok(())
}

pub async fn invoice(pool: &PgPool, invoice_id: &str) -> AppResult<Invoice> {
    #[derive(sqlx::FromRow)]
    struct Row {
        id: String,
        invoice_type: String,
        status: String,
        total_amount: Decimal,
        paid_amount: Decimal,
        balance: Decimal,
        issue_date: NaiveDate,
        due_date: Option<NaiveDate>,
        paid_date: Option<NaiveDate>,
        property_id: Option<String>,
    }

    let row = sqlx::query_as::<_, Row>(
        "SELECT id::text AS id, invoice_type::text AS invoice_type, status::text AS status,
                total_amount, paid_amount, balance, issue_date, due_date, paid_date,
                property_id::text AS property_id
         FROM invoices
         WHERE id = $1::uuid",
    )
    .bind(invoice_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Invoice not found.".to_string()))?;

    let status = InvoiceStatus::parse(&row.status).ok_or_else(|| {
        AppError::Dependency(format!("Invoice {} has unknown status '{}'.", row.id, row.status))
    })?;

    Ok(Invoice {
        id: row.id,
        invoice_type: row.invoice_type,
        status,
        total_amount: row.total_amount,
        paid_amount: row.paid_amount,
        balance: row.balance,
        issue_date: row.issue_date,
        due_date: row.due_date,
        paid_date: row.paid_date,
        property_id: row.property_id,
    })
}

pub async fn update_invoice_payment(
    pool: &PgPool,
    invoice_id: &str,
    application: &PaymentApplication,
    payment_reference: &str,
) -> AppResult<()> {
    sqlx::query(
        "UPDATE invoices
         SET paid_amount = $2, balance = $3, status = $4, paid_date = $5,
             payment_reference = $6
         WHERE id = $1::uuid",
    )
    .bind(invoice_id)
    .bind(application.paid_amount)
    .bind(application.balance)
    .bind(application.status.as_str())
    .bind(application.paid_date)
    .bind(payment_reference)
    .execute(pool)
    .await
    .map_err(map_db_error)?;
    Ok(())
}

/// Append a webhook event to the idempotency ledger. The primary key on
/// the event id makes the check-then-insert race-free: exactly one of any
/// set of concurrent deliveries sees `true` here.
pub async fn insert_processed_event(
    pool: &PgPool,
    event_id: &str,
    event_type: &str,
    payload: &Value,
) -> AppResult<bool> {
    let result = sqlx::query(
        "INSERT INTO processed_stripe_events (id, event_type, payload)
         VALUES ($1, $2, $3)
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(event_id)
    .bind(event_type)
    .bind(payload)
    .execute(pool)
    .await
    .map_err(map_db_error)?;

    Ok(result.rows_affected() == 1)
}

pub async fn member_ids_with_roles(
    pool: &PgPool,
    org_id: &str,
    roles: &[&str],
) -> AppResult<Vec<String>> {
    let roles: Vec<String> = roles.iter().map(|role| (*role).to_string()).collect();
    sqlx::query_scalar::<_, String>(
        "SELECT user_id::text
         FROM organization_members
         WHERE organization_id = $1::uuid AND role::text = ANY($2)",
    )
    .bind(org_id)
    .bind(&roles)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)
}

pub async fn insert_notifications(
    pool: &PgPool,
    org_id: &str,
    user_ids: &[String],
    category: &str,
    title: &str,
    body: &str,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO user_notifications (organization_id, user_id, category, title, body)
         SELECT $1::uuid, unnest($2::text[])::uuid, $3, $4, $5",
    )
    .bind(org_id)
    .bind(user_ids)
    .bind(category)
    .bind(title)
    .bind(body)
    .execute(pool)
    .await
    .map_err(map_db_error)?;
    Ok(())
}

pub async fn count_units(pool: &PgPool, org_id: &str) -> AppResult<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM properties WHERE organization_id = $1::uuid")
        .bind(org_id)
        .fetch_one(pool)
        .await
        .map_err(map_db_error)
}

pub async fn count_seats(pool: &PgPool, org_id: &str) -> AppResult<i64> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM organization_members WHERE organization_id = $1::uuid",
    )
    .bind(org_id)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}
