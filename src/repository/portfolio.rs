//! Typed reads over the portfolio tables. Rows are deserialized into the
//! domain records here, at the store boundary; unknown enum values are
//! logged and dropped so one bad row never takes down a report.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::domain::{
    Invoice, InvoiceStatus, Occupant, OccupantStatus, Property, PropertyStatus, WorkOrder,
    WorkOrderCategory, WorkOrderStatus,
};
use crate::error::{map_db_error, AppResult};

#[derive(sqlx::FromRow)]
struct PropertyRow {
    id: String,
    name: String,
    status: String,
    monthly_rent: Option<Decimal>,
    purchase_price: Option<Decimal>,
    property_type: String,
}

#[derive(sqlx::FromRow)]
struct InvoiceRow {
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

#[derive(sqlx::FromRow)]
struct WorkOrderRow {
    id: String,
    status: String,
    category: String,
    created_at: DateTime<Utc>,
    actual_cost: Option<Decimal>,
    estimated_cost: Option<Decimal>,
    property_id: Option<String>,
}

#[derive(sqlx::FromRow)]
struct OccupantRow {
    id: String,
    status: String,
    lease_start: NaiveDate,
    lease_end: Option<NaiveDate>,
    monthly_rent: Option<Decimal>,
    property_id: Option<String>,
    created_at: DateTime<Utc>,
}

pub async fn properties_for_org(pool: &PgPool, org_id: &str) -> AppResult<Vec<Property>> {
    let rows = sqlx::query_as::<_, PropertyRow>(
        "SELECT id::text AS id, name, status::text AS status, monthly_rent, purchase_price,
                property_type::text AS property_type
         FROM properties
         WHERE organization_id = $1::uuid",
    )
    .bind(org_id)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)?;

    Ok(rows.into_iter().filter_map(map_property).collect())
}

pub async fn invoices_issued_since(
    pool: &PgPool,
    org_id: &str,
    since: NaiveDate,
) -> AppResult<Vec<Invoice>> {
    let rows = sqlx::query_as::<_, InvoiceRow>(
        "SELECT id::text AS id, invoice_type::text AS invoice_type, status::text AS status,
                total_amount, paid_amount, balance, issue_date, due_date, paid_date,
                property_id::text AS property_id
         FROM invoices
         WHERE organization_id = $1::uuid AND issue_date >= $2",
    )
    .bind(org_id)
    .bind(since)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)?;

    Ok(rows.into_iter().filter_map(map_invoice).collect())
}

pub async fn work_orders_created_since(
    pool: &PgPool,
    org_id: &str,
    since: DateTime<Utc>,
) -> AppResult<Vec<WorkOrder>> {
    let rows = sqlx::query_as::<_, WorkOrderRow>(
        "SELECT id::text AS id, status::text AS status, category::text AS category, created_at,
                actual_cost, estimated_cost, property_id::text AS property_id
         FROM work_orders
         WHERE organization_id = $1::uuid AND created_at >= $2",
    )
    .bind(org_id)
    .bind(since)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)?;

    Ok(rows.into_iter().filter_map(map_work_order).collect())
}

pub async fn occupants_for_org(pool: &PgPool, org_id: &str) -> AppResult<Vec<Occupant>> {
    fetch_occupants(pool, org_id, false).await
}

pub async fn active_occupants_for_org(pool: &PgPool, org_id: &str) -> AppResult<Vec<Occupant>> {
    fetch_occupants(pool, org_id, true).await
}

async fn fetch_occupants(pool: &PgPool, org_id: &str, active_only: bool) -> AppResult<Vec<Occupant>> {
    let base = "SELECT id::text AS id, status::text AS status, lease_start, lease_end,
                       monthly_rent, property_id::text AS property_id, created_at
                FROM occupants
                WHERE organization_id = $1::uuid";
    let sql = if active_only {
        format!("{base} AND status = 'active'")
    } else {
        base.to_string()
    };

    let rows = sqlx::query_as::<_, OccupantRow>(&sql)
        .bind(org_id)
        .fetch_all(pool)
        .await
        .map_err(map_db_error)?;

    Ok(rows.into_iter().filter_map(map_occupant).collect())
}

fn map_property(row: PropertyRow) -> Option<Property> {
    let Some(status) = PropertyStatus::parse(&row.status) else {
        tracing::warn!(id = %row.id, status = %row.status, "skipping property with unknown status");
        return None;
    };
    Some(Property {
        id: row.id,
        name: row.name,
        status,
        monthly_rent: row.monthly_rent,
        purchase_price: row.purchase_price,
        property_type: row.property_type,
    })
}

fn map_invoice(row: InvoiceRow) -> Option<Invoice> {
    let Some(status) = InvoiceStatus::parse(&row.status) else {
        tracing::warn!(id = %row.id, status = %row.status, "skipping invoice with unknown status");
        return None;
    };
    Some(Invoice {
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

fn map_work_order(row: WorkOrderRow) -> Option<WorkOrder> {
    let Some(status) = WorkOrderStatus::parse(&row.status) else {
        tracing::warn!(id = %row.id, status = %row.status, "skipping work order with unknown status");
        return None;
    };
    // An unmapped trade still belongs in the histograms.
    let category = WorkOrderCategory::parse(&row.category).unwrap_or(WorkOrderCategory::General);
    Some(WorkOrder {
        id: row.id,
        status,
        category,
        created_at: row.created_at,
        actual_cost: row.actual_cost,
        estimated_cost: row.estimated_cost,
        property_id: row.property_id,
    })
}

fn map_occupant(row: OccupantRow) -> Option<Occupant> {
    let Some(status) = OccupantStatus::parse(&row.status) else {
        tracing::warn!(id = %row.id, status = %row.status, "skipping occupant with unknown status");
        return None;
    };
    Some(Occupant {
        id: row.id,
        status,
        lease_start: row.lease_start,
        lease_end: row.lease_end,
        monthly_rent: row.monthly_rent,
        property_id: row.property_id,
        created_at: row.created_at,
    })
}
