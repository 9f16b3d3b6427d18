//! Portfolio analytics: five organization-scoped reads fanned out in
//! parallel, joined, then folded into seven derived views. Everything
//! after the join is a pure function of the fetched rows, so the builder
//! takes an explicit `today` anchor and is tested directly on fixtures.

use chrono::{Datelike, Months, NaiveDate, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::domain::{Invoice, Occupant, OccupantStatus, Property, PropertyStatus, WorkOrder};
use crate::error::AppResult;
use crate::repository::portfolio;
use crate::state::AppState;

pub const DEFAULT_MONTHS: u32 = 6;
pub const MAX_MONTHS: u32 = 60;

const TOP_CATEGORIES: usize = 8;
const TOP_PROPERTIES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRevenue {
    pub month: String,
    pub collected: Decimal,
    pub outstanding: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyOccupancy {
    pub month: String,
    pub occupied: i64,
    pub rate: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyPerformance {
    pub property_id: String,
    pub name: String,
    pub total_billed: Decimal,
    pub total_collected: Decimal,
    pub total_outstanding: Decimal,
    pub maintenance_cost: Decimal,
    pub collection_rate: i64,
    pub open_work_orders: i64,
    pub active_tenants: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenantActivity {
    pub month: String,
    pub new: i64,
    pub departed: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    pub total_revenue: Decimal,
    pub total_outstanding: Decimal,
    pub total_billed: Decimal,
    pub collection_rate: i64,
    pub current_occupancy: i64,
    pub avg_monthly_revenue: Decimal,
    pub total_maintenance_cost: Decimal,
    pub open_work_orders: i64,
    pub total_properties: i64,
    pub active_tenants: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub revenue_by_month: Vec<MonthlyRevenue>,
    pub occupancy_by_month: Vec<MonthlyOccupancy>,
    pub work_orders_by_category: Vec<CategoryCount>,
    pub work_orders_by_status: Vec<StatusCount>,
    pub property_performance: Vec<PropertyPerformance>,
    pub tenant_activity_by_month: Vec<TenantActivity>,
    pub summary: AnalyticsSummary,
}

#[derive(Debug, Clone)]
pub struct AnalyticsInputs {
    pub properties: Vec<Property>,
    pub invoices: Vec<Invoice>,
    pub work_orders: Vec<WorkOrder>,
    pub occupants: Vec<Occupant>,
    pub active_occupants: Vec<Occupant>,
}

pub async fn organization_analytics(
    state: &AppState,
    org_id: &str,
    months: u32,
) -> AppResult<AnalyticsReport> {
    let pool = state.db_pool()?;
    let months = months.clamp(1, MAX_MONTHS);
    let today = Utc::now().date_naive();
    let window_start = window_start(today, months);
    let window_start_at = window_start.and_time(NaiveTime::MIN).and_utc();

    let (properties, invoices, work_orders, occupants, active_occupants) = tokio::try_join!(
        portfolio::properties_for_org(pool, org_id),
        portfolio::invoices_issued_since(pool, org_id, window_start),
        portfolio::work_orders_created_since(pool, org_id, window_start_at),
        portfolio::occupants_for_org(pool, org_id),
        portfolio::active_occupants_for_org(pool, org_id),
    )?;

    Ok(build_report(
        &AnalyticsInputs {
            properties,
            invoices,
            work_orders,
            occupants,
            active_occupants,
        },
        today,
        months,
    ))
}

/// Fold the fetched rows into the report. Deterministic for a given
/// snapshot and anchor; degrades to zeros/empty series on empty data.
pub fn build_report(inputs: &AnalyticsInputs, today: NaiveDate, months: u32) -> AnalyticsReport {
    let months = months.max(1);
    let buckets = month_buckets(today, months);

    let revenue_by_month = revenue_by_month(&inputs.invoices, &buckets);
    let occupancy_by_month =
        occupancy_by_month(&inputs.active_occupants, inputs.properties.len() as i64, &buckets);
    let work_orders_by_category = work_orders_by_category(&inputs.work_orders);
    let work_orders_by_status = work_orders_by_status(&inputs.work_orders);
    let property_performance = property_performance(inputs);
    let tenant_activity_by_month = tenant_activity_by_month(&inputs.occupants, &buckets);
    let summary = summary(inputs, &revenue_by_month);

    AnalyticsReport {
        revenue_by_month,
        occupancy_by_month,
        work_orders_by_category,
        work_orders_by_status,
        property_performance,
        tenant_activity_by_month,
        summary,
    }
}

#[derive(Debug, Clone)]
struct MonthBucket {
    start: NaiveDate,
    next: NaiveDate,
    label: String,
}

impl MonthBucket {
    fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.next
    }

    /// Last calendar day of the bucket month.
    fn end(&self) -> NaiveDate {
        self.next.pred_opt().unwrap_or(self.next)
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

pub fn window_start(today: NaiveDate, months: u32) -> NaiveDate {
    let anchor = first_of_month(today);
    anchor
        .checked_sub_months(Months::new(months.saturating_sub(1)))
        .unwrap_or(anchor)
}

fn month_buckets(today: NaiveDate, months: u32) -> Vec<MonthBucket> {
    let anchor = first_of_month(today);
    (0..months)
        .map(|index| {
            let offset = months - 1 - index;
            let start = anchor
                .checked_sub_months(Months::new(offset))
                .unwrap_or(anchor);
            let next = start.checked_add_months(Months::new(1)).unwrap_or(start);
            MonthBucket {
                start,
                next,
                label: start.format("%b %y").to_string(),
            }
        })
        .collect()
}

fn revenue_by_month(invoices: &[Invoice], buckets: &[MonthBucket]) -> Vec<MonthlyRevenue> {
    buckets
        .iter()
        .map(|bucket| {
            let mut collected = Decimal::ZERO;
            let mut outstanding = Decimal::ZERO;
            let mut total = Decimal::ZERO;
            for invoice in invoices {
                if !bucket.contains(invoice.issue_date) {
                    continue;
                }
                collected += invoice.paid_amount;
                outstanding += invoice.balance;
                total += invoice.total_amount;
            }
            MonthlyRevenue {
                month: bucket.label.clone(),
                collected,
                outstanding,
                total,
            }
        })
        .collect()
}

fn occupancy_by_month(
    active_occupants: &[Occupant],
    total_properties: i64,
    buckets: &[MonthBucket],
) -> Vec<MonthlyOccupancy> {
    buckets
        .iter()
        .map(|bucket| {
            let occupied = active_occupants
                .iter()
                .filter(|occupant| {
                    occupant.lease_start <= bucket.end()
                        && occupant.lease_end_or_sentinel() >= bucket.start
                })
                .count() as i64;
            MonthlyOccupancy {
                month: bucket.label.clone(),
                occupied,
                rate: percentage_of_counts(occupied, total_properties),
            }
        })
        .collect()
}

fn work_orders_by_category(work_orders: &[WorkOrder]) -> Vec<CategoryCount> {
    let mut counts: Vec<CategoryCount> = Vec::new();
    for order in work_orders {
        let label = order.category.label();
        match counts.iter_mut().find(|entry| entry.category == label) {
            Some(entry) => entry.count += 1,
            None => counts.push(CategoryCount {
                category: label,
                count: 1,
            }),
        }
    }
    // Stable sort keeps first-seen order among equal counts.
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(TOP_CATEGORIES);
    counts
}

fn work_orders_by_status(work_orders: &[WorkOrder]) -> Vec<StatusCount> {
    let mut counts: Vec<StatusCount> = Vec::new();
    for order in work_orders {
        let label = crate::domain::display_label(order.status.as_str());
        match counts.iter_mut().find(|entry| entry.status == label) {
            Some(entry) => entry.count += 1,
            None => counts.push(StatusCount {
                status: label,
                count: 1,
            }),
        }
    }
    counts
}

fn property_performance(inputs: &AnalyticsInputs) -> Vec<PropertyPerformance> {
    let mut performance: Vec<PropertyPerformance> = inputs
        .properties
        .iter()
        .filter(|property| property.monthly_rent.is_some())
        .map(|property| {
            let mut billed = Decimal::ZERO;
            let mut collected = Decimal::ZERO;
            let mut outstanding = Decimal::ZERO;
            for invoice in &inputs.invoices {
                if invoice.property_id.as_deref() != Some(property.id.as_str()) {
                    continue;
                }
                billed += invoice.total_amount;
                collected += invoice.paid_amount;
                outstanding += invoice.balance;
            }

            let mut maintenance_cost = Decimal::ZERO;
            let mut open_work_orders = 0_i64;
            for order in &inputs.work_orders {
                if order.property_id.as_deref() != Some(property.id.as_str()) {
                    continue;
                }
                maintenance_cost += order.actual_cost.unwrap_or(Decimal::ZERO);
                if order.status.is_open() {
                    open_work_orders += 1;
                }
            }

            let active_tenants = inputs
                .active_occupants
                .iter()
                .filter(|occupant| occupant.property_id.as_deref() == Some(property.id.as_str()))
                .count() as i64;

            PropertyPerformance {
                property_id: property.id.clone(),
                name: display_name(&property.name),
                total_billed: billed,
                total_collected: collected,
                total_outstanding: outstanding,
                maintenance_cost,
                collection_rate: percentage(collected, billed),
                open_work_orders,
                active_tenants,
            }
        })
        .collect();

    performance.sort_by(|a, b| b.total_collected.cmp(&a.total_collected));
    performance.truncate(TOP_PROPERTIES);
    performance
}

fn tenant_activity_by_month(occupants: &[Occupant], buckets: &[MonthBucket]) -> Vec<TenantActivity> {
    buckets
        .iter()
        .map(|bucket| {
            let new = occupants
                .iter()
                .filter(|occupant| bucket.contains(occupant.created_at.date_naive()))
                .count() as i64;
            // "Departed" = lease ended this month and the record is inactive
            // today. Conflates historical and current state, kept as-is.
            let departed = occupants
                .iter()
                .filter(|occupant| {
                    occupant.status == OccupantStatus::Inactive
                        && occupant
                            .lease_end
                            .is_some_and(|lease_end| bucket.contains(lease_end))
                })
                .count() as i64;
            TenantActivity {
                month: bucket.label.clone(),
                new,
                departed,
            }
        })
        .collect()
}

fn summary(inputs: &AnalyticsInputs, revenue_by_month: &[MonthlyRevenue]) -> AnalyticsSummary {
    let mut total_revenue = Decimal::ZERO;
    let mut total_outstanding = Decimal::ZERO;
    let mut total_billed = Decimal::ZERO;
    for invoice in &inputs.invoices {
        total_revenue += invoice.paid_amount;
        total_outstanding += invoice.balance;
        total_billed += invoice.total_amount;
    }

    let total_properties = inputs.properties.len() as i64;
    let occupied_properties = inputs
        .properties
        .iter()
        .filter(|property| property.status == PropertyStatus::Occupied)
        .count() as i64;

    let avg_monthly_revenue = if revenue_by_month.is_empty() {
        Decimal::ZERO
    } else {
        let collected_sum: Decimal = revenue_by_month.iter().map(|entry| entry.collected).sum();
        (collected_sum / Decimal::from(revenue_by_month.len() as i64)).round_dp(2)
    };

    let total_maintenance_cost = inputs
        .work_orders
        .iter()
        .map(|order| order.actual_cost.unwrap_or(Decimal::ZERO))
        .sum();
    let open_work_orders = inputs
        .work_orders
        .iter()
        .filter(|order| order.status.is_open())
        .count() as i64;

    let active_tenants = inputs
        .occupants
        .iter()
        .filter(|occupant| occupant.status == OccupantStatus::Active)
        .count() as i64;

    AnalyticsSummary {
        total_revenue,
        total_outstanding,
        total_billed,
        collection_rate: percentage(total_revenue, total_billed),
        current_occupancy: percentage_of_counts(occupied_properties, total_properties),
        avg_monthly_revenue,
        total_maintenance_cost,
        open_work_orders,
        total_properties,
        active_tenants,
    }
}

/// Integer percentage, rounded half away from zero. Zero denominator
/// yields zero.
fn percentage(numerator: Decimal, denominator: Decimal) -> i64 {
    if denominator.is_zero() {
        return 0;
    }
    (numerator / denominator * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

fn percentage_of_counts(numerator: i64, denominator: i64) -> i64 {
    percentage(Decimal::from(numerator), Decimal::from(denominator))
}

fn display_name(name: &str) -> String {
    if name.chars().count() > 20 {
        let truncated: String = name.chars().take(18).collect();
        format!("{truncated}…")
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        InvoiceStatus, OccupantStatus, PropertyStatus, WorkOrderCategory, WorkOrderStatus,
    };
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn property(id: &str, name: &str, status: PropertyStatus, rent: Option<Decimal>) -> Property {
        Property {
            id: id.to_string(),
            name: name.to_string(),
            status,
            monthly_rent: rent,
            purchase_price: None,
            property_type: "apartment".to_string(),
        }
    }

    fn invoice(
        id: &str,
        issue_date: NaiveDate,
        total: Decimal,
        paid: Decimal,
        property_id: Option<&str>,
    ) -> Invoice {
        Invoice {
            id: id.to_string(),
            invoice_type: "rent".to_string(),
            status: if total == paid {
                InvoiceStatus::Paid
            } else {
                InvoiceStatus::Sent
            },
            total_amount: total,
            paid_amount: paid,
            balance: (total - paid).max(Decimal::ZERO),
            issue_date,
            due_date: None,
            paid_date: None,
            property_id: property_id.map(ToOwned::to_owned),
        }
    }

    fn work_order(
        id: &str,
        status: WorkOrderStatus,
        category: WorkOrderCategory,
        cost: Option<Decimal>,
        property_id: Option<&str>,
    ) -> WorkOrder {
        WorkOrder {
            id: id.to_string(),
            status,
            category,
            created_at: at(2024, 3, 1),
            actual_cost: cost,
            estimated_cost: None,
            property_id: property_id.map(ToOwned::to_owned),
        }
    }

    fn occupant(
        id: &str,
        status: OccupantStatus,
        lease_start: NaiveDate,
        lease_end: Option<NaiveDate>,
        property_id: Option<&str>,
        created_at: chrono::DateTime<Utc>,
    ) -> Occupant {
        Occupant {
            id: id.to_string(),
            status,
            lease_start,
            lease_end,
            monthly_rent: Some(dec!(1000)),
            property_id: property_id.map(ToOwned::to_owned),
            created_at,
        }
    }

    fn empty_inputs() -> AnalyticsInputs {
        AnalyticsInputs {
            properties: Vec::new(),
            invoices: Vec::new(),
            work_orders: Vec::new(),
            occupants: Vec::new(),
            active_occupants: Vec::new(),
        }
    }

    #[test]
    fn report_is_deterministic_for_a_fixed_snapshot() {
        let inputs = AnalyticsInputs {
            properties: vec![
                property("p1", "Unit 1", PropertyStatus::Occupied, Some(dec!(1200))),
                property("p2", "Unit 2", PropertyStatus::Available, Some(dec!(900))),
            ],
            invoices: vec![
                invoice("i1", date(2024, 2, 10), dec!(1200), dec!(1200), Some("p1")),
                invoice("i2", date(2024, 3, 10), dec!(1200), dec!(600), Some("p1")),
            ],
            work_orders: vec![work_order(
                "w1",
                WorkOrderStatus::Open,
                WorkOrderCategory::Plumbing,
                Some(dec!(150)),
                Some("p1"),
            )],
            occupants: vec![occupant(
                "o1",
                OccupantStatus::Active,
                date(2024, 1, 1),
                None,
                Some("p1"),
                at(2024, 1, 1),
            )],
            active_occupants: vec![occupant(
                "o1",
                OccupantStatus::Active,
                date(2024, 1, 1),
                None,
                Some("p1"),
                at(2024, 1, 1),
            )],
        };

        let first = build_report(&inputs, date(2024, 3, 15), 3);
        let second = build_report(&inputs, date(2024, 3, 15), 3);
        assert_eq!(first, second);
    }

    #[test]
    fn every_monthly_series_has_one_bucket_per_month_in_order() {
        let report = build_report(&empty_inputs(), date(2024, 3, 15), 4);
        let labels: Vec<&str> = report
            .revenue_by_month
            .iter()
            .map(|entry| entry.month.as_str())
            .collect();
        assert_eq!(labels, vec!["Dec 23", "Jan 24", "Feb 24", "Mar 24"]);
        assert_eq!(report.occupancy_by_month.len(), 4);
        assert_eq!(report.tenant_activity_by_month.len(), 4);
    }

    #[test]
    fn march_revenue_bucket_sums_collected_outstanding_and_total() {
        let inputs = AnalyticsInputs {
            invoices: vec![
                invoice("i1", date(2024, 3, 5), dec!(1000), dec!(800), None),
                invoice("i2", date(2024, 3, 20), dec!(500), dec!(500), None),
            ],
            ..empty_inputs()
        };

        let report = build_report(&inputs, date(2024, 3, 31), 1);
        assert_eq!(report.revenue_by_month.len(), 1);
        let bucket = &report.revenue_by_month[0];
        assert_eq!(bucket.month, "Mar 24");
        assert_eq!(bucket.collected, dec!(1300));
        assert_eq!(bucket.outstanding, dec!(200));
        assert_eq!(bucket.total, dec!(1500));
    }

    #[test]
    fn zero_properties_degrade_to_zero_rates() {
        let inputs = AnalyticsInputs {
            active_occupants: vec![occupant(
                "o1",
                OccupantStatus::Active,
                date(2024, 1, 1),
                None,
                None,
                at(2024, 1, 1),
            )],
            ..empty_inputs()
        };

        let report = build_report(&inputs, date(2024, 3, 15), 2);
        assert_eq!(report.summary.current_occupancy, 0);
        assert!(report
            .occupancy_by_month
            .iter()
            .all(|bucket| bucket.rate == 0));
    }

    #[test]
    fn categories_truncate_to_top_eight_by_count() {
        let categories = [
            WorkOrderCategory::Plumbing,
            WorkOrderCategory::Electrical,
            WorkOrderCategory::Hvac,
            WorkOrderCategory::Appliance,
            WorkOrderCategory::Carpentry,
            WorkOrderCategory::Painting,
            WorkOrderCategory::Flooring,
            WorkOrderCategory::Roofing,
            WorkOrderCategory::Landscaping,
            WorkOrderCategory::PestControl,
            WorkOrderCategory::Cleaning,
            WorkOrderCategory::Security,
        ];
        let mut work_orders = Vec::new();
        for (index, category) in categories.iter().enumerate() {
            // category i appears i+1 times
            for copy in 0..=index {
                work_orders.push(work_order(
                    &format!("w-{index}-{copy}"),
                    WorkOrderStatus::Open,
                    *category,
                    None,
                    None,
                ));
            }
        }
        let inputs = AnalyticsInputs {
            work_orders,
            ..empty_inputs()
        };

        let report = build_report(&inputs, date(2024, 3, 15), 1);
        assert_eq!(report.work_orders_by_category.len(), 8);
        assert_eq!(report.work_orders_by_category[0].category, "security");
        assert_eq!(report.work_orders_by_category[0].count, 12);
        let counts: Vec<i64> = report
            .work_orders_by_category
            .iter()
            .map(|entry| entry.count)
            .collect();
        let mut sorted = counts.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(counts, sorted);
    }

    #[test]
    fn status_histogram_keeps_every_status_with_spaced_labels() {
        let inputs = AnalyticsInputs {
            work_orders: vec![
                work_order("w1", WorkOrderStatus::InProgress, WorkOrderCategory::Hvac, None, None),
                work_order("w2", WorkOrderStatus::InProgress, WorkOrderCategory::Hvac, None, None),
                work_order("w3", WorkOrderStatus::PendingParts, WorkOrderCategory::Hvac, None, None),
            ],
            ..empty_inputs()
        };

        let report = build_report(&inputs, date(2024, 3, 15), 1);
        assert_eq!(
            report.work_orders_by_status,
            vec![
                StatusCount {
                    status: "in progress".to_string(),
                    count: 2
                },
                StatusCount {
                    status: "pending parts".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn property_performance_ranks_by_collected_and_truncates_long_names() {
        let long_name = "Sunset Boulevard Apartments Building A";
        let inputs = AnalyticsInputs {
            properties: vec![
                property("p1", "Unit 1", PropertyStatus::Occupied, Some(dec!(1000))),
                property("p2", long_name, PropertyStatus::Occupied, Some(dec!(1000))),
                property("p3", "No rent", PropertyStatus::Available, None),
            ],
            invoices: vec![
                invoice("i1", date(2024, 3, 1), dec!(500), dec!(400), Some("p1")),
                invoice("i2", date(2024, 3, 1), dec!(900), dec!(900), Some("p2")),
            ],
            work_orders: vec![work_order(
                "w1",
                WorkOrderStatus::Assigned,
                WorkOrderCategory::Electrical,
                Some(dec!(75)),
                Some("p2"),
            )],
            ..empty_inputs()
        };

        let report = build_report(&inputs, date(2024, 3, 15), 1);
        // p3 has no monthly rent and is excluded entirely.
        assert_eq!(report.property_performance.len(), 2);
        let top = &report.property_performance[0];
        assert_eq!(top.property_id, "p2");
        assert_eq!(top.name, "Sunset Boulevard Ap…");
        assert_eq!(top.total_collected, dec!(900));
        assert_eq!(top.collection_rate, 100);
        assert_eq!(top.maintenance_cost, dec!(75));
        assert_eq!(top.open_work_orders, 1);

        let runner_up = &report.property_performance[1];
        assert_eq!(runner_up.property_id, "p1");
        assert_eq!(runner_up.collection_rate, 80);
    }

    #[test]
    fn collection_rate_is_zero_when_nothing_billed() {
        let inputs = AnalyticsInputs {
            properties: vec![property(
                "p1",
                "Unit 1",
                PropertyStatus::Occupied,
                Some(dec!(1000)),
            )],
            ..empty_inputs()
        };
        let report = build_report(&inputs, date(2024, 3, 15), 1);
        assert_eq!(report.property_performance[0].collection_rate, 0);
        assert_eq!(report.summary.collection_rate, 0);
    }

    #[test]
    fn occupancy_counts_leases_overlapping_each_month() {
        let inputs = AnalyticsInputs {
            properties: vec![
                property("p1", "Unit 1", PropertyStatus::Occupied, Some(dec!(1000))),
                property("p2", "Unit 2", PropertyStatus::Available, Some(dec!(1000))),
            ],
            active_occupants: vec![
                // Spans the February/March boundary.
                occupant(
                    "o1",
                    OccupantStatus::Active,
                    date(2024, 2, 15),
                    Some(date(2024, 3, 10)),
                    Some("p1"),
                    at(2024, 2, 15),
                ),
                // Open-ended lease starting mid-March.
                occupant(
                    "o2",
                    OccupantStatus::Active,
                    date(2024, 3, 20),
                    None,
                    Some("p2"),
                    at(2024, 3, 20),
                ),
            ],
            ..empty_inputs()
        };

        let report = build_report(&inputs, date(2024, 3, 15), 2);
        let february = &report.occupancy_by_month[0];
        let march = &report.occupancy_by_month[1];
        assert_eq!(february.occupied, 1);
        assert_eq!(february.rate, 50);
        assert_eq!(march.occupied, 2);
        assert_eq!(march.rate, 100);
    }

    #[test]
    fn departed_requires_inactive_status_and_lease_end_in_month() {
        let inputs = AnalyticsInputs {
            occupants: vec![
                // Counted: inactive, lease ended in March.
                occupant(
                    "o1",
                    OccupantStatus::Inactive,
                    date(2023, 3, 1),
                    Some(date(2024, 3, 10)),
                    None,
                    at(2023, 3, 1),
                ),
                // Not counted: lease ended in March but still active.
                occupant(
                    "o2",
                    OccupantStatus::Active,
                    date(2023, 3, 1),
                    Some(date(2024, 3, 20)),
                    None,
                    at(2023, 3, 1),
                ),
                // Counted as new: created in March.
                occupant(
                    "o3",
                    OccupantStatus::Active,
                    date(2024, 3, 5),
                    None,
                    None,
                    at(2024, 3, 5),
                ),
            ],
            ..empty_inputs()
        };

        let report = build_report(&inputs, date(2024, 3, 31), 1);
        let march = &report.tenant_activity_by_month[0];
        assert_eq!(march.new, 1);
        assert_eq!(march.departed, 1);
    }

    #[test]
    fn summary_kpis_cover_work_orders_and_tenants() {
        let inputs = AnalyticsInputs {
            properties: vec![
                property("p1", "Unit 1", PropertyStatus::Occupied, Some(dec!(1000))),
                property("p2", "Unit 2", PropertyStatus::Maintenance, Some(dec!(1000))),
            ],
            invoices: vec![
                invoice("i1", date(2024, 2, 1), dec!(1000), dec!(1000), Some("p1")),
                invoice("i2", date(2024, 3, 1), dec!(1000), dec!(500), Some("p1")),
            ],
            work_orders: vec![
                work_order("w1", WorkOrderStatus::Open, WorkOrderCategory::Hvac, Some(dec!(100)), None),
                work_order("w2", WorkOrderStatus::Completed, WorkOrderCategory::Hvac, Some(dec!(50)), None),
                work_order("w3", WorkOrderStatus::Cancelled, WorkOrderCategory::Hvac, None, None),
            ],
            occupants: vec![
                occupant("o1", OccupantStatus::Active, date(2022, 1, 1), None, None, at(2022, 1, 1)),
                occupant("o2", OccupantStatus::Inactive, date(2021, 1, 1), Some(date(2021, 12, 31)), None, at(2021, 1, 1)),
            ],
            active_occupants: vec![occupant(
                "o1",
                OccupantStatus::Active,
                date(2022, 1, 1),
                None,
                None,
                at(2022, 1, 1),
            )],
        };

        let report = build_report(&inputs, date(2024, 3, 31), 2);
        let summary = &report.summary;
        assert_eq!(summary.total_revenue, dec!(1500));
        assert_eq!(summary.total_outstanding, dec!(500));
        assert_eq!(summary.total_billed, dec!(2000));
        assert_eq!(summary.collection_rate, 75);
        assert_eq!(summary.current_occupancy, 50);
        assert_eq!(summary.avg_monthly_revenue, dec!(750));
        assert_eq!(summary.total_maintenance_cost, dec!(150));
        assert_eq!(summary.open_work_orders, 1);
        assert_eq!(summary.total_properties, 2);
        // Active-tenant KPI counts the date-unfiltered occupant set.
        assert_eq!(summary.active_tenants, 1);
    }

    #[test]
    fn percentages_round_half_away_from_zero() {
        assert_eq!(percentage_of_counts(1, 200), 1); // 0.5% -> 1
        assert_eq!(percentage_of_counts(1, 3), 33);
        assert_eq!(percentage_of_counts(2, 3), 67);
        assert_eq!(percentage_of_counts(0, 0), 0);
    }

    #[test]
    fn window_start_spans_whole_months() {
        assert_eq!(window_start(date(2024, 3, 15), 1), date(2024, 3, 1));
        assert_eq!(window_start(date(2024, 3, 15), 6), date(2023, 10, 1));
        assert_eq!(window_start(date(2024, 1, 31), 2), date(2023, 12, 1));
    }
}
