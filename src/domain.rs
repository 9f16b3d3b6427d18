#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

/// Open-ended leases carry no end date; interval math treats them as
/// running to this far-future date.
pub fn lease_end_sentinel() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// Turn a stored enum value into its display label ("pest_control" -> "pest control").
pub fn display_label(raw: &str) -> String {
    raw.replace('_', " ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyStatus {
    Available,
    Occupied,
    Maintenance,
    Renovation,
    OffMarket,
}

impl PropertyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Occupied => "occupied",
            Self::Maintenance => "maintenance",
            Self::Renovation => "renovation",
            Self::OffMarket => "off_market",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "available" => Some(Self::Available),
            "occupied" => Some(Self::Occupied),
            "maintenance" => Some(Self::Maintenance),
            "renovation" => Some(Self::Renovation),
            "off_market" => Some(Self::OffMarket),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Partial,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
            Self::Partial => "partial",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "sent" => Some(Self::Sent),
            "paid" => Some(Self::Paid),
            "overdue" => Some(Self::Overdue),
            "partial" => Some(Self::Partial),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    Open,
    Assigned,
    InProgress,
    PendingParts,
    Completed,
    Closed,
    Cancelled,
}

impl WorkOrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::PendingParts => "pending_parts",
            Self::Completed => "completed",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "open" => Some(Self::Open),
            "assigned" => Some(Self::Assigned),
            "in_progress" => Some(Self::InProgress),
            "pending_parts" => Some(Self::PendingParts),
            "completed" => Some(Self::Completed),
            "closed" => Some(Self::Closed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Counts toward the "open work orders" KPI.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Open | Self::Assigned | Self::InProgress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderCategory {
    Plumbing,
    Electrical,
    Hvac,
    Appliance,
    Carpentry,
    Painting,
    Flooring,
    Roofing,
    Landscaping,
    PestControl,
    Cleaning,
    Security,
    General,
}

impl WorkOrderCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plumbing => "plumbing",
            Self::Electrical => "electrical",
            Self::Hvac => "hvac",
            Self::Appliance => "appliance",
            Self::Carpentry => "carpentry",
            Self::Painting => "painting",
            Self::Flooring => "flooring",
            Self::Roofing => "roofing",
            Self::Landscaping => "landscaping",
            Self::PestControl => "pest_control",
            Self::Cleaning => "cleaning",
            Self::Security => "security",
            Self::General => "general",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "plumbing" => Some(Self::Plumbing),
            "electrical" => Some(Self::Electrical),
            "hvac" => Some(Self::Hvac),
            "appliance" => Some(Self::Appliance),
            "carpentry" => Some(Self::Carpentry),
            "painting" => Some(Self::Painting),
            "flooring" => Some(Self::Flooring),
            "roofing" => Some(Self::Roofing),
            "landscaping" => Some(Self::Landscaping),
            "pest_control" => Some(Self::PestControl),
            "cleaning" => Some(Self::Cleaning),
            "security" => Some(Self::Security),
            "general" => Some(Self::General),
            _ => None,
        }
    }

    pub fn label(self) -> String {
        display_label(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupantStatus {
    Active,
    Inactive,
    Eviction,
    Pending,
}

impl OccupantStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Eviction => "eviction",
            Self::Pending => "pending",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "eviction" => Some(Self::Eviction),
            "pending" => Some(Self::Pending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Starter,
    Pro,
    Enterprise,
}

impl PlanTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "starter" => Some(Self::Starter),
            "pro" => Some(Self::Pro),
            "enterprise" => Some(Self::Enterprise),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
    Unpaid,
}

impl PlanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trialing => "trialing",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Unpaid => "unpaid",
        }
    }

    /// Map a processor subscription status onto the stored plan status.
    /// Statuses outside the mirrored set (incomplete, paused, ...) are
    /// treated as unpaid so the organization is never over-entitled.
    pub fn from_processor(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "trialing" => Self::Trialing,
            "active" => Self::Active,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            _ => Self::Unpaid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingInterval {
    Monthly,
    Yearly,
}

impl BillingInterval {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "monthly" | "month" => Some(Self::Monthly),
            "yearly" | "year" | "annual" => Some(Self::Yearly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub id: String,
    pub name: String,
    pub status: PropertyStatus,
    pub monthly_rent: Option<Decimal>,
    pub purchase_price: Option<Decimal>,
    pub property_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invoice {
    pub id: String,
    pub invoice_type: String,
    pub status: InvoiceStatus,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub balance: Decimal,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub paid_date: Option<NaiveDate>,
    pub property_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkOrder {
    pub id: String,
    pub status: WorkOrderStatus,
    pub category: WorkOrderCategory,
    pub created_at: DateTime<Utc>,
    pub actual_cost: Option<Decimal>,
    pub estimated_cost: Option<Decimal>,
    pub property_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Occupant {
    pub id: String,
    pub status: OccupantStatus,
    pub lease_start: NaiveDate,
    pub lease_end: Option<NaiveDate>,
    pub monthly_rent: Option<Decimal>,
    pub property_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Occupant {
    pub fn lease_end_or_sentinel(&self) -> NaiveDate {
        self.lease_end.unwrap_or_else(lease_end_sentinel)
    }
}

/// Billing aspect of an organization row. Mutated exclusively by the
/// webhook reconciler.
#[derive(Debug, Clone, PartialEq)]
pub struct OrgBilling {
    pub organization_id: String,
    pub plan: PlanTier,
    pub plan_status: PlanStatus,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_statuses_case_insensitively() {
        assert_eq!(PropertyStatus::parse(" OCCUPIED "), Some(PropertyStatus::Occupied));
        assert_eq!(InvoiceStatus::parse("Partial"), Some(InvoiceStatus::Partial));
        assert_eq!(OccupantStatus::parse("eviction"), Some(OccupantStatus::Eviction));
        assert_eq!(WorkOrderStatus::parse("bogus"), None);
    }

    #[test]
    fn open_work_order_states() {
        assert!(WorkOrderStatus::Open.is_open());
        assert!(WorkOrderStatus::Assigned.is_open());
        assert!(WorkOrderStatus::InProgress.is_open());
        assert!(!WorkOrderStatus::PendingParts.is_open());
        assert!(!WorkOrderStatus::Completed.is_open());
    }

    #[test]
    fn category_labels_replace_underscores() {
        assert_eq!(WorkOrderCategory::PestControl.label(), "pest control");
        assert_eq!(WorkOrderCategory::Hvac.label(), "hvac");
        assert_eq!(display_label("in_progress"), "in progress");
    }

    #[test]
    fn processor_status_mapping_is_conservative() {
        assert_eq!(PlanStatus::from_processor("trialing"), PlanStatus::Trialing);
        assert_eq!(PlanStatus::from_processor("past_due"), PlanStatus::PastDue);
        assert_eq!(PlanStatus::from_processor("incomplete"), PlanStatus::Unpaid);
    }

    #[test]
    fn open_ended_lease_uses_sentinel() {
        let occupant = Occupant {
            id: "o1".to_string(),
            status: OccupantStatus::Active,
            lease_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            lease_end: None,
            monthly_rent: None,
            property_id: None,
            created_at: Utc::now(),
        };
        assert_eq!(occupant.lease_end_or_sentinel(), lease_end_sentinel());
    }
}
