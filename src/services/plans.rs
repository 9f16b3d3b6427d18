use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::AppConfig;
use crate::domain::{BillingInterval, PlanTier};

/// One subscription tier: caps, list prices, and the processor's two
/// price identifiers (monthly, yearly).
#[derive(Debug, Clone, serde::Serialize)]
pub struct Plan {
    pub tier: PlanTier,
    pub name: &'static str,
    /// 0 means unlimited.
    pub max_units: i64,
    /// 0 means unlimited.
    pub max_seats: i64,
    pub monthly_price: Decimal,
    pub yearly_price: Decimal,
    #[serde(skip)]
    pub monthly_price_id: String,
    #[serde(skip)]
    pub yearly_price_id: String,
}

/// Immutable pricing table, built once at startup from the configured
/// price identifiers and injected through `AppState`.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: Vec<Plan>,
}

impl PlanCatalog {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            plans: vec![
                Plan {
                    tier: PlanTier::Starter,
                    name: "Starter",
                    max_units: 10,
                    max_seats: 3,
                    monthly_price: dec!(29),
                    yearly_price: dec!(290),
                    monthly_price_id: config.stripe_price_starter_monthly.clone(),
                    yearly_price_id: config.stripe_price_starter_yearly.clone(),
                },
                Plan {
                    tier: PlanTier::Pro,
                    name: "Pro",
                    max_units: 50,
                    max_seats: 10,
                    monthly_price: dec!(79),
                    yearly_price: dec!(790),
                    monthly_price_id: config.stripe_price_pro_monthly.clone(),
                    yearly_price_id: config.stripe_price_pro_yearly.clone(),
                },
                Plan {
                    tier: PlanTier::Enterprise,
                    name: "Enterprise",
                    max_units: 0,
                    max_seats: 0,
                    monthly_price: dec!(199),
                    yearly_price: dec!(1990),
                    monthly_price_id: config.stripe_price_enterprise_monthly.clone(),
                    yearly_price_id: config.stripe_price_enterprise_yearly.clone(),
                },
            ],
        }
    }

    pub fn all(&self) -> &[Plan] {
        &self.plans
    }

    pub fn get(&self, tier: PlanTier) -> &Plan {
        self.plans
            .iter()
            .find(|plan| plan.tier == tier)
            .unwrap_or(&self.plans[0])
    }

    pub fn price_id(&self, tier: PlanTier, interval: BillingInterval) -> &str {
        let plan = self.get(tier);
        match interval {
            BillingInterval::Monthly => &plan.monthly_price_id,
            BillingInterval::Yearly => &plan.yearly_price_id,
        }
    }

    /// Reverse lookup used during webhook reconciliation. Unknown price
    /// identifiers resolve to the lowest tier so event processing never
    /// blocks on a configuration gap.
    pub fn tier_for_price_id(&self, price_id: &str) -> PlanTier {
        self.plans
            .iter()
            .find(|plan| plan.monthly_price_id == price_id || plan.yearly_price_id == price_id)
            .map(|plan| plan.tier)
            .unwrap_or(PlanTier::Starter)
    }
}

#[cfg(test)]
mod tests {
    use super::PlanCatalog;
    use crate::config::AppConfig;
    use crate::domain::{BillingInterval, PlanTier};

    fn catalog() -> PlanCatalog {
        let mut config = AppConfig::from_env();
        config.stripe_price_pro_monthly = "price_pm".to_string();
        config.stripe_price_pro_yearly = "price_py".to_string();
        config.stripe_price_enterprise_yearly = "price_ey".to_string();
        PlanCatalog::from_config(&config)
    }

    #[test]
    fn resolves_price_id_per_interval() {
        let catalog = catalog();
        assert_eq!(
            catalog.price_id(PlanTier::Pro, BillingInterval::Monthly),
            "price_pm"
        );
        assert_eq!(
            catalog.price_id(PlanTier::Pro, BillingInterval::Yearly),
            "price_py"
        );
    }

    #[test]
    fn reverse_lookup_finds_tier() {
        let catalog = catalog();
        assert_eq!(catalog.tier_for_price_id("price_py"), PlanTier::Pro);
        assert_eq!(catalog.tier_for_price_id("price_ey"), PlanTier::Enterprise);
    }

    #[test]
    fn unknown_price_id_defaults_to_starter() {
        let catalog = catalog();
        assert_eq!(catalog.tier_for_price_id("price_nope"), PlanTier::Starter);
    }
}
