use serde::Deserialize;
use validator::Validate;

use crate::error::AppError;

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

fn default_months() -> u32 {
    crate::services::analytics::DEFAULT_MONTHS
}
fn default_interval_monthly() -> String {
    "monthly".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsQuery {
    pub org_id: String,
    #[serde(default = "default_months")]
    pub months: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingOrgQuery {
    pub org_id: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreateCheckoutInput {
    #[validate(length(min = 1, max = 64))]
    pub org_id: String,
    #[validate(length(min = 1, max = 32))]
    pub plan: String,
    #[serde(default = "default_interval_monthly")]
    pub interval: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct CreatePortalInput {
    #[validate(length(min = 1, max = 64))]
    pub org_id: String,
}
