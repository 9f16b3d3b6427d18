pub mod analytics;
pub mod billing_sync;
pub mod notifications;
pub mod plans;
pub mod stripe;
