use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::db;
use crate::error::{AppError, AppResult};
use crate::services::plans::PlanCatalog;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: Option<PgPool>,
    pub http_client: reqwest::Client,
    pub plans: Arc<PlanCatalog>,
}

impl AppState {
    pub fn build(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let db_pool = db::build_pool(&config);
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        let plans = Arc::new(PlanCatalog::from_config(&config));

        Ok(Self {
            config: Arc::new(config),
            db_pool,
            http_client,
            plans,
        })
    }

    pub fn db_pool(&self) -> AppResult<&PgPool> {
        self.db_pool.as_ref().ok_or_else(|| {
            AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
        })
    }
}
