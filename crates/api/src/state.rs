//! Application state

use std::sync::Arc;

use tradecrm_billing::BillingService;

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub billing: Arc<BillingService>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let billing = Arc::new(BillingService::new());
        tracing::info!("Billing service initialized");
        Self { config, billing }
    }
}
