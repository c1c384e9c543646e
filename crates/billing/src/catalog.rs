//! Plan catalog
//!
//! Static, versioned description of the purchasable tiers. Pure lookup
//! table with no mutable state; `plans()` returns tiers in ascending rank
//! order and that ordering is what every tier comparison elsewhere relies
//! on.

use std::sync::OnceLock;

use serde::Serialize;
use tradecrm_shared::{BillingInterval, PlanId};

use crate::entitlement;
use crate::error::{BillingError, BillingResult};

/// Currency for all catalog prices, minor units (cents).
pub const CURRENCY: &str = "usd";

/// Sentinel for an unlimited numeric limit.
pub const UNLIMITED: u32 = u32::MAX;

/// Resource limits granted at a tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlanLimits {
    pub max_users: u32,
    pub max_contacts: u32,
    pub max_storage_gb: f64,
}

impl PlanLimits {
    /// Fixed free-tier defaults for organizations with no active or
    /// trialing subscription.
    pub fn free_tier() -> Self {
        Self {
            max_users: 1,
            max_contacts: 50,
            max_storage_gb: 0.1,
        }
    }
}

/// Subscription plan, immutable and catalog-defined.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub id: PlanId,
    /// Price per month in cents
    pub price_monthly: i64,
    /// Price per year in cents (two months free vs monthly)
    pub price_annual: i64,
    pub currency: &'static str,
    pub limits: PlanLimits,
    /// Gated features available at this tier; a higher-rank plan's set is
    /// a superset of every lower-rank plan's set by construction.
    pub features: Vec<&'static str>,
}

impl Plan {
    fn starter() -> Self {
        Self {
            id: PlanId::Starter,
            price_monthly: 2_900,
            price_annual: 29_000,
            currency: CURRENCY,
            limits: PlanLimits {
                max_users: 5,
                max_contacts: 2_500,
                max_storage_gb: 5.0,
            },
            features: entitlement::features_for(PlanId::Starter),
        }
    }

    fn professional() -> Self {
        Self {
            id: PlanId::Professional,
            price_monthly: 7_900,
            price_annual: 79_000,
            currency: CURRENCY,
            limits: PlanLimits {
                max_users: 25,
                max_contacts: 25_000,
                max_storage_gb: 50.0,
            },
            features: entitlement::features_for(PlanId::Professional),
        }
    }

    fn enterprise() -> Self {
        Self {
            id: PlanId::Enterprise,
            price_monthly: 19_900,
            price_annual: 199_000,
            currency: CURRENCY,
            limits: PlanLimits {
                max_users: UNLIMITED,
                max_contacts: UNLIMITED,
                max_storage_gb: f64::INFINITY,
            },
            features: entitlement::features_for(PlanId::Enterprise),
        }
    }

    /// Price for a billing interval, in cents.
    pub fn price_for(&self, interval: BillingInterval) -> i64 {
        match interval {
            BillingInterval::Month => self.price_monthly,
            BillingInterval::Year => self.price_annual,
        }
    }
}

/// All plans in ascending rank order.
pub fn plans() -> &'static [Plan] {
    static CATALOG: OnceLock<Vec<Plan>> = OnceLock::new();
    CATALOG.get_or_init(|| vec![Plan::starter(), Plan::professional(), Plan::enterprise()])
}

/// Look up a plan by id. Infallible over the closed enum.
pub fn plan(id: PlanId) -> &'static Plan {
    // plans() is ordered by rank, rank is 1-based
    &plans()[(id.rank() - 1) as usize]
}

/// Parse a raw plan id from the wire. This is the one place the closed set
/// is enforced against caller input.
pub fn parse_plan_id(raw: &str) -> BillingResult<PlanId> {
    raw.parse::<PlanId>()
        .map_err(|_| BillingError::unknown_plan(raw))
}

/// Catalog price for a plan at an interval, in cents.
pub fn price_for(id: PlanId, interval: BillingInterval) -> i64 {
    plan(id).price_for(interval)
}
