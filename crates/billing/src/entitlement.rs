//! Feature entitlement resolution
//!
//! Features are gated by minimum tier, not assigned per-plan ad hoc: the
//! static gate map below is the single source of truth, and a plan's
//! feature set is derived from it. Resolution is a pure function of
//! (subscription snapshot, plan id) so any collaborator can gate a feature
//! or display a limit without a network round trip; callers own keeping
//! the snapshot fresh.

use tradecrm_shared::{PlanId, Subscription};

use crate::catalog::{self, PlanLimits};

/// Feature gates: feature identifier -> minimum plan tier required.
///
/// A feature absent from this map is ungated and available to everyone,
/// including the free tier.
pub const GATES: &[(&str, PlanId)] = &[
    // Starter and up
    ("email-integration", PlanId::Starter),
    ("calendar-sync", PlanId::Starter),
    ("bid-templates", PlanId::Starter),
    // Professional and up
    ("customer-portal", PlanId::Professional),
    ("advanced-reports", PlanId::Professional),
    ("api-access", PlanId::Professional),
    ("bulk-email", PlanId::Professional),
    // Enterprise only
    ("sso-saml", PlanId::Enterprise),
    ("audit-log", PlanId::Enterprise),
    ("custom-roles", PlanId::Enterprise),
    ("dedicated-support", PlanId::Enterprise),
];

/// Gated features available at `plan` (used to build the catalog).
pub fn features_for(plan: PlanId) -> Vec<&'static str> {
    GATES
        .iter()
        .filter(|(_, min)| plan >= *min)
        .map(|(feature, _)| *feature)
        .collect()
}

/// True iff the current plan meets the minimum tier. No plan (free tier)
/// never meets any gate.
pub fn meets_min_plan(current: Option<PlanId>, min: PlanId) -> bool {
    match current {
        Some(plan) => plan.rank() >= min.rank(),
        None => false,
    }
}

/// Whether `feature` is available on `current`. A feature with no gate
/// entry is available on every tier including free.
pub fn has_feature(current: Option<PlanId>, feature: &str) -> bool {
    match GATES.iter().find(|(name, _)| *name == feature) {
        Some((_, min)) => meets_min_plan(current, *min),
        None => true,
    }
}

/// Resource limits for the current plan, or the fixed free-tier defaults
/// when there is no active/trialing subscription.
pub fn limits_for(current: Option<PlanId>) -> PlanLimits {
    match current {
        Some(plan) => catalog::plan(plan).limits,
        None => PlanLimits::free_tier(),
    }
}

/// The plan id a subscription snapshot actually entitles, if any.
///
/// Canceled and expired subscriptions grant nothing; past_due retains
/// entitlement until an external process expires it.
pub fn effective_plan(subscription: Option<&Subscription>) -> Option<PlanId> {
    subscription
        .filter(|sub| sub.status.is_entitled())
        .map(|sub| sub.plan_id)
}
