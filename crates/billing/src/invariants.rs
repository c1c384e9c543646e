//! Billing invariants
//!
//! Runnable consistency checks over a point-in-time account snapshot.
//! These can be run after any mutation to confirm the system is in a
//! valid state.
//!
//! Each check only reads, never writes, and every violation carries
//! enough context to debug the offending account.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use tradecrm_shared::{OrgId, SubscriptionStatus};

use crate::catalog;
use crate::store::OrgAccount;

/// Result of running a single invariant check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantViolation {
    /// Which invariant was violated
    pub invariant: String,
    /// Organization(s) affected
    pub org_ids: Vec<OrgId>,
    /// Human-readable description of the violation
    pub description: String,
    /// Additional context for debugging
    pub context: serde_json::Value,
    /// Severity level
    pub severity: ViolationSeverity,
}

/// Severity of an invariant violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationSeverity {
    /// Critical - system may be charging incorrectly
    Critical,
    /// High - data inconsistency that needs attention
    High,
    /// Medium - potential issue, should investigate
    Medium,
    /// Low - minor inconsistency, informational
    Low,
}

impl std::fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationSeverity::Critical => write!(f, "CRITICAL"),
            ViolationSeverity::High => write!(f, "HIGH"),
            ViolationSeverity::Medium => write!(f, "MEDIUM"),
            ViolationSeverity::Low => write!(f, "LOW"),
        }
    }
}

/// Summary of all invariant checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantCheckSummary {
    /// When the check was run
    #[serde(with = "time::serde::rfc3339")]
    pub checked_at: OffsetDateTime,
    /// Total number of checks run
    pub checks_run: usize,
    /// Number of checks that passed
    pub checks_passed: usize,
    /// Number of checks that failed
    pub checks_failed: usize,
    /// List of all violations found
    pub violations: Vec<InvariantViolation>,
    /// Overall health status
    pub healthy: bool,
}

type Snapshot = [(OrgId, OrgAccount)];

/// Service for running billing invariant checks
#[derive(Debug, Default)]
pub struct InvariantChecker;

impl InvariantChecker {
    pub fn new() -> Self {
        Self
    }

    /// Run all invariant checks and return summary
    pub fn run_all_checks(&self, snapshot: &Snapshot) -> InvariantCheckSummary {
        let now = OffsetDateTime::now_utc();
        let mut violations = Vec::new();

        violations.extend(self.check_trialing_has_trial_end(snapshot));
        violations.extend(self.check_canceled_has_canceled_at(snapshot));
        violations.extend(self.check_pending_cancel_not_terminal(snapshot));
        violations.extend(self.check_amount_matches_catalog(snapshot));
        violations.extend(self.check_period_end_after_start(snapshot));
        violations.extend(self.check_single_default_payment_method(snapshot));

        let checks_run = Self::available_checks().len();
        let checks_failed = violations
            .iter()
            .map(|v| &v.invariant)
            .collect::<std::collections::HashSet<_>>()
            .len();
        let checks_passed = checks_run - checks_failed;

        InvariantCheckSummary {
            checked_at: now,
            checks_run,
            checks_passed,
            checks_failed,
            healthy: violations.is_empty(),
            violations,
        }
    }

    /// Invariant 1: Trialing subscriptions carry a trial end date
    ///
    /// Without one there is no way to know when the trial converts.
    fn check_trialing_has_trial_end(&self, snapshot: &Snapshot) -> Vec<InvariantViolation> {
        snapshot
            .iter()
            .filter_map(|(org_id, account)| account.subscription.as_ref().map(|s| (org_id, s)))
            .filter(|(_, sub)| {
                sub.status == SubscriptionStatus::Trialing && sub.trial_end.is_none()
            })
            .map(|(org_id, sub)| InvariantViolation {
                invariant: "trialing_has_trial_end".to_string(),
                org_ids: vec![*org_id],
                description: "Trialing subscription has no trial_end date".to_string(),
                context: serde_json::json!({
                    "subscription_id": sub.id,
                    "status": sub.status,
                }),
                severity: ViolationSeverity::Critical,
            })
            .collect()
    }

    /// Invariant 2: Canceled subscriptions record when they were canceled
    fn check_canceled_has_canceled_at(&self, snapshot: &Snapshot) -> Vec<InvariantViolation> {
        snapshot
            .iter()
            .filter_map(|(org_id, account)| account.subscription.as_ref().map(|s| (org_id, s)))
            .filter(|(_, sub)| {
                sub.status == SubscriptionStatus::Canceled && sub.canceled_at.is_none()
            })
            .map(|(org_id, sub)| InvariantViolation {
                invariant: "canceled_has_canceled_at".to_string(),
                org_ids: vec![*org_id],
                description: "Canceled subscription has no canceled_at timestamp".to_string(),
                context: serde_json::json!({
                    "subscription_id": sub.id,
                    "status": sub.status,
                }),
                severity: ViolationSeverity::High,
            })
            .collect()
    }

    /// Invariant 3: A pending cancel only makes sense on a live subscription
    ///
    /// Terminal records with cancel_at_period_end still set would confuse
    /// reactivation and any period-end processing.
    fn check_pending_cancel_not_terminal(&self, snapshot: &Snapshot) -> Vec<InvariantViolation> {
        snapshot
            .iter()
            .filter_map(|(org_id, account)| account.subscription.as_ref().map(|s| (org_id, s)))
            .filter(|(_, sub)| sub.status.is_terminal() && sub.cancel_at_period_end)
            .map(|(org_id, sub)| InvariantViolation {
                invariant: "pending_cancel_not_terminal".to_string(),
                org_ids: vec![*org_id],
                description: format!(
                    "Subscription in terminal status '{}' still has cancel_at_period_end set",
                    sub.status
                ),
                context: serde_json::json!({
                    "subscription_id": sub.id,
                    "status": sub.status,
                }),
                severity: ViolationSeverity::High,
            })
            .collect()
    }

    /// Invariant 4: Stored amount matches the catalog price
    ///
    /// Trialing subscriptions carry amount 0; everything else must match
    /// the catalog for its plan and interval, or customers are charged
    /// incorrectly.
    fn check_amount_matches_catalog(&self, snapshot: &Snapshot) -> Vec<InvariantViolation> {
        snapshot
            .iter()
            .filter_map(|(org_id, account)| account.subscription.as_ref().map(|s| (org_id, s)))
            .filter(|(_, sub)| {
                let expected = if sub.status == SubscriptionStatus::Trialing {
                    0
                } else {
                    catalog::price_for(sub.plan_id, sub.billing_interval)
                };
                sub.amount != expected
            })
            .map(|(org_id, sub)| InvariantViolation {
                invariant: "amount_matches_catalog".to_string(),
                org_ids: vec![*org_id],
                description: format!(
                    "Subscription on plan '{}' ({}) stores amount {} cents, catalog disagrees",
                    sub.plan_id, sub.billing_interval, sub.amount
                ),
                context: serde_json::json!({
                    "subscription_id": sub.id,
                    "plan_id": sub.plan_id,
                    "billing_interval": sub.billing_interval,
                    "amount_cents": sub.amount,
                }),
                severity: ViolationSeverity::Critical,
            })
            .collect()
    }

    /// Invariant 5: Billing periods are non-degenerate
    fn check_period_end_after_start(&self, snapshot: &Snapshot) -> Vec<InvariantViolation> {
        snapshot
            .iter()
            .filter_map(|(org_id, account)| account.subscription.as_ref().map(|s| (org_id, s)))
            .filter(|(_, sub)| sub.current_period_end <= sub.current_period_start)
            .map(|(org_id, sub)| InvariantViolation {
                invariant: "period_end_after_start".to_string(),
                org_ids: vec![*org_id],
                description: "Subscription period ends at or before it starts".to_string(),
                context: serde_json::json!({
                    "subscription_id": sub.id,
                    "current_period_start": sub.current_period_start.to_string(),
                    "current_period_end": sub.current_period_end.to_string(),
                }),
                severity: ViolationSeverity::High,
            })
            .collect()
    }

    /// Invariant 6: At most one default payment method per organization
    fn check_single_default_payment_method(&self, snapshot: &Snapshot) -> Vec<InvariantViolation> {
        snapshot
            .iter()
            .filter(|(_, account)| {
                account
                    .payment_methods
                    .iter()
                    .filter(|pm| pm.is_default)
                    .count()
                    > 1
            })
            .map(|(org_id, account)| InvariantViolation {
                invariant: "single_default_payment_method".to_string(),
                org_ids: vec![*org_id],
                description: format!(
                    "Organization has {} default payment methods (expected at most 1)",
                    account
                        .payment_methods
                        .iter()
                        .filter(|pm| pm.is_default)
                        .count()
                ),
                context: serde_json::json!({
                    "payment_method_count": account.payment_methods.len(),
                }),
                severity: ViolationSeverity::Medium,
            })
            .collect()
    }

    /// Run a single invariant check by name
    pub fn run_check(&self, name: &str, snapshot: &Snapshot) -> Vec<InvariantViolation> {
        match name {
            "trialing_has_trial_end" => self.check_trialing_has_trial_end(snapshot),
            "canceled_has_canceled_at" => self.check_canceled_has_canceled_at(snapshot),
            "pending_cancel_not_terminal" => self.check_pending_cancel_not_terminal(snapshot),
            "amount_matches_catalog" => self.check_amount_matches_catalog(snapshot),
            "period_end_after_start" => self.check_period_end_after_start(snapshot),
            "single_default_payment_method" => self.check_single_default_payment_method(snapshot),
            _ => vec![],
        }
    }

    /// Get list of all available invariant checks
    pub fn available_checks() -> Vec<&'static str> {
        vec![
            "trialing_has_trial_end",
            "canceled_has_canceled_at",
            "pending_cancel_not_terminal",
            "amount_matches_catalog",
            "period_end_after_start",
            "single_default_payment_method",
        ]
    }
}
