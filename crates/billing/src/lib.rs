// Billing crate clippy configuration
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! TradeCRM Billing Engine
//!
//! Subscription lifecycle and feature entitlement for the CRM.
//!
//! ## Features
//!
//! - **Plan Catalog**: Static three-tier catalog with prices, limits, features
//! - **Subscription Lifecycle**: Create, switch, cancel, reactivate, trial
//! - **Entitlement**: Pure feature-gate and limit resolution per snapshot
//! - **Billing Ledger**: Append-only event log, the audit trail
//! - **Checkout Orchestration**: One command per user intent, serialized per org
//! - **Invariants**: Runnable consistency checks over the account store

pub mod catalog;
pub mod checkout;
pub mod entitlement;
pub mod error;
pub mod invariants;
pub mod ledger;
pub mod lifecycle;
pub mod period;
pub mod store;


// Catalog
pub use catalog::{Plan, PlanLimits, CURRENCY, UNLIMITED};

// Checkout
pub use checkout::{BillingService, PaymentMethodInput, SubscribeRequest, SwitchPlanRequest};

// Error
pub use error::{BillingError, BillingResult};

// Invariants
pub use invariants::{
    InvariantCheckSummary, InvariantChecker, InvariantViolation, ViolationSeverity,
};

// Ledger
pub use ledger::{BillingEventBuilder, BillingLedger};

// Lifecycle
pub use lifecycle::{Applied, CreateParams};

// Period
pub use period::TRIAL_DAYS;

// Store
pub use store::{AccountStore, OrgAccount};
