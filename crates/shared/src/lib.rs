// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! TradeCRM Shared Types
//!
//! Domain types shared between the billing engine and the API server:
//! ID wrappers, plan/status enums, the explicit session object, and the
//! subscription/ledger/payment-method records.

pub mod error;
pub mod types;

pub use error::CrmError;
pub use types::{
    BillingEvent, BillingEventStatus, BillingEventType, BillingInterval, OrgId, PaymentMethod,
    PlanId, Session, Subscription, SubscriptionStatus, UserId, UserRole,
};
