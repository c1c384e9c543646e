//! Billing error taxonomy
//!
//! Every variant is a terminal, user-facing business-rule rejection. The
//! engine performs no network calls, so there is no transient class to
//! retry internally; retry policy belongs to the caller's transport layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Unknown plan: {0}")]
    UnknownPlan(String),

    #[error("Organization already has an active subscription")]
    AlreadySubscribed,

    #[error("Organization has no active subscription")]
    NoActiveSubscription,

    #[error("Organization has no subscription to reactivate")]
    NothingToReactivate,

    #[error("Insufficient permissions: billing commands require an admin role")]
    Forbidden,

    #[error("Validation error: {0}")]
    Validation(String),
}

impl BillingError {
    /// Stable machine-readable code, used in API error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownPlan(_) => "UNKNOWN_PLAN",
            Self::AlreadySubscribed => "ALREADY_SUBSCRIBED",
            Self::NoActiveSubscription => "NO_ACTIVE_SUBSCRIPTION",
            Self::NothingToReactivate => "NOTHING_TO_REACTIVATE",
            Self::Forbidden => "FORBIDDEN",
            Self::Validation(_) => "VALIDATION_ERROR",
        }
    }

    pub fn unknown_plan(raw: &str) -> Self {
        Self::UnknownPlan(raw.to_string())
    }
}

pub type BillingResult<T> = Result<T, BillingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(BillingError::AlreadySubscribed.code(), "ALREADY_SUBSCRIBED");
        assert_eq!(
            BillingError::NoActiveSubscription.code(),
            "NO_ACTIVE_SUBSCRIPTION"
        );
        assert_eq!(
            BillingError::NothingToReactivate.code(),
            "NOTHING_TO_REACTIVATE"
        );
        assert_eq!(BillingError::unknown_plan("x").code(), "UNKNOWN_PLAN");
    }

    #[test]
    fn test_messages_explain_why() {
        // Business-rule rejections must be self-explanatory, not generic.
        let msg = BillingError::AlreadySubscribed.to_string();
        assert!(msg.contains("already has an active subscription"));
    }
}
