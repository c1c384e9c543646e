//! Common types used across TradeCRM

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// ID Wrappers
// =============================================================================

/// Organization (tenant) ID wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgId(pub Uuid);

impl OrgId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OrgId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for OrgId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for OrgId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User ID wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Subscription plan tier, totally ordered by rank.
///
/// Ordering is the canonical order for every tier comparison in the system:
/// starter < professional < enterprise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanId {
    Starter,
    Professional,
    Enterprise,
}

impl PlanId {
    /// Numeric rank of this tier. Higher rank = more features.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Starter => 1,
            Self::Professional => 2,
            Self::Enterprise => 3,
        }
    }

    /// All tiers in ascending rank order.
    pub fn all() -> [PlanId; 3] {
        [Self::Starter, Self::Professional, Self::Enterprise]
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starter => write!(f, "starter"),
            Self::Professional => write!(f, "professional"),
            Self::Enterprise => write!(f, "enterprise"),
        }
    }
}

impl std::str::FromStr for PlanId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "starter" => Ok(Self::Starter),
            "professional" => Ok(Self::Professional),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(format!("Invalid plan id: {}", s)),
        }
    }
}

/// Recurrence unit of a subscription's price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Month,
    Year,
}

impl Default for BillingInterval {
    fn default() -> Self {
        Self::Month
    }
}

impl std::fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Month => write!(f, "month"),
            Self::Year => write!(f, "year"),
        }
    }
}

impl std::str::FromStr for BillingInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "month" | "monthly" => Ok(Self::Month),
            "year" | "annual" | "yearly" => Ok(Self::Year),
            _ => Err(format!("Invalid billing interval: {}", s)),
        }
    }
}

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
    Expired,
}

impl SubscriptionStatus {
    /// Terminal statuses are retained for history and can only be revived
    /// via an explicit reactivate command.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Canceled | Self::Expired)
    }

    /// Whether this status still grants plan entitlements.
    /// past_due keeps entitlement until an external process expires it.
    pub fn is_entitled(&self) -> bool {
        matches!(self, Self::Trialing | Self::Active | Self::PastDue)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trialing => write!(f, "trialing"),
            Self::Active => write!(f, "active"),
            Self::PastDue => write!(f, "past_due"),
            Self::Canceled => write!(f, "canceled"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// User role within an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Owner,
    Admin,
    Member,
    Viewer,
}

impl Default for UserRole {
    fn default() -> Self {
        Self::Member
    }
}

impl UserRole {
    /// Get the permission level for this role (higher = more permissions)
    /// Owner: 3, Admin: 2, Member: 1, Viewer: 0
    pub fn level(&self) -> u8 {
        match self {
            Self::Owner => 3,
            Self::Admin => 2,
            Self::Member => 1,
            Self::Viewer => 0,
        }
    }

    /// Check if this role can administer the organization
    /// Billing commands (create/update/cancel/reactivate) require this.
    pub fn can_administer(&self) -> bool {
        self.level() >= 2
    }

    /// Parse a role from string (case insensitive)
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "owner" => Self::Owner,
            "admin" => Self::Admin,
            "member" => Self::Member,
            "viewer" => Self::Viewer,
            _ => Self::Member, // Default to member for unknown roles
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// Explicit session object passed into every billing command.
///
/// Built at the HTTP boundary from gateway-verified identity; the engine
/// never reads ambient global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub org_id: OrgId,
    pub role: UserRole,
}

impl Session {
    pub fn new(user_id: UserId, org_id: OrgId, role: UserRole) -> Self {
        Self {
            user_id,
            org_id,
            role,
        }
    }
}

// =============================================================================
// Domain Records
// =============================================================================

/// Subscription record, one per organization, server-of-record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub org_id: OrgId,
    pub plan_id: PlanId,
    pub status: SubscriptionStatus,
    pub billing_interval: BillingInterval,
    #[serde(with = "time::serde::rfc3339")]
    pub current_period_start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub current_period_end: OffsetDateTime,
    /// Present only while status = trialing
    #[serde(with = "time::serde::rfc3339::option")]
    pub trial_end: Option<OffsetDateTime>,
    /// Scheduled to become canceled at current_period_end, usable until then
    pub cancel_at_period_end: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub canceled_at: Option<OffsetDateTime>,
    /// Amount actually charged for the current period, in cents.
    /// Always catalog-derived except the explicit zero of a trial.
    pub amount: i64,
    pub currency: String,
    pub payment_method_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Billing event type, closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingEventType {
    Payment,
    Refund,
    Credit,
    PlanChange,
    SubscriptionCreated,
    SubscriptionCanceled,
    TrialStarted,
}

impl std::fmt::Display for BillingEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Payment => write!(f, "payment"),
            Self::Refund => write!(f, "refund"),
            Self::Credit => write!(f, "credit"),
            Self::PlanChange => write!(f, "plan_change"),
            Self::SubscriptionCreated => write!(f, "subscription_created"),
            Self::SubscriptionCanceled => write!(f, "subscription_canceled"),
            Self::TrialStarted => write!(f, "trial_started"),
        }
    }
}

/// Outcome status carried on a billing event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingEventStatus {
    Succeeded,
    Failed,
    Pending,
    Refunded,
}

/// Immutable billing event. The ledger is the audit trail and the sole
/// source for billing history views; it is never replayed for state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingEvent {
    pub id: Uuid,
    pub org_id: OrgId,
    /// Position in the organization's ledger, assigned on append.
    /// Orders events deterministically even when timestamps collide.
    pub seq: u64,
    pub event_type: BillingEventType,
    /// Stored non-negative; refunds carry their sign in the type.
    pub amount: i64,
    pub currency: String,
    pub status: BillingEventStatus,
    pub description: String,
    pub plan_id: Option<PlanId>,
    pub invoice_number: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Stored payment method. Storing a method never itself charges anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: Uuid,
    pub org_id: OrgId,
    pub brand: String,
    pub last4: String,
    pub exp_month: u8,
    pub exp_year: u16,
    pub is_default: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

// =============================================================================
// Tests
// =============================================================================
