//! Billing routes
//!
//! One handler per billing command. Handlers parse and validate the wire
//! shapes, then hand the explicit session to the billing service; all
//! business rules live behind that boundary.

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use tradecrm_billing::{
    catalog, entitlement, period, InvariantCheckSummary, PaymentMethodInput, Plan, PlanLimits,
    SubscribeRequest, SwitchPlanRequest,
};
use tradecrm_shared::{
    BillingEvent, BillingEventStatus, BillingInterval, PaymentMethod, PlanId, Session,
    Subscription,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct PlansResponse {
    pub plans: &'static [Plan],
}

/// Resolved entitlements alongside the raw subscription record, so
/// collaborators can gate features from one read.
#[derive(Debug, Serialize)]
pub struct EntitlementView {
    pub plan: Option<PlanId>,
    pub features: Vec<&'static str>,
    pub limits: PlanLimits,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionView {
    pub subscription: Option<Subscription>,
    pub entitlement: EntitlementView,
    pub days_until_period_end: Option<i64>,
    pub trial_days_remaining: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionBody {
    pub plan_id: String,
    pub billing_interval: Option<String>,
    pub payment_method: Option<PaymentMethodInput>,
    #[serde(default)]
    pub want_trial: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSubscriptionBody {
    pub plan_id: Option<String>,
    pub billing_interval: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelSubscriptionBody {
    #[serde(default)]
    pub immediate: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct SimulatePaymentBody {
    pub outcome: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SimulatePaymentResponse {
    pub event: BillingEvent,
    pub subscription: Subscription,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub events: Vec<BillingEvent>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct PaymentMethodResponse {
    pub payment_method: Option<PaymentMethod>,
}

// =============================================================================
// Parsing Helpers
// =============================================================================

fn parse_interval(raw: &str) -> ApiResult<BillingInterval> {
    raw.parse()
        .map_err(|_| ApiError::validation(format!("Invalid billing interval: {}", raw)))
}

fn parse_outcome(raw: &str) -> ApiResult<BillingEventStatus> {
    match raw.to_lowercase().as_str() {
        "succeeded" => Ok(BillingEventStatus::Succeeded),
        "failed" => Ok(BillingEventStatus::Failed),
        _ => Err(ApiError::validation(format!(
            "Simulated payment outcome must be succeeded or failed, got '{}'",
            raw
        ))),
    }
}

fn subscription_view(subscription: Option<Subscription>) -> SubscriptionView {
    let plan = entitlement::effective_plan(subscription.as_ref());
    let features = plan.map(entitlement::features_for).unwrap_or_default();
    let limits = entitlement::limits_for(plan);

    let days_until_period_end = subscription
        .as_ref()
        .filter(|sub| !sub.status.is_terminal())
        .map(|sub| period::days_until(sub.current_period_end));
    let trial_days_remaining = subscription
        .as_ref()
        .and_then(|sub| sub.trial_end)
        .map(period::days_until);

    SubscriptionView {
        subscription,
        entitlement: EntitlementView {
            plan,
            features,
            limits,
        },
        days_until_period_end,
        trial_days_remaining,
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/billing/plans - list the catalog (public read)
pub async fn list_plans(State(state): State<AppState>) -> Json<PlansResponse> {
    Json(PlansResponse {
        plans: state.billing.plans(),
    })
}

/// GET /api/billing/subscription - current subscription plus entitlements
pub async fn get_subscription(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Json<SubscriptionView> {
    let subscription = state.billing.current_subscription(&session).await;
    Json(subscription_view(subscription))
}

/// POST /api/billing/subscription - subscribe to a plan
pub async fn create_subscription(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(body): Json<CreateSubscriptionBody>,
) -> ApiResult<(StatusCode, Json<Subscription>)> {
    let plan_id = catalog::parse_plan_id(&body.plan_id)?;
    let billing_interval = body
        .billing_interval
        .as_deref()
        .map(parse_interval)
        .transpose()?
        .unwrap_or_default();

    let subscription = state
        .billing
        .subscribe(
            &session,
            SubscribeRequest {
                plan_id,
                billing_interval,
                payment_method: body.payment_method,
                want_trial: body.want_trial,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

/// PATCH /api/billing/subscription - change plan and/or interval
pub async fn update_subscription(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(body): Json<UpdateSubscriptionBody>,
) -> ApiResult<Json<Subscription>> {
    let plan_id = body
        .plan_id
        .as_deref()
        .map(catalog::parse_plan_id)
        .transpose()?;
    let billing_interval = body
        .billing_interval
        .as_deref()
        .map(parse_interval)
        .transpose()?;

    let subscription = state
        .billing
        .switch_plan(
            &session,
            SwitchPlanRequest {
                plan_id,
                billing_interval,
            },
        )
        .await?;
    Ok(Json(subscription))
}

/// POST /api/billing/subscription/cancel
pub async fn cancel_subscription(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(body): Json<CancelSubscriptionBody>,
) -> ApiResult<Json<Subscription>> {
    let subscription = state.billing.cancel(&session, body.immediate).await?;
    Ok(Json(subscription))
}

/// POST /api/billing/subscription/reactivate
pub async fn reactivate_subscription(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<Subscription>> {
    let subscription = state.billing.reactivate(&session).await?;
    Ok(Json(subscription))
}

/// GET /api/billing/history - ledger events, newest first
pub async fn billing_history(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Json<HistoryResponse> {
    let events = state.billing.billing_history(&session).await;
    let total = events.len();
    Json(HistoryResponse { events, total })
}

/// GET /api/billing/payment-method - the default payment method, if any
pub async fn get_payment_method(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Json<PaymentMethodResponse> {
    let payment_method = state.billing.payment_method(&session).await;
    Json(PaymentMethodResponse { payment_method })
}

/// PUT /api/billing/payment-method - store a new default, never charges
pub async fn update_payment_method(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(body): Json<PaymentMethodInput>,
) -> ApiResult<Json<PaymentMethod>> {
    let payment_method = state.billing.update_payment_method(&session, body).await?;
    Ok(Json(payment_method))
}

/// POST /api/billing/simulate-payment - drive a payment outcome
pub async fn simulate_payment(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    body: Option<Json<SimulatePaymentBody>>,
) -> ApiResult<Json<SimulatePaymentResponse>> {
    let outcome = body
        .and_then(|Json(body)| body.outcome)
        .as_deref()
        .map(parse_outcome)
        .transpose()?;

    let (event, subscription) = state.billing.simulate_payment(&session, outcome).await?;
    Ok(Json(SimulatePaymentResponse {
        event,
        subscription,
    }))
}

/// GET /api/billing/invariants - run consistency checks (admin only)
pub async fn run_invariants(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<InvariantCheckSummary>> {
    if !session.role.can_administer() {
        return Err(ApiError::forbidden(
            "invariant checks require an admin role",
        ));
    }
    Ok(Json(state.billing.check_invariants().await))
}
