//! Checkout orchestration
//!
//! The client-facing command surface. Each user intent maps to exactly one
//! lifecycle command plus any payment-method upsert, in that order, so the
//! resulting ledger events can reference the stored method. Commands
//! against one organization are serialized on the account mutex; commands
//! against different organizations run in parallel.
//!
//! Every command takes the explicit session object; the orchestrator
//! never reads ambient state.

use time::OffsetDateTime;
use uuid::Uuid;

use tradecrm_shared::{
    BillingEvent, BillingEventStatus, BillingInterval, PaymentMethod, PlanId, Session,
    Subscription,
};

use crate::catalog::{self, Plan};
use crate::error::{BillingError, BillingResult};
use crate::invariants::{InvariantChecker, InvariantCheckSummary};
use crate::ledger::BillingLedger;
use crate::lifecycle::{self, Applied, CreateParams};
use crate::store::{AccountStore, OrgAccount};

/// Payment method details supplied at checkout.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PaymentMethodInput {
    pub brand: String,
    pub last4: String,
    pub exp_month: u8,
    pub exp_year: u16,
}

impl PaymentMethodInput {
    fn validate(&self) -> BillingResult<()> {
        if self.last4.len() != 4 || !self.last4.chars().all(|c| c.is_ascii_digit()) {
            return Err(BillingError::Validation(
                "payment method last4 must be four digits".to_string(),
            ));
        }
        if !(1..=12).contains(&self.exp_month) {
            return Err(BillingError::Validation(
                "payment method expiry month must be 1-12".to_string(),
            ));
        }
        Ok(())
    }
}

/// Subscribe intent.
#[derive(Debug, Clone)]
pub struct SubscribeRequest {
    pub plan_id: PlanId,
    pub billing_interval: BillingInterval,
    pub payment_method: Option<PaymentMethodInput>,
    pub want_trial: bool,
}

/// Switch-plan intent. At least one field must be set.
#[derive(Debug, Clone, Default)]
pub struct SwitchPlanRequest {
    pub plan_id: Option<PlanId>,
    pub billing_interval: Option<BillingInterval>,
}

/// Billing service: the orchestrator plus the state it owns.
#[derive(Debug, Default)]
pub struct BillingService {
    store: AccountStore,
    ledger: BillingLedger,
}

impl BillingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// The plan catalog, ascending rank order.
    pub fn plans(&self) -> &'static [Plan] {
        catalog::plans()
    }

    /// Current subscription snapshot for the session's organization.
    pub async fn current_subscription(&self, session: &Session) -> Option<Subscription> {
        self.store.subscription(session.org_id).await
    }

    /// Billing history, newest first.
    pub async fn billing_history(&self, session: &Session) -> Vec<BillingEvent> {
        self.ledger.list_for(session.org_id).await
    }

    /// The organization's default payment method, if stored.
    pub async fn payment_method(&self, session: &Session) -> Option<PaymentMethod> {
        let account = self.store.account(session.org_id).await;
        let guard = account.lock().await;
        guard.default_payment_method().cloned()
    }

    /// Subscribe the organization to a plan.
    ///
    /// Trials are one-time per organization, not per attempt: any prior
    /// subscription row, terminal or not, makes a trial request invalid.
    pub async fn subscribe(
        &self,
        session: &Session,
        request: SubscribeRequest,
    ) -> BillingResult<Subscription> {
        require_admin(session)?;
        let now = OffsetDateTime::now_utc();

        let account = self.store.account(session.org_id).await;
        let mut guard = account.lock().await;

        if request.want_trial && guard.subscription.is_some() {
            return Err(BillingError::Validation(
                "trial not available: this organization has already had a subscription"
                    .to_string(),
            ));
        }

        let payment_method_id = self.store_payment_method(
            &mut guard,
            session,
            request.payment_method.as_ref(),
            now,
        )?;

        let params = CreateParams {
            plan_id: request.plan_id,
            billing_interval: request.billing_interval,
            payment_method_id,
            want_trial: request.want_trial,
        };
        let applied = lifecycle::create(session.org_id, guard.subscription.as_ref(), &params, now)?;
        self.commit(&mut guard, applied).await
    }

    /// Switch the organization's plan and/or interval.
    ///
    /// Direct callers without a live subscription should use subscribe
    /// instead; this intent never creates.
    pub async fn switch_plan(
        &self,
        session: &Session,
        request: SwitchPlanRequest,
    ) -> BillingResult<Subscription> {
        require_admin(session)?;
        let now = OffsetDateTime::now_utc();

        let account = self.store.account(session.org_id).await;
        let mut guard = account.lock().await;

        let current = guard
            .subscription
            .as_ref()
            .filter(|sub| !sub.status.is_terminal())
            .ok_or(BillingError::NoActiveSubscription)?;

        let applied =
            lifecycle::change_plan(current, request.plan_id, request.billing_interval, now)?;
        self.commit(&mut guard, applied).await
    }

    /// Cancel the subscription, immediately or at period end.
    pub async fn cancel(&self, session: &Session, immediate: bool) -> BillingResult<Subscription> {
        require_admin(session)?;
        let now = OffsetDateTime::now_utc();

        let account = self.store.account(session.org_id).await;
        let mut guard = account.lock().await;

        let current = guard
            .subscription
            .as_ref()
            .ok_or(BillingError::NoActiveSubscription)?;
        let applied = lifecycle::cancel(current, immediate, now)?;
        self.commit(&mut guard, applied).await
    }

    /// Reactivate: clear a pending cancel or revive a terminal
    /// subscription with a fresh period.
    pub async fn reactivate(&self, session: &Session) -> BillingResult<Subscription> {
        require_admin(session)?;
        let now = OffsetDateTime::now_utc();

        let account = self.store.account(session.org_id).await;
        let mut guard = account.lock().await;

        let applied = lifecycle::reactivate(guard.subscription.as_ref(), now)?;
        self.commit(&mut guard, applied).await
    }

    /// Simulate a payment outcome against the current subscription.
    ///
    /// Defaults to a succeeded charge; a failed outcome drives the
    /// active -> past_due edge without a payment processor.
    pub async fn simulate_payment(
        &self,
        session: &Session,
        outcome: Option<BillingEventStatus>,
    ) -> BillingResult<(BillingEvent, Subscription)> {
        require_admin(session)?;
        let outcome = outcome.unwrap_or(BillingEventStatus::Succeeded);
        if !matches!(
            outcome,
            BillingEventStatus::Succeeded | BillingEventStatus::Failed
        ) {
            return Err(BillingError::Validation(
                "simulated payment outcome must be succeeded or failed".to_string(),
            ));
        }
        let now = OffsetDateTime::now_utc();

        let account = self.store.account(session.org_id).await;
        let mut guard = account.lock().await;

        let current = guard
            .subscription
            .as_ref()
            .ok_or(BillingError::NoActiveSubscription)?;
        let applied = lifecycle::record_payment_outcome(current, outcome, now)?;

        let subscription = applied.subscription.clone();
        let mut appended = Vec::new();
        for builder in applied.events {
            appended.push(self.ledger.append(builder.build()).await?);
        }
        guard.subscription = Some(subscription.clone());

        let event = appended
            .into_iter()
            .next()
            .ok_or_else(|| BillingError::Validation("payment produced no event".to_string()))?;
        Ok((event, subscription))
    }

    /// Store a payment method as the organization's default. Never charges.
    pub async fn update_payment_method(
        &self,
        session: &Session,
        input: PaymentMethodInput,
    ) -> BillingResult<PaymentMethod> {
        require_admin(session)?;
        let now = OffsetDateTime::now_utc();

        let account = self.store.account(session.org_id).await;
        let mut guard = account.lock().await;

        let id = self
            .store_payment_method(&mut guard, session, Some(&input), now)?
            .ok_or_else(|| BillingError::Validation("payment method required".to_string()))?;

        guard
            .payment_methods
            .iter()
            .find(|pm| pm.id == id)
            .cloned()
            .ok_or_else(|| BillingError::Validation("payment method not stored".to_string()))
    }

    /// Run the consistency checks over a point-in-time store snapshot.
    pub async fn check_invariants(&self) -> InvariantCheckSummary {
        let snapshot = self.store.snapshot().await;
        InvariantChecker::new().run_all_checks(&snapshot)
    }

    fn store_payment_method(
        &self,
        guard: &mut OrgAccount,
        session: &Session,
        input: Option<&PaymentMethodInput>,
        now: OffsetDateTime,
    ) -> BillingResult<Option<Uuid>> {
        let Some(input) = input else {
            return Ok(None);
        };
        input.validate()?;
        let id = guard.upsert_payment_method(PaymentMethod {
            id: Uuid::new_v4(),
            org_id: session.org_id,
            brand: input.brand.clone(),
            last4: input.last4.clone(),
            exp_month: input.exp_month,
            exp_year: input.exp_year,
            is_default: true,
            created_at: now,
        });
        tracing::info!(org_id = %session.org_id, brand = %input.brand, "Payment method stored");
        Ok(Some(id))
    }

    /// Persist the transitioned record and append its ledger events.
    async fn commit(
        &self,
        guard: &mut OrgAccount,
        applied: Applied,
    ) -> BillingResult<Subscription> {
        for builder in applied.events {
            self.ledger.append(builder.build()).await?;
        }
        guard.subscription = Some(applied.subscription.clone());
        Ok(applied.subscription)
    }
}

fn require_admin(session: &Session) -> BillingResult<()> {
    if session.role.can_administer() {
        Ok(())
    } else {
        Err(BillingError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use tradecrm_shared::{
        BillingEventType, OrgId, SubscriptionStatus, UserId, UserRole,
    };

    fn admin_session() -> Session {
        Session::new(UserId::new(), OrgId::new(), UserRole::Admin)
    }

    fn subscribe_request(want_trial: bool) -> SubscribeRequest {
        SubscribeRequest {
            plan_id: PlanId::Starter,
            billing_interval: BillingInterval::Month,
            payment_method: None,
            want_trial,
        }
    }

    #[tokio::test]
    async fn test_subscribe_then_cancel_then_reactivate_round_trip() {
        let service = BillingService::new();
        let session = admin_session();

        let sub = service
            .subscribe(&session, subscribe_request(false))
            .await
            .unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);

        let scheduled = service.cancel(&session, false).await.unwrap();
        assert!(scheduled.cancel_at_period_end);
        assert!(scheduled.canceled_at.is_some());

        let restored = service.reactivate(&session).await.unwrap();
        assert_eq!(restored.plan_id, sub.plan_id);
        assert_eq!(restored.billing_interval, sub.billing_interval);
        assert!(!restored.cancel_at_period_end);
        assert!(restored.canceled_at.is_none());
    }

    #[tokio::test]
    async fn test_double_subscribe_fails() {
        let service = BillingService::new();
        let session = admin_session();

        service
            .subscribe(&session, subscribe_request(true))
            .await
            .unwrap();
        let result = service.subscribe(&session, subscribe_request(true)).await;
        // Retry-after-timeout safety: the second create must fail, not
        // double-book
        assert!(matches!(
            result,
            Err(BillingError::AlreadySubscribed) | Err(BillingError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_trial_rejected_with_any_history() {
        let service = BillingService::new();
        let session = admin_session();

        service
            .subscribe(&session, subscribe_request(false))
            .await
            .unwrap();
        service.cancel(&session, true).await.unwrap();

        let result = service.subscribe(&session, subscribe_request(true)).await;
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[tokio::test]
    async fn test_switch_plan_requires_live_subscription() {
        let service = BillingService::new();
        let session = admin_session();

        let result = service
            .switch_plan(
                &session,
                SwitchPlanRequest {
                    plan_id: Some(PlanId::Enterprise),
                    billing_interval: None,
                },
            )
            .await;
        assert!(matches!(result, Err(BillingError::NoActiveSubscription)));
    }

    #[tokio::test]
    async fn test_switch_plan_appends_one_plan_change_event() {
        let service = BillingService::new();
        let session = admin_session();

        service
            .subscribe(&session, subscribe_request(false))
            .await
            .unwrap();
        let sub = service
            .switch_plan(
                &session,
                SwitchPlanRequest {
                    plan_id: Some(PlanId::Enterprise),
                    billing_interval: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(sub.amount, 19_900);

        let history = service.billing_history(&session).await;
        let plan_changes: Vec<_> = history
            .iter()
            .filter(|e| e.event_type == BillingEventType::PlanChange)
            .collect();
        assert_eq!(plan_changes.len(), 1);
        assert_eq!(plan_changes[0].amount, 19_900);
    }

    #[tokio::test]
    async fn test_trial_subscribe_ledgers_trial_started() {
        let service = BillingService::new();
        let session = admin_session();

        let sub = service
            .subscribe(&session, subscribe_request(true))
            .await
            .unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Trialing);
        assert_eq!(sub.amount, 0);
        assert!(sub.trial_end.is_some());

        let history = service.billing_history(&session).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].event_type, BillingEventType::TrialStarted);
    }

    #[tokio::test]
    async fn test_payment_method_upserted_before_lifecycle_command() {
        let service = BillingService::new();
        let session = admin_session();

        let mut request = subscribe_request(false);
        request.payment_method = Some(PaymentMethodInput {
            brand: "visa".to_string(),
            last4: "4242".to_string(),
            exp_month: 12,
            exp_year: 2030,
        });
        let sub = service.subscribe(&session, request).await.unwrap();
        // The created subscription references the freshly stored method
        assert!(sub.payment_method_id.is_some());

        let stored = service.payment_method(&session).await.unwrap();
        assert_eq!(Some(stored.id), sub.payment_method_id);
        assert!(stored.is_default);
    }

    #[tokio::test]
    async fn test_invalid_payment_method_rejected() {
        let service = BillingService::new();
        let session = admin_session();

        let result = service
            .update_payment_method(
                &session,
                PaymentMethodInput {
                    brand: "visa".to_string(),
                    last4: "42".to_string(),
                    exp_month: 12,
                    exp_year: 2030,
                },
            )
            .await;
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[tokio::test]
    async fn test_simulate_payment_failure_and_recovery() {
        let service = BillingService::new();
        let session = admin_session();

        service
            .subscribe(&session, subscribe_request(false))
            .await
            .unwrap();

        let (event, sub) = service
            .simulate_payment(&session, Some(BillingEventStatus::Failed))
            .await
            .unwrap();
        assert_eq!(event.status, BillingEventStatus::Failed);
        assert_eq!(sub.status, SubscriptionStatus::PastDue);

        let (event, sub) = service.simulate_payment(&session, None).await.unwrap();
        assert_eq!(event.status, BillingEventStatus::Succeeded);
        assert_eq!(sub.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn test_simulate_payment_without_subscription() {
        let service = BillingService::new();
        let session = admin_session();
        let result = service.simulate_payment(&session, None).await;
        assert!(matches!(result, Err(BillingError::NoActiveSubscription)));
    }

    #[tokio::test]
    async fn test_non_admin_rejected() {
        let service = BillingService::new();
        let session = Session::new(UserId::new(), OrgId::new(), UserRole::Member);

        let result = service.subscribe(&session, subscribe_request(false)).await;
        assert!(matches!(result, Err(BillingError::Forbidden)));
        let result = service.cancel(&session, true).await;
        assert!(matches!(result, Err(BillingError::Forbidden)));
    }

    #[tokio::test]
    async fn test_reads_allowed_for_any_role() {
        let service = BillingService::new();
        let org = OrgId::new();
        let admin = Session::new(UserId::new(), org, UserRole::Admin);
        let viewer = Session::new(UserId::new(), org, UserRole::Viewer);

        service
            .subscribe(&admin, subscribe_request(false))
            .await
            .unwrap();

        assert!(service.current_subscription(&viewer).await.is_some());
        assert!(!service.billing_history(&viewer).await.is_empty());
    }

    #[tokio::test]
    async fn test_immediate_cancel_removes_entitlement() {
        let service = BillingService::new();
        let session = admin_session();

        service
            .subscribe(&session, subscribe_request(false))
            .await
            .unwrap();
        service.cancel(&session, true).await.unwrap();

        let snapshot = service.current_subscription(&session).await;
        let plan = crate::entitlement::effective_plan(snapshot.as_ref());
        assert_eq!(plan, None);
        assert!(!crate::entitlement::has_feature(plan, "email-integration"));
    }
}
