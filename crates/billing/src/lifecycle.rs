//! Subscription lifecycle state machine
//!
//! The single authoritative place where subscription state changes. Every
//! transition is a pure function over an already-fetched `Subscription`
//! snapshot: it validates the precondition, returns the new record plus
//! the ledger events to append, and never performs I/O. The store layer
//! owns persistence and per-organization serialization.
//!
//! Amounts written here always come from the plan catalog at the chosen
//! interval, never from the caller, except the explicit zero of a trial.

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use tradecrm_shared::{
    BillingEventStatus, BillingEventType, BillingInterval, OrgId, PlanId, Subscription,
    SubscriptionStatus,
};

use crate::catalog;
use crate::error::{BillingError, BillingResult};
use crate::ledger::BillingEventBuilder;
use crate::period::{self, TRIAL_DAYS};

/// Parameters for the create command.
#[derive(Debug, Clone)]
pub struct CreateParams {
    pub plan_id: PlanId,
    pub billing_interval: BillingInterval,
    pub payment_method_id: Option<Uuid>,
    pub want_trial: bool,
}

/// An applied transition: the new subscription record and the ledger
/// events it produced, in append order.
#[derive(Debug)]
pub struct Applied {
    pub subscription: Subscription,
    pub events: Vec<BillingEventBuilder>,
}

/// Create a subscription for an organization with none.
///
/// A trial is granted only if no subscription row has ever existed for the
/// organization; with any prior history, `want_trial` falls back to a paid
/// active subscription. Fails `AlreadySubscribed` while a non-terminal
/// subscription exists, which also makes a retried create idempotent.
pub fn create(
    org_id: OrgId,
    existing: Option<&Subscription>,
    params: &CreateParams,
    now: OffsetDateTime,
) -> BillingResult<Applied> {
    if let Some(current) = existing {
        if !current.status.is_terminal() {
            return Err(BillingError::AlreadySubscribed);
        }
    }

    let plan = catalog::plan(params.plan_id);
    let trial = params.want_trial && existing.is_none();

    let (status, trial_end, period_end, amount) = if trial {
        let trial_end = now + Duration::days(TRIAL_DAYS);
        (SubscriptionStatus::Trialing, Some(trial_end), trial_end, 0)
    } else {
        (
            SubscriptionStatus::Active,
            None,
            period::period_end_for(now, params.billing_interval),
            plan.price_for(params.billing_interval),
        )
    };

    let subscription = Subscription {
        id: Uuid::new_v4(),
        org_id,
        plan_id: params.plan_id,
        status,
        billing_interval: params.billing_interval,
        current_period_start: now,
        current_period_end: period_end,
        trial_end,
        cancel_at_period_end: false,
        canceled_at: None,
        amount,
        currency: plan.currency.to_string(),
        payment_method_id: params.payment_method_id,
        created_at: now,
        updated_at: now,
    };

    let events = if trial {
        vec![BillingEventBuilder::new(org_id, BillingEventType::TrialStarted)
            .plan(params.plan_id)
            .description(format!("{}-day trial started on {}", TRIAL_DAYS, plan.id))]
    } else {
        vec![
            BillingEventBuilder::new(org_id, BillingEventType::SubscriptionCreated)
                .plan(params.plan_id)
                .amount(amount)
                .description(format!(
                    "Subscribed to {} ({})",
                    plan.id, params.billing_interval
                )),
            BillingEventBuilder::new(org_id, BillingEventType::Payment)
                .plan(params.plan_id)
                .amount(amount)
                .description(format!("Payment for {} period", params.billing_interval)),
        ]
    };

    tracing::info!(
        org_id = %org_id,
        plan = %params.plan_id,
        status = %subscription.status,
        trial,
        "Subscription created"
    );

    Ok(Applied {
        subscription,
        events,
    })
}

/// Re-target the plan and/or interval of a live subscription.
///
/// Recomputes `amount` from the catalog but deliberately does not touch
/// `current_period_start/end` and computes no proration; the new price
/// takes effect for the period as booked. While trialing, the amount stays
/// zero until the trial converts.
pub fn change_plan(
    current: &Subscription,
    new_plan: Option<PlanId>,
    new_interval: Option<BillingInterval>,
    now: OffsetDateTime,
) -> BillingResult<Applied> {
    if !current.status.is_entitled() {
        return Err(BillingError::NoActiveSubscription);
    }
    if new_plan.is_none() && new_interval.is_none() {
        return Err(BillingError::Validation(
            "plan change requires a new plan or a new billing interval".to_string(),
        ));
    }

    let plan_id = new_plan.unwrap_or(current.plan_id);
    let interval = new_interval.unwrap_or(current.billing_interval);
    let plan = catalog::plan(plan_id);

    let amount = if current.status == SubscriptionStatus::Trialing {
        0
    } else {
        plan.price_for(interval)
    };

    let mut subscription = current.clone();
    let old_plan = subscription.plan_id;
    subscription.plan_id = plan_id;
    subscription.billing_interval = interval;
    subscription.amount = amount;
    subscription.updated_at = now;

    let event = BillingEventBuilder::new(current.org_id, BillingEventType::PlanChange)
        .plan(plan_id)
        .amount(amount)
        .description(format!("Plan changed from {} to {} ({})", old_plan, plan_id, interval));

    tracing::info!(
        org_id = %current.org_id,
        from_plan = %old_plan,
        to_plan = %plan_id,
        interval = %interval,
        amount_cents = amount,
        "Plan changed"
    );

    Ok(Applied {
        subscription,
        events: vec![event],
    })
}

/// Cancel a subscription, immediately or at period end.
///
/// Scheduled cancellation keeps full entitlement until the period end; an
/// external rollover process transitions it to canceled at that point.
pub fn cancel(current: &Subscription, immediate: bool, now: OffsetDateTime) -> BillingResult<Applied> {
    if current.status.is_terminal() {
        return Err(BillingError::NoActiveSubscription);
    }

    let mut subscription = current.clone();
    subscription.canceled_at = Some(now);
    subscription.updated_at = now;

    let description = if immediate {
        subscription.status = SubscriptionStatus::Canceled;
        subscription.cancel_at_period_end = false;
        subscription.trial_end = None;
        "Subscription canceled immediately".to_string()
    } else {
        subscription.cancel_at_period_end = true;
        format!(
            "Subscription scheduled to cancel at period end ({})",
            subscription.current_period_end
        )
    };

    let event = BillingEventBuilder::new(current.org_id, BillingEventType::SubscriptionCanceled)
        .plan(current.plan_id)
        .description(description);

    tracing::info!(
        org_id = %current.org_id,
        immediate,
        status = %subscription.status,
        "Subscription canceled"
    );

    Ok(Applied {
        subscription,
        events: vec![event],
    })
}

/// Reactivate a subscription.
///
/// Clears a pending cancel on a still-live subscription, or starts a fresh
/// billing period on the last-known plan when the subscription has reached
/// a terminal state.
pub fn reactivate(current: Option<&Subscription>, now: OffsetDateTime) -> BillingResult<Applied> {
    let current = current.ok_or(BillingError::NothingToReactivate)?;

    if !current.status.is_terminal() {
        if !current.cancel_at_period_end {
            return Err(BillingError::Validation(
                "subscription is already active with no pending cancellation".to_string(),
            ));
        }
        // Rescind the scheduled cancel. No money moves, so no ledger event.
        let mut subscription = current.clone();
        subscription.cancel_at_period_end = false;
        subscription.canceled_at = None;
        subscription.updated_at = now;

        tracing::info!(org_id = %current.org_id, "Pending cancellation cleared");

        return Ok(Applied {
            subscription,
            events: vec![],
        });
    }

    // Terminal: start a brand-new billing period on the last-known plan.
    let plan = catalog::plan(current.plan_id);
    let amount = plan.price_for(current.billing_interval);

    let mut subscription = current.clone();
    subscription.status = SubscriptionStatus::Active;
    subscription.current_period_start = now;
    subscription.current_period_end = period::period_end_for(now, current.billing_interval);
    subscription.amount = amount;
    subscription.trial_end = None;
    subscription.cancel_at_period_end = false;
    subscription.canceled_at = None;
    subscription.updated_at = now;

    let events = vec![
        BillingEventBuilder::new(current.org_id, BillingEventType::SubscriptionCreated)
            .plan(current.plan_id)
            .amount(amount)
            .description(format!("Subscription reactivated on {}", plan.id)),
        BillingEventBuilder::new(current.org_id, BillingEventType::Payment)
            .plan(current.plan_id)
            .amount(amount)
            .description(format!(
                "Payment for {} period",
                current.billing_interval
            )),
    ];

    tracing::info!(
        org_id = %current.org_id,
        plan = %current.plan_id,
        "Subscription reactivated with a new period"
    );

    Ok(Applied {
        subscription,
        events,
    })
}

/// Record a simulated payment outcome.
///
/// A succeeded outcome recovers a past_due subscription to active; a
/// failed outcome on an active subscription moves it to past_due. The
/// payment event is always appended with the outcome's status.
pub fn record_payment_outcome(
    current: &Subscription,
    outcome: BillingEventStatus,
    now: OffsetDateTime,
) -> BillingResult<Applied> {
    if !current.status.is_entitled() {
        return Err(BillingError::NoActiveSubscription);
    }

    let mut subscription = current.clone();
    match (current.status, outcome) {
        (SubscriptionStatus::PastDue, BillingEventStatus::Succeeded) => {
            subscription.status = SubscriptionStatus::Active;
        }
        (SubscriptionStatus::Active, BillingEventStatus::Failed) => {
            subscription.status = SubscriptionStatus::PastDue;
        }
        _ => {}
    }
    subscription.updated_at = now;

    let event = BillingEventBuilder::new(current.org_id, BillingEventType::Payment)
        .plan(current.plan_id)
        .amount(current.amount)
        .status(outcome)
        .description(format!(
            "Payment {} for {} period",
            match outcome {
                BillingEventStatus::Succeeded => "succeeded",
                BillingEventStatus::Failed => "failed",
                BillingEventStatus::Pending => "pending",
                BillingEventStatus::Refunded => "refunded",
            },
            current.billing_interval
        ));

    tracing::info!(
        org_id = %current.org_id,
        outcome = ?outcome,
        from_status = %current.status,
        to_status = %subscription.status,
        "Payment outcome recorded"
    );

    Ok(Applied {
        subscription,
        events: vec![event],
    })
}
