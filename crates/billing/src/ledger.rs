//! Billing ledger
//!
//! Append-only log of billing events. Write-once, read-many: the ledger is
//! the audit trail and the sole source for billing history views, and the
//! lifecycle never replays it to derive current state. Events are
//! immutable once written.

use std::collections::HashMap;

use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use tradecrm_shared::{BillingEvent, BillingEventStatus, BillingEventType, OrgId, PlanId};

use crate::catalog::CURRENCY;
use crate::error::{BillingError, BillingResult};

/// Builder for a billing event. The lifecycle constructs one per applied
/// transition; the orchestrator appends it.
#[derive(Debug, Clone)]
pub struct BillingEventBuilder {
    org_id: OrgId,
    event_type: BillingEventType,
    amount: i64,
    status: BillingEventStatus,
    description: String,
    plan_id: Option<PlanId>,
    invoice_number: Option<String>,
}

impl BillingEventBuilder {
    pub fn new(org_id: OrgId, event_type: BillingEventType) -> Self {
        Self {
            org_id,
            event_type,
            amount: 0,
            status: BillingEventStatus::Succeeded,
            description: String::new(),
            plan_id: None,
            invoice_number: None,
        }
    }

    pub fn amount(mut self, amount: i64) -> Self {
        self.amount = amount;
        self
    }

    pub fn status(mut self, status: BillingEventStatus) -> Self {
        self.status = status;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn plan(mut self, plan_id: PlanId) -> Self {
        self.plan_id = Some(plan_id);
        self
    }

    pub fn invoice_number(mut self, invoice_number: impl Into<String>) -> Self {
        self.invoice_number = Some(invoice_number.into());
        self
    }

    pub fn build(self) -> BillingEvent {
        BillingEvent {
            id: Uuid::new_v4(),
            org_id: self.org_id,
            seq: 0,
            event_type: self.event_type,
            amount: self.amount,
            currency: CURRENCY.to_string(),
            status: self.status,
            description: self.description,
            plan_id: self.plan_id,
            invoice_number: self.invoice_number,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Append-only billing event log, keyed by organization.
///
/// Safe for concurrent appends; single-row inserts are atomic under the
/// write lock and readers get point-in-time clones.
#[derive(Debug, Default)]
pub struct BillingLedger {
    events: RwLock<HashMap<OrgId, Vec<BillingEvent>>>,
}

impl BillingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, assigning its position in the organization's
    /// ledger. Amounts are stored non-negative for every type including
    /// refund, whose sign is carried by the type and applied by consumers
    /// when rendering.
    pub async fn append(&self, mut event: BillingEvent) -> BillingResult<BillingEvent> {
        if event.amount < 0 {
            return Err(BillingError::Validation(format!(
                "ledger amounts are non-negative, got {} for {}",
                event.amount, event.event_type
            )));
        }

        let mut events = self.events.write().await;
        let org_events = events.entry(event.org_id).or_default();
        event.seq = org_events.len() as u64;

        tracing::info!(
            org_id = %event.org_id,
            seq = event.seq,
            event_type = %event.event_type,
            amount_cents = event.amount,
            status = ?event.status,
            "Billing event recorded"
        );

        org_events.push(event.clone());
        Ok(event)
    }

    /// All events for an organization, newest first. Ordered by the append
    /// sequence, not timestamps: events written by one command share a
    /// near-identical `created_at` and must still read back in a stable
    /// order.
    pub async fn list_for(&self, org_id: OrgId) -> Vec<BillingEvent> {
        let events = self.events.read().await;
        let mut result = events.get(&org_id).cloned().unwrap_or_default();
        result.sort_by(|a, b| b.seq.cmp(&a.seq));
        result
    }

    /// Number of events recorded for an organization.
    pub async fn count_for(&self, org_id: OrgId) -> usize {
        let events = self.events.read().await;
        events.get(&org_id).map(Vec::len).unwrap_or(0)
    }
}
