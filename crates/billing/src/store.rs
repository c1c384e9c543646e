//! In-memory account store
//!
//! Holds the one mutable piece of shared state: each organization's
//! subscription record and stored payment methods. Commands against the
//! same organization take the per-account mutex for their whole
//! read-modify-write, giving the single-writer-per-organization
//! discipline the lifecycle requires; different organizations proceed in
//! parallel.
//!
//! Subscriptions are never hard-deleted: terminal records stay in the
//! account, which is also what makes trial eligibility ("ever subscribed")
//! checkable.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use tradecrm_shared::{OrgId, PaymentMethod, Subscription};

/// Per-organization billing state.
#[derive(Debug, Clone, Default)]
pub struct OrgAccount {
    pub subscription: Option<Subscription>,
    pub payment_methods: Vec<PaymentMethod>,
}

impl OrgAccount {
    /// The default payment method, if one is stored.
    pub fn default_payment_method(&self) -> Option<&PaymentMethod> {
        self.payment_methods.iter().find(|pm| pm.is_default)
    }

    /// Store a payment method as the new default, clearing the flag on
    /// any previous default. Storing never charges anything.
    pub fn upsert_payment_method(&mut self, mut method: PaymentMethod) -> Uuid {
        method.is_default = true;
        for existing in &mut self.payment_methods {
            existing.is_default = false;
        }
        let id = method.id;
        self.payment_methods.push(method);
        id
    }
}

/// Account store keyed by organization.
#[derive(Debug, Default)]
pub struct AccountStore {
    accounts: RwLock<HashMap<OrgId, Arc<Mutex<OrgAccount>>>>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get-or-create the account handle for an organization. The returned
    /// mutex is what serializes commands against this organization.
    pub async fn account(&self, org_id: OrgId) -> Arc<Mutex<OrgAccount>> {
        {
            let accounts = self.accounts.read().await;
            if let Some(account) = accounts.get(&org_id) {
                return Arc::clone(account);
            }
        }
        let mut accounts = self.accounts.write().await;
        Arc::clone(accounts.entry(org_id).or_default())
    }

    /// Point-in-time copy of one organization's subscription.
    pub async fn subscription(&self, org_id: OrgId) -> Option<Subscription> {
        let account = self.account(org_id).await;
        let guard = account.lock().await;
        guard.subscription.clone()
    }

    /// Point-in-time copy of every account, for invariant checks.
    pub async fn snapshot(&self) -> Vec<(OrgId, OrgAccount)> {
        let accounts = self.accounts.read().await;
        let mut snapshot = Vec::with_capacity(accounts.len());
        for (org_id, account) in accounts.iter() {
            let guard = account.lock().await;
            snapshot.push((*org_id, guard.clone()));
        }
        snapshot
    }
}
