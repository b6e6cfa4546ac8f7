//! Subscription record storage with the active-subscription index.

use std::sync::Arc;

use subflow_core::types::{AccountId, PlanId, SubscriptionId};
use subflow_store::{compose_key, KeyValueStore, TypedStore};

use crate::error::BillingError;
use crate::subscription::Subscription;

/// Storage table for subscription records.
pub const TABLE_SUBSCRIPTIONS: &str = "subscriptions";

/// Storage table for the (plan, account) -> active subscription index.
pub const TABLE_SUBSCRIPTION_INDEX: &str = "subscription_index";

/// Subscription storage. The secondary index enforces at most one active
/// subscription per (plan, account) pair; removal clears record and index
/// together.
pub struct SubscriptionLedger {
    store: Arc<dyn KeyValueStore>,
}

fn index_key(plan_id: &PlanId, account: &AccountId) -> Vec<u8> {
    compose_key(&[plan_id.as_bytes(), account.as_str().as_bytes()])
}

impl SubscriptionLedger {
    /// Create a ledger over the given store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Insert a new subscription, enforcing both uniqueness invariants.
    pub fn insert(&self, subscription: &Subscription) -> Result<(), BillingError> {
        let index = index_key(&subscription.plan_id, &subscription.account);
        if self.store.contains(TABLE_SUBSCRIPTION_INDEX, &index)? {
            return Err(BillingError::AlreadySubscribed {
                plan_id: subscription.plan_id,
                account: subscription.account.clone(),
            });
        }
        let inserted = self.store.insert_if_absent(
            TABLE_SUBSCRIPTIONS,
            subscription.id.as_bytes(),
            subscription,
        )?;
        if !inserted {
            return Err(BillingError::SubscriptionAlreadyExists(subscription.id));
        }
        self.store
            .put(TABLE_SUBSCRIPTION_INDEX, &index, &subscription.id)?;
        Ok(())
    }

    /// Fetch a subscription, if present.
    pub fn get(&self, id: &SubscriptionId) -> Result<Option<Subscription>, BillingError> {
        Ok(self.store.get(TABLE_SUBSCRIPTIONS, id.as_bytes())?)
    }

    /// Fetch a subscription or fail.
    pub fn require(&self, id: &SubscriptionId) -> Result<Subscription, BillingError> {
        self.get(id)?.ok_or(BillingError::SubscriptionNotFound(*id))
    }

    /// Persist updated cycle state for an existing subscription.
    pub fn update(&self, subscription: &Subscription) -> Result<(), BillingError> {
        self.store.put(
            TABLE_SUBSCRIPTIONS,
            subscription.id.as_bytes(),
            subscription,
        )?;
        Ok(())
    }

    /// Remove a subscription, clearing its record and its index entry.
    pub fn remove(&self, id: &SubscriptionId) -> Result<(), BillingError> {
        let subscription = self.require(id)?;
        self.store.delete_raw(TABLE_SUBSCRIPTIONS, id.as_bytes())?;
        self.store.delete_raw(
            TABLE_SUBSCRIPTION_INDEX,
            &index_key(&subscription.plan_id, &subscription.account),
        )?;
        Ok(())
    }

    /// The active subscription id for (plan, account), if any.
    pub fn id_for(
        &self,
        plan_id: &PlanId,
        account: &AccountId,
    ) -> Result<Option<SubscriptionId>, BillingError> {
        Ok(self
            .store
            .get(TABLE_SUBSCRIPTION_INDEX, &index_key(plan_id, account))?)
    }

    /// Whether (plan, account) has an active subscription.
    pub fn is_subscribed(
        &self,
        plan_id: &PlanId,
        account: &AccountId,
    ) -> Result<bool, BillingError> {
        Ok(self.id_for(plan_id, account)?.is_some())
    }
}
