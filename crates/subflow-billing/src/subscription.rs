use serde::{Deserialize, Serialize};

use subflow_core::types::{AccountId, Amount, PlanId, SubscriptionId};

/// Per-model cycle state of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleState {
    /// Fixed- and variable-recurring: the currently open, unbilled cycle.
    Recurring {
        /// Start of the open cycle. Advances by exactly one period per
        /// successful billing, never to "now".
        cycle_start: u64,
        /// Cancellation request timestamp; zero means none. Only
        /// variable-recurring subscriptions ever set this.
        cancellation_requested: u64,
    },
    /// On-demand: allowance ceiling and usage within the current window.
    OnDemand {
        /// Customer-set per-cycle ceiling, never below the plan minimum.
        allowance: Amount,
        /// Amount billed within the cycle window containing
        /// `latest_billing`.
        spent: Amount,
        /// Timestamp of the last successful billing; zero means never.
        latest_billing: u64,
    },
}

/// A live subscription. `account`, `plan_id`, and `subscribed_at` are
/// immutable once set; destruction removes the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub account: AccountId,
    pub plan_id: PlanId,
    pub subscribed_at: u64,
    pub state: CycleState,
}

impl Subscription {
    /// A recurring subscription whose first cycle opens at `subscribed_at`.
    pub fn recurring(
        id: SubscriptionId,
        account: AccountId,
        plan_id: PlanId,
        subscribed_at: u64,
    ) -> Self {
        Self {
            id,
            account,
            plan_id,
            subscribed_at,
            state: CycleState::Recurring {
                cycle_start: subscribed_at,
                cancellation_requested: 0,
            },
        }
    }

    /// An on-demand subscription with its initial allowance and no usage.
    pub fn on_demand(
        id: SubscriptionId,
        account: AccountId,
        plan_id: PlanId,
        subscribed_at: u64,
        allowance: Amount,
    ) -> Self {
        Self {
            id,
            account,
            plan_id,
            subscribed_at,
            state: CycleState::OnDemand {
                allowance,
                spent: 0,
                latest_billing: 0,
            },
        }
    }
}

fn push_segment(payload: &mut Vec<u8>, bytes: &[u8]) {
    payload.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    payload.extend_from_slice(bytes);
}

/// Content-addressed subscription id over plan, subscriber, and
/// subscription time.
pub fn derive_subscription_id(
    plan_id: &PlanId,
    account: &AccountId,
    subscribed_at: u64,
) -> SubscriptionId {
    let mut payload = Vec::new();
    push_segment(&mut payload, plan_id.as_bytes());
    push_segment(&mut payload, account.as_str().as_bytes());
    payload.extend_from_slice(&subscribed_at.to_be_bytes());
    SubscriptionId::from_bytes(*blake3::hash(&payload).as_bytes())
}
