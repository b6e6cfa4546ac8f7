//! Per-model billing engine: subscription lifecycle plus batch billing.
//!
//! `bill` runs in three phases: call-level guards (authorization, shape,
//! duplicate ids), an order-preserving eligibility filter, and one
//! settlement batch for the whole eligible set. An item that fails at
//! settlement leaves its subscription exactly as it was, so the operator
//! can retry forever; forced termination is the escape hatch.

use std::sync::Arc;

use subflow_core::events::{Event, EventLog};
use subflow_core::has_duplicates;
use subflow_core::types::{
    AccountId, Amount, BillingModel, CorrelationTag, Permission, PlanId, Role, SubscriptionId,
};
use subflow_directory::RoleGate;
use subflow_settlement::Settlement;

use crate::error::BillingError;
use crate::ledger::SubscriptionLedger;
use crate::plan::Plan;
use crate::registry::PlanRegistry;
use crate::subscription::{derive_subscription_id, CycleState, Subscription};

/// Per-item result of a `bill` call, aligned with the submitted id list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillOutcome {
    /// The item was billed and its cycle state advanced.
    Billed,
    /// The item was eligible but settlement reported failure; state is
    /// untouched and the item may be retried.
    Failed,
    /// The item was filtered out as ineligible; nothing happened.
    Skipped,
}

/// Billing engine bound to one model's plan registry and subscriptions.
pub struct BillingEngine {
    model: BillingModel,
    plans: Arc<PlanRegistry>,
    subs: Arc<SubscriptionLedger>,
    settlement: Arc<Settlement>,
    roles: Arc<RoleGate>,
    events: Arc<EventLog>,
}

fn now_ts() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Whether the cycle opened at `cycle_start` has fully elapsed at `now`.
fn cycle_due(cycle_start: u64, period: u64, now: u64) -> bool {
    match cycle_start.checked_add(period) {
        Some(end) => end - 1 < now,
        None => false,
    }
}

struct EligibleItem {
    index: usize,
    sub: Subscription,
    amount: Amount,
    breakdown: Vec<Amount>,
}

impl BillingEngine {
    /// Create an engine over the given collaborators. The model is taken
    /// from the plan registry.
    pub fn new(
        plans: Arc<PlanRegistry>,
        subs: Arc<SubscriptionLedger>,
        settlement: Arc<Settlement>,
        roles: Arc<RoleGate>,
        events: Arc<EventLog>,
    ) -> Self {
        Self {
            model: plans.model(),
            plans,
            subs,
            settlement,
            roles,
            events,
        }
    }

    /// The billing model this engine serves.
    pub fn model(&self) -> BillingModel {
        self.model
    }

    /// The plan registry behind this engine.
    pub fn plans(&self) -> &PlanRegistry {
        &self.plans
    }

    /// Subscribe `account` to a fixed- or variable-recurring plan.
    ///
    /// Fixed-recurring pays the first cycle synchronously before the
    /// record is persisted; a failed first payment fails the whole call.
    /// Variable-recurring opens the first cycle unpaid (arrears).
    pub fn subscribe(
        &self,
        account: &AccountId,
        plan_id: &PlanId,
    ) -> Result<SubscriptionId, BillingError> {
        self.subscribe_at(account, plan_id, now_ts())
    }

    /// `subscribe` at an explicit instant.
    pub fn subscribe_at(
        &self,
        account: &AccountId,
        plan_id: &PlanId,
        now: u64,
    ) -> Result<SubscriptionId, BillingError> {
        if self.model == BillingModel::OnDemand {
            return Err(BillingError::AllowanceRequired);
        }
        if account.is_empty() {
            return Err(BillingError::InvalidAccount("empty subscriber".into()));
        }
        let plan = self.plans.get_plan(plan_id)?;
        if self.subs.is_subscribed(plan_id, account)? {
            return Err(BillingError::AlreadySubscribed {
                plan_id: *plan_id,
                account: account.clone(),
            });
        }

        let id = derive_subscription_id(plan_id, account, now);

        if self.model == BillingModel::FixedRecurring {
            // Payment in advance: the first cycle is settled before the
            // record exists.
            let amounts = plan.payout.breakdown(0)?;
            let total = match plan.payout.fixed_total() {
                Some(total) => total?,
                None => return Err(BillingError::InvalidPlan("missing fixed amounts".into())),
            };
            let ok = self.settlement.transfer(
                &plan.token,
                account,
                &plan.payout.receivers(),
                &amounts,
                &plan.admin,
                self.model.payment_kind(),
                id.into(),
            )?;
            if !ok {
                return Err(BillingError::FirstPaymentFailed(id));
            }
            let sub = Subscription::recurring(id, account.clone(), *plan_id, now);
            self.subs.insert(&sub)?;
            self.events.emit(Event::Subscribed {
                subscription_id: id,
                plan_id: *plan_id,
                account: account.clone(),
                subscribed_at: now,
            });
            self.events.emit(Event::Billing {
                subscription_id: id,
                plan_id: *plan_id,
                account: account.clone(),
                amount: total,
                billed_at: now,
            });
        } else {
            let sub = Subscription::recurring(id, account.clone(), *plan_id, now);
            self.subs.insert(&sub)?;
            self.events.emit(Event::Subscribed {
                subscription_id: id,
                plan_id: *plan_id,
                account: account.clone(),
                subscribed_at: now,
            });
        }

        tracing::info!(subscription_id = %id, plan_id = %plan_id, account = %account, "subscribed");
        Ok(id)
    }

    /// Subscribe `account` to an on-demand plan with its allowance
    /// ceiling. No payment occurs at subscription time.
    pub fn subscribe_on_demand(
        &self,
        account: &AccountId,
        plan_id: &PlanId,
        allowance: Amount,
    ) -> Result<SubscriptionId, BillingError> {
        self.subscribe_on_demand_at(account, plan_id, allowance, now_ts())
    }

    /// `subscribe_on_demand` at an explicit instant.
    pub fn subscribe_on_demand_at(
        &self,
        account: &AccountId,
        plan_id: &PlanId,
        allowance: Amount,
        now: u64,
    ) -> Result<SubscriptionId, BillingError> {
        if self.model != BillingModel::OnDemand {
            return Err(BillingError::ModelMismatch {
                expected: BillingModel::OnDemand,
                actual: self.model,
            });
        }
        if account.is_empty() {
            return Err(BillingError::InvalidAccount("empty subscriber".into()));
        }
        let plan = self.plans.get_plan(plan_id)?;
        let minimum = plan.min_allowance().unwrap_or(0);
        if allowance < minimum {
            return Err(BillingError::AllowanceBelowMinimum { allowance, minimum });
        }
        if self.subs.is_subscribed(plan_id, account)? {
            return Err(BillingError::AlreadySubscribed {
                plan_id: *plan_id,
                account: account.clone(),
            });
        }

        let id = derive_subscription_id(plan_id, account, now);
        let sub = Subscription::on_demand(id, account.clone(), *plan_id, now, allowance);
        self.subs.insert(&sub)?;
        self.events.emit(Event::Subscribed {
            subscription_id: id,
            plan_id: *plan_id,
            account: account.clone(),
            subscribed_at: now,
        });
        tracing::info!(subscription_id = %id, plan_id = %plan_id, account = %account, "subscribed");
        Ok(id)
    }

    /// Cancel a subscription immediately. Subscriber-only. Variable-
    /// recurring subscriptions cancel at the next successful billing
    /// instead; see [`BillingEngine::request_cancellation`].
    pub fn cancel(
        &self,
        caller: &AccountId,
        subscription_id: &SubscriptionId,
    ) -> Result<(), BillingError> {
        let sub = self.subs.require(subscription_id)?;
        if sub.account != *caller {
            return Err(BillingError::NotSubscriber {
                subscription_id: *subscription_id,
                account: caller.clone(),
            });
        }
        if self.model == BillingModel::VariableRecurring {
            return Err(BillingError::CancellationDeferred);
        }
        self.subs.remove(subscription_id)?;
        self.events.emit(Event::SubscriptionCancelled {
            subscription_id: *subscription_id,
            plan_id: sub.plan_id,
            account: sub.account,
        });
        Ok(())
    }

    /// Request cancellation of a variable-recurring subscription; honored
    /// at the next successful billing. Subscriber-only.
    pub fn request_cancellation(
        &self,
        caller: &AccountId,
        subscription_id: &SubscriptionId,
    ) -> Result<(), BillingError> {
        self.request_cancellation_at(caller, subscription_id, now_ts())
    }

    /// `request_cancellation` at an explicit instant.
    pub fn request_cancellation_at(
        &self,
        caller: &AccountId,
        subscription_id: &SubscriptionId,
        now: u64,
    ) -> Result<(), BillingError> {
        if self.model != BillingModel::VariableRecurring {
            return Err(BillingError::ModelMismatch {
                expected: BillingModel::VariableRecurring,
                actual: self.model,
            });
        }
        let mut sub = self.subs.require(subscription_id)?;
        if sub.account != *caller {
            return Err(BillingError::NotSubscriber {
                subscription_id: *subscription_id,
                account: caller.clone(),
            });
        }
        let CycleState::Recurring {
            cancellation_requested,
            ..
        } = &mut sub.state
        else {
            return Err(BillingError::SubscriptionNotFound(*subscription_id));
        };
        // The first request's timestamp sticks.
        if *cancellation_requested == 0 {
            *cancellation_requested = now;
            self.subs.update(&sub)?;
            tracing::info!(subscription_id = %subscription_id, "cancellation requested");
        }
        Ok(())
    }

    /// Change an on-demand subscription's allowance ceiling.
    /// Subscriber-only; never below the plan minimum.
    pub fn change_allowance(
        &self,
        caller: &AccountId,
        subscription_id: &SubscriptionId,
        new_allowance: Amount,
    ) -> Result<(), BillingError> {
        if self.model != BillingModel::OnDemand {
            return Err(BillingError::ModelMismatch {
                expected: BillingModel::OnDemand,
                actual: self.model,
            });
        }
        let mut sub = self.subs.require(subscription_id)?;
        if sub.account != *caller {
            return Err(BillingError::NotSubscriber {
                subscription_id: *subscription_id,
                account: caller.clone(),
            });
        }
        let plan = self.plans.get_plan(&sub.plan_id)?;
        let minimum = plan.min_allowance().unwrap_or(0);
        if new_allowance < minimum {
            return Err(BillingError::AllowanceBelowMinimum {
                allowance: new_allowance,
                minimum,
            });
        }
        let CycleState::OnDemand { allowance, .. } = &mut sub.state else {
            return Err(BillingError::SubscriptionNotFound(*subscription_id));
        };
        *allowance = new_allowance;
        self.subs.update(&sub)?;
        self.events.emit(Event::AllowanceUpdated {
            subscription_id: *subscription_id,
            plan_id: sub.plan_id,
            account: sub.account,
            allowance: new_allowance,
        });
        Ok(())
    }

    /// Bill a batch of subscriptions against one plan.
    ///
    /// `amounts` carries the requested amount per id for variable-
    /// recurring and on-demand billing and must be empty for
    /// fixed-recurring. Guarded by admin-or-delegated-BILL.
    pub fn bill(
        &self,
        caller: &AccountId,
        plan_id: &PlanId,
        ids: &[SubscriptionId],
        amounts: &[Amount],
    ) -> Result<Vec<BillOutcome>, BillingError> {
        self.bill_at(caller, plan_id, ids, amounts, now_ts())
    }

    /// `bill` at an explicit instant.
    pub fn bill_at(
        &self,
        caller: &AccountId,
        plan_id: &PlanId,
        ids: &[SubscriptionId],
        amounts: &[Amount],
        now: u64,
    ) -> Result<Vec<BillOutcome>, BillingError> {
        let plan = self.plans.get_plan(plan_id)?;
        self.authorize(&plan, caller, Permission::Bill)?;

        if self.model == BillingModel::FixedRecurring {
            if !amounts.is_empty() {
                return Err(BillingError::AmountsNotAllowed);
            }
        } else if amounts.len() != ids.len() {
            return Err(BillingError::LengthMismatch {
                expected: ids.len(),
                got: amounts.len(),
            });
        }
        if has_duplicates(ids)? {
            return Err(BillingError::DuplicateInBatch);
        }

        let fixed_amount = match plan.payout.fixed_total() {
            Some(total) => Some(total?),
            None => None,
        };

        let mut outcomes = vec![BillOutcome::Skipped; ids.len()];
        let mut eligible: Vec<EligibleItem> = Vec::new();

        for (i, id) in ids.iter().enumerate() {
            let Some(sub) = self.subs.get(id)? else {
                continue;
            };
            if sub.plan_id != *plan_id {
                continue;
            }
            let requested = match self.model {
                // Pairing validation guarantees fixed plans carry fixed
                // amounts.
                BillingModel::FixedRecurring => fixed_amount.unwrap_or(0),
                _ => amounts[i],
            };
            if !self.is_eligible(&plan, &sub, requested, now) {
                continue;
            }
            let breakdown = plan.payout.breakdown(requested)?;
            eligible.push(EligibleItem {
                index: i,
                sub,
                amount: requested,
                breakdown,
            });
        }

        if eligible.is_empty() {
            return Err(BillingError::NoEligibleSubscriptions);
        }

        let senders: Vec<AccountId> = eligible.iter().map(|e| e.sub.account.clone()).collect();
        let amount_rows: Vec<Vec<Amount>> = eligible.iter().map(|e| e.breakdown.clone()).collect();
        let tags: Vec<CorrelationTag> = eligible.iter().map(|e| e.sub.id.into()).collect();

        let results = self.settlement.batch_transfer(
            &plan.token,
            &senders,
            &plan.payout.receivers(),
            &amount_rows,
            &plan.admin,
            self.model.payment_kind(),
            &tags,
        )?;

        for (k, item) in eligible.into_iter().enumerate() {
            if !results[k] {
                self.events.emit(Event::BillingFailed {
                    subscription_id: item.sub.id,
                    plan_id: *plan_id,
                    account: item.sub.account.clone(),
                    amount: item.amount,
                });
                outcomes[item.index] = BillOutcome::Failed;
                continue;
            }
            self.apply_success(&plan, item.sub, item.amount, now)?;
            outcomes[item.index] = BillOutcome::Billed;
        }

        Ok(outcomes)
    }

    /// Forcibly remove subscriptions from a plan, independent of cycle
    /// state, with no settlement call and no refund. Open to the plan
    /// admin, delegated-TERMINATE holders, and NETWORK_SERVICE accounts.
    /// Returns the number removed.
    pub fn terminate(
        &self,
        caller: &AccountId,
        plan_id: &PlanId,
        ids: &[SubscriptionId],
    ) -> Result<usize, BillingError> {
        let plan = self.plans.get_plan(plan_id)?;
        if !self.roles.has(Role::NetworkService, caller)? {
            self.authorize(&plan, caller, Permission::Terminate)?;
        }

        let mut removed = 0;
        for id in ids {
            let Some(sub) = self.subs.get(id)? else {
                continue;
            };
            if sub.plan_id != *plan_id {
                continue;
            }
            self.subs.remove(id)?;
            self.events.emit(Event::SubscriptionTerminated {
                subscription_id: *id,
                plan_id: *plan_id,
                account: sub.account,
            });
            removed += 1;
        }
        Ok(removed)
    }

    /// Fetch a subscription, if present.
    pub fn get_subscription(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, BillingError> {
        self.subs.get(id)
    }

    /// The active subscription id for (plan, account), if any.
    pub fn subscription_id_for(
        &self,
        plan_id: &PlanId,
        account: &AccountId,
    ) -> Result<Option<SubscriptionId>, BillingError> {
        self.subs.id_for(plan_id, account)
    }

    /// Whether (plan, account) has an active subscription.
    pub fn is_subscribed(
        &self,
        plan_id: &PlanId,
        account: &AccountId,
    ) -> Result<bool, BillingError> {
        self.subs.is_subscribed(plan_id, account)
    }

    fn authorize(
        &self,
        plan: &Plan,
        caller: &AccountId,
        permission: Permission,
    ) -> Result<(), BillingError> {
        if plan.admin == *caller || self.plans.has_permission(&plan.id, permission, caller)? {
            return Ok(());
        }
        Err(BillingError::Unauthorized {
            plan_id: plan.id,
            account: caller.clone(),
        })
    }

    /// The eligibility predicate, computed per batch item and never
    /// persisted. Ineligible items are skipped silently: they are not
    /// failures.
    fn is_eligible(&self, plan: &Plan, sub: &Subscription, amount: Amount, now: u64) -> bool {
        match (&sub.state, self.model) {
            (CycleState::Recurring { cycle_start, .. }, BillingModel::FixedRecurring) => {
                cycle_due(*cycle_start, plan.period_secs, now)
            }
            (
                CycleState::Recurring {
                    cycle_start,
                    cancellation_requested,
                },
                BillingModel::VariableRecurring,
            ) => {
                if plan.max_amount().is_some_and(|max| amount > max) {
                    return false;
                }
                cycle_due(*cycle_start, plan.period_secs, now) || *cancellation_requested != 0
            }
            (
                CycleState::OnDemand {
                    allowance,
                    spent,
                    latest_billing,
                },
                BillingModel::OnDemand,
            ) => {
                if amount == 0 || amount > *allowance {
                    return false;
                }
                let window =
                    |t: u64| t.saturating_sub(sub.subscribed_at) / plan.period_secs;
                if *latest_billing != 0 && window(now) == window(*latest_billing) {
                    match spent.checked_add(amount) {
                        Some(total) => total <= *allowance,
                        None => false,
                    }
                } else {
                    true
                }
            }
            _ => false,
        }
    }

    fn apply_success(
        &self,
        plan: &Plan,
        mut sub: Subscription,
        amount: Amount,
        now: u64,
    ) -> Result<(), BillingError> {
        match &mut sub.state {
            CycleState::Recurring {
                cycle_start,
                cancellation_requested,
            } => {
                if *cancellation_requested != 0 {
                    // The pending cancellation is honored instead of
                    // opening another cycle.
                    self.subs.remove(&sub.id)?;
                    self.events.emit(Event::SubscriptionCancelled {
                        subscription_id: sub.id,
                        plan_id: sub.plan_id,
                        account: sub.account,
                    });
                    return Ok(());
                }
                // Advance by exactly one period, never to `now`, so a late
                // bill does not shift the customer's cycle anchor.
                *cycle_start = cycle_start
                    .checked_add(plan.period_secs)
                    .ok_or(BillingError::Overflow)?;
            }
            CycleState::OnDemand {
                spent,
                latest_billing,
                ..
            } => {
                let window =
                    |t: u64| t.saturating_sub(sub.subscribed_at) / plan.period_secs;
                let same_window = *latest_billing != 0 && window(now) == window(*latest_billing);
                *spent = if same_window {
                    spent.checked_add(amount).ok_or(BillingError::Overflow)?
                } else {
                    amount
                };
                *latest_billing = now;
            }
        }
        self.events.emit(Event::Billing {
            subscription_id: sub.id,
            plan_id: sub.plan_id,
            account: sub.account.clone(),
            amount,
            billed_at: now,
        });
        self.subs.update(&sub)?;
        Ok(())
    }
}
