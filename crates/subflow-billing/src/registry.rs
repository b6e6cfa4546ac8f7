//! Plan storage, payout updates, and permission delegation.

use std::sync::Arc;

use subflow_core::events::{Event, EventLog};
use subflow_core::types::{
    AccountId, BillingModel, Permission, PlanId, TokenId, MIN_PERIOD_SECS,
};
use subflow_directory::TokenDirectory;
use subflow_store::{compose_key, KeyValueStore, TypedStore};

use crate::error::BillingError;
use crate::plan::{derive_plan_id, PayoutConfig, Plan, PlanCap};

/// Storage table for plan records.
pub const TABLE_PLANS: &str = "plans";

/// Storage table for the (plan, permission, account) delegation relation.
pub const TABLE_PLAN_PERMISSIONS: &str = "plan_permissions";

/// Plan registry for one billing model.
pub struct PlanRegistry {
    model: BillingModel,
    store: Arc<dyn KeyValueStore>,
    directory: Arc<TokenDirectory>,
    events: Arc<EventLog>,
}

fn permission_key(plan_id: &PlanId, permission: Permission, account: &AccountId) -> Vec<u8> {
    compose_key(&[
        plan_id.as_bytes(),
        &[permission.tag()],
        account.as_str().as_bytes(),
    ])
}

impl PlanRegistry {
    /// Create a registry for `model` over the given store.
    pub fn new(
        model: BillingModel,
        store: Arc<dyn KeyValueStore>,
        directory: Arc<TokenDirectory>,
        events: Arc<EventLog>,
    ) -> Self {
        Self {
            model,
            store,
            directory,
            events,
        }
    }

    /// The billing model this registry serves.
    pub fn model(&self) -> BillingModel {
        self.model
    }

    /// Create a plan with the current time as its creation instant.
    pub fn create_plan(
        &self,
        creator: &AccountId,
        name: &str,
        token: &TokenId,
        period_secs: u64,
        payout: PayoutConfig,
        cap: PlanCap,
    ) -> Result<PlanId, BillingError> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        self.create_plan_at(creator, name, token, period_secs, payout, cap, now)
    }

    /// Create a plan at an explicit creation instant.
    pub fn create_plan_at(
        &self,
        creator: &AccountId,
        name: &str,
        token: &TokenId,
        period_secs: u64,
        payout: PayoutConfig,
        cap: PlanCap,
        now: u64,
    ) -> Result<PlanId, BillingError> {
        if creator.is_empty() {
            return Err(BillingError::InvalidPlan("empty creator account".into()));
        }
        if name.is_empty() {
            return Err(BillingError::InvalidPlan("empty plan name".into()));
        }
        if period_secs < MIN_PERIOD_SECS {
            return Err(BillingError::InvalidPlan(format!(
                "period must be at least {} seconds, got {}",
                MIN_PERIOD_SECS, period_secs
            )));
        }
        if !self.directory.is_active(token)? {
            return Err(BillingError::InvalidPlan(format!(
                "token is not active: {}",
                token
            )));
        }
        payout.validate()?;
        self.check_model_pairing(&payout, &cap)?;

        let id = derive_plan_id(
            self.model, creator, name, token, period_secs, &payout, &cap, now,
        );
        let plan = Plan {
            id,
            model: self.model,
            admin: creator.clone(),
            name: name.to_string(),
            token: token.clone(),
            period_secs,
            payout,
            cap,
            created_at: now,
        };

        let inserted = self
            .store
            .insert_if_absent(TABLE_PLANS, id.as_bytes(), &plan)?;
        if !inserted {
            return Err(BillingError::PlanAlreadyExists(id));
        }

        self.events.emit(Event::PlanCreated {
            plan_id: id,
            model: self.model,
            admin: creator.clone(),
            token: token.clone(),
            period_secs,
        });
        Ok(id)
    }

    /// Fetch a plan of this registry's model.
    pub fn get_plan(&self, plan_id: &PlanId) -> Result<Plan, BillingError> {
        let plan: Plan = self
            .store
            .get(TABLE_PLANS, plan_id.as_bytes())?
            .ok_or(BillingError::PlanNotFound(*plan_id))?;
        // A plan created under another model's registry is invisible here.
        if plan.model != self.model {
            return Err(BillingError::PlanNotFound(*plan_id));
        }
        Ok(plan)
    }

    /// Whether `account` is the plan's admin.
    pub fn is_admin(&self, plan_id: &PlanId, account: &AccountId) -> Result<bool, BillingError> {
        Ok(self.get_plan(plan_id)?.admin == *account)
    }

    /// Whether `account` has been delegated `permission` on the plan.
    pub fn has_permission(
        &self,
        plan_id: &PlanId,
        permission: Permission,
        account: &AccountId,
    ) -> Result<bool, BillingError> {
        Ok(self
            .store
            .contains(TABLE_PLAN_PERMISSIONS, &permission_key(plan_id, permission, account))?)
    }

    /// Delegate `permission` to `account`. Admin-only; re-granting is a
    /// silent no-op with no event.
    pub fn grant_permission(
        &self,
        caller: &AccountId,
        plan_id: &PlanId,
        permission: Permission,
        account: &AccountId,
    ) -> Result<(), BillingError> {
        self.require_admin(plan_id, caller)?;
        if account.is_empty() {
            return Err(BillingError::InvalidPlan("empty grantee account".into()));
        }
        if self.has_permission(plan_id, permission, account)? {
            return Ok(());
        }
        self.store.put_raw(
            TABLE_PLAN_PERMISSIONS,
            &permission_key(plan_id, permission, account),
            &[1],
        )?;
        self.events.emit(Event::PermissionGranted {
            plan_id: *plan_id,
            permission,
            account: account.clone(),
        });
        Ok(())
    }

    /// Revoke a delegated permission. Admin-only; revoking an absent
    /// grant is a silent no-op with no event.
    pub fn revoke_permission(
        &self,
        caller: &AccountId,
        plan_id: &PlanId,
        permission: Permission,
        account: &AccountId,
    ) -> Result<(), BillingError> {
        self.require_admin(plan_id, caller)?;
        if !self.has_permission(plan_id, permission, account)? {
            return Ok(());
        }
        self.store.delete_raw(
            TABLE_PLAN_PERMISSIONS,
            &permission_key(plan_id, permission, account),
        )?;
        self.events.emit(Event::PermissionRevoked {
            plan_id: *plan_id,
            permission,
            account: account.clone(),
        });
        Ok(())
    }

    /// Replace the plan's payout configuration. Admin-only. Fixed-amount
    /// payouts must preserve the previous total; share payouts must still
    /// sum to 10000 basis points.
    pub fn change_receivers(
        &self,
        caller: &AccountId,
        plan_id: &PlanId,
        payout: PayoutConfig,
    ) -> Result<(), BillingError> {
        let mut plan = self.get_plan(plan_id)?;
        if plan.admin != *caller {
            return Err(BillingError::Unauthorized {
                plan_id: *plan_id,
                account: caller.clone(),
            });
        }
        payout.validate()?;
        self.check_model_pairing(&payout, &plan.cap)?;

        if let Some(previous_total) = plan.payout.fixed_total() {
            let previous_total = previous_total?;
            // fixed_total is Some for fixed payouts only, and the pairing
            // check above guarantees the replacement is fixed too.
            let new_total = match payout.fixed_total() {
                Some(total) => total?,
                None => {
                    return Err(BillingError::InvalidPlan(
                        "fixed-amount payout cannot become a share payout".into(),
                    ))
                }
            };
            if new_total != previous_total {
                return Err(BillingError::InvalidPlan(format!(
                    "fixed payout total must stay {}, got {}",
                    previous_total, new_total
                )));
            }
        }

        plan.payout = payout;
        let receiver_count = plan.payout.receiver_count();
        self.store.put(TABLE_PLANS, plan_id.as_bytes(), &plan)?;
        self.events.emit(Event::ReceiverChanged {
            plan_id: *plan_id,
            admin: caller.clone(),
            receiver_count,
        });
        Ok(())
    }

    fn require_admin(&self, plan_id: &PlanId, caller: &AccountId) -> Result<(), BillingError> {
        if !self.is_admin(plan_id, caller)? {
            return Err(BillingError::Unauthorized {
                plan_id: *plan_id,
                account: caller.clone(),
            });
        }
        Ok(())
    }

    fn check_model_pairing(
        &self,
        payout: &PayoutConfig,
        cap: &PlanCap,
    ) -> Result<(), BillingError> {
        match (self.model, payout, cap) {
            (BillingModel::FixedRecurring, PayoutConfig::FixedAmounts(_), PlanCap::None) => Ok(()),
            (BillingModel::VariableRecurring, PayoutConfig::Shares(_), PlanCap::MaxAmount(max)) => {
                if *max == 0 {
                    Err(BillingError::InvalidPlan("zero max amount".into()))
                } else {
                    Ok(())
                }
            }
            (BillingModel::OnDemand, PayoutConfig::Shares(_), PlanCap::MinAllowance(min)) => {
                if *min == 0 {
                    Err(BillingError::InvalidPlan("zero minimum allowance".into()))
                } else {
                    Ok(())
                }
            }
            _ => Err(BillingError::InvalidPlan(format!(
                "payout/cap configuration does not fit the {} model",
                self.model
            ))),
        }
    }
}
