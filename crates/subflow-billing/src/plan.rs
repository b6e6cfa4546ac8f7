//! Plan records and payout configuration.

use serde::{Deserialize, Serialize};

use subflow_core::types::{
    AccountId, Amount, BasisPoints, BillingModel, PlanId, TokenId, BPS_DENOMINATOR, MAX_RECEIVERS,
};

use crate::error::BillingError;

/// A receiver paid a fixed amount per billing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverAmount {
    pub account: AccountId,
    pub amount: Amount,
}

/// A receiver paid a percentage share of the billed amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverShare {
    pub account: AccountId,
    pub share_bps: BasisPoints,
}

/// How a billing is split across the plan's receivers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutConfig {
    /// Each receiver gets its own fixed amount; the billed total is the sum.
    FixedAmounts(Vec<ReceiverAmount>),
    /// Each receiver gets a basis-point share of the requested amount;
    /// shares sum to exactly 10000.
    Shares(Vec<ReceiverShare>),
}

impl PayoutConfig {
    /// Number of receivers.
    pub fn receiver_count(&self) -> usize {
        match self {
            Self::FixedAmounts(list) => list.len(),
            Self::Shares(list) => list.len(),
        }
    }

    /// The receiver accounts in payout order.
    pub fn receivers(&self) -> Vec<AccountId> {
        match self {
            Self::FixedAmounts(list) => list.iter().map(|r| r.account.clone()).collect(),
            Self::Shares(list) => list.iter().map(|r| r.account.clone()).collect(),
        }
    }

    /// Structural validation: 1..=MAX_RECEIVERS receivers, no empty
    /// account, no zero amount or share, shares summing to exactly 10000.
    pub fn validate(&self) -> Result<(), BillingError> {
        let count = self.receiver_count();
        if count == 0 {
            return Err(BillingError::InvalidPlan(
                "at least one receiver required".into(),
            ));
        }
        if count > MAX_RECEIVERS {
            return Err(BillingError::InvalidPlan(format!(
                "at most {} receivers allowed, got {}",
                MAX_RECEIVERS, count
            )));
        }
        match self {
            Self::FixedAmounts(list) => {
                for r in list {
                    if r.account.is_empty() {
                        return Err(BillingError::InvalidPlan("empty receiver account".into()));
                    }
                    if r.amount == 0 {
                        return Err(BillingError::InvalidPlan("zero receiver amount".into()));
                    }
                }
            }
            Self::Shares(list) => {
                let mut sum: u128 = 0;
                for r in list {
                    if r.account.is_empty() {
                        return Err(BillingError::InvalidPlan("empty receiver account".into()));
                    }
                    if r.share_bps == 0 {
                        return Err(BillingError::InvalidPlan("zero receiver share".into()));
                    }
                    sum += u128::from(r.share_bps);
                }
                if sum != BPS_DENOMINATOR {
                    return Err(BillingError::InvalidPlan(format!(
                        "shares must sum to {} basis points, got {}",
                        BPS_DENOMINATOR, sum
                    )));
                }
            }
        }
        Ok(())
    }

    /// Total of a fixed-amount payout. `None` for share payouts.
    pub fn fixed_total(&self) -> Option<Result<Amount, BillingError>> {
        match self {
            Self::FixedAmounts(list) => {
                let mut total: Amount = 0;
                for r in list {
                    total = match total.checked_add(r.amount) {
                        Some(t) => t,
                        None => return Some(Err(BillingError::Overflow)),
                    };
                }
                Some(Ok(total))
            }
            Self::Shares(_) => None,
        }
    }

    /// Per-receiver amounts for one billing of `amount`.
    ///
    /// For share payouts each receiver gets the floor of its share; the
    /// remainder of the floor division goes to the first receiver so the
    /// breakdown sums to `amount` exactly. For fixed payouts the
    /// configured amounts are returned and `amount` is ignored.
    pub fn breakdown(&self, amount: Amount) -> Result<Vec<Amount>, BillingError> {
        match self {
            Self::FixedAmounts(list) => Ok(list.iter().map(|r| r.amount).collect()),
            Self::Shares(list) => {
                let mut parts = Vec::with_capacity(list.len());
                let mut distributed: Amount = 0;
                for r in list {
                    let part = amount
                        .checked_mul(u128::from(r.share_bps))
                        .ok_or(BillingError::Overflow)?
                        / BPS_DENOMINATOR;
                    distributed += part;
                    parts.push(part);
                }
                if let Some(first) = parts.first_mut() {
                    *first += amount - distributed;
                }
                Ok(parts)
            }
        }
    }
}

/// Model-specific billing cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanCap {
    /// No cap (fixed-recurring: the payout itself fixes the amount).
    None,
    /// Upper bound per billing (variable-recurring).
    MaxAmount(Amount),
    /// Floor for the customer-set allowance (on-demand).
    MinAllowance(Amount),
}

/// A billing plan. `period_secs` is invariant after creation; payout and
/// delegated permissions are mutable by the admin; plans are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub model: BillingModel,
    pub admin: AccountId,
    pub name: String,
    pub token: TokenId,
    pub period_secs: u64,
    pub payout: PayoutConfig,
    pub cap: PlanCap,
    pub created_at: u64,
}

impl Plan {
    /// The per-billing cap for variable-recurring plans.
    pub fn max_amount(&self) -> Option<Amount> {
        match self.cap {
            PlanCap::MaxAmount(v) => Some(v),
            _ => None,
        }
    }

    /// The allowance floor for on-demand plans.
    pub fn min_allowance(&self) -> Option<Amount> {
        match self.cap {
            PlanCap::MinAllowance(v) => Some(v),
            _ => None,
        }
    }
}

fn push_segment(payload: &mut Vec<u8>, bytes: &[u8]) {
    payload.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    payload.extend_from_slice(bytes);
}

/// Content-addressed plan id over a canonical encoding of the creation
/// fields plus creation time.
pub fn derive_plan_id(
    model: BillingModel,
    admin: &AccountId,
    name: &str,
    token: &TokenId,
    period_secs: u64,
    payout: &PayoutConfig,
    cap: &PlanCap,
    created_at: u64,
) -> PlanId {
    let mut payload = Vec::new();
    payload.push(match model {
        BillingModel::FixedRecurring => 1,
        BillingModel::VariableRecurring => 2,
        BillingModel::OnDemand => 3,
    });
    push_segment(&mut payload, admin.as_str().as_bytes());
    push_segment(&mut payload, name.as_bytes());
    push_segment(&mut payload, token.as_str().as_bytes());
    payload.extend_from_slice(&period_secs.to_be_bytes());
    match payout {
        PayoutConfig::FixedAmounts(list) => {
            payload.push(1);
            for r in list {
                push_segment(&mut payload, r.account.as_str().as_bytes());
                payload.extend_from_slice(&r.amount.to_be_bytes());
            }
        }
        PayoutConfig::Shares(list) => {
            payload.push(2);
            for r in list {
                push_segment(&mut payload, r.account.as_str().as_bytes());
                payload.extend_from_slice(&r.share_bps.to_be_bytes());
            }
        }
    }
    match cap {
        PlanCap::None => payload.push(0),
        PlanCap::MaxAmount(v) => {
            payload.push(1);
            payload.extend_from_slice(&v.to_be_bytes());
        }
        PlanCap::MinAllowance(v) => {
            payload.push(2);
            payload.extend_from_slice(&v.to_be_bytes());
        }
    }
    payload.extend_from_slice(&created_at.to_be_bytes());
    PlanId::from_bytes(*blake3::hash(&payload).as_bytes())
}
