use std::sync::Arc;

use subflow_core::events::{Event, EventLog};
use subflow_core::types::{AccountId, BasisPoints, PaymentKind, Role};
use subflow_store::{compose_key, KeyValueStore, TypedStore};

use crate::error::DirectoryError;
use crate::roles::RoleGate;

/// Storage table for fee rates.
pub const TABLE_FEES: &str = "fees";

const BASE_PREFIX: u8 = 0;
const ACCOUNT_PREFIX: u8 = 1;

/// Fee-rate lookup table in basis points, per payment type, with optional
/// account-specific overrides.
pub struct FeeSchedule {
    store: Arc<dyn KeyValueStore>,
    roles: Arc<RoleGate>,
    events: Arc<EventLog>,
}

fn base_key(kind: PaymentKind) -> Vec<u8> {
    compose_key(&[&[BASE_PREFIX], &[kind.tag()]])
}

fn account_key(account: &AccountId, kind: PaymentKind) -> Vec<u8> {
    compose_key(&[&[ACCOUNT_PREFIX], &[kind.tag()], account.as_str().as_bytes()])
}

fn check_bps(bps: BasisPoints) -> Result<(), DirectoryError> {
    if u128::from(bps) > subflow_core::types::BPS_DENOMINATOR {
        return Err(DirectoryError::InvalidFee { bps });
    }
    Ok(())
}

impl FeeSchedule {
    /// Create a schedule over the given store. All rates default to zero.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        roles: Arc<RoleGate>,
        events: Arc<EventLog>,
    ) -> Self {
        Self {
            store,
            roles,
            events,
        }
    }

    /// Set the type-wide base rate. OWNER-gated, capped at 10000 bps.
    pub fn set_base_fee(
        &self,
        caller: &AccountId,
        kind: PaymentKind,
        bps: BasisPoints,
    ) -> Result<(), DirectoryError> {
        self.roles.require(Role::Owner, caller)?;
        check_bps(bps)?;
        self.store.put(TABLE_FEES, &base_key(kind), &bps)?;
        self.events.emit(Event::FeeUpdated {
            account: None,
            kind,
            bps,
        });
        Ok(())
    }

    /// Set an account-specific override. OWNER-gated, capped at 10000 bps.
    pub fn set_account_fee(
        &self,
        caller: &AccountId,
        account: &AccountId,
        kind: PaymentKind,
        bps: BasisPoints,
    ) -> Result<(), DirectoryError> {
        self.roles.require(Role::Owner, caller)?;
        if account.is_empty() {
            return Err(DirectoryError::InvalidAccount(
                "account must be non-empty".into(),
            ));
        }
        check_bps(bps)?;
        self.store.put(TABLE_FEES, &account_key(account, kind), &bps)?;
        self.events.emit(Event::FeeUpdated {
            account: Some(account.clone()),
            kind,
            bps,
        });
        Ok(())
    }

    /// Remove an account-specific override, falling back to the base rate.
    /// OWNER-gated.
    pub fn clear_account_fee(
        &self,
        caller: &AccountId,
        account: &AccountId,
        kind: PaymentKind,
    ) -> Result<(), DirectoryError> {
        self.roles.require(Role::Owner, caller)?;
        self.store
            .delete_raw(TABLE_FEES, &account_key(account, kind))?;
        let effective = self.fee_for(account, kind)?;
        self.events.emit(Event::FeeUpdated {
            account: Some(account.clone()),
            kind,
            bps: effective,
        });
        Ok(())
    }

    /// The effective rate for `account` and `kind`: the account override
    /// when present, else the base rate, else zero.
    pub fn fee_for(
        &self,
        account: &AccountId,
        kind: PaymentKind,
    ) -> Result<BasisPoints, DirectoryError> {
        if let Some(bps) = self
            .store
            .get::<BasisPoints>(TABLE_FEES, &account_key(account, kind))?
        {
            return Ok(bps);
        }
        Ok(self
            .store
            .get::<BasisPoints>(TABLE_FEES, &base_key(kind))?
            .unwrap_or(0))
    }
}
