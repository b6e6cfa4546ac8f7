//! Token balances, standing authorizations, and settlement custody.
//!
//! Every movement is double-entry: a debit of one account paired with a
//! credit of another. Funds pulled from a payer live in the custody
//! account until the batch pays them out.

use std::sync::Arc;

use subflow_core::types::{AccountId, Amount, TokenId};
use subflow_store::{compose_key, KeyValueStore, TypedStore};

use crate::error::SettlementError;

/// Storage table for account balances.
pub const TABLE_BALANCES: &str = "balances";

/// Storage table for standing authorizations to the settlement engine.
pub const TABLE_AUTHORIZATIONS: &str = "authorizations";

const CUSTODY_ACCOUNT: &str = "__settlement_custody__";

/// Balance and authorization ledger for all tokens, native included.
pub struct TokenLedger {
    store: Arc<dyn KeyValueStore>,
}

fn entry_key(account: &AccountId, token: &TokenId) -> Vec<u8> {
    compose_key(&[account.as_str().as_bytes(), token.as_str().as_bytes()])
}

impl TokenLedger {
    /// Create a ledger over the given store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The internal custody account holding in-flight batch funds.
    pub fn custody_account() -> AccountId {
        AccountId::new(CUSTODY_ACCOUNT)
    }

    /// Current balance of `account` in `token`.
    pub fn balance_of(&self, account: &AccountId, token: &TokenId) -> Result<Amount, SettlementError> {
        Ok(self
            .store
            .get::<Amount>(TABLE_BALANCES, &entry_key(account, token))?
            .unwrap_or(0))
    }

    /// Standing authorization `account` has granted to the settlement
    /// engine for `token`.
    pub fn authorization_of(
        &self,
        account: &AccountId,
        token: &TokenId,
    ) -> Result<Amount, SettlementError> {
        Ok(self
            .store
            .get::<Amount>(TABLE_AUTHORIZATIONS, &entry_key(account, token))?
            .unwrap_or(0))
    }

    /// What the engine may actually pull: the smaller of balance and
    /// authorization.
    pub fn available(&self, account: &AccountId, token: &TokenId) -> Result<Amount, SettlementError> {
        let balance = self.balance_of(account, token)?;
        let authorization = self.authorization_of(account, token)?;
        Ok(balance.min(authorization))
    }

    /// Credit `account` with `amount` of `token` from outside the system.
    pub fn deposit(
        &self,
        account: &AccountId,
        token: &TokenId,
        amount: Amount,
    ) -> Result<(), SettlementError> {
        if account.is_empty() {
            return Err(SettlementError::InvalidAccount(
                "cannot deposit to the empty account".into(),
            ));
        }
        self.credit(account, token, amount)?;
        tracing::debug!(account = %account, token = %token, amount, "deposit");
        Ok(())
    }

    /// Set the standing authorization of `owner` for `token` to `amount`,
    /// replacing any previous figure.
    pub fn authorize(
        &self,
        owner: &AccountId,
        token: &TokenId,
        amount: Amount,
    ) -> Result<(), SettlementError> {
        if owner.is_empty() {
            return Err(SettlementError::InvalidAccount(
                "cannot authorize from the empty account".into(),
            ));
        }
        self.store
            .put(TABLE_AUTHORIZATIONS, &entry_key(owner, token), &amount)?;
        tracing::debug!(account = %owner, token = %token, amount, "authorization set");
        Ok(())
    }

    /// Pull `amount` from `sender` into custody, consuming both balance
    /// and authorization.
    pub fn pull(
        &self,
        sender: &AccountId,
        token: &TokenId,
        amount: Amount,
    ) -> Result<(), SettlementError> {
        let available = self.available(sender, token)?;
        if available < amount {
            return Err(SettlementError::InsufficientBalance {
                available,
                required: amount,
            });
        }
        let balance = self.balance_of(sender, token)?;
        let authorization = self.authorization_of(sender, token)?;
        self.store
            .put(TABLE_BALANCES, &entry_key(sender, token), &(balance - amount))?;
        self.store.put(
            TABLE_AUTHORIZATIONS,
            &entry_key(sender, token),
            &(authorization - amount),
        )?;
        self.credit(&Self::custody_account(), token, amount)?;
        Ok(())
    }

    /// Pay `amount` out of custody to `receiver`.
    pub fn push(
        &self,
        receiver: &AccountId,
        token: &TokenId,
        amount: Amount,
    ) -> Result<(), SettlementError> {
        let custody = Self::custody_account();
        let held = self.balance_of(&custody, token)?;
        if held < amount {
            return Err(SettlementError::InsufficientCustody {
                available: held,
                required: amount,
            });
        }
        self.store
            .put(TABLE_BALANCES, &entry_key(&custody, token), &(held - amount))?;
        self.credit(receiver, token, amount)?;
        Ok(())
    }

    /// Debit `amount` of native currency directly from `sender`, with no
    /// custody step.
    pub fn debit_native(&self, sender: &AccountId, amount: Amount) -> Result<(), SettlementError> {
        let native = TokenId::native();
        let balance = self.balance_of(sender, &native)?;
        if balance < amount {
            return Err(SettlementError::InsufficientBalance {
                available: balance,
                required: amount,
            });
        }
        self.store
            .put(TABLE_BALANCES, &entry_key(sender, &native), &(balance - amount))?;
        Ok(())
    }

    /// Credit `amount` directly to `receiver`, with no custody step.
    pub fn credit_direct(
        &self,
        receiver: &AccountId,
        token: &TokenId,
        amount: Amount,
    ) -> Result<(), SettlementError> {
        self.credit(receiver, token, amount)
    }

    fn credit(
        &self,
        account: &AccountId,
        token: &TokenId,
        amount: Amount,
    ) -> Result<(), SettlementError> {
        let balance = self.balance_of(account, token)?;
        let updated = balance.checked_add(amount).ok_or(SettlementError::Overflow)?;
        self.store
            .put(TABLE_BALANCES, &entry_key(account, token), &updated)?;
        Ok(())
    }
}
