//! Fee-aware, multi-party, partial-failure-tolerant fund mover.
//!
//! A settlement call either rejects outright (malformed shape, inactive
//! token) or runs every item to a per-item outcome: senders that cannot
//! cover their total owed are skipped and reported, everyone else pays.
//! Invariant across any call: value pulled == net value pushed + total fee.

use std::sync::{Arc, RwLock};

use subflow_core::events::{Event, EventLog};
use subflow_core::types::{
    AccountId, Amount, CorrelationTag, PaymentKind, Role, TokenId, BPS_DENOMINATOR,
};
use subflow_directory::{DirectoryError, FeeSchedule, RoleGate, TokenDirectory};

use crate::error::SettlementError;
use crate::ledger::TokenLedger;

/// The settlement engine.
pub struct Settlement {
    ledger: Arc<TokenLedger>,
    directory: Arc<TokenDirectory>,
    fees: Arc<FeeSchedule>,
    roles: Arc<RoleGate>,
    events: Arc<EventLog>,
    fee_collector: RwLock<AccountId>,
}

fn checked_sum(amounts: &[Amount]) -> Result<Amount, SettlementError> {
    let mut total: Amount = 0;
    for amount in amounts {
        total = total.checked_add(*amount).ok_or(SettlementError::Overflow)?;
    }
    Ok(total)
}

impl Settlement {
    /// Create a settlement engine paying fees to `fee_collector`.
    pub fn new(
        ledger: Arc<TokenLedger>,
        directory: Arc<TokenDirectory>,
        fees: Arc<FeeSchedule>,
        roles: Arc<RoleGate>,
        events: Arc<EventLog>,
        fee_collector: AccountId,
    ) -> Self {
        Self {
            ledger,
            directory,
            fees,
            roles,
            events,
            fee_collector: RwLock::new(fee_collector),
        }
    }

    /// The account currently collecting protocol fees.
    pub fn fee_collector(&self) -> AccountId {
        self.fee_collector.read().unwrap().clone()
    }

    /// Point fee collection at a new account. OWNER-gated.
    pub fn set_fee_collector(
        &self,
        caller: &AccountId,
        account: AccountId,
    ) -> Result<(), SettlementError> {
        self.roles.require(Role::Owner, caller)?;
        if account.is_empty() {
            return Err(SettlementError::InvalidAccount(
                "fee collector must be non-empty".into(),
            ));
        }
        tracing::info!(account = %account, "fee collector changed");
        *self.fee_collector.write().unwrap() = account;
        Ok(())
    }

    /// The underlying balance ledger.
    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    /// Move funds from one sender to a set of receivers.
    ///
    /// Returns `Ok(false)` when the sender cannot cover the summed amounts
    /// (reported via a `TransferFailed` event); rejects the call outright
    /// on malformed shape or an inactive token.
    #[allow(clippy::too_many_arguments)]
    pub fn transfer(
        &self,
        token: &TokenId,
        sender: &AccountId,
        receivers: &[AccountId],
        amounts: &[Amount],
        fee_account: &AccountId,
        kind: PaymentKind,
        tag: CorrelationTag,
    ) -> Result<bool, SettlementError> {
        let results = self.batch_transfer(
            token,
            std::slice::from_ref(sender),
            receivers,
            &[amounts.to_vec()],
            fee_account,
            kind,
            &[tag],
        )?;
        Ok(results[0])
    }

    /// Move funds from many senders to a shared set of receivers in one
    /// call. One result per sender; a sender that cannot pay never affects
    /// any other sender's outcome.
    #[allow(clippy::too_many_arguments)]
    pub fn batch_transfer(
        &self,
        token: &TokenId,
        senders: &[AccountId],
        receivers: &[AccountId],
        amounts: &[Vec<Amount>],
        fee_account: &AccountId,
        kind: PaymentKind,
        tags: &[CorrelationTag],
    ) -> Result<Vec<bool>, SettlementError> {
        if senders.is_empty() {
            return Err(SettlementError::EmptySenders);
        }
        if receivers.is_empty() {
            return Err(SettlementError::EmptyReceivers);
        }
        if amounts.len() != senders.len() {
            return Err(SettlementError::LengthMismatch {
                what: "amount rows",
                expected: senders.len(),
                got: amounts.len(),
            });
        }
        if tags.len() != senders.len() {
            return Err(SettlementError::LengthMismatch {
                what: "correlation tags",
                expected: senders.len(),
                got: tags.len(),
            });
        }
        for row in amounts {
            if row.len() != receivers.len() {
                return Err(SettlementError::LengthMismatch {
                    what: "amounts per sender",
                    expected: receivers.len(),
                    got: row.len(),
                });
            }
        }
        for sender in senders {
            if sender.is_empty() {
                return Err(SettlementError::InvalidAccount("empty sender".into()));
            }
        }
        for receiver in receivers {
            if receiver.is_empty() {
                return Err(SettlementError::InvalidAccount("empty receiver".into()));
            }
        }

        // Token validity is call-level: the whole batch rides one token.
        let resolved = self.resolve_active(token)?;

        // One fee rate for the whole call.
        let fee_bps = u128::from(self.fees.fee_for(fee_account, kind)?);

        // Pre-compute every sender's total owed and fee split, so no
        // arithmetic can fail once funds start moving.
        let mut owed = Vec::with_capacity(senders.len());
        let mut net_rows = Vec::with_capacity(senders.len());
        let mut item_fees = Vec::with_capacity(senders.len());
        let mut grand_total: Amount = 0;
        for row in amounts {
            let row_total = checked_sum(row)?;
            grand_total = grand_total
                .checked_add(row_total)
                .ok_or(SettlementError::Overflow)?;
            owed.push(row_total);

            let mut nets = Vec::with_capacity(row.len());
            let mut item_fee: Amount = 0;
            for amount in row {
                let fee = amount
                    .checked_mul(fee_bps)
                    .ok_or(SettlementError::Overflow)?
                    / BPS_DENOMINATOR;
                nets.push(amount - fee);
                item_fee += fee;
            }
            net_rows.push(nets);
            item_fees.push(item_fee);
        }

        let mut results = Vec::with_capacity(senders.len());
        let mut receiver_totals: Vec<Amount> = vec![0; receivers.len()];
        let mut total_fee: Amount = 0;

        for (i, sender) in senders.iter().enumerate() {
            let available = self.ledger.available(sender, &resolved)?;
            if available < owed[i] {
                tracing::debug!(
                    sender = %sender,
                    available,
                    required = owed[i],
                    "batch item failed: insufficient funds"
                );
                self.events.emit(Event::TransferFailed {
                    token: resolved.clone(),
                    sender: sender.clone(),
                    receivers: receivers.to_vec(),
                    amounts: amounts[i].clone(),
                    kind,
                    tag: tags[i],
                });
                results.push(false);
                continue;
            }

            self.ledger.pull(sender, &resolved, owed[i])?;

            for (j, net) in net_rows[i].iter().enumerate() {
                receiver_totals[j] += net;
            }
            total_fee += item_fees[i];

            self.events.emit(Event::TransferSuccessful {
                token: resolved.clone(),
                sender: sender.clone(),
                receivers: receivers.to_vec(),
                amounts: amounts[i].clone(),
                fee: item_fees[i],
                kind,
                tag: tags[i],
            });
            results.push(true);
        }

        for (j, receiver) in receivers.iter().enumerate() {
            if receiver_totals[j] > 0 {
                self.ledger.push(receiver, &resolved, receiver_totals[j])?;
            }
        }
        if total_fee > 0 {
            self.ledger.push(&self.fee_collector(), &resolved, total_fee)?;
        }

        Ok(results)
    }

    /// Move attached native currency from `sender` to the receivers.
    ///
    /// The attached value must equal the summed amounts exactly; any
    /// mismatch rejects the whole call with the sender's balance untouched
    /// (for the single implicit sender of the native path, call-level and
    /// item-level failure coincide).
    pub fn transfer_native(
        &self,
        sender: &AccountId,
        receivers: &[AccountId],
        amounts: &[Amount],
        attached: Amount,
        fee_account: &AccountId,
        tag: CorrelationTag,
    ) -> Result<(), SettlementError> {
        if receivers.is_empty() {
            return Err(SettlementError::EmptyReceivers);
        }
        if amounts.len() != receivers.len() {
            return Err(SettlementError::LengthMismatch {
                what: "native amounts",
                expected: receivers.len(),
                got: amounts.len(),
            });
        }
        if sender.is_empty() {
            return Err(SettlementError::InvalidAccount("empty sender".into()));
        }
        for receiver in receivers {
            if receiver.is_empty() {
                return Err(SettlementError::InvalidAccount("empty receiver".into()));
            }
        }

        let required = checked_sum(amounts)?;
        if attached != required {
            return Err(SettlementError::NativeValueMismatch { attached, required });
        }

        let kind = PaymentKind::OneTime;
        let fee_bps = u128::from(self.fees.fee_for(fee_account, kind)?);

        // Fee split computed before any balance moves.
        let mut nets = Vec::with_capacity(amounts.len());
        let mut total_fee: Amount = 0;
        for amount in amounts {
            let fee = amount
                .checked_mul(fee_bps)
                .ok_or(SettlementError::Overflow)?
                / BPS_DENOMINATOR;
            nets.push(amount - fee);
            total_fee += fee;
        }

        self.ledger.debit_native(sender, attached)?;

        // Native value arrives embodied in the call, so it is paid out
        // directly with no custody step.
        let native = TokenId::native();
        for (j, net) in nets.into_iter().enumerate() {
            self.ledger.credit_direct(&receivers[j], &native, net)?;
        }
        if total_fee > 0 {
            self.ledger
                .credit_direct(&self.fee_collector(), &native, total_fee)?;
        }

        self.events.emit(Event::TransferSuccessful {
            token: native,
            sender: sender.clone(),
            receivers: receivers.to_vec(),
            amounts: amounts.to_vec(),
            fee: total_fee,
            kind,
            tag,
        });
        Ok(())
    }

    fn resolve_active(&self, token: &TokenId) -> Result<TokenId, SettlementError> {
        let resolved = match self.directory.latest(token) {
            Ok(resolved) => resolved,
            Err(DirectoryError::TokenNotFound(_)) => {
                return Err(SettlementError::InactiveToken(token.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        if !self.directory.is_active(&resolved)? {
            return Err(SettlementError::InactiveToken(token.clone()));
        }
        Ok(resolved)
    }
}
