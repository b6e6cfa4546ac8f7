//! Structured event records for every state-changing outcome.
//!
//! Events are the audit trail of the engine: each mutating operation
//! appends one record per outcome, and batch operations append one record
//! per item. Call-level rejections emit nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use uuid::Uuid;

use crate::types::{
    AccountId, Amount, BasisPoints, BillingModel, CorrelationTag, PaymentKind, Permission, PlanId,
    Role, SubscriptionId, TokenId,
};

/// Everything the engine reports having done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// A plan was created.
    PlanCreated {
        plan_id: PlanId,
        model: BillingModel,
        admin: AccountId,
        token: TokenId,
        period_secs: u64,
    },

    /// A plan's payout configuration was replaced.
    ReceiverChanged {
        plan_id: PlanId,
        admin: AccountId,
        receiver_count: usize,
    },

    /// A plan-level permission was granted to an account.
    PermissionGranted {
        plan_id: PlanId,
        permission: Permission,
        account: AccountId,
    },

    /// A plan-level permission was revoked from an account.
    PermissionRevoked {
        plan_id: PlanId,
        permission: Permission,
        account: AccountId,
    },

    /// A subscription was created.
    Subscribed {
        subscription_id: SubscriptionId,
        plan_id: PlanId,
        account: AccountId,
        subscribed_at: u64,
    },

    /// A subscription was removed by (or on behalf of) the subscriber.
    SubscriptionCancelled {
        subscription_id: SubscriptionId,
        plan_id: PlanId,
        account: AccountId,
    },

    /// A subscription was forcibly removed by the plan admin or a delegate.
    SubscriptionTerminated {
        subscription_id: SubscriptionId,
        plan_id: PlanId,
        account: AccountId,
    },

    /// An on-demand subscriber changed their allowance ceiling.
    AllowanceUpdated {
        subscription_id: SubscriptionId,
        plan_id: PlanId,
        account: AccountId,
        allowance: Amount,
    },

    /// A subscription was billed successfully.
    Billing {
        subscription_id: SubscriptionId,
        plan_id: PlanId,
        account: AccountId,
        amount: Amount,
        billed_at: u64,
    },

    /// A billing attempt failed at settlement time; the subscription's
    /// cycle state is untouched and the item may be retried.
    BillingFailed {
        subscription_id: SubscriptionId,
        plan_id: PlanId,
        account: AccountId,
        amount: Amount,
    },

    /// Funds moved from a sender to one or more receivers.
    TransferSuccessful {
        token: TokenId,
        sender: AccountId,
        receivers: Vec<AccountId>,
        amounts: Vec<Amount>,
        fee: Amount,
        kind: PaymentKind,
        tag: CorrelationTag,
    },

    /// A sender could not cover its total owed; no funds moved for this
    /// item and the surrounding batch continued.
    TransferFailed {
        token: TokenId,
        sender: AccountId,
        receivers: Vec<AccountId>,
        amounts: Vec<Amount>,
        kind: PaymentKind,
        tag: CorrelationTag,
    },

    /// A token was registered in the directory.
    TokenAdded { token: TokenId },

    /// A token was paused.
    TokenPaused { token: TokenId },

    /// A paused token was resumed.
    TokenResumed { token: TokenId },

    /// A token was redirected to its successor.
    TokenRedirected { from: TokenId, to: TokenId },

    /// A base or account-specific fee rate changed.
    FeeUpdated {
        account: Option<AccountId>,
        kind: PaymentKind,
        bps: BasisPoints,
    },

    /// A system role was granted.
    RoleGranted { role: Role, account: AccountId },

    /// A system role was revoked.
    RoleRevoked { role: Role, account: AccountId },
}

impl Event {
    /// Short kind label used in log lines.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::PlanCreated { .. } => "PlanCreated",
            Self::ReceiverChanged { .. } => "ReceiverChanged",
            Self::PermissionGranted { .. } => "PermissionGranted",
            Self::PermissionRevoked { .. } => "PermissionRevoked",
            Self::Subscribed { .. } => "Subscribed",
            Self::SubscriptionCancelled { .. } => "SubscriptionCancelled",
            Self::SubscriptionTerminated { .. } => "SubscriptionTerminated",
            Self::AllowanceUpdated { .. } => "AllowanceUpdated",
            Self::Billing { .. } => "Billing",
            Self::BillingFailed { .. } => "BillingFailed",
            Self::TransferSuccessful { .. } => "TransferSuccessful",
            Self::TransferFailed { .. } => "TransferFailed",
            Self::TokenAdded { .. } => "TokenAdded",
            Self::TokenPaused { .. } => "TokenPaused",
            Self::TokenResumed { .. } => "TokenResumed",
            Self::TokenRedirected { .. } => "TokenRedirected",
            Self::FeeUpdated { .. } => "FeeUpdated",
            Self::RoleGranted { .. } => "RoleGranted",
            Self::RoleRevoked { .. } => "RoleRevoked",
        }
    }
}

/// One appended event with its id and wall-clock timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Record id (UUID v7, time-ordered).
    pub id: Uuid,
    /// When the record was appended.
    pub at: DateTime<Utc>,
    /// The event payload.
    pub event: Event,
}

/// Append-only event log shared by every component.
#[derive(Debug, Default)]
pub struct EventLog {
    records: RwLock<Vec<EventRecord>>,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, returning the record id.
    pub fn emit(&self, event: Event) -> Uuid {
        let record = EventRecord {
            id: Uuid::now_v7(),
            at: Utc::now(),
            event,
        };
        let id = record.id;
        tracing::info!(
            record_id = %id,
            kind = record.event.kind_label(),
            event = ?record.event,
            "event emitted"
        );
        self.records
            .write()
            .unwrap()
            .push(record);
        id
    }

    /// Number of records appended so far.
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A point-in-time copy of the full log, in emission order.
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.records
            .read()
            .unwrap()
            .clone()
    }

    /// Records appended at or after the given offset.
    pub fn records_since(&self, offset: usize) -> Vec<EventRecord> {
        let records = self.records.read().unwrap();
        records.get(offset..).unwrap_or_default().to_vec()
    }
}
