use subflow_core::types::{AccountId, Amount, BillingModel, PlanId, SubscriptionId};
use subflow_core::CoreError;
use subflow_directory::DirectoryError;
use subflow_settlement::SettlementError;
use subflow_store::StoreError;

/// Billing-layer errors. Everything here is a call-level rejection;
/// per-item billing failures are reported through `BillOutcome` and the
/// event log instead.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("plan not found: {0}")]
    PlanNotFound(PlanId),

    #[error("plan already exists: {0}")]
    PlanAlreadyExists(PlanId),

    #[error("subscription not found: {0}")]
    SubscriptionNotFound(SubscriptionId),

    #[error("subscription already exists: {0}")]
    SubscriptionAlreadyExists(SubscriptionId),

    #[error("account {account} already has an active subscription to plan {plan_id}")]
    AlreadySubscribed { plan_id: PlanId, account: AccountId },

    #[error("account {account} is not the subscriber of {subscription_id}")]
    NotSubscriber {
        subscription_id: SubscriptionId,
        account: AccountId,
    },

    #[error("account {account} is not authorized for plan {plan_id}")]
    Unauthorized { plan_id: PlanId, account: AccountId },

    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    #[error("invalid account: {0}")]
    InvalidAccount(String),

    #[error("on-demand subscriptions require an allowance; use subscribe_on_demand")]
    AllowanceRequired,

    #[error("operation applies to {expected} plans, not {actual}")]
    ModelMismatch {
        expected: BillingModel,
        actual: BillingModel,
    },

    #[error("allowance {allowance} is below the plan minimum {minimum}")]
    AllowanceBelowMinimum { allowance: Amount, minimum: Amount },

    #[error("first payment failed for subscription {0}")]
    FirstPaymentFailed(SubscriptionId),

    #[error("fixed-recurring billing takes no requested amounts")]
    AmountsNotAllowed,

    #[error("expected {expected} amounts, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("batch names the same subscription twice")]
    DuplicateInBatch,

    #[error("no eligible subscriptions in batch")]
    NoEligibleSubscriptions,

    #[error("variable-recurring subscriptions cancel at the next billing; use request_cancellation")]
    CancellationDeferred,

    #[error("amount arithmetic overflow")]
    Overflow,

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),
}
