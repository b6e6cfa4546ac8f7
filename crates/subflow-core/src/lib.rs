pub mod config;
pub mod dedup;
pub mod error;
pub mod events;
pub mod types;

pub use config::EngineConfig;
pub use dedup::{has_duplicates, MAX_BATCH};
pub use error::CoreError;
pub use events::{Event, EventLog, EventRecord};
pub use types::{
    AccountId, Amount, BasisPoints, BillingModel, CorrelationTag, PaymentKind, Permission, PlanId,
    Role, SubscriptionId, TokenId, BPS_DENOMINATOR, MAX_RECEIVERS, MIN_PERIOD_SECS,
};
