pub mod engine;
pub mod error;
pub mod ledger;
pub mod plan;
pub mod registry;
pub mod subscription;

pub use engine::{BillOutcome, BillingEngine};
pub use error::BillingError;
pub use ledger::SubscriptionLedger;
pub use plan::{PayoutConfig, Plan, PlanCap, ReceiverAmount, ReceiverShare};
pub use registry::PlanRegistry;
pub use subscription::{derive_subscription_id, CycleState, Subscription};
