//! Shared harness for cross-crate integration tests.
//!
//! Wires a full engine the way an embedding application would: one store,
//! one event log, the directory collaborators, the settlement layer, and
//! one billing engine per model.

use std::sync::Arc;

use subflow_billing::{BillingEngine, PlanRegistry, SubscriptionLedger};
use subflow_core::types::{AccountId, Amount, BillingModel, Role, TokenId};
use subflow_core::{EngineConfig, EventLog};
use subflow_directory::{FeeSchedule, RoleGate, TokenDirectory};
use subflow_settlement::{Settlement, TokenLedger};
use subflow_store::{KeyValueStore, MemoryStore};

/// A fully wired engine over an in-memory store.
pub struct Harness {
    pub config: EngineConfig,
    pub events: Arc<EventLog>,
    pub roles: Arc<RoleGate>,
    pub directory: Arc<TokenDirectory>,
    pub fees: Arc<FeeSchedule>,
    pub settlement: Arc<Settlement>,
    pub fixed: BillingEngine,
    pub variable: BillingEngine,
    pub on_demand: BillingEngine,
    /// Bootstrapped OWNER account.
    pub root: AccountId,
}

impl Harness {
    /// Build the full stack with `usdc` registered and active.
    pub fn new() -> Self {
        init_tracing();

        let config = EngineConfig::default();
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let events = Arc::new(EventLog::new());
        let root = AccountId::new("root");

        let roles = Arc::new(
            RoleGate::bootstrap(Arc::clone(&store), Arc::clone(&events), &root)
                .expect("bootstrap roles"),
        );
        roles
            .grant(&root, Role::NetworkService, &AccountId::new("scheduler"))
            .expect("grant scheduler role");

        let directory = Arc::new(TokenDirectory::new(
            Arc::clone(&store),
            Arc::clone(&roles),
            Arc::clone(&events),
        ));
        directory
            .add_token(&root, &TokenId::new("usdc"))
            .expect("register usdc");

        let fees = Arc::new(FeeSchedule::new(
            Arc::clone(&store),
            Arc::clone(&roles),
            Arc::clone(&events),
        ));

        let token_ledger = Arc::new(TokenLedger::new(Arc::clone(&store)));
        let settlement = Arc::new(Settlement::new(
            token_ledger,
            Arc::clone(&directory),
            Arc::clone(&fees),
            Arc::clone(&roles),
            Arc::clone(&events),
            config.fee_collector.clone(),
        ));

        let subs = Arc::new(SubscriptionLedger::new(Arc::clone(&store)));
        let engine = |model: BillingModel| {
            let registry = Arc::new(PlanRegistry::new(
                model,
                Arc::clone(&store),
                Arc::clone(&directory),
                Arc::clone(&events),
            ));
            BillingEngine::new(
                registry,
                Arc::clone(&subs),
                Arc::clone(&settlement),
                Arc::clone(&roles),
                Arc::clone(&events),
            )
        };
        let fixed = engine(BillingModel::FixedRecurring);
        let variable = engine(BillingModel::VariableRecurring);
        let on_demand = engine(BillingModel::OnDemand);

        Self {
            config,
            events,
            roles,
            directory,
            fees,
            settlement,
            fixed,
            variable,
            on_demand,
            root,
        }
    }

    /// Deposit and fully authorize `amount` of usdc for `account`.
    pub fn fund(&self, account: &AccountId, amount: Amount) {
        let usdc = TokenId::new("usdc");
        self.settlement
            .ledger()
            .deposit(account, &usdc, amount)
            .expect("deposit");
        self.settlement
            .ledger()
            .authorize(account, &usdc, amount)
            .expect("authorize");
    }

    /// Current usdc balance of `account`.
    pub fn balance(&self, account: &AccountId) -> Amount {
        self.settlement
            .ledger()
            .balance_of(account, &TokenId::new("usdc"))
            .expect("balance")
    }

    /// Current native balance of `account`.
    pub fn native_balance(&self, account: &AccountId) -> Amount {
        self.settlement
            .ledger()
            .balance_of(account, &TokenId::native())
            .expect("balance")
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize tracing once for the whole test binary.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
