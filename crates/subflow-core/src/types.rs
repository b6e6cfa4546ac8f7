use serde::{Deserialize, Serialize};
use std::fmt;

/// Value in atomic token units.
pub type Amount = u128;

/// Fee rate or percentage share in basis points (10000 = 100%).
pub type BasisPoints = u16;

/// Denominator for basis-point arithmetic.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Minimum billing interval for any plan, in seconds.
pub const MIN_PERIOD_SECS: u64 = 600;

/// Maximum number of payout receivers on a plan.
pub const MAX_RECEIVERS: usize = 5;

/// An account in the ledger. The empty string is the "no account" sentinel
/// and is rejected everywhere an actual party is required.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    /// Create an account id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the "no account" sentinel.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a payment token. Resolved through the token directory at
/// use-time, never at plan-creation time, so redirects apply retroactively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenId(pub String);

const NATIVE_TOKEN: &str = "native";

impl TokenId {
    /// Create a token id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The reserved identifier for the native currency.
    pub fn native() -> Self {
        Self(NATIVE_TOKEN.to_string())
    }

    /// Whether this is the native-currency identifier.
    pub fn is_native(&self) -> bool {
        self.0 == NATIVE_TOKEN
    }

    /// The underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is an empty (invalid) identifier.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TokenId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

macro_rules! hash_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// The all-zero sentinel.
            pub const ZERO: Self = Self([0u8; 32]);

            /// Wrap an existing 32-byte hash.
            pub fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// The raw hash bytes.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Whether this is the all-zero sentinel.
            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex::encode(self.0))
            }
        }
    };
}

hash_id! {
    /// Content-addressed plan identifier (BLAKE3 over the creation fields).
    PlanId
}

hash_id! {
    /// Content-addressed subscription identifier (BLAKE3 over plan,
    /// subscriber, and subscription time).
    SubscriptionId
}

hash_id! {
    /// Caller-supplied opaque value attached to a transfer for downstream
    /// audit correlation (typically the subscription id).
    CorrelationTag
}

impl From<SubscriptionId> for CorrelationTag {
    fn from(id: SubscriptionId) -> Self {
        Self(id.0)
    }
}

/// Tag distinguishing the four payment models for fee lookup and auditing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentKind {
    /// A one-shot transfer outside any subscription.
    OneTime,
    /// Fixed-amount recurring billing, paid in advance.
    FixedRecurring,
    /// Variable-amount recurring billing, paid in arrears.
    VariableRecurring,
    /// Usage-driven billing bounded by a customer-set allowance.
    OnDemand,
}

impl PaymentKind {
    /// Stable single-byte tag used in storage keys.
    pub fn tag(&self) -> u8 {
        match self {
            Self::OneTime => 1,
            Self::FixedRecurring => 2,
            Self::VariableRecurring => 3,
            Self::OnDemand => 4,
        }
    }
}

impl fmt::Display for PaymentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneTime => write!(f, "one-time"),
            Self::FixedRecurring => write!(f, "fixed-recurring"),
            Self::VariableRecurring => write!(f, "variable-recurring"),
            Self::OnDemand => write!(f, "on-demand"),
        }
    }
}

/// The three subscription billing models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BillingModel {
    FixedRecurring,
    VariableRecurring,
    OnDemand,
}

impl BillingModel {
    /// The payment-kind tag carried by this model's settlement traffic.
    pub fn payment_kind(&self) -> PaymentKind {
        match self {
            Self::FixedRecurring => PaymentKind::FixedRecurring,
            Self::VariableRecurring => PaymentKind::VariableRecurring,
            Self::OnDemand => PaymentKind::OnDemand,
        }
    }
}

impl fmt::Display for BillingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixedRecurring => write!(f, "fixed-recurring"),
            Self::VariableRecurring => write!(f, "variable-recurring"),
            Self::OnDemand => write!(f, "on-demand"),
        }
    }
}

/// Plan-level permissions an admin can delegate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// May invoke `bill` for the plan.
    Bill,
    /// May invoke `terminate` for the plan.
    Terminate,
}

impl Permission {
    /// Stable single-byte tag used in storage keys.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Bill => 1,
            Self::Terminate => 2,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bill => write!(f, "BILL"),
            Self::Terminate => write!(f, "TERMINATE"),
        }
    }
}

/// System-wide roles gating the administrative surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Full administrative control.
    Owner,
    /// Privileged operational account (billing schedulers and the like).
    NetworkService,
}

impl Role {
    /// Stable single-byte tag used in storage keys.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Owner => 1,
            Self::NetworkService => 2,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Owner => write!(f, "OWNER"),
            Self::NetworkService => write!(f, "NETWORK_SERVICE"),
        }
    }
}
