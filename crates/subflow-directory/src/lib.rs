pub mod error;
pub mod fees;
pub mod roles;
pub mod tokens;

pub use error::DirectoryError;
pub use fees::FeeSchedule;
pub use roles::RoleGate;
pub use tokens::TokenDirectory;
