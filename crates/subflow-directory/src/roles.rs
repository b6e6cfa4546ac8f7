use std::sync::Arc;

use subflow_core::events::{Event, EventLog};
use subflow_core::types::{AccountId, Role};
use subflow_store::{compose_key, KeyValueStore};

use crate::error::DirectoryError;

/// Storage table for role membership.
pub const TABLE_ROLES: &str = "roles";

/// Role membership gate for the administrative surface.
///
/// Every privileged operation across the workspace calls [`RoleGate::require`]
/// at its top and returns a typed authorization error on failure.
pub struct RoleGate {
    store: Arc<dyn KeyValueStore>,
    events: Arc<EventLog>,
}

fn role_key(role: Role, account: &AccountId) -> Vec<u8> {
    compose_key(&[&[role.tag()], account.as_str().as_bytes()])
}

impl RoleGate {
    /// Create a gate and seed the initial OWNER.
    pub fn bootstrap(
        store: Arc<dyn KeyValueStore>,
        events: Arc<EventLog>,
        owner: &AccountId,
    ) -> Result<Self, DirectoryError> {
        if owner.is_empty() {
            return Err(DirectoryError::InvalidAccount(
                "owner account must be non-empty".into(),
            ));
        }
        let gate = Self { store, events };
        gate.store
            .put_raw(TABLE_ROLES, &role_key(Role::Owner, owner), &[1])?;
        tracing::info!(account = %owner, "bootstrapped owner role");
        Ok(gate)
    }

    /// Whether `account` holds `role`.
    pub fn has(&self, role: Role, account: &AccountId) -> Result<bool, DirectoryError> {
        Ok(self.store.contains(TABLE_ROLES, &role_key(role, account))?)
    }

    /// Guard: error unless `account` holds `role`.
    pub fn require(&self, role: Role, account: &AccountId) -> Result<(), DirectoryError> {
        if self.has(role, account)? {
            Ok(())
        } else {
            Err(DirectoryError::Unauthorized {
                account: account.clone(),
                role,
            })
        }
    }

    /// Grant `role` to `account`. Granting an already-held role is a
    /// silent no-op. OWNER-gated.
    pub fn grant(
        &self,
        caller: &AccountId,
        role: Role,
        account: &AccountId,
    ) -> Result<(), DirectoryError> {
        self.require(Role::Owner, caller)?;
        if account.is_empty() {
            return Err(DirectoryError::InvalidAccount(
                "account must be non-empty".into(),
            ));
        }
        if self.has(role, account)? {
            return Ok(());
        }
        self.store
            .put_raw(TABLE_ROLES, &role_key(role, account), &[1])?;
        self.events.emit(Event::RoleGranted {
            role,
            account: account.clone(),
        });
        Ok(())
    }

    /// Revoke `role` from `account`. Revoking an absent role is a silent
    /// no-op. OWNER-gated.
    pub fn revoke(
        &self,
        caller: &AccountId,
        role: Role,
        account: &AccountId,
    ) -> Result<(), DirectoryError> {
        self.require(Role::Owner, caller)?;
        if !self.has(role, account)? {
            return Ok(());
        }
        self.store
            .delete_raw(TABLE_ROLES, &role_key(role, account))?;
        self.events.emit(Event::RoleRevoked {
            role,
            account: account.clone(),
        });
        Ok(())
    }
}
