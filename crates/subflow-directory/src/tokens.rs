use serde::{Deserialize, Serialize};
use std::sync::Arc;

use subflow_core::events::{Event, EventLog};
use subflow_core::types::{AccountId, Role, TokenId};
use subflow_store::{KeyValueStore, TypedStore};

use crate::error::DirectoryError;
use crate::roles::RoleGate;

/// Storage table for token entries.
pub const TABLE_TOKENS: &str = "tokens";

/// A registered payment token.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenEntry {
    id: TokenId,
    paused: bool,
    /// One-hop successor after retirement. Redirects are never chained.
    redirected_to: Option<TokenId>,
}

/// Registry of supported payment tokens with pause and redirect.
///
/// Token identifiers are resolved here at transfer time, not at plan
/// creation time, so a redirect applies retroactively to existing plans.
pub struct TokenDirectory {
    store: Arc<dyn KeyValueStore>,
    roles: Arc<RoleGate>,
    events: Arc<EventLog>,
}

impl TokenDirectory {
    /// Create a directory over the given store.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        roles: Arc<RoleGate>,
        events: Arc<EventLog>,
    ) -> Self {
        Self {
            store,
            roles,
            events,
        }
    }

    fn load(&self, token: &TokenId) -> Result<Option<TokenEntry>, DirectoryError> {
        Ok(self.store.get(TABLE_TOKENS, token.as_str().as_bytes())?)
    }

    fn save(&self, entry: &TokenEntry) -> Result<(), DirectoryError> {
        self.store
            .put(TABLE_TOKENS, entry.id.as_str().as_bytes(), entry)?;
        Ok(())
    }

    /// Register a new token. OWNER-gated.
    pub fn add_token(&self, caller: &AccountId, token: &TokenId) -> Result<(), DirectoryError> {
        self.roles.require(Role::Owner, caller)?;
        if token.is_empty() {
            return Err(DirectoryError::InvalidToken(
                "token id must be non-empty".into(),
            ));
        }
        if token.is_native() {
            return Err(DirectoryError::InvalidToken(
                "the native identifier is reserved".into(),
            ));
        }
        let entry = TokenEntry {
            id: token.clone(),
            paused: false,
            redirected_to: None,
        };
        let inserted =
            self.store
                .insert_if_absent(TABLE_TOKENS, token.as_str().as_bytes(), &entry)?;
        if !inserted {
            return Err(DirectoryError::TokenExists(token.clone()));
        }
        self.events.emit(Event::TokenAdded {
            token: token.clone(),
        });
        Ok(())
    }

    /// Pause a token: transfers against it are rejected until resumed.
    /// Pausing an already-paused token is a silent no-op. OWNER-gated.
    pub fn pause(&self, caller: &AccountId, token: &TokenId) -> Result<(), DirectoryError> {
        self.roles.require(Role::Owner, caller)?;
        let mut entry = self
            .load(token)?
            .ok_or_else(|| DirectoryError::TokenNotFound(token.clone()))?;
        if entry.paused {
            return Ok(());
        }
        entry.paused = true;
        self.save(&entry)?;
        self.events.emit(Event::TokenPaused {
            token: token.clone(),
        });
        Ok(())
    }

    /// Resume a paused token. Resuming an active token is a silent no-op.
    /// OWNER-gated.
    pub fn resume(&self, caller: &AccountId, token: &TokenId) -> Result<(), DirectoryError> {
        self.roles.require(Role::Owner, caller)?;
        let mut entry = self
            .load(token)?
            .ok_or_else(|| DirectoryError::TokenNotFound(token.clone()))?;
        if !entry.paused {
            return Ok(());
        }
        entry.paused = false;
        self.save(&entry)?;
        self.events.emit(Event::TokenResumed {
            token: token.clone(),
        });
        Ok(())
    }

    /// Redirect a retired token to its successor. The successor must be
    /// registered and must not itself be redirected. OWNER-gated.
    pub fn redirect(
        &self,
        caller: &AccountId,
        from: &TokenId,
        to: &TokenId,
    ) -> Result<(), DirectoryError> {
        self.roles.require(Role::Owner, caller)?;
        if from == to {
            return Err(DirectoryError::InvalidToken(
                "token cannot redirect to itself".into(),
            ));
        }
        let mut entry = self
            .load(from)?
            .ok_or_else(|| DirectoryError::TokenNotFound(from.clone()))?;
        let target = self
            .load(to)?
            .ok_or_else(|| DirectoryError::TokenNotFound(to.clone()))?;
        if target.redirected_to.is_some() {
            return Err(DirectoryError::RedirectChained {
                from: from.clone(),
                to: to.clone(),
            });
        }
        entry.redirected_to = Some(to.clone());
        self.save(&entry)?;
        self.events.emit(Event::TokenRedirected {
            from: from.clone(),
            to: to.clone(),
        });
        Ok(())
    }

    /// The current canonical identifier for `token`, following at most one
    /// redirect hop.
    pub fn latest(&self, token: &TokenId) -> Result<TokenId, DirectoryError> {
        let entry = self
            .load(token)?
            .ok_or_else(|| DirectoryError::TokenNotFound(token.clone()))?;
        match entry.redirected_to {
            Some(successor) => Ok(successor),
            None => Ok(entry.id),
        }
    }

    /// Whether `token`, after resolution, is registered, unpaused, and not
    /// redirected away. Unknown tokens report inactive.
    pub fn is_active(&self, token: &TokenId) -> Result<bool, DirectoryError> {
        let Some(entry) = self.load(token)? else {
            return Ok(false);
        };
        let resolved = match entry.redirected_to {
            Some(successor) => match self.load(&successor)? {
                Some(target) => target,
                None => return Ok(false),
            },
            None => entry,
        };
        Ok(!resolved.paused && resolved.redirected_to.is_none())
    }
}
