//! # User Record Store
//!
//! The persistence seam of the state machine. A store reads whole
//! [`EngagementState`] records and runs read-modify-write cycles on one
//! record at a time:
//!
//! ```text
//! modify(id, transition)
//!   lock record      (write lock / SELECT ... FOR UPDATE)
//!   next = transition(stored)
//!   diff(stored, next) non-empty  ->  write fields, version += 1
//!   unlock, return record as stored
//! ```
//!
//! Calls for the same user are serialized, so every transition decides
//! from the record the previous one left behind.
//!
//! [`InMemoryUserStore`] backs tests and database-less deployments. The
//! Postgres implementation lives in the API crate.

use std::collections::HashMap;

use async_trait::async_trait;
use broski_core::UserId;
use parking_lot::RwLock;

use crate::error::StoreError;
use crate::state::{EngagementPatch, EngagementState};

/// Transition run by [`UserStore::modify`] while the record is locked.
pub type Transition<'a> = dyn FnMut(&EngagementState) -> EngagementState + Send + 'a;

/// Versioned storage of engagement records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch a user's record.
    async fn get(&self, id: UserId) -> Result<EngagementState, StoreError>;

    /// Create a record. The stored version starts at 0.
    async fn insert(&self, id: UserId, state: EngagementState)
        -> Result<EngagementState, StoreError>;

    /// Run `transition` against the stored record with the record locked
    /// and persist the difference. An unchanged record is not written and
    /// keeps its version. Returns the record as stored afterwards.
    async fn modify(
        &self,
        id: UserId,
        transition: &mut Transition<'_>,
    ) -> Result<EngagementState, StoreError>;

    /// Remove a record.
    async fn delete(&self, id: UserId) -> Result<(), StoreError>;

    /// Every stored record, ordered by user id.
    async fn list(&self) -> Result<Vec<(UserId, EngagementState)>, StoreError>;

    /// Check the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<UserId, EngagementState>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Whether no records are stored.
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get(&self, id: UserId) -> Result<EngagementState, StoreError> {
        self.users
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn insert(
        &self,
        id: UserId,
        mut state: EngagementState,
    ) -> Result<EngagementState, StoreError> {
        let mut users = self.users.write();
        if users.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        state.version = 0;
        users.insert(id, state.clone());
        Ok(state)
    }

    async fn modify(
        &self,
        id: UserId,
        transition: &mut Transition<'_>,
    ) -> Result<EngagementState, StoreError> {
        let mut users = self.users.write();
        let stored = users.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let next = transition(&*stored);
        let patch = EngagementPatch::diff(stored, &next);
        if !patch.is_empty() {
            patch.apply_to(stored);
            stored.version += 1;
        }
        Ok(stored.clone())
    }

    async fn delete(&self, id: UserId) -> Result<(), StoreError> {
        self.users
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    async fn list(&self) -> Result<Vec<(UserId, EngagementState)>, StoreError> {
        let mut all: Vec<_> = self
            .users
            .read()
            .iter()
            .map(|(id, state)| (*id, state.clone()))
            .collect();
        all.sort_by_key(|(id, _)| id.0);
        Ok(all)
    }
}
