//! Per-user state storage.
//!
//! - [`UserStore`]: in-memory state keyed by user id, one lock per user
//! - [`DurableStore`](durable::DurableStore): redb-backed snapshots for restarts
//!
//! A `UserStore` shards its map with `DashMap` and wraps every user's value
//! in its own mutex. Operations for one user serialize; operations for
//! different users never contend on the same lock.

pub mod durable;

use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;

use crate::error::StoreError;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Concurrent map from user id to independently locked state.
#[derive(Debug)]
pub struct UserStore<T> {
    cells: DashMap<String, Arc<Mutex<T>>>,
}

impl<T> UserStore<T> {
    pub fn new() -> Self {
        Self {
            cells: DashMap::new(),
        }
    }

    /// Run `f` with exclusive access to `user_id`'s state, creating it with
    /// `init` on first contact.
    pub fn with<R>(
        &self,
        user_id: &str,
        init: impl FnOnce() -> T,
        f: impl FnOnce(&mut T) -> R,
    ) -> R {
        let cell = self.cell_or_insert(user_id, init);
        let mut guard = lock(&cell);
        f(&mut guard)
    }

    /// Run `f` with exclusive access to existing state; `None` for unknown users.
    pub fn with_existing<R>(&self, user_id: &str, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let cell = self.cells.get(user_id).map(|c| Arc::clone(c.value()))?;
        let mut guard = lock(&cell);
        Some(f(&mut guard))
    }

    /// Insert or replace a user's state.
    pub fn insert(&self, user_id: &str, value: T) {
        self.cells
            .insert(user_id.to_string(), Arc::new(Mutex::new(value)));
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.cells.contains_key(user_id)
    }

    /// Number of users with state.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Snapshot of known user ids, sorted.
    pub fn user_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.cells.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    fn cell_or_insert(&self, user_id: &str, init: impl FnOnce() -> T) -> Arc<Mutex<T>> {
        if let Some(cell) = self.cells.get(user_id) {
            return Arc::clone(cell.value());
        }
        // The shard lock is released before the per-user lock is taken.
        let entry = self
            .cells
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(init())));
        Arc::clone(entry.value())
    }
}

impl<T: Clone> UserStore<T> {
    /// Clone of a user's state, if any.
    pub fn get(&self, user_id: &str) -> Option<T> {
        self.with_existing(user_id, |value| value.clone())
    }
}

impl<T> Default for UserStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("recovered poisoned lock");
        poisoned.into_inner()
    })
}
