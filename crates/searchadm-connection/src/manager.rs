//! Keyed connection manager shared by the registry and the pool
//!
//! Every mutation of the connection map, the default key and the membership
//! sets happens under one mutex per manager. Bridge I/O never runs while that
//! mutex is held.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use searchadm_core::{AdminBridge, AdminError, Result};

use crate::connection::ServerConnection;
use crate::health::Sweep;

/// Types usable as a connection identity
pub trait ConnectionKey:
    Clone + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static
{
}

impl<T> ConnectionKey for T where
    T: Clone + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static
{
}

/// How many entries a manager may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Capacity {
    Unbounded,
    Bounded(usize),
}

/// Extra per-key bookkeeping kept under the manager lock
pub(crate) trait Membership<K>: Default + Send + 'static {
    /// Drop every trace of `key`.
    fn forget(&mut self, key: &K);
}

impl<K> Membership<K> for () {
    fn forget(&mut self, _key: &K) {}
}

/// State guarded by the manager lock
pub(crate) struct Entries<K, M> {
    pub(crate) connections: HashMap<K, Arc<ServerConnection<K>>>,
    pub(crate) default: Option<K>,
    pub(crate) membership: M,
    /// Slots held by creations whose open is still in flight
    reserved: usize,
    /// Bumped by every drain; reservations taken before it are stale
    generation: u64,
}

impl<K: ConnectionKey, M: Membership<K>> Entries<K, M> {
    fn new() -> Self {
        Self {
            connections: HashMap::new(),
            default: None,
            membership: M::default(),
            reserved: 0,
            generation: 0,
        }
    }

    /// Adopt `key` as the default if none is set.
    pub(crate) fn adopt_default(&mut self, key: &K) -> bool {
        if self.default.is_some() {
            return false;
        }
        tracing::debug!(key = %key, "adopting default");
        self.default = Some(key.clone());
        true
    }

    /// Whether `key` still maps to exactly this connection.
    pub(crate) fn holds(&self, key: &K, conn: &Arc<ServerConnection<K>>) -> bool {
        self.connections
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, conn))
    }

    /// Remove `key` from the map and every set, reassigning the default.
    fn detach(&mut self, key: &K) -> Option<Arc<ServerConnection<K>>> {
        let conn = self.connections.remove(key)?;
        self.membership.forget(key);

        if self.default.as_ref() == Some(key) {
            self.default = self.connections.keys().next().cloned();
            match &self.default {
                Some(next) => tracing::info!(removed = %key, default = %next, "default reassigned"),
                None => tracing::info!(removed = %key, "default cleared"),
            }
        }
        Some(conn)
    }

    fn check_room(&self, capacity: Capacity) -> Result<()> {
        match capacity {
            Capacity::Bounded(limit) if self.connections.len() + self.reserved >= limit => {
                Err(AdminError::PoolFull { capacity: limit })
            }
            _ => Ok(()),
        }
    }
}

pub(crate) struct KeyedManager<K, M = ()> {
    bridge: Arc<dyn AdminBridge>,
    capacity: Capacity,
    entries: Mutex<Entries<K, M>>,
}

impl<K: ConnectionKey, M: Membership<K>> KeyedManager<K, M> {
    pub(crate) fn new(bridge: Arc<dyn AdminBridge>, capacity: Capacity) -> Self {
        Self {
            bridge,
            capacity,
            entries: Mutex::new(Entries::new()),
        }
    }

    pub(crate) fn bridge(&self) -> &dyn AdminBridge {
        self.bridge.as_ref()
    }

    pub(crate) fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Run `f` with exclusive access to the entries.
    ///
    /// `f` must not block; the lock is a plain mutex.
    pub(crate) fn with_entries<R>(&self, f: impl FnOnce(&mut Entries<K, M>) -> R) -> R {
        f(&mut *self.entries.lock())
    }

    /// Insert a connection under a key that must not be taken yet.
    pub(crate) fn insert_new(&self, conn: Arc<ServerConnection<K>>) -> Result<()> {
        let mut entries = self.entries.lock();
        let key = conn.key().clone();
        if entries.connections.contains_key(&key) {
            return Err(AdminError::AlreadyExists(key.to_string()));
        }
        entries.check_room(self.capacity)?;
        entries.connections.insert(key, conn);
        Ok(())
    }

    /// Hold a slot for a creation whose open has not finished yet.
    pub(crate) fn reserve(&self) -> Result<SlotReservation<'_, K, M>> {
        let mut entries = self.entries.lock();
        entries.check_room(self.capacity)?;
        entries.reserved += 1;
        Ok(SlotReservation {
            manager: self,
            generation: entries.generation,
            armed: true,
        })
    }

    /// Resolve an explicit key or fall back to the default.
    pub(crate) fn resolve(&self, key: Option<&K>) -> Option<K> {
        match key {
            Some(key) => Some(key.clone()),
            None => self.entries.lock().default.clone(),
        }
    }

    pub(crate) fn get(&self, key: &K) -> Option<Arc<ServerConnection<K>>> {
        let conn = self.entries.lock().connections.get(key).cloned();
        if conn.is_none() {
            tracing::debug!(key = %key, "connection not found");
        }
        conn
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.entries.lock().connections.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().connections.len()
    }

    /// Detach `key` from the manager. The caller releases the handle.
    pub(crate) fn remove(&self, key: &K) -> Option<Arc<ServerConnection<K>>> {
        self.entries.lock().detach(key)
    }

    pub(crate) fn set_default(&self, key: &K) -> Result<()> {
        let mut entries = self.entries.lock();
        if !entries.connections.contains_key(key) {
            return Err(AdminError::NotFound(key.to_string()));
        }
        entries.default = Some(key.clone());
        tracing::info!(key = %key, "default set");
        Ok(())
    }

    pub(crate) fn default_key(&self) -> Option<K> {
        self.entries.lock().default.clone()
    }

    /// Consistent copy of every connection currently held.
    pub(crate) fn connections(&self) -> Vec<Arc<ServerConnection<K>>> {
        self.entries.lock().connections.values().cloned().collect()
    }

    /// Empty the manager, returning what it held.
    ///
    /// Creations still opening when the manager is drained cannot commit.
    pub(crate) fn drain(&self) -> Vec<Arc<ServerConnection<K>>> {
        let mut entries = self.entries.lock();
        entries.generation += 1;
        entries.default = None;
        entries.membership = M::default();
        entries.connections.drain().map(|(_, conn)| conn).collect()
    }

    /// Remove every entry in `Error` or `Closed` state.
    pub(crate) fn reap(&self) -> Vec<Arc<ServerConnection<K>>> {
        let mut entries = self.entries.lock();
        let doomed: Vec<K> = entries
            .connections
            .iter()
            .filter(|(_, conn)| conn.state().is_reapable())
            .map(|(key, _)| key.clone())
            .collect();

        doomed
            .iter()
            .filter_map(|key| {
                let conn = entries.detach(key)?;
                tracing::warn!(
                    key = %key,
                    endpoint = %conn.endpoint(),
                    state = %conn.state(),
                    last_error = ?conn.last_error(),
                    "removing unhealthy connection"
                );
                Some(conn)
            })
            .collect()
    }
}

/// Close a detached connection, logging instead of failing.
///
/// Returns the error message when the bridge refused to close.
pub(crate) async fn release_best_effort<K: ConnectionKey>(
    conn: &ServerConnection<K>,
) -> Option<String> {
    match conn.close().await {
        Ok(()) => None,
        Err(e) => {
            tracing::warn!(key = %conn.key(), endpoint = %conn.endpoint(), error = %e, "failed to release handle");
            Some(e.to_string())
        }
    }
}

impl<K: ConnectionKey, M: Membership<K>> Sweep for KeyedManager<K, M> {
    fn sweep(&self) -> usize {
        self.reap().len()
    }
}

/// A capacity slot held while a connection is being opened
///
/// Dropping the reservation without committing returns the slot.
pub(crate) struct SlotReservation<'a, K: ConnectionKey, M: Membership<K>> {
    manager: &'a KeyedManager<K, M>,
    generation: u64,
    armed: bool,
}

impl<K: ConnectionKey, M: Membership<K>> SlotReservation<'_, K, M> {
    /// Turn the reservation into a map entry, running `register` under the same lock.
    ///
    /// Returns `false` without inserting if the manager was drained since the
    /// slot was reserved; the caller still owns `conn` and must release it.
    pub(crate) fn commit(
        mut self,
        conn: Arc<ServerConnection<K>>,
        register: impl FnOnce(&mut Entries<K, M>, &K),
    ) -> bool {
        let mut entries = self.manager.entries.lock();
        entries.reserved = entries.reserved.saturating_sub(1);
        self.armed = false;

        if entries.generation != self.generation {
            return false;
        }

        let key = conn.key().clone();
        entries.connections.insert(key.clone(), conn);
        register(&mut entries, &key);
        true
    }
}

impl<K: ConnectionKey, M: Membership<K>> Drop for SlotReservation<'_, K, M> {
    fn drop(&mut self) {
        if self.armed {
            let mut entries = self.manager.entries.lock();
            entries.reserved = entries.reserved.saturating_sub(1);
        }
    }
}
