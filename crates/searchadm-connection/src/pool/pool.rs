//! Instance pool implementation

use std::collections::HashSet;
use std::ops::Deref;
use std::sync::{Arc, Weak};
use std::time::Duration;

use searchadm_core::{AdminBridge, AdminError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::{InstanceConfig, PoolConfig};
use super::stats::PoolStats;
use crate::connection::{ConnectionSnapshot, ServerConnection};
use crate::health::{HealthMonitor, Sweep};
use crate::manager::{Capacity, ConnectionKey, KeyedManager, Membership, release_best_effort};

/// Checkout bookkeeping: which connected instances are free and which are in use
pub(crate) struct Checkout<K> {
    idle: HashSet<K>,
    active: HashSet<K>,
}

impl<K> Default for Checkout<K> {
    fn default() -> Self {
        Self {
            idle: HashSet::new(),
            active: HashSet::new(),
        }
    }
}

impl<K: ConnectionKey> Membership<K> for Checkout<K> {
    fn forget(&mut self, key: &K) {
        self.idle.remove(key);
        self.active.remove(key);
    }
}

/// Outcome of [`InstancePool::cleanup`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Instances removed from the pool
    pub removed: usize,
    /// Messages of handles that failed to close
    pub close_errors: Vec<String>,
    /// Message of a failed bridge teardown
    pub teardown_error: Option<String>,
}

/// A capacity-bounded pool of connections keyed by generated ids
///
/// Instances are checked out exclusively: an acquired instance cannot be
/// acquired again until it is released. The pool does not balance
/// acquire/release pairs for the caller.
pub struct InstancePool {
    manager: Arc<KeyedManager<Uuid, Checkout<Uuid>>>,
    config: PoolConfig,
    monitor: HealthMonitor,
}

impl InstancePool {
    pub fn new(bridge: Arc<dyn AdminBridge>, config: PoolConfig) -> Self {
        Self {
            manager: Arc::new(KeyedManager::new(
                bridge,
                Capacity::Bounded(config.capacity()),
            )),
            config,
            monitor: HealthMonitor::new(),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Open a new instance and add it to the idle set.
    ///
    /// The first instance created while no default is set becomes the
    /// default. A failed open consumes no capacity and leaves no entry.
    #[tracing::instrument(skip(self, config), fields(endpoint = %config.endpoint()))]
    pub async fn create_instance(&self, config: InstanceConfig) -> Result<Uuid> {
        let reservation = self.manager.reserve().inspect_err(|e| {
            tracing::warn!(error = %e, "instance rejected");
        })?;

        let id = Uuid::new_v4();
        let conn = Arc::new(ServerConnection::new(
            id,
            config.endpoint(),
            config.description.clone(),
        ));

        if let Err(e) = conn.open(self.manager.bridge()).await {
            tracing::error!(instance_id = %id, error = %e, "failed to open instance");
            return Err(e);
        }

        let committed = reservation.commit(conn.clone(), |entries, id| {
            entries.membership.idle.insert(*id);
            entries.adopt_default(id);
        });
        if !committed {
            tracing::warn!(instance_id = %id, "pool was cleaned up while the instance was opening");
            release_best_effort(&conn).await;
            return Err(AdminError::NotAvailable(format!(
                "pool was cleaned up while instance {id} was opening"
            )));
        }

        tracing::info!(instance_id = %id, "instance created");
        Ok(id)
    }

    /// Check out an instance for exclusive use.
    ///
    /// With `id` unset the default instance is used.
    pub fn acquire(&self, id: Option<Uuid>) -> Result<Arc<ServerConnection<Uuid>>> {
        self.manager.with_entries(|entries| {
            let id = id.or(entries.default).ok_or(AdminError::NoInstance)?;
            let conn = entries
                .connections
                .get(&id)
                .cloned()
                .ok_or_else(|| AdminError::NotFound(format!("instance {id}")))?;

            if entries.membership.active.contains(&id) {
                return Err(AdminError::NotAvailable(format!(
                    "instance {id} is already in use"
                )));
            }
            if conn.record_checkout().is_err() {
                entries.membership.idle.remove(&id);
                return Err(AdminError::NotAvailable(format!(
                    "instance {id} is {}",
                    conn.state()
                )));
            }

            entries.membership.idle.remove(&id);
            entries.membership.active.insert(id);
            tracing::debug!(instance_id = %id, "instance acquired");
            Ok(conn)
        })
    }

    /// Check out an instance that is released again when the guard drops.
    pub fn checkout(&self, id: Option<Uuid>) -> Result<PooledInstance<'_>> {
        let connection = self.acquire(id)?;
        Ok(PooledInstance {
            connection,
            pool: self,
        })
    }

    /// Return a checked-out instance.
    ///
    /// An instance that stopped being connected while checked out is dropped
    /// from both sets instead of becoming idle.
    pub fn release(&self, id: Uuid) -> Result<()> {
        self.manager.with_entries(|entries| {
            let conn = entries
                .connections
                .get(&id)
                .cloned()
                .ok_or_else(|| AdminError::NotFound(format!("instance {id}")))?;

            if !entries.membership.active.remove(&id) {
                if !conn.is_connected() {
                    entries.membership.idle.remove(&id);
                }
                tracing::debug!(instance_id = %id, "release of an instance that is not checked out");
                return Ok(());
            }

            if conn.is_connected() {
                entries.membership.idle.insert(id);
                tracing::debug!(instance_id = %id, "instance released");
            } else {
                tracing::debug!(instance_id = %id, state = %conn.state(), "released instance is no longer connected");
            }
            Ok(())
        })
    }

    /// Remove an instance and release its handle.
    ///
    /// If the instance was the default, another remaining instance becomes
    /// the default. A failing close is logged, never returned.
    #[tracing::instrument(skip(self), fields(instance_id = %id))]
    pub async fn delete_instance(&self, id: Uuid) -> Result<()> {
        let conn = self
            .manager
            .remove(&id)
            .ok_or_else(|| AdminError::NotFound(format!("instance {id}")))?;

        release_best_effort(&conn).await;
        tracing::info!("instance deleted");
        Ok(())
    }

    pub fn list_instances(&self) -> Vec<ConnectionSnapshot<Uuid>> {
        let mut instances: Vec<_> = self
            .manager
            .connections()
            .iter()
            .map(|conn| conn.snapshot())
            .collect();
        instances.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.key.cmp(&b.key)));
        instances
    }

    pub fn set_default_instance(&self, id: Uuid) -> Result<()> {
        self.manager
            .set_default(&id)
            .map_err(|_| AdminError::NotFound(format!("instance {id}")))
    }

    pub fn default_instance_id(&self) -> Option<Uuid> {
        self.manager.default_key()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.manager.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.manager.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        let capacity = match self.manager.capacity() {
            Capacity::Bounded(capacity) => capacity,
            Capacity::Unbounded => usize::MAX,
        };
        let monitoring = self.monitor.is_running();

        self.manager.with_entries(|entries| {
            let connected = |id: &&Uuid| {
                entries
                    .connections
                    .get(*id)
                    .is_some_and(|conn| conn.is_connected())
            };
            let idle = entries.membership.idle.iter().filter(connected).count();
            let active = entries.membership.active.iter().filter(connected).count();

            let mut instances: Vec<_> = entries
                .connections
                .values()
                .map(|conn| conn.snapshot())
                .collect();
            instances.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.key.cmp(&b.key)));

            PoolStats::new(idle, active, capacity, entries.default, monitoring, instances)
        })
    }

    #[cfg(test)]
    pub(crate) fn is_idle(&self, id: Uuid) -> bool {
        self.manager
            .with_entries(|entries| entries.membership.idle.contains(&id))
    }

    /// Remove every instance in `Error` or `Closed` state now.
    pub fn sweep(&self) -> Vec<Uuid> {
        self.manager
            .reap()
            .iter()
            .map(|conn| *conn.key())
            .collect()
    }

    /// Start the background health sweep.
    ///
    /// Returns `Ok(false)` if a sweep is already running.
    pub fn start_monitoring(&self, interval: Duration) -> Result<bool> {
        let target: Weak<dyn Sweep> = Arc::downgrade(&self.manager) as Weak<dyn Sweep>;
        self.monitor.start(target, interval)
    }

    /// Stop the background health sweep. Returns `false` if none was running.
    pub async fn stop_monitoring(&self) -> bool {
        self.monitor.stop().await
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.is_running()
    }

    /// Tear the pool down.
    ///
    /// Stops monitoring, removes and closes every instance, then runs the
    /// bridge teardown hook. Individual failures are collected in the report
    /// and never stop the cleanup.
    #[tracing::instrument(skip(self))]
    pub async fn cleanup(&self) -> CleanupReport {
        self.monitor.stop().await;

        let drained = self.manager.drain();
        let mut report = CleanupReport {
            removed: drained.len(),
            ..CleanupReport::default()
        };

        for conn in &drained {
            if let Some(message) = release_best_effort(conn).await {
                report.close_errors.push(message);
            }
        }

        if let Err(e) = self.manager.bridge().teardown_all().await {
            tracing::warn!(error = %e, "bridge teardown failed");
            report.teardown_error = Some(e.to_string());
        }

        tracing::info!(
            removed = report.removed,
            close_errors = report.close_errors.len(),
            "pool cleaned up"
        );
        report
    }
}

/// An instance checked out from the pool
///
/// When dropped, the instance is released back to the pool.
pub struct PooledInstance<'a> {
    connection: Arc<ServerConnection<Uuid>>,
    pool: &'a InstancePool,
}

impl PooledInstance<'_> {
    pub fn id(&self) -> Uuid {
        *self.connection.key()
    }

    /// Get the underlying connection as an Arc
    pub fn inner(&self) -> &Arc<ServerConnection<Uuid>> {
        &self.connection
    }
}

impl Deref for PooledInstance<'_> {
    type Target = ServerConnection<Uuid>;

    fn deref(&self) -> &Self::Target {
        &self.connection
    }
}

impl Drop for PooledInstance<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.pool.release(self.id()) {
            tracing::debug!(instance_id = %self.id(), error = %e, "checked-out instance vanished before release");
        }
    }
}
