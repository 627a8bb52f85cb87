//! Name-keyed registry of operator-managed servers

use std::fmt;
use std::sync::Arc;

use searchadm_core::{AdminBridge, AdminError, Endpoint, Result};
use serde::{Deserialize, Serialize};

use crate::connection::{ConnectionSnapshot, ServerConnection};
use crate::manager::{Capacity, KeyedManager, release_best_effort};


/// Aggregate counters over every registered server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total: usize,
    pub connected: usize,
    pub calls: u64,
    pub errors: u64,
    /// `errors / (errors + calls)`, `None` while no operation happened yet
    pub error_rate: Option<f64>,
    pub default: Option<String>,
}

impl fmt::Display for RegistryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} connected, {} calls, {} errors, error rate ",
            self.connected, self.total, self.calls, self.errors
        )?;
        match self.error_rate {
            Some(rate) => write!(f, "{:.2}%", rate * 100.0),
            None => f.write_str("n/a"),
        }
    }
}

/// Outcome of [`ServerRegistry::close_all`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloseAllReport {
    /// Servers removed from the registry
    pub closed: usize,
    /// Messages of handles that failed to close
    pub close_errors: Vec<String>,
}

/// Registry of long-lived servers addressed by a caller-chosen name
///
/// A server whose open fails stays registered in
/// [`ConnectionState::Error`](crate::ConnectionState::Error) so it can be
/// inspected and reconnected, but [`ServerRegistry::add`] still reports the
/// failure. Callers must not assume a registered server is usable without
/// checking [`ServerRegistry::get`].
pub struct ServerRegistry {
    manager: KeyedManager<String>,
}

impl ServerRegistry {
    pub fn new(bridge: Arc<dyn AdminBridge>) -> Self {
        Self {
            manager: KeyedManager::new(bridge, Capacity::Unbounded),
        }
    }

    /// Register a server under `name` and open it.
    ///
    /// The first server opened successfully while no default is set becomes
    /// the default.
    #[tracing::instrument(skip(self, endpoint, description), fields(endpoint = %endpoint))]
    pub async fn add(
        &self,
        name: &str,
        endpoint: Endpoint,
        description: Option<String>,
    ) -> Result<Arc<ServerConnection<String>>> {
        let conn = Arc::new(ServerConnection::new(
            name.to_string(),
            endpoint,
            description,
        ));
        self.manager.insert_new(conn.clone()).inspect_err(|e| {
            tracing::warn!(error = %e, "server rejected");
        })?;

        if let Err(e) = conn.open(self.manager.bridge()).await {
            tracing::warn!(error = %e, "server registered but failed to open");
            return Err(e);
        }

        self.settle_open(&conn).await?;
        tracing::info!("server added");
        Ok(conn)
    }

    /// Look up a server and count the checkout.
    ///
    /// With `name` unset the default server is used.
    pub fn get(&self, name: Option<&str>) -> Result<Arc<ServerConnection<String>>> {
        let conn = self.lookup(name)?;
        conn.record_checkout()?;
        Ok(conn)
    }

    /// Look up a server in any state without touching its counters.
    pub fn lookup(&self, name: Option<&str>) -> Result<Arc<ServerConnection<String>>> {
        let name = self.resolve(name)?;
        self.manager
            .get(&name)
            .ok_or(AdminError::NotFound(name))
    }

    /// Unregister a server and release its handle.
    ///
    /// A failing close is logged, never returned.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, name: &str) -> Result<()> {
        let conn = self
            .manager
            .remove(&name.to_string())
            .ok_or_else(|| AdminError::NotFound(name.to_string()))?;

        release_best_effort(&conn).await;
        tracing::info!("server removed");
        Ok(())
    }

    /// Replace the handle of a registered server with a freshly opened one.
    ///
    /// A failed reopen leaves the server registered in `Error` state.
    #[tracing::instrument(skip(self))]
    pub async fn reconnect(&self, name: Option<&str>) -> Result<Arc<ServerConnection<String>>> {
        let conn = self.lookup(name)?;

        if let Err(e) = conn.open(self.manager.bridge()).await {
            tracing::warn!(name = %conn.key(), error = %e, "reconnect failed");
            return Err(e);
        }

        self.settle_open(&conn).await?;
        tracing::info!(name = %conn.key(), "server reconnected");
        Ok(conn)
    }

    pub fn set_default(&self, name: &str) -> Result<()> {
        self.manager.set_default(&name.to_string())
    }

    pub fn get_default(&self) -> Result<String> {
        self.manager
            .default_key()
            .ok_or_else(|| AdminError::NotFound("no default server is set".into()))
    }

    /// Names of every registered server, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .manager
            .connections()
            .iter()
            .map(|conn| conn.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Snapshots of every registered server, sorted by name.
    pub fn get_all(&self) -> Vec<ConnectionSnapshot<String>> {
        let mut snapshots: Vec<_> = self
            .manager
            .connections()
            .iter()
            .map(|conn| conn.snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.key.cmp(&b.key));
        snapshots
    }

    pub fn get_status(&self, name: Option<&str>) -> Result<ConnectionSnapshot<String>> {
        self.lookup(name).map(|conn| conn.snapshot())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.manager.contains(&name.to_string())
    }

    pub fn len(&self) -> usize {
        self.manager.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unregister every server and release every handle.
    ///
    /// Individual close failures are collected in the report and never stop
    /// the sweep.
    #[tracing::instrument(skip(self))]
    pub async fn close_all(&self) -> CloseAllReport {
        let drained = self.manager.drain();
        let mut report = CloseAllReport {
            closed: drained.len(),
            ..CloseAllReport::default()
        };

        for conn in &drained {
            if let Some(message) = release_best_effort(conn).await {
                report.close_errors.push(message);
            }
        }

        tracing::info!(
            closed = report.closed,
            close_errors = report.close_errors.len(),
            "registry closed"
        );
        report
    }

    pub fn statistics(&self) -> RegistryStats {
        let (connections, default) = self.manager.with_entries(|entries| {
            (
                entries.connections.values().cloned().collect::<Vec<_>>(),
                entries.default.clone(),
            )
        });

        let mut stats = RegistryStats {
            total: connections.len(),
            connected: 0,
            calls: 0,
            errors: 0,
            error_rate: None,
            default,
        };
        for conn in &connections {
            let snapshot = conn.snapshot();
            if snapshot.state.is_connected() {
                stats.connected += 1;
            }
            stats.calls += snapshot.stats.calls;
            stats.errors += snapshot.stats.errors;
        }

        let operations = stats.calls + stats.errors;
        if operations > 0 {
            stats.error_rate = Some(stats.errors as f64 / operations as f64);
        }
        stats
    }

    fn resolve(&self, name: Option<&str>) -> Result<String> {
        let name = name.map(str::to_string);
        self.manager
            .resolve(name.as_ref())
            .ok_or_else(|| AdminError::NotFound("no default server is set".into()))
    }

    /// Adopt a freshly opened server as default, or release it again if it
    /// was removed while the open was in flight.
    async fn settle_open(&self, conn: &Arc<ServerConnection<String>>) -> Result<()> {
        let registered = self.manager.with_entries(|entries| {
            if !entries.holds(conn.key(), conn) {
                return false;
            }
            entries.adopt_default(conn.key());
            true
        });

        if registered {
            return Ok(());
        }

        tracing::warn!(name = %conn.key(), "server was removed while opening");
        release_best_effort(conn).await;
        Err(AdminError::NotFound(conn.key().clone()))
    }
}
