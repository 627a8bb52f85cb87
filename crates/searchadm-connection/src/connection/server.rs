//! Connection to a single remote administrative server

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use searchadm_core::{AdminBridge, AdminError, AdminHandle, Endpoint, Result};
use serde::{Deserialize, Serialize};

use super::ConnectionState;

/// Usage counters for a connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStats {
    /// Checkouts and invocations served by this connection
    pub calls: u64,
    /// Failed open attempts and failed invocations
    pub errors: u64,
    /// Last time the connection was checked out or invoked
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Point-in-time view of a connection, safe to serialize and hand to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSnapshot<K> {
    pub key: K,
    pub endpoint: Endpoint,
    pub description: Option<String>,
    pub state: ConnectionState,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_connected_at: Option<DateTime<Utc>>,
    pub stats: ConnectionStats,
}

/// Mutable part of a connection, always changed under one lock
#[derive(Default)]
struct ConnectionInner {
    state: ConnectionState,
    handle: Option<Arc<dyn AdminHandle>>,
    last_error: Option<String>,
    last_connected_at: Option<DateTime<Utc>>,
    stats: ConnectionStats,
}

/// A connection to one remote administrative server
///
/// Identity and endpoint are fixed at creation. The bridge handle is owned
/// exclusively by the connection and is never exposed; callers reach the
/// server through [`ServerConnection::invoke`].
pub struct ServerConnection<K> {
    key: K,
    endpoint: Endpoint,
    description: Option<String>,
    created_at: DateTime<Utc>,
    /// Serializes open and close so lifecycle changes of one connection never interleave
    lifecycle: tokio::sync::Mutex<()>,
    inner: Mutex<ConnectionInner>,
}

impl<K: fmt::Display> ServerConnection<K> {
    pub(crate) fn new(key: K, endpoint: Endpoint, description: Option<String>) -> Self {
        tracing::debug!(key = %key, endpoint = %endpoint, "creating connection");
        Self {
            key,
            endpoint,
            description,
            created_at: Utc::now(),
            lifecycle: tokio::sync::Mutex::new(()),
            inner: Mutex::new(ConnectionInner::default()),
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    pub fn last_connected_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().last_connected_at
    }

    pub fn stats(&self) -> ConnectionStats {
        self.inner.lock().stats
    }

    /// Open a fresh handle, replacing any handle held before.
    ///
    /// On failure the connection is left in [`ConnectionState::Error`] with
    /// the bridge message recorded and the error counter incremented.
    pub(crate) async fn open(&self, bridge: &dyn AdminBridge) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;

        let previous = {
            let mut inner = self.inner.lock();
            inner.state = ConnectionState::Connecting;
            inner.handle.take()
        };

        if let Some(handle) = previous
            && let Err(e) = handle.close().await
        {
            tracing::warn!(key = %self.key, endpoint = %self.endpoint, error = %e, "failed to close previous handle before reopening");
        }

        match bridge.open(&self.endpoint).await {
            Ok(handle) => {
                let mut inner = self.inner.lock();
                inner.state = ConnectionState::Connected;
                inner.handle = Some(handle);
                inner.last_error = None;
                inner.last_connected_at = Some(Utc::now());
                tracing::debug!(key = %self.key, endpoint = %self.endpoint, "connection opened");
                Ok(())
            }
            Err(e) => {
                let message = bridge_message(e);
                let mut inner = self.inner.lock();
                inner.state = ConnectionState::Error;
                inner.last_error = Some(message.clone());
                inner.stats.errors += 1;
                tracing::debug!(key = %self.key, endpoint = %self.endpoint, error = %message, "connection open failed");
                Err(AdminError::OpenFailed {
                    target: self.key.to_string(),
                    endpoint: self.endpoint.clone(),
                    message,
                })
            }
        }
    }

    /// Close the connection and release its handle.
    ///
    /// The connection always ends up [`ConnectionState::Closed`] without a
    /// handle. A failing bridge close is reported as
    /// [`AdminError::CloseFailed`] but does not keep the handle alive.
    /// Closing a connection that holds no handle is a no-op.
    pub async fn close(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        self.detach_and_close(ConnectionState::Closed, None).await
    }

    /// Report the handle as dead.
    ///
    /// Moves a connected connection to [`ConnectionState::Error`] and
    /// releases its handle best-effort. Connections in any other state are
    /// left untouched.
    pub async fn mark_failed(&self, message: impl Into<String>) {
        let _lifecycle = self.lifecycle.lock().await;
        let message = message.into();

        {
            let mut inner = self.inner.lock();
            if !inner.state.is_connected() {
                return;
            }
            inner.stats.errors += 1;
        }

        tracing::warn!(key = %self.key, endpoint = %self.endpoint, error = %message, "connection marked as failed");
        if let Err(e) = self
            .detach_and_close(ConnectionState::Error, Some(message))
            .await
        {
            tracing::warn!(key = %self.key, error = %e, "failed to close handle of failed connection");
        }
    }

    /// Run an opaque administrative operation through the handle.
    pub async fn invoke(
        &self,
        operation: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let handle = {
            let mut inner = self.inner.lock();
            let handle = match (inner.state, inner.handle.as_ref()) {
                (ConnectionState::Connected, Some(handle)) => handle.clone(),
                (state, _) => {
                    return Err(AdminError::NotConnected(format!("{} is {}", self.key, state)));
                }
            };
            inner.stats.calls += 1;
            inner.stats.last_used_at = Some(Utc::now());
            handle
        };

        let result = handle.invoke(operation, payload).await;
        if let Err(e) = &result {
            self.inner.lock().stats.errors += 1;
            tracing::debug!(key = %self.key, operation = %operation, error = %e, "invocation failed");
        }
        result
    }

    /// Count a checkout, failing if the connection is not connected.
    pub(crate) fn record_checkout(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.state.is_connected() {
            return Err(AdminError::NotConnected(format!(
                "{} is {}",
                self.key, inner.state
            )));
        }
        inner.stats.calls += 1;
        inner.stats.last_used_at = Some(Utc::now());
        Ok(())
    }

    /// Change state and detach the handle in one step, then close the handle.
    async fn detach_and_close(
        &self,
        next: ConnectionState,
        error: Option<String>,
    ) -> Result<()> {
        let handle = {
            let mut inner = self.inner.lock();
            inner.state = next;
            if error.is_some() {
                inner.last_error = error;
            }
            inner.handle.take()
        };

        let Some(handle) = handle else {
            return Ok(());
        };

        handle.close().await.map_err(|e| AdminError::CloseFailed {
            target: self.key.to_string(),
            endpoint: self.endpoint.clone(),
            message: bridge_message(e),
        })
    }
}

impl<K: Clone + fmt::Display> ServerConnection<K> {
    pub fn snapshot(&self) -> ConnectionSnapshot<K> {
        let inner = self.inner.lock();
        ConnectionSnapshot {
            key: self.key.clone(),
            endpoint: self.endpoint.clone(),
            description: self.description.clone(),
            state: inner.state,
            last_error: inner.last_error.clone(),
            created_at: self.created_at,
            last_connected_at: inner.last_connected_at,
            stats: inner.stats,
        }
    }
}

impl<K: fmt::Display> fmt::Debug for ServerConnection<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConnection")
            .field("key", &self.key.to_string())
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

fn bridge_message(error: AdminError) -> String {
    match error {
        AdminError::Bridge(message) => message,
        other => other.to_string(),
    }
}
