//! Native bridge traits
//!
//! The bridge is the only component that talks to a remote administrative
//! service. Managers in `searchadm-connection` use it to open and close
//! handles; everything else goes through [`AdminHandle::invoke`].

use crate::{Endpoint, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Opens handles to remote administrative servers
#[async_trait]
pub trait AdminBridge: Send + Sync + 'static {
    /// Open a new handle to the server at `endpoint`
    async fn open(&self, endpoint: &Endpoint) -> Result<Arc<dyn AdminHandle>>;

    /// Tear down any process-wide bridge state.
    ///
    /// Invoked once during a full pool cleanup, after every handle has been
    /// released. The default implementation has nothing to tear down.
    async fn teardown_all(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<T: AdminBridge> AdminBridge for Arc<T> {
    async fn open(&self, endpoint: &Endpoint) -> Result<Arc<dyn AdminHandle>> {
        (**self).open(endpoint).await
    }

    async fn teardown_all(&self) -> Result<()> {
        (**self).teardown_all().await
    }
}

/// A live handle to a remote administrative server
///
/// Handles are owned by exactly one connection and must be closed
/// explicitly to release the underlying resources.
#[async_trait]
pub trait AdminHandle: Send + Sync {
    /// Close the handle.
    async fn close(&self) -> Result<()>;

    /// Run an administrative operation through this handle.
    ///
    /// The operation name and payload are opaque to the connection layer.
    async fn invoke(
        &self,
        operation: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value>;
}
