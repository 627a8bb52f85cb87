//! Scriptable bridge used by the unit tests

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use searchadm_core::{AdminBridge, AdminError, AdminHandle, Endpoint, Result};
use tokio::sync::Notify;

#[derive(Default)]
struct MockState {
    opened: AtomicUsize,
    close_calls: AtomicUsize,
    teardowns: AtomicUsize,
    fail_hosts: Mutex<HashSet<String>>,
    fail_close: AtomicBool,
    fail_teardown: AtomicBool,
    /// When set, opens wait here until the test lets them through
    gate: Mutex<Option<Arc<Notify>>>,
    waiting: AtomicUsize,
}

/// Bridge whose open/close outcomes are controlled by the test
#[derive(Clone, Default)]
pub(crate) struct MockBridge {
    state: Arc<MockState>,
}

impl MockBridge {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every open against `host` fail until healed.
    pub(crate) fn fail_host(&self, host: &str) {
        self.state.fail_hosts.lock().insert(host.to_string());
    }

    pub(crate) fn heal_host(&self, host: &str) {
        self.state.fail_hosts.lock().remove(host);
    }

    pub(crate) fn set_fail_close(&self, fail: bool) {
        self.state.fail_close.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_teardown(&self, fail: bool) {
        self.state.fail_teardown.store(fail, Ordering::SeqCst);
    }

    /// Hold every subsequent open until [`MockBridge::open_gate`].
    pub(crate) fn close_gate(&self) {
        *self.state.gate.lock() = Some(Arc::new(Notify::new()));
    }

    /// Let one held open through.
    pub(crate) fn open_gate(&self) {
        if let Some(gate) = self.state.gate.lock().take() {
            gate.notify_one();
        }
    }

    /// Wait until an open is parked at the gate.
    pub(crate) async fn wait_for_open(&self) {
        while self.state.waiting.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
    }

    pub(crate) fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.state.close_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn teardowns(&self) -> usize {
        self.state.teardowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdminBridge for MockBridge {
    async fn open(&self, endpoint: &Endpoint) -> Result<Arc<dyn AdminHandle>> {
        let gate = self.state.gate.lock().clone();
        if let Some(gate) = gate {
            self.state.waiting.fetch_add(1, Ordering::SeqCst);
            gate.notified().await;
            self.state.waiting.fetch_sub(1, Ordering::SeqCst);
        }
        if self.state.fail_hosts.lock().contains(&endpoint.host) {
            return Err(AdminError::Bridge(format!(
                "connection refused by {}",
                endpoint
            )));
        }
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockHandle {
            state: self.state.clone(),
        }))
    }

    async fn teardown_all(&self) -> Result<()> {
        self.state.teardowns.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_teardown.load(Ordering::SeqCst) {
            return Err(AdminError::Bridge("teardown refused".into()));
        }
        Ok(())
    }
}

struct MockHandle {
    state: Arc<MockState>,
}

#[async_trait]
impl AdminHandle for MockHandle {
    async fn close(&self) -> Result<()> {
        self.state.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(AdminError::Bridge("close refused".into()));
        }
        Ok(())
    }

    async fn invoke(
        &self,
        operation: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value> {
        if operation == "fail" {
            return Err(AdminError::Bridge("operation failed".into()));
        }
        Ok(serde_json::json!({ "operation": operation, "payload": payload }))
    }
}
