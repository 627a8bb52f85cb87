//! Common test utilities and mocks

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use searchadm_core::{AdminBridge, AdminError, AdminHandle, Endpoint, Result};
use searchadm_services::{AdminService, AdminSettings};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Default)]
struct BridgeState {
    opened: AtomicUsize,
    closed: AtomicUsize,
    teardowns: AtomicUsize,
    fail_close: AtomicBool,
    refused: Mutex<HashSet<String>>,
    /// Log of every invoked operation, for assertion in tests
    invocations: Mutex<Vec<String>>,
}

/// Mock bridge for exercising the service without a remote server.
///
/// Opens against hosts listed with [`MockBridge::refuse`] fail; every other
/// open yields a handle that echoes invocations back.
#[derive(Default)]
pub struct MockBridge {
    state: Arc<BridgeState>,
}

impl MockBridge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn refuse(&self, host: &str) {
        self.state.refused.lock().insert(host.to_string());
    }

    pub fn accept(&self, host: &str) {
        self.state.refused.lock().remove(host);
    }

    pub fn set_fail_close(&self, fail: bool) {
        self.state.fail_close.store(fail, Ordering::SeqCst);
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn teardowns(&self) -> usize {
        self.state.teardowns.load(Ordering::SeqCst)
    }

    pub fn invocations(&self) -> Vec<String> {
        self.state.invocations.lock().clone()
    }
}

#[async_trait]
impl AdminBridge for MockBridge {
    async fn open(&self, endpoint: &Endpoint) -> Result<Arc<dyn AdminHandle>> {
        if self.state.refused.lock().contains(&endpoint.host) {
            return Err(AdminError::Bridge(format!(
                "{endpoint} refused the connection"
            )));
        }
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockHandle {
            endpoint: endpoint.clone(),
            state: self.state.clone(),
        }))
    }

    async fn teardown_all(&self) -> Result<()> {
        self.state.teardowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockHandle {
    endpoint: Endpoint,
    state: Arc<BridgeState>,
}

#[async_trait]
impl AdminHandle for MockHandle {
    async fn close(&self) -> Result<()> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
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
        self.state.invocations.lock().push(operation.to_string());
        if operation == "fail" {
            return Err(AdminError::Bridge("operation failed".into()));
        }
        Ok(serde_json::json!({
            "endpoint": self.endpoint.to_string(),
            "operation": operation,
            "payload": payload,
        }))
    }
}

/// Service over a fresh mock bridge
pub fn service(capacity: usize) -> (Arc<MockBridge>, AdminService) {
    let bridge = MockBridge::new();
    let settings = AdminSettings::from_toml_str(&format!("[pool]\ncapacity = {capacity}"))
        .expect("valid settings");
    let service = AdminService::from_settings(bridge.clone(), &settings).expect("valid service");
    (bridge, service)
}
