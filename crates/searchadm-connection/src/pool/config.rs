//! Pool configuration types

use std::time::Duration;

use searchadm_core::Endpoint;
use serde::{Deserialize, Serialize};

/// Configuration for an instance pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of instances the pool may hold
    capacity: usize,
    /// Interval in milliseconds between health sweeps, if monitoring is wanted
    monitor_interval_ms: Option<u64>,
}

impl PoolConfig {
    /// Create a new pool configuration with the given capacity
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0, got {}", capacity);

        Self {
            capacity,
            monitor_interval_ms: None,
        }
    }

    /// Set the health sweep interval in milliseconds
    pub fn with_monitor_interval_ms(mut self, interval_ms: u64) -> Self {
        self.monitor_interval_ms = Some(interval_ms);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the health sweep interval as a Duration if set
    pub fn monitor_interval(&self) -> Option<Duration> {
        self.monitor_interval_ms.map(Duration::from_millis)
    }
}

impl Default for PoolConfig {
    /// Defaults: capacity 10, no background monitoring
    fn default() -> Self {
        Self::new(10)
    }
}

/// Where and what to create when adding an instance to the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub description: Option<String>,
}

impl InstanceConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }
}
