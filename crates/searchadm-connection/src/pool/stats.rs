//! Pool statistics types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ConnectionSnapshot;

/// Statistics about an instance pool's current state
///
/// Idle and active counts only include instances that are connected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Number of instances held by the pool, whatever their state
    total: usize,
    /// Connected instances available for checkout
    idle: usize,
    /// Connected instances currently checked out
    active: usize,
    /// Maximum number of instances
    capacity: usize,
    /// Instance used when a caller names none
    default: Option<Uuid>,
    /// Whether a background health sweep is running
    monitoring: bool,
    /// Per-instance detail
    instances: Vec<ConnectionSnapshot<Uuid>>,
}

impl PoolStats {
    pub(crate) fn new(
        idle: usize,
        active: usize,
        capacity: usize,
        default: Option<Uuid>,
        monitoring: bool,
        instances: Vec<ConnectionSnapshot<Uuid>>,
    ) -> Self {
        Self {
            total: instances.len(),
            idle,
            active,
            capacity,
            default,
            monitoring,
            instances,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn idle(&self) -> usize {
        self.idle
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn default_instance(&self) -> Option<Uuid> {
        self.default
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    pub fn instances(&self) -> &[ConnectionSnapshot<Uuid>] {
        &self.instances
    }

    /// Share of capacity currently checked out (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.active as f64 / self.capacity as f64
        }
    }

    /// Whether another instance would be rejected
    pub fn is_full(&self) -> bool {
        self.total >= self.capacity
    }
}
