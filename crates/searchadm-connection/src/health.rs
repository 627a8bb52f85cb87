//! Background health sweep
//!
//! A [`HealthMonitor`] periodically asks a [`Sweep`] target to retire entries
//! whose connection is in `Error` or `Closed` state. The sweep is driven
//! purely by observed state; it never probes the remote server.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//!
//! let pool = InstancePool::new(bridge, PoolConfig::new(4));
//! pool.start_monitoring(Duration::from_secs(30))?;
//! // ...
//! pool.stop_monitoring().await;
//! ```

mod monitor;

#[cfg(test)]
mod tests;

pub use monitor::{HealthMonitor, Sweep};
