//! searchadm connection - lifecycle management for remote administrative servers
//!
//! This crate creates, tracks, reuses and retires handles to remote
//! administrative servers. Two managers share one connection state machine:
//!
//! - [`ServerRegistry`] - name-keyed, unbounded, for operator-managed servers
//! - [`InstancePool`] - id-keyed, capacity-bounded, with acquire/release checkout
//!
//! A [`HealthMonitor`] sweeps failed or closed entries out of a pool in the
//! background.

mod connection;
pub mod health;
mod manager;
pub mod pool;
mod registry;

#[cfg(test)]
mod mock;

pub use connection::{ConnectionSnapshot, ConnectionState, ConnectionStats, ServerConnection};
pub use health::{HealthMonitor, Sweep};
pub use manager::ConnectionKey;
pub use pool::{CleanupReport, InstanceConfig, InstancePool, PoolConfig, PoolStats, PooledInstance};
pub use registry::{CloseAllReport, RegistryStats, ServerRegistry};
