//! Bounded, id-keyed pool of administrative server instances
//!
//! Instances are created on demand, identified by a generated id, and checked
//! out exclusively with acquire/release.
//!
//! # Example
//!
//! ```ignore
//! use searchadm_connection::pool::{InstanceConfig, InstancePool, PoolConfig};
//!
//! let pool = InstancePool::new(bridge, PoolConfig::new(4));
//! let id = pool.create_instance(InstanceConfig::new("10.0.0.5", 9312)).await?;
//!
//! let conn = pool.acquire(Some(id))?;
//! conn.invoke("status", serde_json::Value::Null).await?;
//! pool.release(id)?;
//! ```

mod config;
mod pool;
mod stats;


pub use config::{InstanceConfig, PoolConfig};
pub use pool::{CleanupReport, InstancePool, PooledInstance};
pub use stats::PoolStats;
