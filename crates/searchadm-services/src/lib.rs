//! searchadm services layer
//!
//! This crate sits between a protocol front end and the connection layer.
//!
//! # Architecture
//!
//! ```text
//! Protocol front end (JSON lines, tool integrations)
//!     ↓
//! Service Layer (searchadm-services) ← This crate
//!     ↓
//! Connection Layer (searchadm-connection: registry, pool, health sweep)
//!     ↓
//! Core (searchadm-core: endpoint, bridge traits, errors)
//! ```
//!
//! # Modules
//!
//! - [`AdminService`] - facade over one registry and one pool
//! - [`AdminRequest`] / [`AdminResponse`] - the uniform request/response protocol
//! - [`AdminSettings`] - TOML settings loaded at startup
//! - [`logging`] - tracing subscriber presets
//!
//! # Entry point
//!
//! A front end installs logging once, builds the service from settings, and
//! serves requests until EOF or a `shutdown` request:
//!
//! ```ignore
//! use searchadm_services::{AdminService, AdminSettings, logging};
//! use tokio::io::{BufReader, stdin, stdout};
//!
//! let _guard = logging::init_default()?;
//! let settings = AdminSettings::load_or_default()?;
//! let service = AdminService::from_settings(bridge, &settings)?;
//! service.bootstrap(&settings).await?;
//! service.serve(BufReader::new(stdin()), stdout()).await?;
//! service.shutdown().await;
//! ```

mod admin_service;
mod error;
pub mod logging;
mod protocol;
mod settings;

pub use admin_service::{AdminService, BootstrapReport, ServerFailure, ShutdownReport};
pub use error::{ServiceError, ServiceResult};
pub use protocol::{AdminRequest, AdminResponse, ErrorBody};
pub use settings::{AdminSettings, PoolSettings, ServerSettings};
