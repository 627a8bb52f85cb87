//! Administration facade
//!
//! Owns one [`ServerRegistry`] and one [`InstancePool`] and exposes every
//! caller-facing operation on them, both as typed methods and through
//! [`AdminService::handle`].

use std::sync::Arc;
use std::time::Duration;

use searchadm_connection::{
    CleanupReport, CloseAllReport, ConnectionSnapshot, InstanceConfig, InstancePool, PoolConfig,
    PoolStats, RegistryStats, ServerConnection, ServerRegistry,
};
use searchadm_core::{AdminBridge, Endpoint};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::protocol::{AdminRequest, AdminResponse};
use crate::settings::AdminSettings;

/// A configured server that could not be brought up at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerFailure {
    pub name: String,
    pub message: String,
}

/// Outcome of [`AdminService::bootstrap`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BootstrapReport {
    /// Servers registered and connected
    pub connected: Vec<String>,
    /// Servers that failed; they stay registered unless the name was taken
    pub failed: Vec<ServerFailure>,
    pub default: Option<String>,
    pub monitoring: bool,
}

/// Outcome of [`AdminService::shutdown`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShutdownReport {
    pub pool: CleanupReport,
    pub registry: CloseAllReport,
}

/// Service fronting the registry and the pool
///
/// Constructed explicitly and handed to whatever serves the protocol; there
/// is no process-wide instance. Use [`AdminService::shutdown`] to release
/// everything.
pub struct AdminService {
    registry: ServerRegistry,
    pool: InstancePool,
}

impl AdminService {
    pub fn new(bridge: Arc<dyn AdminBridge>, pool_config: PoolConfig) -> Self {
        Self {
            registry: ServerRegistry::new(bridge.clone()),
            pool: InstancePool::new(bridge, pool_config),
        }
    }

    /// Build the managers described by `settings` without opening anything.
    pub fn from_settings(
        bridge: Arc<dyn AdminBridge>,
        settings: &AdminSettings,
    ) -> ServiceResult<Self> {
        settings.validate()?;
        Ok(Self::new(bridge, settings.pool_config()?))
    }

    /// Register every configured server and start monitoring if configured.
    ///
    /// Servers that fail to open are reported, never fatal. A server marked
    /// as default becomes the default even if its open failed, so a later
    /// reconnect makes it usable.
    #[tracing::instrument(skip(self, settings), fields(servers = settings.servers.len()))]
    pub async fn bootstrap(&self, settings: &AdminSettings) -> ServiceResult<BootstrapReport> {
        let mut report = BootstrapReport::default();

        for server in &settings.servers {
            match self
                .registry
                .add(&server.name, server.endpoint(), server.description.clone())
                .await
            {
                Ok(_) => report.connected.push(server.name.clone()),
                Err(e) => {
                    tracing::warn!(name = %server.name, error = %e, "configured server unavailable");
                    report.failed.push(ServerFailure {
                        name: server.name.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if let Some(server) = settings.default_server()
            && let Err(e) = self.registry.set_default(&server.name)
        {
            tracing::warn!(name = %server.name, error = %e, "configured default server not registered");
        }
        report.default = self.registry.get_default().ok();

        if let Some(interval) = self.pool.config().monitor_interval() {
            self.pool.start_monitoring(interval)?;
        }
        report.monitoring = self.pool.is_monitoring();

        tracing::info!(
            connected = report.connected.len(),
            failed = report.failed.len(),
            "bootstrap finished"
        );
        Ok(report)
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    pub fn pool(&self) -> &InstancePool {
        &self.pool
    }

    // Registry

    /// Register and open a server.
    ///
    /// On an open failure the server stays registered in `Error` state and
    /// the failure is returned; check [`AdminService::get_server_status`]
    /// before assuming a server is usable.
    pub async fn add_server(
        &self,
        name: &str,
        host: &str,
        port: u16,
        description: Option<String>,
    ) -> ServiceResult<ConnectionSnapshot<String>> {
        let conn = self
            .registry
            .add(name, Endpoint::new(host, port), description)
            .await?;
        Ok(conn.snapshot())
    }

    pub fn get_server(&self, name: Option<&str>) -> ServiceResult<Arc<ServerConnection<String>>> {
        Ok(self.registry.get(name)?)
    }

    pub async fn remove_server(&self, name: &str) -> ServiceResult<()> {
        Ok(self.registry.remove(name).await?)
    }

    pub fn list_servers(&self) -> Vec<String> {
        self.registry.list()
    }

    pub fn get_all_servers(&self) -> Vec<ConnectionSnapshot<String>> {
        self.registry.get_all()
    }

    pub fn get_server_status(&self, name: Option<&str>) -> ServiceResult<ConnectionSnapshot<String>> {
        Ok(self.registry.get_status(name)?)
    }

    pub async fn reconnect_server(
        &self,
        name: Option<&str>,
    ) -> ServiceResult<ConnectionSnapshot<String>> {
        let conn = self.registry.reconnect(name).await?;
        Ok(conn.snapshot())
    }

    pub fn set_default_server(&self, name: &str) -> ServiceResult<()> {
        Ok(self.registry.set_default(name)?)
    }

    pub fn get_default_server(&self) -> ServiceResult<String> {
        Ok(self.registry.get_default()?)
    }

    pub async fn close_all_servers(&self) -> CloseAllReport {
        self.registry.close_all().await
    }

    pub fn registry_statistics(&self) -> RegistryStats {
        self.registry.statistics()
    }

    // Pool

    pub async fn create_instance(&self, config: InstanceConfig) -> ServiceResult<Uuid> {
        Ok(self.pool.create_instance(config).await?)
    }

    /// Check an instance out until [`AdminService::release_instance`].
    pub fn get_instance(&self, id: Option<Uuid>) -> ServiceResult<Arc<ServerConnection<Uuid>>> {
        Ok(self.pool.acquire(id)?)
    }

    pub fn release_instance(&self, id: Uuid) -> ServiceResult<()> {
        Ok(self.pool.release(id)?)
    }

    pub async fn delete_instance(&self, id: Uuid) -> ServiceResult<()> {
        Ok(self.pool.delete_instance(id).await?)
    }

    pub fn list_instances(&self) -> Vec<ConnectionSnapshot<Uuid>> {
        self.pool.list_instances()
    }

    pub fn set_default_instance(&self, id: Uuid) -> ServiceResult<()> {
        Ok(self.pool.set_default_instance(id)?)
    }

    pub fn get_default_instance_id(&self) -> Option<Uuid> {
        self.pool.default_instance_id()
    }

    pub fn get_pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn start_monitoring(&self, interval: Duration) -> ServiceResult<bool> {
        Ok(self.pool.start_monitoring(interval)?)
    }

    pub async fn stop_monitoring(&self) -> bool {
        self.pool.stop_monitoring().await
    }

    pub async fn cleanup(&self) -> CleanupReport {
        self.pool.cleanup().await
    }

    /// Run an opaque operation on a pool instance or a registered server.
    ///
    /// A pool instance is checked out for the duration of the call.
    #[tracing::instrument(skip(self, payload))]
    pub async fn invoke(
        &self,
        server: Option<&str>,
        instance: Option<Uuid>,
        operation: &str,
        payload: Value,
    ) -> ServiceResult<Value> {
        match (server, instance) {
            (Some(_), Some(_)) => Err(ServiceError::InvalidRequest(
                "invoke takes either a server or an instance, not both".into(),
            )),
            (None, Some(id)) => {
                let instance = self.pool.checkout(Some(id))?;
                Ok(instance.invoke(operation, payload).await?)
            }
            (server, None) => {
                let conn = self.registry.lookup(server)?;
                Ok(conn.invoke(operation, payload).await?)
            }
        }
    }

    /// Release every instance and every server.
    ///
    /// The service stays usable afterwards.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) -> ShutdownReport {
        let pool = self.pool.cleanup().await;
        let registry = self.registry.close_all().await;
        tracing::info!("admin service shut down");
        ShutdownReport { pool, registry }
    }

    /// Dispatch one protocol request.
    pub async fn handle(&self, request: AdminRequest) -> AdminResponse {
        let op = request.op();
        let result = self.dispatch(request).await;
        if let Err(e) = &result {
            tracing::debug!(op, error = %e, "request failed");
        }
        result.into()
    }

    /// Parse and dispatch one JSON request.
    pub async fn handle_json(&self, input: &str) -> AdminResponse {
        match AdminRequest::from_json(input) {
            Ok(request) => self.handle(request).await,
            Err(e) => AdminResponse::failure(&e),
        }
    }

    /// Serve newline-delimited JSON requests until EOF or a `shutdown` request.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let request = AdminRequest::from_json(line);
            let stop = matches!(request, Ok(AdminRequest::Shutdown));
            let response = match request {
                Ok(request) => self.handle(request).await,
                Err(e) => AdminResponse::failure(&e),
            };

            let mut encoded = serde_json::to_vec(&response)?;
            encoded.push(b'\n');
            writer.write_all(&encoded).await?;
            writer.flush().await?;

            if stop {
                break;
            }
        }
        Ok(())
    }

    async fn dispatch(&self, request: AdminRequest) -> ServiceResult<Value> {
        match request {
            AdminRequest::AddServer {
                name,
                host,
                port,
                description,
            } => encode(self.add_server(&name, &host, port, description).await?),
            AdminRequest::GetServer { name } => {
                encode(self.get_server(name.as_deref())?.snapshot())
            }
            AdminRequest::RemoveServer { name } => {
                self.remove_server(&name).await?;
                Ok(Value::Null)
            }
            AdminRequest::ListServers => encode(self.list_servers()),
            AdminRequest::GetAllServers => encode(self.get_all_servers()),
            AdminRequest::GetServerStatus { name } => {
                encode(self.get_server_status(name.as_deref())?)
            }
            AdminRequest::ReconnectServer { name } => {
                encode(self.reconnect_server(name.as_deref()).await?)
            }
            AdminRequest::SetDefaultServer { name } => {
                self.set_default_server(&name)?;
                Ok(Value::Null)
            }
            AdminRequest::GetDefaultServer => encode(self.get_default_server()?),
            AdminRequest::CloseAllServers => encode(self.close_all_servers().await),
            AdminRequest::RegistryStatistics => encode(self.registry_statistics()),

            AdminRequest::CreateInstance {
                host,
                port,
                description,
            } => {
                let config = InstanceConfig {
                    host,
                    port,
                    description,
                };
                let id = self.create_instance(config).await?;
                Ok(json!({ "id": id }))
            }
            AdminRequest::GetInstance { id } => encode(self.get_instance(id)?.snapshot()),
            AdminRequest::ReleaseInstance { id } => {
                self.release_instance(id)?;
                Ok(Value::Null)
            }
            AdminRequest::DeleteInstance { id } => {
                self.delete_instance(id).await?;
                Ok(Value::Null)
            }
            AdminRequest::ListInstances => encode(self.list_instances()),
            AdminRequest::SetDefaultInstance { id } => {
                self.set_default_instance(id)?;
                Ok(Value::Null)
            }
            AdminRequest::GetDefaultInstanceId => {
                let id = self.get_default_instance_id();
                Ok(json!({ "id": id }))
            }
            AdminRequest::PoolStats => encode(self.get_pool_stats()),
            AdminRequest::StartMonitoring { interval_ms } => {
                let started = self.start_monitoring(Duration::from_millis(interval_ms))?;
                Ok(json!({ "started": started }))
            }
            AdminRequest::StopMonitoring => {
                Ok(json!({ "stopped": self.stop_monitoring().await }))
            }
            AdminRequest::Cleanup => encode(self.cleanup().await),

            AdminRequest::Invoke {
                server,
                instance,
                operation,
                payload,
            } => {
                self.invoke(server.as_deref(), instance, &operation, payload)
                    .await
            }
            AdminRequest::Shutdown => encode(self.shutdown().await),
        }
    }
}

fn encode<T: Serialize>(value: T) -> ServiceResult<Value> {
    Ok(serde_json::to_value(value)?)
}
