//! Uniform request/response protocol
//!
//! Requests are JSON objects tagged by `op`:
//!
//! ```json
//! {"op": "add_server", "name": "primary", "host": "10.0.0.5", "port": 9312}
//! {"op": "create_instance", "host": "10.0.0.6", "port": 9312}
//! {"op": "invoke", "server": "primary", "operation": "status", "payload": {}}
//! ```
//!
//! Every request gets an [`AdminResponse`]; failures carry a stable
//! [`ErrorKind`] and whether retrying may help.

use searchadm_core::ErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AdminRequest {
    AddServer {
        name: String,
        host: String,
        port: u16,
        #[serde(default)]
        description: Option<String>,
    },
    GetServer {
        #[serde(default)]
        name: Option<String>,
    },
    RemoveServer {
        name: String,
    },
    ListServers,
    GetAllServers,
    GetServerStatus {
        #[serde(default)]
        name: Option<String>,
    },
    ReconnectServer {
        #[serde(default)]
        name: Option<String>,
    },
    SetDefaultServer {
        name: String,
    },
    GetDefaultServer,
    CloseAllServers,
    RegistryStatistics,

    CreateInstance {
        host: String,
        port: u16,
        #[serde(default)]
        description: Option<String>,
    },
    /// Check an instance out; it stays checked out until `release_instance`
    GetInstance {
        #[serde(default)]
        id: Option<Uuid>,
    },
    ReleaseInstance {
        id: Uuid,
    },
    DeleteInstance {
        id: Uuid,
    },
    ListInstances,
    SetDefaultInstance {
        id: Uuid,
    },
    GetDefaultInstanceId,
    PoolStats,
    StartMonitoring {
        interval_ms: u64,
    },
    StopMonitoring,
    Cleanup,

    /// Run an opaque operation on a pool instance (`instance`) or a
    /// registered server (`server`, or the default server)
    Invoke {
        #[serde(default)]
        server: Option<String>,
        #[serde(default)]
        instance: Option<Uuid>,
        operation: String,
        #[serde(default)]
        payload: Value,
    },
    Shutdown,
}

impl AdminRequest {
    /// Parse one JSON request.
    pub fn from_json(input: &str) -> ServiceResult<Self> {
        serde_json::from_str(input).map_err(|e| ServiceError::InvalidRequest(e.to_string()))
    }

    /// Name of the operation, as it appears in the `op` tag
    pub fn op(&self) -> &'static str {
        match self {
            AdminRequest::AddServer { .. } => "add_server",
            AdminRequest::GetServer { .. } => "get_server",
            AdminRequest::RemoveServer { .. } => "remove_server",
            AdminRequest::ListServers => "list_servers",
            AdminRequest::GetAllServers => "get_all_servers",
            AdminRequest::GetServerStatus { .. } => "get_server_status",
            AdminRequest::ReconnectServer { .. } => "reconnect_server",
            AdminRequest::SetDefaultServer { .. } => "set_default_server",
            AdminRequest::GetDefaultServer => "get_default_server",
            AdminRequest::CloseAllServers => "close_all_servers",
            AdminRequest::RegistryStatistics => "registry_statistics",
            AdminRequest::CreateInstance { .. } => "create_instance",
            AdminRequest::GetInstance { .. } => "get_instance",
            AdminRequest::ReleaseInstance { .. } => "release_instance",
            AdminRequest::DeleteInstance { .. } => "delete_instance",
            AdminRequest::ListInstances => "list_instances",
            AdminRequest::SetDefaultInstance { .. } => "set_default_instance",
            AdminRequest::GetDefaultInstanceId => "get_default_instance_id",
            AdminRequest::PoolStats => "pool_stats",
            AdminRequest::StartMonitoring { .. } => "start_monitoring",
            AdminRequest::StopMonitoring => "stop_monitoring",
            AdminRequest::Cleanup => "cleanup",
            AdminRequest::Invoke { .. } => "invoke",
            AdminRequest::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl AdminResponse {
    pub fn success(data: Value) -> Self {
        Self {
            ok: true,
            data: (!data.is_null()).then_some(data),
            error: None,
        }
    }

    pub fn failure(error: &ServiceError) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(ErrorBody {
                kind: error.kind(),
                message: error.to_string(),
                retryable: error.is_retryable(),
            }),
        }
    }
}

impl From<ServiceResult<Value>> for AdminResponse {
    fn from(result: ServiceResult<Value>) -> Self {
        match result {
            Ok(data) => AdminResponse::success(data),
            Err(e) => AdminResponse::failure(&e),
        }
    }
}
