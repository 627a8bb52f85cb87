//! TOML settings for the administration service
//!
//! ```toml
//! [pool]
//! capacity = 4
//! monitor_interval_secs = 30
//!
//! [[servers]]
//! name = "primary"
//! host = "10.0.0.5"
//! port = 9312
//! description = "main cluster"
//! default = true
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use searchadm_connection::PoolConfig;
use searchadm_core::Endpoint;
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

const DEFAULT_POOL_CAPACITY: usize = 10;

/// Settings loaded at startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminSettings {
    pub pool: PoolSettings,
    pub servers: Vec<ServerSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub capacity: usize,
    /// Seconds between health sweeps; no background sweep when unset
    pub monitor_interval_secs: Option<u64>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_POOL_CAPACITY,
            monitor_interval_secs: None,
        }
    }
}

/// A server registered by name at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub description: Option<String>,
    /// Use this server when a caller names none
    #[serde(default)]
    pub default: bool,
}

impl ServerSettings {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }
}

impl AdminSettings {
    /// `<config_dir>/searchadm/settings.toml`
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .context("Could not determine config directory")
            .map(|p| p.join("searchadm").join("settings.toml"))
    }

    /// Read and validate a settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings = Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid settings file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            servers = settings.servers.len(),
            "settings loaded"
        );
        Ok(settings)
    }

    /// Load the settings file at the default location, or defaults if it does not exist.
    pub fn load_or_default() -> Result<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let settings: Self = toml::from_str(contents).context("Failed to parse settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize settings")
    }

    pub fn validate(&self) -> ServiceResult<()> {
        if self.pool.capacity == 0 {
            return Err(ServiceError::Settings(
                "pool capacity must be greater than 0".into(),
            ));
        }
        if self.pool.monitor_interval_secs == Some(0) {
            return Err(ServiceError::Settings(
                "monitor_interval_secs must be greater than 0".into(),
            ));
        }

        let mut names = HashSet::new();
        for server in &self.servers {
            if server.name.trim().is_empty() {
                return Err(ServiceError::Settings("server name must not be empty".into()));
            }
            if !names.insert(server.name.as_str()) {
                return Err(ServiceError::Settings(format!(
                    "duplicate server name '{}'",
                    server.name
                )));
            }
            if server.host.trim().is_empty() {
                return Err(ServiceError::Settings(format!(
                    "server '{}' has an empty host",
                    server.name
                )));
            }
            if server.port == 0 {
                return Err(ServiceError::Settings(format!(
                    "server '{}' has port 0",
                    server.name
                )));
            }
        }

        let defaults = self.servers.iter().filter(|s| s.default).count();
        if defaults > 1 {
            return Err(ServiceError::Settings(format!(
                "{defaults} servers are marked as default, at most one is allowed"
            )));
        }
        Ok(())
    }

    pub fn pool_config(&self) -> ServiceResult<PoolConfig> {
        if self.pool.capacity == 0 {
            return Err(ServiceError::Settings(
                "pool capacity must be greater than 0".into(),
            ));
        }
        let config = PoolConfig::new(self.pool.capacity);
        Ok(match self.pool.monitor_interval_secs {
            Some(secs) => config.with_monitor_interval_ms(secs.saturating_mul(1000)),
            None => config,
        })
    }

    pub fn default_server(&self) -> Option<&ServerSettings> {
        self.servers.iter().find(|s| s.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;

    const SAMPLE: &str = r#"
        [pool]
        capacity = 4
        monitor_interval_secs = 30

        [[servers]]
        name = "primary"
        host = "10.0.0.5"
        port = 9312
        description = "main cluster"
        default = true

        [[servers]]
        name = "replica"
        host = "10.0.0.6"
        port = 9312
    "#;

    #[test]
    fn test_parse_sample() {
        let settings = AdminSettings::from_toml_str(SAMPLE).unwrap();
        assert_eq!(settings.pool.capacity, 4);
        assert_eq!(settings.servers.len(), 2);
        assert_eq!(settings.default_server().unwrap().name, "primary");
        assert_eq!(settings.servers[1].description, None);
        assert!(!settings.servers[1].default);

        let config = settings.pool_config().unwrap();
        assert_eq!(config.capacity(), 4);
        assert_eq!(config.monitor_interval(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let settings = AdminSettings::from_toml_str("").unwrap();
        assert_eq!(settings, AdminSettings::default());
        assert_eq!(settings.pool.capacity, 10);
        assert_eq!(settings.pool_config().unwrap().monitor_interval(), None);
    }

    #[rstest]
    #[case::zero_capacity("[pool]\ncapacity = 0")]
    #[case::zero_interval("[pool]\nmonitor_interval_secs = 0")]
    #[case::empty_host("[[servers]]\nname = \"a\"\nhost = \"\"\nport = 1")]
    #[case::zero_port("[[servers]]\nname = \"a\"\nhost = \"h\"\nport = 0")]
    #[case::empty_name("[[servers]]\nname = \" \"\nhost = \"h\"\nport = 1")]
    #[case::duplicate_name(
        "[[servers]]\nname = \"a\"\nhost = \"h\"\nport = 1\n[[servers]]\nname = \"a\"\nhost = \"h\"\nport = 2"
    )]
    #[case::two_defaults(
        "[[servers]]\nname = \"a\"\nhost = \"h\"\nport = 1\ndefault = true\n[[servers]]\nname = \"b\"\nhost = \"h\"\nport = 2\ndefault = true"
    )]
    fn test_invalid_settings_rejected(#[case] contents: &str) {
        assert!(AdminSettings::from_toml_str(contents).is_err());
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let err = AdminSettings::from_toml_str("[pool\ncapacity = 4").unwrap_err();
        assert!(err.to_string().contains("Failed to parse settings"));
    }

    #[test]
    fn test_toml_round_trip() {
        let settings = AdminSettings::from_toml_str(SAMPLE).unwrap();
        let rendered = settings.to_toml_string().unwrap();
        assert_eq!(AdminSettings::from_toml_str(&rendered).unwrap(), settings);
    }

    #[test]
    fn test_default_path_ends_with_settings_file() {
        if let Ok(path) = AdminSettings::default_path() {
            assert!(path.ends_with("searchadm/settings.toml"));
        }
    }
}
