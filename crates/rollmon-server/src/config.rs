use rollmon_storage::memory::MemoryStore;
use rollmon_storage::sqlite::SqliteStore;
use rollmon_storage::ProductionStore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
    #[serde(default)]
    pub alerting: AlertingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            storage: StorageConfig::default(),
            sweeper: SweeperConfig::default(),
            alerting: AlertingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config '{}': {}", path, e))?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,
    /// Only read when `backend = "sqlite"`.
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            sqlite_path: default_sqlite_path(),
        }
    }
}

impl StorageConfig {
    /// Opens the configured backend.
    pub fn open(&self) -> rollmon_storage::Result<Arc<dyn ProductionStore>> {
        Ok(match self.backend {
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
            StorageBackend::Sqlite => Arc::new(SqliteStore::open(Path::new(&self.sqlite_path))?),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    #[serde(default = "default_sweeper_enabled")]
    pub enabled: bool,
    #[serde(default = "default_sweeper_tick_secs")]
    pub tick_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: default_sweeper_enabled(),
            tick_secs: default_sweeper_tick_secs(),
        }
    }
}

/// How detected and transitioned alerts reach the notification inbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertingConfig {
    /// Emit template events for new, acknowledged and resolved alerts.
    #[serde(default = "default_notify_on_alert")]
    pub notify_on_alert: bool,
    #[serde(default = "default_alert_event")]
    pub alert_event: String,
    /// Role that receives a direct notification when no template listens on
    /// `alert_event`. An empty string disables the fallback.
    #[serde(default = "default_fallback_role")]
    pub fallback_role: Option<String>,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            notify_on_alert: default_notify_on_alert(),
            alert_event: default_alert_event(),
            fallback_role: default_fallback_role(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,
}

impl AlertingConfig {
    pub fn fallback_role(&self) -> Option<&str> {
        self.fallback_role.as_deref().filter(|role| !role.trim().is_empty())
    }
}

fn default_http_port() -> u16 {
    8080
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Memory
}

fn default_sqlite_path() -> String {
    "data/rollmon.db".to_string()
}

fn default_sweeper_enabled() -> bool {
    true
}

fn default_sweeper_tick_secs() -> u64 {
    300
}

fn default_notify_on_alert() -> bool {
    true
}

fn default_alert_event() -> String {
    "bottleneck_detected".to_string()
}

fn default_fallback_role() -> Option<String> {
    Some("Supervisor".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.sqlite_path, "data/rollmon.db");
        assert!(config.sweeper.enabled);
        assert_eq!(config.sweeper.tick_secs, 300);
        assert_eq!(config.alerting.alert_event, "bottleneck_detected");
        assert_eq!(config.alerting.fallback_role.as_deref(), Some("Supervisor"));
        assert!(!config.logging.json);
    }

    #[test]
    fn sections_override_individual_fields() {
        let config: ServerConfig = toml::from_str(
            r#"
            http_port = 9000
            [storage]
            backend = "sqlite"
            [alerting]
            notify_on_alert = false
            "#,
        )
        .unwrap();
        assert_eq!(config.http_port, 9000);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage.sqlite_path, "data/rollmon.db");
        assert!(!config.alerting.notify_on_alert);
        assert_eq!(config.alerting.alert_event, "bottleneck_detected");
    }

    #[test]
    fn blank_fallback_role_disables_fallback() {
        let config: ServerConfig = toml::from_str("[alerting]\nfallback_role = \"\"").unwrap();
        assert_eq!(config.alerting.fallback_role(), None);
        assert_eq!(
            ServerConfig::default().alerting.fallback_role(),
            Some("Supervisor")
        );
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(toml::from_str::<ServerConfig>("[storage]\nbackend = \"redis\"").is_err());
    }

    #[test]
    fn shipped_config_parses() {
        let config: ServerConfig =
            toml::from_str(include_str!("../../../config/server.toml")).unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.alerting.fallback_role(), Some("Supervisor"));
    }
}
