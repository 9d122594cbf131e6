//! Configuration types for batch-fetch

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};
use utoipa::ToSchema;

use crate::error::{Error, Result};

/// Outbound fetch behavior (concurrency, per-request bounds)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct FetchConfig {
    /// Maximum simultaneously in-flight fetch tasks per job (default and maximum: 10)
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Per-request timeout, in seconds (default: 5)
    ///
    /// Applied to every GET regardless of the job timeout; the job deadline
    /// still cuts a request short when it fires first.
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub request_timeout: Duration,

    /// Response body ceiling in bytes (default: 10 MiB)
    ///
    /// Bodies larger than this are discarded and recorded as an HTTP 413 error.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: u64,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent_fetches(),
            request_timeout: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
            user_agent: default_user_agent(),
        }
    }
}

/// Which store implementation backs jobs and artifacts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Process-local maps, lost on exit (default)
    #[default]
    Memory,
    /// SQLite database at [`PersistenceConfig::database_path`]
    Sqlite,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// Store implementation (default: memory)
    #[serde(default)]
    pub backend: StorageBackend,

    /// Database path when `backend = "sqlite"` (default: "./batch-fetch.db")
    #[serde(default = "default_database_path")]
    #[schema(value_type = String)]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_path: default_database_path(),
        }
    }
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8080)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration
///
/// - [`fetch`](FetchConfig): concurrency ceiling, per-request timeout, body limit
/// - [`persistence`](PersistenceConfig): job and artifact storage
/// - [`server`](ServerIntegrationConfig): REST API
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Outbound fetch settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Storage settings
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// API settings
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Load a JSON configuration file; missing fields take their defaults
    pub async fn from_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| Error::Config {
            message: format!("Failed to parse '{}': {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the orchestrator cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_CONCURRENT_FETCHES).contains(&self.fetch.max_concurrent_fetches) {
            return Err(Error::Config {
                message: format!(
                    "max_concurrent_fetches must be between 1 and {MAX_CONCURRENT_FETCHES}"
                ),
                key: Some("fetch.max_concurrent_fetches".to_string()),
            });
        }
        if self.fetch.max_body_bytes == 0 {
            return Err(Error::Config {
                message: "max_body_bytes must be at least 1".to_string(),
                key: Some("fetch.max_body_bytes".to_string()),
            });
        }
        if self.fetch.request_timeout.is_zero() {
            return Err(Error::Config {
                message: "request_timeout must be at least 1 second".to_string(),
                key: Some("fetch.request_timeout".to_string()),
            });
        }
        Ok(())
    }
}

/// Hard ceiling on simultaneous fetches per job
pub const MAX_CONCURRENT_FETCHES: usize = 10;

fn default_max_concurrent_fetches() -> usize {
    MAX_CONCURRENT_FETCHES
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_max_body_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_user_agent() -> String {
    format!("batch-fetch/{}", env!("CARGO_PKG_VERSION"))
}

fn default_database_path() -> PathBuf {
    PathBuf::from("batch-fetch.db")
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_true() -> bool {
    true
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
