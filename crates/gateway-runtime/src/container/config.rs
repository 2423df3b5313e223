//! # Gateway Configuration
//!
//! Unified configuration for the runtime, assembled from defaults plus
//! environment overrides.
//!
//! ## Environment
//!
//! | Variable | Field |
//! |----------|-------|
//! | `FG_BIND_ADDR` | `server.bind_addr` |
//! | `FG_OPERATOR_BIND_ADDR` | `server.operator_bind_addr` |
//! | `FG_OPERATOR_TOKEN` | `server.operator_token` |
//! | `FG_ENFORCE_AUTH` | `server.enforce_auth` |
//! | `FG_MAX_IDS` | `server.max_ids` |
//! | `FG_DATA_DIR` | `storage.data_dir` |
//! | `FG_USE_ROCKSDB` | `storage.use_rocksdb` |
//! | `FG_SYNC_ENABLED` | `sync.enabled` |
//! | `FG_SYNC_INTERVAL_SECS` | `sync.interval_secs` |
//! | `FG_SYNC_BATCH_SIZE` | `sync.batch_size` |
//! | `FG_OUTBOUND_TIMEOUT_SECS` | `outbound.timeout_secs` |
//! | `FG_TLS_CERTIFICATE` / `FG_TLS_PRIVATE_KEY` | `outbound.tls_*` |
//! | `FG_SIGNING_KEY` | `outbound.signing_key` |
//! | `FG_MONITORING_HEI_ID` | `outbound.monitoring_institution` |
//! | `FG_REGISTRY_PATH` | `registry.path` |
//! | `FG_PLUGINS_PATH` | `plugins.manifest` |

use fg_05_mapping_sync::SyncConfig;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Operator token set by `GatewayConfig::for_testing`.
pub const TESTING_OPERATOR_TOKEN: &str = "operator-test-token";

/// Complete gateway configuration.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    /// Inbound HTTP server.
    pub server: ServerConfig,
    /// Persistence.
    pub storage: StorageConfig,
    /// Mapping synchronizer.
    pub sync: SyncSettings,
    /// Outbound request engine.
    pub outbound: OutboundConfig,
    /// Federation registry.
    pub registry: RegistryConfig,
    /// Backend plugins.
    pub plugins: PluginsConfig,
}

impl GatewayConfig {
    /// Reject configurations the runtime cannot start with.
    ///
    /// ## Errors
    ///
    /// - `InvalidBatchSize` / `InvalidInterval`: zero sync parameters
    /// - `IncompleteTlsIdentity`: only one of certificate and key is set
    /// - `MissingFile`: a configured key, registry or manifest file is absent
    /// - `RocksDbUnavailable`: durable storage requested without the feature
    /// - `UnprotectedOperatorApi`: operator API reachable off-host with no token
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        if self.sync.interval_secs == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        if self.outbound.tls_certificate.is_some() != self.outbound.tls_private_key.is_some() {
            return Err(ConfigError::IncompleteTlsIdentity);
        }

        let files = [
            self.outbound.tls_certificate.as_deref(),
            self.outbound.tls_private_key.as_deref(),
            self.outbound.signing_key.as_deref(),
            self.registry.path.as_deref(),
            self.plugins.manifest.as_deref(),
        ];
        for path in files.into_iter().flatten() {
            require_file(path)?;
        }

        if self.storage.use_rocksdb && !cfg!(feature = "rocksdb") {
            return Err(ConfigError::RocksDbUnavailable);
        }
        if self.server.operator_token.is_none() && !self.server.operator_bind_addr.ip().is_loopback() {
            return Err(ConfigError::UnprotectedOperatorApi(self.server.operator_bind_addr));
        }
        Ok(())
    }

    /// In-memory configuration with sync disabled and the operator API behind
    /// `TESTING_OPERATOR_TOKEN`, for tests.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig {
                operator_token: Some(TESTING_OPERATOR_TOKEN.to_string()),
                ..Default::default()
            },
            sync: SyncSettings {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

fn require_file(path: &Path) -> Result<(), ConfigError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ConfigError::MissingFile(path.to_path_buf()))
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `sync.batch_size` is zero.
    #[error("Sync batch size must be greater than zero")]
    InvalidBatchSize,

    /// `sync.interval_secs` is zero.
    #[error("Sync interval must be greater than zero")]
    InvalidInterval,

    /// Only one half of the TLS client identity is configured.
    #[error("TLS certificate and private key must be configured together")]
    IncompleteTlsIdentity,

    /// A configured file does not exist.
    #[error("Configured file does not exist: {0}")]
    MissingFile(PathBuf),

    /// An environment variable holds an unparseable value.
    #[error("Invalid value for {variable}: {value:?}")]
    InvalidValue {
        /// Variable name.
        variable: &'static str,
        /// Value found.
        value: String,
    },

    /// `FG_USE_ROCKSDB` is set but the binary was built without RocksDB.
    #[error("RocksDB storage requested but the `rocksdb` feature is not enabled")]
    RocksDbUnavailable,

    /// The operator listener is not loopback and no token guards it.
    #[error("Operator API on {0} requires FG_OPERATOR_TOKEN")]
    UnprotectedOperatorApi(SocketAddr),
}

/// HTTP server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Listening address of the record API served to partners.
    pub bind_addr: SocketAddr,
    /// Listening address of the forward and admin APIs.
    pub operator_bind_addr: SocketAddr,
    /// Token operator callers present as `Authorization: Bearer` or
    /// `X-API-Key`. Without one only loopback callers are let in.
    pub operator_token: Option<String>,
    /// Require a valid HTTP signature on record API requests.
    pub enforce_auth: bool,
    /// Largest number of ids accepted by one get request.
    pub max_ids: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            operator_bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8081)),
            operator_token: None,
            enforce_auth: false,
            max_ids: 50,
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("operator_bind_addr", &self.operator_bind_addr)
            .field("operator_token", &self.operator_token.as_ref().map(|_| "<redacted>"))
            .field("enforce_auth", &self.enforce_auth)
            .field("max_ids", &self.max_ids)
            .finish()
    }
}

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Data directory.
    pub data_dir: PathBuf,
    /// Keep logs and mappings in RocksDB instead of memory.
    pub use_rocksdb: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            use_rocksdb: false,
        }
    }
}

/// Mapping synchronizer configuration.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Run the synchronizer on a schedule.
    pub enabled: bool,
    /// Seconds between runs.
    pub interval_secs: u64,
    /// Ids per fetch call.
    pub batch_size: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        let defaults = SyncConfig::default();
        Self {
            enabled: true,
            interval_secs: defaults.interval.as_secs(),
            batch_size: defaults.batch_size,
        }
    }
}

impl SyncSettings {
    /// Synchronizer configuration over the default capabilities.
    pub fn to_sync_config(&self) -> SyncConfig {
        SyncConfig {
            batch_size: self.batch_size,
            interval: Duration::from_secs(self.interval_secs),
            ..SyncConfig::default()
        }
    }
}

/// Outbound request engine configuration.
#[derive(Debug, Clone)]
pub struct OutboundConfig {
    /// Per-request timeout in seconds, also used for remote backends.
    pub timeout_secs: u64,
    /// TLS client certificate (PEM).
    pub tls_certificate: Option<PathBuf>,
    /// TLS private key (PEM).
    pub tls_private_key: Option<PathBuf>,
    /// HTTP signature seed (base64).
    pub signing_key: Option<PathBuf>,
    /// Institution whose monitoring API receives reports about invalid
    /// partner answers. Reporting is off without one.
    pub monitoring_institution: Option<String>,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            tls_certificate: None,
            tls_private_key: None,
            signing_key: None,
            monitoring_institution: None,
        }
    }
}

impl OutboundConfig {
    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Federation registry configuration.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// JSON registry document. Without one the registry is empty.
    pub path: Option<PathBuf>,
}

/// Backend plugin configuration.
#[derive(Debug, Clone, Default)]
pub struct PluginsConfig {
    /// JSON backend manifest. Without one no backend is registered.
    pub manifest: Option<PathBuf>,
}

/// Load configuration from the process environment.
pub fn load_config() -> Result<GatewayConfig, ConfigError> {
    load_config_from(|name| std::env::var(name).ok())
}

/// Load configuration from an arbitrary variable lookup.
pub fn load_config_from(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<GatewayConfig, ConfigError> {
    let mut config = GatewayConfig::default();

    if let Some(addr) = parse(&lookup, "FG_BIND_ADDR")? {
        config.server.bind_addr = addr;
    }
    if let Some(addr) = parse(&lookup, "FG_OPERATOR_BIND_ADDR")? {
        config.server.operator_bind_addr = addr;
    }
    config.server.operator_token = non_empty(lookup("FG_OPERATOR_TOKEN"));
    if let Some(enforce) = parse_bool(&lookup, "FG_ENFORCE_AUTH")? {
        config.server.enforce_auth = enforce;
    }
    if let Some(max) = parse(&lookup, "FG_MAX_IDS")? {
        config.server.max_ids = max;
    }

    if let Some(dir) = lookup("FG_DATA_DIR") {
        config.storage.data_dir = PathBuf::from(dir);
    }
    if let Some(use_rocksdb) = parse_bool(&lookup, "FG_USE_ROCKSDB")? {
        config.storage.use_rocksdb = use_rocksdb;
    }

    if let Some(enabled) = parse_bool(&lookup, "FG_SYNC_ENABLED")? {
        config.sync.enabled = enabled;
    }
    if let Some(secs) = parse(&lookup, "FG_SYNC_INTERVAL_SECS")? {
        config.sync.interval_secs = secs;
    }
    if let Some(size) = parse(&lookup, "FG_SYNC_BATCH_SIZE")? {
        config.sync.batch_size = size;
    }

    if let Some(secs) = parse(&lookup, "FG_OUTBOUND_TIMEOUT_SECS")? {
        config.outbound.timeout_secs = secs;
    }
    config.outbound.tls_certificate = lookup("FG_TLS_CERTIFICATE").map(PathBuf::from);
    config.outbound.tls_private_key = lookup("FG_TLS_PRIVATE_KEY").map(PathBuf::from);
    config.outbound.signing_key = lookup("FG_SIGNING_KEY").map(PathBuf::from);
    config.outbound.monitoring_institution = non_empty(lookup("FG_MONITORING_HEI_ID"));

    config.registry.path = lookup("FG_REGISTRY_PATH").map(PathBuf::from);
    config.plugins.manifest = lookup("FG_PLUGINS_PATH").map(PathBuf::from);

    Ok(config)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    variable: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(variable)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { variable, value })
        })
        .transpose()
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    variable: &'static str,
) -> Result<Option<bool>, ConfigError> {
    lookup(variable)
        .map(|value| match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidValue { variable, value }),
        })
        .transpose()
}
