//! # Service Container
//!
//! Holds every subsystem instance and wires them through their ports.
//!
//! ## Initialization Order
//!
//! ```text
//! Level 0: Storage (log and mapping repositories)
//! Level 1: Communication Log, Identifier Mapping, Federation Registry, Key Store
//! Level 2: Dispatch Router (plugin manifest), Outbound Client
//! Level 3: Reconciler, Monitoring Reporter, Peer API Client, Mapping Synchronizer + Scheduler
//! ```
//!
//! ## Metrics
//!
//! The mapping service, the outbound engine and the synchronizer are wrapped
//! in the metered decorators before anything else sees them, so every
//! caller feeds the same counters.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use fg_01_communication_log::{CommunicationLogApi, CommunicationLogService, LogRepository};
use fg_02_identifier_mapping::{MappingApi, MappingRepository, MappingService};
use fg_03_dispatch_router::{BackendRegistry, DispatchRouter, Reconciler};
use fg_04_outbound_client::{
    HttpTransport, KeySource, MonitoringReporter, OutboundApi, OutboundClient, PeerApiClient,
    PeerRegistry, PemKeyStore, RegistryError, ReqwestTransport, StaticRegistry,
};
use fg_05_mapping_sync::{MappingSynchronizer, SyncError, SyncScheduler};
use shared_types::InstitutionId;

use crate::adapters::storage::{InMemoryLogRepository, InMemoryMappingRepository};
use crate::adapters::{MeteredMappings, MeteredOutbound, MeteredSync, PluginError, PluginManifest};
use crate::container::config::{ConfigError, GatewayConfig};

/// Failure assembling the container.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Configuration rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A configured file could not be read.
    #[error("Cannot read {path}: {message}")]
    Io {
        /// File path.
        path: String,
        /// OS error.
        message: String,
    },

    /// The federation registry document is invalid.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The plugin manifest is invalid.
    #[error(transparent)]
    Plugins(#[from] PluginError),

    /// The durable store could not be opened.
    #[error("Storage initialization failed: {0}")]
    Storage(String),

    /// The synchronizer rejected its configuration.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Central container holding all subsystem instances.
pub struct GatewayContainer {
    /// Runtime configuration (immutable after initialization).
    pub config: GatewayConfig,

    /// Communication Log (Subsystem 1).
    pub log: Arc<CommunicationLogService>,

    /// Identifier Mapping (Subsystem 2), metered.
    pub mappings: Arc<dyn MappingApi>,

    /// Dispatch Router (Subsystem 3). Shared with the synchronizer.
    pub router: Arc<DispatchRouter>,

    /// Record query entry point for the inbound API.
    pub reconciler: Arc<Reconciler>,

    /// Federation registry (Subsystem 4).
    pub registry: Arc<dyn PeerRegistry>,

    /// Local TLS identity and signing key.
    pub keys: Arc<dyn KeySource>,

    /// Outbound request engine (Subsystem 4), metered.
    pub outbound: Arc<dyn OutboundApi>,

    /// Reporter for invalid partner answers, when a monitoring institution
    /// is configured.
    pub monitoring: Option<Arc<MonitoringReporter>>,

    /// Typed client for partner record APIs. Reports through `monitoring`.
    pub peers: Arc<PeerApiClient>,

    /// Mapping synchronizer driver (Subsystem 5).
    pub scheduler: Arc<SyncScheduler>,
}

impl GatewayContainer {
    /// Build the container with the `reqwest` transport.
    pub fn build(config: GatewayConfig) -> Result<Self, ContainerError> {
        let transport = Arc::new(ReqwestTransport::new(config.outbound.timeout()));
        Self::with_transport(config, transport)
    }

    /// Build the container over an arbitrary transport.
    #[instrument(name = "container_init", skip_all)]
    pub fn with_transport(
        config: GatewayConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ContainerError> {
        config.validate()?;
        info!("Initializing federation gateway container");

        // Level 0
        let (log_repository, mapping_repository) = init_storage(&config)?;

        // Level 1
        let log = Arc::new(CommunicationLogService::with_system_clock(log_repository));
        let log_api: Arc<dyn CommunicationLogApi> = log.clone();
        let mappings: Arc<dyn MappingApi> = Arc::new(MeteredMappings::new(Arc::new(
            MappingService::new(mapping_repository),
        )));
        let registry = init_registry(&config)?;
        let keys = init_keys(&config);
        info!("  [fg-01] Communication log ready");
        info!("  [fg-02] Identifier mapping ready");

        // Level 2
        let router = Arc::new(init_router(&config)?);
        let outbound: Arc<dyn OutboundApi> = Arc::new(MeteredOutbound::new(Arc::new(
            OutboundClient::new(transport, keys.clone(), registry.clone(), log_api.clone()),
        )));
        info!("  [fg-03] Dispatch router ready");
        info!("  [fg-04] Outbound client ready");

        // Level 3
        let reconciler = Arc::new(
            Reconciler::new(router.clone(), mappings.clone()).with_log(log_api.clone()),
        );
        let monitoring = config.outbound.monitoring_institution.as_deref().map(|institution| {
            info!(%institution, "  [fg-04] Monitoring reports enabled");
            Arc::new(MonitoringReporter::new(
                outbound.clone(),
                registry.clone(),
                InstitutionId::from(institution),
            ))
        });
        let mut peers = PeerApiClient::new(outbound.clone(), registry.clone());
        if let Some(reporter) = &monitoring {
            peers = peers.with_monitoring(reporter.clone());
        }
        let peers = Arc::new(peers);
        let synchronizer = MappingSynchronizer::new(
            router.clone(),
            mappings.clone(),
            config.sync.to_sync_config(),
        )?;
        let scheduler = Arc::new(
            SyncScheduler::new(
                Arc::new(MeteredSync::new(Arc::new(synchronizer))),
                config.sync.to_sync_config().interval,
            )
            .with_log(log_api),
        );
        info!("  [fg-05] Mapping synchronizer ready");

        Ok(Self {
            config,
            log,
            mappings,
            router,
            reconciler,
            registry,
            keys,
            outbound,
            monitoring,
            peers,
            scheduler,
        })
    }

    /// In-memory container with no registry, plugins or keys.
    pub fn for_testing(transport: Arc<dyn HttpTransport>) -> Result<Self, ContainerError> {
        Self::with_transport(GatewayConfig::for_testing(), transport)
    }

    /// Re-read the plugin manifest and swap the router's registry.
    ///
    /// Returns the number of registered backends. Without a manifest the
    /// registry is emptied.
    pub fn reload_plugins(&self) -> Result<usize, PluginError> {
        let registry = match &self.config.plugins.manifest {
            Some(path) => {
                PluginManifest::from_file(path)?.into_registry(self.config.outbound.timeout())?
            }
            None => BackendRegistry::empty(),
        };
        let count = registry.registration_count();
        self.router.reload(registry);
        info!(backends = count, "[fg-03] Backend registry reloaded");
        Ok(count)
    }
}

type Repositories = (Arc<dyn LogRepository>, Arc<dyn MappingRepository>);

fn init_storage(config: &GatewayConfig) -> Result<Repositories, ContainerError> {
    if config.storage.use_rocksdb {
        return open_rocksdb(config);
    }
    warn!("Using in-memory storage; logs and mappings are lost on restart");
    Ok((
        Arc::new(InMemoryLogRepository::new()),
        Arc::new(InMemoryMappingRepository::new()),
    ))
}

#[cfg(feature = "rocksdb")]
fn open_rocksdb(config: &GatewayConfig) -> Result<Repositories, ContainerError> {
    use crate::adapters::storage::{
        RocksDbConfig, RocksDbLogRepository, RocksDbMappingRepository, RocksDbStore,
    };

    let db_config = RocksDbConfig::in_data_dir(&config.storage.data_dir);
    info!(path = %db_config.path, "Opening RocksDB storage");
    let store = Arc::new(
        RocksDbStore::open(db_config).map_err(|e| ContainerError::Storage(e.to_string()))?,
    );
    Ok((
        Arc::new(RocksDbLogRepository::new(Arc::clone(&store))),
        Arc::new(RocksDbMappingRepository::new(store)),
    ))
}

#[cfg(not(feature = "rocksdb"))]
fn open_rocksdb(_config: &GatewayConfig) -> Result<Repositories, ContainerError> {
    Err(ConfigError::RocksDbUnavailable.into())
}

fn init_registry(config: &GatewayConfig) -> Result<Arc<dyn PeerRegistry>, ContainerError> {
    let Some(path) = &config.registry.path else {
        warn!("No federation registry configured; outbound calls have no peers");
        return Ok(Arc::new(StaticRegistry::new()));
    };
    let registry = StaticRegistry::from_json(&read(path)?)?;
    info!(
        path = %path.display(),
        institutions = registry.institution_count(),
        "Federation registry loaded"
    );
    Ok(Arc::new(registry))
}

fn init_keys(config: &GatewayConfig) -> Arc<dyn KeySource> {
    let outbound = &config.outbound;
    let mut store = PemKeyStore::new();
    if let (Some(certificate), Some(private_key)) =
        (&outbound.tls_certificate, &outbound.tls_private_key)
    {
        store = store.with_tls(certificate.clone(), private_key.clone());
    }
    if let Some(signing_key) = &outbound.signing_key {
        store = store.with_signing_key(signing_key.clone());
    }
    Arc::new(store)
}

fn init_router(config: &GatewayConfig) -> Result<DispatchRouter, ContainerError> {
    let Some(path) = &config.plugins.manifest else {
        warn!("No plugin manifest configured; no backend is registered");
        return Ok(DispatchRouter::empty());
    };
    let registry = PluginManifest::from_file(path)?.into_registry(config.outbound.timeout())?;
    Ok(DispatchRouter::new(registry))
}

fn read(path: &Path) -> Result<String, ContainerError> {
    std::fs::read_to_string(path).map_err(|e| ContainerError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
