//! # Federation Gateway
//!
//! Entry point of the gateway process.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logging + metrics registry)
//! 2. Load and validate configuration from the environment
//! 3. Build the container (storage → subsystems → decorators)
//! 4. Serve the public API, the operator API and the metrics port
//! 5. Start the mapping synchronizer, when enabled
//! 6. Wait for Ctrl+C, then shut everything down
//!
//! ## Tasks
//!
//! ```text
//!             ┌── public server (/rest, /health)
//!             ├── operator server (/forward, /admin, /health), token or loopback
//! shutdown ───┼── metrics server (/metrics)
//!  (watch)    └── sync scheduler (interval, single-flight)
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use gateway_runtime::{load_config, metrics_router, operator_router, router, GatewayContainer};
use gateway_telemetry::{init_telemetry, TelemetryConfig};

/// The gateway process: container plus its background tasks.
struct GatewayRuntime {
    /// All initialized services.
    container: Arc<GatewayContainer>,
    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,
    /// Shutdown signal receiver.
    shutdown_rx: watch::Receiver<bool>,
    /// Spawned tasks, joined on shutdown.
    tasks: Vec<JoinHandle<()>>,
}

impl GatewayRuntime {
    fn new(container: GatewayContainer) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            container: Arc::new(container),
            shutdown_tx,
            shutdown_rx,
            tasks: Vec::new(),
        }
    }

    /// Bind the listeners and spawn every task.
    async fn start(&mut self, metrics_port: u16) -> Result<()> {
        let container = Arc::clone(&self.container);
        let config = &container.config;
        info!("===========================================");
        info!("  Federation Gateway v{}", gateway_runtime::VERSION);
        info!("===========================================");

        let listener = TcpListener::bind(config.server.bind_addr)
            .await
            .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
        info!(addr = %config.server.bind_addr, "Public server listening");
        self.spawn_server("public", listener, router(container.clone()));

        let operator_addr = config.server.operator_bind_addr;
        let operator_listener = TcpListener::bind(operator_addr)
            .await
            .with_context(|| format!("Failed to bind operator address {operator_addr}"))?;
        info!(
            addr = %operator_addr,
            token = config.server.operator_token.is_some(),
            "Operator server listening"
        );
        self.spawn_server("operator", operator_listener, operator_router(container.clone()));

        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], metrics_port));
        let metrics_listener = TcpListener::bind(metrics_addr)
            .await
            .with_context(|| format!("Failed to bind metrics port {metrics_port}"))?;
        info!(addr = %metrics_addr, "Metrics server listening");
        self.spawn_server("metrics", metrics_listener, metrics_router());

        if config.sync.enabled {
            let scheduler = container.scheduler.clone();
            let shutdown = self.shutdown_rx.clone();
            self.tasks
                .push(tokio::spawn(async move { scheduler.run(shutdown).await }));
        } else {
            info!("Mapping synchronizer disabled");
        }

        info!(
            enforce_auth = config.server.enforce_auth,
            data_dir = %config.storage.data_dir.display(),
            "Gateway ready"
        );
        Ok(())
    }

    fn spawn_server(&mut self, name: &'static str, listener: TcpListener, app: axum::Router) {
        let mut shutdown = self.shutdown_rx.clone();
        self.tasks.push(tokio::spawn(async move {
            let service = app.into_make_service_with_connect_info::<SocketAddr>();
            let result = axum::serve(listener, service)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.changed().await;
                })
                .await;
            if let Err(e) = result {
                error!(server = name, error = %e, "Server error");
            }
        }));
    }

    /// Signal every task and wait for them to finish.
    async fn shutdown(self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Task ended abnormally");
            }
        }
        info!("Shutdown complete");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = init_telemetry(TelemetryConfig::from_env())
        .context("Failed to initialize telemetry")?;

    let config = load_config().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let container = GatewayContainer::build(config).context("Failed to build gateway")?;
    let mut runtime = GatewayRuntime::new(container);
    runtime.start(telemetry.config().metrics_port).await?;

    info!("Gateway is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    runtime.shutdown().await;
    Ok(())
}
