//! VoyagerSD registry server binary.
//!
//! Parses configuration from CLI flags / `VOYAGER_`-prefixed environment
//! variables, selects in-memory or etcd-backed mode, and serves the
//! discovery wire protocol plus a `/health` + `/metrics` HTTP surface until
//! a `SIGINT`/`SIGTERM` triggers graceful shutdown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use voyager_server::config::{LogFormat, ServerConfig};
use voyager_server::kv::{EtcdKvStore, KvStore, NullKvStore};
use voyager_server::metrics::{InstanceCountTicker, MetricsSurface, StatusLogger};
use voyager_server::network::{NetworkModule, ShutdownController, WireServer};
use voyager_server::registry::janitor::Janitor;
use voyager_server::registry::refresher::CacheRefresher;
use voyager_server::RegistryCore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let start_time = Instant::now();
    let config = ServerConfig::parse();
    init_tracing(&config);

    let store = build_store(&config).await;
    let registry = Arc::new(RegistryCore::new(store, config.cache_ttl));

    if !registry.in_memory_mode() {
        if let Err(err) = registry.bulk_load().await {
            warn!(%err, "initial bulk load failed, starting with an empty registry");
        }
    }

    let metrics = Arc::new(MetricsSurface::install());
    let shutdown = Arc::new(ShutdownController::new());

    if registry.in_memory_mode() {
        let janitor = Janitor::new(Arc::clone(&registry));
        tokio::spawn(janitor.run(shutdown.shutdown_receiver()));
    } else {
        let refresher = CacheRefresher::new(Arc::clone(&registry));
        tokio::spawn(refresher.run(shutdown.shutdown_receiver()));
    }

    let ticker = InstanceCountTicker::new(Arc::clone(&registry), config.cache_ttl / 2);
    tokio::spawn(ticker.run(shutdown.shutdown_receiver()));

    let status_logger = StatusLogger::new(Arc::clone(&registry), start_time, config.log_interval);
    tokio::spawn(status_logger.run(shutdown.shutdown_receiver()));

    let mut wire_server = WireServer::new(
        config.grpc_addr.clone(),
        Arc::clone(&registry),
        config.auth_token.clone(),
    );
    wire_server.start().await?;
    tokio::spawn(wire_server.serve(shutdown.shutdown_receiver()));

    let mut http_module = NetworkModule::new(
        voyager_server::network::NetworkConfig {
            host: host_of(&config.metrics_addr),
            port: port_of(&config.metrics_addr),
            ..Default::default()
        },
        Arc::clone(&registry),
        Arc::clone(&metrics),
        Arc::clone(&shutdown),
    );
    http_module.start().await?;
    let http_handle = tokio::spawn(http_module.serve(shutdown.shutdown_receiver()));

    shutdown.set_ready();
    info!("voyager-server ready");

    wait_for_termination().await;
    info!("shutdown signal received, draining");
    shutdown.trigger_shutdown();

    if !shutdown.wait_for_drain(Duration::from_secs(30)).await {
        warn!("drain timeout expired with in-flight requests remaining");
    }

    if let Ok(Err(err)) = http_handle.await {
        error!(%err, "health/metrics server exited with an error");
    }

    Ok(())
}

async fn build_store(config: &ServerConfig) -> Arc<dyn KvStore> {
    if config.in_memory_mode() {
        return Arc::new(NullKvStore);
    }

    match EtcdKvStore::connect(&config.etcd_endpoints).await {
        Ok(store) => Arc::new(store),
        Err(err) => {
            warn!(%err, "failed to connect to etcd, falling back to in-memory mode");
            Arc::new(NullKvStore)
        }
    }
}

fn init_tracing(config: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if config.debug { "debug" } else { "info" })
    });

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}

fn host_of(addr: &str) -> String {
    addr.rsplit_once(':')
        .map(|(host, _)| host.to_string())
        .unwrap_or_else(|| addr.to_string())
}

fn port_of(addr: &str) -> u16 {
    addr.rsplit_once(':')
        .and_then(|(_, port)| port.parse().ok())
        .unwrap_or(0)
}

async fn wait_for_termination() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
