//! Faultline engine binary.
//!
//! Wires configuration, logging, metrics, the cache provider, the upstream
//! clients, the rule pack and the investigation pipeline, then serves the
//! HTTP surface until an interrupt or terminate signal arrives.

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use faultline_api::{create_router, AppState};
use faultline_core::cache::{CacheProvider, NoopCache, ValkeyCache};
use faultline_core::config::Config;
use faultline_core::metrics::{INVESTIGATION_BUCKETS, INVESTIGATION_SECONDS};
use faultline_detection::{Pipeline, RuleEngine};
use faultline_signals::{AggregatorClient, AggregatorClientConfig};
use faultline_storage::{HistoryStore, VectorStore, VectorStoreConfig};

/// Faultline CLI arguments.
#[derive(Debug, Parser)]
#[command(name = "faultline", version, about = "Root-cause analysis engine")]
struct Cli {
    /// Configuration file path (falls back to FAULTLINE_CONFIG, then defaults).
    #[arg(short, long, default_value = "")]
    config: String,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Force JSON logging regardless of configuration.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config).context("failed to load configuration")?;
    init_logging(&cli, &config)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        address = %config.server.address,
        "starting faultline"
    );

    init_metrics(&config).context("failed to install metrics exporter")?;

    let cache = build_cache(&config).await;

    let signals = Arc::new(
        AggregatorClient::with_cache(
            AggregatorClientConfig {
                base_url: config.aggregator.base_url.clone(),
                metrics_path: config.aggregator.metrics_path.clone(),
                logs_path: config.aggregator.logs_path.clone(),
                traces_path: config.aggregator.traces_path.clone(),
                service_graph_path: config.aggregator.service_graph_path.clone(),
                timeout: config.aggregator.timeout(),
                service_graph_ttl: config.cache.service_graph_ttl(),
            },
            Arc::clone(&cache),
        )
        .context("failed to build aggregator client")?,
    );

    let store: Option<Arc<dyn HistoryStore>> = if config.store.endpoint.is_empty() {
        info!("history store endpoint not configured, history surfaces disabled");
        None
    } else {
        Some(Arc::new(
            VectorStore::with_cache(
                VectorStoreConfig {
                    endpoint: config.store.endpoint.clone(),
                    api_key: config.store.api_key.clone(),
                    timeout: config.store.timeout(),
                    similar_ttl: config.cache.similar_incidents_ttl(),
                    patterns_ttl: config.cache.patterns_ttl(),
                },
                Arc::clone(&cache),
            )
            .context("failed to build history store")?,
        ))
    };

    let rules = RuleEngine::load(&config.rules.path).context("failed to load rule pack")?;

    let pipeline = Arc::new(Pipeline::new(signals, store.clone(), rules));
    let state = AppState::new(Some(pipeline), store);
    let router = create_router(state, config.server.request_timeout());

    let address = listen_addr(&config.server.address)
        .with_context(|| format!("invalid server address {}", config.server.address))?;
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(%address, "faultline listening");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        let _ = shutdown_rx.await;
    });
    let mut server_task = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut server_task => {
            result.context("server task panicked")??;
            anyhow::bail!("server exited unexpectedly");
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(());
    match tokio::time::timeout(config.server.graceful_timeout(), &mut server_task).await {
        Ok(result) => result.context("server task panicked")??,
        Err(_) => {
            warn!("graceful shutdown timed out, aborting in-flight requests");
            server_task.abort();
        }
    }

    info!("faultline stopped");
    Ok(())
}

fn init_logging(cli: &Cli, config: &Config) -> Result<()> {
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&level))
        .context("invalid log level")?;

    if cli.log_json || config.logging.json {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .with(filter)
            .init();
    }
    Ok(())
}

fn init_metrics(config: &Config) -> Result<()> {
    faultline_core::metrics::describe();
    let address = listen_addr(&config.server.metrics_address)
        .with_context(|| format!("invalid metrics address {}", config.server.metrics_address))?;
    PrometheusBuilder::new()
        .with_http_listener(address)
        .set_buckets_for_metric(
            Matcher::Full(INVESTIGATION_SECONDS.to_string()),
            INVESTIGATION_BUCKETS,
        )?
        .install()?;
    info!(%address, "metrics exporter listening");
    Ok(())
}

/// Builds the shared cache provider. An unreachable cache at startup
/// degrades to the no-op provider with a warning.
async fn build_cache(config: &Config) -> Arc<dyn CacheProvider> {
    if !config.cache.enabled || config.cache.addr.is_empty() {
        return Arc::new(NoopCache);
    }
    match ValkeyCache::connect(config.cache.valkey()).await {
        Ok(provider) => {
            info!(addr = %config.cache.addr, "valkey cache connected");
            Arc::new(provider)
        }
        Err(err) => {
            warn!(error = %err, "valkey cache unavailable, continuing without cache");
            Arc::new(NoopCache)
        }
    }
}

/// Accepts `:port` shorthand as well as full `host:port` addresses.
fn listen_addr(addr: &str) -> Result<SocketAddr> {
    let addr = if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    };
    Ok(addr.parse()?)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install interrupt handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install terminate handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
