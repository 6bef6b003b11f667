//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize subsystems in dependency order
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The rewrite rule table is compiled once before traffic is accepted
//! - Listeners start last (traffic only when ready)

use std::net::{AddrParseError, SocketAddr};
use std::path::Path;

use metrics_exporter_prometheus::BuildError;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::validation::validate_config;
use crate::config::{load_config, ConfigError, ConfigWatcher, EdgeConfig};
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::transform::{validate_rule_table, TransformError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("rewrite rule table is invalid: {0}")]
    Rules(#[from] TransformError),

    #[error("invalid metrics address: {0}")]
    MetricsAddress(#[from] AddrParseError),

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] BuildError),

    #[error("failed to watch configuration: {0}")]
    Watch(#[from] notify::Error),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// Resolve the effective configuration: file (or defaults) plus the bind override.
pub fn resolve_config(
    path: Option<&Path>,
    bind_override: Option<&str>,
) -> Result<EdgeConfig, StartupError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => EdgeConfig::default(),
    };

    if let Some(bind) = bind_override {
        config.listener.bind_address = bind.to_string();
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    Ok(config)
}

/// Run the edge server until SIGINT or SIGTERM.
///
/// Logging must already be initialized. When `config_path` is given the file
/// is watched and valid changes are applied live.
pub async fn run(config: EdgeConfig, config_path: Option<&Path>) -> Result<(), StartupError> {
    let rules = validate_rule_table()?;
    tracing::info!(rules, "Rewrite rule table compiled");

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;
    if let Ok(local_addr) = listener.local_addr() {
        tracing::info!(address = %local_addr, "Listening for connections");
    }

    // The watcher must outlive the server; dropping it stops notifications.
    let (_watcher, config_updates) = match config_path {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path).spawn()?;
            (Some(watcher), rx)
        }
        None => {
            let (_tx, rx) = mpsc::unbounded_channel();
            (None, rx)
        }
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_termination().await;
        shutdown.trigger();
    });

    HttpServer::new(config)
        .run(listener, config_updates, server_shutdown)
        .await
        .map_err(StartupError::Serve)
}
