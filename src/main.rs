//! addons-inject
//!
//! An edge server that sits in front of a documentation origin and rewrites
//! its responses so every page loads Read the Docs addons.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http server ──▶ hyper client ──▶ documentation origin
//!                                                        │
//!     Client ◀── transform ◀─────────────────────────────┘
//!                  │
//!                  ├─ policy     (decide from path and X-RTD-* headers)
//!                  ├─ rewriter   (streaming HTML: remove legacy, inject)
//!                  ├─ patch      (searchtools.js text patch)
//!                  └─ assembler  (fallback to the original on any error)
//!
//!     Cross-cutting: config (hot reload), observability, lifecycle
//! ```

use std::path::PathBuf;

use clap::Parser;

use addons_inject::config::schema::EdgeConfig;
use addons_inject::lifecycle::startup;
use addons_inject::observability::logging;
use addons_inject::transform::validate_rule_table;

#[derive(Parser, Debug)]
#[command(name = "addons-inject", version, about = "Read the Docs addons edge transformer")]
struct Args {
    /// Configuration file (TOML, or JSON with a .json extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address
    #[arg(long)]
    bind: Option<String>,

    /// Validate configuration and rewrite rules, then exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config: EdgeConfig = startup::resolve_config(args.config.as_deref(), args.bind.as_deref())?;
    logging::init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "addons-inject starting");

    if args.validate {
        let rules = validate_rule_table()?;
        tracing::info!(rules, "Configuration is valid");
        return Ok(());
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        origin = %config.origin.url,
        transform_enabled = config.transform.enabled,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    startup::run(config, args.config.as_deref()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
