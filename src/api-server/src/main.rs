//! Shelf API server
//!
//! # Usage
//!
//! ```bash
//! # Built-in policy, empty store, 0.0.0.0:8080
//! cargo run --bin shelf-server
//!
//! # Custom policy and seeded fixtures
//! cargo run --bin shelf-server -- --policy policy.json --fixtures fixtures.json
//!
//! # Debug logging for the authorization engine only
//! RUST_LOG=shelf_authz=debug cargo run --bin shelf-server
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Log filter (default: info)
//! - `SHELF_HOST`: Server host (default: 0.0.0.0)
//! - `SHELF_PORT`: Server port (default: 8080)
//! - `SHELF_POLICY`: Path to a JSON policy definition
//! - `SHELF_FIXTURES`: Path to a JSON fixtures file
//! - `SHELF_LOOKUP_TIMEOUT_MS`: Bound on each data-layer lookup (default: 5000)
//! - `SHELF_JSON_LOGS`: Emit JSON logs

use anyhow::{Context, Result};
use api_server::{fixtures::Fixtures, repository::InMemoryStore, server::ServerBuilder, AppState};
use clap::Parser;
use shelf_authz::{Checker, PolicyDefinition};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Shelf API server
#[derive(Parser, Debug)]
#[command(
    name = "shelf-server",
    version,
    about = "REST API server guarded by the Shelf authorization policy",
    long_about = None
)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "SHELF_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short = 'p', long, default_value = "8080", env = "SHELF_PORT")]
    port: u16,

    /// JSON policy definition; the built-in policy when omitted
    #[arg(long, env = "SHELF_POLICY")]
    policy: Option<PathBuf>,

    /// JSON fixtures seeding members, files and credentials
    #[arg(long, env = "SHELF_FIXTURES")]
    fixtures: Option<PathBuf>,

    /// Bound on each membership/resource lookup, in milliseconds
    #[arg(long, default_value = "5000", env = "SHELF_LOOKUP_TIMEOUT_MS")]
    lookup_timeout_ms: u64,

    /// Enable JSON logging format
    #[arg(long, env = "SHELF_JSON_LOGS")]
    json_logs: bool,

    /// Log filter (trace, debug, info, warn, error or a full directive)
    #[arg(short = 'l', long, default_value = "info", env = "RUST_LOG")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args)?;

    info!("Starting Shelf API server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let policy = load_policy(&args)?;
    let checker = Arc::new(Checker::new(policy).context("Invalid authorization policy")?);

    let store = Arc::new(InMemoryStore::new());
    if let Some(path) = &args.fixtures {
        Fixtures::load(path)?
            .seed(&store, &checker)
            .with_context(|| format!("Invalid fixtures in {}", path.display()))?;
    }

    let state = AppState::in_memory(checker, store)
        .with_lookup_timeout(Duration::from_millis(args.lookup_timeout_ms));

    let server = ServerBuilder::new()
        .host(&args.host)
        .port(args.port)
        .state(Arc::new(state))
        .build()?;

    info!("Press Ctrl+C to shutdown gracefully");

    if let Err(e) = server.run().await {
        error!("Server error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn load_policy(args: &Args) -> Result<PolicyDefinition> {
    match &args.policy {
        Some(path) => {
            info!(path = %path.display(), "Loading policy");
            PolicyDefinition::load(path)
                .with_context(|| format!("Failed to load policy from {}", path.display()))
        }
        None => {
            info!("Using built-in policy");
            Ok(PolicyDefinition::builtin())
        }
    }
}

/// Initialize tracing/logging subsystem
fn init_tracing(args: &Args) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_new(&args.log_level)
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))
        .context("Invalid log filter")?;

    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("Failed to initialize logging")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
            .context("Failed to initialize logging")?;
    }

    Ok(())
}
