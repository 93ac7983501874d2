//! Venue Latency Service
//!
//! Serves pairwise latency estimates between trading venues plus their
//! rolling history. Snapshots are generated on a fixed interval in the
//! background and on demand over HTTP.
//!
//! Usage:
//!   venue-latency --config latency.toml --port 3000 --seed
//!
//! Environment Variables:
//!   UPTIME_ROBOT_API_KEY - Monitor telemetry key (absent => simulated mode)
//!   LATENCY_CONFIG_PATH - Path to TOML config file
//!   RUST_LOG - Log filter (default: venue_latency_backend=info,tower_http=info)

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::middleware;
use chrono::Utc;
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use venue_latency_backend::{
    api::create_router,
    latency::{LatencyConfig, LatencyEngine, SnapshotMode},
    middleware::request_logging,
    venues::default_venues,
};

#[derive(Parser, Debug)]
#[command(name = "venue-latency")]
#[command(about = "Inter-venue latency estimation and history service")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "LATENCY_CONFIG_PATH")]
    config: Option<String>,

    /// HTTP listen port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Seed 30 days of simulated history at startup
    #[arg(long)]
    seed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let config = load_config(&args)?;
    let port = args.port.unwrap_or(config.port);
    let seed = args.seed || config.seed_history;

    let venues = default_venues();
    info!(
        venues = venues.len(),
        telemetry = config.telemetry.is_configured(),
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "Starting venue latency service"
    );

    let engine = LatencyEngine::new(config, venues).context("Failed to build latency engine")?;
    let engine = Arc::new(engine);
    if engine.mode() == SnapshotMode::Simulated {
        warn!("UPTIME_ROBOT_API_KEY not configured - serving simulated latency");
    }

    if seed {
        engine.seed_history_at(Utc::now().timestamp_millis());
    }

    let poller = tokio::spawn(engine.clone().run_polling());

    let app = create_router(engine)
        .layer(middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("API server listening on {}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    poller.abort();
    info!("Venue latency service stopped");
    Ok(())
}

fn load_config(args: &Args) -> Result<LatencyConfig> {
    match &args.config {
        Some(path) => {
            dotenv::dotenv().ok();
            let mut config = LatencyConfig::from_toml_file(path)?;
            config.apply_env();
            config.validate()?;
            info!("Loaded configuration from {}", path);
            Ok(config)
        }
        None => LatencyConfig::from_env(),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "venue_latency_backend=info,venue_latency=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
