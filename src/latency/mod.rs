//! Inter-Venue Latency Estimation Engine
//!
//! Estimates latency between trading venues for visualization:
//! - Uptime monitor telemetry, cached per venue for a fixed window
//! - Distance-based simulation when telemetry is absent or failing
//! - Bounded rolling history per venue pair with windowed queries
//!
//! ## Usage
//!
//! ```rust,ignore
//! use venue_latency_backend::latency::{LatencyConfig, LatencyEngine};
//! use venue_latency_backend::venues::default_venues;
//!
//! let engine = LatencyEngine::new(LatencyConfig::from_env()?, default_venues())?;
//! let snapshot = engine.generate_snapshot().await;
//! let last_day = engine.query_history("binance", "okx", "24h")?;
//! ```

pub mod backfill;
pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod estimator;
pub mod geo;
pub mod history;
pub mod matcher;
pub mod snapshot;
pub mod telemetry;

pub use cache::*;
pub use config::*;
pub use diagnostics::*;
pub use engine::*;
pub use estimator::*;
pub use geo::*;
pub use history::*;
pub use matcher::*;
pub use snapshot::*;
pub use telemetry::*;
