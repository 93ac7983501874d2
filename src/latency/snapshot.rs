//! Snapshot Generator
//!
//! Produces one consistent set of pairwise latency links per call and
//! appends each link to the historical store.
//!
//! Two modes:
//! - `Live`: per-venue telemetry latencies (through the monitor cache) are
//!   blended with distance by the estimator.
//! - `Simulated`: a per-pair base latency precomputed from distance.
//!
//! Any error while building a live snapshot degrades the generator to
//! `Simulated` and the failed call is answered with a full simulated
//! snapshot. The degrade is permanent unless a retry interval is configured.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::cache::MonitorCache;
use super::config::{JitterConfig, LatencyConfig, LatencyThresholds};
use super::diagnostics::{DiagnosticEvent, LatencyDiagnostics};
use super::estimator::{apply_jitter, estimate, simulated_base_latency, RandomSource};
use super::geo::venue_distance_km;
use super::history::{HistoricalStore, PairKey};
use crate::models::{LatencyLink, Venue};

/// Shared random source
pub type SharedRandom = Arc<Mutex<Box<dyn RandomSource>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotMode {
    Live,
    Simulated,
}

/// Failure while building a live snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveSnapshotError {
    /// Per-venue lookups did not all finish before the deadline
    BatchTimeout(Duration),
}

impl std::fmt::Display for LiveSnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BatchTimeout(d) => {
                write!(f, "venue latency batch exceeded {}ms deadline", d.as_millis())
            }
        }
    }
}

impl std::error::Error for LiveSnapshotError {}

/// A venue pair eligible for links, fixed at startup
#[derive(Debug, Clone)]
pub struct VenuePair {
    a: usize,
    b: usize,
    pub key: PairKey,
    pub distance_km: f64,
    /// Distance-only latency used in simulated mode
    pub base_latency: u32,
}

/// All links of one tick
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub timestamp: i64,
    pub mode: SnapshotMode,
    pub links: Vec<LatencyLink>,
}

impl Snapshot {
    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary::from_links(&self.links)
    }
}

/// Aggregate over one snapshot's links
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotSummary {
    pub count: usize,
    pub avg: u32,
    pub min: u32,
    pub max: u32,
}

impl SnapshotSummary {
    pub fn from_links(links: &[LatencyLink]) -> Self {
        if links.is_empty() {
            return Self::default();
        }
        let sum: u64 = links.iter().map(|l| l.latency as u64).sum();
        Self {
            count: links.len(),
            avg: (sum as f64 / links.len() as f64).round() as u32,
            min: links.iter().map(|l| l.latency).min().unwrap_or(0),
            max: links.iter().map(|l| l.latency).max().unwrap_or(0),
        }
    }
}

#[derive(Debug)]
struct ModeState {
    mode: SnapshotMode,
    /// When the generator last fell back from live mode
    degraded_at: Option<i64>,
}

pub struct SnapshotGenerator {
    venues: Vec<Venue>,
    pairs: Vec<VenuePair>,
    cache: Arc<MonitorCache>,
    history: Arc<HistoricalStore>,
    diagnostics: Arc<LatencyDiagnostics>,
    rng: SharedRandom,
    thresholds: LatencyThresholds,
    jitter: JitterConfig,
    snapshot_timeout: Duration,
    live_retry_interval: Option<Duration>,
    state: RwLock<ModeState>,
}

impl SnapshotGenerator {
    pub fn new(
        venues: Vec<Venue>,
        config: &LatencyConfig,
        cache: Arc<MonitorCache>,
        history: Arc<HistoricalStore>,
        diagnostics: Arc<LatencyDiagnostics>,
        rng: SharedRandom,
    ) -> Self {
        let pairs = build_pairs(&venues);
        let mode = if cache.telemetry_configured() {
            SnapshotMode::Live
        } else {
            SnapshotMode::Simulated
        };
        info!(
            venues = venues.len(),
            pairs = pairs.len(),
            mode = ?mode,
            "Snapshot generator initialized"
        );

        Self {
            venues,
            pairs,
            cache,
            history,
            diagnostics,
            rng,
            thresholds: config.thresholds.clone(),
            jitter: config.jitter.clone(),
            snapshot_timeout: config.snapshot_timeout,
            live_retry_interval: config.live_retry_interval,
            state: RwLock::new(ModeState {
                mode,
                degraded_at: None,
            }),
        }
    }

    pub fn mode(&self) -> SnapshotMode {
        self.state.read().mode
    }

    pub fn venues(&self) -> &[Venue] {
        &self.venues
    }

    /// Precomputed simulated-mode base latency for a pair
    pub fn base_latency(&self, a: &str, b: &str) -> Option<u32> {
        let key = PairKey::new(a, b);
        self.pairs.iter().find(|p| p.key == key).map(|p| p.base_latency)
    }

    /// Generate the snapshot for `now_ms`
    pub async fn generate(&self, now_ms: i64) -> Snapshot {
        let mode = self.effective_mode(now_ms);

        let (mode, links) = match mode {
            SnapshotMode::Live => match self.build_live(now_ms).await {
                Ok(links) => (SnapshotMode::Live, links),
                Err(e) => {
                    warn!("Failed to generate live latency data, falling back to simulated: {}", e);
                    self.degrade(now_ms, &e.to_string());
                    (SnapshotMode::Simulated, self.build_simulated(now_ms))
                }
            },
            SnapshotMode::Simulated => (SnapshotMode::Simulated, self.build_simulated(now_ms)),
        };

        self.history
            .append_batch(self.pairs.iter().zip(links.iter()).map(|(p, l)| (&p.key, l.sample())));

        self.diagnostics.record(DiagnosticEvent::SnapshotGenerated {
            mode,
            links: links.len(),
        });

        Snapshot {
            timestamp: now_ms,
            mode,
            links,
        }
    }

    /// Current mode, promoting back to live when the retry interval has passed
    fn effective_mode(&self, now_ms: i64) -> SnapshotMode {
        let mut state = self.state.write();
        if state.mode == SnapshotMode::Live {
            return SnapshotMode::Live;
        }

        let (Some(retry), Some(degraded_at)) = (self.live_retry_interval, state.degraded_at) else {
            return SnapshotMode::Simulated;
        };

        if self.cache.telemetry_configured() && now_ms - degraded_at >= retry.as_millis() as i64 {
            state.mode = SnapshotMode::Live;
            state.degraded_at = None;
            drop(state);

            self.diagnostics.record(DiagnosticEvent::ModeChanged {
                from: SnapshotMode::Simulated,
                to: SnapshotMode::Live,
                reason: "retry interval elapsed".to_string(),
            });
            return SnapshotMode::Live;
        }

        SnapshotMode::Simulated
    }

    fn degrade(&self, now_ms: i64, reason: &str) {
        {
            let mut state = self.state.write();
            if state.mode == SnapshotMode::Simulated {
                return;
            }
            state.mode = SnapshotMode::Simulated;
            state.degraded_at = Some(now_ms);
        }

        self.diagnostics.record(DiagnosticEvent::ModeChanged {
            from: SnapshotMode::Live,
            to: SnapshotMode::Simulated,
            reason: reason.to_string(),
        });
    }

    /// Live links, or an error before anything is recorded
    async fn build_live(&self, now_ms: i64) -> Result<Vec<LatencyLink>, LiveSnapshotError> {
        let lookups = join_all(
            self.venues
                .iter()
                .map(|v| self.cache.get_latency(&v.id, &v.name, now_ms)),
        );

        let latencies = tokio::time::timeout(self.snapshot_timeout, lookups)
            .await
            .map_err(|_| LiveSnapshotError::BatchTimeout(self.snapshot_timeout))?;

        let mut rng = self.rng.lock();
        let links = self
            .pairs
            .iter()
            .map(|pair| {
                let base = estimate(
                    latencies[pair.a],
                    latencies[pair.b],
                    pair.distance_km,
                    rng.as_mut(),
                );
                self.link(pair, apply_jitter(base, &self.jitter, rng.as_mut()), now_ms)
            })
            .collect();

        Ok(links)
    }

    fn build_simulated(&self, now_ms: i64) -> Vec<LatencyLink> {
        let mut rng = self.rng.lock();
        self.pairs
            .iter()
            .map(|pair| {
                let latency = apply_jitter(pair.base_latency, &self.jitter, rng.as_mut());
                self.link(pair, latency, now_ms)
            })
            .collect()
    }

    fn link(&self, pair: &VenuePair, latency: u32, now_ms: i64) -> LatencyLink {
        LatencyLink::new(
            &self.venues[pair.a].id,
            &self.venues[pair.b].id,
            latency,
            now_ms,
            &self.thresholds,
        )
    }
}

/// Every unordered pair except co-located venues, in venue order
pub fn build_pairs(venues: &[Venue]) -> Vec<VenuePair> {
    let mut pairs = Vec::new();
    for a in 0..venues.len() {
        for b in (a + 1)..venues.len() {
            if venues[a].same_location(&venues[b]) {
                continue;
            }
            let distance_km = venue_distance_km(&venues[a], &venues[b]);
            pairs.push(VenuePair {
                a,
                b,
                key: PairKey::new(&venues[a].id, &venues[b].id),
                distance_km,
                base_latency: simulated_base_latency(distance_km),
            });
        }
    }
    pairs
}
