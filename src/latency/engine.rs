//! Latency engine: owns the cache, history and generator for one process
//! (or one test) and exposes the query surface consumed by the API.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::{info, warn};

use super::backfill::{backfill_from_monitors, seed_simulated_history};
use super::cache::MonitorCache;
use super::config::LatencyConfig;
use super::diagnostics::{DiagnosticEvent, LatencyDiagnostics, TelemetryFailure};
use super::estimator::{RandomSource, RngSource};
use super::history::{HistoricalStore, HistoryError, LatencyStats, PairKey, TimeWindow};
use super::snapshot::{SharedRandom, Snapshot, SnapshotGenerator, SnapshotMode};
use super::telemetry::{TelemetrySource, UptimeRobotClient};
use crate::models::{LatencySample, Venue};

pub struct LatencyEngine {
    config: LatencyConfig,
    telemetry: Arc<dyn TelemetrySource>,
    cache: Arc<MonitorCache>,
    history: Arc<HistoricalStore>,
    generator: SnapshotGenerator,
    diagnostics: Arc<LatencyDiagnostics>,
    rng: SharedRandom,
}

impl LatencyEngine {
    /// Engine backed by the HTTP telemetry client and an entropy-seeded RNG
    pub fn new(config: LatencyConfig, venues: Vec<Venue>) -> Result<Self> {
        let diagnostics = Arc::new(LatencyDiagnostics::new());
        let client = UptimeRobotClient::new(config.telemetry.clone(), diagnostics.clone())?;
        Ok(Self::with_parts(
            config,
            venues,
            Arc::new(client),
            Box::new(RngSource::from_entropy()),
            diagnostics,
        ))
    }

    /// Engine from explicit collaborators
    pub fn with_parts(
        config: LatencyConfig,
        venues: Vec<Venue>,
        telemetry: Arc<dyn TelemetrySource>,
        rng: Box<dyn RandomSource>,
        diagnostics: Arc<LatencyDiagnostics>,
    ) -> Self {
        let rng: SharedRandom = Arc::new(Mutex::new(rng));
        let cache = Arc::new(MonitorCache::new(
            telemetry.clone(),
            config.cache_window,
            diagnostics.clone(),
        ));
        let history = Arc::new(HistoricalStore::new(config.max_historical_points));
        let generator = SnapshotGenerator::new(
            venues,
            &config,
            cache.clone(),
            history.clone(),
            diagnostics.clone(),
            rng.clone(),
        );

        Self {
            config,
            telemetry,
            cache,
            history,
            generator,
            diagnostics,
            rng,
        }
    }

    pub fn venues(&self) -> &[Venue] {
        self.generator.venues()
    }

    pub fn mode(&self) -> SnapshotMode {
        self.generator.mode()
    }

    pub fn diagnostics(&self) -> &Arc<LatencyDiagnostics> {
        &self.diagnostics
    }

    pub fn cache(&self) -> &MonitorCache {
        &self.cache
    }

    pub fn generator(&self) -> &SnapshotGenerator {
        &self.generator
    }

    pub async fn generate_snapshot(&self) -> Snapshot {
        self.generate_snapshot_at(now_ms()).await
    }

    pub async fn generate_snapshot_at(&self, now_ms: i64) -> Snapshot {
        self.generator.generate(now_ms).await
    }

    /// Samples for a pair within `window` ("1h", "24h", "7d", "30d")
    pub fn query_history(
        &self,
        from: &str,
        to: &str,
        window: &str,
    ) -> Result<Vec<LatencySample>, HistoryError> {
        self.query_history_at(from, to, window, now_ms())
    }

    pub fn query_history_at(
        &self,
        from: &str,
        to: &str,
        window: &str,
        now_ms: i64,
    ) -> Result<Vec<LatencySample>, HistoryError> {
        let window: TimeWindow = window.parse()?;
        Ok(self.history.query(from, to, window, now_ms))
    }

    pub fn get_stats(
        &self,
        from: &str,
        to: &str,
        window: &str,
    ) -> Result<LatencyStats, HistoryError> {
        self.get_stats_at(from, to, window, now_ms())
    }

    pub fn get_stats_at(
        &self,
        from: &str,
        to: &str,
        window: &str,
        now_ms: i64,
    ) -> Result<LatencyStats, HistoryError> {
        let window: TimeWindow = window.parse()?;
        Ok(self.history.stats(from, to, window, now_ms))
    }

    pub fn get_all_history(&self) -> BTreeMap<PairKey, Vec<LatencySample>> {
        self.history.all()
    }

    /// Rebuild pair series from the monitors' response-time samples.
    ///
    /// Returns the number of pairs rebuilt; 0 when telemetry is unavailable.
    pub async fn refresh_history(&self) -> usize {
        if !self.telemetry.is_configured() {
            self.diagnostics.record(DiagnosticEvent::TelemetryUnavailable {
                failure: TelemetryFailure::NotConfigured,
            });
            return 0;
        }

        let monitors = self.telemetry.fetch_monitors().await;
        if monitors.is_empty() {
            warn!("No monitors found, cannot refresh historical data");
            return 0;
        }

        let pairs = {
            let mut rng = self.rng.lock();
            backfill_from_monitors(&self.history, self.venues(), &monitors, rng.as_mut())
        };
        self.diagnostics.record(DiagnosticEvent::HistoryBackfilled { pairs });
        pairs
    }

    /// Seed 30 days of simulated hourly history ending at `now_ms`
    pub fn seed_history_at(&self, now_ms: i64) -> usize {
        let mut rng = self.rng.lock();
        let pairs = seed_simulated_history(&self.history, self.venues(), now_ms, rng.as_mut());
        info!(pairs, "Seeded simulated history");
        pairs
    }

    /// Generate a snapshot every poll interval until the task is dropped
    pub async fn run_polling(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        info!(
            interval_ms = self.config.poll_interval.as_millis() as u64,
            "Starting latency snapshot polling"
        );

        loop {
            ticker.tick().await;
            let snapshot = self.generate_snapshot().await;
            let summary = snapshot.summary();
            info!(
                mode = ?snapshot.mode,
                links = summary.count,
                avg_ms = summary.avg,
                min_ms = summary.min,
                max_ms = summary.max,
                "Latency snapshot"
            );
        }
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
