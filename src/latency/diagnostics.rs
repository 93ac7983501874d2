//! Diagnostic channel for the latency engine
//!
//! Telemetry failures are swallowed by contract, so every degraded path is
//! reported here instead: counters for scraping and a broadcast stream of
//! events that tests and the binary can subscribe to.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::snapshot::SnapshotMode;

/// Why a telemetry lookup produced no data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TelemetryFailure {
    NotConfigured,
    HttpStatus(u16),
    Timeout,
    Transport(String),
    Malformed(String),
    Rejected(String),
}

/// Events emitted by the latency engine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    /// Telemetry call failed or was skipped
    TelemetryUnavailable { failure: TelemetryFailure },

    /// Telemetry call succeeded
    TelemetryFetched { monitors: usize },

    /// Monitor records dropped from an otherwise valid response
    MonitorsSkipped { skipped: usize, reason: String },

    /// Venue had no matching monitor
    MonitorUnmatched { venue_id: String },

    /// Cached lookup served without network access
    CacheHit { venue_id: String },

    /// Cache entry rewritten after a lookup attempt
    CacheRefreshed { venue_id: String, latency_ms: Option<f64> },

    /// Snapshot generator switched modes
    ModeChanged {
        from: SnapshotMode,
        to: SnapshotMode,
        reason: String,
    },

    /// Snapshot produced
    SnapshotGenerated { mode: SnapshotMode, links: usize },

    /// Pair series rebuilt from monitor response times
    HistoryBackfilled { pairs: usize },
}

/// Counters plus event fan-out
#[derive(Debug)]
pub struct LatencyDiagnostics {
    event_tx: broadcast::Sender<DiagnosticEvent>,

    pub telemetry_fetches: AtomicU64,
    pub telemetry_failures: AtomicU64,
    pub skipped_monitors: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_refreshes: AtomicU64,
    pub unmatched_venues: AtomicU64,
    pub mode_transitions: AtomicU64,
    pub snapshots: AtomicU64,
    pub backfills: AtomicU64,
}

impl Default for LatencyDiagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyDiagnostics {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            event_tx,
            telemetry_fetches: AtomicU64::new(0),
            telemetry_failures: AtomicU64::new(0),
            skipped_monitors: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_refreshes: AtomicU64::new(0),
            unmatched_venues: AtomicU64::new(0),
            mode_transitions: AtomicU64::new(0),
            snapshots: AtomicU64::new(0),
            backfills: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DiagnosticEvent> {
        self.event_tx.subscribe()
    }

    /// Count, log and broadcast an event
    pub fn record(&self, event: DiagnosticEvent) {
        match &event {
            DiagnosticEvent::TelemetryUnavailable { failure } => {
                self.telemetry_failures.fetch_add(1, Ordering::Relaxed);
                warn!(failure = ?failure, "Telemetry unavailable");
            }
            DiagnosticEvent::TelemetryFetched { monitors } => {
                self.telemetry_fetches.fetch_add(1, Ordering::Relaxed);
                debug!(monitors, "Telemetry fetched");
            }
            DiagnosticEvent::MonitorsSkipped { skipped, reason } => {
                self.skipped_monitors.fetch_add(*skipped as u64, Ordering::Relaxed);
                warn!(skipped, reason = %reason, "Skipped unparseable monitor records");
            }
            DiagnosticEvent::MonitorUnmatched { venue_id } => {
                self.unmatched_venues.fetch_add(1, Ordering::Relaxed);
                warn!(venue = %venue_id, "No monitor found for venue");
            }
            DiagnosticEvent::CacheHit { venue_id } => {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                debug!(venue = %venue_id, "Monitor cache hit");
            }
            DiagnosticEvent::CacheRefreshed { venue_id, latency_ms } => {
                self.cache_refreshes.fetch_add(1, Ordering::Relaxed);
                debug!(venue = %venue_id, latency_ms = ?latency_ms, "Monitor cache refreshed");
            }
            DiagnosticEvent::ModeChanged { from, to, reason } => {
                self.mode_transitions.fetch_add(1, Ordering::Relaxed);
                warn!(from = ?from, to = ?to, reason = %reason, "Snapshot mode changed");
            }
            DiagnosticEvent::SnapshotGenerated { mode, links } => {
                self.snapshots.fetch_add(1, Ordering::Relaxed);
                debug!(mode = ?mode, links, "Snapshot generated");
            }
            DiagnosticEvent::HistoryBackfilled { pairs } => {
                self.backfills.fetch_add(1, Ordering::Relaxed);
                info!(pairs, "History backfilled from monitor response times");
            }
        }

        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// Export counters in Prometheus text format
    pub fn to_prometheus(&self) -> String {
        let counters: [(&str, &str, &AtomicU64); 9] = [
            (
                "latency_telemetry_fetches_total",
                "Successful telemetry calls",
                &self.telemetry_fetches,
            ),
            (
                "latency_telemetry_failures_total",
                "Telemetry calls that yielded no data",
                &self.telemetry_failures,
            ),
            (
                "latency_skipped_monitors_total",
                "Monitor records dropped as unparseable",
                &self.skipped_monitors,
            ),
            (
                "latency_cache_hits_total",
                "Monitor lookups served from cache",
                &self.cache_hits,
            ),
            (
                "latency_cache_refreshes_total",
                "Monitor cache entries rewritten",
                &self.cache_refreshes,
            ),
            (
                "latency_unmatched_venues_total",
                "Lookups with no matching monitor",
                &self.unmatched_venues,
            ),
            (
                "latency_mode_transitions_total",
                "Snapshot mode transitions",
                &self.mode_transitions,
            ),
            ("latency_snapshots_total", "Snapshots generated", &self.snapshots),
            (
                "latency_history_backfills_total",
                "History backfills from telemetry",
                &self.backfills,
            ),
        ];

        let mut output = String::new();
        for (name, help, value) in counters {
            output.push_str(&format!("# HELP {} {}\n", name, help));
            output.push_str(&format!("# TYPE {} counter\n", name));
            output.push_str(&format!("{} {}\n", name, value.load(Ordering::Relaxed)));
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts_and_broadcasts() {
        let diagnostics = LatencyDiagnostics::new();
        let mut rx = diagnostics.subscribe();

        diagnostics.record(DiagnosticEvent::TelemetryUnavailable {
            failure: TelemetryFailure::HttpStatus(503),
        });
        diagnostics.record(DiagnosticEvent::CacheHit { venue_id: "okx".into() });

        assert_eq!(diagnostics.telemetry_failures.load(Ordering::Relaxed), 1);
        assert_eq!(diagnostics.cache_hits.load(Ordering::Relaxed), 1);
        assert_eq!(
            rx.try_recv().unwrap(),
            DiagnosticEvent::TelemetryUnavailable {
                failure: TelemetryFailure::HttpStatus(503)
            }
        );
        assert!(matches!(rx.try_recv().unwrap(), DiagnosticEvent::CacheHit { .. }));
    }

    #[test]
    fn test_record_without_subscribers() {
        let diagnostics = LatencyDiagnostics::new();
        diagnostics.record(DiagnosticEvent::SnapshotGenerated {
            mode: SnapshotMode::Simulated,
            links: 3,
        });
        assert_eq!(diagnostics.snapshots.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_prometheus_export() {
        let diagnostics = LatencyDiagnostics::new();
        diagnostics.record(DiagnosticEvent::MonitorUnmatched { venue_id: "kraken".into() });

        let text = diagnostics.to_prometheus();
        assert!(text.contains("# TYPE latency_unmatched_venues_total counter"));
        assert!(text.contains("latency_unmatched_venues_total 1\n"));
        assert!(text.contains("latency_snapshots_total 0\n"));
    }
}
