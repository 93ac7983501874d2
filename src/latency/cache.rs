//! Per-venue monitor latency cache
//!
//! Bounds telemetry calls to at most one per venue per cache window. A
//! failed or unmatched lookup is cached exactly like a successful one, so a
//! down endpoint is not hammered with retries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use super::diagnostics::{DiagnosticEvent, LatencyDiagnostics, TelemetryFailure};
use super::matcher::match_monitor;
use super::telemetry::TelemetrySource;

/// Last lookup result for a venue
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheEntry {
    /// None when the lookup failed or found no monitor
    pub latency: Option<f64>,
    /// Unix milliseconds of the lookup attempt
    pub last_fetch_time: i64,
}

/// Per-venue state. `refresh` serializes lookups; `entry` stays readable
/// while a refresh is in flight.
#[derive(Default)]
struct VenueSlot {
    refresh: tokio::sync::Mutex<()>,
    entry: Mutex<Option<CacheEntry>>,
}

type Slot = Arc<VenueSlot>;

pub struct MonitorCache {
    source: Arc<dyn TelemetrySource>,
    window: Duration,
    diagnostics: Arc<LatencyDiagnostics>,
    /// One slot per venue; a venue's lookup is serialized on its slot
    slots: Mutex<HashMap<String, Slot>>,
}

impl MonitorCache {
    pub fn new(
        source: Arc<dyn TelemetrySource>,
        window: Duration,
        diagnostics: Arc<LatencyDiagnostics>,
    ) -> Self {
        Self {
            source,
            window,
            diagnostics,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn telemetry_configured(&self) -> bool {
        self.source.is_configured()
    }

    fn slot(&self, venue_id: &str) -> Slot {
        self.slots
            .lock()
            .entry(venue_id.to_string())
            .or_default()
            .clone()
    }

    fn is_fresh(&self, entry: &CacheEntry, now_ms: i64) -> bool {
        now_ms - entry.last_fetch_time < self.window.as_millis() as i64
    }

    /// Latency for a venue, from cache when fresh, otherwise from telemetry.
    ///
    /// Never fails: every problem on the telemetry path becomes `None`.
    pub async fn get_latency(&self, venue_id: &str, venue_name: &str, now_ms: i64) -> Option<f64> {
        let slot = self.slot(venue_id);
        let _refresh = slot.refresh.lock().await;

        let cached = *slot.entry.lock();
        if let Some(entry) = cached.filter(|e| self.is_fresh(e, now_ms)) {
            self.diagnostics.record(DiagnosticEvent::CacheHit {
                venue_id: venue_id.to_string(),
            });
            return entry.latency;
        }

        let latency = self.lookup(venue_id, venue_name).await;

        *slot.entry.lock() = Some(CacheEntry {
            latency,
            last_fetch_time: now_ms,
        });
        self.diagnostics.record(DiagnosticEvent::CacheRefreshed {
            venue_id: venue_id.to_string(),
            latency_ms: latency,
        });

        latency
    }

    async fn lookup(&self, venue_id: &str, venue_name: &str) -> Option<f64> {
        if !self.source.is_configured() {
            self.diagnostics.record(DiagnosticEvent::TelemetryUnavailable {
                failure: TelemetryFailure::NotConfigured,
            });
            return None;
        }

        let monitors = self.source.fetch_monitors().await;
        if monitors.is_empty() {
            // Source already reported the failure
            return None;
        }

        match match_monitor(venue_id, venue_name, &monitors) {
            Some(monitor) => Some(monitor.average_response_time),
            None => {
                self.diagnostics.record(DiagnosticEvent::MonitorUnmatched {
                    venue_id: venue_id.to_string(),
                });
                None
            }
        }
    }

    /// Last completed lookup for a venue; `None` only if none has finished.
    ///
    /// A refresh in flight does not hide the previous entry.
    pub fn entry(&self, venue_id: &str) -> Option<CacheEntry> {
        let slot = self.slots.lock().get(venue_id).cloned()?;
        let entry = *slot.entry.lock();
        entry
    }
}
