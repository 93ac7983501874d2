//! Bulk history population
//!
//! Rebuilds pair series from the response-time samples that come back with
//! each monitor, and optionally seeds a month of simulated hourly history.

use chrono::{Datelike, TimeZone, Timelike, Utc, Weekday};

use super::estimator::{simulated_base_latency, RandomSource, MIN_LATENCY_MS};
use super::geo::venue_distance_km;
use super::history::{HistoricalStore, PairKey};
use super::matcher::match_monitor;
use super::telemetry::{ResponseTimeSample, TelemetryRecord};
use crate::models::{LatencySample, Venue};

const HOUR_MS: i64 = 60 * 60 * 1000;

/// Hourly points in the simulated seed (30 days, both ends inclusive)
pub const SEED_HOURS: i64 = 30 * 24;

/// Rebuild the series of every pair whose two monitors both carry samples.
///
/// Returns the number of pairs rebuilt. Pairs without samples on both
/// sides keep their existing series.
pub fn backfill_from_monitors(
    store: &HistoricalStore,
    venues: &[Venue],
    monitors: &[TelemetryRecord],
    rng: &mut dyn RandomSource,
) -> usize {
    let matched: Vec<Option<&[ResponseTimeSample]>> = venues
        .iter()
        .map(|v| {
            match_monitor(&v.id, &v.name, monitors)
                .and_then(|m| m.response_times.as_deref())
                .filter(|rt| !rt.is_empty())
        })
        .collect();

    let mut rebuilt = 0;
    for i in 0..venues.len() {
        for j in (i + 1)..venues.len() {
            let (Some(rt_a), Some(rt_b)) = (matched[i], matched[j]) else {
                continue;
            };

            let distance = venue_distance_km(&venues[i], &venues[j]);
            let samples = combine_response_times(rt_a, rt_b, distance, rng);
            store.replace(&PairKey::new(&venues[i].id, &venues[j].id), samples);
            rebuilt += 1;
        }
    }

    rebuilt
}

/// Pair two monitors' samples index by index.
///
/// The longer list drives the timestamps; the shorter one repeats its first
/// sample once exhausted. Output is ordered oldest first.
fn combine_response_times(
    a: &[ResponseTimeSample],
    b: &[ResponseTimeSample],
    distance_km: f64,
    rng: &mut dyn RandomSource,
) -> Vec<LatencySample> {
    let (base, other) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let distance_component = (distance_km / 200.0).floor().max(5.0);

    let mut samples: Vec<LatencySample> = base
        .iter()
        .enumerate()
        .map(|(idx, rt1)| {
            let rt2 = other.get(idx).unwrap_or(&other[0]);
            let avg = (rt1.value + rt2.value) / 2.0;
            let calculated = (avg + distance_component).floor().max(MIN_LATENCY_MS as f64);
            let variation = rng.uniform(-0.05, 0.05);
            let latency = (calculated * (1.0 + variation)).floor().max(MIN_LATENCY_MS as f64);

            LatencySample::new(rt1.datetime * 1000, latency as u32)
        })
        .collect();

    // The API lists newest first
    samples.sort_by_key(|s| s.timestamp);
    samples
}

/// Load-shape multiplier for a point in time (UTC)
fn load_multiplier(timestamp_ms: i64, rng: &mut dyn RandomSource) -> f64 {
    let Some(at) = Utc.timestamp_millis_opt(timestamp_ms).single() else {
        return 1.0;
    };

    let is_weekend = matches!(at.weekday(), Weekday::Sat | Weekday::Sun);
    let is_peak_hour = (9..=16).contains(&at.hour());

    if is_peak_hour && !is_weekend {
        rng.uniform(1.2, 1.5)
    } else if is_weekend {
        rng.uniform(0.8, 1.0)
    } else {
        rng.uniform(0.9, 1.2)
    }
}

/// Seed every distinct-location pair with 30 days of hourly samples ending at `now_ms`
pub fn seed_simulated_history(
    store: &HistoricalStore,
    venues: &[Venue],
    now_ms: i64,
    rng: &mut dyn RandomSource,
) -> usize {
    let mut seeded = 0;

    for i in 0..venues.len() {
        for j in (i + 1)..venues.len() {
            let (a, b) = (&venues[i], &venues[j]);
            if a.same_location(b) {
                continue;
            }

            let base = simulated_base_latency(venue_distance_km(a, b)) as f64;
            let samples: Vec<LatencySample> = (0..=SEED_HOURS)
                .rev()
                .map(|hours_ago| {
                    let timestamp = now_ms - hours_ago * HOUR_MS;
                    let multiplier = load_multiplier(timestamp, rng);
                    let noise = rng.uniform(-0.1, 0.1);
                    let latency = (base * (multiplier + noise)).floor().max(MIN_LATENCY_MS as f64);
                    LatencySample::new(timestamp, latency as u32)
                })
                .collect();

            store.replace(&PairKey::new(&a.id, &b.id), samples);
            seeded += 1;
        }
    }

    seeded
}
