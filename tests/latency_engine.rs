//! End-to-end engine behavior against a stub telemetry source.

use std::sync::Arc;

use async_trait::async_trait;
use venue_latency_backend::latency::{
    ConstantSource, DiagnosticEvent, HistoryError, LatencyConfig, LatencyDiagnostics,
    LatencyEngine, PairKey, ResponseTimeSample, RngSource, SnapshotMode, TelemetryConfig,
    TelemetryRecord, TelemetrySource,
};
use venue_latency_backend::models::{CloudProvider, Venue};

const NOW: i64 = 1_700_000_000_000;

struct StubSource {
    configured: bool,
    records: Vec<TelemetryRecord>,
}

#[async_trait]
impl TelemetrySource for StubSource {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn fetch_monitors(&self) -> Vec<TelemetryRecord> {
        self.records.clone()
    }
}

fn singapore_seattle() -> Vec<Venue> {
    vec![
        Venue::new("sgx", "Singapore", 1.35, 103.82, CloudProvider::Aws),
        Venue::new("sea", "Seattle", 47.61, -122.33, CloudProvider::Aws),
    ]
}

fn offline_engine(venues: Vec<Venue>) -> LatencyEngine {
    LatencyEngine::with_parts(
        LatencyConfig::default(),
        venues,
        Arc::new(StubSource {
            configured: false,
            records: vec![],
        }),
        Box::new(ConstantSource(0.5)),
        Arc::new(LatencyDiagnostics::new()),
    )
}

fn configured() -> LatencyConfig {
    LatencyConfig {
        telemetry: TelemetryConfig {
            api_key: Some("test-key".to_string()),
            ..TelemetryConfig::default()
        },
        ..LatencyConfig::default()
    }
}

#[tokio::test]
async fn test_far_apart_venues_without_telemetry() {
    let engine = offline_engine(singapore_seattle());
    assert_eq!(engine.mode(), SnapshotMode::Simulated);

    let snapshot = engine.generate_snapshot_at(NOW).await;
    assert_eq!(snapshot.mode, SnapshotMode::Simulated);
    assert_eq!(snapshot.links.len(), 1);

    let base = engine.generator().base_latency("sgx", "sea").unwrap();
    assert_eq!(base, 149);
    assert!(snapshot.links[0].latency >= 20);
    assert_eq!(snapshot.links[0].latency, base);
}

#[tokio::test]
async fn test_jittered_latency_stays_near_base() {
    let engine = LatencyEngine::with_parts(
        LatencyConfig::default(),
        singapore_seattle(),
        Arc::new(StubSource {
            configured: false,
            records: vec![],
        }),
        Box::new(RngSource::seeded(7)),
        Arc::new(LatencyDiagnostics::new()),
    );

    for i in 0..50 {
        let snapshot = engine.generate_snapshot_at(NOW + i).await;
        let latency = snapshot.links[0].latency as f64;
        // base 149, +/-10% and +/-2.5ms
        assert!(latency >= (149.0 * 0.9 - 2.5_f64).floor(), "latency {}", latency);
        assert!(latency <= 149.0 * 1.1 + 2.5, "latency {}", latency);
    }
    assert_eq!(engine.get_all_history()[&PairKey::new("sgx", "sea")].len(), 50);
}

#[tokio::test]
async fn test_colocated_venues_never_linked() {
    let mut venues = singapore_seattle();
    venues.push(Venue::new("sgx-b", "Singapore B", 1.35, 103.82, CloudProvider::Gcp));
    let engine = offline_engine(venues);

    let snapshot = engine.generate_snapshot_at(NOW).await;
    assert_eq!(snapshot.links.len(), 2);
    assert!(snapshot
        .links
        .iter()
        .all(|l| !(l.from.starts_with("sgx") && l.to.starts_with("sgx"))));
}

#[tokio::test]
async fn test_short_window_is_subset_of_long_window() {
    let engine = offline_engine(singapore_seattle());
    assert_eq!(engine.seed_history_at(NOW), 1);
    engine.generate_snapshot_at(NOW + 1_000).await;

    let now = NOW + 1_000;
    let hour = engine.query_history_at("sgx", "sea", "1h", now).unwrap();
    let month = engine.query_history_at("sea", "sgx", "30d", now).unwrap();

    assert_eq!(hour.len(), 2);
    assert_eq!(month.len(), 721);
    assert!(hour.iter().all(|s| month.contains(s)));
    assert!(hour.len() < month.len());

    let stats = engine.get_stats_at("sgx", "sea", "1h", now).unwrap();
    assert_eq!(stats.count, hour.len());
    let stats = engine.get_stats_at("sgx", "sea", "30d", now).unwrap();
    assert_eq!(stats.count, month.len());
    assert!(stats.min <= stats.avg && stats.avg <= stats.max);
}

#[tokio::test]
async fn test_unknown_window_rejected() {
    let engine = offline_engine(singapore_seattle());

    assert_eq!(
        engine.query_history_at("sgx", "sea", "2w", NOW),
        Err(HistoryError::UnknownWindow("2w".to_string()))
    );
    assert!(engine.get_stats_at("sgx", "sea", "", NOW).is_err());
}

#[tokio::test]
async fn test_unknown_pair_is_empty() {
    let engine = offline_engine(singapore_seattle());
    engine.generate_snapshot_at(NOW).await;

    let samples = engine.query_history_at("sgx", "nowhere", "24h", NOW).unwrap();
    assert!(samples.is_empty());
    let stats = engine.get_stats_at("sgx", "nowhere", "24h", NOW).unwrap();
    assert_eq!(stats.count, 0);
}

#[tokio::test]
async fn test_refresh_history_from_response_times() {
    let diagnostics = Arc::new(LatencyDiagnostics::new());
    let mut events = diagnostics.subscribe();

    let source = StubSource {
        configured: true,
        records: vec![
            // Newest first, as the monitor API lists them
            TelemetryRecord::new("Singapore edge", "", 45.0).with_response_times(vec![
                ResponseTimeSample { datetime: 200, value: 40.0 },
                ResponseTimeSample { datetime: 100, value: 50.0 },
            ]),
            TelemetryRecord::new("Seattle edge", "", 60.0).with_response_times(vec![
                ResponseTimeSample { datetime: 200, value: 60.0 },
            ]),
        ],
    };
    let engine = LatencyEngine::with_parts(
        configured(),
        singapore_seattle(),
        Arc::new(source),
        Box::new(ConstantSource(0.5)),
        diagnostics.clone(),
    );

    assert_eq!(engine.refresh_history().await, 1);

    let all = engine.get_all_history();
    let series = &all[&PairKey::new("sgx", "sea")];
    let points: Vec<(i64, u32)> = series.iter().map(|s| (s.timestamp, s.latency)).collect();
    // floor(12977.9 / 200) = 64 distance component
    assert_eq!(points, vec![(100_000, 119), (200_000, 114)]);

    let mut backfilled = None;
    while let Ok(event) = events.try_recv() {
        if let DiagnosticEvent::HistoryBackfilled { pairs } = event {
            backfilled = Some(pairs);
        }
    }
    assert_eq!(backfilled, Some(1));
}

#[tokio::test]
async fn test_refresh_without_telemetry_leaves_history() {
    let engine = offline_engine(singapore_seattle());
    engine.generate_snapshot_at(NOW).await;

    assert_eq!(engine.refresh_history().await, 0);
    assert_eq!(engine.get_all_history()[&PairKey::new("sgx", "sea")].len(), 1);
}

#[tokio::test]
async fn test_empty_monitor_list_leaves_history() {
    let engine = LatencyEngine::with_parts(
        configured(),
        singapore_seattle(),
        Arc::new(StubSource {
            configured: true,
            records: vec![],
        }),
        Box::new(ConstantSource(0.5)),
        Arc::new(LatencyDiagnostics::new()),
    );
    engine.seed_history_at(NOW);

    assert_eq!(engine.refresh_history().await, 0);
    assert_eq!(engine.get_all_history()[&PairKey::new("sgx", "sea")].len(), 721);
}

#[tokio::test]
async fn test_live_snapshot_through_engine() {
    let source = StubSource {
        configured: true,
        records: vec![
            TelemetryRecord::new("Singapore", "", 40.0),
            TelemetryRecord::new("Seattle", "", 60.0),
        ],
    };
    let engine = LatencyEngine::with_parts(
        configured(),
        singapore_seattle(),
        Arc::new(source),
        Box::new(ConstantSource(0.5)),
        Arc::new(LatencyDiagnostics::new()),
    );

    let snapshot = engine.generate_snapshot_at(NOW).await;
    assert_eq!(snapshot.mode, SnapshotMode::Live);
    assert_eq!(snapshot.links[0].latency, 114);
    assert_eq!(engine.cache().entry("sgx").and_then(|e| e.latency), Some(40.0));
}
