//! Rolling per-pair latency history
//!
//! Each unordered venue pair owns a bounded FIFO of samples. Once a series
//! is full the oldest sample is evicted on every append.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::models::LatencySample;

/// Order-independent key for a venue pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairKey(String);

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self(format!("{}-{}", a, b))
        } else {
            Self(format!("{}-{}", b, a))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Relative query window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TimeWindow {
    OneHour,
    #[default]
    OneDay,
    SevenDays,
    ThirtyDays,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 4] = [
        TimeWindow::OneHour,
        TimeWindow::OneDay,
        TimeWindow::SevenDays,
        TimeWindow::ThirtyDays,
    ];

    pub fn duration(&self) -> Duration {
        const HOUR: u64 = 60 * 60;
        match self {
            TimeWindow::OneHour => Duration::from_secs(HOUR),
            TimeWindow::OneDay => Duration::from_secs(24 * HOUR),
            TimeWindow::SevenDays => Duration::from_secs(7 * 24 * HOUR),
            TimeWindow::ThirtyDays => Duration::from_secs(30 * 24 * HOUR),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::OneHour => "1h",
            TimeWindow::OneDay => "24h",
            TimeWindow::SevenDays => "7d",
            TimeWindow::ThirtyDays => "30d",
        }
    }

    /// Earliest timestamp (inclusive) inside the window ending at `now_ms`
    pub fn cutoff(&self, now_ms: i64) -> i64 {
        now_ms - self.duration().as_millis() as i64
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeWindow::ALL
            .into_iter()
            .find(|w| w.as_str() == s)
            .ok_or_else(|| HistoryError::UnknownWindow(s.to_string()))
    }
}

/// History query errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    UnknownWindow(String),
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownWindow(w) => write!(
                f,
                "unknown time window '{}' (expected one of 1h, 24h, 7d, 30d)",
                w
            ),
        }
    }
}

impl std::error::Error for HistoryError {}

/// Summary over a queried range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub min: u32,
    pub max: u32,
    /// Rounded to the nearest millisecond
    pub avg: u32,
    pub count: usize,
}

impl LatencyStats {
    pub fn from_samples(samples: &[LatencySample]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut min = u32::MAX;
        let mut max = 0;
        let mut sum = 0u64;
        for s in samples {
            min = min.min(s.latency);
            max = max.max(s.latency);
            sum += s.latency as u64;
        }

        Self {
            min,
            max,
            avg: (sum as f64 / samples.len() as f64).round() as u32,
            count: samples.len(),
        }
    }
}

/// Bounded per-pair series store
pub struct HistoricalStore {
    max_points: usize,
    series: RwLock<HashMap<PairKey, VecDeque<LatencySample>>>,
}

impl HistoricalStore {
    pub fn new(max_points: usize) -> Self {
        Self {
            max_points: max_points.max(1),
            series: RwLock::new(HashMap::new()),
        }
    }

    /// Push a sample, evicting the oldest once the series is over capacity
    pub fn append(&self, key: &PairKey, sample: LatencySample) {
        let mut series = self.series.write();
        let queue = series
            .entry(key.clone())
            .or_insert_with(|| VecDeque::with_capacity(self.max_points.min(1024)));

        queue.push_back(sample);
        while queue.len() > self.max_points {
            queue.pop_front();
        }
    }

    /// Push one sample per pair under a single lock
    pub fn append_batch<'a, I>(&self, samples: I)
    where
        I: IntoIterator<Item = (&'a PairKey, LatencySample)>,
    {
        let mut series = self.series.write();
        for (key, sample) in samples {
            let queue = series.entry(key.clone()).or_default();
            queue.push_back(sample);
            while queue.len() > self.max_points {
                queue.pop_front();
            }
        }
    }

    /// Replace a pair's series, keeping only the most recent `max_points`
    pub fn replace(&self, key: &PairKey, samples: Vec<LatencySample>) {
        let skip = samples.len().saturating_sub(self.max_points);
        let queue: VecDeque<LatencySample> = samples.into_iter().skip(skip).collect();
        self.series.write().insert(key.clone(), queue);
    }

    /// Samples for a pair with `timestamp >= now - window`, in insertion order
    pub fn query(&self, a: &str, b: &str, window: TimeWindow, now_ms: i64) -> Vec<LatencySample> {
        let cutoff = window.cutoff(now_ms);
        let key = PairKey::new(a, b);

        self.series
            .read()
            .get(&key)
            .map(|queue| {
                queue
                    .iter()
                    .filter(|s| s.timestamp >= cutoff)
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn stats(&self, a: &str, b: &str, window: TimeWindow, now_ms: i64) -> LatencyStats {
        LatencyStats::from_samples(&self.query(a, b, window, now_ms))
    }

    /// Copy of every series, keyed by pair key
    pub fn all(&self) -> BTreeMap<PairKey, Vec<LatencySample>> {
        self.series
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.iter().copied().collect()))
            .collect()
    }

    pub fn series_len(&self, a: &str, b: &str) -> usize {
        self.series
            .read()
            .get(&PairKey::new(a, b))
            .map_or(0, |q| q.len())
    }

    pub fn pair_count(&self) -> usize {
        self.series.read().len()
    }
}
