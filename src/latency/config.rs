//! Latency Engine Configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_TELEMETRY_BASE_URL: &str = "https://api.uptimerobot.com/v2";

/// Main configuration for the latency engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    /// Uptime monitor telemetry source
    pub telemetry: TelemetryConfig,

    /// Interval between background snapshots
    #[serde(with = "duration_serde")]
    pub poll_interval: Duration,

    /// How long a per-venue monitor lookup stays fresh
    #[serde(with = "duration_serde")]
    pub cache_window: Duration,

    /// Maximum samples retained per venue pair
    pub max_historical_points: usize,

    /// Severity thresholds
    pub thresholds: LatencyThresholds,

    /// Realism jitter applied after estimation
    pub jitter: JitterConfig,

    /// Deadline for the per-venue lookup batch of a live snapshot
    #[serde(with = "duration_serde")]
    pub snapshot_timeout: Duration,

    /// Retry live mode this long after degrading (None = never)
    #[serde(with = "option_duration_serde")]
    pub live_retry_interval: Option<Duration>,

    /// Pre-populate 30 days of simulated hourly history at startup
    pub seed_history: bool,

    /// HTTP listen port
    pub port: u16,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            telemetry: TelemetryConfig::default(),
            poll_interval: Duration::from_secs(60),
            cache_window: Duration::from_secs(3 * 60),
            max_historical_points: 1000,
            thresholds: LatencyThresholds::default(),
            jitter: JitterConfig::default(),
            snapshot_timeout: Duration::from_secs(15),
            live_retry_interval: None,
            seed_history: false,
            port: 3000,
        }
    }
}

impl LatencyConfig {
    /// Load from a TOML file; missing fields take their defaults
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Build from environment variables (after loading `.env` if present)
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = Self::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Override fields from environment variables that are set and parse
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("UPTIME_ROBOT_API_KEY") {
            let key = key.trim().to_string();
            if !key.is_empty() {
                self.telemetry.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("UPTIME_ROBOT_BASE_URL") {
            self.telemetry.base_url = url;
        }
        if let Some(limit) = env_parse::<u32>("UPTIME_ROBOT_RESPONSE_TIMES_LIMIT") {
            self.telemetry.response_times_limit = limit;
        }
        if let Some(ms) = env_parse::<u64>("UPTIME_ROBOT_TIMEOUT_MS") {
            self.telemetry.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("LATENCY_POLL_INTERVAL_MS") {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("LATENCY_CACHE_WINDOW_MS") {
            self.cache_window = Duration::from_millis(ms);
        }
        if let Some(points) = env_parse::<usize>("LATENCY_MAX_HISTORICAL_POINTS") {
            self.max_historical_points = points;
        }
        if let Some(ms) = env_parse::<u32>("LATENCY_LOW_THRESHOLD_MS") {
            self.thresholds.low_ms = ms;
        }
        if let Some(ms) = env_parse::<u32>("LATENCY_MEDIUM_THRESHOLD_MS") {
            self.thresholds.medium_ms = ms;
        }
        if let Some(ms) = env_parse::<u64>("LATENCY_SNAPSHOT_TIMEOUT_MS") {
            self.snapshot_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("LATENCY_LIVE_RETRY_MS") {
            self.live_retry_interval = Some(Duration::from_millis(ms));
        }
        if let Ok(v) = std::env::var("LATENCY_SEED_HISTORY") {
            self.seed_history = matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON");
        }
        if let Some(port) = env_parse::<u16>("PORT") {
            self.port = port;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be non-zero");
        }
        if self.max_historical_points == 0 {
            anyhow::bail!("max_historical_points must be at least 1");
        }
        if self.thresholds.low_ms > self.thresholds.medium_ms {
            anyhow::bail!(
                "low threshold {}ms exceeds medium threshold {}ms",
                self.thresholds.low_ms,
                self.thresholds.medium_ms
            );
        }
        if !(0.0..1.0).contains(&self.jitter.variation) || self.jitter.noise_ms < 0.0 {
            anyhow::bail!("jitter variation must be in [0, 1) and noise non-negative");
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

/// Telemetry endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Pre-shared API key; absence disables live mode for the process lifetime
    pub api_key: Option<String>,
    /// Base URL, `/getMonitors` is appended
    pub base_url: String,
    /// Number of recent response-time points requested per monitor
    pub response_times_limit: u32,
    /// Per-request timeout
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_TELEMETRY_BASE_URL.to_string(),
            response_times_limit: 168, // 7 days at 1 hour intervals
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl TelemetryConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().map_or(false, |k| !k.is_empty())
    }
}

/// Severity thresholds (inclusive upper bounds, milliseconds)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LatencyThresholds {
    pub low_ms: u32,
    pub medium_ms: u32,
}

impl Default for LatencyThresholds {
    fn default() -> Self {
        Self {
            low_ms: 60,
            medium_ms: 120,
        }
    }
}

/// Half-ranges of the realism pass
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JitterConfig {
    /// Multiplicative variation, applied as `1 + uniform(-v, v)`
    pub variation: f64,
    /// Additive noise in ms, applied as `uniform(-n, n)`
    pub noise_ms: f64,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            variation: 0.1,
            noise_ms: 2.5,
        }
    }
}

// Serde helper for Duration (using milliseconds for simplicity)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

mod option_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = Option::<u64>::deserialize(deserializer)?;
        Ok(ms.map(Duration::from_millis))
    }
}
