//! Uptime Monitor Telemetry Client
//!
//! Fetches per-venue uptime monitors (average response time plus recent
//! samples) from an UptimeRobot-compatible `getMonitors` endpoint. Any
//! failure yields an empty list: callers read "empty" as "telemetry
//! unavailable", never as "no venue has latency".

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};

use super::config::TelemetryConfig;
use super::diagnostics::{DiagnosticEvent, LatencyDiagnostics, TelemetryFailure};

/// One monitor as reported by the telemetry source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    #[serde(default)]
    pub id: Option<u64>,
    pub friendly_name: String,
    #[serde(default)]
    pub url: String,
    /// Milliseconds; the API sends this as a decimal string
    #[serde(deserialize_with = "de_number_or_string")]
    pub average_response_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_times: Option<Vec<ResponseTimeSample>>,
}

impl TelemetryRecord {
    pub fn new(friendly_name: &str, url: &str, average_response_time: f64) -> Self {
        Self {
            id: None,
            friendly_name: friendly_name.to_string(),
            url: url.to_string(),
            average_response_time,
            response_times: None,
        }
    }

    pub fn with_response_times(mut self, samples: Vec<ResponseTimeSample>) -> Self {
        self.response_times = Some(samples);
        self
    }
}

/// A single response-time point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimeSample {
    /// Unix seconds
    pub datetime: i64,
    /// Milliseconds
    #[serde(deserialize_with = "de_number_or_string")]
    pub value: f64,
}

#[derive(Debug, Deserialize)]
struct GetMonitorsResponse {
    stat: String,
    /// Decoded one by one so a single bad record does not sink the page
    #[serde(default)]
    monitors: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

fn de_number_or_string<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
    }
}

/// Errors on the telemetry path. Never surfaced past the client.
#[derive(Debug)]
pub enum TelemetryError {
    NotConfigured,
    HttpStatus(u16),
    Timeout,
    Transport(reqwest::Error),
    Malformed(String),
    Rejected(String),
}

impl std::fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "telemetry API key not configured"),
            Self::HttpStatus(s) => write!(f, "telemetry endpoint returned HTTP {}", s),
            Self::Timeout => write!(f, "telemetry request timed out"),
            Self::Transport(e) => write!(f, "telemetry transport error: {}", e),
            Self::Malformed(e) => write!(f, "malformed telemetry payload: {}", e),
            Self::Rejected(e) => write!(f, "telemetry endpoint rejected request: {}", e),
        }
    }
}

impl std::error::Error for TelemetryError {}

impl From<reqwest::Error> for TelemetryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(e)
        }
    }
}

impl TelemetryError {
    pub fn failure(&self) -> TelemetryFailure {
        match self {
            Self::NotConfigured => TelemetryFailure::NotConfigured,
            Self::HttpStatus(s) => TelemetryFailure::HttpStatus(*s),
            Self::Timeout => TelemetryFailure::Timeout,
            Self::Transport(e) => TelemetryFailure::Transport(e.to_string()),
            Self::Malformed(e) => TelemetryFailure::Malformed(e.clone()),
            Self::Rejected(e) => TelemetryFailure::Rejected(e.clone()),
        }
    }
}

/// Monitors decoded from one `getMonitors` response
#[derive(Debug, Default)]
pub struct MonitorPage {
    pub records: Vec<TelemetryRecord>,
    /// Decode error of each record that was dropped
    pub skipped: Vec<String>,
}

/// Parse a `getMonitors` response body.
///
/// Records that fail to decode are dropped and reported in `skipped`; the
/// page as a whole is `Malformed` only when its envelope is.
pub fn parse_monitors_response(body: &str) -> std::result::Result<MonitorPage, TelemetryError> {
    let response: GetMonitorsResponse =
        serde_json::from_str(body).map_err(|e| TelemetryError::Malformed(e.to_string()))?;

    if response.stat != "ok" {
        let detail = response
            .error
            .map(|e| e.to_string())
            .unwrap_or_else(|| format!("stat={}", response.stat));
        return Err(TelemetryError::Rejected(detail));
    }

    let monitors = response
        .monitors
        .ok_or_else(|| TelemetryError::Malformed("missing monitors array".to_string()))?;

    let mut page = MonitorPage::default();
    for value in monitors {
        match serde_json::from_value::<TelemetryRecord>(value) {
            Ok(record) => page.records.push(record),
            Err(e) => page.skipped.push(e.to_string()),
        }
    }
    Ok(page)
}

/// Source of monitor telemetry
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Whether a credential is present; unconfigured sources are never called
    fn is_configured(&self) -> bool;

    /// All monitors, or an empty list on any failure
    async fn fetch_monitors(&self) -> Vec<TelemetryRecord>;
}

/// HTTP client for the UptimeRobot v2 API
#[derive(Clone)]
pub struct UptimeRobotClient {
    client: Client,
    config: TelemetryConfig,
    diagnostics: Arc<LatencyDiagnostics>,
}

impl UptimeRobotClient {
    pub fn new(config: TelemetryConfig, diagnostics: Arc<LatencyDiagnostics>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .build()
            .context("Failed to build UptimeRobotClient")?;

        Ok(Self {
            client,
            config,
            diagnostics,
        })
    }

    #[inline]
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Fetch monitors, propagating the failure reason
    pub async fn try_fetch_monitors(
        &self,
    ) -> std::result::Result<Vec<TelemetryRecord>, TelemetryError> {
        let api_key = match self.config.api_key.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => return Err(TelemetryError::NotConfigured),
        };

        let limit = self.config.response_times_limit.to_string();
        let form = [
            ("api_key", api_key),
            ("format", "json"),
            ("response_times", "1"),
            ("response_times_limit", limit.as_str()),
        ];

        let resp = self
            .client
            .post(self.url("/getMonitors"))
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .form(&form)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(TelemetryError::HttpStatus(resp.status().as_u16()));
        }

        let body = resp.text().await?;
        let page = parse_monitors_response(&body)?;
        if let Some(reason) = page.skipped.first() {
            self.diagnostics.record(DiagnosticEvent::MonitorsSkipped {
                skipped: page.skipped.len(),
                reason: reason.clone(),
            });
        }
        Ok(page.records)
    }
}

#[async_trait]
impl TelemetrySource for UptimeRobotClient {
    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn fetch_monitors(&self) -> Vec<TelemetryRecord> {
        match self.try_fetch_monitors().await {
            Ok(monitors) => {
                self.diagnostics.record(DiagnosticEvent::TelemetryFetched {
                    monitors: monitors.len(),
                });
                monitors
            }
            Err(e) => {
                tracing::debug!("getMonitors failed: {}", e);
                self.diagnostics.record(DiagnosticEvent::TelemetryUnavailable {
                    failure: e.failure(),
                });
                Vec::new()
            }
        }
    }
}
