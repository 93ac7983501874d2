use serde::{Deserialize, Serialize};

use crate::latency::config::LatencyThresholds;

/// Cloud provider hosting a venue's matching engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CloudProvider {
    #[serde(rename = "AWS")]
    Aws,
    #[serde(rename = "GCP")]
    Gcp,
    Azure,
    Other,
}

/// A trading venue at a fixed geographic location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub provider: CloudProvider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

impl Venue {
    pub fn new(id: &str, name: &str, lat: f64, lng: f64, provider: CloudProvider) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            lat,
            lng,
            provider,
            city: None,
            region: None,
            country_code: None,
        }
    }

    pub fn with_location(mut self, city: &str, region: &str, country_code: &str) -> Self {
        self.city = Some(city.to_string());
        self.region = Some(region.to_string());
        self.country_code = Some(country_code.to_string());
        self
    }

    /// Two venues sharing exact coordinates never form a link
    pub fn same_location(&self, other: &Venue) -> bool {
        self.lat == other.lat && self.lng == other.lng
    }
}

/// One latency observation for a venue pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencySample {
    /// Unix milliseconds
    pub timestamp: i64,
    /// Milliseconds
    pub latency: u32,
}

impl LatencySample {
    pub fn new(timestamp: i64, latency: u32) -> Self {
        Self { timestamp, latency }
    }
}

/// Latency severity bucket used for colouring links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Classify a final (post-jitter) latency value.
    ///
    /// Both thresholds are inclusive upper bounds: `latency <= low_ms` is
    /// `Low`, `latency <= medium_ms` is `Medium`, anything above is `High`.
    pub fn classify(latency_ms: u32, thresholds: &LatencyThresholds) -> Self {
        if latency_ms > thresholds.medium_ms {
            Severity::High
        } else if latency_ms > thresholds.low_ms {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Severity::Low => "green",
            Severity::Medium => "yellow",
            Severity::High => "red",
        }
    }
}

/// A directed-by-convention latency edge between two venues in one snapshot.
///
/// Severity and color follow from the latency and are only set by [`LatencyLink::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatencyLink {
    pub from: String,
    pub to: String,
    pub latency: u32,
    severity: Severity,
    color: String,
    pub timestamp: i64,
}

impl LatencyLink {
    pub fn new(
        from: &str,
        to: &str,
        latency: u32,
        timestamp: i64,
        thresholds: &LatencyThresholds,
    ) -> Self {
        let severity = Severity::classify(latency, thresholds);
        Self {
            from: from.to_string(),
            to: to.to_string(),
            latency,
            severity,
            color: severity.color().to_string(),
            timestamp,
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn sample(&self) -> LatencySample {
        LatencySample::new(self.timestamp, self.latency)
    }
}
