//! Compiled-in venue set
//!
//! Each venue is placed at the data-center region its matching engine is
//! known to run in. Uptime monitors must exist for a venue before it can
//! take part in live estimation; venues without one fall back to distance.

use crate::models::{CloudProvider, Venue};

pub fn default_venues() -> Vec<Venue> {
    vec![
        Venue::new("binance", "Binance", 1.3521, 103.8198, CloudProvider::Aws)
            .with_location("Singapore", "ap-southeast-1", "SG"),
        Venue::new("okx", "OKX", 22.3193, 114.1694, CloudProvider::Azure)
            .with_location("Hong Kong", "eastasia", "HK"),
        Venue::new("coinbase", "Coinbase", 37.7749, -122.4194, CloudProvider::Aws)
            .with_location("San Francisco", "us-west-1", "US"),
        Venue::new("kraken", "Kraken", 47.6062, -122.3321, CloudProvider::Aws)
            .with_location("Seattle", "us-west-2", "US"),
        Venue::new("bitfinex", "Bitfinex", 25.2048, 55.2708, CloudProvider::Azure)
            .with_location("Dubai", "uaenorth", "AE"),
        Venue::new("kucoin", "KuCoin", 1.2897, 103.8501, CloudProvider::Gcp)
            .with_location("Singapore", "asia-southeast1", "SG"),
        Venue::new("gateio", "Gate.io", 35.6586, 139.7454, CloudProvider::Gcp)
            .with_location("Tokyo", "asia-northeast1", "JP"),
    ]
}
