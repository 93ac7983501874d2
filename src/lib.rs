//! Venue Latency Backend Library
//!
//! Inter-venue latency estimation, rolling history and the HTTP surface
//! that serves them. Exposed for the binary and integration tests.

pub mod api;
pub mod latency;
pub mod middleware;
pub mod models;
pub mod venues;
