//! Inter-venue latency estimation
//!
//! Two stages: a deterministic estimate from telemetry and distance, then a
//! stochastic realism pass. Randomness comes from an injectable
//! [`RandomSource`] so tests can pin it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::config::JitterConfig;

/// Lowest latency any emitted sample may carry
pub const MIN_LATENCY_MS: u32 = 10;

/// Floor of the distance-only estimate
pub const MIN_SIMULATED_LATENCY_MS: u32 = 20;

/// Uniform random numbers
pub trait RandomSource: Send {
    /// Sample in `[low, high)`
    fn uniform(&mut self, low: f64, high: f64) -> f64;
}

/// `rand`-backed source
pub struct RngSource<R> {
    rng: R,
}

impl RngSource<StdRng> {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl RngSource<ChaCha8Rng> {
    /// Reproducible stream for a given seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng + Send> RandomSource for RngSource<R> {
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        if high <= low {
            return low;
        }
        self.rng.gen_range(low..high)
    }
}

/// Always returns the same fraction of the requested range.
///
/// `ConstantSource(0.5)` is zero jitter for symmetric ranges.
#[derive(Debug, Clone, Copy)]
pub struct ConstantSource(pub f64);

impl RandomSource for ConstantSource {
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        low + self.0 * (high - low)
    }
}

/// Distance-only latency: `max(20, floor(km / 100) + 20)`
pub fn simulated_base_latency(distance_km: f64) -> u32 {
    let latency = (distance_km / 100.0).floor() as u32 + MIN_SIMULATED_LATENCY_MS;
    latency.max(MIN_SIMULATED_LATENCY_MS)
}

/// Deterministic-first estimate from two venues' telemetry latencies.
///
/// - both known: mean plus a distance term of `max(5, floor(km / 200))`
/// - one known: the known value plus `uniform(0, 20)`
/// - neither: [`simulated_base_latency`]
pub fn estimate(
    latency_a: Option<f64>,
    latency_b: Option<f64>,
    distance_km: f64,
    rng: &mut dyn RandomSource,
) -> u32 {
    match (latency_a, latency_b) {
        (Some(a), Some(b)) => {
            let distance_component = (distance_km / 200.0).floor().max(5.0);
            floor_clamped((a + b) / 2.0 + distance_component)
        }
        (Some(known), None) | (None, Some(known)) => {
            floor_clamped(known + rng.uniform(0.0, 20.0))
        }
        (None, None) => simulated_base_latency(distance_km),
    }
}

/// Realism pass: scale by `1 + uniform(-v, v)`, add `uniform(-n, n)` ms,
/// floor, clamp to [`MIN_LATENCY_MS`].
pub fn apply_jitter(latency: u32, jitter: &JitterConfig, rng: &mut dyn RandomSource) -> u32 {
    let variation = rng.uniform(-jitter.variation, jitter.variation);
    let noise = rng.uniform(-jitter.noise_ms, jitter.noise_ms);
    floor_clamped(latency as f64 * (1.0 + variation) + noise)
}

fn floor_clamped(value: f64) -> u32 {
    if !value.is_finite() {
        return MIN_LATENCY_MS;
    }
    (value.floor().max(0.0) as u32).max(MIN_LATENCY_MS)
}
