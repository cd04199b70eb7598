//! Telemetry samples and their synthetic generator

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// One drone state report
///
/// Serialized as a flat JSON object: `{"x":..,"y":..,"alt":..,"spd":..,"bat":..,"ts":..}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// East offset in metres
    pub x: f64,
    /// North offset in metres
    pub y: f64,
    /// Altitude in metres
    pub alt: f64,
    /// Ground speed in m/s
    pub spd: f64,
    /// Battery level in percent
    pub bat: f64,
    /// Generation time, unix seconds
    pub ts: f64,
}

/// Inclusive bounds and rounding for one generated telemetry field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRange {
    pub min: f64,
    pub max: f64,
    /// Decimal places kept after rounding
    pub decimals: i32,
}

impl FieldRange {
    pub const fn new(min: f64, max: f64, decimals: i32) -> Self {
        Self { min, max, decimals }
    }

    /// Draw a rounded value inside the range
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        round_to(rng.gen_range(self.min..=self.max), self.decimals)
    }

    /// Check if a value lies inside the range
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

pub const X_RANGE: FieldRange = FieldRange::new(-10.0, 10.0, 2);
pub const Y_RANGE: FieldRange = FieldRange::new(-10.0, 10.0, 2);
pub const ALT_RANGE: FieldRange = FieldRange::new(90.0, 120.0, 2);
pub const SPD_RANGE: FieldRange = FieldRange::new(0.0, 15.0, 2);
pub const BAT_RANGE: FieldRange = FieldRange::new(40.0, 100.0, 1);

impl TelemetrySample {
    /// Check every bounded field against its generator range
    pub fn is_within_bounds(&self) -> bool {
        X_RANGE.contains(self.x)
            && Y_RANGE.contains(self.y)
            && ALT_RANGE.contains(self.alt)
            && SPD_RANGE.contains(self.spd)
            && BAT_RANGE.contains(self.bat)
    }
}

/// Produces random telemetry samples within the configured field ranges
pub struct TelemetryGenerator<R> {
    rng: R,
}

impl TelemetryGenerator<StdRng> {
    /// Generator seeded from OS entropy
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for TelemetryGenerator<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> TelemetryGenerator<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Generate a sample stamped with the current wall-clock time
    pub fn sample(&mut self) -> TelemetrySample {
        self.sample_at(unix_timestamp())
    }

    /// Generate a sample stamped with the given unix time
    pub fn sample_at(&mut self, ts: f64) -> TelemetrySample {
        TelemetrySample {
            x: X_RANGE.sample(&mut self.rng),
            y: Y_RANGE.sample(&mut self.rng),
            alt: ALT_RANGE.sample(&mut self.rng),
            spd: SPD_RANGE.sample(&mut self.rng),
            bat: BAT_RANGE.sample(&mut self.rng),
            ts,
        }
    }
}

/// Current wall-clock time as fractional unix seconds
pub fn unix_timestamp() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
