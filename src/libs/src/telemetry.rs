//////////
// Telemetry Trait and Struct
////

use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};
use thiserror::Error as ThisError;

use crate::models::Position;

#[derive(ThisError, Debug, PartialEq)]
pub enum Error {
    #[error("spread must be finite and positive, got {0}")]
    InvalidSpread(f64),
    #[error("amplitude must be finite and positive, got {0}")]
    InvalidAmplitude(f64),
}

pub trait TelemetryGenerator {
    fn next_datapoint(&mut self, rng: &mut dyn RngCore) -> f64;
    fn previous_datapoint(&self) -> f64;
}

#[derive(Debug, Clone)]
pub struct OffsetTelemetryGenerator {
    // base + [0, spread)
    pub previous_value: f64,
    pub base: f64,
    pub spread: f64,
}

#[derive(Debug, Clone)]
pub struct JitterTelemetryGenerator {
    // random walk, previous + [-amplitude, amplitude), rounded
    pub previous_value: f64,
    pub amplitude: f64,
    pub decimals: i32,
}

//////////
// Implementation
////

impl TelemetryGenerator for OffsetTelemetryGenerator {
    fn next_datapoint(&mut self, rng: &mut dyn RngCore) -> f64 {
        let value = self.base + rng.gen_range(0.0..self.spread);
        self.previous_value = value;
        value
    }

    fn previous_datapoint(&self) -> f64 {
        self.previous_value
    }
}

impl TelemetryGenerator for JitterTelemetryGenerator {
    fn next_datapoint(&mut self, rng: &mut dyn RngCore) -> f64 {
        let drift = rng.gen_range(-self.amplitude..self.amplitude);
        let value = round_to(self.previous_value + drift, self.decimals);
        self.previous_value = value;
        value
    }

    fn previous_datapoint(&self) -> f64 {
        self.previous_value
    }
}

impl OffsetTelemetryGenerator {
    pub fn new(base: f64, spread: f64) -> Result<Self, Error> {
        if !spread.is_finite() || spread <= 0.0 {
            return Err(Error::InvalidSpread(spread));
        }
        Ok(Self {
            previous_value: base,
            base,
            spread,
        })
    }
}

impl JitterTelemetryGenerator {
    pub fn new(start: f64, amplitude: f64, decimals: i32) -> Result<Self, Error> {
        if !amplitude.is_finite() || amplitude <= 0.0 {
            return Err(Error::InvalidAmplitude(amplitude));
        }
        Ok(Self {
            previous_value: start,
            amplitude,
            decimals,
        })
    }
}

/// Rounds half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

//////////
// Positions
////

pub const ORIGIN_LATITUDE: f64 = 51.505;
pub const ORIGIN_LONGITUDE: f64 = -0.09;
pub const POSITION_SPREAD: f64 = 0.01;

/// Synthetic GPS fixes scattered in a 0.01° square north-east of central London.
#[derive(Debug, Clone)]
pub struct PositionGenerator {
    latitude: OffsetTelemetryGenerator,
    longitude: OffsetTelemetryGenerator,
    rng: StdRng,
}

impl PositionGenerator {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            latitude: OffsetTelemetryGenerator {
                previous_value: ORIGIN_LATITUDE,
                base: ORIGIN_LATITUDE,
                spread: POSITION_SPREAD,
            },
            longitude: OffsetTelemetryGenerator {
                previous_value: ORIGIN_LONGITUDE,
                base: ORIGIN_LONGITUDE,
                spread: POSITION_SPREAD,
            },
            rng,
        }
    }

    pub fn next_position(&mut self) -> Position {
        Position::new(
            self.latitude.next_datapoint(&mut self.rng),
            self.longitude.next_datapoint(&mut self.rng),
        )
    }
}

impl Default for PositionGenerator {
    fn default() -> Self {
        Self::new()
    }
}
