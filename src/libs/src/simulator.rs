use std::collections::BTreeMap;

use rand::{rngs::StdRng, SeedableRng};
use thiserror::Error as ThisError;

use crate::models::{self, Batch, BatchRecord};
use crate::telemetry::{self, JitterTelemetryGenerator, TelemetryGenerator};

pub const TEMPERATURE_AMPLITUDE: f64 = 0.1;
pub const HUMIDITY_AMPLITUDE: f64 = 0.5;
const DECIMALS: i32 = 1;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("batch error: {0}")]
    Batch(#[from] models::batch::Error),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] telemetry::Error),
    #[error("duplicate batch name {0}")]
    DuplicateBatch(String),
    #[error("no batch to simulate")]
    NoBatch,
}

//////////
// Live batch
////

pub struct LiveBatch {
    pub record: BatchRecord,
    temperature: JitterTelemetryGenerator,
    humidity: JitterTelemetryGenerator,
}

impl LiveBatch {
    pub fn from_template(template: &Batch) -> Result<Self, Error> {
        let record = BatchRecord::from_template(template)?;
        Ok(Self {
            temperature: JitterTelemetryGenerator::new(
                record.current_temp,
                TEMPERATURE_AMPLITUDE,
                DECIMALS,
            )?,
            humidity: JitterTelemetryGenerator::new(
                record.current_humidity,
                HUMIDITY_AMPLITUDE,
                DECIMALS,
            )?,
            record,
        })
    }

    fn step(&mut self, rng: &mut StdRng) {
        let temp = self.temperature.next_datapoint(rng);
        let humidity = self.humidity.next_datapoint(rng);
        self.record.record(temp, humidity);
    }
}

//////////
// Simulator
////

/// Random walk over a fixed set of batches. Keys never change after `new`.
pub struct BatchSimulator {
    batches: BTreeMap<String, LiveBatch>,
    rng: StdRng,
    ticks: u64,
}

impl BatchSimulator {
    pub fn new(templates: &[Batch]) -> Result<Self, Error> {
        Self::with_rng(templates, StdRng::from_entropy())
    }

    pub fn with_seed(templates: &[Batch], seed: u64) -> Result<Self, Error> {
        Self::with_rng(templates, StdRng::seed_from_u64(seed))
    }

    fn with_rng(templates: &[Batch], rng: StdRng) -> Result<Self, Error> {
        if templates.is_empty() {
            return Err(Error::NoBatch);
        }
        let mut batches = BTreeMap::new();
        for template in templates {
            let live = LiveBatch::from_template(template)?;
            if batches.insert(template.name.clone(), live).is_some() {
                return Err(Error::DuplicateBatch(template.name.clone()));
            }
        }
        Ok(Self {
            batches,
            rng,
            ticks: 0,
        })
    }

    /// Moves every batch one step. Batches are independent of each other.
    pub fn tick(&mut self) {
        for live in self.batches.values_mut() {
            live.step(&mut self.rng);
        }
        self.ticks += 1;
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn get(&self, name: &str) -> Option<&BatchRecord> {
        self.batches.get(name).map(|live| &live.record)
    }

    /// The named batch, or the first one when the name is unknown.
    pub fn selected(&self, name: Option<&str>) -> Option<&BatchRecord> {
        name.and_then(|n| self.get(n)).or_else(|| self.first())
    }

    pub fn first(&self) -> Option<&BatchRecord> {
        self.batches.values().next().map(|live| &live.record)
    }

    pub fn names(&self) -> Vec<String> {
        self.batches.keys().cloned().collect()
    }

    pub fn snapshot(&self) -> Vec<BatchRecord> {
        self.batches.values().map(|live| live.record.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{default_batches, HISTORY_LEN};
    use crate::telemetry::round_to;

    #[test]
    fn one_tick_shifts_the_window() {
        let mut seed = default_batches().remove(0);
        seed.current_temp = 2.0;
        let mut simulator = BatchSimulator::with_seed(&[seed], 1).unwrap();

        simulator.tick();

        let record = simulator.get("Batch #1234").unwrap();
        assert_eq!(record.temperature_data.len(), HISTORY_LEN);
        assert_eq!(record.temperature_data.first(), Some(&2.1));
        assert_eq!(
            record.temperature_data.last(),
            Some(&round_to(record.current_temp, 1))
        );
        assert!((record.current_temp - 2.0).abs() <= 0.1 + 1e-9);
    }

    #[test]
    fn windows_keep_their_length() {
        let mut simulator = BatchSimulator::with_seed(&default_batches(), 3).unwrap();
        for _ in 0..500 {
            for record in simulator.snapshot() {
                assert_eq!(record.temperature_data.len(), HISTORY_LEN);
                assert_eq!(record.humidity_data.len(), HISTORY_LEN);
            }
            simulator.tick();
        }
        assert_eq!(simulator.ticks(), 500);
    }

    #[test]
    fn current_values_match_latest_point() {
        let mut simulator = BatchSimulator::with_seed(&default_batches(), 11).unwrap();
        for _ in 0..20 {
            simulator.tick();
        }
        for record in simulator.snapshot() {
            assert_eq!(record.temperature_data.last(), Some(&record.current_temp));
            assert_eq!(record.humidity_data.last(), Some(&record.current_humidity));
            assert_eq!(record.current_humidity, round_to(record.current_humidity, 1));
        }
    }

    #[test]
    fn keys_are_stable() {
        let mut simulator = BatchSimulator::with_seed(&default_batches(), 5).unwrap();
        let before = simulator.names();
        simulator.tick();
        assert_eq!(simulator.names(), before);
        assert_eq!(before.len(), 3);
    }

    #[test]
    fn unknown_selection_falls_back_to_first() {
        let simulator = BatchSimulator::with_seed(&default_batches(), 5).unwrap();
        let name = |selection: Option<&'static str>| simulator.selected(selection).unwrap().name.clone();
        assert_eq!(name(Some("Batch #9999")), "Batch #1234");
        assert_eq!(name(Some("Batch #1236")), "Batch #1236");
        assert_eq!(name(None), "Batch #1234");
    }

    #[test]
    fn duplicates_and_empty_sets_are_rejected() {
        let twice = vec![default_batches().remove(0), default_batches().remove(0)];
        assert!(matches!(
            BatchSimulator::with_seed(&twice, 0),
            Err(Error::DuplicateBatch(_))
        ));
        assert!(matches!(
            BatchSimulator::with_seed(&[], 0),
            Err(Error::NoBatch)
        ));
    }
}
