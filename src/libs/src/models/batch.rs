use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

use super::ring::Ring;

/// Number of points kept in each batch history window.
pub const HISTORY_LEN: usize = 7;

#[derive(ThisError, Debug, PartialEq)]
pub enum Error {
    #[error("batch {name}: {series} history has {len} points, expected {}", HISTORY_LEN)]
    HistoryLength {
        name: String,
        series: &'static str,
        len: usize,
    },
    #[error("batch name can't be empty")]
    EmptyName,
}

/// Seed of a simulated batch, as written in the config file.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Batch {
    pub name: String,
    pub current_temp: f64,
    pub current_humidity: f64,
    pub optimal_temp: f64,
    pub alerts: u32,
    pub batch_count: u32,
    pub uptime: String,
    pub temperature_data: Vec<f64>,
    pub humidity_data: Vec<f64>,
}

/// Live state of one batch, mutated in place by the simulator.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchRecord {
    pub name: String,
    pub current_temp: f64,
    pub current_humidity: f64,
    pub optimal_temp: f64,
    pub temperature_data: Ring<f64>,
    pub humidity_data: Ring<f64>,
    pub alerts: u32,
    pub batch_count: u32,
    pub uptime: String,
}

impl BatchRecord {
    pub fn from_template(template: &Batch) -> Result<Self, Error> {
        if template.name.trim().is_empty() {
            return Err(Error::EmptyName);
        }
        check_history(&template.name, "temperature", &template.temperature_data)?;
        check_history(&template.name, "humidity", &template.humidity_data)?;

        Ok(Self {
            name: template.name.clone(),
            current_temp: template.current_temp,
            current_humidity: template.current_humidity,
            optimal_temp: template.optimal_temp,
            temperature_data: Ring::seeded(template.temperature_data.iter().copied()),
            humidity_data: Ring::seeded(template.humidity_data.iter().copied()),
            alerts: template.alerts,
            batch_count: template.batch_count,
            uptime: template.uptime.clone(),
        })
    }

    /// Records a new reading: current values are replaced and both windows slide.
    pub fn record(&mut self, temp: f64, humidity: f64) {
        self.current_temp = temp;
        self.current_humidity = humidity;
        self.temperature_data.push(temp);
        self.humidity_data.push(humidity);
    }
}

fn check_history(name: &str, series: &'static str, data: &[f64]) -> Result<(), Error> {
    if data.len() != HISTORY_LEN {
        return Err(Error::HistoryLength {
            name: name.to_string(),
            series,
            len: data.len(),
        });
    }
    Ok(())
}

/// The three demo batches shown when the config does not list any.
pub fn default_batches() -> Vec<Batch> {
    vec![
        Batch {
            name: "Batch #1234".to_string(),
            current_temp: 2.4,
            current_humidity: 85.0,
            optimal_temp: 2.0,
            alerts: 2,
            batch_count: 12,
            uptime: "99.9%".to_string(),
            temperature_data: vec![2.0, 2.1, 2.3, 2.4, 2.2, 2.1, 2.0],
            humidity_data: vec![80.0, 82.0, 85.0, 84.0, 83.0, 81.0, 80.0],
        },
        Batch {
            name: "Batch #1235".to_string(),
            current_temp: 3.0,
            current_humidity: 75.0,
            optimal_temp: 2.5,
            alerts: 1,
            batch_count: 10,
            uptime: "98.5%".to_string(),
            temperature_data: vec![2.5, 2.6, 2.8, 3.0, 2.9, 2.7, 2.6],
            humidity_data: vec![70.0, 72.0, 75.0, 74.0, 73.0, 71.0, 70.0],
        },
        Batch {
            name: "Batch #1236".to_string(),
            current_temp: 1.8,
            current_humidity: 90.0,
            optimal_temp: 2.0,
            alerts: 3,
            batch_count: 15,
            uptime: "99.0%".to_string(),
            temperature_data: vec![1.8, 1.9, 2.0, 2.1, 2.0, 1.9, 1.8],
            humidity_data: vec![85.0, 86.0, 90.0, 89.0, 88.0, 87.0, 85.0],
        },
    ]
}
