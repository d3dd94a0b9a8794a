use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

pub const TEMPERATURE_RANGE: RangeInclusive<f64> = -20.0..=50.0;
pub const HUMIDITY_RANGE: RangeInclusive<f64> = 0.0..=100.0;

const BATCH_ID_REQUIRED: &str = "Batch ID is required";
const TEMPERATURE_OUT_OF_RANGE: &str = "Temperature must be between -20°C and 50°C";
const HUMIDITY_OUT_OF_RANGE: &str = "Humidity must be between 0% and 100%";

/// Field name -> message, using the form's field names.
pub type FieldErrors = BTreeMap<&'static str, String>;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentKind {
    #[default]
    Storage,
    Transit,
}

/// Batch control form as submitted; numbers arrive as raw text.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ControlForm {
    pub batch_id: String,
    pub temperature: String,
    pub humidity: String,
    pub environment: EnvironmentKind,
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchSettings {
    pub batch_id: String,
    pub temperature: f64,
    pub humidity: f64,
    pub environment: EnvironmentKind,
    pub status: String,
}

/// Single value sent by the override / adjust quick actions.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct OverrideRequest {
    pub value: String,
}

fn parse_in_range(raw: &str, range: &RangeInclusive<f64>) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && range.contains(v))
}

pub fn validate_temperature(raw: &str) -> Result<f64, String> {
    parse_in_range(raw, &TEMPERATURE_RANGE).ok_or_else(|| TEMPERATURE_OUT_OF_RANGE.to_string())
}

pub fn validate_humidity(raw: &str) -> Result<f64, String> {
    parse_in_range(raw, &HUMIDITY_RANGE).ok_or_else(|| HUMIDITY_OUT_OF_RANGE.to_string())
}

impl ControlForm {
    /// Checks every field and reports all failures at once.
    pub fn validate(&self) -> Result<BatchSettings, FieldErrors> {
        let mut errors = FieldErrors::new();

        let batch_id = self.batch_id.trim();
        if batch_id.is_empty() {
            errors.insert("batchId", BATCH_ID_REQUIRED.to_string());
        }
        let temperature = match validate_temperature(&self.temperature) {
            Ok(v) => Some(v),
            Err(e) => {
                errors.insert("temperature", e);
                None
            }
        };
        let humidity = match validate_humidity(&self.humidity) {
            Ok(v) => Some(v),
            Err(e) => {
                errors.insert("humidity", e);
                None
            }
        };

        match (temperature, humidity) {
            (Some(temperature), Some(humidity)) if errors.is_empty() => Ok(BatchSettings {
                batch_id: batch_id.to_string(),
                temperature,
                humidity,
                environment: self.environment,
                status: self.status.clone().unwrap_or_else(|| "active".to_string()),
            }),
            _ => Err(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(batch_id: &str, temperature: &str, humidity: &str) -> ControlForm {
        ControlForm {
            batch_id: batch_id.to_string(),
            temperature: temperature.to_string(),
            humidity: humidity.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn temperature_sixty_is_rejected() {
        let errors = form("B1234", "60", "50").validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.get("temperature").map(String::as_str),
            Some("Temperature must be between -20°C and 50°C")
        );
    }

    #[test]
    fn valid_form_passes() {
        let settings = form(" B1234 ", "-20", "100").validate().unwrap();
        assert_eq!(settings.batch_id, "B1234");
        assert_eq!(settings.temperature, -20.0);
        assert_eq!(settings.humidity, 100.0);
        assert_eq!(settings.environment, EnvironmentKind::Storage);
        assert_eq!(settings.status, "active");
    }

    #[test]
    fn every_field_is_reported() {
        let errors = form("", "", "101").validate().unwrap_err();
        let fields: Vec<&str> = errors.keys().copied().collect();
        assert_eq!(fields, vec!["batchId", "humidity", "temperature"]);
        assert_eq!(errors["batchId"], "Batch ID is required");
        assert_eq!(errors["humidity"], "Humidity must be between 0% and 100%");
    }

    #[test]
    fn garbage_numbers_are_rejected() {
        assert!(validate_temperature("abc").is_err());
        assert!(validate_temperature("NaN").is_err());
        assert!(validate_humidity("inf").is_err());
        assert_eq!(validate_humidity(" 42.5 "), Ok(42.5));
    }

    #[test]
    fn form_deserializes_from_camel_case() {
        let form: ControlForm = serde_json::from_str(
            r#"{"batchId":"B1","temperature":"4","humidity":"60","environment":"transit"}"#,
        )
        .unwrap();
        let settings = form.validate().unwrap();
        assert_eq!(settings.environment, EnvironmentKind::Transit);
    }
}
