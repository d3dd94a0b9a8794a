use serde::{Deserialize, Serialize};

/// Event name of the position feed between tracker and subscribers.
pub const LOCATION_UPDATE_EVENT: &str = "locationUpdate";

/// A synthetic GPS fix. On the wire the fields are `lat` / `lng`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Position {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lng")]
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Named event frame, `{"event": "...", "data": ...}`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Envelope<T> {
    pub event: String,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn new(event: &str, data: T) -> Self {
        Self {
            event: event.to_string(),
            data,
        }
    }
}
