use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error as ThisError;

use crate::models::{Envelope, Position, LOCATION_UPDATE_EVENT};

/// Callback registered by a subscriber; the publisher invokes it once per tick.
pub type PositionHandler = Arc<dyn Fn(Position) + Send + Sync>;

#[derive(ThisError, Debug)]
pub enum FeedError {
    #[error("serde json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn encode_location_update(position: &Position) -> Result<String, FeedError> {
    Ok(serde_json::to_string(&Envelope::new(
        LOCATION_UPDATE_EVENT,
        position,
    ))?)
}

/// Decodes one text frame. Frames for other events give `Ok(None)`.
pub fn decode_location_update(frame: &str) -> Result<Option<Position>, FeedError> {
    let envelope: Envelope<Value> = serde_json::from_str(frame)?;
    if envelope.event != LOCATION_UPDATE_EVENT {
        return Ok(None);
    }
    Ok(Some(Position::deserialize(envelope.data)?))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub label: String,
    pub position: Position,
}

/// Positions in arrival order. Unbounded unless built with a capacity, in
/// which case it keeps the most recent `capacity` entries.
#[derive(Debug, Clone, Default)]
pub struct PositionHistory {
    entries: VecDeque<Position>,
    capacity: Option<usize>,
    received: usize,
}

impl PositionHistory {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn bounded(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: Some(capacity),
            received: 0,
        }
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        match capacity {
            Some(capacity) => Self::bounded(capacity),
            None => Self::unbounded(),
        }
    }

    pub fn push(&mut self, position: Position) {
        self.received += 1;
        if let Some(capacity) = self.capacity {
            if capacity == 0 {
                return;
            }
            if self.entries.len() == capacity {
                self.entries.pop_front();
            }
        }
        self.entries.push_back(position);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total positions seen, including the ones a bounded history let go.
    pub fn received(&self) -> usize {
        self.received
    }

    pub fn positions(&self) -> Vec<Position> {
        self.entries.iter().copied().collect()
    }

    pub fn last(&self) -> Option<&Position> {
        self.entries.back()
    }

    /// One marker per entry, labelled with its 1-based sequence number.
    pub fn markers(&self) -> Vec<Marker> {
        let first = self.received - self.entries.len();
        self.entries
            .iter()
            .enumerate()
            .map(|(i, position)| Marker {
                label: format!("Location {}", first + i + 1),
                position: *position,
            })
            .collect()
    }
}

/// Subscriber side of the position feed. Clones share the same history.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    history: Arc<Mutex<PositionHistory>>,
}

impl Aggregator {
    pub fn new(history: PositionHistory) -> Self {
        Self {
            history: Arc::new(Mutex::new(history)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PositionHistory> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn receive(&self, position: Position) {
        self.lock().push(position);
    }

    /// Handler to register with a publisher.
    pub fn handler(&self) -> PositionHandler {
        let aggregator = self.clone();
        Arc::new(move |position| aggregator.receive(position))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn received(&self) -> usize {
        self.lock().received()
    }

    pub fn positions(&self) -> Vec<Position> {
        self.lock().positions()
    }

    pub fn markers(&self) -> Vec<Marker> {
        self.lock().markers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(n: usize) -> Vec<Position> {
        (0..n)
            .map(|i| Position::new(51.505 + i as f64 * 0.0001, -0.09 + i as f64 * 0.0001))
            .collect()
    }

    #[test]
    fn history_keeps_order_for_any_length() {
        for n in [0, 1, 2, 17, 250] {
            let aggregator = Aggregator::default();
            let handler = aggregator.handler();
            let expected = sample(n);
            for p in &expected {
                handler(*p);
            }
            assert_eq!(aggregator.len(), n);
            assert_eq!(aggregator.positions(), expected);
        }
    }

    #[test]
    fn duplicates_are_kept() {
        let mut history = PositionHistory::unbounded();
        let p = Position::new(51.51, -0.085);
        history.push(p);
        history.push(p);
        assert_eq!(history.positions(), vec![p, p]);
    }

    #[test]
    fn bounded_history_keeps_latest() {
        let mut history = PositionHistory::bounded(3);
        for p in sample(5) {
            history.push(p);
        }
        assert_eq!(history.positions(), sample(5)[2..].to_vec());
        assert_eq!(history.received(), 5);
        let labels: Vec<String> = history.markers().into_iter().map(|m| m.label).collect();
        assert_eq!(labels, vec!["Location 3", "Location 4", "Location 5"]);
    }

    #[test]
    fn markers_are_one_based() {
        let mut history = PositionHistory::unbounded();
        for p in sample(2) {
            history.push(p);
        }
        let markers = history.markers();
        assert_eq!(markers[0].label, "Location 1");
        assert_eq!(markers[1].label, "Location 2");
        assert_eq!(markers[1].position, sample(2)[1]);
    }

    #[test]
    fn frames_round_trip_through_the_channel() {
        let p = Position::new(51.5071, -0.0853);
        let frame = encode_location_update(&p).unwrap();
        assert_eq!(decode_location_update(&frame).unwrap(), Some(p));
    }

    #[test]
    fn other_events_are_ignored() {
        let frame = r#"{"event":"batchUpdate","data":{"name":"Batch #1234"}}"#;
        assert_eq!(decode_location_update(frame).unwrap(), None);
        assert!(decode_location_update("not json").is_err());
        assert!(decode_location_update(r#"{"event":"locationUpdate","data":{}}"#).is_err());
    }
}
