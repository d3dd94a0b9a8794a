use std::collections::{vec_deque, VecDeque};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fixed-length sliding window. The length is set by the seed values and
/// every `push` drops the oldest element, so it never changes afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring<T> {
    values: VecDeque<T>,
}

impl<T> Ring<T> {
    pub fn seeded<I: IntoIterator<Item = T>>(values: I) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    /// Appends `value` and returns the element that fell out of the window.
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.values.is_empty() {
            return Some(value);
        }
        let oldest = self.values.pop_front();
        self.values.push_back(value);
        oldest
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first(&self) -> Option<&T> {
        self.values.front()
    }

    pub fn last(&self) -> Option<&T> {
        self.values.back()
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, T> {
        self.values.iter()
    }
}

impl<T: Clone> Ring<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.values.iter().cloned().collect()
    }
}

impl<T: Serialize> Serialize for Ring<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.values.iter())
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Ring<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<T>::deserialize(deserializer).map(Ring::seeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_slides_the_window() {
        let mut ring = Ring::seeded([1, 2, 3]);
        assert_eq!(ring.push(4), Some(1));
        assert_eq!(ring.to_vec(), vec![2, 3, 4]);
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn empty_ring_stays_empty() {
        let mut ring: Ring<f64> = Ring::seeded([]);
        assert_eq!(ring.push(1.0), Some(1.0));
        assert!(ring.is_empty());
    }

    #[test]
    fn serializes_as_plain_array() {
        let ring = Ring::seeded([80.0, 82.5]);
        assert_eq!(serde_json::to_string(&ring).unwrap(), "[80.0,82.5]");
        let back: Ring<f64> = serde_json::from_str("[1.0,2.0,3.0]").unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(back.last(), Some(&3.0));
    }
}
