//! Audit trail: batch timeline events and ledger records.
//!
//! Both come from a [`Ledger`], which only knows how to return records
//! matching a [`TraceFilter`] in order. [`MockLedger`] serves the demo set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use libs::export::{Export, ExportError, TRACE_EXPORT_FILENAME};
pub const ALL_STATUS: &str = "All Status";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TimelineEvent {
    pub id: String,
    pub date: String,
    pub event: String,
    pub description: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LedgerRecord {
    pub id: String,
    pub hash: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub details: BTreeMap<String, String>,
}

/// Query string of the trace view.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TraceFilter {
    pub q: String,
    pub status: Option<String>,
}

impl TraceFilter {
    fn matches(&self, text: &str, status: &str) -> bool {
        let matches_search = text.to_lowercase().contains(&self.q.to_lowercase());
        let matches_status = match self.status.as_deref().map(str::trim) {
            None | Some("") | Some(ALL_STATUS) => true,
            Some(wanted) => status.eq_ignore_ascii_case(wanted),
        };
        matches_search && matches_status
    }

    pub fn matches_event(&self, event: &TimelineEvent) -> bool {
        self.matches(&event.event, &event.status)
    }

    pub fn matches_record(&self, record: &LedgerRecord) -> bool {
        self.matches(&record.kind, &record.status)
    }
}

/// Shape of the exported file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TraceData {
    pub timeline: Vec<TimelineEvent>,
    pub blockchain_records: Vec<LedgerRecord>,
}

impl TraceData {
    pub fn export(&self) -> Result<Export, ExportError> {
        Export::json(TRACE_EXPORT_FILENAME.to_string(), self)
    }
}

pub trait Ledger: Send + Sync {
    fn timeline(&self, filter: &TraceFilter) -> Vec<TimelineEvent>;
    fn records(&self, filter: &TraceFilter) -> Vec<LedgerRecord>;

    fn lookup(&self, filter: &TraceFilter) -> TraceData {
        TraceData {
            timeline: self.timeline(filter),
            blockchain_records: self.records(filter),
        }
    }
}

//////////
// Mock ledger
////

#[derive(Debug, Clone)]
pub struct MockLedger {
    timeline: Vec<TimelineEvent>,
    records: Vec<LedgerRecord>,
}

impl Ledger for MockLedger {
    fn timeline(&self, filter: &TraceFilter) -> Vec<TimelineEvent> {
        self.timeline
            .iter()
            .filter(|e| filter.matches_event(e))
            .cloned()
            .collect()
    }

    fn records(&self, filter: &TraceFilter) -> Vec<LedgerRecord> {
        self.records
            .iter()
            .filter(|r| filter.matches_record(r))
            .cloned()
            .collect()
    }
}

fn event(id: &str, date: &str, event: &str, description: &str, status: &str) -> TimelineEvent {
    TimelineEvent {
        id: id.to_string(),
        date: date.to_string(),
        event: event.to_string(),
        description: description.to_string(),
        status: status.to_string(),
    }
}

fn record(id: &str, hash: &str, timestamp: &str, kind: &str, details: &[(&str, &str)]) -> LedgerRecord {
    LedgerRecord {
        id: id.to_string(),
        hash: hash.to_string(),
        timestamp: timestamp.to_string(),
        kind: kind.to_string(),
        status: "Verified".to_string(),
        details: details
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self {
            timeline: vec![
                event(
                    "1",
                    "2024-03-15 14:30",
                    "Temperature Alert",
                    "Temperature exceeded threshold by 0.5°C",
                    "warning",
                ),
                event(
                    "2",
                    "2024-03-15 12:00",
                    "Location Update",
                    "Batch arrived at Warehouse B",
                    "info",
                ),
                event(
                    "3",
                    "2024-03-15 08:15",
                    "Status Change",
                    "Batch status changed to In Transit",
                    "success",
                ),
            ],
            records: vec![
                record(
                    "1",
                    "0x8f2e...3b4d",
                    "2024-03-15 14:35:22",
                    "Temperature Log",
                    &[
                        ("temperature", "2.5°C"),
                        ("location", "Warehouse A"),
                        ("batchId", "B1234"),
                    ],
                ),
                record(
                    "2",
                    "0x7d1c...9e2f",
                    "2024-03-15 14:30:15",
                    "Location Update",
                    &[("location", "Warehouse B"), ("batchId", "B1234")],
                ),
                record(
                    "3",
                    "0x6b3a...5c8e",
                    "2024-03-15 14:25:08",
                    "Humidity Log",
                    &[("humidity", "85%"), ("batchId", "B1234")],
                ),
            ],
        }
    }
}
