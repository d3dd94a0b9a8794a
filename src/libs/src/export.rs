use std::fs;
use std::path::PathBuf;

use log::info;
use serde::Serialize;
use thiserror::Error as ThisError;

use crate::models::BatchRecord;

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const APPLICATION_JSON: &str = "application/json";
pub const TRACE_EXPORT_FILENAME: &str = "trace_data.json";

#[derive(ThisError, Debug)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid file name {0:?}")]
    InvalidFileName(String),
}

/// A document ready to be handed to whatever saves files for the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub filename: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Export {
    pub fn text(filename: String, body: String) -> Self {
        Self {
            filename,
            content_type: TEXT_PLAIN,
            body: body.into_bytes(),
        }
    }

    /// Pretty-printed JSON.
    pub fn json<T: Serialize>(filename: String, payload: &T) -> Result<Self, ExportError> {
        Ok(Self {
            filename,
            content_type: APPLICATION_JSON,
            body: serde_json::to_vec_pretty(payload)?,
        })
    }
}

/// "Save as file" capability.
pub trait SaveAs {
    fn save(&self, export: &Export) -> Result<PathBuf, ExportError>;
}

/// Saves exports into a directory on the local disk.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    pub dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl SaveAs for DirectorySink {
    fn save(&self, export: &Export) -> Result<PathBuf, ExportError> {
        let name = export.filename.trim();
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\'])
        {
            return Err(ExportError::InvalidFileName(export.filename.clone()));
        }
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        fs::write(&path, &export.body)?;
        info!("saved {} ({} bytes)", path.display(), export.body.len());
        Ok(path)
    }
}

//////////
// Batch report
////

pub fn batch_report_filename(name: &str) -> String {
    format!("{}_report.txt", name)
}

pub fn render_batch_report(name: &str, batch: &BatchRecord) -> String {
    format!(
        "Batch Report for {}\n\
         Current Temperature: {}°C\n\
         Current Humidity: {}%\n\
         Optimal Temperature: {}°C\n\
         Active Alerts: {}\n\
         Batches: {}\n\
         Uptime: {}",
        name,
        batch.current_temp,
        batch.current_humidity,
        batch.optimal_temp,
        batch.alerts,
        batch.batch_count,
        batch.uptime
    )
}

pub fn batch_report(name: &str, batch: &BatchRecord) -> Export {
    Export::text(batch_report_filename(name), render_batch_report(name, batch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::default_batches;

    fn record() -> BatchRecord {
        BatchRecord::from_template(&default_batches()[0]).unwrap()
    }

    #[test]
    fn report_lines() {
        let report = render_batch_report("Batch #1234", &record());
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Batch Report for Batch #1234",
                "Current Temperature: 2.4°C",
                "Current Humidity: 85%",
                "Optimal Temperature: 2°C",
                "Active Alerts: 2",
                "Batches: 12",
                "Uptime: 99.9%",
            ]
        );
    }

    #[test]
    fn report_export_metadata() {
        let export = batch_report("Batch #1234", &record());
        assert_eq!(export.filename, "Batch #1234_report.txt");
        assert_eq!(export.content_type, TEXT_PLAIN);
    }

    #[test]
    fn json_export_is_pretty() {
        let export = Export::json(TRACE_EXPORT_FILENAME.to_string(), &vec![1, 2]).unwrap();
        assert_eq!(String::from_utf8(export.body).unwrap(), "[\n  1,\n  2\n]");
    }

    #[test]
    fn directory_sink_writes_and_refuses_paths() {
        let dir = std::env::temp_dir().join(format!("libs-export-{}", std::process::id()));
        let sink = DirectorySink::new(dir.clone());

        let path = sink
            .save(&Export::text("report.txt".to_string(), "hello".to_string()))
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");

        let escape = Export::text("../report.txt".to_string(), "nope".to_string());
        assert!(matches!(
            sink.save(&escape),
            Err(ExportError::InvalidFileName(_))
        ));
        fs::remove_dir_all(dir).unwrap();
    }
}
