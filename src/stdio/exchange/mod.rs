
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::Result;

/// Everything captured from one stdio probe run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRecord {
    pub timestamp: DateTime<Utc>,
    pub uml_input: String,
    pub stdout_raw: String,
    pub stderr_raw: String,
    pub stdout_parsed: Vec<Value>,
}

impl ExchangeRecord {
    /// Build a record stamped with the current time, parsing `stdout_raw` line by line.
    #[inline]
    pub fn new(uml_input: String, stdout_raw: String, stderr_raw: String) -> Self {
        let stdout_parsed = parse_json_lines(&stdout_raw);
        Self {
            timestamp: Utc::now(),
            uml_input,
            stdout_raw,
            stderr_raw,
            stdout_parsed,
        }
    }

    /// Write the record as a single pretty-printed JSON document, replacing any existing file.
    #[inline]
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        debug!("Wrote exchange record to {}", path.display());
        Ok(())
    }
}

/// Parse each line on its own, keeping arrival order and dropping lines that are not JSON.
#[inline]
pub fn parse_json_lines(raw: &str) -> Vec<Value> {
    raw.lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect()
}
