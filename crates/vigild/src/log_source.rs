//! Log source adapter contract and implementations.
//!
//! The query engine only ever sees this contract: open a named log, read
//! batches of raw records in reverse chronological order, drop the cursor
//! to close. Production code uses `JsonlLogStore` over exported event
//! dumps; tests use `FakeLogSource` with pre-loaded records.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;
use vigil_shared::{Result, VigilError};

/// One raw record as delivered by the underlying store, before the engine
/// normalizes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    /// Raw numeric event-type code
    #[serde(rename = "type")]
    pub raw_type: u16,
    /// Full raw event id; the engine keeps the low 16 bits
    pub event_id: u32,
    pub source: String,
    pub host: String,
    pub timestamp: DateTime<Local>,
    /// String-insert fields, the message fallback when formatting failed
    #[serde(default)]
    pub inserts: Vec<String>,
    /// Best-effort formatted message
    #[serde(default)]
    pub message: Option<String>,
}

/// Cursor over one opened log. Dropping it closes the log.
pub trait LogCursor {
    /// Next batch in reverse chronological order; empty means end of log.
    fn read_batch(&mut self) -> Result<Vec<RawEvent>>;
}

/// A source of named logs.
pub trait LogSource: Send + Sync {
    fn open(&self, log_name: &str) -> Result<Box<dyn LogCursor + '_>>;
}

/// Serves exported event dumps: one `<LogName>.jsonl` file per log,
/// records stored oldest-first, one JSON object per line. Batches are
/// paged from the tail so the newest records come out first.
pub struct JsonlLogStore {
    directory: PathBuf,
    batch_size: usize,
}

impl JsonlLogStore {
    pub fn new(directory: impl Into<PathBuf>, batch_size: usize) -> Self {
        Self {
            directory: directory.into(),
            batch_size: batch_size.max(1),
        }
    }
}

impl LogSource for JsonlLogStore {
    fn open(&self, log_name: &str) -> Result<Box<dyn LogCursor + '_>> {
        let path = self.directory.join(format!("{}.jsonl", log_name));
        let raw = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => VigilError::AccessDenied(log_name.to_string()),
            ErrorKind::NotFound => {
                VigilError::LogRead(format!("log '{}' not found at {}", log_name, path.display()))
            }
            _ => VigilError::LogRead(format!("opening log '{}': {}", log_name, e)),
        })?;

        let mut records = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RawEvent>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    // A corrupt line loses one record, not the whole log
                    debug!("skipping malformed record at {}:{}: {}", path.display(), line_no + 1, e);
                }
            }
        }

        debug!("opened log '{}' with {} records", log_name, records.len());
        Ok(Box::new(TailCursor {
            records,
            remaining: usize::MAX,
            batch_size: self.batch_size,
        }))
    }
}

/// Pages a forward-ordered record vector backwards from the tail.
struct TailCursor {
    records: Vec<RawEvent>,
    /// Index one past the next record to serve (counting from the front)
    remaining: usize,
    batch_size: usize,
}

impl LogCursor for TailCursor {
    fn read_batch(&mut self) -> Result<Vec<RawEvent>> {
        if self.remaining == usize::MAX {
            self.remaining = self.records.len();
        }
        if self.remaining == 0 {
            return Ok(Vec::new());
        }
        let take = self.batch_size.min(self.remaining);
        let start = self.remaining - take;
        let batch: Vec<RawEvent> = self.records[start..self.remaining]
            .iter()
            .rev()
            .cloned()
            .collect();
        self.remaining = start;
        Ok(batch)
    }
}

/// In-memory source for tests: records are supplied newest-first, exactly
/// as the adapter contract delivers them.
pub struct FakeLogSource {
    log_name: String,
    records: Vec<RawEvent>,
    batch_size: usize,
    /// When set, `open` fails with AccessDenied
    deny_access: bool,
}

impl FakeLogSource {
    pub fn new(log_name: impl Into<String>, records: Vec<RawEvent>) -> Self {
        Self {
            log_name: log_name.into(),
            records,
            batch_size: 16,
            deny_access: false,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn denying_access(mut self) -> Self {
        self.deny_access = true;
        self
    }
}

impl LogSource for FakeLogSource {
    fn open(&self, log_name: &str) -> Result<Box<dyn LogCursor + '_>> {
        if self.deny_access {
            return Err(VigilError::AccessDenied(log_name.to_string()));
        }
        if log_name != self.log_name {
            return Err(VigilError::LogRead(format!("log '{}' not found", log_name)));
        }
        Ok(Box::new(ForwardCursor {
            records: self.records.clone(),
            pos: 0,
            batch_size: self.batch_size,
        }))
    }
}

struct ForwardCursor {
    records: Vec<RawEvent>,
    pos: usize,
    batch_size: usize,
}

impl LogCursor for ForwardCursor {
    fn read_batch(&mut self) -> Result<Vec<RawEvent>> {
        if self.pos >= self.records.len() {
            return Ok(Vec::new());
        }
        let end = (self.pos + self.batch_size).min(self.records.len());
        let batch = self.records[self.pos..end].to_vec();
        self.pos = end;
        Ok(batch)
    }
}
