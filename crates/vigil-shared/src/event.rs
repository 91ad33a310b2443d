//! Normalized event records and query filters.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Severity classified from the raw event-type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Information,
    AuditSuccess,
    AuditFailure,
    Unknown,
}

impl Severity {
    /// Classify from the raw numeric type code carried by the log store.
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0x0001 => Severity::Error,
            0x0002 => Severity::Warning,
            0x0004 => Severity::Information,
            0x0008 => Severity::AuditSuccess,
            0x0010 => Severity::AuditFailure,
            _ => Severity::Unknown,
        }
    }

    /// Parse the display label back into a severity. Used when the
    /// reasoning service hands severities back as strings.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "Error" => Severity::Error,
            "Warning" => Severity::Warning,
            "Information" => Severity::Information,
            "Audit Success" => Severity::AuditSuccess,
            "Audit Failure" => Severity::AuditFailure,
            _ => Severity::Unknown,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "Error"),
            Severity::Warning => write!(f, "Warning"),
            Severity::Information => write!(f, "Information"),
            Severity::AuditSuccess => write!(f, "Audit Success"),
            Severity::AuditFailure => write!(f, "Audit Failure"),
            Severity::Unknown => write!(f, "Unknown"),
        }
    }
}

/// One normalized entry from an OS event log. Immutable once produced by
/// the query engine; handed by value to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Component that emitted the event
    pub source: String,
    /// Low 16 bits of the raw event id
    pub event_id: u32,
    pub severity: Severity,
    pub timestamp: DateTime<Local>,
    /// Machine the event was recorded on
    pub host: String,
    /// Best-effort resolved message text
    pub message: String,
}

/// Fully-specified query against one named log. Constructed per query,
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryFilter {
    pub log_name: String,
    /// Number of accepted records after which the scan stops. Always > 0.
    pub max_records: usize,
    pub start_time: Option<DateTime<Local>>,
    pub end_time: Option<DateTime<Local>>,
    /// Drop records from noisy housekeeping sources
    pub hide_common_sources: bool,
    /// Accept a record when any keyword matches message or source
    /// (case-insensitive substring) or equals the decimal event id
    pub keywords: Vec<String>,
    /// When set, only these severities are accepted
    pub severity_whitelist: Option<Vec<Severity>>,
}

impl QueryFilter {
    pub fn new(log_name: impl Into<String>, max_records: usize) -> Self {
        Self {
            log_name: log_name.into(),
            max_records: max_records.max(1),
            start_time: None,
            end_time: None,
            hide_common_sources: false,
            keywords: Vec::new(),
            severity_whitelist: None,
        }
    }

    pub fn between(mut self, start: Option<DateTime<Local>>, end: Option<DateTime<Local>>) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    pub fn hiding_common_sources(mut self, hide: bool) -> Self {
        self.hide_common_sources = hide;
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_severities(mut self, severities: Option<Vec<Severity>>) -> Self {
        self.severity_whitelist = severities;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_from_raw_codes() {
        assert_eq!(Severity::from_raw(0x0001), Severity::Error);
        assert_eq!(Severity::from_raw(0x0002), Severity::Warning);
        assert_eq!(Severity::from_raw(0x0004), Severity::Information);
        assert_eq!(Severity::from_raw(0x0008), Severity::AuditSuccess);
        assert_eq!(Severity::from_raw(0x0010), Severity::AuditFailure);
        assert_eq!(Severity::from_raw(0x0040), Severity::Unknown);
    }

    #[test]
    fn test_severity_label_round_trip() {
        for sev in [
            Severity::Error,
            Severity::Warning,
            Severity::Information,
            Severity::AuditSuccess,
            Severity::AuditFailure,
        ] {
            assert_eq!(Severity::from_label(&sev.to_string()), sev);
        }
    }

    #[test]
    fn test_filter_builder_clamps_max_records() {
        let filter = QueryFilter::new("System", 0);
        assert_eq!(filter.max_records, 1);
    }
}
