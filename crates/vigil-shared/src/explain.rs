//! Per-event explanation model with process-lifetime memoization.

use crate::event::{EventRecord, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Structured explanation of a single event, as produced by the reasoning
/// service (or the deterministic fallback when the service fails).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub title: String,
    /// One plain-English sentence
    pub simple: String,
    pub detail: String,
    /// "info", "warning" or "error"
    pub severity: String,
    pub action: String,
    pub technical: String,
    pub impact: String,
    pub prevention: String,
    pub icon: String,
}

impl Explanation {
    /// Deterministic explanation used when the reasoning service is
    /// unreachable or returns garbage. Keeps the event browser usable.
    pub fn fallback(record: &EventRecord) -> Self {
        let icon = match record.severity {
            Severity::Error | Severity::AuditFailure => "❌",
            Severity::Warning => "⚠️",
            _ => "ℹ️",
        };
        let detail = if record.message.is_empty() {
            "A system event occurred.".to_string()
        } else {
            record.message.chars().take(300).collect()
        };
        Self {
            title: format!("{} {} Event", icon, record.source),
            simple: format!(
                "{} generated a {} event",
                record.source,
                record.severity.to_string().to_lowercase()
            ),
            detail,
            severity: match record.severity {
                Severity::Error | Severity::AuditFailure => "error".to_string(),
                Severity::Warning => "warning".to_string(),
                _ => "info".to_string(),
            },
            action: "Review the event details and monitor for recurring patterns.".to_string(),
            technical: format!("Event triggered by the {} component.", record.source),
            impact: "Minimal impact on system performance.".to_string(),
            prevention: "Keep your system updated and monitor regularly.".to_string(),
            icon: icon.to_string(),
        }
    }
}

/// Memoized explanations, keyed on a truncated message so near-identical
/// events share one entry. Unbounded, but the truncated key bounds
/// cardinality in practice.
#[derive(Debug, Default)]
pub struct ExplanationCache {
    entries: HashMap<String, Explanation>,
}

impl ExplanationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key: (event id, severity, source, first 50 chars of message).
    pub fn key_for(record: &EventRecord) -> String {
        let prefix: String = record.message.chars().take(50).collect();
        format!(
            "{}_{}_{}_{}",
            record.event_id, record.severity, record.source, prefix
        )
    }

    pub fn get(&self, record: &EventRecord) -> Option<&Explanation> {
        self.entries.get(&Self::key_for(record))
    }

    pub fn insert(&mut self, record: &EventRecord, explanation: Explanation) {
        self.entries.insert(Self::key_for(record), explanation);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn record(id: u32, message: &str) -> EventRecord {
        EventRecord {
            source: "volsnap".to_string(),
            event_id: id,
            severity: Severity::Warning,
            timestamp: Local::now(),
            host: "desk".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_key_truncates_message() {
        let long = "x".repeat(200);
        let a = record(36, &long);
        let b = record(36, &format!("{}{}", long, "different tail"));
        assert_eq!(ExplanationCache::key_for(&a), ExplanationCache::key_for(&b));
    }

    #[test]
    fn test_cache_round_trip() {
        let mut cache = ExplanationCache::new();
        let rec = record(36, "The shadow copies were deleted");
        assert!(cache.get(&rec).is_none());
        cache.insert(&rec, Explanation::fallback(&rec));
        assert!(cache.get(&rec).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_fallback_severity_mapping() {
        let mut rec = record(1000, "app crashed");
        rec.severity = Severity::Error;
        let exp = Explanation::fallback(&rec);
        assert_eq!(exp.severity, "error");
        assert_eq!(exp.icon, "❌");
    }
}
