//! Event query engine.
//!
//! Backward scan over a named log with filter and early-termination
//! heuristics. The adapter delivers records most-recent-first and the
//! engine never reorders, so the output preserves reverse-chronological
//! order; "most recent = first element" holds for every caller.

use crate::config::EngineConfig;
use crate::log_source::{LogSource, RawEvent};
use tracing::{debug, info};
use vigil_shared::{EventRecord, QueryFilter, Result, Severity};

/// Placeholder when neither message formatting nor string inserts are
/// available.
const NO_DESCRIPTION: &str = "No description available";

/// Housekeeping sources hidden by `hide_common_sources`. Matched
/// case-insensitively as substrings.
const NOISE_SOURCES: &[&str] = &[
    "BITS",
    "gpsvc",
    "Microsoft-Windows-GroupPolicy",
    "Microsoft-Windows-Bits-Client",
    "DCOM",
    "DistributedCOM",
    "USER32",
    "DeviceSetupManager",
    "WinMgmt",
    "Microsoft-Windows-Time-Service",
    "Service Control Manager",
    "Kernel-Power",
    "Kernel-General",
];

pub struct EventQueryEngine {
    /// How many records may predate the start time before the scan stops
    backward_skip_threshold: usize,
    /// Absolute cap on records scanned per query
    scan_ceiling: usize,
}

impl EventQueryEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            backward_skip_threshold: config.backward_skip_threshold,
            scan_ceiling: config.scan_ceiling,
        }
    }

    /// Run one query. Fails with `AccessDenied` when the log cannot be
    /// opened with sufficient privilege and `LogRead` on any other
    /// adapter failure.
    pub fn query(&self, source: &dyn LogSource, filter: &QueryFilter) -> Result<Vec<EventRecord>> {
        let mut cursor = source.open(&filter.log_name)?;

        info!(
            "scanning log '{}' backwards (max {} matches, keywords {:?})",
            filter.log_name, filter.max_records, filter.keywords
        );

        let mut accepted: Vec<EventRecord> = Vec::new();
        let mut scanned: usize = 0;
        let mut stop = false;

        while !stop {
            let batch = cursor.read_batch()?;
            if batch.is_empty() {
                debug!("end of log after scanning {} records", scanned);
                break;
            }

            for raw in batch {
                scanned += 1;
                if scanned > self.scan_ceiling {
                    info!("scan ceiling of {} hit, stopping", self.scan_ceiling);
                    stop = true;
                    break;
                }
                if accepted.len() >= filter.max_records {
                    stop = true;
                    break;
                }

                // Newer than the window: skip without ending the scan,
                // older records are still ahead of us.
                if let Some(end) = filter.end_time {
                    if raw.timestamp > end {
                        continue;
                    }
                }

                // Older than the window: tolerate a few out-of-order
                // records near the boundary, then assume the rest of the
                // log is behind the window and stop.
                if let Some(start) = filter.start_time {
                    if raw.timestamp < start {
                        if scanned > self.backward_skip_threshold {
                            debug!("past start of window at {}, stopping", raw.timestamp);
                            stop = true;
                            break;
                        }
                        continue;
                    }
                }

                let severity = Severity::from_raw(raw.raw_type);
                if let Some(whitelist) = &filter.severity_whitelist {
                    if !whitelist.contains(&severity) {
                        continue;
                    }
                }

                let message = resolve_message(&raw);

                if filter.hide_common_sources && is_noise_source(&raw.source) {
                    continue;
                }

                let event_id = raw.event_id & 0xFFFF;
                if !filter.keywords.is_empty()
                    && !keyword_match(&filter.keywords, &message, &raw.source, event_id)
                {
                    continue;
                }

                accepted.push(EventRecord {
                    source: raw.source,
                    event_id,
                    severity,
                    timestamp: raw.timestamp,
                    host: raw.host,
                    message,
                });

                if accepted.len() >= filter.max_records {
                    stop = true;
                    break;
                }
            }
        }

        info!(
            "returning {} events (scanned {} records)",
            accepted.len(),
            scanned
        );
        Ok(accepted)
    }
}

/// Formatted message when the store resolved one, else the concatenated
/// string inserts, else a fixed placeholder.
fn resolve_message(raw: &RawEvent) -> String {
    if let Some(formatted) = &raw.message {
        if !formatted.trim().is_empty() {
            return formatted.trim().to_string();
        }
    }
    if raw.inserts.is_empty() {
        NO_DESCRIPTION.to_string()
    } else {
        raw.inserts.join(" ")
    }
}

fn is_noise_source(source: &str) -> bool {
    let lower = source.to_lowercase();
    NOISE_SOURCES
        .iter()
        .any(|noise| lower.contains(&noise.to_lowercase()))
}

/// A keyword matches on message or source (case-insensitive substring) or
/// by equality with the decimal event id. The last rule lets one keyword
/// list carry textual and numeric-id search terms together.
fn keyword_match(keywords: &[String], message: &str, source: &str, event_id: u32) -> bool {
    let message_lower = message.to_lowercase();
    let source_lower = source.to_lowercase();
    let id_string = event_id.to_string();
    keywords.iter().any(|k| {
        let k_lower = k.to_lowercase();
        message_lower.contains(&k_lower) || source_lower.contains(&k_lower) || *k == id_string
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_source::FakeLogSource;
    use chrono::{DateTime, Local, TimeZone};

    fn ts(secs: i64) -> DateTime<Local> {
        Local.timestamp_opt(1_750_000_000 + secs, 0).unwrap()
    }

    fn raw(id: u32, raw_type: u16, source: &str, secs: i64, message: &str) -> RawEvent {
        RawEvent {
            raw_type,
            event_id: id,
            source: source.to_string(),
            host: "host".to_string(),
            timestamp: ts(secs),
            inserts: vec![],
            message: Some(message.to_string()),
        }
    }

    /// Records newest-first, the order the adapter contract delivers.
    fn descending_log(n: i64) -> Vec<RawEvent> {
        (0..n)
            .map(|i| {
                raw(
                    1000 + i as u32,
                    0x0004,
                    "TestSource",
                    n - i,
                    &format!("record {}", i),
                )
            })
            .collect()
    }

    fn engine() -> EventQueryEngine {
        EventQueryEngine::new(&EngineConfig::default())
    }

    #[test]
    fn test_output_is_reverse_chronological() {
        let source = FakeLogSource::new("System", descending_log(40)).with_batch_size(7);
        let events = engine()
            .query(&source, &QueryFilter::new("System", 40))
            .unwrap();
        assert_eq!(events.len(), 40);
        for pair in events.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
    }

    #[test]
    fn test_max_records_stops_scan() {
        let source = FakeLogSource::new("System", descending_log(40));
        let events = engine()
            .query(&source, &QueryFilter::new("System", 3))
            .unwrap();
        assert_eq!(events.len(), 3);
        // the three newest
        assert_eq!(events[0].event_id, 1000);
    }

    #[test]
    fn test_keyword_matches_decimal_event_id() {
        let records = vec![
            raw(1074, 0x0004, "User32", 10, "unrelated message text"),
            raw(2, 0x0004, "Other", 5, "also unrelated"),
        ];
        let source = FakeLogSource::new("System", records);
        let filter = QueryFilter::new("System", 10).with_keywords(vec!["1074".to_string()]);
        let events = engine().query(&source, &filter).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_id, 1074);
    }

    #[test]
    fn test_keyword_matches_message_and_source() {
        let records = vec![
            raw(1, 0x0004, "volsnap", 10, "shadow copy deleted"),
            raw(2, 0x0004, "Other", 9, "Chrome exited unexpectedly"),
            raw(3, 0x0004, "Third", 8, "nothing relevant"),
        ];
        let source = FakeLogSource::new("System", records);
        let filter =
            QueryFilter::new("System", 10).with_keywords(vec!["VOLSNAP".into(), "chrome".into()]);
        let events = engine().query(&source, &filter).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_hide_common_sources_is_subset() {
        let records = vec![
            raw(1, 0x0004, "Service Control Manager", 10, "service entered running state"),
            raw(2, 0x0004, "volsnap", 9, "shadow copy"),
            raw(3, 0x0004, "Microsoft-Windows-Time-Service", 8, "time sync"),
            raw(4, 0x0004, "disk", 7, "bad block"),
        ];
        let source = FakeLogSource::new("System", records);

        let all = engine()
            .query(&source, &QueryFilter::new("System", 10))
            .unwrap();
        let filtered = engine()
            .query(
                &source,
                &QueryFilter::new("System", 10).hiding_common_sources(true),
            )
            .unwrap();

        assert_eq!(all.len(), 4);
        assert_eq!(filtered.len(), 2);
        for event in &filtered {
            assert!(all.iter().any(|e| e.event_id == event.event_id));
        }
    }

    #[test]
    fn test_severity_whitelist() {
        let records = vec![
            raw(1, 0x0001, "app", 10, "an error"),
            raw(2, 0x0002, "app", 9, "a warning"),
            raw(3, 0x0004, "app", 8, "information"),
        ];
        let source = FakeLogSource::new("Application", records);
        let filter = QueryFilter::new("Application", 10)
            .with_severities(Some(vec![Severity::Error, Severity::Warning]));
        let events = engine().query(&source, &filter).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.severity != Severity::Information));
    }

    #[test]
    fn test_end_time_rejects_newer_records_without_stopping() {
        // newest three are past end_time; older two are inside
        let records = descending_log(5);
        let source = FakeLogSource::new("System", records);
        let filter = QueryFilter::new("System", 10).between(None, Some(ts(2)));
        let events = engine().query(&source, &filter).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.timestamp <= ts(2)));
    }

    #[test]
    fn test_inverted_window_terminates_with_no_results() {
        // end_time < start_time: everything is either too new or too old,
        // and the scan must still terminate within the ceiling.
        let source = FakeLogSource::new("System", descending_log(2000)).with_batch_size(128);
        let mut config = EngineConfig::default();
        config.backward_skip_threshold = 100;
        let engine = EventQueryEngine::new(&config);
        let filter = QueryFilter::new("System", 10).between(Some(ts(1500)), Some(ts(300)));
        let events = engine.query(&source, &filter).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_backward_skip_threshold_stops_past_window() {
        // Window covers only the newest 5 records; with a small threshold
        // the scan must stop soon after crossing the start boundary.
        let source = FakeLogSource::new("System", descending_log(1000)).with_batch_size(64);
        let mut config = EngineConfig::default();
        config.backward_skip_threshold = 10;
        let engine = EventQueryEngine::new(&config);
        let filter = QueryFilter::new("System", 500).between(Some(ts(996)), None);
        let events = engine.query(&source, &filter).unwrap();
        assert_eq!(events.len(), 5);
    }

    #[test]
    fn test_scan_ceiling_bounds_the_scan() {
        let source = FakeLogSource::new("System", descending_log(500)).with_batch_size(64);
        let mut config = EngineConfig::default();
        config.scan_ceiling = 100;
        let engine = EventQueryEngine::new(&config);
        // keyword that never matches would otherwise scan the whole log
        let filter = QueryFilter::new("System", 10).with_keywords(vec!["nomatch".to_string()]);
        let events = engine.query(&source, &filter).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_idempotent_over_unchanged_log() {
        let source = FakeLogSource::new("System", descending_log(50)).with_batch_size(9);
        let filter = QueryFilter::new("System", 20).with_keywords(vec!["record".to_string()]);
        let first = engine().query(&source, &filter).unwrap();
        let second = engine().query(&source, &filter).unwrap();
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.event_id, b.event_id);
            assert_eq!(a.timestamp, b.timestamp);
        }
    }

    #[test]
    fn test_message_falls_back_to_inserts_then_placeholder() {
        let mut with_inserts = raw(10, 0x0004, "app", 5, "");
        with_inserts.message = None;
        with_inserts.inserts = vec!["part one".to_string(), "part two".to_string()];
        let mut bare = raw(11, 0x0004, "app", 4, "");
        bare.message = None;

        let source = FakeLogSource::new("Application", vec![with_inserts, bare]);
        let events = engine()
            .query(&source, &QueryFilter::new("Application", 10))
            .unwrap();
        assert_eq!(events[0].message, "part one part two");
        assert_eq!(events[1].message, NO_DESCRIPTION);
    }

    #[test]
    fn test_event_id_keeps_low_16_bits() {
        // 0x80001234 -> 0x1234
        let source = FakeLogSource::new(
            "System",
            vec![raw(0x8000_1234, 0x0001, "app", 5, "masked id")],
        );
        let events = engine()
            .query(&source, &QueryFilter::new("System", 1))
            .unwrap();
        assert_eq!(events[0].event_id, 0x1234);
    }

    #[test]
    fn test_access_denied_propagates() {
        let source = FakeLogSource::new("Security", vec![]).denying_access();
        let err = engine()
            .query(&source, &QueryFilter::new("Security", 5))
            .unwrap_err();
        assert!(matches!(err, vigil_shared::VigilError::AccessDenied(_)));
    }
}
