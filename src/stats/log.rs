use std::collections::VecDeque;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::inference::types::Detection;

/// Number of entries kept.
pub const LOG_CAPACITY: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub label: String,
    /// Percentage, not a fraction.
    pub confidence: f64,
}

impl DetectionLogEntry {
    /// Wall-clock time as shown in the live view (local `HH:MM:SS`).
    pub fn display_time(&self) -> String {
        self.timestamp
            .with_timezone(&Local)
            .format("%H:%M:%S")
            .to_string()
    }
}

/// Newest-first list of recent detections, never longer than [`LOG_CAPACITY`].
#[derive(Debug, Clone, Default)]
pub struct DetectionLog {
    entries: VecDeque<DetectionLogEntry>,
}

impl DetectionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a batch at the front, keeping its order, then drop the oldest overflow.
    pub fn record(&mut self, detections: &[Detection], at: DateTime<Utc>) {
        for detection in detections.iter().rev() {
            self.entries.push_front(DetectionLogEntry {
                timestamp: at,
                label: detection.label.clone(),
                confidence: detection.confidence_pct(),
            });
        }
        self.entries.truncate(LOG_CAPACITY);
    }

    pub fn entries(&self) -> impl Iterator<Item = &DetectionLogEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<DetectionLogEntry> {
        self.entries.iter().cloned().collect()
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
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn labels(log: &DetectionLog) -> Vec<String> {
        log.entries().map(|e| e.label.clone()).collect()
    }

    #[test]
    fn empty_batch_leaves_log_unchanged() {
        let mut log = DetectionLog::new();
        log.record(&[], at(0));
        assert!(log.is_empty());
    }

    #[test]
    fn newest_entries_come_first() {
        let mut log = DetectionLog::new();
        log.record(&[Detection::new("first", 0.5)], at(0));
        log.record(&[Detection::new("second", 0.5)], at(1));
        assert_eq!(labels(&log), vec!["second", "first"]);
    }

    #[test]
    fn batch_order_is_kept_at_the_front() {
        let mut log = DetectionLog::new();
        log.record(&[Detection::new("old", 0.5)], at(0));
        log.record(
            &[Detection::new("a", 0.5), Detection::new("b", 0.5)],
            at(1),
        );
        assert_eq!(labels(&log), vec!["a", "b", "old"]);
    }

    #[test]
    fn only_five_most_recent_remain() {
        let mut log = DetectionLog::new();
        for i in 0..8 {
            log.record(&[Detection::new(format!("d{i}"), 0.5)], at(i));
            assert!(log.len() <= LOG_CAPACITY);
        }
        assert_eq!(labels(&log), vec!["d7", "d6", "d5", "d4", "d3"]);
    }

    #[test]
    fn oversized_batch_is_truncated_to_its_head() {
        let mut log = DetectionLog::new();
        let batch: Vec<_> = (0..7)
            .map(|i| Detection::new(format!("b{i}"), 0.5))
            .collect();
        log.record(&batch, at(0));
        assert_eq!(labels(&log), vec!["b0", "b1", "b2", "b3", "b4"]);
    }

    #[test]
    fn duplicates_are_not_collapsed() {
        let mut log = DetectionLog::new();
        log.record(&[Detection::new("Helmet", 0.9)], at(0));
        log.record(&[Detection::new("Helmet", 0.9)], at(0));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn confidence_is_stored_as_percentage() {
        let mut log = DetectionLog::new();
        log.record(&[Detection::new("Helmet", 0.9)], at(0));
        let entry = log.entries().next().unwrap();
        assert!((entry.confidence - 90.0).abs() < 1e-9);
        assert_eq!(entry.timestamp, at(0));
        assert_eq!(entry.display_time().len(), 8);
    }
}
