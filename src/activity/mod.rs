// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tagwatch-rs

//! Activity module - raw detection logs and live summary lines

mod summary;

pub use summary::*;

use std::collections::HashMap;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::source::wire::{loose_number, loose_string, loose_u32};
use crate::tracking::{parse_timestamp, EventKind};

/// One row of the activity log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogRecord {
    #[serde(default, deserialize_with = "loose_string")]
    pub id: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub epc: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub object_name: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub reader: String,
    #[serde(default, deserialize_with = "loose_u32")]
    pub antenna: Option<u32>,
    #[serde(default, deserialize_with = "loose_number")]
    pub rssi: Option<f64>,
    #[serde(default, deserialize_with = "loose_string")]
    pub event: String,
}

impl ActivityLogRecord {
    pub fn detected_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }

    pub fn event_kind(&self) -> Option<EventKind> {
        EventKind::from_label(&self.event)
    }
}

/// Fill in missing event kinds.
///
/// Each record is compared with the previous detection of the same EPC in
/// time order. Records that already carry an event keep it but still count as
/// the tag's latest location. Records without a parseable timestamp are left
/// alone.
pub fn derive_event_kinds(logs: &mut [ActivityLogRecord]) {
    let mut order: Vec<(DateTime<Utc>, usize)> = logs
        .iter()
        .enumerate()
        .filter_map(|(i, log)| log.detected_at().map(|ts| (ts, i)))
        .collect();
    order.sort();

    let mut last_location: HashMap<String, (String, Option<u32>)> = HashMap::new();
    for (_, index) in order {
        let log = &mut logs[index];
        if log.event.trim().is_empty() {
            let previous = last_location
                .get(&log.epc)
                .map(|(reader, antenna)| (reader.as_str(), *antenna));
            log.event = EventKind::between(previous, &log.reader, log.antenna).to_string();
        }
        last_location.insert(log.epc.clone(), (log.reader.clone(), log.antenna));
    }
}

/// Inclusive calendar-day range for log retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, ConfigError> {
        if from > to {
            return Err(ConfigError::DateRange {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(Self { from, to })
    }

    /// The `days` days up to and including `today`
    pub fn last_days(days: u32, today: NaiveDate) -> Self {
        let from = today - Duration::days(i64::from(days));
        Self { from, to: today }
    }

    /// `from` / `to` query parameters in `YYYY-MM-DD` form
    pub fn query_pairs(&self) -> [(&'static str, String); 2] {
        [
            ("from", self.from.format("%Y-%m-%d").to_string()),
            ("to", self.to.format("%Y-%m-%d").to_string()),
        ]
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        let day = ts.date_naive();
        self.from <= day && day <= self.to
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self::last_days(7, Utc::now().date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(id: &str, epc: &str, at: &str, reader: &str, antenna: u32) -> ActivityLogRecord {
        ActivityLogRecord {
            id: id.to_string(),
            timestamp: at.to_string(),
            epc: epc.to_string(),
            reader: reader.to_string(),
            antenna: Some(antenna),
            ..Default::default()
        }
    }

    #[test]
    fn test_derive_event_kinds() {
        // newest first, as the backend returns them
        let mut logs = vec![
            log("4", "E1", "2026-03-14T10:03:00Z", "lab", 1),
            log("3", "E1", "2026-03-14T10:02:00Z", "dock", 2),
            log("2", "E1", "2026-03-14T10:01:00Z", "dock", 2),
            log("1", "E1", "2026-03-14T10:00:00Z", "dock", 1),
            log("5", "E2", "2026-03-14T10:00:30Z", "lab", 1),
        ];

        derive_event_kinds(&mut logs);

        let events: Vec<&str> = logs.iter().map(|l| l.event.as_str()).collect();
        assert_eq!(events, vec!["moved", "detected", "moved", "added", "added"]);
    }

    #[test]
    fn test_derive_keeps_existing_events() {
        let mut logs = vec![
            log("2", "E1", "2026-03-14T10:01:00Z", "dock", 1),
            log("1", "E1", "2026-03-14T10:00:00Z", "dock", 1),
            log("0", "E1", "garbage", "dock", 1),
        ];
        logs[1].event = "removed".to_string();

        derive_event_kinds(&mut logs);
        assert_eq!(logs[0].event, "detected");
        assert_eq!(logs[1].event, "removed");
        assert_eq!(logs[2].event, "");
    }

    #[test]
    fn test_date_range() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let range = DateRange::last_days(7, today);
        assert_eq!(range.from, NaiveDate::from_ymd_opt(2026, 3, 7).unwrap());

        let pairs = range.query_pairs();
        assert_eq!(pairs[0], ("from", "2026-03-07".to_string()));
        assert_eq!(pairs[1], ("to", "2026-03-14".to_string()));

        let inside = parse_timestamp("2026-03-14T23:59:59Z").unwrap();
        let outside = parse_timestamp("2026-03-15T00:00:00Z").unwrap();
        assert!(range.contains(inside));
        assert!(!range.contains(outside));

        assert!(DateRange::new(today, range.from).is_err());
    }
}
