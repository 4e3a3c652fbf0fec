// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tagwatch-rs

//! Raw live-summary lines
//!
//! `Received EPC: <epc> | Reader: <model> | Antenna: <n> | RSSI: <r> | MAC: <mac> | Local Time (Finland): <ts>`

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::tracking::{parse_local_timestamp, Freshness, FreshnessPolicy};

const KEY_EPC: &str = "Received EPC";
const KEY_READER: &str = "Reader";
const KEY_ANTENNA: &str = "Antenna";
const KEY_RSSI: &str = "RSSI";
const KEY_MAC: &str = "MAC";
const KEY_LOCAL_TIME: &str = "Local Time (Finland)";

/// Fields of one summary line, kept as text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryLine {
    pub epc: String,
    pub reader: String,
    pub antenna: String,
    pub rssi: String,
    pub mac: String,
    pub local_time: String,
}

impl SummaryLine {
    /// Segments without `": "` are ignored, missing keys stay empty
    pub fn parse(line: &str) -> Self {
        let mut parsed = SummaryLine::default();

        for segment in line.split(" | ") {
            let Some((key, value)) = segment.split_once(": ") else {
                continue;
            };
            let value = value.trim().to_string();
            match key.trim() {
                KEY_EPC => parsed.epc = value,
                KEY_READER => parsed.reader = value,
                KEY_ANTENNA => parsed.antenna = value,
                KEY_RSSI => parsed.rssi = value,
                KEY_MAC => parsed.mac = value,
                KEY_LOCAL_TIME => parsed.local_time = value,
                _ => {}
            }
        }

        parsed
    }

    pub fn parse_all<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<Self> {
        lines.into_iter().map(Self::parse).collect()
    }

    /// The printed local time, read as wall-clock time in `tz`
    pub fn detected_at(&self, tz: Tz) -> Option<DateTime<Utc>> {
        parse_local_timestamp(&self.local_time, tz)
    }

    pub fn freshness(&self, policy: &FreshnessPolicy, tz: Tz, now: DateTime<Utc>) -> Freshness {
        policy.classify_local(&self.local_time, tz, now)
    }

    pub fn row_class(&self, policy: &FreshnessPolicy, tz: Tz, now: DateTime<Utc>) -> &'static str {
        self.freshness(policy, tz, now).row_class()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use chrono_tz::Europe::Helsinki;

    const LINE: &str = "Received EPC: E28011700000020F | Reader: Speedway R420 | Antenna: 2 | RSSI: -61.50 | MAC: 00:16:25:10:aa:01 | Local Time (Finland): 2026-03-14 11:59:30";

    #[test]
    fn test_parse_line() {
        let line = SummaryLine::parse(LINE);
        assert_eq!(line.epc, "E28011700000020F");
        assert_eq!(line.reader, "Speedway R420");
        assert_eq!(line.antenna, "2");
        assert_eq!(line.rssi, "-61.50");
        assert_eq!(line.mac, "00:16:25:10:aa:01");
        assert_eq!(line.local_time, "2026-03-14 11:59:30");
    }

    #[test]
    fn test_parse_partial_line() {
        let line = SummaryLine::parse("Received EPC: E1 | garbage | MAC: aa");
        assert_eq!(line.epc, "E1");
        assert_eq!(line.mac, "aa");
        assert_eq!(line.reader, "");
        assert_eq!(SummaryLine::parse(""), SummaryLine::default());
    }

    #[test]
    fn test_row_classes() {
        let policy = FreshnessPolicy::default();
        let line = SummaryLine::parse(LINE);

        // 11:59:30 EET is 09:59:30 UTC
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap();
        assert_eq!(line.row_class(&policy, Helsinki, now), "row-fresh");

        let later = Utc.with_ymd_and_hms(2026, 3, 14, 10, 5, 0).unwrap();
        assert_eq!(line.row_class(&policy, Helsinki, later), "row-warm");

        let much_later = Utc.with_ymd_and_hms(2026, 3, 14, 11, 0, 0).unwrap();
        assert_eq!(line.row_class(&policy, Helsinki, much_later), "row-stale");

        let broken = SummaryLine::parse("Received EPC: E1");
        assert_eq!(broken.row_class(&policy, Helsinki, now), "row-stale");
    }

    #[test]
    fn test_half_hour_old_helsinki_line_is_stale() {
        let policy = FreshnessPolicy::default();
        let now = Utc::now();
        let local = (now - Duration::minutes(30)).with_timezone(&Helsinki);
        let line = SummaryLine::parse(&format!(
            "Received EPC: E1 | Reader: Speedway R420 | Antenna: 1 | RSSI: -60.00 | MAC: aa | Local Time (Finland): {}",
            local.format("%Y-%m-%d %H:%M:%S")
        ));

        assert_eq!(line.row_class(&policy, Helsinki, now), "row-stale");
        let seen = line.detected_at(Helsinki).unwrap();
        assert!((now - seen - Duration::minutes(30)).num_seconds().abs() <= 1);
    }

    #[test]
    fn test_row_class_agrees_with_entity_status() {
        let policy = FreshnessPolicy::default();
        let now = Utc.with_ymd_and_hms(2026, 7, 1, 9, 0, 0).unwrap();

        for age in [0, 45, 90, 300, 700] {
            let seen = now - Duration::seconds(age);
            let line = SummaryLine {
                local_time: seen.with_timezone(&Helsinki).format("%Y-%m-%d %H:%M:%S").to_string(),
                ..Default::default()
            };
            assert_eq!(line.freshness(&policy, Helsinki, now), policy.classify(seen, now), "age {age}s");
        }
    }
}
