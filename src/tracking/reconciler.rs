// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tagwatch-rs

//! Entity reconciliation
//!
//! Merges a live-tags snapshot into the known-entity table. The update is
//! functional: the caller's table is never touched and the merged copy is
//! returned together with a report of what happened.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::{parse_timestamp, DetectionEvent, EntityTable, EventKind, Freshness, TrackedEntity};
use crate::config::ReconcilerConfig;
use crate::error::{ClassificationError, MalformedRecordError};
use crate::source::TagRecord;

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    #[serde(skip)]
    pub malformed: Vec<MalformedRecordError>,
    #[serde(skip)]
    pub unclassifiable: Vec<ClassificationError>,
}

impl ReconcileReport {
    pub fn rejected(&self) -> usize {
        self.malformed.len()
    }

    /// True when the pass changed nothing
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.updated == 0
    }
}

/// Merges snapshots into an [`EntityTable`]
#[derive(Debug, Clone)]
pub struct Reconciler {
    history_limit: usize,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::from_config(&ReconcilerConfig::default())
    }
}

impl Reconciler {
    pub fn new(history_limit: usize) -> Self {
        Self {
            history_limit: history_limit.max(1),
        }
    }

    pub fn from_config(config: &ReconcilerConfig) -> Self {
        Self::new(config.history_limit)
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Merge `snapshot` into a copy of `table`.
    ///
    /// Replaying the same snapshot yields an identical table.
    pub fn reconcile(&self, table: &EntityTable, snapshot: &[TagRecord]) -> (EntityTable, ReconcileReport) {
        let mut next = table.clone();
        let mut report = ReconcileReport::default();

        for (index, record) in snapshot.iter().enumerate() {
            self.merge_record(&mut next, index, record, &mut report);
        }

        debug!(
            "Reconciled {} records: {} inserted, {} updated, {} unchanged, {} rejected",
            snapshot.len(),
            report.inserted,
            report.updated,
            report.unchanged,
            report.rejected()
        );

        (next, report)
    }

    fn merge_record(&self, table: &mut EntityTable, index: usize, record: &TagRecord, report: &mut ReconcileReport) {
        let epc = record.epc.trim();
        if epc.is_empty() {
            let err = MalformedRecordError {
                index,
                reason: "missing EPC".to_string(),
            };
            warn!("Dropping malformed tag record: {}", err);
            report.malformed.push(err);
            return;
        }

        let seen_at = parse_timestamp(&record.last_seen);
        if seen_at.is_none() {
            let err = ClassificationError {
                epc: epc.to_string(),
                raw: record.last_seen.clone(),
            };
            warn!("{}; classifying as stale", err);
            report.unclassifiable.push(err);
        }

        let events = detections(record, seen_at);
        let server_status = record.status.as_deref().and_then(Freshness::from_label);

        match table.get_mut(epc) {
            Some(entity) => {
                let mut changed = refresh_details(entity, record, server_status);
                for event in events {
                    changed |= self.observe(entity, record, event);
                }
                if changed {
                    report.updated += 1;
                } else {
                    report.unchanged += 1;
                }
            }
            None => {
                let mut entity = first_sighting(epc, record, server_status);
                for event in events {
                    self.observe(&mut entity, record, event);
                }
                entity.last_event = EventKind::Added;
                table.insert(entity);
                report.inserted += 1;
            }
        }
    }

    /// Merge one detection into the history. Returns whether anything changed.
    fn observe(&self, entity: &mut TrackedEntity, record: &TagRecord, event: DetectionEvent) -> bool {
        if entity.history.iter().any(|seen| seen.same_detection(&event)) {
            return false;
        }

        let position = entity
            .history
            .iter()
            .position(|seen| seen.timestamp < event.timestamp)
            .unwrap_or(entity.history.len());
        if position >= self.history_limit {
            // older than everything we keep
            return false;
        }

        if entity.last_seen.map_or(true, |last| event.timestamp >= last) {
            let previous = entity
                .last_seen
                .map(|_| (entity.last_reader_id.as_str(), entity.last_antenna));
            entity.last_event = EventKind::between(previous, &event.reader_id, event.antenna);
            entity.last_reader_id = event.reader_id.clone();
            entity.last_antenna = event.antenna;
            entity.last_rssi = event.rssi;
            entity.last_seen = Some(event.timestamp);
            if !record.mac.is_empty() {
                entity.last_mac = record.mac.clone();
            }
        }

        entity.history.insert(position, event);
        entity.history.truncate(self.history_limit);
        true
    }
}

/// Name and server label; never touches location or history
fn refresh_details(entity: &mut TrackedEntity, record: &TagRecord, server_status: Option<Freshness>) -> bool {
    let mut changed = false;

    if !record.object_name.is_empty() && record.object_name != entity.display_name {
        entity.display_name = record.object_name.clone();
        changed = true;
    }
    if server_status.is_some() && server_status != entity.server_status {
        entity.server_status = server_status;
        changed = true;
    }
    changed
}

/// Recent activity plus the `lastSeen` detection, oldest first.
///
/// Activity entries without a usable timestamp are skipped. A record with no
/// usable timestamp at all yields nothing, so location and history never regress.
fn detections(record: &TagRecord, seen_at: Option<DateTime<Utc>>) -> Vec<DetectionEvent> {
    let mut events: Vec<DetectionEvent> = record
        .activity_log
        .iter()
        .filter_map(|entry| {
            let timestamp = parse_timestamp(&entry.timestamp)?;
            Some(DetectionEvent {
                timestamp,
                reader_id: entry.reader.clone(),
                antenna: entry.antenna,
                rssi: entry.rssi,
            })
        })
        .collect();

    if let Some(timestamp) = seen_at {
        events.push(DetectionEvent {
            timestamp,
            reader_id: record.reader.clone(),
            antenna: record.antenna,
            rssi: record.rssi,
        });
    }

    // stable: the record's own detection stays last among equal timestamps
    events.sort_by_key(|event| event.timestamp);
    events
}

fn first_sighting(epc: &str, record: &TagRecord, server_status: Option<Freshness>) -> TrackedEntity {
    let id = if record.id.trim().is_empty() {
        epc.to_string()
    } else {
        record.id.trim().to_string()
    };

    TrackedEntity {
        id,
        epc: epc.to_string(),
        display_name: record.object_name.clone(),
        last_reader_id: record.reader.clone(),
        last_antenna: record.antenna,
        last_rssi: record.rssi,
        last_mac: record.mac.clone(),
        last_seen: None,
        server_status,
        last_event: EventKind::Added,
        history: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ActivityEntry;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
    }

    fn record(epc: &str, reader: &str, antenna: u32, at: DateTime<Utc>) -> TagRecord {
        TagRecord {
            id: epc.to_string(),
            epc: epc.to_string(),
            object_name: format!("Item {epc}"),
            reader: reader.to_string(),
            antenna: Some(antenna),
            rssi: Some(-55.0),
            mac: "00:16:25:aa:bb:cc".to_string(),
            last_seen: at.to_rfc3339(),
            ..Default::default()
        }
    }

    #[test]
    fn test_insert_on_first_observation() {
        let reconciler = Reconciler::default();
        let snapshot = vec![record("EPC1", "dock", 1, base())];

        let (table, report) = reconciler.reconcile(&EntityTable::new(), &snapshot);

        assert_eq!(report.inserted, 1);
        let entity = table.get("EPC1").unwrap();
        assert_eq!(entity.history.len(), 1);
        assert_eq!(entity.last_seen, Some(base()));
        assert_eq!(entity.last_event, EventKind::Added);
        assert_eq!(entity.display_name, "Item EPC1");
    }

    #[test]
    fn test_input_table_untouched() {
        let reconciler = Reconciler::default();
        let empty = EntityTable::new();
        let (_table, _) = reconciler.reconcile(&empty, &[record("EPC1", "dock", 1, base())]);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_update_prepends_and_tracks_location() {
        let reconciler = Reconciler::default();
        let (table, _) = reconciler.reconcile(&EntityTable::new(), &[record("EPC1", "dock", 1, base())]);

        let later = base() + Duration::seconds(30);
        let (table, report) = reconciler.reconcile(&table, &[record("EPC1", "lab", 2, later)]);

        assert_eq!(report.updated, 1);
        let entity = table.get("EPC1").unwrap();
        assert_eq!(entity.last_reader_id, "lab");
        assert_eq!(entity.last_antenna, Some(2));
        assert_eq!(entity.last_seen, Some(later));
        assert_eq!(entity.last_event, EventKind::Moved);
        assert_eq!(entity.history[0].reader_id, "lab");
        assert_eq!(entity.history[1].reader_id, "dock");

        let even_later = later + Duration::seconds(30);
        let (table, _) = reconciler.reconcile(&table, &[record("EPC1", "lab", 2, even_later)]);
        assert_eq!(table.get("EPC1").unwrap().last_event, EventKind::Detected);
    }

    #[test]
    fn test_replay_is_idempotent() {
        let reconciler = Reconciler::default();
        let snapshot = vec![
            record("EPC1", "dock", 1, base()),
            record("EPC2", "lab", 1, base() + Duration::seconds(5)),
            record("EPC1", "lab", 3, base() + Duration::seconds(10)),
        ];

        let (once, _) = reconciler.reconcile(&EntityTable::new(), &snapshot);
        let (twice, report) = reconciler.reconcile(&once, &snapshot);

        assert_eq!(once, twice);
        assert!(report.is_noop());
        assert_eq!(report.unchanged, 3);
        assert_eq!(twice.get("EPC1").unwrap().history.len(), 2);
    }

    #[test]
    fn test_history_is_bounded() {
        let reconciler = Reconciler::new(5);
        let mut table = EntityTable::new();

        for i in 0..12 {
            let at = base() + Duration::seconds(i * 10);
            let (next, _) = reconciler.reconcile(&table, &[record("EPC1", "dock", 1, at)]);
            table = next;
        }

        let entity = table.get("EPC1").unwrap();
        assert_eq!(entity.history.len(), 5);
        assert_eq!(entity.history[0].timestamp, base() + Duration::seconds(110));
        assert!(entity
            .history
            .windows(2)
            .all(|pair| pair[0].timestamp >= pair[1].timestamp));
    }

    #[test]
    fn test_out_of_order_event_does_not_regress_location() {
        let reconciler = Reconciler::default();
        let newer = base() + Duration::seconds(60);
        let (table, _) = reconciler.reconcile(&EntityTable::new(), &[record("EPC1", "lab", 2, newer)]);

        let (table, report) = reconciler.reconcile(&table, &[record("EPC1", "dock", 1, base())]);

        assert_eq!(report.updated, 1);
        let entity = table.get("EPC1").unwrap();
        assert_eq!(entity.last_reader_id, "lab");
        assert_eq!(entity.last_seen, Some(newer));
        assert_eq!(entity.history.len(), 2);
        assert_eq!(entity.history[1].reader_id, "dock");
    }

    #[test]
    fn test_event_older_than_full_history_is_ignored() {
        let reconciler = Reconciler::new(2);
        let snapshot = vec![
            record("EPC1", "dock", 1, base() + Duration::seconds(10)),
            record("EPC1", "dock", 1, base() + Duration::seconds(20)),
        ];
        let (table, _) = reconciler.reconcile(&EntityTable::new(), &snapshot);

        let (after, report) = reconciler.reconcile(&table, &[record("EPC1", "lab", 1, base())]);
        assert_eq!(after, table);
        assert_eq!(report.unchanged, 1);
    }

    #[test]
    fn test_malformed_records_are_dropped() {
        let reconciler = Reconciler::default();
        let mut blank = record("", "dock", 1, base());
        blank.epc = "   ".to_string();
        let snapshot = vec![blank, record("EPC1", "dock", 1, base())];

        let (table, report) = reconciler.reconcile(&EntityTable::new(), &snapshot);

        assert_eq!(table.len(), 1);
        assert_eq!(report.rejected(), 1);
        assert_eq!(report.malformed[0].index, 0);
    }

    #[test]
    fn test_unparseable_timestamp_keeps_entity_stale() {
        let reconciler = Reconciler::default();
        let mut broken = record("EPC1", "dock", 1, base());
        broken.last_seen = "last tuesday".to_string();

        let (table, report) = reconciler.reconcile(&EntityTable::new(), &[broken.clone()]);
        assert_eq!(report.unclassifiable.len(), 1);

        let entity = table.get("EPC1").unwrap();
        assert!(entity.history.is_empty());
        assert_eq!(entity.last_seen, None);
        assert_eq!(entity.status(&Default::default(), base()), Freshness::Stale);

        // a valid sighting later fills it in, broken ones never regress it
        let (table, _) = reconciler.reconcile(&table, &[record("EPC1", "lab", 1, base())]);
        let (table, _) = reconciler.reconcile(&table, &[broken]);
        let entity = table.get("EPC1").unwrap();
        assert_eq!(entity.last_seen, Some(base()));
        assert_eq!(entity.last_reader_id, "lab");
        assert_eq!(entity.history.len(), 1);
    }

    #[test]
    fn test_duplicate_epc_within_snapshot() {
        let reconciler = Reconciler::default();
        let snapshot = vec![
            record("EPC1", "dock", 1, base()),
            record("EPC1", "dock", 1, base()),
        ];

        let (table, report) = reconciler.reconcile(&EntityTable::new(), &snapshot);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(table.get("EPC1").unwrap().history.len(), 1);
    }

    fn activity(reader: &str, antenna: u32, at: DateTime<Utc>) -> ActivityEntry {
        ActivityEntry {
            timestamp: at.to_rfc3339(),
            reader: reader.to_string(),
            antenna: Some(antenna),
            rssi: Some(-60.0),
        }
    }

    /// Newest detection first, the way the backend sends it
    fn with_activity(epc: &str, detections: &[(&str, u32, i64)]) -> TagRecord {
        let (reader, antenna, offset) = detections[0];
        let mut record = record(epc, reader, antenna, base() + Duration::seconds(offset));
        record.activity_log = detections
            .iter()
            .map(|&(reader, antenna, offset)| activity(reader, antenna, base() + Duration::seconds(offset)))
            .collect();
        record
    }

    #[test]
    fn test_activity_log_fills_history() {
        let reconciler = Reconciler::default();
        let snapshot = vec![with_activity(
            "EPC1",
            &[("lab", 2, 40), ("lab", 1, 30), ("dock", 1, 20), ("dock", 1, 10), ("dock", 3, 0)],
        )];

        let (once, report) = reconciler.reconcile(&EntityTable::new(), &snapshot);
        assert_eq!(report.inserted, 1);

        let entity = once.get("EPC1").unwrap();
        assert_eq!(entity.history.len(), 5);
        assert_eq!(entity.last_seen, Some(base() + Duration::seconds(40)));
        assert_eq!(entity.last_reader_id, "lab");
        assert_eq!(entity.last_antenna, Some(2));
        assert_eq!(entity.last_event, EventKind::Added);
        assert_eq!(entity.history[4].antenna, Some(3));
        assert!(entity
            .history
            .windows(2)
            .all(|pair| pair[0].timestamp > pair[1].timestamp));

        let (twice, report) = reconciler.reconcile(&once, &snapshot);
        assert_eq!(twice, once);
        assert!(report.is_noop());
        assert_eq!(twice.get("EPC1").unwrap().history.len(), 5);
    }

    #[test]
    fn test_activity_between_polls_is_kept() {
        let reconciler = Reconciler::default();
        let (table, _) = reconciler.reconcile(&EntityTable::new(), &[record("EPC1", "dock", 1, base())]);

        // two readers saw the tag before the next poll
        let next = with_activity("EPC1", &[("lab", 1, 8), ("workshop", 2, 4), ("dock", 1, 0)]);
        let (table, report) = reconciler.reconcile(&table, &[next]);

        assert_eq!(report.updated, 1);
        let entity = table.get("EPC1").unwrap();
        let readers: Vec<&str> = entity.history.iter().map(|e| e.reader_id.as_str()).collect();
        assert_eq!(readers, vec!["lab", "workshop", "dock"]);
        assert_eq!(entity.last_event, EventKind::Moved);
    }

    #[test]
    fn test_activity_log_respects_history_limit() {
        let reconciler = Reconciler::new(3);
        let detections: Vec<(&str, u32, i64)> = (0..6).rev().map(|i| ("dock", 1, i * 10)).collect();
        let mut snapshot = vec![with_activity("EPC1", &detections)];
        snapshot[0].activity_log.push(ActivityEntry {
            timestamp: "soon".to_string(),
            ..activity("dock", 1, base())
        });

        let (once, _) = reconciler.reconcile(&EntityTable::new(), &snapshot);
        let history = &once.get("EPC1").unwrap().history;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].timestamp, base() + Duration::seconds(50));
        assert_eq!(history[2].timestamp, base() + Duration::seconds(30));

        let (twice, report) = reconciler.reconcile(&once, &snapshot);
        assert_eq!(twice, once);
        assert_eq!(report.unchanged, 1);
    }
}
