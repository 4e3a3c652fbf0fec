//! Tracking module - per-tag live state and its reconciliation

mod freshness;
mod reconciler;

pub use freshness::*;
pub use reconciler::*;

use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single detection of a tag by a reader antenna
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionEvent {
    pub timestamp: DateTime<Utc>,
    pub reader_id: String,
    pub antenna: Option<u32>,
    pub rssi: Option<f64>,
}

impl DetectionEvent {
    /// Identity used for replay deduplication
    pub fn same_detection(&self, other: &DetectionEvent) -> bool {
        self.timestamp == other.timestamp && self.reader_id == other.reader_id
    }
}

/// How a detection relates to the previous detection of the same tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Added,
    Moved,
    Detected,
    Removed,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Added => "added",
            EventKind::Moved => "moved",
            EventKind::Detected => "detected",
            EventKind::Removed => "removed",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "added" => Some(EventKind::Added),
            "moved" => Some(EventKind::Moved),
            "detected" => Some(EventKind::Detected),
            "removed" => Some(EventKind::Removed),
            _ => None,
        }
    }

    /// Classify a detection at `(reader, antenna)` given where the tag was last seen
    pub fn between(previous: Option<(&str, Option<u32>)>, reader: &str, antenna: Option<u32>) -> Self {
        match previous {
            None => EventKind::Added,
            Some((prev_reader, prev_antenna)) if prev_reader != reader || prev_antenna != antenna => {
                EventKind::Moved
            }
            Some(_) => EventKind::Detected,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live state of one tag, keyed by EPC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedEntity {
    pub id: String,
    pub epc: String,
    pub display_name: String,
    pub last_reader_id: String,
    pub last_antenna: Option<u32>,
    pub last_rssi: Option<f64>,
    pub last_mac: String,
    pub last_seen: Option<DateTime<Utc>>,
    /// Backend status, consulted only when no local timestamp is usable
    pub server_status: Option<Freshness>,
    pub last_event: EventKind,
    /// Most recent first, bounded by the reconciler's history limit
    pub history: Vec<DetectionEvent>,
}

impl TrackedEntity {
    /// Current status, derived on every call
    pub fn status(&self, policy: &FreshnessPolicy, now: DateTime<Utc>) -> Freshness {
        match self.last_seen {
            Some(ts) => policy.classify(ts, now),
            None => self.server_status.unwrap_or(Freshness::Stale),
        }
    }

    pub fn view(&self, policy: &FreshnessPolicy, now: DateTime<Utc>) -> TagView {
        TagView {
            status: self.status(policy, now),
            entity: self.clone(),
        }
    }
}

/// A tracked entity paired with its status at read time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagView {
    #[serde(flatten)]
    pub entity: TrackedEntity,
    pub status: Freshness,
}

/// Known-entity table. One entry per EPC.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityTable {
    entities: BTreeMap<String, TrackedEntity>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, epc: &str) -> Option<&TrackedEntity> {
        self.entities.get(epc)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities ordered by EPC
    pub fn iter(&self) -> impl Iterator<Item = &TrackedEntity> {
        self.entities.values()
    }

    /// Status views for every entity at `now`
    pub fn views(&self, policy: &FreshnessPolicy, now: DateTime<Utc>) -> Vec<TagView> {
        self.iter().map(|e| e.view(policy, now)).collect()
    }

    /// Count entities per status at `now`
    pub fn status_counts(&self, policy: &FreshnessPolicy, now: DateTime<Utc>) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for entity in self.iter() {
            counts.total += 1;
            match entity.status(policy, now) {
                Freshness::Fresh => counts.active += 1,
                Freshness::Warm => counts.idle += 1,
                Freshness::Stale => counts.missing += 1,
            }
        }
        counts
    }

    pub(crate) fn get_mut(&mut self, epc: &str) -> Option<&mut TrackedEntity> {
        self.entities.get_mut(epc)
    }

    pub(crate) fn insert(&mut self, entity: TrackedEntity) {
        self.entities.insert(entity.epc.clone(), entity);
    }
}

/// Dashboard counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: usize,
    pub active: usize,
    pub idle: usize,
    pub missing: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn entity(epc: &str, last_seen: Option<DateTime<Utc>>) -> TrackedEntity {
        TrackedEntity {
            id: epc.to_string(),
            epc: epc.to_string(),
            display_name: String::new(),
            last_reader_id: "dock".to_string(),
            last_antenna: Some(1),
            last_rssi: None,
            last_mac: String::new(),
            last_seen,
            server_status: None,
            last_event: EventKind::Added,
            history: Vec::new(),
        }
    }

    #[test]
    fn test_status_recomputed_on_read() {
        let policy = FreshnessPolicy::default();
        let seen = Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap();
        let tag = entity("EPC123", Some(seen));

        assert_eq!(tag.status(&policy, seen + Duration::seconds(45)), Freshness::Fresh);
        assert_eq!(tag.status(&policy, seen + Duration::seconds(745)), Freshness::Stale);
    }

    #[test]
    fn test_server_status_fallback() {
        let policy = FreshnessPolicy::default();
        let now = Utc::now();

        let mut tag = entity("EPC9", None);
        assert_eq!(tag.status(&policy, now), Freshness::Stale);

        tag.server_status = Some(Freshness::Warm);
        assert_eq!(tag.status(&policy, now), Freshness::Warm);

        // a usable local timestamp always wins
        tag.last_seen = Some(now);
        assert_eq!(tag.status(&policy, now), Freshness::Fresh);
    }

    #[test]
    fn test_event_kind_between() {
        assert_eq!(EventKind::between(None, "dock", Some(1)), EventKind::Added);
        assert_eq!(EventKind::between(Some(("dock", Some(1))), "dock", Some(1)), EventKind::Detected);
        assert_eq!(EventKind::between(Some(("dock", Some(1))), "dock", Some(2)), EventKind::Moved);
        assert_eq!(EventKind::between(Some(("dock", Some(1))), "lab", Some(1)), EventKind::Moved);
        assert_eq!(EventKind::from_label("Moved"), Some(EventKind::Moved));
    }

    #[test]
    fn test_status_counts() {
        let policy = FreshnessPolicy::default();
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap();

        let mut table = EntityTable::new();
        table.insert(entity("A", Some(now - Duration::seconds(5))));
        table.insert(entity("B", Some(now - Duration::seconds(300))));
        table.insert(entity("C", Some(now - Duration::hours(3))));
        table.insert(entity("D", None));

        let counts = table.status_counts(&policy, now);
        assert_eq!(counts, StatusCounts { total: 4, active: 1, idle: 1, missing: 2 });
    }

    #[test]
    fn test_view_serializes_flat() {
        let policy = FreshnessPolicy::default();
        let now = Utc::now();
        let view = entity("EPC1", Some(now)).view(&policy, now);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["epc"], "EPC1");
        assert_eq!(json["lastReaderId"], "dock");
        assert_eq!(json["status"], "fresh");
    }
}
