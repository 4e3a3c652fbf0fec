// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tagwatch-rs

//! Backend payloads
//!
//! The backend emits `null` for absent strings and serializes decimal RSSI
//! values as strings, so decoding is lenient: a single odd field
//! does not fail a whole snapshot.

use serde::{Deserialize, Deserializer, Serialize};

use crate::activity::ActivityLogRecord;

/// `GET live-tags` body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagSnapshot {
    #[serde(default, deserialize_with = "null_default")]
    pub tags: Vec<TagRecord>,
}

/// One detection-derived tag record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRecord {
    #[serde(default, deserialize_with = "loose_string")]
    pub id: String,
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
    pub mac: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub last_seen: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub activity_log: Vec<ActivityEntry>,
}

/// Per-tag activity entry embedded in a live-tags record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    #[serde(default, deserialize_with = "loose_string")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub reader: String,
    #[serde(default, deserialize_with = "loose_u32")]
    pub antenna: Option<u32>,
    #[serde(default, deserialize_with = "loose_number")]
    pub rssi: Option<f64>,
}

/// `GET reader-status` body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReaderSnapshot {
    #[serde(default, deserialize_with = "null_default")]
    pub readers: Vec<ReaderRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderRecord {
    #[serde(default, deserialize_with = "loose_string")]
    pub id: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub name: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub model: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub location: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub status: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub ip_address: String,
    #[serde(default, deserialize_with = "null_default")]
    pub antennas: Vec<AntennaRecord>,
    #[serde(default, deserialize_with = "null_default")]
    pub total_tags_detected: u64,
    #[serde(default, deserialize_with = "loose_string")]
    pub uptime: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AntennaRecord {
    #[serde(default, deserialize_with = "null_default")]
    pub number: u32,
    #[serde(default, deserialize_with = "loose_string")]
    pub status: String,
    #[serde(default, deserialize_with = "null_default")]
    pub tags_detected: u64,
    #[serde(default, alias = "powerLevel", deserialize_with = "loose_number")]
    pub power: Option<f64>,
}

/// `GET activity-logs` body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogSnapshot {
    #[serde(default, deserialize_with = "null_default")]
    pub logs: Vec<ActivityLogRecord>,
}

/// `GET item search` body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemSearchResponse {
    #[serde(default)]
    pub found: bool,
    #[serde(default)]
    pub item: Option<ItemRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    #[serde(default, deserialize_with = "loose_string")]
    pub epc: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub object_name: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub responsible_person: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub current_location: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub status: String,
    #[serde(default, deserialize_with = "null_default")]
    pub timeline: Vec<TimelineEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    #[serde(default, deserialize_with = "loose_string")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub location: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub reader: String,
    #[serde(default, deserialize_with = "loose_u32")]
    pub antenna: Option<u32>,
}

/// `GET live-summary` body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveSummaryResponse {
    #[serde(default, deserialize_with = "null_default")]
    pub summary: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Text(String),
    Int(i64),
    Float(f64),
    Flag(bool),
}

pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// String, number, bool or null as a string
pub(crate) fn loose_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Text(s)) => s,
        Some(Loose::Int(n)) => n.to_string(),
        Some(Loose::Float(n)) => n.to_string(),
        Some(Loose::Flag(b)) => b.to_string(),
        None => String::new(),
    })
}

/// Number or numeric string; anything else is absent
pub(crate) fn loose_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Int(n)) => Some(n as f64),
        Some(Loose::Float(n)) => Some(n),
        Some(Loose::Text(s)) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    })
}

pub(crate) fn loose_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Int(n)) => u32::try_from(n).ok(),
        Some(Loose::Text(s)) => s.trim().parse::<u32>().ok(),
        _ => None,
    })
}
