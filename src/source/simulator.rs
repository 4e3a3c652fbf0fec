// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tagwatch-rs

//! Simulated snapshot source for demo/testing

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use rand::prelude::*;
use rand_distr::Normal;
use std::collections::VecDeque;

use super::{
    ActivityEntry, ActivityLogSnapshot, AntennaRecord, ItemRecord, ItemSearchResponse,
    LiveSummaryResponse, ReaderRecord, ReaderSnapshot, SnapshotSource, TagRecord, TagSnapshot,
    TimelineEntry,
};
use crate::activity::{ActivityLogRecord, DateRange};
use crate::error::Result;

const ANTENNAS_PER_READER: u32 = 4;
const ACTIVE_POWER: f64 = 30.0;
const MAX_LOG_ENTRIES: usize = 5000;

struct SimReader {
    id: String,
    model: String,
    location: String,
    mac: String,
    ip: String,
    installed_days_ago: i64,
}

struct SimTag {
    epc: String,
    name: String,
    owner: String,
    reader: usize,
    antenna: u32,
    last_seen: Option<DateTime<Utc>>,
    /// Tags that wander off stop being detected
    wandered_off: bool,
}

#[derive(Clone)]
struct SimDetection {
    id: u64,
    at: DateTime<Utc>,
    epc: String,
    reader: usize,
    antenna: u32,
    rssi: f64,
}

struct SimState {
    rng: StdRng,
    rssi: Normal<f64>,
    readers: Vec<SimReader>,
    tags: Vec<SimTag>,
    detections: VecDeque<SimDetection>,
    next_detection_id: u64,
}

/// Generates plausible tag movement across a small reader fleet
pub struct SimulatedSource {
    state: Mutex<SimState>,
    move_probability: f64,
    detect_probability: f64,
    wander_probability: f64,
    /// Zone of the wall-clock time printed in summary lines
    timezone: Tz,
}

impl SimulatedSource {
    pub fn new(tag_count: usize) -> Self {
        Self::with_rng(tag_count, StdRng::from_entropy())
    }

    /// Deterministic source for tests
    pub fn with_seed(tag_count: usize, seed: u64) -> Self {
        Self::with_rng(tag_count, StdRng::seed_from_u64(seed))
    }

    fn with_rng(tag_count: usize, mut rng: StdRng) -> Self {
        let readers = vec![
            sim_reader(1, "Speedway R420", "Loading Dock", 412),
            sim_reader(2, "Speedway R420", "Lab Storage", 97),
            sim_reader(3, "Speedway R220", "Workshop", 0),
        ];

        const ITEMS: [&str; 8] = [
            "Oscilloscope", "Cordless Drill", "Laptop", "Projector",
            "Multimeter", "Soldering Station", "Camera Kit", "Label Printer",
        ];
        const OWNERS: [&str; 3] = ["Lab crew", "Facilities", "IT desk"];

        let tags = (0..tag_count)
            .map(|i| SimTag {
                epc: format!("E28011700000020{:09X}", 0x1000 + i),
                name: format!("{} #{}", ITEMS[i % ITEMS.len()], i / ITEMS.len() + 1),
                owner: OWNERS[i % OWNERS.len()].to_string(),
                reader: rng.gen_range(0..readers.len()),
                antenna: rng.gen_range(1..=ANTENNAS_PER_READER),
                last_seen: None,
                wandered_off: false,
            })
            .collect();

        Self {
            state: Mutex::new(SimState {
                rng,
                rssi: Normal::new(-58.0, 6.0).expect("valid RSSI distribution"),
                readers,
                tags,
                detections: VecDeque::new(),
                next_detection_id: 1,
            }),
            move_probability: 0.05,
            detect_probability: 0.8,
            wander_probability: 0.01,
            timezone: chrono_tz::Europe::Helsinki,
        }
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// Advance the simulation to `now`
    fn step(&self, now: DateTime<Utc>) {
        let mut state = self.state.lock();
        let SimState { rng, rssi, readers, tags, detections, next_detection_id } = &mut *state;

        for tag in tags.iter_mut() {
            if tag.wandered_off {
                continue;
            }
            if tag.last_seen.is_some() && rng.gen_bool(self.wander_probability) {
                tag.wandered_off = true;
                continue;
            }
            if rng.gen_bool(self.move_probability) {
                tag.reader = rng.gen_range(0..readers.len());
                tag.antenna = rng.gen_range(1..=ANTENNAS_PER_READER);
            }
            if tag.last_seen.is_none() || rng.gen_bool(self.detect_probability) {
                tag.last_seen = Some(now);
                detections.push_front(SimDetection {
                    id: *next_detection_id,
                    at: now,
                    epc: tag.epc.clone(),
                    reader: tag.reader,
                    antenna: tag.antenna,
                    rssi: (rssi.sample(rng) * 100.0).round() / 100.0,
                });
                *next_detection_id += 1;
            }
        }

        detections.truncate(MAX_LOG_ENTRIES);
    }

    fn tag_snapshot(&self) -> TagSnapshot {
        let state = self.state.lock();
        let since = Utc::now() - Duration::hours(24);

        let tags = state
            .tags
            .iter()
            .filter(|tag| tag.last_seen.is_some())
            .map(|tag| {
                let reader = &state.readers[tag.reader];
                let activity_log = state
                    .detections
                    .iter()
                    .filter(|d| d.epc == tag.epc && d.at >= since)
                    .take(20)
                    .map(|d| ActivityEntry {
                        timestamp: d.at.to_rfc3339(),
                        reader: state.readers[d.reader].model.clone(),
                        antenna: Some(d.antenna),
                        rssi: Some(d.rssi),
                    })
                    .collect::<Vec<_>>();
                let latest = activity_log.first();

                TagRecord {
                    id: tag.epc.clone(),
                    epc: tag.epc.clone(),
                    object_name: tag.name.clone(),
                    reader: reader.model.clone(),
                    antenna: Some(tag.antenna),
                    rssi: latest.and_then(|d| d.rssi),
                    mac: reader.mac.clone(),
                    last_seen: tag.last_seen.map(|ts| ts.to_rfc3339()).unwrap_or_default(),
                    status: None,
                    activity_log,
                }
            })
            .collect();

        TagSnapshot { tags }
    }

    fn reader_snapshot(&self, now: DateTime<Utc>) -> ReaderSnapshot {
        let state = self.state.lock();
        let online_cutoff = now - Duration::minutes(5);
        let stats_cutoff = now - Duration::hours(24);

        let readers = state
            .readers
            .iter()
            .enumerate()
            .map(|(index, reader)| {
                let recent = state
                    .detections
                    .iter()
                    .filter(|d| d.reader == index && d.at >= stats_cutoff);

                let mut per_antenna = [0u64; ANTENNAS_PER_READER as usize];
                let mut online = false;
                for detection in recent {
                    per_antenna[(detection.antenna - 1) as usize] += 1;
                    online |= detection.at >= online_cutoff;
                }

                let antennas = per_antenna
                    .iter()
                    .enumerate()
                    .map(|(i, &count)| AntennaRecord {
                        number: i as u32 + 1,
                        status: if count > 0 { "active" } else { "inactive" }.to_string(),
                        tags_detected: count,
                        power: Some(if count > 0 { ACTIVE_POWER } else { 0.0 }),
                    })
                    .collect();

                ReaderRecord {
                    id: reader.id.clone(),
                    name: reader.location.clone(),
                    model: reader.model.clone(),
                    location: reader.location.clone(),
                    status: if online { "online" } else { "offline" }.to_string(),
                    ip_address: reader.ip.clone(),
                    antennas,
                    total_tags_detected: per_antenna.iter().sum(),
                    uptime: match reader.installed_days_ago {
                        0 => "Less than 1 day".to_string(),
                        days => format!("{} days", days),
                    },
                }
            })
            .collect();

        ReaderSnapshot { readers }
    }

    fn log_snapshot(&self, range: &DateRange) -> ActivityLogSnapshot {
        let state = self.state.lock();
        let logs = state
            .detections
            .iter()
            .filter(|d| range.contains(d.at))
            .map(|d| ActivityLogRecord {
                id: d.id.to_string(),
                timestamp: d.at.to_rfc3339(),
                epc: d.epc.clone(),
                object_name: state
                    .tags
                    .iter()
                    .find(|t| t.epc == d.epc)
                    .map(|t| t.name.clone())
                    .unwrap_or_default(),
                reader: state.readers[d.reader].model.clone(),
                antenna: Some(d.antenna),
                rssi: Some(d.rssi),
                event: String::new(),
            })
            .collect();

        ActivityLogSnapshot { logs }
    }

    fn find_item(&self, query: &str, now: DateTime<Utc>) -> ItemSearchResponse {
        let state = self.state.lock();
        let needle = query.trim().to_lowercase();

        let Some(tag) = state
            .tags
            .iter()
            .find(|t| t.epc.eq_ignore_ascii_case(query.trim()) || t.name.to_lowercase().contains(&needle))
        else {
            return ItemSearchResponse::default();
        };

        let timeline: Vec<TimelineEntry> = state
            .detections
            .iter()
            .filter(|d| d.epc == tag.epc)
            .take(50)
            .map(|d| {
                let reader = &state.readers[d.reader];
                TimelineEntry {
                    timestamp: d.at.to_rfc3339(),
                    location: reader.location.clone(),
                    reader: reader.model.clone(),
                    antenna: Some(d.antenna),
                }
            })
            .collect();

        let current_location = timeline
            .first()
            .map(|t| format!("{} - {}", t.location, t.reader))
            .unwrap_or_else(|| "Unknown".to_string());
        let status = match tag.last_seen {
            Some(ts) if now - ts <= Duration::minutes(15) => "active",
            Some(ts) if now - ts <= Duration::hours(2) => "idle",
            _ => "missing",
        };

        ItemSearchResponse {
            found: true,
            item: Some(ItemRecord {
                epc: tag.epc.clone(),
                object_name: tag.name.clone(),
                responsible_person: tag.owner.clone(),
                current_location,
                status: status.to_string(),
                timeline,
            }),
        }
    }

    fn summary_lines(&self, now: DateTime<Utc>) -> LiveSummaryResponse {
        let state = self.state.lock();
        let cutoff = now - Duration::minutes(5);

        let summary = state
            .detections
            .iter()
            .take_while(|d| d.at >= cutoff)
            .map(|d| {
                let reader = &state.readers[d.reader];
                format!(
                    "Received EPC: {} | Reader: {} | Antenna: {} | RSSI: {:.2} | MAC: {} | Local Time (Finland): {}",
                    d.epc,
                    reader.model,
                    d.antenna,
                    d.rssi,
                    reader.mac,
                    d.at.with_timezone(&self.timezone).format("%Y-%m-%d %H:%M:%S")
                )
            })
            .collect();

        LiveSummaryResponse { summary }
    }
}

fn sim_reader(n: u32, model: &str, location: &str, installed_days_ago: i64) -> SimReader {
    SimReader {
        id: n.to_string(),
        model: model.to_string(),
        location: location.to_string(),
        mac: format!("00:16:25:12:00:{:02x}", n),
        ip: format!("10.80.26.{}", 100 + n),
        installed_days_ago,
    }
}

#[async_trait]
impl SnapshotSource for SimulatedSource {
    fn name(&self) -> &str {
        "simulator"
    }

    async fn live_tags(&self) -> Result<TagSnapshot> {
        self.step(Utc::now());
        Ok(self.tag_snapshot())
    }

    async fn reader_status(&self) -> Result<ReaderSnapshot> {
        Ok(self.reader_snapshot(Utc::now()))
    }

    async fn activity_logs(&self, range: &DateRange) -> Result<ActivityLogSnapshot> {
        Ok(self.log_snapshot(range))
    }

    async fn search_item(&self, query: &str) -> Result<ItemSearchResponse> {
        Ok(self.find_item(query, Utc::now()))
    }

    async fn live_summary(&self) -> Result<LiveSummaryResponse> {
        Ok(self.summary_lines(Utc::now()))
    }
}
