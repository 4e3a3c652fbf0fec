//! Reader module - per-reader status and antenna health

mod health;

pub use health::*;

use serde::{Deserialize, Serialize};

/// Reader connectivity as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReaderStatus {
    Online,
    Offline,
    Unknown,
}

impl ReaderStatus {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "online" => ReaderStatus::Online,
            "offline" => ReaderStatus::Offline,
            _ => ReaderStatus::Unknown,
        }
    }

    pub fn is_online(self) -> bool {
        self == ReaderStatus::Online
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AntennaStatus {
    Active,
    Inactive,
}

impl AntennaStatus {
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("active") {
            AntennaStatus::Active
        } else {
            AntennaStatus::Inactive
        }
    }
}

/// One antenna port of a reader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AntennaSummary {
    pub number: u32,
    pub status: AntennaStatus,
    pub tags_detected: u64,
    /// Raw power as reported
    pub power_level: f64,
    /// Power as a percentage of the hardware ceiling, clamped to [0, 100]
    pub normalized_power: f64,
}

/// Reader state derived from one reader-status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderSummary {
    pub id: String,
    pub name: String,
    pub model: String,
    pub location: String,
    pub online_status: ReaderStatus,
    pub ip_address: String,
    pub antennas: Vec<AntennaSummary>,
    pub total_tags_detected: u64,
    pub uptime: String,
}

impl ReaderSummary {
    pub fn active_antennas(&self) -> usize {
        self.antennas
            .iter()
            .filter(|a| a.status == AntennaStatus::Active)
            .count()
    }
}

/// Fleet-wide roll-up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSummary {
    pub online_count: usize,
    pub total_readers: usize,
    pub total_tags_detected: u64,
    pub total_antennas: usize,
    pub active_antennas: usize,
    pub system_healthy: bool,
}
