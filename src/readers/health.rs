// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tagwatch-rs

//! Reader health aggregation

use tracing::debug;

use super::{AntennaStatus, AntennaSummary, HealthSummary, ReaderStatus, ReaderSummary};
use crate::config::HealthConfig;
use crate::source::{AntennaRecord, ReaderRecord};

/// Builds reader summaries and the fleet roll-up.
///
/// Stateless: every reader-status snapshot is authoritative for its cycle.
#[derive(Debug, Clone)]
pub struct HealthAggregator {
    max_power: f64,
}

impl Default for HealthAggregator {
    fn default() -> Self {
        Self::from_config(&HealthConfig::default())
    }
}

impl HealthAggregator {
    pub fn new(max_power: f64) -> Self {
        Self { max_power }
    }

    pub fn from_config(config: &HealthConfig) -> Self {
        Self::new(config.max_power)
    }

    /// `power / max_power * 100`, clamped to [0, 100]
    pub fn normalized_power(&self, power: f64) -> f64 {
        if !(self.max_power > 0.0) || !power.is_finite() {
            return 0.0;
        }
        (power / self.max_power * 100.0).clamp(0.0, 100.0)
    }

    pub fn summarize(&self, readers: &[ReaderRecord]) -> Vec<ReaderSummary> {
        readers.iter().map(|r| self.summarize_reader(r)).collect()
    }

    pub fn summarize_reader(&self, reader: &ReaderRecord) -> ReaderSummary {
        let name = [&reader.name, &reader.location, &reader.model]
            .into_iter()
            .find(|s| !s.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| format!("Reader-{}", reader.id));

        ReaderSummary {
            id: reader.id.clone(),
            name,
            model: reader.model.clone(),
            location: reader.location.clone(),
            online_status: ReaderStatus::from_label(&reader.status),
            ip_address: reader.ip_address.clone(),
            antennas: reader.antennas.iter().map(|a| self.summarize_antenna(a)).collect(),
            total_tags_detected: reader.total_tags_detected,
            uptime: reader.uptime.clone(),
        }
    }

    fn summarize_antenna(&self, antenna: &AntennaRecord) -> AntennaSummary {
        let power = antenna.power.unwrap_or(0.0);
        AntennaSummary {
            number: antenna.number,
            status: AntennaStatus::from_label(&antenna.status),
            tags_detected: antenna.tags_detected,
            power_level: power,
            normalized_power: self.normalized_power(power),
        }
    }

    /// Online count comes from each reader's status field only
    pub fn aggregate(&self, readers: &[ReaderSummary]) -> HealthSummary {
        let online_count = readers.iter().filter(|r| r.online_status.is_online()).count();
        let summary = HealthSummary {
            online_count,
            total_readers: readers.len(),
            total_tags_detected: readers.iter().map(|r| r.total_tags_detected).sum(),
            total_antennas: readers.iter().map(|r| r.antennas.len()).sum(),
            active_antennas: readers.iter().map(|r| r.active_antennas()).sum(),
            system_healthy: online_count > 0,
        };
        debug!("Reader health: {}/{} online", summary.online_count, summary.total_readers);
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn antenna(number: u32, power: f64, tags: u64) -> AntennaRecord {
        AntennaRecord {
            number,
            status: if tags > 0 { "active" } else { "inactive" }.to_string(),
            tags_detected: tags,
            power: Some(power),
        }
    }

    fn reader(id: &str, status: &str, antennas: Vec<AntennaRecord>, total: u64) -> ReaderRecord {
        ReaderRecord {
            id: id.to_string(),
            name: format!("Reader {id}"),
            status: status.to_string(),
            antennas,
            total_tags_detected: total,
            ..Default::default()
        }
    }

    #[test]
    fn test_normalized_power() {
        let aggregator = HealthAggregator::default();
        let readers = aggregator.summarize(&[reader(
            "1",
            "offline",
            vec![antenna(1, 30.0, 4), antenna(2, 0.0, 0)],
            4,
        )]);

        let powers: Vec<f64> = readers[0].antennas.iter().map(|a| a.normalized_power).collect();
        assert!((powers[0] - 96.774).abs() < 0.01);
        assert_eq!(powers[1], 0.0);

        let health = aggregator.aggregate(&readers);
        assert_eq!(health.online_count, 0);
        assert!(!health.system_healthy);
    }

    #[test]
    fn test_power_is_clamped() {
        let aggregator = HealthAggregator::new(31.0);
        assert_eq!(aggregator.normalized_power(45.0), 100.0);
        assert_eq!(aggregator.normalized_power(-3.0), 0.0);
        assert_eq!(aggregator.normalized_power(f64::NAN), 0.0);
        assert_eq!(HealthAggregator::new(0.0).normalized_power(10.0), 0.0);
    }

    #[test]
    fn test_aggregate() {
        let aggregator = HealthAggregator::default();
        let readers = aggregator.summarize(&[
            reader("1", "online", vec![antenna(1, 30.0, 10), antenna(2, 30.0, 2)], 12),
            reader("2", "offline", vec![antenna(1, 0.0, 0)], 0),
            reader("3", "rebooting", vec![], 5),
        ]);

        let health = aggregator.aggregate(&readers);
        assert_eq!(health.online_count, 1);
        assert_eq!(health.total_readers, 3);
        assert_eq!(health.total_tags_detected, 17);
        assert_eq!(health.total_antennas, 3);
        assert_eq!(health.active_antennas, 2);
        assert!(health.system_healthy);
        assert_eq!(readers[2].online_status, ReaderStatus::Unknown);
    }

    #[test]
    fn test_empty_fleet_is_unhealthy() {
        let health = HealthAggregator::default().aggregate(&[]);
        assert_eq!(health, HealthSummary::default());
        assert!(!health.system_healthy);
    }

    #[test]
    fn test_name_fallbacks() {
        let aggregator = HealthAggregator::default();

        let mut record = reader("7", "online", vec![], 0);
        record.name.clear();
        record.location = "Warehouse".to_string();
        assert_eq!(aggregator.summarize_reader(&record).name, "Warehouse");

        record.location.clear();
        record.model = "Speedway R420".to_string();
        assert_eq!(aggregator.summarize_reader(&record).name, "Speedway R420");

        record.model.clear();
        assert_eq!(aggregator.summarize_reader(&record).name, "Reader-7");
    }

    #[test]
    fn test_missing_power_is_zero() {
        let aggregator = HealthAggregator::default();
        let mut record = reader("1", "online", vec![antenna(1, 0.0, 0)], 0);
        record.antennas[0].power = None;

        let summary = aggregator.summarize_reader(&record);
        assert_eq!(summary.antennas[0].power_level, 0.0);
        assert_eq!(summary.antennas[0].normalized_power, 0.0);
    }
}
