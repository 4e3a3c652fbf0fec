//! Core module - polling, notifications and the tracking engine

mod engine;
mod scheduler;
mod event_bus;

pub use engine::TrackingEngine;
pub use scheduler::{
    with_timeout, PollHandle, PollJob, PollOutcome, PollScheduler, PollState, PollStatus,
    PollTarget, PollTracker,
};
pub use event_bus::{EventBus, UpdateEvent, UpdatePayload};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// System-wide state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemState {
    pub running: bool,
    pub source: String,
    pub tracked_entities: usize,
    pub online_readers: usize,
    pub total_readers: usize,
    pub uptime_seconds: u64,
    pub last_tag_update: Option<DateTime<Utc>>,
    pub last_reader_update: Option<DateTime<Utc>>,
    pub degraded: bool,
}
