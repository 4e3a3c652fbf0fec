//! Source module - where snapshots come from

mod http;
mod simulator;
pub(crate) mod wire;

pub use http::HttpSource;
pub use simulator::SimulatedSource;
pub use wire::{
    ActivityEntry, ActivityLogSnapshot, AntennaRecord, ItemRecord, ItemSearchResponse,
    LiveSummaryResponse, ReaderRecord, ReaderSnapshot, TagRecord, TagSnapshot, TimelineEntry,
};

use async_trait::async_trait;

use crate::activity::DateRange;
use crate::error::Result;

/// Pull contract of the snapshot backend
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Human-readable name for logs
    fn name(&self) -> &str;

    /// Current detection-derived tag records
    async fn live_tags(&self) -> Result<TagSnapshot>;

    /// Current reader and antenna status
    async fn reader_status(&self) -> Result<ReaderSnapshot>;

    /// Detections between two calendar days, inclusive
    async fn activity_logs(&self, range: &DateRange) -> Result<ActivityLogSnapshot>;

    /// Look up a single item by EPC, barcode or name
    async fn search_item(&self, query: &str) -> Result<ItemSearchResponse>;

    /// Raw summary lines of recent detections
    async fn live_summary(&self) -> Result<LiveSummaryResponse>;
}
