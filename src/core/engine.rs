// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tagwatch-rs

//! Tracking engine - owns the live tables and drives the pollers

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::info;

use super::event_bus::{EventBus, UpdateEvent, UpdatePayload};
use super::scheduler::{
    with_timeout, PollHandle, PollJob, PollOutcome, PollScheduler, PollStatus, PollTarget,
    PollTracker,
};
use super::SystemState;
use crate::activity::{derive_event_kinds, ActivityLogRecord, DateRange, SummaryLine};
use crate::config::Config;
use crate::error::{ConfigError, Result};
use crate::query::{evaluate, evaluate_logs, QueryFilter};
use crate::readers::{HealthAggregator, HealthSummary, ReaderSummary};
use crate::source::{
    HttpSource, ItemRecord, ItemSearchResponse, ReaderSnapshot, SimulatedSource, SnapshotSource,
    TagSnapshot,
};
use crate::tracking::{
    parse_timestamp, EntityTable, Freshness, FreshnessPolicy, ReconcileReport, Reconciler,
    StatusCounts, TagView,
};

const DEMO_TAG_COUNT: usize = 24;

/// Live tag and reader state behind a pull-based snapshot source.
///
/// Tables are replaced wholesale on every applied poll; readers clone the
/// current `Arc` and never observe a half-applied snapshot. Statuses are
/// derived at read time, so an entity ages from fresh to stale without any
/// write.
pub struct TrackingEngine {
    config: Arc<Config>,
    source: Arc<dyn SnapshotSource>,
    policy: FreshnessPolicy,
    summary_tz: Tz,
    reconciler: Reconciler,
    health: HealthAggregator,
    table: RwLock<Arc<EntityTable>>,
    readers: RwLock<Arc<Vec<ReaderSummary>>>,
    tag_tracker: Arc<PollTracker>,
    reader_tracker: Arc<PollTracker>,
    events: EventBus,
    start_time: Instant,
}

impl TrackingEngine {
    pub fn new(config: Config, source: Arc<dyn SnapshotSource>) -> Result<Self> {
        config.validate()?;
        info!("Tracking engine using source {}", source.name());

        Ok(Self {
            policy: FreshnessPolicy::from_config(&config.freshness),
            summary_tz: config.source.summary_tz()?,
            reconciler: Reconciler::from_config(&config.reconciler),
            health: HealthAggregator::from_config(&config.health),
            config: Arc::new(config),
            source,
            table: RwLock::new(Arc::new(EntityTable::new())),
            readers: RwLock::new(Arc::new(Vec::new())),
            tag_tracker: Arc::new(PollTracker::new(PollTarget::LiveTags)),
            reader_tracker: Arc::new(PollTracker::new(PollTarget::ReaderStatus)),
            events: EventBus::default(),
            start_time: Instant::now(),
        })
    }

    /// Engine backed by the simulator in demo mode, the HTTP backend otherwise
    pub fn from_config(config: Config) -> Result<Self> {
        let source: Arc<dyn SnapshotSource> = if config.demo_mode {
            Arc::new(SimulatedSource::new(DEMO_TAG_COUNT).with_timezone(config.source.summary_tz()?))
        } else {
            Arc::new(HttpSource::new(config.source.clone())?)
        };
        Self::new(config, source)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn policy(&self) -> &FreshnessPolicy {
        &self.policy
    }

    /// Current entity table; cheap to hold across further polls
    pub fn table(&self) -> Arc<EntityTable> {
        self.table.read().clone()
    }

    pub fn get_entities(&self) -> Vec<TagView> {
        self.get_entities_at(Utc::now())
    }

    pub fn get_entities_at(&self, now: DateTime<Utc>) -> Vec<TagView> {
        self.table().views(&self.policy, now)
    }

    pub fn search(&self, filter: &QueryFilter) -> Vec<TagView> {
        self.search_at(filter, Utc::now())
    }

    pub fn search_at(&self, filter: &QueryFilter, now: DateTime<Utc>) -> Vec<TagView> {
        let table = self.table();
        evaluate(table.iter(), filter)
            .into_iter()
            .map(|entity| entity.view(&self.policy, now))
            .collect()
    }

    pub fn status_counts(&self) -> StatusCounts {
        self.status_counts_at(Utc::now())
    }

    pub fn status_counts_at(&self, now: DateTime<Utc>) -> StatusCounts {
        self.table().status_counts(&self.policy, now)
    }

    pub fn get_readers(&self) -> Arc<Vec<ReaderSummary>> {
        self.readers.read().clone()
    }

    pub fn get_reader_health(&self) -> HealthSummary {
        self.health.aggregate(&self.get_readers())
    }

    /// Register a callback fired after every applied poll.
    ///
    /// Per target, sequences arrive strictly increasing; an update overtaken
    /// by a newer applied poll is not delivered.
    pub fn on_update<F>(&self, callback: F)
    where
        F: Fn(&UpdateEvent) + Send + Sync + 'static,
    {
        self.events.on_update(callback);
    }

    pub fn subscribe_updates(&self) -> broadcast::Receiver<UpdateEvent> {
        self.events.subscribe()
    }

    pub fn poll_status(&self, target: PollTarget) -> PollStatus {
        self.tracker(target).status()
    }

    fn tracker(&self, target: PollTarget) -> &Arc<PollTracker> {
        match target {
            PollTarget::LiveTags => &self.tag_tracker,
            PollTarget::ReaderStatus => &self.reader_tracker,
        }
    }

    fn timeout(&self, target: PollTarget) -> Duration {
        let interval = match target {
            PollTarget::LiveTags => self.config.polling.tag_interval(),
            PollTarget::ReaderStatus => self.config.polling.reader_interval(),
        };
        self.config.source.timeout_for(interval)
    }

    /// Start the periodic poller for `target`
    pub fn start_polling(self: &Arc<Self>, target: PollTarget) -> PollHandle {
        match target {
            PollTarget::LiveTags => PollScheduler::spawn(
                Arc::new(TagPoll(Arc::clone(self))),
                self.config.polling.tag_interval(),
            ),
            PollTarget::ReaderStatus => PollScheduler::spawn(
                Arc::new(ReaderPoll(Arc::clone(self))),
                self.config.polling.reader_interval(),
            ),
        }
    }

    /// Fetch and reconcile tags once, outside the poll loop.
    ///
    /// Returns `None` when a newer poll was applied first.
    pub async fn refresh_tags(&self) -> Result<Option<ReconcileReport>> {
        let seq = self.tag_tracker.issue();
        match with_timeout(self.timeout(PollTarget::LiveTags), self.source.live_tags()).await {
            Ok(snapshot) => Ok(self.apply_tags(seq, snapshot).1),
            Err(err) => {
                self.tag_tracker.fail(seq, &err);
                Err(err)
            }
        }
    }

    /// Fetch reader status once, outside the poll loop
    pub async fn refresh_readers(&self) -> Result<Option<HealthSummary>> {
        let seq = self.reader_tracker.issue();
        match with_timeout(self.timeout(PollTarget::ReaderStatus), self.source.reader_status()).await {
            Ok(snapshot) => Ok(self.apply_readers(seq, snapshot).1),
            Err(err) => {
                self.reader_tracker.fail(seq, &err);
                Err(err)
            }
        }
    }

    // The bus drops a notification that lost the race to a newer apply, so
    // publishing after the tracker lock is released keeps sequences ordered.
    fn apply_tags(&self, seq: u64, snapshot: TagSnapshot) -> (PollOutcome, Option<ReconcileReport>) {
        let mut applied = None;
        let outcome = self.tag_tracker.apply(seq, snapshot, |snapshot| {
            let current = self.table();
            let (next, report) = self.reconciler.reconcile(&current, &snapshot.tags);
            let total = next.len();
            *self.table.write() = Arc::new(next);
            applied = Some((report, total));
        });

        let Some((report, total)) = applied else {
            return (outcome, None);
        };
        self.events
            .publish(PollTarget::LiveTags, seq, UpdatePayload::tags(&report, total));
        (outcome, Some(report))
    }

    fn apply_readers(&self, seq: u64, snapshot: ReaderSnapshot) -> (PollOutcome, Option<HealthSummary>) {
        let mut applied = None;
        let outcome = self.reader_tracker.apply(seq, snapshot, |snapshot| {
            let readers = self.health.summarize(&snapshot.readers);
            let summary = self.health.aggregate(&readers);
            *self.readers.write() = Arc::new(readers);
            applied = Some(summary);
        });

        let Some(summary) = applied else {
            return (outcome, None);
        };
        self.events.publish(
            PollTarget::ReaderStatus,
            seq,
            UpdatePayload::Readers {
                online: summary.online_count,
                total: summary.total_readers,
            },
        );
        (outcome, Some(summary))
    }

    /// Look up one item. The returned status is re-derived from the newest
    /// timeline entry with the local thresholds.
    pub async fn lookup_item(&self, query: &str) -> Result<ItemSearchResponse> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ConfigError::EmptyQuery.into());
        }

        let mut response =
            with_timeout(self.timeout(PollTarget::LiveTags), self.source.search_item(query)).await?;
        if let Some(item) = response.item.as_mut() {
            item.status = item_freshness(item, &self.policy, Utc::now())
                .entity_label()
                .to_string();
        }
        Ok(response)
    }

    /// Activity logs for `range` with missing event kinds filled in
    pub async fn activity_logs(&self, range: &DateRange) -> Result<Vec<ActivityLogRecord>> {
        let snapshot = with_timeout(
            self.timeout(PollTarget::LiveTags),
            self.source.activity_logs(range),
        )
        .await?;

        let mut logs = snapshot.logs;
        derive_event_kinds(&mut logs);
        Ok(logs)
    }

    pub async fn search_logs(&self, range: &DateRange, filter: &QueryFilter) -> Result<Vec<ActivityLogRecord>> {
        let logs = self.activity_logs(range).await?;
        Ok(evaluate_logs(&logs, filter).into_iter().cloned().collect())
    }

    /// Raw summary lines of recent detections, parsed
    pub async fn live_summary_lines(&self) -> Result<Vec<SummaryLine>> {
        let response =
            with_timeout(self.timeout(PollTarget::LiveTags), self.source.live_summary()).await?;
        Ok(SummaryLine::parse_all(response.summary.iter().map(String::as_str)))
    }

    /// Row class of a summary line, reading its local time in `source.summary_timezone`
    pub fn summary_row_class(&self, line: &SummaryLine, now: DateTime<Utc>) -> &'static str {
        line.row_class(&self.policy, self.summary_tz, now)
    }

    pub fn state(&self) -> SystemState {
        let tags = self.tag_tracker.status();
        let readers = self.reader_tracker.status();
        let health = self.get_reader_health();

        SystemState {
            running: tags.active || readers.active,
            source: self.source.name().to_string(),
            tracked_entities: self.table().len(),
            online_readers: health.online_count,
            total_readers: health.total_readers,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            last_tag_update: tags.last_success,
            last_reader_update: readers.last_success,
            degraded: tags.is_degraded() || readers.is_degraded(),
        }
    }
}

/// Newest parseable timeline entry decides; the server label is the fallback
fn item_freshness(item: &ItemRecord, policy: &FreshnessPolicy, now: DateTime<Utc>) -> Freshness {
    let newest = item
        .timeline
        .iter()
        .filter_map(|entry| parse_timestamp(&entry.timestamp))
        .max();

    match newest {
        Some(seen) => policy.classify(seen, now),
        None => Freshness::from_label(&item.status).unwrap_or(Freshness::Stale),
    }
}

struct TagPoll(Arc<TrackingEngine>);

#[async_trait]
impl PollJob for TagPoll {
    type Snapshot = TagSnapshot;

    fn tracker(&self) -> Arc<PollTracker> {
        Arc::clone(&self.0.tag_tracker)
    }

    fn timeout(&self) -> Duration {
        self.0.timeout(PollTarget::LiveTags)
    }

    async fn fetch(&self) -> Result<TagSnapshot> {
        self.0.source.live_tags().await
    }

    fn complete(&self, seq: u64, result: Result<TagSnapshot>) -> PollOutcome {
        match result {
            Ok(snapshot) => self.0.apply_tags(seq, snapshot).0,
            Err(err) => self.0.tag_tracker.fail(seq, &err),
        }
    }
}

struct ReaderPoll(Arc<TrackingEngine>);

#[async_trait]
impl PollJob for ReaderPoll {
    type Snapshot = ReaderSnapshot;

    fn tracker(&self) -> Arc<PollTracker> {
        Arc::clone(&self.0.reader_tracker)
    }

    fn timeout(&self) -> Duration {
        self.0.timeout(PollTarget::ReaderStatus)
    }

    async fn fetch(&self) -> Result<ReaderSnapshot> {
        self.0.source.reader_status().await
    }

    fn complete(&self, seq: u64, result: Result<ReaderSnapshot>) -> PollOutcome {
        match result {
            Ok(snapshot) => self.0.apply_readers(seq, snapshot).0,
            Err(err) => self.0.reader_tracker.fail(seq, &err),
        }
    }
}
