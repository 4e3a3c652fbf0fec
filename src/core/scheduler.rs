// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tagwatch-rs

//! Poll scheduling for snapshot targets
//!
//! Each target owns a [`PollTracker`]: a sequence counter, the in-flight slot
//! and the user-visible status indicator. The loop in [`PollScheduler`] ticks
//! at a fixed interval, skips a tick while a fetch is outstanding, and hands
//! every completed fetch back to the tracker, which applies it only if nothing
//! newer has been applied and the owning view is still active.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{Result, TrackError, TransportError};

/// Logical poll target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollTarget {
    LiveTags,
    ReaderStatus,
}

impl PollTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            PollTarget::LiveTags => "live_tags",
            PollTarget::ReaderStatus => "reader_status",
        }
    }
}

impl std::fmt::Display for PollTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    Idle,
    Fetching,
    Settled,
    Failed,
}

/// What happened to a completed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Reconciled into the live state
    Applied,
    /// A newer response was already applied
    Discarded,
    /// Fetch failed; previous state kept
    Failed,
    /// The view that issued the fetch has stopped
    Dropped,
}

/// User-visible poll indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollStatus {
    pub target: PollTarget,
    pub state: PollState,
    pub active: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub applied_sequence: u64,
    pub skipped_ticks: u64,
    pub discarded_responses: u64,
}

impl PollStatus {
    fn new(target: PollTarget) -> Self {
        Self {
            target,
            state: PollState::Idle,
            active: false,
            last_success: None,
            last_failure: None,
            last_error: None,
            consecutive_failures: 0,
            applied_sequence: 0,
            skipped_ticks: 0,
            discarded_responses: 0,
        }
    }

    /// Last poll failed and nothing has succeeded since
    pub fn is_degraded(&self) -> bool {
        self.consecutive_failures > 0
    }
}

struct TrackerInner {
    next_seq: u64,
    in_flight: Option<u64>,
    highest_applied: u64,
    /// Sequences up to here belong to a view that has since stopped
    retired_through: u64,
    status: PollStatus,
}

/// Sequencing and status for one poll target.
///
/// All bookkeeping and the apply callback run under one lock, so a target
/// has a single writer and responses are applied strictly in sequence order.
pub struct PollTracker {
    target: PollTarget,
    active: AtomicBool,
    inner: Mutex<TrackerInner>,
}

impl PollTracker {
    pub fn new(target: PollTarget) -> Self {
        Self {
            target,
            active: AtomicBool::new(false),
            inner: Mutex::new(TrackerInner {
                next_seq: 0,
                in_flight: None,
                highest_applied: 0,
                retired_through: 0,
                status: PollStatus::new(target),
            }),
        }
    }

    pub fn target(&self) -> PollTarget {
        self.target
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn activate(&self) {
        self.active.store(true, Ordering::SeqCst);
    }

    /// Stop the owning view. Fetches issued so far will be dropped on completion.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
        let mut inner = self.inner.lock();
        inner.retired_through = inner.next_seq;
        inner.in_flight = None;
        if inner.status.state == PollState::Fetching {
            inner.status.state = PollState::Idle;
        }
    }

    /// Claim the in-flight slot for a scheduled tick.
    ///
    /// Returns `None` (and counts a skipped tick) while an earlier fetch is
    /// still outstanding.
    pub fn begin(&self) -> Option<u64> {
        let mut inner = self.inner.lock();
        if let Some(pending) = inner.in_flight {
            inner.status.skipped_ticks += 1;
            debug!("{}: poll #{} still in flight, skipping tick", self.target, pending);
            return None;
        }
        let seq = Self::next(&mut inner);
        inner.in_flight = Some(seq);
        Some(seq)
    }

    /// Sequence number for an out-of-band refresh; bypasses the in-flight slot
    pub fn issue(&self) -> u64 {
        Self::next(&mut self.inner.lock())
    }

    fn next(inner: &mut TrackerInner) -> u64 {
        inner.next_seq += 1;
        inner.status.state = PollState::Fetching;
        inner.next_seq
    }

    /// Settle fetch `seq`
    pub fn finish<T>(&self, seq: u64, result: Result<T>, apply: impl FnOnce(T)) -> PollOutcome {
        match result {
            Ok(snapshot) => self.apply(seq, snapshot, apply),
            Err(err) => self.fail(seq, &err),
        }
    }

    /// Apply a successful response unless it is stale or its view stopped
    pub fn apply<T>(&self, seq: u64, snapshot: T, apply: impl FnOnce(T)) -> PollOutcome {
        let mut inner = self.inner.lock();
        if let Some(outcome) = self.settle(&mut inner, seq) {
            return outcome;
        }

        apply(snapshot);

        inner.highest_applied = seq;
        let status = &mut inner.status;
        status.state = PollState::Settled;
        status.applied_sequence = seq;
        status.last_success = Some(Utc::now());
        status.last_error = None;
        status.consecutive_failures = 0;
        PollOutcome::Applied
    }

    /// Record a failed fetch. The previously applied state is left untouched.
    pub fn fail(&self, seq: u64, err: &TrackError) -> PollOutcome {
        let mut inner = self.inner.lock();
        if let Some(outcome) = self.settle(&mut inner, seq) {
            return outcome;
        }

        warn!("{}: poll #{} failed: {}", self.target, seq, err);
        let status = &mut inner.status;
        status.state = PollState::Failed;
        status.last_failure = Some(Utc::now());
        status.last_error = Some(err.to_string());
        status.consecutive_failures += 1;
        PollOutcome::Failed
    }

    /// Release the in-flight slot and reject dropped or superseded responses
    fn settle(&self, inner: &mut TrackerInner, seq: u64) -> Option<PollOutcome> {
        if inner.in_flight == Some(seq) {
            inner.in_flight = None;
        }

        if seq <= inner.retired_through {
            debug!("{}: dropping poll #{} from a stopped view", self.target, seq);
            return Some(PollOutcome::Dropped);
        }

        if seq <= inner.highest_applied {
            debug!(
                "{}: discarding poll #{}, #{} already applied",
                self.target, seq, inner.highest_applied
            );
            inner.status.discarded_responses += 1;
            return Some(PollOutcome::Discarded);
        }

        None
    }

    pub fn status(&self) -> PollStatus {
        let mut status = self.inner.lock().status.clone();
        status.active = self.is_active();
        status
    }
}

/// Bound a fetch by `limit`; expiry counts as a transport failure
pub async fn with_timeout<T, F>(limit: Duration, fetch: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match time::timeout(limit, fetch).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout {
            after_ms: limit.as_millis() as u64,
        }
        .into()),
    }
}

/// One periodically refreshed target
#[async_trait]
pub trait PollJob: Send + Sync + 'static {
    type Snapshot: Send + 'static;

    fn tracker(&self) -> Arc<PollTracker>;

    /// Bounded wait for a single fetch
    fn timeout(&self) -> Duration;

    async fn fetch(&self) -> Result<Self::Snapshot>;

    /// Hand a finished fetch to the tracker
    fn complete(&self, seq: u64, result: Result<Self::Snapshot>) -> PollOutcome;
}

/// Fixed-interval poll loop.
///
/// The loop re-arms on every tick regardless of the previous outcome. There
/// is no backoff; a failing backend is retried at the normal cadence.
pub struct PollScheduler;

impl PollScheduler {
    pub fn spawn<J: PollJob>(job: Arc<J>, interval: Duration) -> PollHandle {
        let tracker = job.tracker();
        let target = tracker.target();
        tracker.activate();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(Self::run(job, interval, shutdown_rx));

        info!("Polling {} every {:?}", target, interval);
        PollHandle {
            target,
            tracker,
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }

    async fn run<J: PollJob>(job: Arc<J>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let tracker = job.tracker();
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    let Some(seq) = tracker.begin() else {
                        continue;
                    };

                    let job = Arc::clone(&job);
                    tokio::spawn(async move {
                        let result = with_timeout(job.timeout(), job.fetch()).await;
                        job.complete(seq, result);
                    });
                }
            }
        }

        debug!("{} poll loop exited", tracker.target());
    }
}

/// Running poll loop for one target
pub struct PollHandle {
    target: PollTarget,
    tracker: Arc<PollTracker>,
    shutdown: broadcast::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn target(&self) -> PollTarget {
        self.target
    }

    pub fn status(&self) -> PollStatus {
        self.tracker.status()
    }

    /// Stop the timer and wait for the loop to exit.
    ///
    /// A fetch still in flight is not cancelled but its result is dropped.
    pub async fn stop(mut self) {
        self.tracker.deactivate();
        let _ = self.shutdown.send(());
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!("Stopped polling {}", self.target);
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.tracker.deactivate();
            let _ = self.shutdown.send(());
        }
    }
}
