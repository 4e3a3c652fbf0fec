// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tagwatch-rs

//! TagWatch - Live RFID Tag Tracking
//!
//! Keeps a live picture of where RFID-tagged items are, built from periodic
//! snapshots of a reader backend:
//! - Snapshot reconciliation into a per-EPC entity table with bounded history
//! - Freshness classification (fresh / warm / stale) derived at read time
//! - Reader and antenna health roll-ups
//! - Free-text search with reader and event filters
//! - Fixed-interval polling with in-flight coalescing and stale-response guards
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Tracking Engine                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌───────────┐   ┌────────────┐               │
//! │  │ Snapshot │ → │   Poll    │ → │ Reconciler │ → EntityTable │
//! │  │  Source  │   │ Scheduler │   │  / Health  │   Readers     │
//! │  └──────────┘   └───────────┘   └────────────┘               │
//! │                       ↓                ↓                     │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                     Event Bus                          │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │        Freshness Classifier · Query Engine (read side)       │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod activity;
pub mod config;
pub mod core;
pub mod error;
pub mod query;
pub mod readers;
pub mod source;
pub mod tracking;

// Re-exports for convenience
pub use config::Config;
pub use crate::core::{EventBus, PollHandle, PollStatus, PollTarget, TrackingEngine, UpdateEvent};
pub use error::{Result, TrackError};
pub use query::QueryFilter;
pub use readers::{HealthAggregator, HealthSummary, ReaderSummary};
pub use source::{HttpSource, SimulatedSource, SnapshotSource};
pub use tracking::{EntityTable, Freshness, FreshnessPolicy, Reconciler, TagView, TrackedEntity};

/// TagWatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// TagWatch name
pub const NAME: &str = "TagWatch";
