// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tagwatch-rs

//! Update notifications after each applied poll

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use super::PollTarget;
use crate::tracking::ReconcileReport;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpdatePayload {
    Tags {
        inserted: usize,
        updated: usize,
        unchanged: usize,
        rejected: usize,
        total_entities: usize,
    },
    Readers {
        online: usize,
        total: usize,
    },
}

impl UpdatePayload {
    pub fn tags(report: &ReconcileReport, total_entities: usize) -> Self {
        UpdatePayload::Tags {
            inserted: report.inserted,
            updated: report.updated,
            unchanged: report.unchanged,
            rejected: report.rejected(),
            total_entities,
        }
    }
}

/// Fired after a successful reconciliation or reader refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEvent {
    pub id: u64,
    pub target: PollTarget,
    /// Sequence number of the applied poll
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: UpdatePayload,
}

type Listener = Arc<dyn Fn(&UpdateEvent) + Send + Sync + 'static>;

/// Callback registry plus a broadcast channel for async subscribers.
///
/// Per target, events are delivered in strictly increasing `sequence` order.
/// An event whose sequence is not above the last one delivered for its
/// target describes a state that has already been superseded and is dropped.
pub struct EventBus {
    event_tx: broadcast::Sender<UpdateEvent>,
    listeners: Mutex<Vec<Listener>>,
    event_counter: AtomicU64,
    delivered: Mutex<HashMap<PollTarget, u64>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);

        Self {
            event_tx,
            listeners: Mutex::new(Vec::new()),
            event_counter: AtomicU64::new(0),
            delivered: Mutex::new(HashMap::new()),
        }
    }

    pub fn on_update<F>(&self, callback: F)
    where
        F: Fn(&UpdateEvent) + Send + Sync + 'static,
    {
        self.listeners.lock().push(Arc::new(callback));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.event_tx.subscribe()
    }

    /// Deliver an update to callbacks and subscribers.
    ///
    /// Returns `None` when a later sequence for `target` was already
    /// delivered. Callbacks run with the delivery lock held and must not
    /// publish themselves.
    pub fn publish(&self, target: PollTarget, sequence: u64, payload: UpdatePayload) -> Option<UpdateEvent> {
        let mut delivered = self.delivered.lock();
        if let Some(&last) = delivered.get(&target) {
            if sequence <= last {
                debug!("{}: update #{} superseded by #{}, not delivered", target, sequence, last);
                return None;
            }
        }
        delivered.insert(target, sequence);

        let id = self.event_counter.fetch_add(1, Ordering::Relaxed);
        let event = UpdateEvent {
            id,
            target,
            sequence,
            timestamp: Utc::now(),
            payload,
        };

        // callbacks may register further callbacks
        let listeners = self.listeners.lock().clone();
        for listener in &listeners {
            listener(&event);
        }

        let _ = self.event_tx.send(event.clone());
        Some(event)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
