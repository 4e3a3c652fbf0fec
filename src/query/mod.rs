// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tagwatch-rs

//! Query module - search text and categorical filters
//!
//! `matches = search AND reader AND event`. Search is a case-insensitive
//! substring test over any searchable field; reader and event constraints are
//! exact matches, with [`ALL`] meaning no constraint. Evaluation borrows the
//! input and never mutates it.

use serde::{Deserialize, Serialize};

use crate::activity::{ActivityLogRecord, SummaryLine};
use crate::tracking::{EntityTable, TagView, TrackedEntity};

/// Sentinel for "no constraint"
pub const ALL: &str = "all";

/// Search text plus categorical filters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryFilter {
    pub search_text: String,
    pub reader_filter: String,
    pub event_type_filter: String,
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            search_text: String::new(),
            reader_filter: ALL.to_string(),
            event_type_filter: ALL.to_string(),
        }
    }
}

impl QueryFilter {
    pub fn search(text: impl Into<String>) -> Self {
        Self {
            search_text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_reader(mut self, reader: impl Into<String>) -> Self {
        self.reader_filter = reader.into();
        self
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event_type_filter = event.into();
        self
    }

    /// True when every item matches
    pub fn is_unconstrained(&self) -> bool {
        self.search_text.trim().is_empty()
            && is_all(&self.reader_filter)
            && is_all(&self.event_type_filter)
    }

    pub fn matches<T: Searchable + ?Sized>(&self, item: &T) -> bool {
        self.matches_needle(&self.needle(), item)
    }

    fn needle(&self) -> String {
        self.search_text.trim().to_lowercase()
    }

    fn matches_needle<T: Searchable + ?Sized>(&self, needle: &str, item: &T) -> bool {
        let matches_search = needle.is_empty()
            || item
                .search_fields()
                .iter()
                .any(|field| field.to_lowercase().contains(needle));

        let matches_reader = is_all(&self.reader_filter) || item.reader_key() == self.reader_filter;

        let matches_event = is_all(&self.event_type_filter)
            || item
                .event_key()
                .map_or(false, |event| event == self.event_type_filter);

        matches_search && matches_reader && matches_event
    }
}

fn is_all(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case(ALL)
}

/// Something the query engine can filter
pub trait Searchable {
    /// Fields tested by the free-text search
    fn search_fields(&self) -> Vec<&str>;

    /// Value compared against the reader filter
    fn reader_key(&self) -> &str;

    /// Value compared against the event filter. Items without one only pass `all`.
    fn event_key(&self) -> Option<&str>;
}

impl Searchable for TrackedEntity {
    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.epc.as_str(),
            self.id.as_str(),
            self.display_name.as_str(),
            self.last_reader_id.as_str(),
            self.last_mac.as_str(),
        ]
    }

    fn reader_key(&self) -> &str {
        &self.last_reader_id
    }

    fn event_key(&self) -> Option<&str> {
        Some(self.last_event.as_str())
    }
}

impl Searchable for TagView {
    fn search_fields(&self) -> Vec<&str> {
        self.entity.search_fields()
    }

    fn reader_key(&self) -> &str {
        self.entity.reader_key()
    }

    fn event_key(&self) -> Option<&str> {
        self.entity.event_key()
    }
}

impl Searchable for ActivityLogRecord {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.epc.as_str(), self.object_name.as_str(), self.reader.as_str()]
    }

    fn reader_key(&self) -> &str {
        &self.reader
    }

    fn event_key(&self) -> Option<&str> {
        let event = self.event.trim();
        if event.is_empty() {
            None
        } else {
            Some(event)
        }
    }
}

impl Searchable for SummaryLine {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.epc.as_str(), self.reader.as_str(), self.mac.as_str()]
    }

    fn reader_key(&self) -> &str {
        &self.reader
    }

    fn event_key(&self) -> Option<&str> {
        None
    }
}

/// Items matching `filter`, in input order
pub fn evaluate<'a, T, I>(items: I, filter: &QueryFilter) -> Vec<&'a T>
where
    T: Searchable + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let needle = filter.needle();
    items
        .into_iter()
        .filter(|item| filter.matches_needle(&needle, *item))
        .collect()
}

pub fn evaluate_entities<'a>(table: &'a EntityTable, filter: &QueryFilter) -> Vec<&'a TrackedEntity> {
    evaluate(table.iter(), filter)
}

pub fn evaluate_logs<'a>(logs: &'a [ActivityLogRecord], filter: &QueryFilter) -> Vec<&'a ActivityLogRecord> {
    evaluate(logs, filter)
}
