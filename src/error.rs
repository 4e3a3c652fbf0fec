// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tagwatch-rs

//! Error types.
//!
//! Transport failures are surfaced to the poll status indicator, malformed
//! records and unparseable timestamps are recovered inside the reconciler.
//! Nothing here is allowed to stop a polling loop.

use thiserror::Error;

/// Failure talking to the snapshot backend.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("request timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("snapshot source unavailable: {0}")]
    Unavailable(String),
}

/// A snapshot record that cannot be keyed and was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record #{index} rejected: {reason}")]
pub struct MalformedRecordError {
    pub index: usize,
    pub reason: String,
}

/// A record whose timestamp could not be parsed. The entity is kept and
/// classified stale (or by its server status).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unparseable timestamp {raw:?} for {epc}")]
pub struct ClassificationError {
    pub epc: String,
    pub raw: String,
}

/// Invalid configuration or caller input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("warm threshold ({warm}s) must not be below fresh threshold ({fresh}s)")]
    ThresholdOrder { fresh: u64, warm: u64 },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("invalid base URL {0:?}")]
    BaseUrl(String),

    #[error("unknown time zone {0:?}")]
    TimeZone(String),

    #[error("unknown log level {0:?}")]
    LogLevel(String),

    #[error("invalid date range: {from} is after {to}")]
    DateRange { from: String, to: String },

    #[error("search query must not be empty")]
    EmptyQuery,
}

/// Umbrella error for library operations.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Malformed(#[from] MalformedRecordError),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl TrackError {
    /// Transport failures keep the last good state and only flag the indicator.
    pub fn is_transient(&self) -> bool {
        matches!(self, TrackError::Transport(_))
    }
}

impl From<reqwest::Error> for TrackError {
    fn from(err: reqwest::Error) -> Self {
        TrackError::Transport(TransportError::Http(err))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TrackError>;
