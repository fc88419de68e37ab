// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Error types for bag I/O and job execution.
//!
//! Every error carries enough context to produce a human-readable reason
//! string for the status feed. Errors raised inside a filter job are
//! captured on the job's terminal state and never escape to the executor
//! or to other jobs.

use std::fmt;

/// Errors that can occur while indexing, filtering, or writing bags.
#[derive(Debug, Clone)]
pub enum BagError {
    /// File missing, unreadable, or not a valid bag container
    Open {
        /// Path of the container
        path: String,
        /// Error message
        reason: String,
    },

    /// Container index unparsable and linear-scan recovery failed
    Corrupt {
        /// Path of the container
        path: String,
        /// Error message
        reason: String,
    },

    /// I/O failure while appending to or finalizing an output container
    Write {
        /// Path of the output container
        path: String,
        /// Error message
        reason: String,
    },

    /// Another queued or running job already targets this output path
    PathInUse {
        /// The conflicting output path
        path: String,
    },

    /// Requested channels absent from the source container (advisory)
    TopicNotFound {
        /// The channel names that were not found
        channels: Vec<String>,
    },

    /// Filter window with start after end
    InvalidTimeRange {
        /// Window start (nanoseconds)
        start: u64,
        /// Window end (nanoseconds)
        end: u64,
    },

    /// Job cancelled before completion
    Cancelled,

    /// Other error
    Other(String),
}

impl BagError {
    /// Create an open error.
    pub fn open(path: impl Into<String>, reason: impl Into<String>) -> Self {
        BagError::Open {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a corrupt-container error.
    pub fn corrupt(path: impl Into<String>, reason: impl Into<String>) -> Self {
        BagError::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a write error.
    pub fn write(path: impl Into<String>, reason: impl Into<String>) -> Self {
        BagError::Write {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a path-in-use error.
    pub fn path_in_use(path: impl Into<String>) -> Self {
        BagError::PathInUse { path: path.into() }
    }

    /// Create a topic-not-found error.
    pub fn topic_not_found(channels: Vec<String>) -> Self {
        BagError::TopicNotFound { channels }
    }

    /// Create an invalid-time-range error.
    pub fn invalid_time_range(start: u64, end: u64) -> Self {
        BagError::InvalidTimeRange { start, end }
    }

    /// Stable kind tag for the status feed and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BagError::Open { .. } => "open",
            BagError::Corrupt { .. } => "corrupt",
            BagError::Write { .. } => "write",
            BagError::PathInUse { .. } => "path_in_use",
            BagError::TopicNotFound { .. } => "topic_not_found",
            BagError::InvalidTimeRange { .. } => "invalid_time_range",
            BagError::Cancelled => "cancelled",
            BagError::Other(_) => "other",
        }
    }

    /// Whether this error came from a cancellation request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BagError::Cancelled)
    }
}

impl fmt::Display for BagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BagError::Open { path, reason } => {
                write!(f, "Failed to open '{path}': {reason}")
            }
            BagError::Corrupt { path, reason } => {
                write!(f, "Corrupt container '{path}': {reason}")
            }
            BagError::Write { path, reason } => {
                write!(f, "Failed to write '{path}': {reason}")
            }
            BagError::PathInUse { path } => {
                write!(f, "Output path '{path}' is already targeted by a queued or running job")
            }
            BagError::TopicNotFound { channels } => {
                write!(f, "Channels not found in source: {}", channels.join(", "))
            }
            BagError::InvalidTimeRange { start, end } => {
                write!(f, "Invalid time range: start {start} is after end {end}")
            }
            BagError::Cancelled => write!(f, "Job cancelled"),
            BagError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for BagError {}

/// Result type for bagsift operations.
pub type Result<T> = std::result::Result<T, BagError>;
