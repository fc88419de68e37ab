// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Record selection for filtering runs.
//!
//! A [`FilterSpec`] decides per record whether it should be copied to
//! the output. Selection is independent of validation: asking for a
//! channel the source does not carry simply matches nothing, and
//! [`FilterSpec::validate`] is a separate advisory pre-check for callers
//! that want early feedback.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{BagError, Result};
use crate::io::index::BagIndex;

/// Channel whitelist and optional time window for one filtering run.
///
/// The channel set distinguishes two states: `None` means "all
/// channels", while an explicitly present empty set matches nothing.
/// The time window is inclusive on both ends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    channels: Option<HashSet<String>>,
    time_range: Option<(u64, u64)>,
}

impl FilterSpec {
    /// A spec that matches everything (full copy).
    pub fn all() -> Self {
        Self::default()
    }

    /// A spec restricted to the given channels. An empty iterator yields
    /// a present-but-empty set, which matches nothing.
    pub fn for_channels<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: Some(channels.into_iter().map(Into::into).collect()),
            time_range: None,
        }
    }

    /// Restrict the spec to an inclusive time window.
    ///
    /// Rejected before any I/O when `start > end`.
    pub fn with_time_range(mut self, start_ns: u64, end_ns: u64) -> Result<Self> {
        if start_ns > end_ns {
            return Err(BagError::invalid_time_range(start_ns, end_ns));
        }
        self.time_range = Some((start_ns, end_ns));
        Ok(self)
    }

    /// The channel whitelist, `None` meaning "all channels".
    pub fn channels(&self) -> Option<&HashSet<String>> {
        self.channels.as_ref()
    }

    /// The inclusive time window, if any.
    pub fn time_range(&self) -> Option<(u64, u64)> {
        self.time_range
    }

    /// Decide whether a record with this channel and timestamp should be
    /// emitted.
    pub fn matches(&self, channel: &str, time_ns: u64) -> bool {
        let channel_ok = match &self.channels {
            None => true,
            Some(set) => set.contains(channel),
        };

        let time_ok = match self.time_range {
            None => true,
            Some((start, end)) => time_ns >= start && time_ns <= end,
        };

        channel_ok && time_ok
    }

    /// Requested channels absent from the given index, sorted.
    pub fn missing_channels(&self, index: &BagIndex) -> Vec<String> {
        let mut missing: Vec<String> = match &self.channels {
            None => Vec::new(),
            Some(set) => set
                .iter()
                .filter(|name| !index.has_channel(name))
                .cloned()
                .collect(),
        };
        missing.sort();
        missing
    }

    /// Advisory pre-check: fail with the missing channel names when the
    /// whitelist requests channels the source does not carry. Purely
    /// informational; filtering with unknown channels is legal and
    /// simply matches nothing.
    pub fn validate(&self, index: &BagIndex) -> Result<()> {
        let missing = self.missing_channels(index);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(BagError::topic_not_found(missing))
        }
    }
}

/// Load channel names from a whitelist file.
///
/// One channel name per line; lines beginning with `#` and blank lines
/// are ignored. Names are matched exactly, case-sensitive, no globbing.
pub fn load_whitelist<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path_str = path.as_ref().to_string_lossy().to_string();
    let text = fs::read_to_string(path.as_ref())
        .map_err(|e| BagError::open(&path_str, format!("{e}")))?;

    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
