// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Container index types.
//!
//! A [`BagIndex`] is built once when a container is opened and is
//! read-only afterwards: containers never change while they are being
//! filtered, so the index can be cloned freely as an immutable snapshot
//! for worker threads.

use std::collections::{BTreeSet, HashMap};

use crate::io::record::{self, parse_fields};

/// Metadata for one channel in a container.
///
/// A channel (a "topic" in ROS terminology) is a named stream of records
/// carrying one message type. The connection header is the opaque
/// per-channel metadata blob stored once per channel in the container;
/// the engine only parses the type descriptor out of it and otherwise
/// copies it verbatim when filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    /// Channel name (e.g., "/joint_states", "/tf")
    pub name: String,
    /// Type descriptor (e.g., "sensor_msgs/Imu")
    pub type_id: String,
    /// Raw connection header bytes, copied verbatim into outputs
    pub connection_header: Vec<u8>,
}

impl ChannelInfo {
    /// Create a channel descriptor for a fresh channel, generating its
    /// connection header from the type descriptor.
    pub fn new(name: impl Into<String>, type_id: impl Into<String>) -> Self {
        let type_id = type_id.into();
        let mut fields = std::collections::BTreeMap::new();
        fields.insert("type".to_string(), type_id.as_bytes().to_vec());
        Self {
            name: name.into(),
            type_id,
            connection_header: record::encode_fields(&fields),
        }
    }

    /// Build a descriptor from a connection record read off the wire.
    /// The type descriptor is parsed from the header blob; a blob without
    /// one yields an empty type (tolerated, not an error, so recovery
    /// scans can still surface the channel).
    pub fn from_wire(name: impl Into<String>, connection_header: Vec<u8>) -> Self {
        let fields = parse_fields(&connection_header);
        Self {
            name: name.into(),
            type_id: fields.type_id.unwrap_or_default(),
            connection_header,
        }
    }
}

/// Index of one container: its channels, time span, and record count.
///
/// Created on open, read-only thereafter.
#[derive(Debug, Clone)]
pub struct BagIndex {
    /// Path of the container
    pub path: String,
    /// Channels keyed by name
    pub channels: HashMap<String, ChannelInfo>,
    /// Earliest record timestamp (nanoseconds); 0 when empty
    pub start_time: u64,
    /// Latest record timestamp (nanoseconds); 0 when empty
    pub end_time: u64,
    /// Total number of message records
    pub record_count: u64,
}

impl BagIndex {
    /// The container's time span as `(start, end)` nanoseconds.
    ///
    /// An empty container collapses to the `(0, 0)` sentinel; callers
    /// must treat that as "no usable time window" rather than filter by
    /// it.
    pub fn time_range(&self) -> (u64, u64) {
        (self.start_time, self.end_time)
    }

    /// Whether the container holds zero records.
    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    /// Look up one channel by name.
    pub fn channel(&self, name: &str) -> Option<&ChannelInfo> {
        self.channels.get(name)
    }

    /// Whether the container has a channel with this name.
    pub fn has_channel(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    /// Channel names in sorted order, for display and set operations.
    pub fn channel_names(&self) -> BTreeSet<String> {
        self.channels.keys().cloned().collect()
    }

    /// Duration of the container in nanoseconds (0 when empty).
    pub fn duration(&self) -> u64 {
        self.end_time.saturating_sub(self.start_time)
    }
}
