// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use bagsift::{BagReader, BagWriter, ChannelInfo, Record};

// ============================================================================
// Temp files
// ============================================================================

/// Get a unique temporary directory for test files.
pub fn temp_dir() -> PathBuf {
    let random = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let thread_id = format!("{:?}", std::thread::current().id());
    std::env::temp_dir().join(format!(
        "bagsift_test_{}_{}_{}",
        std::process::id(),
        thread_id,
        random
    ))
}

/// Create a temporary file path with a cleanup guard.
pub fn temp_path(name: &str) -> (PathBuf, CleanupGuard) {
    let dir = temp_dir();
    fs::create_dir_all(&dir).ok();
    let path = dir.join(name);
    (path, CleanupGuard(dir))
}

/// Cleanup guard for test temporary files.
#[derive(Debug)]
pub struct CleanupGuard(pub PathBuf);

impl CleanupGuard {
    /// Another path inside the guarded directory.
    pub fn join(&self, name: &str) -> PathBuf {
        self.0.join(name)
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

// ============================================================================
// Bag builders
// ============================================================================

/// Write a bag with the given channels and records.
///
/// `channels` pairs channel names with type descriptors; `records` are
/// `(channel, time_ns, payload)` appended in order.
pub fn write_bag(path: &Path, channels: &[(&str, &str)], records: &[(&str, u64, Vec<u8>)]) {
    let infos: std::collections::HashMap<&str, ChannelInfo> = channels
        .iter()
        .map(|(name, type_id)| (*name, ChannelInfo::new(*name, *type_id)))
        .collect();

    let mut writer = BagWriter::create(path).expect("create test bag");
    for (channel, time_ns, payload) in records {
        let info = infos.get(channel).expect("record references known channel");
        writer
            .append(&Record::new(info, *time_ns, payload.clone()))
            .expect("append test record");
    }
    writer.finish().expect("finish test bag");
}

/// A bag with many tiny records on one channel, for jobs that should
/// stay busy long enough to observe them mid-flight.
pub fn write_large_bag(path: &Path, records: u64) {
    let info = ChannelInfo::new("/bulk", "test_msgs/Bulk");
    let mut writer = BagWriter::create(path).expect("create large test bag");
    for i in 0..records {
        writer
            .append(&Record::new(&info, i, vec![0u8; 16]))
            .expect("append bulk record");
    }
    writer.finish().expect("finish large test bag");
}

/// Read every record of a bag as `(channel, time_ns, payload)` tuples,
/// optionally restricted at the source to a channel subset.
pub fn read_all(path: &Path, channels: Option<&HashSet<String>>) -> Vec<(String, u64, Vec<u8>)> {
    let reader = BagReader::open(path).expect("open test bag");
    reader
        .records(channels)
        .expect("records cursor")
        .map(|r| r.expect("valid record"))
        .map(|r| (r.channel, r.time_ns, r.payload))
        .collect()
}

// ============================================================================
// Container surgery
// ============================================================================

/// Read the `index_pos` field out of a bag's file header.
pub fn read_index_pos(path: &Path) -> u64 {
    let bytes = fs::read(path).expect("read bag bytes");
    let header = &bytes[..4096.min(bytes.len())];
    let needle = b"index_pos=";
    let at = header
        .windows(needle.len())
        .position(|w| w == needle)
        .expect("file header carries index_pos");
    let start = at + needle.len();
    u64::from_le_bytes(bytes[start..start + 8].try_into().unwrap())
}

/// Rewind a finished bag to the state of an interrupted write session:
/// drop the trailing index and zero the header's `index_pos`.
pub fn strip_trailing_index(path: &Path) {
    let index_pos = read_index_pos(path);
    assert!(index_pos > 0, "bag must be finished before stripping");

    let mut bytes = fs::read(path).expect("read bag bytes");
    bytes.truncate(index_pos as usize);

    let needle = b"index_pos=";
    let at = bytes[..4096]
        .windows(needle.len())
        .position(|w| w == needle)
        .expect("file header carries index_pos");
    let start = at + needle.len();
    bytes[start..start + 8].copy_from_slice(&0u64.to_le_bytes());

    fs::write(path, bytes).expect("write truncated bag");
}

/// Overwrite the start of the trailing index section with garbage,
/// leaving the message section intact.
pub fn corrupt_trailing_index(path: &Path) {
    let index_pos = read_index_pos(path) as usize;
    let mut bytes = fs::read(path).expect("read bag bytes");
    assert!(index_pos + 16 <= bytes.len(), "index section too short to corrupt");
    for byte in &mut bytes[index_pos..index_pos + 16] {
        *byte = 0xFF;
    }
    fs::write(path, bytes).expect("write corrupted bag");
}
