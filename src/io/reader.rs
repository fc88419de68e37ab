// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Bag container reader.
//!
//! Opens a container read-only via memory mapping, builds its
//! [`BagIndex`] once, and streams message records lazily in stored
//! order. Files whose trailing index is absent or unparsable (an
//! interrupted write) are recovered with a best-effort linear scan.
//!
//! Consuming a record iterator performs blocking I/O through the page
//! cache; run it on a worker, never on a latency-sensitive context.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use tracing::warn;

use crate::core::{BagError, Result};
use crate::io::index::{BagIndex, ChannelInfo};
use crate::io::record::{
    read_record, FILE_HEADER_LEN, INDEX_ENTRY_LEN, MAGIC, OP_CONNECTION, OP_FILE_HEADER,
    OP_INDEX_DATA, OP_MSG_DATA,
};
use crate::io::Record;

/// Index metadata gathered while parsing or scanning a container.
struct ScanResult {
    channels: HashMap<String, ChannelInfo>,
    conn_to_channel: HashMap<u32, String>,
    start_time: u64,
    end_time: u64,
    record_count: u64,
}

/// Bag container reader with a cached index.
pub struct BagReader {
    path: String,
    data: Option<memmap2::Mmap>,
    index: BagIndex,
    conn_to_channel: HashMap<u32, String>,
    channel_to_conn: HashMap<String, u32>,
    /// End of the message section: `index_pos` when the trailing index
    /// was parsed, file length when recovered by scan.
    data_end: u64,
    /// Whether the trailing index was present and parsable. A strict
    /// message section must parse to its end; a recovered one tolerates
    /// a truncated tail.
    indexed: bool,
}

impl std::fmt::Debug for BagReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BagReader")
            .field("path", &self.path)
            .field("indexed", &self.indexed)
            .finish()
    }
}

impl BagReader {
    /// Open a container for reading and build its index.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let file = File::open(path.as_ref())
            .map_err(|e| BagError::open(&path_str, format!("{e}")))?;

        let file_len = file
            .metadata()
            .map_err(|e| BagError::open(&path_str, format!("failed to stat: {e}")))?
            .len();

        if file_len < FILE_HEADER_LEN {
            return Err(BagError::open(
                &path_str,
                "file too small to be a bag container",
            ));
        }

        let mmap = unsafe { memmap2::Mmap::map(&file) }
            .map_err(|e| BagError::open(&path_str, format!("failed to mmap: {e}")))?;

        if &mmap[..MAGIC.len()] != MAGIC {
            return Err(BagError::open(&path_str, "invalid magic, not a bag container"));
        }

        let mut cursor = Cursor::new(&mmap[..]);
        cursor.set_position(MAGIC.len() as u64);
        let (header, _padding) = read_record(&mut cursor, &path_str)
            .map_err(|_| BagError::open(&path_str, "missing or unreadable file header record"))?;

        if header.op != Some(OP_FILE_HEADER) {
            return Err(BagError::open(
                &path_str,
                format!("expected file header record, got op={:?}", header.op),
            ));
        }

        let index_pos = header.index_pos.unwrap_or(0);

        let (scan, data_end, indexed) =
            if index_pos >= FILE_HEADER_LEN && index_pos <= file_len {
                match Self::parse_index_section(&mmap, index_pos, &path_str) {
                    Ok(scan) => (scan, index_pos, true),
                    Err(e) => {
                        warn!(
                            path = %path_str,
                            error = %e,
                            "trailing index unparsable, falling back to linear scan"
                        );
                        (Self::scan_records(&mmap, &path_str)?, file_len, false)
                    }
                }
            } else {
                // index_pos of 0 means the write session never finished.
                (Self::scan_records(&mmap, &path_str)?, file_len, false)
            };

        let channel_to_conn: HashMap<String, u32> = scan
            .conn_to_channel
            .iter()
            .map(|(id, name)| (name.clone(), *id))
            .collect();

        let index = BagIndex {
            path: path_str.clone(),
            channels: scan.channels,
            start_time: scan.start_time,
            end_time: scan.end_time,
            record_count: scan.record_count,
        };

        Ok(Self {
            path: path_str,
            data: Some(mmap),
            index,
            conn_to_channel: scan.conn_to_channel,
            channel_to_conn,
            data_end,
            indexed,
        })
    }

    /// Parse the trailing index section: connection summary records
    /// followed by per-connection index-data records. Any parse failure
    /// here is reported so the caller can fall back to a linear scan.
    fn parse_index_section(mmap: &[u8], index_pos: u64, path: &str) -> Result<ScanResult> {
        let mut cursor = Cursor::new(mmap);
        cursor.set_position(index_pos);

        let mut channels = HashMap::new();
        let mut conn_to_channel = HashMap::new();
        let mut start_time = u64::MAX;
        let mut end_time = 0u64;
        let mut record_count = 0u64;

        while (cursor.position() as usize) < mmap.len() {
            let (header, data) = read_record(&mut cursor, path)?;

            match header.op {
                Some(OP_CONNECTION) => {
                    let conn_id = header.conn.ok_or_else(|| {
                        BagError::corrupt(path, "connection record missing conn id")
                    })?;
                    let name = header.channel.ok_or_else(|| {
                        BagError::corrupt(path, "connection record missing channel name")
                    })?;
                    conn_to_channel.entry(conn_id).or_insert_with(|| name.clone());
                    channels
                        .entry(name.clone())
                        .or_insert_with(|| ChannelInfo::from_wire(name, data));
                }
                Some(OP_INDEX_DATA) => {
                    let count = header.count.unwrap_or(0) as usize;
                    if data.len() != count * INDEX_ENTRY_LEN {
                        return Err(BagError::corrupt(
                            path,
                            format!(
                                "index data length {} does not match count {count}",
                                data.len()
                            ),
                        ));
                    }
                    for entry in data.chunks_exact(INDEX_ENTRY_LEN) {
                        let time = u64::from_le_bytes(entry[..8].try_into().expect("8 bytes"));
                        start_time = start_time.min(time);
                        end_time = end_time.max(time);
                    }
                    record_count += count as u64;
                }
                _ => {
                    // Ignore other record types in the index section
                }
            }
        }

        if record_count == 0 {
            start_time = 0;
            end_time = 0;
        }

        Ok(ScanResult {
            channels,
            conn_to_channel,
            start_time,
            end_time,
            record_count,
        })
    }

    /// Linear scan of the message section, used when no trailing index
    /// is available. Tolerates a truncated tail; fails only when nothing
    /// in the file parses at all.
    fn scan_records(mmap: &[u8], path: &str) -> Result<ScanResult> {
        let mut cursor = Cursor::new(mmap);
        cursor.set_position(FILE_HEADER_LEN);

        let mut channels = HashMap::new();
        let mut conn_to_channel: HashMap<u32, String> = HashMap::new();
        let mut start_time = u64::MAX;
        let mut end_time = 0u64;
        let mut record_count = 0u64;
        let mut parsed_any = false;

        while (cursor.position() as usize) < mmap.len() {
            let (header, data) = match read_record(&mut cursor, path) {
                Ok(r) => r,
                // Truncated tail from an interrupted write; keep what we have.
                Err(_) => break,
            };
            parsed_any = true;

            match header.op {
                Some(OP_CONNECTION) => {
                    let (conn_id, name) = match (header.conn, header.channel) {
                        (Some(id), Some(name)) => (id, name),
                        _ => continue,
                    };
                    conn_to_channel.entry(conn_id).or_insert_with(|| name.clone());
                    channels
                        .entry(name.clone())
                        .or_insert_with(|| ChannelInfo::from_wire(name, data));
                }
                Some(OP_MSG_DATA) => {
                    let conn_id = match header.conn {
                        Some(id) => id,
                        None => continue,
                    };
                    if !conn_to_channel.contains_key(&conn_id) {
                        continue;
                    }
                    let time = header.time.unwrap_or(0);
                    start_time = start_time.min(time);
                    end_time = end_time.max(time);
                    record_count += 1;
                }
                _ => {}
            }
        }

        if !parsed_any && mmap.len() as u64 > FILE_HEADER_LEN {
            return Err(BagError::corrupt(
                path,
                "no parsable records found during recovery scan",
            ));
        }

        if record_count == 0 {
            start_time = 0;
            end_time = 0;
        }

        Ok(ScanResult {
            channels,
            conn_to_channel,
            start_time,
            end_time,
            record_count,
        })
    }

    /// The container's index, built at open and cached for the life of
    /// the handle.
    pub fn index(&self) -> &BagIndex {
        &self.index
    }

    /// The container path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the trailing index was present; false means the container
    /// was recovered by linear scan.
    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.data.is_none()
    }

    /// Release the underlying mapping. Closing an already-closed handle
    /// is a no-op.
    pub fn close(&mut self) {
        self.data = None;
    }

    /// Stream message records in stored order.
    ///
    /// `channels` restricts the stream at the source: `None` yields every
    /// channel, `Some(set)` yields only records whose channel is in the
    /// set (an empty set yields nothing). Time filtering stays with the
    /// caller. Each call returns a fresh cursor; cursors are finite and
    /// not restartable.
    pub fn records(&self, channels: Option<&HashSet<String>>) -> Result<RecordIter<'_>> {
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| BagError::open(&self.path, "container is closed"))?;

        let allowed = channels.map(|set| {
            self.channel_to_conn
                .iter()
                .filter(|(name, _)| set.contains(name.as_str()))
                .map(|(_, id)| *id)
                .collect::<HashSet<u32>>()
        });

        Ok(RecordIter {
            data: &data[..],
            pos: FILE_HEADER_LEN,
            end: self.data_end,
            strict: self.indexed,
            allowed,
            channels: &self.index.channels,
            conn_to_channel: &self.conn_to_channel,
            path: &self.path,
        })
    }
}

/// Lazy cursor over a container's message records.
pub struct RecordIter<'a> {
    data: &'a [u8],
    pos: u64,
    end: u64,
    strict: bool,
    allowed: Option<HashSet<u32>>,
    channels: &'a HashMap<String, ChannelInfo>,
    conn_to_channel: &'a HashMap<u32, String>,
    path: &'a str,
}

impl Iterator for RecordIter<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.end {
            let mut cursor = Cursor::new(&self.data[..self.end as usize]);
            cursor.set_position(self.pos);

            let (header, data) = match read_record(&mut cursor, self.path) {
                Ok(r) => r,
                Err(e) => {
                    if self.strict {
                        self.pos = self.end;
                        return Some(Err(e));
                    }
                    // Recovered container: truncated tail ends the stream.
                    self.pos = self.end;
                    return None;
                }
            };
            self.pos = cursor.position();

            if header.op != Some(OP_MSG_DATA) {
                continue;
            }

            let conn_id = match header.conn {
                Some(id) => id,
                None => continue,
            };

            if let Some(ref allowed) = self.allowed {
                if !allowed.contains(&conn_id) {
                    continue;
                }
            }

            let name = match self.conn_to_channel.get(&conn_id) {
                Some(name) => name,
                // Unknown connection ids are skipped, not an error.
                None => continue,
            };

            let info = match self.channels.get(name) {
                Some(info) => info,
                None => continue,
            };

            return Some(Ok(Record {
                channel: name.clone(),
                time_ns: header.time.unwrap_or(0),
                payload: data,
                connection_header: info.connection_header.clone(),
            }));
        }

        None
    }
}
