// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Bag container writer.
//!
//! Appends records with their original channel, timestamp, and
//! connection metadata, and finalizes the trailing index on
//! [`finish`](BagWriter::finish) so the output is self-describing and
//! independently re-openable.
//!
//! Partial output is always better than corrupt output: message records
//! are written through as they are appended, so a session that never
//! reaches `finish` still leaves a container the reader can recover by
//! linear scan, and dropping an unfinished writer attempts the same
//! finalization best-effort.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::warn;

use crate::core::{BagError, Result};
use crate::io::record::{
    write_connection_record, write_file_header_record, write_index_record, write_message_record,
    FILE_HEADER_LEN,
};
use crate::io::Record;

/// Bag container writer.
pub struct BagWriter {
    writer: BufWriter<File>,
    path: String,
    is_open: bool,

    /// Channel name to assigned connection id
    channel_ids: HashMap<String, u32>,
    /// Connection metadata in id order: (name, connection header)
    connections: Vec<(String, Vec<u8>)>,
    /// Per-connection index entries: (time, absolute record offset)
    indexes: HashMap<u32, Vec<(u64, u64)>>,

    next_conn_id: u32,
    /// Logical write position, tracked independently of BufWriter flushes
    file_pos: u64,
    record_count: u64,
}

impl std::fmt::Debug for BagWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BagWriter")
            .field("path", &self.path)
            .field("is_open", &self.is_open)
            .field("record_count", &self.record_count)
            .finish()
    }
}

impl BagWriter {
    /// Create a new container for writing.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let file = File::create(path.as_ref())
            .map_err(|e| BagError::open(&path_str, format!("{e}")))?;

        let mut writer = BufWriter::new(file);

        // index_pos of 0 marks an unfinished session until finish()
        // patches the header in place.
        let mut header = Vec::new();
        write_file_header_record(&mut header, 0, 0, 0);
        writer
            .write_all(&header)
            .map_err(|e| BagError::write(&path_str, format!("failed to write header: {e}")))?;

        Ok(Self {
            writer,
            path: path_str,
            is_open: true,
            channel_ids: HashMap::new(),
            connections: Vec::new(),
            indexes: HashMap::new(),
            next_conn_id: 0,
            file_pos: FILE_HEADER_LEN,
            record_count: 0,
        })
    }

    /// Append one record.
    ///
    /// The first record of each distinct channel also writes that
    /// channel's connection record; later records reference the assigned
    /// connection id.
    pub fn append(&mut self, record: &Record) -> Result<()> {
        if !self.is_open {
            return Err(BagError::write(&self.path, "append to finished container"));
        }

        let conn_id = match self.channel_ids.get(&record.channel) {
            Some(&id) => id,
            None => {
                let id = self.next_conn_id;
                self.next_conn_id += 1;

                let mut buffer = Vec::new();
                write_connection_record(&mut buffer, id, &record.channel, &record.connection_header);
                self.write_all(&buffer)?;

                self.channel_ids.insert(record.channel.clone(), id);
                self.connections
                    .push((record.channel.clone(), record.connection_header.clone()));
                id
            }
        };

        let offset = self.file_pos;
        let mut buffer = Vec::new();
        write_message_record(&mut buffer, conn_id, record.time_ns, &record.payload);
        self.write_all(&buffer)?;

        self.indexes
            .entry(conn_id)
            .or_default()
            .push((record.time_ns, offset));
        self.record_count += 1;

        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer
            .write_all(bytes)
            .map_err(|e| BagError::write(&self.path, format!("{e}")))?;
        self.file_pos += bytes.len() as u64;
        Ok(())
    }

    /// Finalize the container: write the trailing index section and
    /// patch the file header with its position. Idempotent; finishing an
    /// already-finished writer is a no-op.
    pub fn finish(&mut self) -> Result<()> {
        if !self.is_open {
            return Ok(());
        }

        let index_pos = self.file_pos;

        let mut buffer = Vec::new();
        for (id, (name, header)) in self.connections.iter().enumerate() {
            write_connection_record(&mut buffer, id as u32, name, header);
        }

        let mut conn_ids: Vec<u32> = self.indexes.keys().copied().collect();
        conn_ids.sort_unstable();
        for conn_id in conn_ids {
            if let Some(entries) = self.indexes.get(&conn_id) {
                write_index_record(&mut buffer, conn_id, entries);
            }
        }

        self.writer
            .write_all(&buffer)
            .map_err(|e| BagError::write(&self.path, format!("failed to write index: {e}")))?;

        let mut header = Vec::new();
        write_file_header_record(
            &mut header,
            self.connections.len() as u32,
            self.record_count,
            index_pos,
        );

        self.writer
            .seek(SeekFrom::Start(0))
            .map_err(|e| BagError::write(&self.path, format!("failed to seek: {e}")))?;
        self.writer
            .write_all(&header)
            .map_err(|e| BagError::write(&self.path, format!("failed to patch header: {e}")))?;
        self.writer
            .flush()
            .map_err(|e| BagError::write(&self.path, format!("failed to flush: {e}")))?;

        self.is_open = false;

        Ok(())
    }

    /// The output path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Number of records appended so far.
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Number of distinct channels appended so far.
    pub fn channel_count(&self) -> usize {
        self.connections.len()
    }

    /// Whether [`finish`](Self::finish) has completed.
    pub fn is_finished(&self) -> bool {
        !self.is_open
    }
}

impl Drop for BagWriter {
    fn drop(&mut self) {
        if self.is_open {
            if let Err(e) = self.finish() {
                warn!(
                    path = %self.path,
                    error = %e,
                    "failed to finalize abandoned container, output left recoverable by scan"
                );
            }
        }
    }
}
