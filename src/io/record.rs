// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Record framing for the bag container format.
//!
//! Both the reader and the writer speak this grammar:
//!
//! ## File layout
//! - Magic: `#BAGSIFT V1.0\n` (14 bytes)
//! - File header record, padded to 4096 bytes so it can be rewritten in
//!   place when the trailing index is finalized
//! - Interleaved connection and message records
//! - Trailing index section at `index_pos`: connection summary records
//!   followed by per-connection index-data records
//!
//! ## Record format
//! All records follow: `<header_len: u32><header><data_len: u32><data>`
//! where header contains `<field_len: u32><field_name>=<field_value>` pairs
//! (all integers little-endian).
//!
//! ## Op codes
//! - 0x02: Message data
//! - 0x03: File header
//! - 0x04: Index data
//! - 0x07: Connection

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::core::{BagError, Result};

/// Container magic line.
pub const MAGIC: &[u8] = b"#BAGSIFT V1.0\n";

/// Size of the padded file-header region (magic included).
pub const FILE_HEADER_LEN: u64 = 4096;

/// Message data record
pub const OP_MSG_DATA: u8 = 0x02;
/// File header record
pub const OP_FILE_HEADER: u8 = 0x03;
/// Index data record
pub const OP_INDEX_DATA: u8 = 0x04;
/// Connection record
pub const OP_CONNECTION: u8 = 0x07;

/// Index data version
pub const INDEX_VERSION: u32 = 1;

/// Bytes per index entry: time (u64) + absolute record offset (u64).
pub const INDEX_ENTRY_LEN: usize = 16;

/// Parsed fields from a record header.
#[derive(Debug, Default)]
pub struct RecordHeader {
    pub op: Option<u8>,
    pub conn: Option<u32>,
    pub time: Option<u64>,
    pub channel: Option<String>,
    pub type_id: Option<String>,
    pub index_pos: Option<u64>,
    pub conn_count: Option<u32>,
    pub record_count: Option<u64>,
    pub ver: Option<u32>,
    pub count: Option<u32>,
}

/// Upper bound on record header length; anything larger is garbage.
const MAX_HEADER_LEN: u32 = 1 << 20;

/// Upper bound on record data length; anything larger is garbage.
const MAX_DATA_LEN: u32 = 1 << 30;

/// Read a single record: `<header_len: u32><header><data_len: u32><data>`.
pub fn read_record<R: Read>(reader: &mut R, path: &str) -> Result<(RecordHeader, Vec<u8>)> {
    let header_len = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| BagError::corrupt(path, format!("failed to read header_len: {e}")))?;

    if header_len > MAX_HEADER_LEN {
        return Err(BagError::corrupt(
            path,
            format!("implausible header length {header_len}"),
        ));
    }

    let mut header_bytes = vec![0u8; header_len as usize];
    reader
        .read_exact(&mut header_bytes)
        .map_err(|e| BagError::corrupt(path, format!("failed to read record header: {e}")))?;

    let header = parse_fields(&header_bytes);

    let data_len = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| BagError::corrupt(path, format!("failed to read data_len: {e}")))?;

    if data_len > MAX_DATA_LEN {
        return Err(BagError::corrupt(
            path,
            format!("implausible data length {data_len}"),
        ));
    }

    let mut data = vec![0u8; data_len as usize];
    reader
        .read_exact(&mut data)
        .map_err(|e| BagError::corrupt(path, format!("failed to read record data: {e}")))?;

    Ok((header, data))
}

/// Parse a field sequence (`<field_len: u32><name>=<value>` pairs) into
/// named fields. Unknown fields are ignored; a malformed tail stops the
/// parse without failing so partially written headers still yield what
/// they can.
pub fn parse_fields(bytes: &[u8]) -> RecordHeader {
    let mut cursor = Cursor::new(bytes);
    let mut fields = RecordHeader::default();

    while (cursor.position() as usize) < bytes.len() {
        let field_len = match cursor.read_u32::<LittleEndian>() {
            Ok(len) => len as usize,
            Err(_) => break,
        };

        if field_len == 0 {
            continue;
        }

        let mut field_bytes = vec![0u8; field_len];
        if cursor.read_exact(&mut field_bytes).is_err() {
            break;
        }

        if let Some(eq_pos) = field_bytes.iter().position(|&b| b == b'=') {
            let name = &field_bytes[..eq_pos];
            let value = &field_bytes[eq_pos + 1..];
            parse_field(&mut fields, name, value);
        }
    }

    fields
}

fn parse_field(fields: &mut RecordHeader, name: &[u8], value: &[u8]) {
    match name {
        b"op" if value.len() == 1 => {
            fields.op = Some(value[0]);
        }
        b"conn" if value.len() >= 4 => {
            fields.conn = Some(u32::from_le_bytes([value[0], value[1], value[2], value[3]]));
        }
        b"time" if value.len() >= 8 => {
            fields.time = Some(u64::from_le_bytes([
                value[0], value[1], value[2], value[3], value[4], value[5], value[6], value[7],
            ]));
        }
        b"channel" => {
            fields.channel = Some(String::from_utf8_lossy(value).to_string());
        }
        b"type" => {
            fields.type_id = Some(String::from_utf8_lossy(value).to_string());
        }
        b"index_pos" if value.len() >= 8 => {
            fields.index_pos = Some(u64::from_le_bytes([
                value[0], value[1], value[2], value[3], value[4], value[5], value[6], value[7],
            ]));
        }
        b"conn_count" if value.len() >= 4 => {
            fields.conn_count = Some(u32::from_le_bytes([value[0], value[1], value[2], value[3]]));
        }
        b"record_count" if value.len() >= 8 => {
            fields.record_count = Some(u64::from_le_bytes([
                value[0], value[1], value[2], value[3], value[4], value[5], value[6], value[7],
            ]));
        }
        b"ver" if value.len() >= 4 => {
            fields.ver = Some(u32::from_le_bytes([value[0], value[1], value[2], value[3]]));
        }
        b"count" if value.len() >= 4 => {
            fields.count = Some(u32::from_le_bytes([value[0], value[1], value[2], value[3]]));
        }
        _ => {
            // Ignore unknown fields
        }
    }
}

// =============================================================================
// Write-side helpers
// =============================================================================

/// Write u32 in little-endian format.
pub fn write_u32(buffer: &mut Vec<u8>, value: u32) {
    buffer.extend_from_slice(&value.to_le_bytes());
}

/// Convert u32 to little-endian bytes.
pub fn u32_to_bytes(value: u32) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

/// Convert u64 to little-endian bytes.
pub fn u64_to_bytes(value: u64) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

/// Encode a field map into a `<field_len><name>=<value>` sequence without
/// a leading length prefix. This is the shape of an opaque connection
/// header blob.
pub fn encode_fields(fields: &BTreeMap<String, Vec<u8>>) -> Vec<u8> {
    let mut out = Vec::new();
    for (key, value) in fields {
        let field_len = key.len() + 1 + value.len();
        write_u32(&mut out, field_len as u32);
        out.extend_from_slice(key.as_bytes());
        out.push(b'=');
        out.extend_from_slice(value);
    }
    out
}

/// Write a length-prefixed header (or data section) from a field map.
/// Returns the encoded length, excluding the prefix.
pub fn write_header(buffer: &mut Vec<u8>, fields: &BTreeMap<String, Vec<u8>>) -> u32 {
    let encoded = encode_fields(fields);
    let len = encoded.len() as u32;
    write_u32(buffer, len);
    buffer.extend(encoded);
    len
}

/// Write the padded file header region (magic + file header record).
///
/// The region is always exactly [`FILE_HEADER_LEN`] bytes so the header
/// can be rewritten in place once the index position is known.
pub fn write_file_header_record(
    buffer: &mut Vec<u8>,
    conn_count: u32,
    record_count: u64,
    index_pos: u64,
) {
    buffer.extend_from_slice(MAGIC);
    let magic_len = buffer.len();

    let mut fields = BTreeMap::new();
    fields.insert("op".to_string(), vec![OP_FILE_HEADER]);
    fields.insert("index_pos".to_string(), u64_to_bytes(index_pos));
    fields.insert("conn_count".to_string(), u32_to_bytes(conn_count));
    fields.insert("record_count".to_string(), u64_to_bytes(record_count));

    let header_len = write_header(buffer, &fields);

    // Remaining space after magic, header_len prefix, header, and data_len
    // prefix becomes space padding.
    let used = magic_len + 4 + header_len as usize;
    let data_len = FILE_HEADER_LEN as usize - used - 4;

    write_u32(buffer, data_len as u32);
    buffer.resize(buffer.len() + data_len, b' ');
}

/// Write a connection record: header carries the channel name and
/// connection id, data carries the opaque connection header verbatim.
pub fn write_connection_record(buffer: &mut Vec<u8>, conn_id: u32, name: &str, header: &[u8]) {
    let mut fields = BTreeMap::new();
    fields.insert("op".to_string(), vec![OP_CONNECTION]);
    fields.insert("conn".to_string(), u32_to_bytes(conn_id));
    fields.insert("channel".to_string(), name.as_bytes().to_vec());

    write_header(buffer, &fields);
    write_u32(buffer, header.len() as u32);
    buffer.extend_from_slice(header);
}

/// Write a message record header followed by the payload.
pub fn write_message_record(buffer: &mut Vec<u8>, conn_id: u32, time_ns: u64, payload: &[u8]) {
    let mut fields = BTreeMap::new();
    fields.insert("op".to_string(), vec![OP_MSG_DATA]);
    fields.insert("conn".to_string(), u32_to_bytes(conn_id));
    fields.insert("time".to_string(), u64_to_bytes(time_ns));

    write_header(buffer, &fields);
    write_u32(buffer, payload.len() as u32);
    buffer.extend_from_slice(payload);
}

/// Write an index-data record for one connection.
/// Entries are `(time_ns, absolute record offset)` pairs.
pub fn write_index_record(buffer: &mut Vec<u8>, conn_id: u32, entries: &[(u64, u64)]) {
    let mut fields = BTreeMap::new();
    fields.insert("op".to_string(), vec![OP_INDEX_DATA]);
    fields.insert("conn".to_string(), u32_to_bytes(conn_id));
    fields.insert("ver".to_string(), u32_to_bytes(INDEX_VERSION));
    fields.insert("count".to_string(), u32_to_bytes(entries.len() as u32));

    write_header(buffer, &fields);

    write_u32(buffer, (entries.len() * INDEX_ENTRY_LEN) as u32);
    for (time, offset) in entries {
        buffer.extend_from_slice(&time.to_le_bytes());
        buffer.extend_from_slice(&offset.to_le_bytes());
    }
}
