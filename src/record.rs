//! Framed record encoding
//!
//! The WAL and segment files share one on-disk record format, so a segment
//! is byte-for-byte a sorted sequence of the same frames the WAL appends.
//!
//! ## Frame Format
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────────────────────────┐
//! │ Seq (8)  │ CRC (4)  │ Len (4)  │ Body (Len bytes)             │
//! └──────────┴──────────┴──────────┴──────────────────────────────┘
//! Body = bincode(key, value)
//! CRC  = crc32(seq ‖ len ‖ body)
//! ```
//!
//! In the WAL `seq` is the log sequence number; in a segment it is the
//! record's ordinal within the file.

use std::io::{self, ErrorKind, Read};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{EmberError, Result};

/// Header size: Seq (8) + CRC (4) + Len (4) = 16 bytes
pub const HEADER_SIZE: usize = 16;

/// A single key-value record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Stored in the frame header, not the body
    #[serde(skip)]
    pub seq: u64,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Record {
    pub fn new(seq: u64, key: Vec<u8>, value: Vec<u8>) -> Self {
        Self { seq, key, value }
    }

    /// Encode this record as a complete frame
    pub fn encode(&self) -> Result<Bytes> {
        encode_frame(self.seq, &self.key, &self.value)
    }

    /// Decode one frame from the start of `data`
    pub fn decode(data: &[u8]) -> Result<Self> {
        let corrupt = |reason: String| EmberError::CorruptRecord { offset: 0, reason };

        if data.len() < HEADER_SIZE {
            return Err(corrupt(format!(
                "frame of {} bytes is shorter than the header",
                data.len()
            )));
        }

        let mut header = &data[..HEADER_SIZE];
        let seq = header.get_u64_le();
        let crc = header.get_u32_le();
        let len = header.get_u32_le();

        let end = HEADER_SIZE + len as usize;
        if data.len() < end {
            return Err(corrupt(format!(
                "body truncated: expected {} bytes, have {}",
                len,
                data.len() - HEADER_SIZE
            )));
        }

        decode_body(seq, crc, len, &data[HEADER_SIZE..end]).map_err(corrupt)
    }
}

/// Encode a frame from borrowed parts; identical to `Record::encode`
pub fn encode_frame(seq: u64, key: &[u8], value: &[u8]) -> Result<Bytes> {
    // A two-field struct and a pair share the same bincode layout
    let body = bincode::serialize(&(key, value))
        .map_err(|e| EmberError::Serialization(e.to_string()))?;
    let len = u32::try_from(body.len()).map_err(|_| {
        EmberError::Serialization(format!(
            "record body of {} bytes exceeds the u32 length field",
            body.len()
        ))
    })?;

    let crc = checksum(seq, len, &body);

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + body.len());
    buf.put_u64_le(seq);
    buf.put_u32_le(crc);
    buf.put_u32_le(len);
    buf.put_slice(&body);
    Ok(buf.freeze())
}

fn checksum(seq: u64, len: u32, body: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&seq.to_le_bytes());
    hasher.update(&len.to_le_bytes());
    hasher.update(body);
    hasher.finalize()
}

fn decode_body(seq: u64, crc: u32, len: u32, body: &[u8]) -> std::result::Result<Record, String> {
    let computed = checksum(seq, len, body);
    if computed != crc {
        return Err(format!(
            "CRC mismatch: stored {:#010x}, computed {:#010x}",
            crc, computed
        ));
    }

    let mut record: Record = bincode::deserialize(body).map_err(|e| e.to_string())?;
    record.seq = seq;
    Ok(record)
}

/// First position at or after `from` where a complete, checksum-valid
/// frame starts. Used to step over damage whose length field cannot be
/// trusted.
pub(crate) fn find_frame(data: &[u8], from: usize) -> Option<usize> {
    (from..data.len()).find(|&pos| valid_frame_len(&data[pos..]).is_some())
}

/// Length of the valid frame at the start of `data`, if there is one
fn valid_frame_len(data: &[u8]) -> Option<usize> {
    if data.len() < HEADER_SIZE {
        return None;
    }

    let mut header = &data[..HEADER_SIZE];
    let seq = header.get_u64_le();
    let crc = header.get_u32_le();
    let len = header.get_u32_le();
    let body = data.get(HEADER_SIZE..HEADER_SIZE + len as usize)?;

    // Cheap shape check before the CRC: u64 key len, key, u64 value len, value
    let mut cursor = body;
    if cursor.len() < 8 {
        return None;
    }
    let key_len = cursor.get_u64_le();
    if (cursor.len() as u64) < key_len.saturating_add(8) {
        return None;
    }
    cursor.advance(key_len as usize);
    let value_len = cursor.get_u64_le();
    if cursor.len() as u64 != value_len {
        return None;
    }

    (checksum(seq, len, body) == crc).then_some(HEADER_SIZE + body.len())
}

// =============================================================================
// Sequential Frame Reader
// =============================================================================

/// Outcome of reading one frame from a stream
#[derive(Debug)]
pub enum Frame {
    /// A complete, checksum-valid record
    Record(Record),

    /// A complete frame whose checksum or body did not verify.
    /// The reader has already moved past it.
    Corrupt { offset: u64, reason: String },

    /// The stream ended partway through a frame starting at `offset`
    Torn { offset: u64 },
}

/// Reads frames sequentially from any byte stream
pub struct RecordReader<R> {
    reader: R,
    offset: u64,
}

impl<R: Read> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_offset(reader, 0)
    }

    /// Start reading from a stream already positioned at `offset`
    pub fn with_offset(reader: R, offset: u64) -> Self {
        Self { reader, offset }
    }

    /// Byte offset of the next frame
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read the next frame. `Ok(None)` means a clean end of stream.
    pub fn next_frame(&mut self) -> io::Result<Option<Frame>> {
        let start = self.offset;

        let mut header = [0u8; HEADER_SIZE];
        let read = read_full(&mut self.reader, &mut header)?;
        if read == 0 {
            return Ok(None);
        }
        self.offset += read as u64;
        if read < HEADER_SIZE {
            return Ok(Some(Frame::Torn { offset: start }));
        }

        let mut cursor = &header[..];
        let seq = cursor.get_u64_le();
        let crc = cursor.get_u32_le();
        let len = cursor.get_u32_le();

        // take() avoids trusting `len` for the allocation size
        let mut body = Vec::new();
        (&mut self.reader).take(len as u64).read_to_end(&mut body)?;
        self.offset += body.len() as u64;
        if body.len() < len as usize {
            return Ok(Some(Frame::Torn { offset: start }));
        }

        Ok(Some(match decode_body(seq, crc, len, &body) {
            Ok(record) => Frame::Record(record),
            Err(reason) => Frame::Corrupt {
                offset: start,
                reason,
            },
        }))
    }
}

/// Like `read_exact`, but reports how much was read instead of failing on EOF
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
