//! WAL frame layout
//!
//! ```text
//! header (16 bytes)
//!   [0..4]   magic        "LDBW"
//!   [4..8]   payload_len  u32 LE
//!   [8..12]  checksum     u32 LE, CRC32C of the payload
//!   [12]     op           u8
//!   [13..16] reserved     zero
//! payload
//!   key_len u16 LE | value_len u32 LE | key | value
//! ```

use std::path::Path;

use crate::error::{EngineError, EngineResult};

/// Frame magic: "LDBW"
pub const MAGIC: [u8; 4] = *b"LDBW";

/// Header size in bytes
pub const HEADER_SIZE: usize = 16;

/// key_len + value_len
const PAYLOAD_PREFIX: usize = 2 + 4;

/// WAL operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Operation {
    /// Insert or overwrite a key
    Put = 1,
    /// Remove a key
    Delete = 2,
}

impl TryFrom<u8> for Operation {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        match byte {
            1 => Ok(Operation::Put),
            2 => Ok(Operation::Delete),
            other => Err(other),
        }
    }
}

/// Size limits enforced before a frame is built.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_key_size: usize,
    pub max_value_size: usize,
}

impl Limits {
    pub fn check(&self, key: &[u8], value: &[u8]) -> EngineResult<()> {
        if key.len() > self.max_key_size {
            return Err(EngineError::OversizedEntry {
                entry_size: key.len() as u64,
                max_size: self.max_key_size as u64,
                component: "key",
            });
        }
        if value.len() > self.max_value_size {
            return Err(EngineError::OversizedEntry {
                entry_size: value.len() as u64,
                max_size: self.max_value_size as u64,
                component: "value",
            });
        }
        Ok(())
    }
}

/// A decoded WAL frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub op: Operation,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Encode one frame. Limits are checked before anything is allocated.
pub fn encode_frame(key: &[u8], value: &[u8], op: Operation, limits: &Limits) -> EngineResult<Vec<u8>> {
    limits.check(key, value)?;

    let payload_len = PAYLOAD_PREFIX + key.len() + value.len();
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload_len);

    buf.extend_from_slice(&MAGIC);
    buf.extend_from_slice(&(payload_len as u32).to_le_bytes());
    buf.extend_from_slice(&[0u8; 4]); // checksum, patched below
    buf.push(op as u8);
    buf.extend_from_slice(&[0u8; 3]);

    buf.extend_from_slice(&(key.len() as u16).to_le_bytes());
    buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
    buf.extend_from_slice(key);
    buf.extend_from_slice(value);

    let checksum = crc32c::crc32c(&buf[HEADER_SIZE..]);
    buf[8..12].copy_from_slice(&checksum.to_le_bytes());

    Ok(buf)
}

/// Payload length declared by a header, without validating anything else.
pub fn declared_payload_len(header: &[u8]) -> usize {
    u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize
}

/// Decode the frame starting at `data[0]`.
///
/// `path` and `base` only feed error context. Returns the frame and the
/// number of bytes it occupied.
pub fn decode_frame(data: &[u8], path: &Path, base: u64) -> EngineResult<(Frame, usize)> {
    if data.len() < HEADER_SIZE {
        return Err(EngineError::TornWrite {
            path: path.to_path_buf(),
            expected_size: HEADER_SIZE as u32,
            available_bytes: data.len() as u64,
            offset: base,
        });
    }

    if data[0..4] != MAGIC {
        return Err(EngineError::NoMagicFound {
            path: path.to_path_buf(),
            offset: base,
            found_bytes: [data[0], data[1], data[2], data[3]],
        });
    }

    let payload_len = declared_payload_len(data);
    let total = HEADER_SIZE + payload_len;
    if data.len() < total {
        return Err(EngineError::TornWrite {
            path: path.to_path_buf(),
            expected_size: payload_len as u32,
            available_bytes: (data.len() - HEADER_SIZE) as u64,
            offset: base + HEADER_SIZE as u64,
        });
    }

    let payload = &data[HEADER_SIZE..total];
    let expected = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
    let actual = crc32c::crc32c(payload);
    if expected != actual {
        return Err(EngineError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected,
            actual,
            offset: base + HEADER_SIZE as u64,
        });
    }

    let op = Operation::try_from(data[12]).map_err(|byte| EngineError::WalCorrupted {
        path: path.to_path_buf(),
        offset: base + 12,
        reason: format!("Invalid operation type: {}", byte),
    })?;

    if payload.len() < PAYLOAD_PREFIX {
        return Err(EngineError::WalCorrupted {
            path: path.to_path_buf(),
            offset: base + HEADER_SIZE as u64,
            reason: "Payload too short for length fields".to_string(),
        });
    }

    let key_len = u16::from_le_bytes([payload[0], payload[1]]) as usize;
    let value_len = u32::from_le_bytes([payload[2], payload[3], payload[4], payload[5]]) as usize;
    let key_end = PAYLOAD_PREFIX + key_len;
    let value_end = key_end + value_len;
    if value_end != payload.len() {
        return Err(EngineError::WalCorrupted {
            path: path.to_path_buf(),
            offset: base + HEADER_SIZE as u64,
            reason: format!(
                "Payload is {} bytes but key({}) + value({}) need {}",
                payload.len(), key_len, value_len, value_end
            ),
        });
    }

    let frame = Frame {
        op,
        key: payload[PAYLOAD_PREFIX..key_end].to_vec(),
        value: payload[key_end..value_end].to_vec(),
    };
    Ok((frame, total))
}
