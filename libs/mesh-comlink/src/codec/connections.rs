//! Connection table codec
//!
//! Each entry is 14 bytes:
//!
//! ```text
//! 0          2            4                12       13         14
//! +----------+------------+----------------+--------+----------+
//! | pan (LE) | short (LE) | device address | status | reserved |
//! +----------+------------+----------------+--------+----------+
//! ```
//!
//! Status bits: 0 rx-on-when-idle, 1 direct connection, 2 long address valid,
//! 3 short address valid, 4 finish join, 5 family, 7 entry valid.

use serde::Serialize;

use super::address::DeviceAddress;
use crate::bytes::{extract_bit_u8, with_bit_u8};
use crate::error::{LinkError, Result};

/// Encoded entry length
pub const ENTRY_LEN: usize = 14;

const STATUS_OFFSET: usize = 12;

/// Decoded status byte of a connection-table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub rx_on_when_idle: bool,
    pub direct_connection: bool,
    pub long_address_valid: bool,
    pub short_address_valid: bool,
    pub finish_join: bool,
    pub is_family: bool,
    pub is_valid: bool,
}

impl From<u8> for ConnectionStatus {
    fn from(bits: u8) -> Self {
        Self {
            rx_on_when_idle: extract_bit_u8(bits, 0),
            direct_connection: extract_bit_u8(bits, 1),
            long_address_valid: extract_bit_u8(bits, 2),
            short_address_valid: extract_bit_u8(bits, 3),
            finish_join: extract_bit_u8(bits, 4),
            is_family: extract_bit_u8(bits, 5),
            is_valid: extract_bit_u8(bits, 7),
        }
    }
}

impl From<ConnectionStatus> for u8 {
    fn from(status: ConnectionStatus) -> Self {
        let mut bits = 0;
        bits = with_bit_u8(bits, 0, status.rx_on_when_idle);
        bits = with_bit_u8(bits, 1, status.direct_connection);
        bits = with_bit_u8(bits, 2, status.long_address_valid);
        bits = with_bit_u8(bits, 3, status.short_address_valid);
        bits = with_bit_u8(bits, 4, status.finish_join);
        bits = with_bit_u8(bits, 5, status.is_family);
        with_bit_u8(bits, 7, status.is_valid)
    }
}

/// One wireless connection known to the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionEntry {
    pub pan_id: u16,
    pub short_address: u16,
    pub address: DeviceAddress,
    pub status: ConnectionStatus,
}

impl ConnectionEntry {
    /// Encode back into the 14-byte table layout
    pub fn encode(&self) -> [u8; ENTRY_LEN] {
        let mut buf = [0u8; ENTRY_LEN];
        buf[0..2].copy_from_slice(&self.pan_id.to_le_bytes());
        buf[2..4].copy_from_slice(&self.short_address.to_le_bytes());
        buf[4..12].copy_from_slice(self.address.as_bytes());
        buf[STATUS_OFFSET] = self.status.into();
        buf
    }

    fn decode(chunk: &[u8]) -> Result<Self> {
        Ok(Self {
            pan_id: u16::from_le_bytes([chunk[0], chunk[1]]),
            short_address: u16::from_le_bytes([chunk[2], chunk[3]]),
            address: DeviceAddress::from_slice(&chunk[4..12])?,
            status: ConnectionStatus::from(chunk[STATUS_OFFSET]),
        })
    }
}

/// Decode the table, keeping only entries with the valid bit set
pub fn decode_connection_table(data: &[u8]) -> Result<Vec<ConnectionEntry>> {
    if data.len() % ENTRY_LEN != 0 {
        return Err(LinkError::length(
            "connection table",
            format!("a multiple of {ENTRY_LEN}"),
            data.len(),
        ));
    }

    let mut entries = Vec::with_capacity(data.len() / ENTRY_LEN);
    for chunk in data.chunks_exact(ENTRY_LEN) {
        let entry = ConnectionEntry::decode(chunk)?;
        if entry.status.is_valid {
            entries.push(entry);
        }
    }
    Ok(entries)
}
