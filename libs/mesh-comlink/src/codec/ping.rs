//! Ping round-trip codec
//!
//! Request payload is the 16-bit target address (little-endian). The response:
//!
//! ```text
//! 0        1           3          4          5          6          7
//! +--------+-----------+----------+----------+----------+----------+
//! | result | rtt (LE)  | fwd lqi  | fwd rssi | rev lqi  | rev rssi |
//! +--------+-----------+----------+----------+----------+----------+
//! ```

use bytes::Bytes;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Shortest payload that carries a measurement
pub const PING_MIN_LEN: usize = 7;

/// Link quality and signal strength in one direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkMetrics {
    pub link_quality: u8,
    /// Signal strength in dBm
    pub signal_strength: i8,
}

/// Outcome of a ping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingResult {
    Reply {
        round_trip_time: u16,
        forward: LinkMetrics,
        reverse: LinkMetrics,
    },
    /// Peer did not answer; not an error
    NoResponse,
}

impl PingResult {
    pub fn is_reply(&self) -> bool {
        matches!(self, PingResult::Reply { .. })
    }
}

impl Serialize for PingResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PingResult::Reply {
                round_trip_time,
                forward,
                reverse,
            } => {
                let mut state = serializer.serialize_struct("PingResult", 3)?;
                state.serialize_field("roundTripTime", round_trip_time)?;
                state.serialize_field("forward", forward)?;
                state.serialize_field("reverse", reverse)?;
                state.end()
            },
            PingResult::NoResponse => {
                let mut state = serializer.serialize_struct("PingResult", 1)?;
                state.serialize_field("error", "No Response")?;
                state.end()
            },
        }
    }
}

pub fn encode_ping_request(address: u16) -> Bytes {
    Bytes::copy_from_slice(&address.to_le_bytes())
}

/// Decode a ping payload; short payloads mean the peer never answered
pub fn decode_ping(data: &[u8]) -> PingResult {
    if data.len() < PING_MIN_LEN {
        return PingResult::NoResponse;
    }

    PingResult::Reply {
        round_trip_time: u16::from_le_bytes([data[1], data[2]]),
        forward: LinkMetrics {
            link_quality: data[3],
            signal_strength: data[4] as i8,
        },
        reverse: LinkMetrics {
            link_quality: data[5],
            signal_strength: data[6] as i8,
        },
    }
}
