//! 8-byte device (extended) address

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::LinkError;

/// 64-bit device address, rendered as colon-separated hex octets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceAddress(pub [u8; 8]);

impl DeviceAddress {
    pub const LEN: usize = 8;

    /// Build from a slice that must be exactly 8 bytes long
    pub fn from_slice(bytes: &[u8]) -> Result<Self, LinkError> {
        let octets: [u8; 8] = bytes.try_into().map_err(|_| {
            LinkError::validation(format!(
                "device address must be exactly 8 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(DeviceAddress(octets))
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&common::hex::encode_upper_sep(&self.0, ':'))
    }
}

impl FromStr for DeviceAddress {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = common::hex::decode_sep(s.trim(), ':')
            .map_err(|e| LinkError::validation(format!("invalid device address '{s}': {e}")))?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for DeviceAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DeviceAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
