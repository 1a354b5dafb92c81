//! Factory record codec
//!
//! ```text
//! 0        8            12             13            20
//! +--------+------------+--------------+-------------+
//! | address| serial (BE)| product type | reserved (0)|
//! +--------+------------+--------------+-------------+
//! ```
//!
//! A device that was never programmed answers with the single byte `0x00`.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use super::address::DeviceAddress;
use crate::error::{LinkError, Result};

/// Encoded factory record length
pub const FACTORY_RECORD_LEN: usize = 20;

const RESERVED_LEN: usize = 7;

/// Factory programmed identity of the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactoryConfig {
    pub mac_address: DeviceAddress,
    pub serial_number: u32,
    pub product_type: u8,
}

/// Loosely typed factory settings as supplied by a caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactoryConfigInput {
    pub mac_address: Vec<u8>,
    pub serial_number: u64,
    pub product_type: Option<u8>,
}

impl FactoryConfigInput {
    /// Validate before anything reaches the wire
    pub fn validate(&self) -> Result<FactoryConfig> {
        let mac_address = DeviceAddress::from_slice(&self.mac_address)?;
        let serial_number = u32::try_from(self.serial_number).map_err(|_| {
            LinkError::validation(format!(
                "serial number {} outside 0..={}",
                self.serial_number,
                u32::MAX
            ))
        })?;
        let product_type = self
            .product_type
            .ok_or_else(|| LinkError::validation("product type is required"))?;

        Ok(FactoryConfig {
            mac_address,
            serial_number,
            product_type,
        })
    }
}

impl From<FactoryConfig> for FactoryConfigInput {
    fn from(config: FactoryConfig) -> Self {
        Self {
            mac_address: config.mac_address.as_bytes().to_vec(),
            serial_number: u64::from(config.serial_number),
            product_type: Some(config.product_type),
        }
    }
}

/// Encode a factory record into its 20-byte layout
pub fn encode_factory_record(config: &FactoryConfig) -> Bytes {
    let mut buf = BytesMut::with_capacity(FACTORY_RECORD_LEN);
    buf.put_slice(config.mac_address.as_bytes());
    buf.put_u32(config.serial_number);
    buf.put_u8(config.product_type);
    buf.put_bytes(0, RESERVED_LEN);
    buf.freeze()
}

/// Decode a factory record; `Ok(None)` when the device is unprogrammed
pub fn decode_factory_record(data: &[u8]) -> Result<Option<FactoryConfig>> {
    if data == [0x00] {
        return Ok(None);
    }
    if data.len() != FACTORY_RECORD_LEN {
        return Err(LinkError::length(
            "factory record",
            FACTORY_RECORD_LEN.to_string(),
            data.len(),
        ));
    }

    let mac_address = DeviceAddress::from_slice(&data[0..8])?;
    let serial_number = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
    let product_type = data[12];

    Ok(Some(FactoryConfig {
        mac_address,
        serial_number,
        product_type,
    }))
}
