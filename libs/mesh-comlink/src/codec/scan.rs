//! Channel scan codec

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};

/// Kind of channel scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    Energy = 1,
    Active = 2,
    Both = 3,
}

impl std::str::FromStr for ScanType {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "energy" => Ok(ScanType::Energy),
            "active" => Ok(ScanType::Active),
            "both" => Ok(ScanType::Both),
            other => Err(LinkError::validation(format!(
                "unknown scan type '{other}', expected energy, active or both"
            ))),
        }
    }
}

/// Scan duration exponent; each channel is sampled for `(2^n + 1)` base periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanDuration(u8);

impl ScanDuration {
    pub const MAX: u8 = 14;

    pub fn new(exponent: u8) -> Result<Self> {
        if exponent > Self::MAX {
            return Err(LinkError::validation(format!(
                "scan duration {exponent} outside 0..={}",
                Self::MAX
            )));
        }
        Ok(Self(exponent))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

/// Best channel plus relative noise per scanned channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub best_channel: u8,
    pub noise: Vec<u8>,
}

pub fn encode_scan_request(scan_type: ScanType, duration: ScanDuration) -> Bytes {
    Bytes::copy_from_slice(&[scan_type as u8, duration.value()])
}

pub fn decode_scan(data: &[u8]) -> Result<ScanResult> {
    let (&best_channel, noise) = data
        .split_first()
        .ok_or_else(|| LinkError::length("scan result", "at least 1", 0))?;

    Ok(ScanResult {
        best_channel,
        noise: noise.to_vec(),
    })
}
