//! Hex encoding utility
//! Uppercase encoding for logs and addresses, plus the matching decoders

pub use hex::{encode_upper, FromHexError};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HexError {
    #[error(transparent)]
    Invalid(#[from] FromHexError),
    #[error("expected 2 hex digits per octet, got '{0}'")]
    BadOctet(String),
}

/// Encode bytes to uppercase hex octets joined by `sep`
/// Example: [0x00, 0x1A, 0xFF] with ':' -> "00:1A:FF"
pub fn encode_upper_sep(data: &[u8], sep: char) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(&sep.to_string())
}

/// Decode a contiguous hex string, either case
pub fn decode(text: &str) -> Result<Vec<u8>, HexError> {
    Ok(hex::decode(text)?)
}

/// Decode hex octets separated by `sep`; every octet must be two digits
pub fn decode_sep(text: &str, sep: char) -> Result<Vec<u8>, HexError> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    text.split(sep)
        .map(|octet| {
            let mut byte = [0u8; 1];
            hex::decode_to_slice(octet, &mut byte).map_err(|e| match e {
                FromHexError::OddLength | FromHexError::InvalidStringLength => {
                    HexError::BadOctet(octet.to_string())
                },
                other => HexError::Invalid(other),
            })?;
            Ok(byte[0])
        })
        .collect()
}
