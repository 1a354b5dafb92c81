//! Word order for multi-register values
//!
//! Uses ABCD notation where A is the most significant byte. For `0x12345678`:
//! - `BigEndian (ABCD)`: [0x12, 0x34, 0x56, 0x78]
//! - `LittleEndian (DCBA)`: [0x78, 0x56, 0x34, 0x12]
//! - `BigEndianSwap (CDAB)`: [0x56, 0x78, 0x12, 0x34]
//! - `LittleEndianSwap (BADC)`: [0x34, 0x12, 0x78, 0x56]

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ByteOrder {
    /// ABCD, network byte order
    #[default]
    BigEndian,
    /// DCBA
    LittleEndian,
    /// CDAB, big-endian words in swapped order
    BigEndianSwap,
    /// BADC
    LittleEndianSwap,
}

impl ByteOrder {
    /// Parse the usual ABCD-style spellings
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized = s.to_uppercase().replace('-', "");
        match normalized.as_str() {
            "ABCD" | "BE" | "BIG_ENDIAN" | "BIGENDIAN" => Some(Self::BigEndian),
            "DCBA" | "LE" | "LITTLE_ENDIAN" | "LITTLEENDIAN" => Some(Self::LittleEndian),
            "CDAB" | "BIG_ENDIAN_SWAP" | "BIGENDIANSWAP" => Some(Self::BigEndianSwap),
            "BADC" | "LITTLE_ENDIAN_SWAP" | "LITTLEENDIANSWAP" => Some(Self::LittleEndianSwap),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BigEndian => "ABCD",
            Self::LittleEndian => "DCBA",
            Self::BigEndianSwap => "CDAB",
            Self::LittleEndianSwap => "BADC",
        }
    }
}

impl std::fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_valid() {
        assert_eq!(ByteOrder::from_str("ABCD"), Some(ByteOrder::BigEndian));
        assert_eq!(ByteOrder::from_str("cd-ab"), Some(ByteOrder::BigEndianSwap));
        assert_eq!(ByteOrder::from_str("le"), Some(ByteOrder::LittleEndian));
        assert_eq!(ByteOrder::from_str("BADC"), Some(ByteOrder::LittleEndianSwap));
    }

    #[test]
    fn test_from_str_invalid() {
        assert_eq!(ByteOrder::from_str("AB"), None);
        assert_eq!(ByteOrder::from_str(""), None);
    }
}
