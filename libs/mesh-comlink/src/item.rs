//! Generic register items
//!
//! A [`RegisterItem`] describes one readable/writable value on the device: where
//! it lives, how many bytes it spans, how to convert between bytes and a typed
//! value, and how to render that value for humans.

use bytes::Bytes;

use crate::bytes::{bytes_to_regs, regs_to_bytes, regs_to_u32, u32_to_regs, ByteOrder};
use crate::error::{LinkError, Result};

/// Which master primitive serves an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// Device object, read with `read_object`
    Object,
    /// Holding registers, read with `read_holding_registers`
    HoldingRegister,
}

pub trait RegisterItem: Send + Sync {
    type Value;

    fn kind(&self) -> ItemKind;

    /// Object id or first register address
    fn address(&self) -> u16;

    /// Encoded length in bytes; 0 for variable-length objects
    fn length(&self) -> usize;

    fn from_buffer(&self, data: &[u8]) -> Result<Self::Value>;

    fn to_buffer(&self, value: &Self::Value) -> Result<Bytes>;

    /// Human-readable rendering
    fn format(&self, value: &Self::Value) -> String;

    /// Parse the rendering produced by [`format`](Self::format)
    fn unformat(&self, text: &str) -> Result<Self::Value>;
}

fn expect_len(item: &'static str, data: &[u8], expected: usize) -> Result<()> {
    if data.len() < expected {
        return Err(LinkError::length(item, format!("at least {expected}"), data.len()));
    }
    Ok(())
}

fn parse_integer(text: &str) -> Result<u64> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse::<u64>(),
    };
    parsed.map_err(|e| LinkError::validation(format!("invalid number '{text}': {e}")))
}

/// Single 16-bit holding register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordItem {
    pub address: u16,
}

impl WordItem {
    pub fn new(address: u16) -> Self {
        Self { address }
    }
}

impl RegisterItem for WordItem {
    type Value = u16;

    fn kind(&self) -> ItemKind {
        ItemKind::HoldingRegister
    }

    fn address(&self) -> u16 {
        self.address
    }

    fn length(&self) -> usize {
        2
    }

    fn from_buffer(&self, data: &[u8]) -> Result<u16> {
        expect_len("word register", data, 2)?;
        Ok(u16::from_be_bytes([data[0], data[1]]))
    }

    fn to_buffer(&self, value: &u16) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(&value.to_be_bytes()))
    }

    fn format(&self, value: &u16) -> String {
        value.to_string()
    }

    fn unformat(&self, text: &str) -> Result<u16> {
        let value = parse_integer(text)?;
        u16::try_from(value)
            .map_err(|_| LinkError::validation(format!("{value} does not fit in 16 bits")))
    }
}

/// 32-bit value spread over two holding registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DWordItem {
    pub address: u16,
    pub byte_order: ByteOrder,
}

impl DWordItem {
    pub fn new(address: u16, byte_order: ByteOrder) -> Self {
        Self { address, byte_order }
    }
}

impl RegisterItem for DWordItem {
    type Value = u32;

    fn kind(&self) -> ItemKind {
        ItemKind::HoldingRegister
    }

    fn address(&self) -> u16 {
        self.address
    }

    fn length(&self) -> usize {
        4
    }

    fn from_buffer(&self, data: &[u8]) -> Result<u32> {
        expect_len("dword register", data, 4)?;
        let regs = bytes_to_regs(&data[..4]);
        Ok(regs_to_u32(&[regs[0], regs[1]], self.byte_order))
    }

    fn to_buffer(&self, value: &u32) -> Result<Bytes> {
        let regs = u32_to_regs(*value, self.byte_order);
        Ok(Bytes::from(regs_to_bytes(&regs)))
    }

    fn format(&self, value: &u32) -> String {
        value.to_string()
    }

    fn unformat(&self, text: &str) -> Result<u32> {
        let value = parse_integer(text)?;
        u32::try_from(value)
            .map_err(|_| LinkError::validation(format!("{value} does not fit in 32 bits")))
    }
}

/// Raw device object, rendered as uppercase hex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectItem {
    pub id: u8,
    /// Expected byte length, 0 when the object is variable length
    pub length: usize,
}

impl ObjectItem {
    pub fn new(id: u8) -> Self {
        Self { id, length: 0 }
    }

    pub fn with_length(id: u8, length: usize) -> Self {
        Self { id, length }
    }
}

impl RegisterItem for ObjectItem {
    type Value = Vec<u8>;

    fn kind(&self) -> ItemKind {
        ItemKind::Object
    }

    fn address(&self) -> u16 {
        u16::from(self.id)
    }

    fn length(&self) -> usize {
        self.length
    }

    fn from_buffer(&self, data: &[u8]) -> Result<Vec<u8>> {
        if self.length != 0 && data.len() != self.length {
            return Err(LinkError::length("object", self.length.to_string(), data.len()));
        }
        Ok(data.to_vec())
    }

    fn to_buffer(&self, value: &Vec<u8>) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(value))
    }

    fn format(&self, value: &Vec<u8>) -> String {
        common::hex::encode_upper(value)
    }

    fn unformat(&self, text: &str) -> Result<Vec<u8>> {
        common::hex::decode(text.trim())
            .map_err(|e| LinkError::validation(format!("invalid hex '{text}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_item() {
        let item = WordItem::new(0x0100);
        assert_eq!(item.kind(), ItemKind::HoldingRegister);
        assert_eq!(item.from_buffer(&[0x12, 0x34]).unwrap(), 0x1234);
        assert_eq!(item.to_buffer(&0xBEEF).unwrap().as_ref(), &[0xBE, 0xEF]);
        assert_eq!(item.unformat("0x1F").unwrap(), 31);
        assert!(item.unformat("70000").is_err());
        assert!(item.from_buffer(&[0x12]).is_err());
    }

    #[test]
    fn test_dword_item_orders() {
        let big = DWordItem::new(0, ByteOrder::BigEndian);
        assert_eq!(big.from_buffer(&[0x12, 0x34, 0x56, 0x78]).unwrap(), 0x1234_5678);

        let swapped = DWordItem::new(0, ByteOrder::BigEndianSwap);
        assert_eq!(swapped.from_buffer(&[0x56, 0x78, 0x12, 0x34]).unwrap(), 0x1234_5678);
        assert_eq!(
            swapped.to_buffer(&0x1234_5678).unwrap().as_ref(),
            &[0x56, 0x78, 0x12, 0x34]
        );
    }

    #[test]
    fn test_object_item_hex_format() {
        let item = ObjectItem::new(7);
        assert_eq!(item.kind(), ItemKind::Object);
        assert_eq!(item.format(&vec![0x0A, 0xFF]), "0AFF");
        assert_eq!(item.unformat("0aff").unwrap(), vec![0x0A, 0xFF]);
        assert!(item.unformat("xyz").is_err());
    }

    #[test]
    fn test_object_item_length_check() {
        let item = ObjectItem::with_length(3, 4);
        assert!(item.from_buffer(&[1, 2, 3, 4]).is_ok());
        assert!(matches!(
            item.from_buffer(&[1, 2, 3]),
            Err(LinkError::ProtocolLength { actual: 3, .. })
        ));
    }
}
