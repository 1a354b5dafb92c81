//! Register and byte conversions
//!
//! Holding registers travel as big-endian 16-bit words; these helpers move
//! between register arrays, raw bytes and 32-bit values.

use super::ByteOrder;

/// Convert 2 registers to 4 bytes in the given order
pub fn regs_to_bytes_4(regs: &[u16; 2], order: ByteOrder) -> [u8; 4] {
    let [h0, h1] = [regs[0].to_be_bytes(), regs[1].to_be_bytes()];

    match order {
        ByteOrder::BigEndian => [h0[0], h0[1], h1[0], h1[1]],
        ByteOrder::LittleEndian => [h1[1], h1[0], h0[1], h0[0]],
        ByteOrder::BigEndianSwap => [h1[0], h1[1], h0[0], h0[1]],
        ByteOrder::LittleEndianSwap => [h0[1], h0[0], h1[1], h1[0]],
    }
}

/// Convert 2 registers to u32
pub fn regs_to_u32(regs: &[u16; 2], order: ByteOrder) -> u32 {
    u32::from_be_bytes(regs_to_bytes_4(regs, order))
}

/// Convert u32 to 2 registers, inverse of [`regs_to_u32`]
pub fn u32_to_regs(value: u32, order: ByteOrder) -> [u16; 2] {
    let [a, b, c, d] = value.to_be_bytes();
    match order {
        ByteOrder::BigEndian => [u16::from_be_bytes([a, b]), u16::from_be_bytes([c, d])],
        ByteOrder::LittleEndian => [u16::from_be_bytes([d, c]), u16::from_be_bytes([b, a])],
        ByteOrder::BigEndianSwap => [u16::from_be_bytes([c, d]), u16::from_be_bytes([a, b])],
        ByteOrder::LittleEndianSwap => [u16::from_be_bytes([b, a]), u16::from_be_bytes([d, c])],
    }
}

/// Split big-endian register bytes into words; a trailing odd byte is dropped
pub fn bytes_to_regs(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

/// Join words into big-endian register bytes
pub fn regs_to_bytes(regs: &[u16]) -> Vec<u8> {
    regs.iter().flat_map(|reg| reg.to_be_bytes()).collect()
}
