//! Bit-level operations for status bytes and flag fields

/// Extract single bit from u8 value
#[inline]
pub fn extract_bit_u8(value: u8, bit_index: u8) -> bool {
    debug_assert!(bit_index < 8, "Bit index out of range: {}", bit_index);
    (value & (1 << bit_index)) != 0
}

/// Set or clear a single bit in a u8 value
#[inline]
pub fn with_bit_u8(value: u8, bit_index: u8, on: bool) -> u8 {
    debug_assert!(bit_index < 8, "Bit index out of range: {}", bit_index);
    if on {
        value | (1 << bit_index)
    } else {
        value & !(1 << bit_index)
    }
}
