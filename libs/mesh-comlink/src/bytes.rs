//! Binary data processing utilities
//!
//! Byte order handling, bit extraction and register/byte conversions shared by
//! the object codecs and the generic register items.

pub mod bit_ops;
pub mod byte_order;
pub mod conversions;

pub use bit_ops::*;
pub use byte_order::ByteOrder;
pub use conversions::*;
