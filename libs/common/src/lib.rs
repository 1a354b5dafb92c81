//! Shared utilities for the mesh workspace
//!
//! - hex encoding and decoding
//! - logging setup
//! - graceful shutdown

pub mod hex;
pub mod logging;
pub mod shutdown;
