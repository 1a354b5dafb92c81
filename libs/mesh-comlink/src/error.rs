//! Mesh Link Error Types
//!
//! One error type for every failure a device operation can report. Transport
//! faults and in-band device exceptions are unified here so the codec and the
//! facade never inspect raw transport error shapes.

use std::time::Duration;
use thiserror::Error;

use crate::lifecycle::LinkState;

/// Result type for mesh-comlink operations
pub type Result<T> = std::result::Result<T, LinkError>;

/// Failure reported by the underlying transport or master
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportFault(pub String);

impl TransportFault {
    pub fn new(msg: impl Into<String>) -> Self {
        TransportFault(msg.into())
    }
}

/// In-band exception codes carried on device responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    ServerDeviceFailure,
    Acknowledge,
    ServerDeviceBusy,
    MemoryParityError,
    GatewayPathUnavailable,
    GatewayTargetFailedToRespond,
    /// Code outside the standard table
    Other(u8),
}

impl From<u8> for ExceptionCode {
    fn from(code: u8) -> Self {
        match code {
            0x01 => ExceptionCode::IllegalFunction,
            0x02 => ExceptionCode::IllegalDataAddress,
            0x03 => ExceptionCode::IllegalDataValue,
            0x04 => ExceptionCode::ServerDeviceFailure,
            0x05 => ExceptionCode::Acknowledge,
            0x06 => ExceptionCode::ServerDeviceBusy,
            0x08 => ExceptionCode::MemoryParityError,
            0x0A => ExceptionCode::GatewayPathUnavailable,
            0x0B => ExceptionCode::GatewayTargetFailedToRespond,
            other => ExceptionCode::Other(other),
        }
    }
}

impl From<ExceptionCode> for u8 {
    fn from(code: ExceptionCode) -> Self {
        match code {
            ExceptionCode::IllegalFunction => 0x01,
            ExceptionCode::IllegalDataAddress => 0x02,
            ExceptionCode::IllegalDataValue => 0x03,
            ExceptionCode::ServerDeviceFailure => 0x04,
            ExceptionCode::Acknowledge => 0x05,
            ExceptionCode::ServerDeviceBusy => 0x06,
            ExceptionCode::MemoryParityError => 0x08,
            ExceptionCode::GatewayPathUnavailable => 0x0A,
            ExceptionCode::GatewayTargetFailedToRespond => 0x0B,
            ExceptionCode::Other(code) => code,
        }
    }
}

impl std::fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExceptionCode::IllegalFunction => write!(f, "illegal function (0x01)"),
            ExceptionCode::IllegalDataAddress => write!(f, "illegal data address (0x02)"),
            ExceptionCode::IllegalDataValue => write!(f, "illegal data value (0x03)"),
            ExceptionCode::ServerDeviceFailure => write!(f, "server device failure (0x04)"),
            ExceptionCode::Acknowledge => write!(f, "acknowledge (0x05)"),
            ExceptionCode::ServerDeviceBusy => write!(f, "server device busy (0x06)"),
            ExceptionCode::MemoryParityError => write!(f, "memory parity error (0x08)"),
            ExceptionCode::GatewayPathUnavailable => write!(f, "gateway path unavailable (0x0A)"),
            ExceptionCode::GatewayTargetFailedToRespond => {
                write!(f, "gateway target failed to respond (0x0B)")
            },
            ExceptionCode::Other(code) => write!(f, "unknown exception (0x{:02X})", code),
        }
    }
}

/// Coarse classification of a [`LinkError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TransportError,
    DeviceException,
    ValidationError,
    ProtocolLengthError,
    Timeout,
    Cancelled,
    Lifecycle,
    Config,
}

/// Mesh link errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LinkError {
    /// Serial/transport failure, surfaced as-is
    #[error("Transport error: {0}")]
    Transport(#[from] TransportFault),

    /// In-band exception reported by the device
    #[error("Device exception: {code}")]
    DeviceException { code: ExceptionCode },

    /// Malformed caller input, detected before any I/O
    #[error("Validation error: {0}")]
    Validation(String),

    /// Response length violates a fixed-layout contract
    #[error("Protocol length error: {object} expected {expected}, got {actual} bytes")]
    ProtocolLength {
        object: &'static str,
        expected: String,
        actual: usize,
    },

    /// No completion within the request timeout
    #[error("Timeout: no response within {0:?}")]
    Timeout(Duration),

    /// Request cancelled by the caller
    #[error("Request cancelled")]
    Cancelled,

    /// Operation not allowed in the current lifecycle state
    #[error("Invalid state: cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: LinkState,
    },

    /// Connection was torn down
    #[error("Connection destroyed")]
    Destroyed,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LinkError {
    pub fn transport(msg: impl Into<String>) -> Self {
        LinkError::Transport(TransportFault::new(msg))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        LinkError::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        LinkError::Config(msg.into())
    }

    pub fn device(code: impl Into<ExceptionCode>) -> Self {
        LinkError::DeviceException { code: code.into() }
    }

    /// Length error for a layout with a fixed expectation
    pub fn length(object: &'static str, expected: impl Into<String>, actual: usize) -> Self {
        LinkError::ProtocolLength {
            object,
            expected: expected.into(),
            actual,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LinkError::Transport(_) => ErrorKind::TransportError,
            LinkError::DeviceException { .. } => ErrorKind::DeviceException,
            LinkError::Validation(_) => ErrorKind::ValidationError,
            LinkError::ProtocolLength { .. } => ErrorKind::ProtocolLengthError,
            LinkError::Timeout(_) => ErrorKind::Timeout,
            LinkError::Cancelled => ErrorKind::Cancelled,
            LinkError::InvalidState { .. } | LinkError::Destroyed => ErrorKind::Lifecycle,
            LinkError::Config(_) => ErrorKind::Config,
        }
    }

    /// Exception code, if this error came from the device
    pub fn exception_code(&self) -> Option<ExceptionCode> {
        match self {
            LinkError::DeviceException { code } => Some(*code),
            _ => None,
        }
    }
}

impl From<figment::Error> for LinkError {
    fn from(err: figment::Error) -> Self {
        LinkError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_code_roundtrip_table() {
        for code in [0x01u8, 0x02, 0x03, 0x04, 0x05, 0x06, 0x08, 0x0A, 0x0B, 0x07, 0x42] {
            assert_eq!(u8::from(ExceptionCode::from(code)), code);
        }
        assert_eq!(ExceptionCode::from(0x07), ExceptionCode::Other(0x07));
    }

    #[test]
    fn test_error_kind_classification() {
        assert_eq!(LinkError::transport("eof").kind(), ErrorKind::TransportError);
        assert_eq!(LinkError::device(0x02).kind(), ErrorKind::DeviceException);
        assert_eq!(LinkError::validation("bad").kind(), ErrorKind::ValidationError);
        assert_eq!(
            LinkError::length("connection table", "multiple of 14", 15).kind(),
            ErrorKind::ProtocolLengthError
        );
        assert_eq!(LinkError::Destroyed.kind(), ErrorKind::Lifecycle);
    }

    #[test]
    fn test_messages_name_failure_kind() {
        assert!(LinkError::device(0x04)
            .to_string()
            .starts_with("Device exception"));
        assert!(LinkError::validation("x")
            .to_string()
            .starts_with("Validation error"));
        let msg = LinkError::length("connection table", "multiple of 14", 15).to_string();
        assert!(msg.contains("connection table"));
        assert!(msg.contains("15"));
    }
}
