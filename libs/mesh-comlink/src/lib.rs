//! Mesh Coordinator Communication Link
//!
//! Device-communication adapter for a battery-powered wireless mesh
//! coordinator reached over a Modbus-style serial master.
//!
//! # Architecture
//!
//! - **Lifecycle**: `Connection` owns transport and master, reconnects after drops
//! - **Dispatcher**: one request at a time, timeouts and cancellation
//! - **Exception translation**: in-band device exceptions and transport faults
//!   folded into one `LinkError`
//! - **Codecs**: factory record, connection table, ping, scan, slave id
//! - **Facade**: `Coordinator`, the typed device operations
//!
//! The physical serial master is supplied by the embedding application through
//! the [`Transport`] and [`Master`] traits. [`sim::SimulatedCoordinator`]
//! implements both in memory.

pub mod bytes;
pub mod codec;
pub mod commands;
pub mod config;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod exception;
pub mod item;
pub mod lifecycle;
pub mod logger;
pub mod master;
pub mod sim;

// Re-export core types
pub use bytes::ByteOrder;
pub use codec::{
    ConnectionEntry, ConnectionStatus, DeviceAddress, FactoryConfig, FactoryConfigInput,
    LinkMetrics, PingResult, RunState, ScanDuration, ScanResult, ScanType, SlaveId,
};
pub use commands::{CommandTable, COMMAND_NAMES};
pub use config::LinkConfig;
pub use device::{Coordinator, CONNECTION_TABLE_OBJECT_ID, FACTORY_OBJECT_ID};
pub use dispatcher::{Dispatcher, Operation, Request};
pub use error::{ErrorKind, ExceptionCode, LinkError, Result, TransportFault};
pub use item::{DWordItem, ItemKind, ObjectItem, RegisterItem, WordItem};
pub use lifecycle::{Connection, LinkEvent, LinkState, ReconnectStats};
pub use master::{Completion, Master, RawResponse, Reply, Transport, TransportEvent};
