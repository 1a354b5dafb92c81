//! Coordinator operations
//!
//! Thin composition over the dispatcher and the codecs: build the payload,
//! dispatch against a fixed object or command id, decode the answer.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info};

use crate::codec::{
    decode_connection_table, decode_factory_record, decode_ping, decode_scan, decode_slave_id,
    encode_factory_record, encode_ping_request, encode_scan_request, ConnectionEntry,
    FactoryConfig, FactoryConfigInput, PingResult, ScanDuration, ScanResult, ScanType, SlaveId,
};
use crate::commands::CommandTable;
use crate::config::LinkConfig;
use crate::dispatcher::{Dispatcher, Operation, Request};
use crate::error::{LinkError, Result};
use crate::item::{ItemKind, RegisterItem};
use crate::lifecycle::{Connection, LinkState};
use crate::logger::LinkLogger;
use crate::master::{Master, RawResponse, Transport};

/// Object id of the factory record
pub const FACTORY_OBJECT_ID: u8 = 0;

/// Object id of the connection table
pub const CONNECTION_TABLE_OBJECT_ID: u8 = 1;

/// Handle to one mesh coordinator
pub struct Coordinator {
    connection: Connection,
    dispatcher: Dispatcher,
    commands: CommandTable,
    command_timeout: Option<Duration>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("connection", &self.connection)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

impl Coordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        master: Arc<dyn Master>,
        config: &LinkConfig,
    ) -> Self {
        let connection = Connection::new(transport, master, config.reconnect_interval());
        Self::with_connection(connection, config.request_timeout(), config.command_timeout())
    }

    pub fn with_connection(
        connection: Connection,
        request_timeout: Option<Duration>,
        command_timeout: Option<Duration>,
    ) -> Self {
        let logger = LinkLogger::new(connection.name());
        let dispatcher = Dispatcher::new(
            connection.master(),
            connection.state_receiver(),
            request_timeout,
            logger,
        );
        Self {
            connection,
            dispatcher,
            commands: CommandTable::default(),
            command_timeout,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Direct access for callers that need timeouts or cancellation per request
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn state(&self) -> LinkState {
        self.connection.state()
    }

    pub async fn open(&self) -> Result<()> {
        self.connection.open().await
    }

    pub async fn close(&self) -> Result<()> {
        self.connection.close().await
    }

    pub async fn destroy(&self) -> Result<()> {
        self.connection.destroy().await
    }

    pub async fn get_slave_id(&self) -> Result<SlaveId> {
        let response = self.dispatcher.dispatch(Operation::ReportSlaveId).await?;
        decode_slave_id(&response.values)
    }

    /// `None` when the device was never programmed
    pub async fn get_factory_config(&self) -> Result<Option<FactoryConfig>> {
        let response = self
            .dispatcher
            .dispatch(Operation::ReadObject {
                id: FACTORY_OBJECT_ID,
            })
            .await?;
        decode_factory_record(&response.values)
    }

    /// Validates `input` and writes the factory record. Nothing is sent when
    /// validation fails.
    pub async fn set_factory_config(&self, input: &FactoryConfigInput) -> Result<FactoryConfig> {
        let config = input.validate()?;
        self.dispatcher
            .dispatch(Operation::WriteObject {
                id: FACTORY_OBJECT_ID,
                data: encode_factory_record(&config),
            })
            .await?;
        info!(
            "Factory record written: address={} serial={} type={}",
            config.mac_address, config.serial_number, config.product_type
        );
        Ok(config)
    }

    /// Valid entries of the connection table, in table order
    pub async fn get_connections(&self) -> Result<Vec<ConnectionEntry>> {
        let response = self
            .dispatcher
            .dispatch(Operation::ReadObject {
                id: CONNECTION_TABLE_OBJECT_ID,
            })
            .await?;
        decode_connection_table(&response.values)
    }

    /// Run a named command with an arbitrary payload
    pub async fn command(&self, name: &str, payload: impl Into<Bytes>) -> Result<RawResponse> {
        let id = self.commands.resolve(name)?;
        debug!("command {} (id {})", name, id);
        let request = Request::new(Operation::Command {
            id,
            data: payload.into(),
        })
        .with_timeout(self.command_timeout);
        self.dispatcher.dispatch(request).await
    }

    pub async fn scan(&self, scan_type: ScanType, duration: ScanDuration) -> Result<ScanResult> {
        let response = self
            .command("scan", encode_scan_request(scan_type, duration))
            .await?;
        decode_scan(&response.values)
    }

    pub async fn reset(&self) -> Result<u8> {
        self.status_command("reset").await
    }

    pub async fn clear(&self) -> Result<u8> {
        self.status_command("clear").await
    }

    pub async fn pair(&self) -> Result<u8> {
        self.status_command("pair").await
    }

    /// Ping a node by short address. A silent node is `PingResult::NoResponse`.
    pub async fn ping(&self, address: u16) -> Result<PingResult> {
        let response = self.command("ping", encode_ping_request(address)).await?;
        Ok(decode_ping(&response.values))
    }

    pub async fn read<I: RegisterItem>(&self, item: &I) -> Result<I::Value> {
        let operation = match item.kind() {
            ItemKind::Object => Operation::ReadObject {
                id: object_id(item)?,
            },
            ItemKind::HoldingRegister => Operation::ReadHoldingRegisters {
                address: item.address(),
                quantity: register_count(item.length())?,
            },
        };
        let response = self.dispatcher.dispatch(operation).await?;
        item.from_buffer(&response.values)
    }

    pub async fn write<I: RegisterItem>(&self, item: &I, value: &I::Value) -> Result<()> {
        let data = item.to_buffer(value)?;
        if item.length() != 0 && data.len() != item.length() {
            return Err(LinkError::validation(format!(
                "encoded value is {} bytes, item expects {}",
                data.len(),
                item.length()
            )));
        }

        let operation = match item.kind() {
            ItemKind::Object => Operation::WriteObject {
                id: object_id(item)?,
                data,
            },
            ItemKind::HoldingRegister => {
                register_count(data.len())?;
                Operation::WriteMultipleRegisters {
                    address: item.address(),
                    data,
                }
            },
        };
        self.dispatcher.dispatch(operation).await?;
        Ok(())
    }

    async fn status_command(&self, name: &str) -> Result<u8> {
        let response = self.command(name, Bytes::new()).await?;
        Ok(response.status)
    }
}

fn object_id<I: RegisterItem>(item: &I) -> Result<u8> {
    u8::try_from(item.address())
        .map_err(|_| LinkError::validation(format!("object id {} exceeds 255", item.address())))
}

fn register_count(byte_len: usize) -> Result<u16> {
    if byte_len == 0 || byte_len % 2 != 0 {
        return Err(LinkError::validation(format!(
            "register items need an even, non-zero byte length, got {byte_len}"
        )));
    }
    u16::try_from(byte_len / 2)
        .map_err(|_| LinkError::validation(format!("{byte_len} bytes exceeds register range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_count() {
        assert_eq!(register_count(4).unwrap(), 2);
        assert!(register_count(0).is_err());
        assert!(register_count(3).is_err());
    }
}
