//! In-memory coordinator
//!
//! Implements both [`Transport`] and [`Master`] against a scripted device:
//! an object store, holding registers and the named command handlers. Faults
//! are injectable (failed opens, disconnects, in-band exceptions, transport
//! faults, replies that never arrive) so the lifecycle and dispatch paths can be
//! exercised without hardware.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::codec::ConnectionEntry;
use crate::commands::COMMAND_NAMES;
use crate::device::{CONNECTION_TABLE_OBJECT_ID, FACTORY_OBJECT_ID};
use crate::dispatcher::Operation;
use crate::error::{ExceptionCode, TransportFault};
use crate::master::{Master, RawResponse, Reply, Transport, TransportEvent};

const EVENT_CAPACITY: usize = 16;

/// Max registers per read, as on a Modbus server
const MAX_READ_QUANTITY: u16 = 125;

/// Default report-slave-id payload: product 0x21, running, type 2, v1.0.0,
/// serial 12345, no fault
const DEFAULT_SLAVE_ID: [u8; 11] = [0x21, 0xFF, 0x02, 1, 0, 0, 0x00, 0x00, 0x30, 0x39, 0x00];

/// Canned outcome for the next request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Injection {
    /// In-band exception on an otherwise delivered frame
    Exception(u8),
    /// Transport failure with no response
    Fault(String),
    /// Transport failure reported together with an exception response
    FaultWithException(String, u8),
}

#[derive(Default)]
struct SimState {
    open: bool,
    destroyed: bool,
    fail_opens: usize,
    open_calls: usize,
    rewire_calls: usize,
    silent: bool,
    objects: HashMap<u8, Vec<u8>>,
    registers: HashMap<u16, u16>,
    slave_id: Vec<u8>,
    ping_replies: HashMap<u16, Vec<u8>>,
    scan_reply: Vec<u8>,
    injections: VecDeque<Injection>,
    parked: Vec<Reply>,
    requests: Vec<Operation>,
}

enum Outcome {
    Respond(RawResponse),
    Fail(TransportFault),
    Both(TransportFault, RawResponse),
    Park,
}

pub struct SimulatedCoordinator {
    name: String,
    state: Mutex<SimState>,
    events: Mutex<broadcast::Sender<TransportEvent>>,
}

impl std::fmt::Debug for SimulatedCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedCoordinator")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .finish()
    }
}

impl SimulatedCoordinator {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let mut state = SimState {
            slave_id: DEFAULT_SLAVE_ID.to_vec(),
            scan_reply: vec![15, 3, 7, 12, 2],
            ..SimState::default()
        };
        state.objects.insert(FACTORY_OBJECT_ID, vec![0x00]);
        state.objects.insert(CONNECTION_TABLE_OBJECT_ID, Vec::new());

        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(state),
            events: Mutex::new(events),
        })
    }

    // ---- scripting ----

    pub fn set_object(&self, id: u8, data: Vec<u8>) {
        self.state.lock().objects.insert(id, data);
    }

    pub fn object(&self, id: u8) -> Option<Vec<u8>> {
        self.state.lock().objects.get(&id).cloned()
    }

    /// Append an entry to the connection table object
    pub fn add_connection(&self, entry: ConnectionEntry) {
        self.state
            .lock()
            .objects
            .entry(CONNECTION_TABLE_OBJECT_ID)
            .or_default()
            .extend_from_slice(&entry.encode());
    }

    pub fn set_register(&self, address: u16, value: u16) {
        self.state.lock().registers.insert(address, value);
    }

    pub fn register(&self, address: u16) -> Option<u16> {
        self.state.lock().registers.get(&address).copied()
    }

    pub fn set_slave_id(&self, data: Vec<u8>) {
        self.state.lock().slave_id = data;
    }

    /// Ping payload returned for `address`; unknown addresses answer empty
    pub fn set_ping_reply(&self, address: u16, data: Vec<u8>) {
        self.state.lock().ping_replies.insert(address, data);
    }

    pub fn set_scan_reply(&self, data: Vec<u8>) {
        self.state.lock().scan_reply = data;
    }

    /// Queue an outcome for the next request
    pub fn inject(&self, injection: Injection) {
        self.state.lock().injections.push_back(injection);
    }

    /// Silent mode accepts requests but never resolves them
    pub fn set_silent(&self, silent: bool) {
        self.state.lock().silent = silent;
    }

    /// Drop every unresolved reply, as a port teardown would
    pub fn drop_parked(&self) {
        let parked = std::mem::take(&mut self.state.lock().parked);
        drop(parked);
    }

    pub fn fail_next_opens(&self, count: usize) {
        self.state.lock().fail_opens = count;
    }

    /// Simulate the physical link dropping.
    ///
    /// Like some native serial drivers, this also drops every event listener:
    /// existing receivers see the disconnect and then a closed channel.
    pub fn disconnect(&self, reason: &str) {
        self.state.lock().open = false;
        let mut events = self.events.lock();
        let _ = events.send(TransportEvent::Disconnected {
            reason: reason.to_string(),
        });
        let (fresh, _) = broadcast::channel(EVENT_CAPACITY);
        *events = fresh;
        info!("{}: simulated disconnect ({})", self.name, reason);
    }

    // ---- inspection ----

    pub fn open_calls(&self) -> usize {
        self.state.lock().open_calls
    }

    pub fn rewire_calls(&self) -> usize {
        self.state.lock().rewire_calls
    }

    /// Every request the master accepted, in order
    pub fn requests(&self) -> Vec<Operation> {
        self.state.lock().requests.clone()
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    fn notify(&self, event: TransportEvent) {
        let _ = self.events.lock().send(event);
    }

    fn handle(&self, operation: Operation, reply: Reply) {
        let outcome = {
            let mut state = self.state.lock();
            if state.destroyed || !state.open {
                Outcome::Fail(TransportFault::new("port not open"))
            } else {
                state.requests.push(operation.clone());
                match state.injections.pop_front() {
                    Some(Injection::Exception(code)) => {
                        Outcome::Respond(RawResponse::exception(code))
                    },
                    Some(Injection::Fault(msg)) => Outcome::Fail(TransportFault::new(msg)),
                    Some(Injection::FaultWithException(msg, code)) => {
                        Outcome::Both(TransportFault::new(msg), RawResponse::exception(code))
                    },
                    None if state.silent => Outcome::Park,
                    None => Outcome::Respond(execute(&mut state, &operation)),
                }
            }
        };

        match outcome {
            Outcome::Respond(response) => reply.complete(response),
            Outcome::Fail(fault) => reply.fail(fault),
            Outcome::Both(fault, response) => reply.resolve(Some(fault), Some(response)),
            Outcome::Park => {
                debug!("{}: parking {}", self.name, operation.name());
                self.state.lock().parked.push(reply);
            },
        }
    }
}

fn exception(code: ExceptionCode) -> RawResponse {
    RawResponse::exception(code.into())
}

fn execute(state: &mut SimState, operation: &Operation) -> RawResponse {
    match operation {
        Operation::ReadObject { id } => match state.objects.get(id) {
            Some(data) => RawResponse::with_values(data.clone()),
            None => exception(ExceptionCode::IllegalDataAddress),
        },
        Operation::WriteObject { id, data } => {
            state.objects.insert(*id, data.to_vec());
            RawResponse::default()
        },
        Operation::ReadHoldingRegisters { address, quantity } => {
            if *quantity == 0 || *quantity > MAX_READ_QUANTITY {
                return exception(ExceptionCode::IllegalDataValue);
            }
            let mut values = Vec::with_capacity(usize::from(*quantity) * 2);
            for offset in 0..*quantity {
                let value = state
                    .registers
                    .get(&address.wrapping_add(offset))
                    .copied()
                    .unwrap_or(0);
                values.extend_from_slice(&value.to_be_bytes());
            }
            RawResponse::with_values(values)
        },
        Operation::WriteMultipleRegisters { address, data } => {
            if data.is_empty() || data.len() % 2 != 0 {
                return exception(ExceptionCode::IllegalDataValue);
            }
            for (offset, word) in data.chunks_exact(2).enumerate() {
                let register = address.wrapping_add(offset as u16);
                state
                    .registers
                    .insert(register, u16::from_be_bytes([word[0], word[1]]));
            }
            RawResponse::default()
        },
        Operation::Command { id, data } => run_command(state, *id, data),
        Operation::ReportSlaveId => RawResponse::with_values(state.slave_id.clone()),
    }
}

fn run_command(state: &mut SimState, id: u8, data: &Bytes) -> RawResponse {
    match COMMAND_NAMES.get(usize::from(id)).copied() {
        Some("reset") | Some("pair") => RawResponse::new(0, vec![0x00]),
        Some("clear") => {
            state.objects.insert(CONNECTION_TABLE_OBJECT_ID, Vec::new());
            RawResponse::new(0, vec![0x00])
        },
        Some("ping") => {
            if data.len() != 2 {
                return exception(ExceptionCode::IllegalDataValue);
            }
            let address = u16::from_le_bytes([data[0], data[1]]);
            let values = state.ping_replies.get(&address).cloned().unwrap_or_default();
            RawResponse::with_values(values)
        },
        Some("scan") => {
            if data.len() != 2 {
                return exception(ExceptionCode::IllegalDataValue);
            }
            RawResponse::with_values(state.scan_reply.clone())
        },
        _ => exception(ExceptionCode::IllegalFunction),
    }
}

#[async_trait]
impl Transport for SimulatedCoordinator {
    async fn open(&self) -> Result<(), TransportFault> {
        {
            let mut state = self.state.lock();
            state.open_calls += 1;
            if state.destroyed {
                return Err(TransportFault::new("port destroyed"));
            }
            if state.fail_opens > 0 {
                state.fail_opens -= 1;
                return Err(TransportFault::new(format!(
                    "cannot open {}: no such device",
                    self.name
                )));
            }
            state.open = true;
        }
        self.notify(TransportEvent::Opened);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportFault> {
        let parked = {
            let mut state = self.state.lock();
            state.open = false;
            std::mem::take(&mut state.parked)
        };
        drop(parked);
        self.notify(TransportEvent::Closed);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.lock().subscribe()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Master for SimulatedCoordinator {
    fn read_object(&self, id: u8, reply: Reply) {
        self.handle(Operation::ReadObject { id }, reply);
    }

    fn write_object(&self, id: u8, data: Bytes, reply: Reply) {
        self.handle(Operation::WriteObject { id, data }, reply);
    }

    fn read_holding_registers(&self, address: u16, quantity: u16, reply: Reply) {
        self.handle(Operation::ReadHoldingRegisters { address, quantity }, reply);
    }

    fn write_multiple_registers(&self, address: u16, data: Bytes, reply: Reply) {
        self.handle(Operation::WriteMultipleRegisters { address, data }, reply);
    }

    fn command(&self, id: u8, data: Bytes, reply: Reply) {
        self.handle(Operation::Command { id, data }, reply);
    }

    fn report_slave_id(&self, reply: Reply) {
        self.handle(Operation::ReportSlaveId, reply);
    }

    fn rewire(&self) {
        self.state.lock().rewire_calls += 1;
    }

    fn destroy(&self) {
        let parked = {
            let mut state = self.state.lock();
            state.destroyed = true;
            state.open = false;
            std::mem::take(&mut state.parked)
        };
        drop(parked);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::Completion;

    async fn call(f: impl FnOnce(Reply)) -> Completion {
        let (reply, rx) = Reply::channel();
        f(reply);
        rx.await.unwrap()
    }

    #[tokio::test]
    async fn test_requests_fail_while_closed() {
        let sim = SimulatedCoordinator::new("sim0");
        let completion = call(|r| sim.report_slave_id(r)).await;
        assert_eq!(completion.error, Some(TransportFault::new("port not open")));
        assert!(sim.requests().is_empty());
    }

    #[tokio::test]
    async fn test_register_write_then_read() {
        let sim = SimulatedCoordinator::new("sim0");
        sim.open().await.unwrap();

        let data = Bytes::from_static(&[0x12, 0x34, 0xAB, 0xCD]);
        let completion = call(|r| sim.write_multiple_registers(100, data, r)).await;
        assert!(completion.error.is_none());
        assert_eq!(sim.register(101), Some(0xABCD));

        let completion = call(|r| sim.read_holding_registers(100, 2, r)).await;
        assert_eq!(
            completion.response.unwrap().values.as_ref(),
            &[0x12, 0x34, 0xAB, 0xCD]
        );
    }

    #[tokio::test]
    async fn test_unknown_command_is_illegal_function() {
        let sim = SimulatedCoordinator::new("sim0");
        sim.open().await.unwrap();
        let completion = call(|r| sim.command(42, Bytes::new(), r)).await;
        assert_eq!(completion.response.unwrap().exception_code, Some(0x01));
    }

    #[tokio::test]
    async fn test_disconnect_drops_listeners() {
        let sim = SimulatedCoordinator::new("sim0");
        sim.open().await.unwrap();
        let mut old = sim.subscribe();

        sim.disconnect("cable pulled");
        assert!(!sim.is_open());
        assert_eq!(
            old.recv().await.unwrap(),
            TransportEvent::Disconnected {
                reason: "cable pulled".into()
            }
        );
        assert!(matches!(
            old.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_destroy_releases_parked_replies() {
        let sim = SimulatedCoordinator::new("sim0");
        sim.open().await.unwrap();
        sim.set_silent(true);

        let (reply, rx) = Reply::channel();
        sim.report_slave_id(reply);
        sim.destroy();

        let completion = rx.await.unwrap();
        assert_eq!(completion.error, Some(TransportFault::new("request dropped")));
        assert!(sim.is_destroyed());
    }
}
