//! Request dispatch
//!
//! One logical request at a time: the dispatcher hands the operation to the
//! master with a fresh [`Reply`], waits for the single completion (bounded by
//! the request timeout or a cancellation token) and folds it through the
//! exception translator.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::{LinkError, Result, TransportFault};
use crate::exception::translate;
use crate::lifecycle::LinkState;
use crate::logger::LinkLogger;
use crate::master::{Completion, Master, RawResponse, Reply};

/// Master primitive a request maps to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    ReadObject { id: u8 },
    WriteObject { id: u8, data: Bytes },
    ReadHoldingRegisters { address: u16, quantity: u16 },
    WriteMultipleRegisters { address: u16, data: Bytes },
    Command { id: u8, data: Bytes },
    ReportSlaveId,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ReadObject { .. } => "read_object",
            Operation::WriteObject { .. } => "write_object",
            Operation::ReadHoldingRegisters { .. } => "read_holding_registers",
            Operation::WriteMultipleRegisters { .. } => "write_multiple_registers",
            Operation::Command { .. } => "command",
            Operation::ReportSlaveId => "report_slave_id",
        }
    }

    /// Object id, register address or command id
    pub fn target(&self) -> Option<u16> {
        match self {
            Operation::ReadObject { id }
            | Operation::WriteObject { id, .. }
            | Operation::Command { id, .. } => Some(u16::from(*id)),
            Operation::ReadHoldingRegisters { address, .. }
            | Operation::WriteMultipleRegisters { address, .. } => Some(*address),
            Operation::ReportSlaveId => None,
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            Operation::WriteObject { data, .. }
            | Operation::WriteMultipleRegisters { data, .. }
            | Operation::Command { data, .. } => data,
            _ => &[],
        }
    }
}

/// A logical request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub operation: Operation,
    /// Overrides the dispatcher default when set
    pub timeout: Option<Duration>,
}

impl Request {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl From<Operation> for Request {
    fn from(operation: Operation) -> Self {
        Request::new(operation)
    }
}

pub struct Dispatcher {
    master: Arc<dyn Master>,
    state: watch::Receiver<LinkState>,
    default_timeout: Option<Duration>,
    /// Held for the whole request so nothing is pipelined
    gate: tokio::sync::Mutex<()>,
    logger: LinkLogger,
}

impl Dispatcher {
    pub fn new(
        master: Arc<dyn Master>,
        state: watch::Receiver<LinkState>,
        default_timeout: Option<Duration>,
        logger: LinkLogger,
    ) -> Self {
        Self {
            master,
            state,
            default_timeout,
            gate: tokio::sync::Mutex::new(()),
            logger,
        }
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    pub async fn dispatch(&self, request: impl Into<Request>) -> Result<RawResponse> {
        self.run(request.into(), None).await
    }

    /// Like [`dispatch`](Self::dispatch), but gives up with `Cancelled` once
    /// `cancel` fires
    pub async fn dispatch_cancellable(
        &self,
        request: impl Into<Request>,
        cancel: &CancellationToken,
    ) -> Result<RawResponse> {
        self.run(request.into(), Some(cancel)).await
    }

    fn ensure_open(&self) -> Result<()> {
        match *self.state.borrow() {
            LinkState::Open => Ok(()),
            LinkState::Destroyed => Err(LinkError::Destroyed),
            state => Err(LinkError::InvalidState {
                operation: "dispatch",
                state,
            }),
        }
    }

    async fn run(
        &self,
        request: Request,
        cancel: Option<&CancellationToken>,
    ) -> Result<RawResponse> {
        let _gate = match cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => return Err(LinkError::Cancelled),
                guard = self.gate.lock() => guard,
            },
            None => self.gate.lock().await,
        };
        self.ensure_open()?;

        let Request { operation, timeout } = request;
        let timeout = timeout.or(self.default_timeout);
        let name = operation.name();
        let target = operation.target();
        self.logger
            .log_raw_message("TX", name, target, operation.payload());

        let (reply, rx) = Reply::channel();
        self.issue(operation, reply);

        let wait = async {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, rx)
                    .await
                    .map_err(|_| LinkError::Timeout(limit)),
                None => Ok(rx.await),
            }
        };
        let cancelled = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };
        // A reply still pending when the link leaves OPEN will never arrive
        let mut state = self.state.clone();
        let link_lost = async move {
            let left = state.wait_for(|s| *s != LinkState::Open).await.map(|s| *s);
            match left {
                Ok(LinkState::Destroyed) | Err(_) => LinkError::Destroyed,
                Ok(s) => LinkError::transport(format!("link {} before reply", s)),
            }
        };
        let received = tokio::select! {
            received = wait => received,
            err = link_lost => Err(err),
            _ = cancelled => Err(LinkError::Cancelled),
        };

        let completion = match received {
            Ok(Ok(completion)) => completion,
            Ok(Err(_)) => {
                error!("{}: reply channel closed without a completion", name);
                Completion {
                    error: Some(TransportFault::new("reply channel closed")),
                    response: None,
                }
            },
            Err(err) => {
                debug!("{} abandoned: {}", name, err);
                return Err(err);
            },
        };

        match translate(completion) {
            Ok(response) => {
                self.logger
                    .log_raw_message("RX", name, target, &response.values);
                Ok(response)
            },
            Err(err) => {
                debug!("{} failed: {}", name, err);
                Err(err)
            },
        }
    }

    fn issue(&self, operation: Operation, reply: Reply) {
        let master = &self.master;
        match operation {
            Operation::ReadObject { id } => master.read_object(id, reply),
            Operation::WriteObject { id, data } => master.write_object(id, data, reply),
            Operation::ReadHoldingRegisters { address, quantity } => {
                master.read_holding_registers(address, quantity, reply)
            },
            Operation::WriteMultipleRegisters { address, data } => {
                master.write_multiple_registers(address, data, reply)
            },
            Operation::Command { id, data } => master.command(id, data, reply),
            Operation::ReportSlaveId => master.report_slave_id(reply),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ExceptionCode};
    use crate::lifecycle::Connection;
    use crate::sim::{Injection, SimulatedCoordinator};

    async fn open_link(
        sim: &Arc<SimulatedCoordinator>,
        timeout: Option<Duration>,
    ) -> (Connection, Dispatcher) {
        let conn = Connection::new(sim.clone(), sim.clone(), Duration::from_secs(1));
        conn.open().await.unwrap();
        let dispatcher = Dispatcher::new(
            conn.master(),
            conn.state_receiver(),
            timeout,
            LinkLogger::new("test"),
        );
        (conn, dispatcher)
    }

    #[tokio::test]
    async fn test_dispatch_read_object() {
        let sim = SimulatedCoordinator::new("sim0");
        sim.set_object(9, vec![1, 2, 3]);
        let (_conn, dispatcher) = open_link(&sim, None).await;

        let response = dispatcher
            .dispatch(Operation::ReadObject { id: 9 })
            .await
            .unwrap();
        assert_eq!(response.values.as_ref(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_refused_when_not_open() {
        let sim = SimulatedCoordinator::new("sim0");
        let conn = Connection::new(sim.clone(), sim.clone(), Duration::from_secs(1));
        let dispatcher = Dispatcher::new(
            conn.master(),
            conn.state_receiver(),
            None,
            LinkLogger::new("t"),
        );

        let err = dispatcher.dispatch(Operation::ReportSlaveId).await.unwrap_err();
        assert!(matches!(err, LinkError::InvalidState { state: LinkState::Closed, .. }));
        assert!(sim.requests().is_empty());
    }

    #[tokio::test]
    async fn test_in_band_exception_is_device_error() {
        let sim = SimulatedCoordinator::new("sim0");
        let (_conn, dispatcher) = open_link(&sim, None).await;
        sim.inject(Injection::FaultWithException("framing error".into(), 0x04));

        let err = dispatcher.dispatch(Operation::ReportSlaveId).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceException);
        assert_eq!(err.exception_code(), Some(ExceptionCode::ServerDeviceFailure));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_when_master_never_answers() {
        let sim = SimulatedCoordinator::new("sim0");
        let (_conn, dispatcher) = open_link(&sim, Some(Duration::from_millis(500))).await;
        sim.set_silent(true);

        let err = dispatcher.dispatch(Operation::ReportSlaveId).await.unwrap_err();
        assert_eq!(err, LinkError::Timeout(Duration::from_millis(500)));

        // Gate released after the timeout
        sim.set_silent(false);
        assert!(dispatcher.dispatch(Operation::ReportSlaveId).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_timeout_overrides_default() {
        let sim = SimulatedCoordinator::new("sim0");
        let (_conn, dispatcher) = open_link(&sim, Some(Duration::from_secs(30))).await;
        sim.set_silent(true);

        let request = Request::new(Operation::ReportSlaveId)
            .with_timeout(Some(Duration::from_millis(20)));
        let err = dispatcher.dispatch(request).await.unwrap_err();
        assert_eq!(err, LinkError::Timeout(Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn test_cancellation() {
        let sim = SimulatedCoordinator::new("sim0");
        let (_conn, dispatcher) = open_link(&sim, None).await;
        sim.set_silent(true);

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            canceller.cancel();
        });

        let err = dispatcher
            .dispatch_cancellable(Operation::ReportSlaveId, &token)
            .await
            .unwrap_err();
        assert_eq!(err, LinkError::Cancelled);
    }

    #[tokio::test]
    async fn test_dropped_reply_is_transport_error() {
        let sim = SimulatedCoordinator::new("sim0");
        let (_conn, dispatcher) = open_link(&sim, None).await;
        sim.set_silent(true);

        let pending = dispatcher.dispatch(Operation::ReportSlaveId);
        let destroy = async {
            tokio::task::yield_now().await;
            sim.drop_parked();
        };
        let (result, _) = tokio::join!(pending, destroy);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::TransportError);
    }

    #[test]
    fn test_operation_metadata() {
        let op = Operation::WriteMultipleRegisters {
            address: 0x10,
            data: Bytes::from_static(&[0, 1]),
        };
        assert_eq!(op.name(), "write_multiple_registers");
        assert_eq!(op.target(), Some(0x10));
        assert_eq!(op.payload(), &[0, 1]);
        assert_eq!(Operation::ReportSlaveId.target(), None);
    }
}
