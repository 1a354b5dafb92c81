//! Collaborator interfaces
//!
//! The byte-level [`Transport`] and the request/response [`Master`] are supplied
//! by the embedding application. The adapter only needs the primitives below.
//!
//! Master primitives are callback shaped: every call receives a [`Reply`] that
//! the master resolves when the device answers or the transport fails. A
//! `Reply` is consumed by resolving it, so a request resolves at most once.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{broadcast, oneshot};

use crate::error::TransportFault;

/// Notifications emitted by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Closed,
    /// Physical link dropped without a close request
    Disconnected { reason: String },
}

/// Byte-level connection to the coordinator
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the physical connection
    async fn open(&self) -> std::result::Result<(), TransportFault>;

    /// Close the physical connection
    async fn close(&self) -> std::result::Result<(), TransportFault>;

    /// Fresh event subscription.
    ///
    /// Some transports drop their listeners while disconnecting, so callers
    /// re-subscribe after every disconnect instead of holding one receiver forever.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;

    /// Port or endpoint name, for logs
    fn name(&self) -> &str;
}

/// Raw device response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    /// Status code reported by the device
    pub status: u8,
    /// Response payload
    pub values: Bytes,
    /// In-band exception, if the device rejected the request
    pub exception_code: Option<u8>,
}

impl RawResponse {
    pub fn new(status: u8, values: impl Into<Bytes>) -> Self {
        Self {
            status,
            values: values.into(),
            exception_code: None,
        }
    }

    pub fn with_values(values: impl Into<Bytes>) -> Self {
        Self::new(0, values)
    }

    pub fn exception(code: u8) -> Self {
        Self {
            exception_code: Some(code),
            ..Self::default()
        }
    }
}

/// The `(error, response)` pair a master reports for one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub error: Option<TransportFault>,
    pub response: Option<RawResponse>,
}

/// Single-use completion handle for one master call
#[derive(Debug)]
pub struct Reply {
    tx: Option<oneshot::Sender<Completion>>,
}

impl Reply {
    /// Create a reply handle and the receiver the dispatcher waits on
    pub fn channel() -> (Self, oneshot::Receiver<Completion>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Resolve with the raw `(error, response)` pair
    pub fn resolve(mut self, error: Option<TransportFault>, response: Option<RawResponse>) {
        if let Some(tx) = self.tx.take() {
            // Receiver gone means the request already timed out or was cancelled
            let _ = tx.send(Completion { error, response });
        }
    }

    pub fn complete(self, response: RawResponse) {
        self.resolve(None, Some(response));
    }

    pub fn fail(self, fault: TransportFault) {
        self.resolve(Some(fault), None);
    }
}

impl Drop for Reply {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Completion {
                error: Some(TransportFault::new("request dropped")),
                response: None,
            });
        }
    }
}

/// Request/response protocol layer over the transport
pub trait Master: Send + Sync {
    fn read_object(&self, id: u8, reply: Reply);

    fn write_object(&self, id: u8, data: Bytes, reply: Reply);

    fn read_holding_registers(&self, address: u16, quantity: u16, reply: Reply);

    fn write_multiple_registers(&self, address: u16, data: Bytes, reply: Reply);

    fn command(&self, id: u8, data: Bytes, reply: Reply);

    fn report_slave_id(&self, reply: Reply);

    /// Re-register internal wiring to the transport after a disconnect
    fn rewire(&self);

    /// Release the transport; further calls fail
    fn destroy(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reply_resolves_once() {
        let (reply, rx) = Reply::channel();
        reply.complete(RawResponse::with_values(vec![1, 2, 3]));

        let completion = rx.await.unwrap();
        assert!(completion.error.is_none());
        assert_eq!(completion.response.unwrap().values.as_ref(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_dropped_reply_reports_fault() {
        let (reply, rx) = Reply::channel();
        drop(reply);

        let completion = rx.await.unwrap();
        assert_eq!(completion.error, Some(TransportFault::new("request dropped")));
        assert!(completion.response.is_none());
    }

    #[tokio::test]
    async fn test_resolve_after_receiver_dropped_is_silent() {
        let (reply, rx) = Reply::channel();
        drop(rx);
        reply.fail(TransportFault::new("late"));
    }
}
