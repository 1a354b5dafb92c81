//! Connection lifecycle
//!
//! Keeps the logical link to the coordinator alive across physical drops:
//!
//! ```text
//! Closed -> Opening -> Open -> Disconnected -> Opening (retry) -> Open ...
//!                                  any state -> Destroyed
//! ```
//!
//! The first `open()` never retries. Once an open link drops unexpectedly the
//! supervisor re-subscribes to transport events, rewires the master and then
//! retries `Transport::open` on a fixed interval until one attempt succeeds.
//! Failed attempts are logged and published as events, never returned.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{LinkError, Result};
use crate::logger::LinkLogger;
use crate::master::{Master, Transport, TransportEvent};

const EVENT_CAPACITY: usize = 64;

/// Lifecycle state of the logical link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Closed,
    Opening,
    Open,
    Disconnected,
    Destroyed,
}

impl LinkState {
    pub fn is_open(&self) -> bool {
        matches!(self, LinkState::Open)
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkState::Closed => write!(f, "CLOSED"),
            LinkState::Opening => write!(f, "OPENING"),
            LinkState::Open => write!(f, "OPEN"),
            LinkState::Disconnected => write!(f, "DISCONNECTED"),
            LinkState::Destroyed => write!(f, "DESTROYED"),
        }
    }
}

/// Lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum LinkEvent {
    Connected,
    Disconnected { reason: String },
    ReconnectAttempt { attempt: u64 },
    ReconnectFailed { attempt: u64, reason: String },
    Closed,
    Destroyed,
}

/// Reconnection statistics
#[derive(Debug, Default, Clone)]
pub struct ReconnectStats {
    /// Total reconnection attempts
    pub total_attempts: u64,
    /// Successful reconnection count
    pub successful_reconnects: u64,
    /// Failed reconnection count
    pub failed_reconnects: u64,
    /// Last time the link became open
    pub last_connected: Option<Instant>,
}

struct Shared {
    transport: Arc<dyn Transport>,
    master: Arc<dyn Master>,
    state: watch::Sender<LinkState>,
    events: broadcast::Sender<LinkEvent>,
    stats: Mutex<ReconnectStats>,
    /// Current supervisor session; cancelled under this lock so a stopped
    /// supervisor can never publish another transition.
    session: Mutex<Option<CancellationToken>>,
    interval: Duration,
    logger: LinkLogger,
}

impl Shared {
    fn set_state(&self, new_state: LinkState, reason: &str) {
        let old_state = self.state.send_replace(new_state);
        if old_state != new_state {
            self.logger.log_status(old_state, new_state, reason);
        }
    }

    fn emit(&self, event: LinkEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Transition on behalf of a supervisor; ignored once its session ended
    fn supervised(
        &self,
        cancel: &CancellationToken,
        state: LinkState,
        reason: &str,
        event: Option<LinkEvent>,
    ) -> bool {
        let _session = self.session.lock();
        if cancel.is_cancelled() {
            return false;
        }
        self.set_state(state, reason);
        if let Some(event) = event {
            self.emit(event);
        }
        true
    }

    /// Stop a reconnect loop that sits between attempts; false once an
    /// attempt is under way
    fn take_over_from_retry(&self) -> bool {
        let mut session = self.session.lock();
        if *self.state.borrow() != LinkState::Disconnected {
            return false;
        }
        if let Some(token) = session.take() {
            token.cancel();
        }
        true
    }

    fn end_session(&self) {
        if let Some(token) = self.session.lock().take() {
            token.cancel();
        }
    }
}

/// Owner of the transport and master for one coordinator
pub struct Connection {
    shared: Arc<Shared>,
    /// Serializes open/close/destroy
    op_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("transport", &self.shared.transport.name())
            .field("state", &self.state())
            .field("interval", &self.shared.interval)
            .finish()
    }
}

impl Connection {
    pub fn new(
        transport: Arc<dyn Transport>,
        master: Arc<dyn Master>,
        reconnect_interval: Duration,
    ) -> Self {
        let (state, _) = watch::channel(LinkState::Closed);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let logger = LinkLogger::new(transport.name());

        Self {
            shared: Arc::new(Shared {
                transport,
                master,
                state,
                events,
                stats: Mutex::new(ReconnectStats::default()),
                session: Mutex::new(None),
                interval: reconnect_interval,
                logger,
            }),
            op_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Transport name
    pub fn name(&self) -> &str {
        self.shared.transport.name()
    }

    pub fn state(&self) -> LinkState {
        *self.shared.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// Watch handle on the lifecycle state
    pub fn state_receiver(&self) -> watch::Receiver<LinkState> {
        self.shared.state.subscribe()
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.shared.events.subscribe()
    }

    pub fn stats(&self) -> ReconnectStats {
        self.shared.stats.lock().clone()
    }

    pub fn master(&self) -> Arc<dyn Master> {
        Arc::clone(&self.shared.master)
    }

    pub fn reconnect_interval(&self) -> Duration {
        self.shared.interval
    }

    /// Wait until the link reaches `state`
    pub async fn wait_for_state(&self, state: LinkState) -> Result<()> {
        let mut rx = self.state_receiver();
        rx.wait_for(|current| *current == state)
            .await
            .map(|_| ())
            .map_err(|_| LinkError::Destroyed)
    }

    /// Open the transport. Failure leaves the link `Closed`; no retry.
    ///
    /// Allowed from `Closed`, and from `Disconnected` while the reconnect loop
    /// waits between attempts: the loop is stopped and this call opens the
    /// transport itself. Refused while any open attempt is in flight.
    pub async fn open(&self) -> Result<()> {
        let _op = self.op_lock.lock().await;

        match self.state() {
            LinkState::Closed => {},
            LinkState::Disconnected if self.shared.take_over_from_retry() => {
                debug!("open: reconnect loop stopped for explicit open");
            },
            LinkState::Destroyed => return Err(LinkError::Destroyed),
            state => {
                return Err(LinkError::InvalidState {
                    operation: "open",
                    state,
                })
            },
        }

        let shared = &self.shared;
        // Subscribe first so a drop right after opening is not missed
        let events = shared.transport.subscribe();
        shared.set_state(LinkState::Opening, "open requested");
        shared
            .logger
            .log_connect(shared.transport.name(), "opening transport");

        match shared.transport.open().await {
            Ok(()) => {
                let token = CancellationToken::new();
                {
                    let mut session = shared.session.lock();
                    *session = Some(token.clone());
                    shared.set_state(LinkState::Open, "transport opened");
                    shared.stats.lock().last_connected = Some(Instant::now());
                    shared.emit(LinkEvent::Connected);
                }
                tokio::spawn(supervise(Arc::clone(shared), events, token));
                Ok(())
            },
            Err(fault) => {
                shared.set_state(LinkState::Closed, &format!("open failed: {fault}"));
                Err(LinkError::Transport(fault))
            },
        }
    }

    /// Close on request. Stops any reconnect loop; does not trigger one.
    pub async fn close(&self) -> Result<()> {
        let _op = self.op_lock.lock().await;

        match self.state() {
            LinkState::Destroyed => return Err(LinkError::Destroyed),
            LinkState::Closed => return Ok(()),
            _ => {},
        }

        self.shared.end_session();
        let result = self.shared.transport.close().await;
        self.shared.set_state(LinkState::Closed, "close requested");
        self.shared.emit(LinkEvent::Closed);
        result.map_err(LinkError::Transport)
    }

    /// Tear down master and transport. Safe to call more than once.
    pub async fn destroy(&self) -> Result<()> {
        let _op = self.op_lock.lock().await;

        if self.state() == LinkState::Destroyed {
            debug!("destroy: already destroyed");
            return Ok(());
        }

        self.shared.end_session();
        self.shared.master.destroy();
        if let Err(fault) = self.shared.transport.close().await {
            debug!("destroy: transport close failed: {}", fault);
        }
        self.shared.set_state(LinkState::Destroyed, "destroy requested");
        self.shared.emit(LinkEvent::Destroyed);
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.end_session();
    }
}

/// Watch transport events while open; drive reconnect after a drop
async fn supervise(
    shared: Arc<Shared>,
    mut events: broadcast::Receiver<TransportEvent>,
    cancel: CancellationToken,
) {
    loop {
        let reason = tokio::select! {
            _ = cancel.cancelled() => return,
            event = events.recv() => match event {
                Ok(TransportEvent::Disconnected { reason }) => reason,
                Ok(other) => {
                    debug!("transport event: {:?}", other);
                    continue;
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("transport events lagged, {} skipped", skipped);
                    continue;
                },
                Err(RecvError::Closed) => "transport dropped event subscription".to_string(),
            },
        };

        let event = LinkEvent::Disconnected {
            reason: reason.clone(),
        };
        if !shared.supervised(&cancel, LinkState::Disconnected, &reason, Some(event)) {
            return;
        }

        // Hooks may have been dropped by the disconnect; attach again before reopening
        events = shared.transport.subscribe();
        shared.master.rewire();

        if !reconnect(&shared, &cancel).await {
            return;
        }
    }
}

/// Retry `open` every interval until it succeeds; false if cancelled
async fn reconnect(shared: &Shared, cancel: &CancellationToken) -> bool {
    let period = shared.interval;
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut attempt = 0u64;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = ticker.tick() => {},
        }

        attempt += 1;
        shared.stats.lock().total_attempts += 1;
        if !shared.supervised(
            cancel,
            LinkState::Opening,
            "reconnect attempt",
            Some(LinkEvent::ReconnectAttempt { attempt }),
        ) {
            return false;
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => return false,
            result = shared.transport.open() => result,
        };

        match result {
            Ok(()) => {
                {
                    let mut stats = shared.stats.lock();
                    stats.successful_reconnects += 1;
                    stats.last_connected = Some(Instant::now());
                }
                return shared.supervised(
                    cancel,
                    LinkState::Open,
                    &format!("reconnected after {attempt} attempt(s)"),
                    Some(LinkEvent::Connected),
                );
            },
            Err(fault) => {
                shared.stats.lock().failed_reconnects += 1;
                let reason = fault.to_string();
                shared
                    .logger
                    .log_retry(attempt, period.as_millis() as u64, &reason);
                if !shared.supervised(
                    cancel,
                    LinkState::Disconnected,
                    "reconnect attempt failed",
                    Some(LinkEvent::ReconnectFailed { attempt, reason }),
                ) {
                    return false;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedCoordinator;

    fn connection(sim: &Arc<SimulatedCoordinator>) -> Connection {
        Connection::new(sim.clone(), sim.clone(), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_initial_state_closed() {
        let sim = SimulatedCoordinator::new("sim0");
        let conn = connection(&sim);
        assert_eq!(conn.state(), LinkState::Closed);
        assert!(!conn.is_open());
    }

    #[tokio::test]
    async fn test_open_success_emits_connected() {
        let sim = SimulatedCoordinator::new("sim0");
        let conn = connection(&sim);
        let mut events = conn.subscribe();

        conn.open().await.unwrap();
        assert_eq!(conn.state(), LinkState::Open);
        assert_eq!(events.recv().await.unwrap(), LinkEvent::Connected);
        assert!(conn.stats().last_connected.is_some());
    }

    #[tokio::test]
    async fn test_first_open_failure_does_not_retry() {
        let sim = SimulatedCoordinator::new("sim0");
        sim.fail_next_opens(1);
        let conn = connection(&sim);

        let err = conn.open().await.unwrap_err();
        assert!(matches!(err, LinkError::Transport(_)));
        assert_eq!(conn.state(), LinkState::Closed);
        assert_eq!(sim.open_calls(), 1);

        // Explicit retry is allowed from Closed
        conn.open().await.unwrap();
        assert_eq!(sim.open_calls(), 2);
    }

    #[tokio::test]
    async fn test_open_twice_is_invalid() {
        let sim = SimulatedCoordinator::new("sim0");
        let conn = connection(&sim);
        conn.open().await.unwrap();

        let err = conn.open().await.unwrap_err();
        assert!(matches!(
            err,
            LinkError::InvalidState {
                operation: "open",
                state: LinkState::Open
            }
        ));
        assert_eq!(sim.open_calls(), 1);
    }

    #[tokio::test]
    async fn test_close_then_reopen() {
        let sim = SimulatedCoordinator::new("sim0");
        let conn = connection(&sim);
        conn.open().await.unwrap();
        conn.close().await.unwrap();
        assert_eq!(conn.state(), LinkState::Closed);
        assert!(!sim.is_open());

        conn.open().await.unwrap();
        assert_eq!(conn.state(), LinkState::Open);
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let sim = SimulatedCoordinator::new("sim0");
        let conn = connection(&sim);
        conn.open().await.unwrap();

        conn.destroy().await.unwrap();
        conn.destroy().await.unwrap();
        assert_eq!(conn.state(), LinkState::Destroyed);
        assert!(sim.is_destroyed());
        assert!(matches!(conn.open().await, Err(LinkError::Destroyed)));
    }

    #[tokio::test]
    async fn test_destroy_before_open() {
        let sim = SimulatedCoordinator::new("sim0");
        let conn = connection(&sim);
        conn.destroy().await.unwrap();
        assert_eq!(conn.state(), LinkState::Destroyed);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_transitions_are_logged() {
        let sim = SimulatedCoordinator::new("sim0");
        let conn = connection(&sim);
        conn.open().await.unwrap();
        conn.close().await.unwrap();

        assert!(logs_contain("[CONNECT] sim0"));
        assert!(logs_contain("[STATUS] CLOSED -> OPENING"));
        assert!(logs_contain("[STATUS] OPENING -> OPEN"));
        assert!(logs_contain("[STATUS] OPEN -> CLOSED - close requested"));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(LinkState::Disconnected.to_string(), "DISCONNECTED");
        assert_eq!(LinkState::Open.to_string(), "OPEN");
    }
}
