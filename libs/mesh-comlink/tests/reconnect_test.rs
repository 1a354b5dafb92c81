//! Lifecycle integration tests: drop detection, re-subscription and the fixed
//! interval reconnect loop, driven with paused tokio time.

use std::sync::Arc;
use std::time::Duration;

use mesh_comlink::sim::SimulatedCoordinator;
use mesh_comlink::{Connection, Coordinator, ErrorKind, LinkConfig, LinkError, LinkEvent, LinkState};
use tokio::sync::broadcast;
use tokio::time::Instant;

const INTERVAL: Duration = Duration::from_secs(1);

async fn open_connection() -> (
    Arc<SimulatedCoordinator>,
    Connection,
    broadcast::Receiver<LinkEvent>,
) {
    let sim = SimulatedCoordinator::new("sim0");
    let conn = Connection::new(sim.clone(), sim.clone(), INTERVAL);
    let mut events = conn.subscribe();
    conn.open().await.unwrap();
    assert_eq!(events.recv().await.unwrap(), LinkEvent::Connected);
    (sim, conn, events)
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_until_open_succeeds() {
    let (sim, conn, mut events) = open_connection().await;

    sim.fail_next_opens(2);
    let dropped_at = Instant::now();
    sim.disconnect("cable pulled");

    assert_eq!(
        events.recv().await.unwrap(),
        LinkEvent::Disconnected {
            reason: "cable pulled".into()
        }
    );

    for attempt in 1..=2 {
        assert_eq!(
            events.recv().await.unwrap(),
            LinkEvent::ReconnectAttempt { attempt }
        );
        match events.recv().await.unwrap() {
            LinkEvent::ReconnectFailed { attempt: failed, .. } => assert_eq!(failed, attempt),
            other => panic!("unexpected event {other:?}"),
        }
    }

    assert_eq!(
        events.recv().await.unwrap(),
        LinkEvent::ReconnectAttempt { attempt: 3 }
    );
    assert_eq!(events.recv().await.unwrap(), LinkEvent::Connected);
    assert!(dropped_at.elapsed() >= INTERVAL * 3);
    assert_eq!(conn.state(), LinkState::Open);

    // 1 initial open + 3 reconnect attempts, one rewire for the one drop
    assert_eq!(sim.open_calls(), 4);
    assert_eq!(sim.rewire_calls(), 1);

    let stats = conn.stats();
    assert_eq!(stats.total_attempts, 3);
    assert_eq!(stats.successful_reconnects, 1);
    assert_eq!(stats.failed_reconnects, 2);

    // The loop stopped: no further attempts and exactly one Connected
    tokio::time::sleep(INTERVAL * 10).await;
    assert_eq!(sim.open_calls(), 4);
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_first_attempt_waits_one_interval() {
    let (sim, _conn, mut events) = open_connection().await;

    let dropped_at = Instant::now();
    sim.disconnect("reset");
    let _ = events.recv().await.unwrap();

    assert_eq!(
        events.recv().await.unwrap(),
        LinkEvent::ReconnectAttempt { attempt: 1 }
    );
    assert!(dropped_at.elapsed() >= INTERVAL);
    assert_eq!(events.recv().await.unwrap(), LinkEvent::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_second_drop_detected_after_resubscribe() {
    let (sim, conn, mut events) = open_connection().await;

    for round in 1..=2 {
        sim.disconnect("brownout");
        assert!(matches!(
            events.recv().await.unwrap(),
            LinkEvent::Disconnected { .. }
        ));
        assert_eq!(
            events.recv().await.unwrap(),
            LinkEvent::ReconnectAttempt { attempt: 1 }
        );
        assert_eq!(events.recv().await.unwrap(), LinkEvent::Connected);
        assert_eq!(sim.rewire_calls(), round);
    }
    assert!(conn.is_open());
}

#[tokio::test(start_paused = true)]
async fn test_close_stops_reconnect_loop() {
    let (sim, conn, mut events) = open_connection().await;

    sim.fail_next_opens(usize::MAX);
    sim.disconnect("unplugged");
    let _ = events.recv().await.unwrap();
    let _ = events.recv().await.unwrap(); // attempt 1
    let _ = events.recv().await.unwrap(); // failed 1

    conn.close().await.unwrap();
    assert_eq!(conn.state(), LinkState::Closed);
    let calls = sim.open_calls();

    tokio::time::sleep(INTERVAL * 10).await;
    assert_eq!(sim.open_calls(), calls);
    assert_eq!(conn.state(), LinkState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_destroy_during_reconnect() {
    let (sim, conn, mut events) = open_connection().await;

    sim.fail_next_opens(usize::MAX);
    sim.disconnect("unplugged");
    let _ = events.recv().await.unwrap();
    conn.wait_for_state(LinkState::Disconnected).await.unwrap();

    conn.destroy().await.unwrap();
    conn.destroy().await.unwrap();
    let calls = sim.open_calls();

    tokio::time::sleep(INTERVAL * 5).await;
    assert_eq!(sim.open_calls(), calls);
    assert_eq!(conn.state(), LinkState::Destroyed);
    assert!(sim.is_destroyed());
}

#[tokio::test(start_paused = true)]
async fn test_explicit_open_after_failed_retry() {
    let (sim, conn, mut events) = open_connection().await;

    sim.fail_next_opens(1);
    sim.disconnect("unplugged");
    let _ = events.recv().await.unwrap();
    assert_eq!(
        events.recv().await.unwrap(),
        LinkEvent::ReconnectAttempt { attempt: 1 }
    );
    assert!(matches!(
        events.recv().await.unwrap(),
        LinkEvent::ReconnectFailed { attempt: 1, .. }
    ));
    assert_eq!(conn.state(), LinkState::Disconnected);

    conn.open().await.unwrap();
    assert_eq!(conn.state(), LinkState::Open);
    assert_eq!(events.recv().await.unwrap(), LinkEvent::Connected);

    // The retry loop handed over: no further attempts
    tokio::time::sleep(INTERVAL * 5).await;
    assert_eq!(sim.open_calls(), 3);
    assert_eq!(conn.stats().total_attempts, 1);
    assert!(events.try_recv().is_err());

    // A second drop is still supervised
    sim.disconnect("brownout");
    assert!(matches!(
        events.recv().await.unwrap(),
        LinkEvent::Disconnected { .. }
    ));
    conn.wait_for_state(LinkState::Open).await.unwrap();
}

async fn open_coordinator() -> (Arc<SimulatedCoordinator>, Arc<Coordinator>) {
    let sim = SimulatedCoordinator::new("sim0");
    let coordinator = Coordinator::new(sim.clone(), sim.clone(), &LinkConfig::default());
    coordinator.open().await.unwrap();
    (sim, Arc::new(coordinator))
}

async fn wait_for_requests(sim: &SimulatedCoordinator, count: usize) {
    while sim.requests().len() < count {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_pending_request_fails_when_link_drops() {
    let (sim, coordinator) = open_coordinator().await;
    sim.set_silent(true);

    let pending = tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        async move { coordinator.get_slave_id().await }
    });
    wait_for_requests(&sim, 1).await;

    sim.disconnect("cable pulled");
    let err = pending.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportError);

    // The request gate was released: the link serves requests again after reconnect
    coordinator
        .connection()
        .wait_for_state(LinkState::Open)
        .await
        .unwrap();
    sim.set_silent(false);
    let slave_id = coordinator.get_slave_id().await.unwrap();
    assert_eq!(slave_id.serial, "0000012345");
    assert_eq!(sim.requests().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_pending_request_released_by_destroy() {
    let (sim, coordinator) = open_coordinator().await;
    sim.set_silent(true);

    let pending = tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        async move { coordinator.get_slave_id().await }
    });
    wait_for_requests(&sim, 1).await;

    coordinator.destroy().await.unwrap();
    assert!(pending.await.unwrap().is_err());
    assert_eq!(
        coordinator.get_slave_id().await.unwrap_err(),
        LinkError::Destroyed
    );
}
