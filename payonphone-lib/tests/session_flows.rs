//! End-to-end session flows against the simulated runtime.
//!
//! ```bash
//! cargo test -p payonphone-lib --test session_flows
//! ```

use payonphone_lib::runtime::{SimulatedOperation, SimulatorConfig};
use payonphone_lib::test_utils::{
    connected_session, fixture_reader, simulated_session, EventRecorder,
};
use payonphone_lib::{
    Amount, ConnectionStatus, Currency, DiscoveryOutcome, PaymentIntentStatus, PipelineStage,
    ReaderError, SessionEvent, TerminalError,
};
use std::time::Duration;

// ============================================================================
// Discovery
// ============================================================================

#[tokio::test]
async fn test_discovery_publishes_readers() {
    let (session, _sim) = simulated_session(SimulatorConfig::default());
    let recorder = EventRecorder::attach(&session);

    let scan = session.discover_readers().expect("scan should start");
    assert!(session.snapshot().is_discovering);
    assert!(session.snapshot().discovered_readers.is_empty());

    assert_eq!(scan.wait().await, DiscoveryOutcome::Completed);
    let snapshot = session.snapshot();
    assert!(!snapshot.is_discovering);
    assert_eq!(snapshot.discovered_readers.len(), 2);
    assert_eq!(
        recorder.count(|e| matches!(
            e,
            SessionEvent::DiscoveryFinished(DiscoveryOutcome::Completed)
        )),
        1
    );
}

#[tokio::test]
async fn test_second_discover_is_noop() {
    let (session, sim) = simulated_session(SimulatorConfig::default().hold_open());

    let scan = session.discover_readers().expect("scan should start");
    tokio::time::sleep(Duration::from_millis(80)).await;
    let before = session.snapshot();
    assert_eq!(before.discovered_readers.len(), 1);

    assert!(session.discover_readers().is_none());
    assert_eq!(session.snapshot(), before);

    assert!(scan.cancel());
    assert_eq!(scan.wait().await, DiscoveryOutcome::Canceled);
    assert_eq!(sim.calls(SimulatedOperation::Discover), 1);
}

#[tokio::test]
async fn test_cancel_discovery_clears_flag() {
    let (session, _sim) = simulated_session(SimulatorConfig::default().hold_open());
    let recorder = EventRecorder::attach(&session);

    let scan = session.discover_readers().expect("scan should start");
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(session.cancel_discovery());
    assert!(!session.cancel_discovery());

    assert_eq!(scan.wait().await, DiscoveryOutcome::Canceled);
    let snapshot = session.snapshot();
    assert!(!snapshot.is_discovering);
    assert_eq!(snapshot.discovered_readers.len(), 2);
    assert_eq!(
        recorder.count(|e| matches!(
            e,
            SessionEvent::DiscoveryFinished(DiscoveryOutcome::Canceled)
        )),
        1
    );

    assert!(session.discover_readers().is_some());
}

#[tokio::test]
async fn test_discovery_failure_is_reported() {
    let (session, sim) = simulated_session(SimulatorConfig::default());
    sim.fail(
        SimulatedOperation::Discover,
        ReaderError::Bluetooth("adapter off".into()),
    );

    let outcome = session.discover_readers().unwrap().wait().await;
    match outcome {
        DiscoveryOutcome::Failed(TerminalError::Discovery(reason)) => {
            assert!(reason.contains("adapter off"));
        }
        other => panic!("expected discovery failure, got {:?}", other),
    }
    assert!(!session.snapshot().is_discovering);
}

#[tokio::test]
async fn test_discovery_dedups_by_serial() {
    let first = fixture_reader("R100", "Reader A");
    let duplicate = fixture_reader("R100", "Reader A (again)");
    let second = fixture_reader("R200", "Reader B");
    let (session, _sim) = simulated_session(
        SimulatorConfig::default().with_readers(vec![first, duplicate, second]),
    );

    session.discover_readers().unwrap().wait().await;
    let serials: Vec<String> = session
        .snapshot()
        .discovered_readers
        .into_iter()
        .map(|r| r.serial_number)
        .collect();
    assert_eq!(serials, vec!["R100", "R200"]);
}

// ============================================================================
// Connection lifecycle
// ============================================================================

#[tokio::test]
async fn test_reader_set_iff_connected_across_transitions() {
    let reader_a = fixture_reader("R100", "Reader A");
    let (session, sim) =
        simulated_session(SimulatorConfig::default().with_readers(vec![reader_a.clone()]));
    let rx = session.subscribe();
    let check = |expected: ConnectionStatus| {
        let snapshot = session.snapshot();
        assert!(snapshot.is_consistent(), "inconsistent snapshot: {:?}", snapshot);
        assert_eq!(snapshot.connection_status, expected);
        assert_eq!(*rx.borrow(), snapshot);
    };

    let pending = session.connect_to_reader(reader_a.clone());
    check(ConnectionStatus::Connecting);
    pending.await.unwrap();
    check(ConnectionStatus::Connected);
    assert_eq!(session.snapshot().status_text(), "Connected to Reader A");

    session.disconnect().await.unwrap();
    check(ConnectionStatus::NotConnected);

    session.connect_to_reader(reader_a).await.unwrap();
    check(ConnectionStatus::Connected);

    assert!(sim.trigger_unexpected_disconnect());
    check(ConnectionStatus::NotConnected);

    session
        .connect_to_reader(fixture_reader("R999", "Nowhere"))
        .await
        .unwrap_err();
    check(ConnectionStatus::NotConnected);
}

#[tokio::test]
async fn test_disconnect_success_clears_reader() {
    let (session, _sim) = connected_session(SimulatorConfig::default()).await;
    let recorder = EventRecorder::attach(&session);

    session.disconnect().await.unwrap();
    let snapshot = session.snapshot();
    assert_eq!(snapshot.connection_status, ConnectionStatus::NotConnected);
    assert!(snapshot.connected_reader.is_none());
    assert_eq!(recorder.count(|e| matches!(e, SessionEvent::Disconnected)), 1);
}

#[tokio::test]
async fn test_disconnect_failure_keeps_status() {
    let (session, sim) = connected_session(SimulatorConfig::default()).await;
    let recorder = EventRecorder::attach(&session);
    sim.fail(
        SimulatedOperation::Disconnect,
        ReaderError::Busy("update in progress".into()),
    );

    let err = session.disconnect().await.unwrap_err();
    assert!(matches!(err, TerminalError::Disconnect(_)));
    let snapshot = session.snapshot();
    assert_eq!(snapshot.connection_status, ConnectionStatus::Connected);
    assert!(snapshot.connected_reader.is_some());
    assert_eq!(
        recorder.count(|e| matches!(e, SessionEvent::DisconnectFailed(_))),
        1
    );
}

#[tokio::test]
async fn test_unexpected_disconnect_blocks_payments() {
    let (session, sim) = connected_session(SimulatorConfig::default()).await;
    let recorder = EventRecorder::attach(&session);

    assert!(sim.trigger_unexpected_disconnect());
    assert_eq!(
        session.snapshot().connection_status,
        ConnectionStatus::NotConnected
    );
    assert!(recorder
        .events()
        .iter()
        .any(|e| matches!(e, SessionEvent::UnexpectedDisconnect(r) if r.serial_number == "R100")));

    let err = session
        .process_payment(Amount::from_minor(500).unwrap(), None)
        .await
        .unwrap_err();
    assert_eq!(err, TerminalError::NoReaderConnected);
}

// ============================================================================
// Payments
// ============================================================================

#[tokio::test]
async fn test_successful_charge() {
    let (session, sim) = connected_session(SimulatorConfig::default()).await;
    let recorder = EventRecorder::attach(&session);

    let intent = session
        .process_payment(Amount::from_minor(1599).unwrap(), Some(Currency::usd()))
        .await
        .unwrap();

    assert_eq!(intent.status, PaymentIntentStatus::Succeeded);
    assert_eq!(intent.amount.minor_units(), 1599);
    assert_eq!(intent.display_amount(), "15.99 usd");

    let snapshot = session.snapshot();
    assert_eq!(snapshot.last_payment_intent, Some(intent));
    assert_eq!(snapshot.connection_status, ConnectionStatus::Connected);
    assert!(!snapshot.payment_in_progress);

    let stages: Vec<PipelineStage> = recorder
        .events()
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::PaymentStage(stage) => Some(stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        vec![
            PipelineStage::CreateIntent,
            PipelineStage::CollectPaymentMethod,
            PipelineStage::Capture
        ]
    );
    assert_eq!(sim.calls(SimulatedOperation::Capture), 1);
}

#[tokio::test]
async fn test_charge_without_reader_makes_no_runtime_call() {
    let (session, sim) = simulated_session(SimulatorConfig::default());

    let err = session
        .process_payment(Amount::from_minor(1599).unwrap(), None)
        .await
        .unwrap_err();

    assert_eq!(err, TerminalError::NoReaderConnected);
    assert_eq!(sim.calls(SimulatedOperation::CreateIntent), 0);
    assert!(session.snapshot().last_payment_intent.is_none());
}

#[tokio::test]
async fn test_collection_failure_keeps_previous_intent() {
    let (session, sim) = connected_session(SimulatorConfig::default()).await;
    let first = session
        .process_payment(Amount::from_minor(1000).unwrap(), None)
        .await
        .unwrap();

    sim.fail(SimulatedOperation::Collect, ReaderError::Canceled);
    let err = session
        .process_payment(Amount::from_minor(2500).unwrap(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, TerminalError::MethodCollection { .. }));
    assert_eq!(sim.calls(SimulatedOperation::Capture), 1);
    assert_eq!(session.snapshot().last_payment_intent, Some(first));
}

#[tokio::test]
async fn test_decline_reports_capture_stage() {
    let (session, _sim) = connected_session(SimulatorConfig::default()).await;
    let recorder = EventRecorder::attach(&session);

    let err = session
        .process_payment(Amount::from_minor(4201).unwrap(), None)
        .await
        .unwrap_err();

    assert!(err.is_payment_failure());
    assert!(recorder.events().iter().any(|e| matches!(
        e,
        SessionEvent::PaymentFailed {
            stage: PipelineStage::Capture,
            ..
        }
    )));
    assert!(session.snapshot().last_payment_intent.is_none());
}

#[tokio::test]
async fn test_concurrent_charge_is_refused() {
    let slow = SimulatorConfig::default().with_collect_delay(Duration::from_millis(200));
    let (session, sim) = connected_session(slow).await;

    let first = tokio::spawn({
        let session = session.clone();
        async move {
            session
                .process_payment(Amount::from_minor(1500).unwrap(), None)
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(session.snapshot().payment_in_progress);

    let err = session
        .process_payment(Amount::from_minor(700).unwrap(), None)
        .await
        .unwrap_err();
    assert_eq!(err, TerminalError::PaymentInProgress);

    first.await.unwrap().unwrap();
    assert!(!session.snapshot().payment_in_progress);
    assert_eq!(sim.calls(SimulatedOperation::CreateIntent), 1);
}

#[tokio::test]
async fn test_disconnect_during_collection_fails_the_charge() {
    let slow = SimulatorConfig::default().with_collect_delay(Duration::from_millis(200));
    let (session, sim) = connected_session(slow).await;
    let recorder = EventRecorder::attach(&session);

    let charge = tokio::spawn({
        let session = session.clone();
        async move {
            session
                .process_payment(Amount::from_minor(1500).unwrap(), None)
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    session.disconnect().await.unwrap();

    let err = charge.await.unwrap().unwrap_err();
    assert!(matches!(err, TerminalError::MethodCollection { .. }));
    let collection_failures = recorder.count(|e| {
        matches!(
            e,
            SessionEvent::PaymentFailed {
                stage: PipelineStage::CollectPaymentMethod,
                ..
            }
        )
    });
    assert_eq!(collection_failures, 1);

    let snapshot = session.snapshot();
    assert!(snapshot.is_consistent());
    assert_eq!(snapshot.connection_status, ConnectionStatus::NotConnected);
    assert!(!snapshot.payment_in_progress);
    assert!(snapshot.last_payment_intent.is_none());
    assert_eq!(sim.calls(SimulatedOperation::Capture), 0);
}

#[tokio::test]
async fn test_reader_lost_during_collection_fails_the_charge() {
    let slow = SimulatorConfig::default().with_collect_delay(Duration::from_millis(200));
    let (session, sim) = connected_session(slow).await;
    let recorder = EventRecorder::attach(&session);

    let charge = tokio::spawn({
        let session = session.clone();
        async move {
            session
                .process_payment(Amount::from_minor(1500).unwrap(), None)
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(sim.trigger_unexpected_disconnect());

    let err = charge.await.unwrap().unwrap_err();
    assert!(matches!(err, TerminalError::MethodCollection { .. }));
    let lost = recorder.count(|e| matches!(e, SessionEvent::UnexpectedDisconnect(_)));
    assert_eq!(lost, 1);

    let snapshot = session.snapshot();
    assert!(snapshot.is_consistent());
    assert!(snapshot.connected_reader.is_none());
    assert!(!snapshot.payment_in_progress);
    assert!(snapshot.last_payment_intent.is_none());

    let err = session
        .process_payment(Amount::from_minor(1500).unwrap(), None)
        .await
        .unwrap_err();
    assert_eq!(err, TerminalError::NoReaderConnected);
}
