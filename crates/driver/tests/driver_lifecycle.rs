//! End-to-end driver tests against the scripted mock transport

use common::TransportError;
use common::test_utils::MockTransport;
use driver::{
    DongleDriver, DriverError, DriverEvent, DriverState, DriverTuning, EventKind, FailureReason,
};
use protocol::{
    CommandId, ConnectionConfig, DecodeOutcome, Message, MessageHeader, MessageType, PhoneType,
    TouchAction, file_address,
};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

fn test_tuning() -> DriverTuning {
    DriverTuning {
        heartbeat_interval: Duration::from_millis(20),
        failure_threshold: 3,
        read_timeout: Duration::from_millis(5),
        resync_budget: 64,
        wifi_connect_delay: Duration::ZERO,
    }
}

fn started_driver(transport: Arc<MockTransport>) -> DongleDriver {
    let mut driver = DongleDriver::with_tuning(test_tuning());
    driver.initialize(transport).unwrap();
    driver.start(&ConnectionConfig::default()).unwrap();
    driver
}

/// Decode one frame per recorded write call
fn decode_writes(transport: &MockTransport) -> Vec<Message> {
    transport
        .writes()
        .iter()
        .map(|frame| match protocol::decode(frame).unwrap() {
            DecodeOutcome::Message { message, consumed } => {
                assert_eq!(consumed, frame.len());
                message
            }
            other => panic!("write was not one whole frame: {other:?}"),
        })
        .collect()
}

/// Build one dongle-to-host frame by hand; these message types have no
/// outbound encoding
fn inbound_frame(message_type: MessageType, payload: &[u8]) -> Vec<u8> {
    let mut frame = MessageHeader::to_bytes(message_type as u32, payload.len() as u32).to_vec();
    frame.extend_from_slice(payload);
    frame
}

fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

fn collect_messages(driver: &DongleDriver) -> Arc<Mutex<Vec<Message>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    driver.events().subscribe(EventKind::Message, move |event| {
        if let DriverEvent::Message(message) = event {
            sink.lock().unwrap().push((**message).clone());
        }
    });
    seen
}

fn collect_failures(driver: &DongleDriver) -> Arc<Mutex<Vec<FailureReason>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    driver.events().subscribe(EventKind::Failure, move |event| {
        if let DriverEvent::Failure(reason) = event {
            sink.lock().unwrap().push(*reason);
        }
    });
    seen
}

#[test]
fn test_initialize_only_from_idle() {
    let mut driver = DongleDriver::with_tuning(test_tuning());
    assert_eq!(driver.state(), DriverState::Idle);
    driver.initialize(Arc::new(MockTransport::new())).unwrap();
    assert_eq!(driver.state(), DriverState::Initialized);

    let err = driver
        .initialize(Arc::new(MockTransport::new()))
        .unwrap_err();
    assert!(matches!(
        err,
        DriverError::InvalidStateTransition {
            operation: "initialize",
            state: DriverState::Initialized,
        }
    ));
}

#[test]
fn test_operations_guarded_by_state() {
    let mut driver = DongleDriver::with_tuning(test_tuning());
    assert!(matches!(
        driver.start(&ConnectionConfig::default()).unwrap_err(),
        DriverError::NotInitialized
    ));
    assert!(matches!(
        driver.send(&Message::Heartbeat).unwrap_err(),
        DriverError::NotStreaming
    ));
    assert!(matches!(
        driver.stop().unwrap_err(),
        DriverError::InvalidStateTransition {
            operation: "stop",
            state: DriverState::Idle,
        }
    ));

    // send is still refused once initialized but not started
    driver.initialize(Arc::new(MockTransport::new())).unwrap();
    assert!(matches!(
        driver.send(&Message::Heartbeat).unwrap_err(),
        DriverError::NotStreaming
    ));
    // stop before start is a no-op
    driver.stop().unwrap();
    assert_eq!(driver.state(), DriverState::Initialized);
}

#[test]
fn test_handshake_sequence() {
    let transport = Arc::new(MockTransport::new());
    let config = ConnectionConfig::default();
    let mut driver = DongleDriver::with_tuning(test_tuning());
    driver.initialize(transport.clone()).unwrap();
    driver.start(&config).unwrap();
    driver.stop().unwrap();

    let written = decode_writes(&transport);
    let expected = [
        Message::file_u32(config.dpi, file_address::DPI),
        Message::open(&config),
        Message::file_bool(false, file_address::NIGHT_MODE),
        Message::file_u32(0, file_address::HAND_DRIVE_MODE),
        Message::file_bool(true, file_address::CHARGE_MODE),
        Message::box_name(&config.box_name),
        Message::box_settings(&config, None),
        Message::Command(CommandId::WifiEnable),
        Message::Command(CommandId::Wifi5g),
        Message::Command(CommandId::Mic),
        Message::Command(CommandId::AudioTransferOff),
        Message::Command(CommandId::WifiConnect),
    ];
    // the handshake completes before any worker thread can write
    assert_eq!(&written[..expected.len()], &expected);
}

#[test]
fn test_handshake_includes_android_work_mode_when_set() {
    let transport = Arc::new(MockTransport::new());
    let config = ConnectionConfig {
        android_work_mode: Some(true),
        ..ConnectionConfig::default()
    };
    let mut driver = DongleDriver::with_tuning(test_tuning());
    driver.initialize(transport.clone()).unwrap();
    driver.start(&config).unwrap();
    driver.stop().unwrap();

    let written = decode_writes(&transport);
    let work_mode = Message::file_bool(true, file_address::ANDROID_WORK_MODE);
    let position = written.iter().position(|m| *m == work_mode).unwrap();
    assert_eq!(written[position + 1], Message::Command(CommandId::WifiConnect));
}

#[test]
fn test_sends_preserve_order() {
    let transport = Arc::new(MockTransport::new());
    let mut driver = started_driver(transport.clone());

    let touches = [
        Message::Touch {
            action: TouchAction::Down,
            x: 0.1,
            y: 0.1,
        },
        Message::Touch {
            action: TouchAction::Move,
            x: 0.5,
            y: 0.5,
        },
        Message::Touch {
            action: TouchAction::Up,
            x: 0.5,
            y: 0.5,
        },
    ];
    for touch in &touches {
        driver.send(touch).unwrap();
    }
    driver.stop().unwrap();

    let sent: Vec<Message> = decode_writes(&transport)
        .into_iter()
        .filter(|m| matches!(m, Message::Touch { .. }))
        .collect();
    assert_eq!(sent, touches);
}

#[test]
fn test_inbound_messages_delivered_in_wire_order() {
    let transport = Arc::new(MockTransport::new());
    transport.push_inbound(MessageType::Phase as u32, &1u32.to_le_bytes());
    let mut plugged = Vec::new();
    plugged.extend_from_slice(&(PhoneType::CarPlay as u32).to_le_bytes());
    plugged.extend_from_slice(&1u32.to_le_bytes());
    transport.push_inbound(MessageType::Plugged as u32, &plugged);
    transport.push_inbound(MessageType::SoftwareVersion as u32, b"2023.10.20");

    let mut driver = DongleDriver::with_tuning(test_tuning());
    let seen = collect_messages(&driver);
    driver.initialize(transport).unwrap();
    driver.start(&ConnectionConfig::default()).unwrap();

    assert!(wait_until(Duration::from_secs(1), || {
        seen.lock().unwrap().len() == 3
    }));
    driver.stop().unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            Message::Phase(1),
            Message::Plugged {
                phone_type: PhoneType::CarPlay,
                wifi: Some(1),
            },
            Message::SoftwareVersion("2023.10.20".to_string()),
        ]
    );
}

#[test]
fn test_chunked_and_coalesced_reads_reassemble() {
    let transport = Arc::new(MockTransport::new());
    let first = inbound_frame(MessageType::Phase, &3u32.to_le_bytes());
    let second = inbound_frame(MessageType::Unplugged, &[]);
    // frame one arrives split mid-header, frame two glued to its tail
    let stream: Vec<u8> = [first.clone(), second.clone()].concat();
    transport.push_bytes(stream[..7].to_vec());
    transport.push_bytes(stream[7..first.len() + 3].to_vec());
    transport.push_bytes(stream[first.len() + 3..].to_vec());

    let mut driver = DongleDriver::with_tuning(test_tuning());
    let seen = collect_messages(&driver);
    driver.initialize(transport).unwrap();
    driver.start(&ConnectionConfig::default()).unwrap();

    assert!(wait_until(Duration::from_secs(1), || {
        seen.lock().unwrap().len() == 2
    }));
    driver.stop().unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        vec![Message::Phase(3), Message::Unplugged]
    );
}

#[test]
fn test_stop_then_restart_without_reinitialize() {
    let transport = Arc::new(MockTransport::new());
    let mut driver = started_driver(transport);
    assert_eq!(driver.state(), DriverState::Streaming);

    driver.stop().unwrap();
    assert_eq!(driver.state(), DriverState::Initialized);

    driver.start(&ConnectionConfig::default()).unwrap();
    assert_eq!(driver.state(), DriverState::Streaming);
    driver.stop().unwrap();
}

#[test]
fn test_heartbeats_flow_while_streaming() {
    let transport = Arc::new(MockTransport::new());
    let mut driver = started_driver(transport.clone());

    assert!(wait_until(Duration::from_secs(1), || {
        decode_writes(&transport)
            .iter()
            .filter(|m| **m == Message::Heartbeat)
            .count()
            >= 2
    }));
    driver.stop().unwrap();
}

#[test]
fn test_transport_error_streak_publishes_failure_once() {
    let transport = Arc::new(MockTransport::new());
    for _ in 0..6 {
        transport.push_error(TransportError::Io("bus glitch".to_string()));
    }

    let mut driver = DongleDriver::with_tuning(test_tuning());
    let failures = collect_failures(&driver);
    driver.initialize(transport).unwrap();
    driver.start(&ConnectionConfig::default()).unwrap();

    assert!(wait_until(Duration::from_secs(1), || {
        driver.state() == DriverState::Failed
    }));
    // settle long enough for any duplicate publication to land
    thread::sleep(Duration::from_millis(50));

    let failures = failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        failures[0],
        FailureReason::TransportErrors { consecutive } if consecutive >= 3
    ));
}

#[test]
fn test_error_streak_resets_on_success() {
    let transport = Arc::new(MockTransport::new());
    transport.push_error(TransportError::Io("glitch".to_string()));
    transport.push_error(TransportError::Io("glitch".to_string()));
    transport.push_inbound(MessageType::Phase as u32, &2u32.to_le_bytes());
    transport.push_error(TransportError::Io("glitch".to_string()));
    transport.push_error(TransportError::Io("glitch".to_string()));

    let mut driver = DongleDriver::with_tuning(test_tuning());
    let seen = collect_messages(&driver);
    let failures = collect_failures(&driver);
    driver.initialize(transport).unwrap();
    driver.start(&ConnectionConfig::default()).unwrap();

    assert!(wait_until(Duration::from_secs(1), || {
        !seen.lock().unwrap().is_empty()
    }));
    thread::sleep(Duration::from_millis(50));

    assert_eq!(driver.state(), DriverState::Streaming);
    assert!(failures.lock().unwrap().is_empty());
    driver.stop().unwrap();
}

#[test]
fn test_failed_driver_requires_teardown() {
    let transport = Arc::new(MockTransport::new());
    for _ in 0..6 {
        transport.push_error(TransportError::Disconnected);
    }

    let mut driver = DongleDriver::with_tuning(test_tuning());
    driver.initialize(transport).unwrap();
    driver.start(&ConnectionConfig::default()).unwrap();
    assert!(wait_until(Duration::from_secs(1), || {
        driver.state() == DriverState::Failed
    }));

    assert!(matches!(
        driver.send(&Message::Heartbeat).unwrap_err(),
        DriverError::NotStreaming
    ));
    assert!(matches!(
        driver.start(&ConnectionConfig::default()).unwrap_err(),
        DriverError::NotInitialized
    ));
    assert!(matches!(
        driver.stop().unwrap_err(),
        DriverError::InvalidStateTransition {
            operation: "stop",
            state: DriverState::Failed,
        }
    ));

    driver.teardown();
    assert_eq!(driver.state(), DriverState::Idle);
    driver.initialize(Arc::new(MockTransport::new())).unwrap();
    driver.start(&ConnectionConfig::default()).unwrap();
    assert_eq!(driver.state(), DriverState::Streaming);
}

#[test]
fn test_write_error_streak_fails_the_link() {
    let transport = Arc::new(MockTransport::new());
    let mut driver = DongleDriver::with_tuning(test_tuning());
    let failures = collect_failures(&driver);
    driver.initialize(transport.clone()).unwrap();
    driver.start(&ConnectionConfig::default()).unwrap();

    // every heartbeat write from here on fails
    transport.fail_next_writes(u32::MAX);
    assert!(wait_until(Duration::from_secs(1), || {
        driver.state() == DriverState::Failed
    }));
    assert!(matches!(
        failures.lock().unwrap()[0],
        FailureReason::TransportErrors { .. }
    ));
}

#[test]
fn test_failure_listener_can_call_back_into_the_driver() {
    let transport = Arc::new(MockTransport::new());
    let mut driver = DongleDriver::with_tuning(test_tuning());
    driver.initialize(transport.clone()).unwrap();
    driver.start(&ConnectionConfig::default()).unwrap();

    // the failure is published from the write path; a listener issuing its
    // own send must get an error back, not a deadlock on the write gate
    let driver = Arc::new(driver);
    let reentrant_sends = Arc::new(Mutex::new(Vec::new()));
    {
        let driver_for_callback = driver.clone();
        let sink = reentrant_sends.clone();
        driver.events().subscribe(EventKind::Failure, move |_| {
            sink.lock()
                .unwrap()
                .push(driver_for_callback.send(&Message::Heartbeat).is_err());
        });
    }

    transport.fail_next_writes(u32::MAX);
    assert!(wait_until(Duration::from_secs(1), || {
        driver.state() == DriverState::Failed
    }));

    let reentrant_sends = reentrant_sends.lock().unwrap();
    assert_eq!(*reentrant_sends, vec![true]);
}

#[test]
fn test_resync_budget_exhaustion_fails() {
    let transport = Arc::new(MockTransport::new());
    // no frame boundary anywhere in this
    transport.push_bytes(vec![0x11; 64]);

    let mut driver = DongleDriver::with_tuning(DriverTuning {
        resync_budget: 4,
        ..test_tuning()
    });
    let failures = collect_failures(&driver);
    driver.initialize(transport).unwrap();
    driver.start(&ConnectionConfig::default()).unwrap();

    assert!(wait_until(Duration::from_secs(1), || {
        driver.state() == DriverState::Failed
    }));
    assert!(matches!(
        failures.lock().unwrap()[0],
        FailureReason::ResyncExhausted { attempts: 5 }
    ));
}

#[test]
fn test_resync_recovers_within_budget() {
    let transport = Arc::new(MockTransport::new());
    let mut stream = vec![0xEE; 8];
    stream.extend(inbound_frame(MessageType::Phase, &4u32.to_le_bytes()));
    transport.push_bytes(stream);

    let mut driver = DongleDriver::with_tuning(test_tuning());
    let seen = collect_messages(&driver);
    driver.initialize(transport).unwrap();
    driver.start(&ConnectionConfig::default()).unwrap();

    assert!(wait_until(Duration::from_secs(1), || {
        seen.lock().unwrap().contains(&Message::Phase(4))
    }));
    driver.stop().unwrap();
}

#[test]
fn test_teardown_clears_listeners_and_is_idempotent() {
    let transport = Arc::new(MockTransport::new());
    let mut driver = started_driver(transport);
    collect_messages(&driver);
    collect_failures(&driver);
    assert_eq!(driver.events().listener_count(EventKind::Message), 1);

    driver.teardown();
    assert_eq!(driver.state(), DriverState::Idle);
    assert_eq!(driver.events().listener_count(EventKind::Message), 0);
    assert_eq!(driver.events().listener_count(EventKind::Failure), 0);

    // teardown from Idle is a no-op
    driver.teardown();
    assert_eq!(driver.state(), DriverState::Idle);
}
