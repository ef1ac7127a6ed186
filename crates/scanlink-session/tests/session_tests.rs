//! Device session behaviour against the virtual scanner.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{CollectingSink, claimed, eventually, harness, record_statuses, test_config};
use scanlink_core::{
    BatteryLevel, BuzzerType, Error, KeyEvent, KeyName, KeyState, LedColor, LedType, ScannerStatus,
};
use scanlink_emulator::nak;
use scanlink_protocol::response::Symbology;
use scanlink_protocol::settings::{MultiLineMode, MultiLineSymbology};
use scanlink_protocol::{
    BarcodeRecord, ConfigScope, ConfigurationTree, Frame, ResponseFormat, RfidRecord,
};
use scanlink_session::listener::{ListenerCategory, OnBarcode, OnRfid, SessionInfo};
use scanlink_session::{DeviceSession, ErrorSink, MockAccessory, SessionConfig};

fn tag(serial: u8) -> RfidRecord {
    RfidRecord::new(vec![0x30, 0x08, 0x33, 0xB2, 0xDD, 0xD9, 0x01, serial])
}

#[tokio::test]
async fn test_claim_exclusivity() {
    let first = harness("SP1-EXCL", test_config());
    let second = DeviceSession::builder(first.accessory.clone())
        .claims(first.claims.clone())
        .build()
        .unwrap();

    first.session.claim().await.unwrap();
    let err = second.claim().await.unwrap_err();
    assert!(matches!(err, Error::AlreadyClaimed { .. }));
    assert_eq!(second.status(), ScannerStatus::Discovered);

    first.session.close().await;
    second.claim().await.unwrap();
    assert_eq!(second.status(), ScannerStatus::Claimed);
    assert_eq!(first.claims.owner("SP1-EXCL"), Some(second.id()));

    second.query_identity().await.unwrap();
    second.close().await;
    assert!(first.claims.is_empty());
}

#[tokio::test]
async fn test_commands_are_answered_in_order() {
    let h = claimed("SP1-ORDER").await;
    h.scanner.set_reply_delay(Duration::from_millis(20));
    for index in 0..8u16 {
        h.scanner
            .buffer_tags(index, (0..index).map(|i| tag(i as u8)).collect());
    }

    let completed = Arc::new(Mutex::new(Vec::new()));
    let mut tasks = Vec::new();
    for index in 0..8u16 {
        let session = Arc::clone(&h.session);
        let completed = Arc::clone(&completed);
        tasks.push(tokio::spawn(async move {
            let count = session.get_count(index).await.unwrap();
            completed.lock().unwrap().push(index);
            (index, count)
        }));
        // Let each caller reach the command lock before the next one.
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    for task in tasks {
        let (index, count) = task.await.unwrap();
        assert_eq!(count, u32::from(index), "reply attributed to the wrong request");
    }
    assert_eq!(*completed.lock().unwrap(), (0..8).collect::<Vec<_>>());
    assert_eq!(h.scanner.snapshot().requests, 8);
}

#[tokio::test]
async fn test_close_wait_rejects_commands_until_closed() {
    let h = claimed("SP1-CLOSEWAIT").await;
    let statuses = record_statuses(&h.session);

    h.scanner.disconnect().unwrap();
    assert!(eventually(|| h.session.status() == ScannerStatus::CloseWait).await);

    let err = h.session.buzzer(BuzzerType::B1).await.unwrap_err();
    assert!(matches!(err, Error::DeviceDisconnected { .. }));
    assert_eq!(h.session.status(), ScannerStatus::CloseWait);

    h.session.close().await;
    assert_eq!(h.session.status(), ScannerStatus::Closed);
    let transitions = h.session.history().len();

    h.session.close().await;
    assert_eq!(h.session.status(), ScannerStatus::Closed);
    assert_eq!(h.session.history().len(), transitions);
    assert_eq!(
        *statuses.lock().unwrap(),
        vec![ScannerStatus::CloseWait, ScannerStatus::Closed]
    );

    assert!(matches!(
        h.session.buzzer(BuzzerType::B1).await,
        Err(Error::NotClaimed)
    ));
}

#[tokio::test]
async fn test_pending_command_fails_when_link_drops() {
    let h = claimed("SP1-DROP").await;
    h.scanner.withhold_next_reply();

    let session = Arc::clone(&h.session);
    let pending = tokio::spawn(async move { session.battery_level().await });
    assert!(eventually(|| h.scanner.snapshot().last_request.as_deref() == Some("GetBattery")).await);
    h.scanner.disconnect().unwrap();

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::DeviceDisconnected { .. }));
    assert_eq!(h.session.status(), ScannerStatus::CloseWait);
}

#[tokio::test]
async fn test_timeout_discards_late_reply() {
    let config = SessionConfig {
        command_timeout_ms: 100,
        late_reply_window_ms: 2000,
        ..SessionConfig::default()
    };
    let h = harness("SP1-LATE", config);
    h.session.claim().await.unwrap();

    h.scanner.set_reply_delay(Duration::from_millis(250));
    let err = h.session.battery_level().await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));
    assert!(err.is_retryable());
    assert_eq!(h.session.status(), ScannerStatus::Claimed);

    // The battery reply is still on its way; the next request waits for it
    // instead of taking it as its own answer.
    h.scanner.set_reply_delay(Duration::ZERO);
    h.session.save_params().await.unwrap();

    assert_eq!(h.session.status(), ScannerStatus::Claimed);
    assert_eq!(h.scanner.snapshot().saved_params, 1);
}

#[tokio::test]
async fn test_withheld_reply_times_out() {
    let h = harness(
        "SP1-WITHHOLD",
        SessionConfig {
            command_timeout_ms: 100,
            late_reply_window_ms: 300,
            ..test_config()
        },
    );
    h.session.claim().await.unwrap();

    h.scanner.withhold_next_reply();
    let err = h.session.save_params().await.unwrap_err();
    assert!(matches!(err, Error::Timeout { duration_ms: 100 }));

    // No late reply ever comes: the next request goes out once the window
    // has passed and gets its own answer.
    let started = std::time::Instant::now();
    h.session.save_params().await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(h.scanner.snapshot().saved_params, 1);
    assert_eq!(h.session.status(), ScannerStatus::Claimed);
}

#[tokio::test]
async fn test_request_waiting_out_late_reply_sees_disconnect() {
    let h = harness(
        "SP1-SETTLE-DROP",
        SessionConfig {
            command_timeout_ms: 100,
            late_reply_window_ms: 400,
            ..test_config()
        },
    );
    h.session.claim().await.unwrap();
    h.scanner.withhold_next_reply();
    assert!(matches!(
        h.session.save_params().await,
        Err(Error::Timeout { .. })
    ));

    // Passes the claim check, then waits for the abandoned reply.
    let session = Arc::clone(&h.session);
    let pending = tokio::spawn(async move { session.save_params().await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.scanner.disconnect().unwrap();
    assert!(eventually(|| h.session.status() == ScannerStatus::CloseWait).await);

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::DeviceDisconnected { .. }));
    assert_eq!(h.session.status(), ScannerStatus::CloseWait);
}

#[tokio::test]
async fn test_oversized_frame_never_answers_a_request() {
    let h = harness(
        "SP1-OVERSIZE",
        SessionConfig {
            command_timeout_ms: 200,
            late_reply_window_ms: 200,
            max_frame_size: 1024,
            ..test_config()
        },
    );
    h.session.claim().await.unwrap();

    h.scanner.withhold_next_reply();
    let session = Arc::clone(&h.session);
    let pending = tokio::spawn(async move { session.buzzer(BuzzerType::B1).await });
    assert!(eventually(|| h.scanner.snapshot().last_request.as_deref() == Some("Buzzer")).await);

    let mut payload = vec![b'T'; 2000];
    payload[101..106].copy_from_slice(&[0x02, b'A', b'C', b'K', 0x03]);
    h.scanner.send_raw(Frame::binary(payload)).unwrap();

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Timeout { duration_ms: 200 }));
    assert_eq!(h.session.status(), ScannerStatus::Claimed);

    // The link is still in step after the skipped frame.
    h.session.save_params().await.unwrap();
    assert_eq!(h.scanner.snapshot().saved_params, 1);
}

#[tokio::test]
async fn test_nack_surfaces_device_rejected() {
    let h = claimed("SP1-NACK").await;
    h.scanner.nack_next(nak::INVALID_PARAMETER);

    let mut format = ResponseFormat::binary();
    format.rssi = true;
    let err = h.session.set_response_format(format).await.unwrap_err();
    assert!(matches!(err, Error::DeviceRejected { code } if code == nak::INVALID_PARAMETER));
    assert_eq!(h.session.response_format(), ResponseFormat::binary());
    assert_eq!(h.session.status(), ScannerStatus::Claimed);
}

#[tokio::test]
async fn test_failing_listeners_are_isolated() {
    let h = claimed("SP1-ISOLATE").await;
    let received = Arc::new(Mutex::new(Vec::new()));

    h.session.register_key_listener(Arc::new(
        |_: &SessionInfo, _: &KeyEvent| -> anyhow::Result<()> { anyhow::bail!("first listener") },
    ));
    h.session.register_key_listener(Arc::new(
        |_: &SessionInfo, _: &KeyEvent| -> anyhow::Result<()> { panic!("second listener") },
    ));
    let sink = Arc::clone(&received);
    h.session.register_key_listener(Arc::new(
        move |_: &SessionInfo, event: &KeyEvent| -> anyhow::Result<()> {
            sink.lock().unwrap().push(*event);
            Ok(())
        },
    ));

    h.scanner.press_trigger().unwrap();
    h.scanner.release_trigger().unwrap();
    assert!(eventually(|| received.lock().unwrap().len() == 2).await);

    let events = received.lock().unwrap().clone();
    assert_eq!(events[0].key, KeyName::Trigger);
    assert!(events[0].is_pressed());
    assert!(!events[1].is_pressed());

    let failures = h.sink.failures();
    assert_eq!(failures.len(), 4);
    assert!(failures.iter().all(|(category, _)| *category == ListenerCategory::Key));
    assert!(failures[1].1.contains("second listener"));

    // The dispatcher survived and still correlates replies.
    assert_eq!(
        h.session.key_status(KeyName::Trigger).await.unwrap(),
        KeyState::Released
    );
}

#[tokio::test]
async fn test_unregistered_listener_stops_receiving() {
    let h = claimed("SP1-UNREG").await;
    let count = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&count);
    let id = h.session.register_key_listener(Arc::new(
        move |_: &SessionInfo, _: &KeyEvent| -> anyhow::Result<()> {
            *counter.lock().unwrap() += 1;
            Ok(())
        },
    ));

    h.scanner.press_trigger().unwrap();
    assert!(eventually(|| *count.lock().unwrap() == 1).await);
    assert!(h.session.unregister_key_listener(id));

    h.scanner.release_trigger().unwrap();
    h.session.buzzer(BuzzerType::B3).await.unwrap();
    assert_eq!(*count.lock().unwrap(), 1);
}

fn qr() -> Symbology {
    Symbology::new('Q', "]Q1")
}

/// A two-line read with only its first line on the wire.
fn first_line_only(data: &[u8]) -> Frame {
    let mut payload = vec![b'B', 1, b'Q'];
    payload.extend_from_slice(b"]Q1");
    payload.extend_from_slice(&0u16.to_be_bytes());
    payload.extend_from_slice(&0u16.to_be_bytes());
    payload.extend_from_slice(&(data.len() as u16).to_be_bytes());
    payload.extend_from_slice(data);
    Frame::binary(payload)
}

#[tokio::test]
async fn test_multi_line_reads_reassemble() {
    let h = claimed("SP1-MULTILINE").await;
    let reads = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reads);
    h.session.register_data_listener(Arc::new(OnBarcode(
        move |_: &SessionInfo, records: &[BarcodeRecord]| -> anyhow::Result<()> {
            sink.lock().unwrap().extend_from_slice(records);
            Ok(())
        },
    )));

    let mut tree = ConfigurationTree::default_for(ConfigScope::Barcode);
    if let ConfigurationTree::Barcode(settings) = &mut tree {
        settings.decode.multi_line = MultiLineMode::with_lines(&[
            MultiLineSymbology::Code128,
            MultiLineSymbology::Code128,
        ]);
    }
    h.session.set_configuration(&tree).await.unwrap();
    assert_eq!(h.session.applied_configuration(ConfigScope::Barcode), Some(tree));
    h.session.open_reader().await.unwrap();

    let record = BarcodeRecord::multi_line(vec![
        (qr(), b"HELLO ".to_vec()),
        (qr(), b"WORLD".to_vec()),
    ])
    .unwrap();
    h.scanner.scan(vec![record]).unwrap();
    assert!(eventually(|| reads.lock().unwrap().len() == 1).await);

    {
        let reads = reads.lock().unwrap();
        assert_eq!(reads[0].data_str(), Some("HELLO WORLD"));
        assert_eq!(reads[0].lines.len(), 2);
        assert_eq!(reads[0].lines[0].start, 0);
        assert_eq!(reads[0].lines[1].start, 6);
    }

    // Missing second line: the read is dropped and the session carries on.
    h.scanner.send_raw(first_line_only(b"HELLO ")).unwrap();
    let next = BarcodeRecord::multi_line(vec![
        (qr(), b"LINE1".to_vec()),
        (qr(), b"LINE2".to_vec()),
    ])
    .unwrap();
    h.scanner.scan(vec![next]).unwrap();
    assert!(eventually(|| reads.lock().unwrap().len() == 2).await);
    assert_eq!(reads.lock().unwrap()[1].data_str(), Some("LINE1LINE2"));
    assert_eq!(h.session.status(), ScannerStatus::Claimed);
}

#[tokio::test]
async fn test_rfid_batch_carries_only_negotiated_fields() {
    let h = claimed("SP1-RSSI").await;
    let tags = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&tags);
    h.session.register_data_listener(Arc::new(OnRfid(
        move |_: &SessionInfo, records: &[RfidRecord]| -> anyhow::Result<()> {
            sink.lock().unwrap().extend_from_slice(records);
            Ok(())
        },
    )));

    let mut format = ResponseFormat::binary();
    format.rssi = true;
    h.session.set_response_format(format).await.unwrap();
    assert_eq!(h.scanner.snapshot().response_format, format);
    h.session.open_inventory(None).await.unwrap();

    let batch: Vec<RfidRecord> = (0..6)
        .map(|i| RfidRecord {
            rssi: Some(-450 - i16::from(i)),
            antenna: Some(2),
            ..tag(i)
        })
        .collect();
    h.scanner.report_tags(batch.clone()).unwrap();
    assert!(eventually(|| tags.lock().unwrap().len() == 6).await);

    let tags = tags.lock().unwrap();
    for (decoded, sent) in tags.iter().zip(&batch) {
        assert_eq!(decoded.uii, sent.uii);
        assert_eq!(decoded.rssi, sent.rssi);
        assert_eq!(decoded.antenna, None);
        assert_eq!(decoded.pc, None);
    }
}

#[tokio::test]
async fn test_text_format_tag_events() {
    let h = claimed("SP1-TEXT").await;
    let tags = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&tags);
    h.session.register_data_listener(Arc::new(OnRfid(
        move |_: &SessionInfo, records: &[RfidRecord]| -> anyhow::Result<()> {
            sink.lock().unwrap().extend_from_slice(records);
            Ok(())
        },
    )));

    let mut format = ResponseFormat::text();
    format.pc = true;
    format.antenna = true;
    h.session.set_response_format(format).await.unwrap();
    h.session.open_inventory(Some(3)).await.unwrap();
    h.scanner.report_tags(vec![tag(1), tag(2)]).unwrap();

    assert!(eventually(|| tags.lock().unwrap().len() == 2).await);
    let tags = tags.lock().unwrap();
    assert_eq!(tags[0].pc, Some(RfidRecord::pc_for_uii(&tag(1).uii)));
    assert_eq!(tags[1].antenna, Some(1));
    assert_eq!(tags[1].rssi, None);
}

#[tokio::test]
async fn test_buffered_tags() {
    let h = claimed("SP1-BUFFER").await;
    h.scanner.buffer_tags(1, vec![tag(1), tag(2), tag(3)]);

    assert_eq!(h.session.get_count(1).await.unwrap(), 3);
    assert_eq!(h.session.get_count(2).await.unwrap(), 0);

    let pulled = h.session.pull_data(1).await.unwrap();
    let uiis: Vec<_> = pulled.iter().map(RfidRecord::uii_hex).collect();
    assert_eq!(uiis.len(), 3);
    assert!(uiis[2].ends_with("03"));
    assert_eq!(h.session.get_count(1).await.unwrap(), 0);
}

#[tokio::test]
async fn test_configuration_round_trip_through_device() {
    let h = claimed("SP1-CONFIG").await;

    let mut tree = h.session.get_configuration(ConfigScope::Rfid).await.unwrap();
    assert_eq!(tree, ConfigurationTree::default_for(ConfigScope::Rfid));
    if let ConfigurationTree::Rfid(settings) = &mut tree {
        settings.scan.power_level_read = 240;
        settings.scan.power_level_write = 180;
    }
    h.session.set_configuration(&tree).await.unwrap();
    h.session.save_params().await.unwrap();

    assert_eq!(h.session.get_configuration(ConfigScope::Rfid).await.unwrap(), tree);
    assert_eq!(h.scanner.configuration(ConfigScope::Rfid), Some(tree));
    assert_eq!(h.scanner.snapshot().saved_params, 1);
}

#[tokio::test]
async fn test_get_configuration_before_claim() {
    let h = harness("SP1-EARLY", test_config());
    assert!(matches!(
        h.session.get_configuration(ConfigScope::Common).await,
        Err(Error::NotClaimed)
    ));
}

#[tokio::test]
async fn test_device_information() {
    let h = claimed("SP1-INFO").await;
    h.scanner.set_battery(BatteryLevel::Under40);

    let identity = h.session.query_identity().await.unwrap();
    assert_eq!(identity.serial_number, "SP1-000001");
    assert!(identity.scanner_type.has_rfid());
    h.session.query_identity().await.unwrap();
    assert_eq!(h.scanner.snapshot().requests, 1, "identity is cached");

    assert_eq!(h.session.battery_level().await.unwrap(), BatteryLevel::Under40);
    h.session.led(LedType::Led1, LedColor::Green).await.unwrap();
    assert_eq!(h.scanner.snapshot().last_led, Some((LedType::Led1, LedColor::Green)));
}

#[tokio::test]
async fn test_firmware_upgrade_streams_in_chunks() {
    let config = SessionConfig {
        firmware_chunk_size: 512,
        ..test_config()
    };
    let h = harness("SP1-FIRMWARE", config);
    h.session.claim().await.unwrap();

    let image: Vec<u8> = (0..1300u32).map(|i| (i % 251) as u8).collect();
    let chunks = h
        .session
        .upgrade_firmware(image.as_slice(), image.len() as u32)
        .await
        .unwrap();

    assert_eq!(chunks, 3);
    assert_eq!(h.scanner.firmware(), image);
    assert!(h.scanner.snapshot().firmware_complete);
}

#[tokio::test]
async fn test_firmware_upgrade_rejects_short_image() {
    let h = claimed("SP1-SHORT").await;
    let image = vec![0u8; 100];
    let err = h
        .session
        .upgrade_firmware(image.as_slice(), 4096)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Encoding { .. }));
}

#[tokio::test]
async fn test_garbage_frame_moves_to_unknown() {
    let h = claimed("SP1-GARBAGE").await;
    let statuses = record_statuses(&h.session);

    h.scanner.send_raw(Frame::text("HELLO]WORLD")).unwrap();
    assert!(eventually(|| h.session.status() == ScannerStatus::Unknown).await);

    assert!(matches!(
        h.session.buzzer(BuzzerType::B1).await,
        Err(Error::Protocol { .. })
    ));
    assert!(matches!(h.session.claim().await, Err(Error::InvalidStateTransition { .. })));

    h.session.close().await;
    assert_eq!(
        *statuses.lock().unwrap(),
        vec![ScannerStatus::Unknown, ScannerStatus::Closed]
    );
}

#[tokio::test]
async fn test_reclaim_after_close() {
    let h = claimed("SP1-RECLAIM").await;
    h.session.query_identity().await.unwrap();
    h.session.close().await;

    h.session.claim().await.unwrap();
    assert_eq!(h.session.status(), ScannerStatus::Claimed);
    assert!(h.session.claimed_at().is_some());
    h.session.query_identity().await.unwrap();
    assert_eq!(h.scanner.snapshot().requests, 2, "identity cache is per claim");

    let steps: Vec<_> = h.session.history().iter().map(|t| t.to).collect();
    assert_eq!(
        steps,
        vec![ScannerStatus::Claimed, ScannerStatus::Closed, ScannerStatus::Claimed]
    );
}

#[tokio::test]
async fn test_status_listener_failure_is_reported() {
    let (accessory, device) = MockAccessory::new("SP1-STATUS");
    let _scanner = common::spawn_scanner(device);
    let sink = Arc::new(CollectingSink::default());
    let session = DeviceSession::builder(accessory)
        .claims(scanlink_session::ClaimTable::new())
        .error_sink(Arc::clone(&sink) as Arc<dyn ErrorSink>)
        .build()
        .unwrap();
    session.register_status_listener(Arc::new(
        |_: &SessionInfo, status: ScannerStatus| -> anyhow::Result<()> {
            anyhow::bail!("cannot handle {status}")
        },
    ));

    session.claim().await.unwrap();
    session.close().await;

    let failures = sink.failures();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0], (ListenerCategory::Status, "cannot handle Claimed".to_string()));
    assert_eq!(session.status(), ScannerStatus::Closed);
}
