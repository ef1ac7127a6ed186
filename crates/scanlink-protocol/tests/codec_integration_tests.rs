//! Integration tests for ScannerCodec with Tokio streams.
//!
//! These tests drive requests, replies and unsolicited events through a
//! `Framed` duplex pair, the way the session and the emulator use the codec.

use futures::{SinkExt, StreamExt};
use scanlink_core::{BuzzerType, Error, KeyName, KeyState, ScannerIdentity, ScannerType};
use scanlink_protocol::{
    BarcodeFormat, BarcodeRecord, ConfigScope, ConfigurationTree, Frame, Inbound, PayloadEncoding,
    Reply, Request, ResponseFormat, RfidRecord, ScannerCodec, decode_barcode, decode_rfid,
    commands::{AccessPassword, RfidBank, WriteRequest},
    response::Symbology,
};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio_util::codec::{Framed, FramedRead};

/// Helper function to create a framed duplex stream for testing.
fn create_framed_duplex(
    buffer_size: usize,
) -> (
    Framed<DuplexStream, ScannerCodec>,
    Framed<DuplexStream, ScannerCodec>,
) {
    let (host, device) = tokio::io::duplex(buffer_size);
    (
        Framed::new(host, ScannerCodec::new()),
        Framed::new(device, ScannerCodec::new()),
    )
}

#[tokio::test]
async fn test_request_reaches_device_intact() {
    let (mut host, mut device) = create_framed_duplex(1024);

    let request = Request::Buzzer(BuzzerType::B2);
    host.send(request.encode().unwrap()).await.unwrap();

    let frame = device.next().await.unwrap().unwrap();
    assert_eq!(Request::decode(&frame).unwrap(), request);
}

#[tokio::test]
async fn test_configuration_exchange() {
    let (mut host, mut device) = create_framed_duplex(64 * 1024);

    host.send(Request::GetConfig(ConfigScope::Barcode).encode().unwrap())
        .await
        .unwrap();
    let frame = device.next().await.unwrap().unwrap();
    let Request::GetConfig(scope) = Request::decode(&frame).unwrap() else {
        panic!("expected GetConfig");
    };

    let tree = ConfigurationTree::default_for(scope);
    device
        .send(Reply::with_configuration(&tree).encode())
        .await
        .unwrap();

    let frame = host.next().await.unwrap().unwrap();
    let Inbound::Reply(reply) = Inbound::classify(&frame).unwrap() else {
        panic!("expected a reply");
    };
    assert_eq!(reply.configuration().unwrap(), tree);
}

#[tokio::test]
async fn test_binary_write_request_round_trip() {
    let (mut host, mut device) = create_framed_duplex(1024);

    // Payload bytes include STX and ETX; the length prefix keeps them opaque.
    let request = Request::WriteTag(WriteRequest {
        bank: RfidBank::User,
        addr: 0,
        password: AccessPassword::zero(),
        uii: vec![0x02, 0x03, 0x01, 0x03],
        data: vec![0x03, 0x02],
        timeout_ms: 500,
    });
    host.send(request.encode().unwrap()).await.unwrap();

    let frame = device.next().await.unwrap().unwrap();
    assert!(frame.is_binary());
    assert_eq!(Request::decode(&frame).unwrap(), request);
}

#[tokio::test]
async fn test_multiple_frames_in_one_write() {
    let (mut host, mut device) = create_framed_duplex(1024);

    let mut wire = Vec::new();
    wire.extend_from_slice(&Reply::Ack.encode().to_wire());
    wire.extend_from_slice(&Inbound::key_frame(KeyName::Trigger, KeyState::Pressed).to_wire());
    wire.extend_from_slice(&Reply::Nack(0x0102).encode().to_wire());
    device.get_mut().write_all(&wire).await.unwrap();

    let first = Inbound::classify(&host.next().await.unwrap().unwrap()).unwrap();
    let second = Inbound::classify(&host.next().await.unwrap().unwrap()).unwrap();
    let third = Inbound::classify(&host.next().await.unwrap().unwrap()).unwrap();

    assert_eq!(first, Inbound::Reply(Reply::Ack));
    assert!(matches!(
        second,
        Inbound::Key {
            key: KeyName::Trigger,
            state: KeyState::Pressed
        }
    ));
    assert_eq!(third, Inbound::Reply(Reply::Nack(0x0102)));
}

#[tokio::test]
async fn test_frame_split_across_writes() {
    let (host, mut device) = tokio::io::duplex(1024);
    let mut host = FramedRead::new(host, ScannerCodec::new());

    let identity = ScannerIdentity {
        serial_number: "000123".to_string(),
        part_number: "SP1-QUB".to_string(),
        firmware_version: "1.2.0".to_string(),
        model: "SP1".to_string(),
        region: "JP".to_string(),
        scanner_type: ScannerType::TwoDRfid,
    };
    let wire = Reply::with_identity(&identity).encode().to_wire();
    let (head, tail) = wire.split_at(wire.len() / 2);

    device.write_all(head).await.unwrap();
    device.write_all(tail).await.unwrap();

    let frame = host.next().await.unwrap().unwrap();
    let reply = Reply::decode(&frame).unwrap();
    assert_eq!(reply.identity().unwrap(), identity);
}

#[tokio::test]
async fn test_noise_between_frames_is_skipped() {
    let (host, mut device) = tokio::io::duplex(1024);
    let mut host = FramedRead::new(host, ScannerCodec::new());

    device.write_all(b"garbage").await.unwrap();
    device
        .write_all(&Reply::with_battery(scanlink_core::BatteryLevel::Over40).encode().to_wire())
        .await
        .unwrap();

    let frame = host.next().await.unwrap().unwrap();
    assert_eq!(
        Reply::decode(&frame).unwrap().battery().unwrap(),
        scanlink_core::BatteryLevel::Over40
    );
}

#[tokio::test]
async fn test_rfid_event_stream() {
    let (mut host, mut device) = create_framed_duplex(4096);
    let format = ResponseFormat {
        rssi: true,
        antenna: true,
        ..ResponseFormat::binary()
    };

    for batch in 0..3u8 {
        let tags: Vec<RfidRecord> = (0..4u8)
            .map(|i| RfidRecord::new(vec![0xE2, 0x80, batch, i]).shaped_for(&format))
            .collect();
        device
            .send(Inbound::rfid_frame(&tags, &format).unwrap())
            .await
            .unwrap();
    }

    for batch in 0..3u8 {
        let frame = host.next().await.unwrap().unwrap();
        let Inbound::Rfid { body, encoding } = Inbound::classify(&frame).unwrap() else {
            panic!("expected an RFID event");
        };
        assert_eq!(encoding, PayloadEncoding::Binary);
        let tags = decode_rfid(&body, &format).unwrap();
        assert_eq!(tags.len(), 4);
        assert!(tags.iter().all(|t| t.uii[2] == batch));
        assert!(tags.iter().all(|t| t.rssi == Some(-600) && t.antenna == Some(1)));
    }
}

#[tokio::test]
async fn test_text_barcode_event() {
    let (mut host, mut device) = create_framed_duplex(1024);
    let format = BarcodeFormat::new(PayloadEncoding::Text, 1);
    let record = BarcodeRecord::new(Symbology::new('Q', "]Q1"), b"HELLO".to_vec());

    device
        .send(Inbound::barcode_frame(std::slice::from_ref(&record), &format).unwrap())
        .await
        .unwrap();

    let frame = host.next().await.unwrap().unwrap();
    assert!(!frame.is_binary());
    let Inbound::Barcode { body, encoding } = Inbound::classify(&frame).unwrap() else {
        panic!("expected a barcode event");
    };
    assert_eq!(encoding, PayloadEncoding::Text);
    assert_eq!(decode_barcode(&body, &format).unwrap(), vec![record]);
}

#[tokio::test]
async fn test_oversized_frame_is_rejected_on_send() {
    let (host, _device) = tokio::io::duplex(1024);
    let mut host = Framed::new(host, ScannerCodec::with_max_frame_size(16));

    let err = host
        .send(Frame::text("SET]CM]power_save=1]power_on_buzzer=1"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::FrameTooLarge { .. }));
}

#[tokio::test]
async fn test_stream_ends_when_device_hangs_up() {
    let (mut host, device) = create_framed_duplex(1024);
    drop(device);
    assert!(host.next().await.is_none());
}
