//! Device side of the accessory protocol.
//!
//! A [`VirtualScanner`] answers every host request over any async byte
//! stream and keeps the state a real accessory would: one configuration
//! tree per scope, the negotiated response format, reader and inventory
//! switches, buffered tags and the firmware image being received.
//!
//! The paired [`EmulatorHandle`] scripts it from the outside. Events
//! (trigger, barcode reads, tag batches, raw frames, disconnect) are queued
//! and written between replies. Faults (NACK or withhold the next reply,
//! reply delay) take effect immediately for the next request the scanner
//! reads.
//!
//! ```no_run
//! use scanlink_emulator::VirtualScanner;
//! use tokio::net::TcpListener;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let (mut scanner, handle) = VirtualScanner::new(VirtualScanner::default_identity());
//! let listener = TcpListener::bind("127.0.0.1:7400").await?;
//! let (stream, _) = listener.accept().await?;
//! handle.press_trigger()?;
//! scanner.serve(stream).await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio_util::codec::Framed;
use tracing::{debug, info, trace, warn};

use scanlink_core::{
    BatteryLevel, BuzzerType, Error, KeyName, KeyState, LedColor, LedType, Result,
    ScannerIdentity, ScannerType,
};
use scanlink_protocol::commands::TagFilter;
use scanlink_protocol::{
    BarcodeFormat, BarcodeRecord, ConfigScope, ConfigurationTree, Frame, Inbound, Reply,
    Request, ResponseFormat, RfidRecord, ScannerCodec,
};

/// Error codes the virtual scanner sends in `NAK` replies.
pub mod nak {
    /// The request could not be decoded.
    pub const UNKNOWN_COMMAND: u16 = 0x0001;
    /// A parameter was outside what the device accepts.
    pub const INVALID_PARAMETER: u16 = 0x0102;
    /// A firmware chunk did not continue the image.
    pub const FIRMWARE_SEQUENCE: u16 = 0x0201;
    /// The reply could not be produced in the negotiated format.
    pub const ENCODING_FAILED: u16 = 0x0301;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Queued unsolicited output.
#[derive(Debug)]
enum Event {
    Key(KeyState),
    Scan(Vec<BarcodeRecord>),
    Tags(Vec<RfidRecord>),
    Raw(Frame),
    Disconnect,
}

#[derive(Debug, Default)]
struct Faults {
    nack_next: Option<u16>,
    withhold_next: bool,
    delay: Duration,
}

/// Observable state of the virtual scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannerSnapshot {
    pub connected: bool,
    /// Requests read from the host, answered or not.
    pub requests: u64,
    pub last_request: Option<String>,
    pub reader_open: bool,
    pub rfid_active: bool,
    pub response_format: ResponseFormat,
    pub trigger: KeyState,
    pub saved_params: u32,
    pub last_buzzer: Option<BuzzerType>,
    pub last_led: Option<(LedType, LedColor)>,
    pub filters: usize,
    pub auto_link_profile: bool,
    pub tag_operations: u32,
    pub firmware_received: usize,
    pub firmware_complete: bool,
}

#[derive(Debug)]
struct Device {
    identity: ScannerIdentity,
    configs: HashMap<ConfigScope, ConfigurationTree>,
    response_format: ResponseFormat,
    battery: BatteryLevel,
    trigger: KeyState,
    reader_open: bool,
    rfid_active: bool,
    filters: Vec<TagFilter>,
    buffered: HashMap<u16, Vec<RfidRecord>>,
    auto_link_profile: bool,
    firmware: Vec<u8>,
    firmware_total: u32,
    faults: Faults,
    connected: bool,
    requests: u64,
    last_request: Option<String>,
    saved_params: u32,
    last_buzzer: Option<BuzzerType>,
    last_led: Option<(LedType, LedColor)>,
    tag_operations: u32,
}

impl Device {
    fn new(identity: ScannerIdentity) -> Self {
        Self {
            identity,
            configs: ConfigScope::ALL
                .into_iter()
                .map(|scope| (scope, ConfigurationTree::default_for(scope)))
                .collect(),
            response_format: ResponseFormat::binary(),
            battery: BatteryLevel::Over40,
            trigger: KeyState::Released,
            reader_open: false,
            rfid_active: false,
            filters: Vec::new(),
            buffered: HashMap::new(),
            auto_link_profile: false,
            firmware: Vec::new(),
            firmware_total: 0,
            faults: Faults::default(),
            connected: false,
            requests: 0,
            last_request: None,
            saved_params: 0,
            last_buzzer: None,
            last_led: None,
            tag_operations: 0,
        }
    }

    fn snapshot(&self) -> ScannerSnapshot {
        ScannerSnapshot {
            connected: self.connected,
            requests: self.requests,
            last_request: self.last_request.clone(),
            reader_open: self.reader_open,
            rfid_active: self.rfid_active,
            response_format: self.response_format,
            trigger: self.trigger,
            saved_params: self.saved_params,
            last_buzzer: self.last_buzzer,
            last_led: self.last_led,
            filters: self.filters.len(),
            auto_link_profile: self.auto_link_profile,
            tag_operations: self.tag_operations,
            firmware_received: self.firmware.len(),
            firmware_complete: self.firmware_total > 0
                && self.firmware.len() == self.firmware_total as usize,
        }
    }

    fn barcode_format(&self) -> BarcodeFormat {
        let lines = self
            .configs
            .get(&ConfigScope::Barcode)
            .and_then(ConfigurationTree::barcode_lines)
            .unwrap_or(1);
        BarcodeFormat::new(self.response_format.encoding, lines)
    }

    /// Answer one request frame. `None` withholds the reply.
    fn handle(&mut self, frame: &Frame) -> Option<Reply> {
        self.requests += 1;
        let request = match Request::decode(frame) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "undecodable request");
                self.last_request = None;
                return Some(Reply::Nack(nak::UNKNOWN_COMMAND));
            }
        };
        let name = request.name();
        self.last_request = Some(name.to_string());

        if self.faults.withhold_next {
            self.faults.withhold_next = false;
            debug!(request = name, "withholding reply");
            return None;
        }
        if let Some(code) = self.faults.nack_next.take() {
            debug!(request = name, code, "scripted NAK");
            return Some(Reply::Nack(code));
        }

        let reply = self.execute(request);
        trace!(request = name, reply = ?reply.kind(), "answered");
        Some(reply)
    }

    fn execute(&mut self, request: Request) -> Reply {
        match request {
            Request::SetConfig(tree) => {
                if let Err(e) = tree.validate() {
                    warn!(error = %e, "rejecting configuration");
                    return Reply::Nack(nak::INVALID_PARAMETER);
                }
                self.configs.insert(tree.scope(), tree);
                Reply::Ack
            }
            Request::GetConfig(scope) => match self.configs.get(&scope) {
                Some(tree) => Reply::with_configuration(tree),
                None => Reply::Nack(nak::INVALID_PARAMETER),
            },
            Request::SaveParams => {
                self.saved_params += 1;
                Reply::Ack
            }
            Request::Buzzer(buzzer) => {
                self.last_buzzer = Some(buzzer);
                Reply::Ack
            }
            Request::Led(led, color) => {
                self.last_led = Some((led, color));
                Reply::Ack
            }
            Request::Init(init) => {
                let reset = ConfigScope::reset_by(init);
                for scope in reset {
                    self.configs
                        .insert(*scope, ConfigurationTree::default_for(*scope));
                }
                if reset.contains(&ConfigScope::Rfid) {
                    self.response_format = ResponseFormat::binary();
                    self.filters.clear();
                    self.buffered.clear();
                    self.rfid_active = false;
                }
                if reset.contains(&ConfigScope::Barcode) {
                    self.reader_open = false;
                }
                Reply::Ack
            }
            Request::OpenReader => {
                self.reader_open = true;
                Reply::Ack
            }
            Request::CloseReader => {
                self.reader_open = false;
                Reply::Ack
            }
            Request::OpenInventory { .. } | Request::OpenRead(_) => {
                self.rfid_active = true;
                Reply::Ack
            }
            Request::CloseInventory => {
                self.rfid_active = false;
                Reply::Ack
            }
            Request::WriteTag(_) | Request::LockTag(_) | Request::KillTag(_) => {
                self.tag_operations += 1;
                Reply::Ack
            }
            Request::SetFilter { filters, .. } => {
                self.filters = filters;
                Reply::Ack
            }
            Request::ClearFilter => {
                self.filters.clear();
                Reply::Ack
            }
            Request::SetResponseFormat(format) => {
                if format.validate().is_err() {
                    return Reply::Nack(nak::INVALID_PARAMETER);
                }
                self.response_format = format;
                Reply::Ack
            }
            Request::GetCount { index } => {
                let count = self.buffered.get(&index).map_or(0, Vec::len);
                Reply::with_count(u32::try_from(count).unwrap_or(u32::MAX))
            }
            Request::PullData { index } => {
                let tags = self.buffered.remove(&index).unwrap_or_default();
                let shaped: Vec<RfidRecord> = tags
                    .iter()
                    .map(|tag| tag.shaped_for(&self.response_format))
                    .collect();
                match Reply::with_tags(&shaped, &self.response_format) {
                    Ok(reply) => reply,
                    Err(e) => {
                        warn!(error = %e, "cannot encode buffered tags");
                        Reply::Nack(nak::ENCODING_FAILED)
                    }
                }
            }
            Request::ClearDoubleReadingBuffer => Reply::Ack,
            Request::SetAutoLinkProfile(enabled) => {
                self.auto_link_profile = enabled;
                Reply::Ack
            }
            Request::GetInfo => Reply::with_identity(&self.identity),
            Request::GetBattery => Reply::with_battery(self.battery),
            Request::GetKeyStatus(key) => Reply::with_key_state(key, self.trigger),
            Request::FirmwareChunk(chunk) => {
                if chunk.offset == 0 {
                    self.firmware.clear();
                    self.firmware_total = chunk.total;
                }
                if chunk.total != self.firmware_total
                    || chunk.offset as usize != self.firmware.len()
                {
                    warn!(
                        offset = chunk.offset,
                        received = self.firmware.len(),
                        "firmware chunk out of sequence"
                    );
                    return Reply::Nack(nak::FIRMWARE_SEQUENCE);
                }
                self.firmware.extend_from_slice(&chunk.data);
                if chunk.is_last() {
                    info!(bytes = self.firmware.len(), "firmware image received");
                }
                Reply::Ack
            }
        }
    }

    /// Frame for a queued event, or `None` when the device would not emit it.
    fn render(&mut self, event: Event) -> Option<Frame> {
        match event {
            Event::Key(state) => {
                self.trigger = state;
                Some(Inbound::key_frame(KeyName::Trigger, state))
            }
            Event::Scan(records) => {
                if !self.reader_open {
                    debug!("barcode reader is closed, dropping scan");
                    return None;
                }
                Inbound::barcode_frame(&records, &self.barcode_format())
                    .map_err(|e| warn!(error = %e, "cannot encode scan"))
                    .ok()
            }
            Event::Tags(tags) => {
                if !self.rfid_active {
                    debug!("inventory is not running, dropping tags");
                    return None;
                }
                let shaped: Vec<RfidRecord> = tags
                    .iter()
                    .map(|tag| tag.shaped_for(&self.response_format))
                    .collect();
                Inbound::rfid_frame(&shaped, &self.response_format)
                    .map_err(|e| warn!(error = %e, "cannot encode tags"))
                    .ok()
            }
            Event::Raw(frame) => Some(frame),
            Event::Disconnect => None,
        }
    }
}

/// Why [`VirtualScanner::serve`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeOutcome {
    /// The host closed its side of the stream.
    HostClosed,
    /// The handle asked the scanner to drop the link.
    Disconnected,
}

/// Scripting side of a [`VirtualScanner`].
#[derive(Debug, Clone)]
pub struct EmulatorHandle {
    device: Arc<Mutex<Device>>,
    events: mpsc::UnboundedSender<Event>,
    snapshot: watch::Receiver<ScannerSnapshot>,
}

impl EmulatorHandle {
    fn queue(&self, event: Event) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| Error::transport("virtual scanner is gone"))
    }

    /// Raise a trigger-pressed key event.
    pub fn press_trigger(&self) -> Result<()> {
        self.queue(Event::Key(KeyState::Pressed))
    }

    pub fn release_trigger(&self) -> Result<()> {
        self.queue(Event::Key(KeyState::Released))
    }

    /// Emit barcode reads, encoded with the configured line count. Dropped
    /// while the reader is closed.
    pub fn scan(&self, records: Vec<BarcodeRecord>) -> Result<()> {
        self.queue(Event::Scan(records))
    }

    /// Emit a tag batch shaped for the negotiated format. Dropped while no
    /// inventory or read is running.
    pub fn report_tags(&self, tags: Vec<RfidRecord>) -> Result<()> {
        self.queue(Event::Tags(tags))
    }

    /// Write a frame verbatim.
    pub fn send_raw(&self, frame: Frame) -> Result<()> {
        self.queue(Event::Raw(frame))
    }

    /// Drop the link after the queued events.
    pub fn disconnect(&self) -> Result<()> {
        self.queue(Event::Disconnect)
    }

    /// Keep tags for `GetCount`/`PullData` under `index`.
    pub fn buffer_tags(&self, index: u16, tags: Vec<RfidRecord>) {
        lock(&self.device)
            .buffered
            .entry(index)
            .or_default()
            .extend(tags);
    }

    /// Answer the next request with `NAK]code`.
    pub fn nack_next(&self, code: u16) {
        lock(&self.device).faults.nack_next = Some(code);
    }

    /// Read the next request but never answer it.
    pub fn withhold_next_reply(&self) {
        lock(&self.device).faults.withhold_next = true;
    }

    /// Wait this long before every reply.
    pub fn set_reply_delay(&self, delay: Duration) {
        lock(&self.device).faults.delay = delay;
    }

    pub fn set_battery(&self, level: BatteryLevel) {
        lock(&self.device).battery = level;
    }

    pub fn configuration(&self, scope: ConfigScope) -> Option<ConfigurationTree> {
        lock(&self.device).configs.get(&scope).cloned()
    }

    /// Firmware bytes received so far.
    pub fn firmware(&self) -> Vec<u8> {
        lock(&self.device).firmware.clone()
    }

    /// State as of the last request or event handled.
    pub fn snapshot(&self) -> ScannerSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Wait until a published snapshot satisfies `predicate`.
    pub async fn wait_for<F>(&self, predicate: F) -> Result<ScannerSnapshot>
    where
        F: FnMut(&ScannerSnapshot) -> bool,
    {
        let mut rx = self.snapshot.clone();
        let snapshot = rx
            .wait_for(predicate)
            .await
            .map_err(|_| Error::transport("virtual scanner is gone"))?;
        Ok(snapshot.clone())
    }
}

/// A scanner accessory simulated in software.
pub struct VirtualScanner {
    device: Arc<Mutex<Device>>,
    events: mpsc::UnboundedReceiver<Event>,
    snapshot: watch::Sender<ScannerSnapshot>,
}

impl VirtualScanner {
    pub fn new(identity: ScannerIdentity) -> (Self, EmulatorHandle) {
        let device = Device::new(identity);
        let (snapshot_tx, snapshot_rx) = watch::channel(device.snapshot());
        let device = Arc::new(Mutex::new(device));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let scanner = Self {
            device: Arc::clone(&device),
            events: events_rx,
            snapshot: snapshot_tx,
        };
        let handle = EmulatorHandle {
            device,
            events: events_tx,
            snapshot: snapshot_rx,
        };
        (scanner, handle)
    }

    /// Identity of a combined 2D and RFID handheld.
    pub fn default_identity() -> ScannerIdentity {
        ScannerIdentity {
            serial_number: "SP1-000001".into(),
            part_number: "SP1-QUB-BT".into(),
            firmware_version: "1.0.0".into(),
            model: "SP1".into(),
            region: "JP".into(),
            scanner_type: ScannerType::TwoDRfid,
        }
    }

    /// Serve one host connection until it closes or the handle disconnects.
    ///
    /// Device state survives across connections.
    ///
    /// # Errors
    /// Stream failures while reading or writing.
    pub async fn serve<S>(&mut self, stream: S) -> Result<ServeOutcome>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut framed = Framed::new(stream, ScannerCodec::new());
        lock(&self.device).connected = true;
        self.publish();
        info!("host connected");

        let outcome = self.pump(&mut framed).await;

        lock(&self.device).connected = false;
        self.publish();
        info!(?outcome, "host link ended");
        outcome
    }

    async fn pump<S>(&mut self, framed: &mut Framed<S, ScannerCodec>) -> Result<ServeOutcome>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            tokio::select! {
                frame = framed.next() => match frame {
                    Some(Ok(frame)) => self.answer(framed, &frame).await?,
                    Some(Err(e)) => return Err(e),
                    None => return Ok(ServeOutcome::HostClosed),
                },
                Some(event) = self.events.recv() => {
                    if matches!(event, Event::Disconnect) {
                        return Ok(ServeOutcome::Disconnected);
                    }
                    self.emit(framed, event).await?;
                }
            }
        }
    }

    async fn answer<S>(&mut self, framed: &mut Framed<S, ScannerCodec>, frame: &Frame) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (reply, delay) = {
            let mut device = lock(&self.device);
            let reply = device.handle(frame);
            (reply, device.faults.delay)
        };
        self.publish();

        let Some(reply) = reply else {
            return Ok(());
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        framed.send(reply.encode()).await
    }

    async fn emit<S>(&mut self, framed: &mut Framed<S, ScannerCodec>, event: Event) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let frame = lock(&self.device).render(event);
        self.publish();
        match frame {
            Some(frame) => framed.send(frame).await,
            None => Ok(()),
        }
    }

    fn publish(&self) {
        let snapshot = lock(&self.device).snapshot();
        self.snapshot.send_replace(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use scanlink_core::InitScope;

    fn device() -> Device {
        Device::new(VirtualScanner::default_identity())
    }

    fn frame(request: Request) -> Frame {
        request.encode().unwrap()
    }

    #[test]
    fn test_unknown_request_is_nacked() {
        let mut device = device();
        let reply = device.handle(&Frame::text("WHAT"));
        assert_eq!(reply, Some(Reply::Nack(nak::UNKNOWN_COMMAND)));
        assert_eq!(device.requests, 1);
    }

    #[test]
    fn test_configuration_is_kept_per_scope() {
        let mut device = device();
        let mut tree = ConfigurationTree::default_for(ConfigScope::Rfid);
        if let ConfigurationTree::Rfid(settings) = &mut tree {
            settings.scan.power_level_read = 120;
        }
        assert_eq!(device.handle(&frame(Request::SetConfig(tree.clone()))), Some(Reply::Ack));

        let reply = device
            .handle(&frame(Request::GetConfig(ConfigScope::Rfid)))
            .unwrap();
        assert_eq!(reply.configuration().unwrap(), tree);

        device.handle(&frame(Request::Init(InitScope::Rfid)));
        assert_eq!(
            device.configs[&ConfigScope::Rfid],
            ConfigurationTree::default_for(ConfigScope::Rfid)
        );
    }

    #[test]
    fn test_faults_apply_once() {
        let mut device = device();
        device.faults.nack_next = Some(0x0105);
        assert_eq!(device.handle(&frame(Request::SaveParams)), Some(Reply::Nack(0x0105)));
        assert_eq!(device.handle(&frame(Request::SaveParams)), Some(Reply::Ack));

        device.faults.withhold_next = true;
        assert_eq!(device.handle(&frame(Request::GetBattery)), None);
        assert!(device.handle(&frame(Request::GetBattery)).is_some());
        assert_eq!(device.saved_params, 1);
    }

    #[rstest]
    #[case(0, 4, Reply::Ack)]
    #[case(4, 4, Reply::Ack)]
    #[case(12, 4, Reply::Nack(nak::FIRMWARE_SEQUENCE))]
    fn test_firmware_sequence(#[case] offset: u32, #[case] len: usize, #[case] expected: Reply) {
        use scanlink_protocol::commands::FirmwareChunk;

        let mut device = device();
        if offset > 0 {
            device.handle(&frame(Request::FirmwareChunk(FirmwareChunk {
                offset: 0,
                total: 16,
                data: vec![0xAA; 4],
            })));
        }
        let reply = device.handle(&frame(Request::FirmwareChunk(FirmwareChunk {
            offset,
            total: 16,
            data: vec![0x55; len],
        })));
        assert_eq!(reply, Some(expected));
    }

    #[test]
    fn test_events_respect_switches() {
        let mut device = device();
        assert!(device.render(Event::Tags(vec![RfidRecord::new(vec![0x30, 0x00])])).is_none());

        device.handle(&frame(Request::OpenInventory { index: None }));
        let frame = device
            .render(Event::Tags(vec![RfidRecord::new(vec![0x30, 0x00])]))
            .unwrap();
        assert!(matches!(Inbound::classify(&frame).unwrap(), Inbound::Rfid { .. }));
    }

    #[tokio::test]
    async fn test_serve_ends_when_host_closes() {
        let (mut scanner, handle) = VirtualScanner::new(VirtualScanner::default_identity());
        let (host, device) = tokio::io::duplex(1024);
        drop(host);
        assert_eq!(scanner.serve(device).await.unwrap(), ServeOutcome::HostClosed);
        assert!(!handle.snapshot().connected);
    }

    #[tokio::test]
    async fn test_disconnect_event_ends_serve() {
        let (mut scanner, handle) = VirtualScanner::new(VirtualScanner::default_identity());
        let (_host, device) = tokio::io::duplex(1024);
        handle.disconnect().unwrap();
        assert_eq!(scanner.serve(device).await.unwrap(), ServeOutcome::Disconnected);
    }
}
