//! One host-side session with one accessory.
//!
//! # Architecture
//!
//! A claimed session owns both halves of the accessory's byte stream. The
//! read half belongs to a dispatcher task; the write half is used by the
//! synchronous command path.
//!
//! ```text
//!                    ┌──────────────┐   frames   ┌────────────────┐
//!  accessory ───────►│  dispatcher  │───────────►│ reply waiter   │──► send_command()
//!   (read half)      │  task        │            └────────────────┘
//!                    │              │   events   ┌────────────────┐
//!                    │              │───────────►│ listener sets  │──► key / data / status
//!                    └──────────────┘            └────────────────┘
//!
//!  send_command() ──► command lock ──► write half ──► accessory
//! ```
//!
//! Only one request is in flight at a time: callers queue on a fair lock and
//! are served in arrival order. The protocol has no request ids, so the one
//! pending waiter is the only place a reply can go. A reply that arrives
//! with no waiter breaks the protocol and moves the session to `Unknown`,
//! except inside the late-reply window that follows a timeout, where the
//! abandoned request's answer is expected and discarded. The next request
//! is not written until that answer arrives or the window ends.
//!
//! Listeners run on the dispatcher task, or on the task calling
//! `claim`/`close` for the status changes those cause, never under the
//! command lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use scanlink_core::{
    BatteryLevel, BuzzerType, Error, InitScope, KeyEvent, KeyName, KeyState, LedColor, LedType,
    Result, ScannerIdentity, ScannerStatus, SessionId,
};
use scanlink_protocol::commands::{
    FilterOp, FirmwareChunk, KillRequest, LockRequest, ReadRequest, TagFilter, WriteRequest,
};
use scanlink_protocol::{
    BarcodeFormat, ConfigScope, ConfigurationTree, Frame, Inbound, PayloadEncoding, Reply,
    ReplyKind, Request, ResponseFormat, RfidRecord, ScannerCodec, decode_barcode, decode_rfid,
};

use crate::accessory::Accessory;
use crate::claim::ClaimTable;
use crate::config::SessionConfig;
use crate::listener::{
    DataListener, ErrorSink, KeyListener, ListenerCategory, ListenerId, ListenerSet, SessionInfo,
    StatusListener, TracingErrorSink,
};
use crate::state::{SessionStateMachine, StateTransition};
use crate::sync::lock;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type Writer = FramedWrite<BoxedWriter, ScannerCodec>;

struct Waiter {
    request: &'static str,
    expects: ReplyKind,
    tx: oneshot::Sender<Result<Reply>>,
}

/// A request that timed out; its reply may still arrive.
struct Abandoned {
    request: &'static str,
    until: Instant,
    settled: oneshot::Sender<()>,
}

/// Host side of an [`Abandoned`] request.
struct Settling {
    until: Instant,
    rx: oneshot::Receiver<()>,
}

#[derive(Default)]
struct Pending {
    waiter: Option<Waiter>,
    abandoned: Option<Abandoned>,
}

impl Pending {
    fn fail(&mut self, error: Error) {
        if let Some(waiter) = self.waiter.take() {
            let _ = waiter.tx.send(Err(error));
        }
    }
}

/// How inbound data frames are decoded.
#[derive(Debug, Clone, Copy)]
struct Formats {
    rfid: ResponseFormat,
    barcode_lines: usize,
}

impl Default for Formats {
    fn default() -> Self {
        Self {
            rfid: ResponseFormat::binary(),
            barcode_lines: 1,
        }
    }
}

/// State shared with the dispatcher task.
struct Shared {
    info: SessionInfo,
    state: Mutex<SessionStateMachine>,
    pending: Mutex<Pending>,
    formats: Mutex<Formats>,
    status_listeners: ListenerSet<dyn StatusListener>,
    key_listeners: ListenerSet<dyn KeyListener>,
    data_listeners: ListenerSet<dyn DataListener>,
    error_sink: Arc<dyn ErrorSink>,
}

impl Shared {
    fn status(&self) -> ScannerStatus {
        lock(&self.state).current()
    }

    /// Transition and notify. Returns `false` when the step is not allowed
    /// from the current state.
    fn set_status(&self, to: ScannerStatus) -> bool {
        let moved = self.transition(to);
        if moved {
            self.notify_status(to);
        }
        moved
    }

    /// Transition without notifying listeners.
    fn transition(&self, to: ScannerStatus) -> bool {
        match lock(&self.state).transition_to(to) {
            Ok(transition) => {
                info!(
                    session = %self.info.id,
                    accessory = %self.info.accessory,
                    from = %transition.from,
                    to = %transition.to,
                    "status changed"
                );
                true
            }
            Err(_) => false,
        }
    }

    fn notify_status(&self, status: ScannerStatus) {
        self.status_listeners.dispatch(
            ListenerCategory::Status,
            &self.info,
            &*self.error_sink,
            |listener| listener.on_status_changed(&self.info, status),
        );
    }

    /// The link can no longer be trusted.
    ///
    /// The status moves under the pending lock, before the pending caller
    /// is failed, so no new waiter can be installed in between.
    fn violation(&self, message: String) {
        error!(session = %self.info.id, %message, "protocol invariant violated");
        let (moved, waiter) = {
            let mut pending = lock(&self.pending);
            (self.transition(ScannerStatus::Unknown), pending.waiter.take())
        };
        if moved {
            self.notify_status(ScannerStatus::Unknown);
        }
        if let Some(waiter) = waiter {
            let _ = waiter.tx.send(Err(Error::protocol(message)));
        }
    }

    /// The accessory went away without `close()`.
    fn disconnected(&self, reason: &str) {
        warn!(session = %self.info.id, accessory = %self.info.accessory, reason, "accessory disconnected");
        let (moved, waiter) = {
            let mut pending = lock(&self.pending);
            let moved = self.status() == ScannerStatus::Claimed
                && self.transition(ScannerStatus::CloseWait);
            (moved, pending.waiter.take())
        };
        if moved {
            self.notify_status(ScannerStatus::CloseWait);
        }
        if let Some(waiter) = waiter {
            let _ = waiter.tx.send(Err(Error::disconnected(self.info.accessory.clone())));
        }
    }

    /// Returns `false` when the dispatcher must stop.
    fn handle_frame(&self, frame: Frame) -> bool {
        trace!(session = %self.info.id, kind = ?frame.kind(), len = frame.payload().len(), "frame received");
        let inbound = match Inbound::classify(&frame) {
            Ok(inbound) => inbound,
            Err(e) => {
                self.violation(e.to_string());
                return false;
            }
        };

        match inbound {
            Inbound::Reply(reply) => self.correlate(reply),
            Inbound::Key { key, state } => {
                let event = KeyEvent::new(key, state);
                debug!(session = %self.info.id, ?key, ?state, "key event");
                self.key_listeners.dispatch(
                    ListenerCategory::Key,
                    &self.info,
                    &*self.error_sink,
                    |listener| listener.on_key_status_changed(&self.info, &event),
                );
                true
            }
            Inbound::Barcode { body, encoding } => {
                let lines = lock(&self.formats).barcode_lines;
                match decode_barcode(&body, &BarcodeFormat::new(encoding, lines)) {
                    Ok(records) => {
                        self.data_listeners.dispatch(
                            ListenerCategory::Data,
                            &self.info,
                            &*self.error_sink,
                            |listener| listener.on_barcode_data_received(&self.info, &records),
                        );
                        true
                    }
                    Err(e @ Error::Sequence { .. }) => {
                        warn!(session = %self.info.id, error = %e, "dropped barcode read");
                        true
                    }
                    Err(e) => {
                        self.violation(format!("undecodable barcode event: {e}"));
                        false
                    }
                }
            }
            Inbound::Rfid { body, encoding } => {
                let format = lock(&self.formats).rfid;
                if encoding != format.encoding {
                    self.violation(format!(
                        "tag event in {encoding:?} encoding, negotiated {:?}",
                        format.encoding
                    ));
                    return false;
                }
                match decode_rfid(&body, &format) {
                    Ok(records) if records.is_empty() => true,
                    Ok(records) => {
                        self.data_listeners.dispatch(
                            ListenerCategory::Data,
                            &self.info,
                            &*self.error_sink,
                            |listener| listener.on_rfid_data_received(&self.info, &records),
                        );
                        true
                    }
                    Err(e) => {
                        self.violation(format!("undecodable tag event: {e}"));
                        false
                    }
                }
            }
        }
    }

    fn correlate(&self, reply: Reply) -> bool {
        let mut pending = lock(&self.pending);
        if let Some(abandoned) = pending.abandoned.take() {
            if Instant::now() <= abandoned.until {
                warn!(
                    session = %self.info.id,
                    request = abandoned.request,
                    reply = ?reply.kind(),
                    "discarding late reply"
                );
                let _ = abandoned.settled.send(());
                return true;
            }
        }

        let Some(waiter) = pending.waiter.take() else {
            drop(pending);
            self.violation(format!("unsolicited {:?} reply", reply.kind()));
            return false;
        };
        drop(pending);

        if reply.answers(waiter.expects) {
            trace!(session = %self.info.id, request = waiter.request, reply = ?reply.kind(), "reply correlated");
            let _ = waiter.tx.send(Ok(reply));
            true
        } else {
            let message = format!(
                "{} expects {:?}, device answered {:?}",
                waiter.request,
                waiter.expects,
                reply.kind()
            );
            let error = Error::protocol(message.clone());
            self.violation(message);
            let _ = waiter.tx.send(Err(error));
            false
        }
    }
}

async fn run_dispatcher(
    shared: Arc<Shared>,
    mut reader: FramedRead<BoxedReader, ScannerCodec>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = reader.next() => next,
        };
        match next {
            Some(Ok(frame)) => {
                if !shared.handle_frame(frame) {
                    break;
                }
            }
            Some(Err(e)) if e.is_transport() => {
                shared.disconnected(&e.to_string());
                break;
            }
            Some(Err(e)) => {
                shared.violation(e.to_string());
                break;
            }
            None => {
                shared.disconnected("end of stream");
                break;
            }
        }
    }
    debug!(session = %shared.info.id, "dispatcher stopped");
}

struct Dispatcher {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Device session over one accessory.
///
/// # Examples
///
/// ```no_run
/// use scanlink_core::BuzzerType;
/// use scanlink_session::{DeviceSession, TcpAccessory, TcpAccessoryConfig};
///
/// # async fn example() -> scanlink_core::Result<()> {
/// let accessory = TcpAccessory::new(TcpAccessoryConfig::default());
/// let session = DeviceSession::builder(accessory).build()?;
///
/// session.claim().await?;
/// session.buzzer(BuzzerType::B1).await?;
/// let identity = session.query_identity().await?;
/// println!("connected to {}", identity.serial_number);
/// session.close().await;
/// # Ok(())
/// # }
/// ```
pub struct DeviceSession<A: Accessory> {
    accessory: A,
    shared: Arc<Shared>,
    claims: ClaimTable,
    config: SessionConfig,
    /// Serializes `claim` and `close`.
    lifecycle: AsyncMutex<Option<Dispatcher>>,
    /// Serializes synchronous requests. Tokio mutexes are fair, so waiters
    /// are served in arrival order.
    command_lock: AsyncMutex<()>,
    writer: AsyncMutex<Option<Writer>>,
    identity: Mutex<Option<ScannerIdentity>>,
    applied: Mutex<HashMap<ConfigScope, ConfigurationTree>>,
    claimed_at: Mutex<Option<DateTime<Utc>>>,
    settling: Mutex<Option<Settling>>,
}

impl<A: Accessory> DeviceSession<A> {
    /// New `Discovered` session with default configuration.
    pub fn new(accessory: A) -> Self {
        Self::from_parts(
            accessory,
            SessionConfig::default(),
            ClaimTable::process(),
            Arc::new(TracingErrorSink),
        )
    }

    pub fn builder(accessory: A) -> SessionBuilder<A> {
        SessionBuilder::new(accessory)
    }

    pub(crate) fn from_parts(
        accessory: A,
        config: SessionConfig,
        claims: ClaimTable,
        error_sink: Arc<dyn ErrorSink>,
    ) -> Self {
        let info = SessionInfo {
            id: SessionId::new(),
            accessory: accessory.id().to_string(),
        };
        Self {
            accessory,
            shared: Arc::new(Shared {
                info,
                state: Mutex::new(SessionStateMachine::new()),
                pending: Mutex::new(Pending::default()),
                formats: Mutex::new(Formats::default()),
                status_listeners: ListenerSet::new(),
                key_listeners: ListenerSet::new(),
                data_listeners: ListenerSet::new(),
                error_sink,
            }),
            claims,
            config,
            lifecycle: AsyncMutex::new(None),
            command_lock: AsyncMutex::new(()),
            writer: AsyncMutex::new(None),
            identity: Mutex::new(None),
            applied: Mutex::new(HashMap::new()),
            claimed_at: Mutex::new(None),
            settling: Mutex::new(None),
        }
    }

    pub fn id(&self) -> SessionId {
        self.shared.info.id
    }

    pub fn info(&self) -> &SessionInfo {
        &self.shared.info
    }

    pub fn accessory(&self) -> &A {
        &self.accessory
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn status(&self) -> ScannerStatus {
        self.shared.status()
    }

    /// Transitions so far, oldest first.
    pub fn history(&self) -> Vec<StateTransition> {
        lock(&self.shared.state).history()
    }

    /// When the current claim was taken.
    pub fn claimed_at(&self) -> Option<DateTime<Utc>> {
        *lock(&self.claimed_at)
    }

    /// Take exclusive ownership of the accessory and start the dispatcher.
    ///
    /// Claiming an already claimed session is a no-op. A closed session can
    /// be claimed again.
    ///
    /// # Errors
    /// - `AlreadyClaimed` when another session owns the accessory.
    /// - `Transport` when the channel cannot be opened.
    /// - `InvalidStateTransition` from `CloseWait` or `Unknown`; call
    ///   `close()` first.
    pub async fn claim(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        match self.status() {
            ScannerStatus::Claimed => return Ok(()),
            ScannerStatus::Discovered | ScannerStatus::Closed => {}
            other => {
                return Err(Error::InvalidStateTransition {
                    from: other.to_string(),
                    to: ScannerStatus::Claimed.to_string(),
                });
            }
        }

        let accessory_id = self.accessory.id();
        self.claims.try_claim(accessory_id, self.id())?;
        let stream = match self.accessory.open().await {
            Ok(stream) => stream,
            Err(e) => {
                self.claims.release(accessory_id, self.id());
                warn!(session = %self.id(), accessory = accessory_id, error = %e, "claim failed");
                return Err(e);
            }
        };

        let (read, write) = tokio::io::split(stream);
        let reader = FramedRead::new(
            Box::new(read) as BoxedReader,
            ScannerCodec::with_max_frame_size(self.config.max_frame_size),
        );
        *self.writer.lock().await = Some(FramedWrite::new(
            Box::new(write) as BoxedWriter,
            ScannerCodec::with_max_frame_size(self.config.max_frame_size),
        ));

        *lock(&self.shared.pending) = Pending::default();
        *lock(&self.settling) = None;
        *lock(&self.shared.formats) = Formats {
            rfid: ResponseFormat::binary(),
            barcode_lines: self.barcode_lines(),
        };
        *lock(&self.identity) = None;
        *lock(&self.claimed_at) = Some(Utc::now());

        // Status listeners see Claimed before any event the dispatcher raises.
        self.shared.set_status(ScannerStatus::Claimed);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_dispatcher(
            Arc::clone(&self.shared),
            reader,
            cancel.clone(),
        ));
        *lifecycle = Some(Dispatcher { cancel, task });
        info!(session = %self.id(), accessory = accessory_id, "claimed");
        Ok(())
    }

    /// Release the accessory. Closing a session that holds no claim is a
    /// no-op.
    pub async fn close(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if matches!(
            self.status(),
            ScannerStatus::Discovered | ScannerStatus::Closed
        ) {
            return;
        }

        if let Some(dispatcher) = lifecycle.take() {
            dispatcher.cancel.cancel();
            if let Err(e) = dispatcher.task.await {
                error!(session = %self.id(), error = %e, "dispatcher task failed");
            }
        }
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.close().await {
                debug!(session = %self.id(), error = %e, "error shutting down link");
            }
        }
        {
            let mut pending = lock(&self.shared.pending);
            pending.fail(Error::disconnected(self.shared.info.accessory.clone()));
            pending.abandoned = None;
        }
        *lock(&self.settling) = None;
        self.claims.release(self.accessory.id(), self.id());
        *lock(&self.claimed_at) = None;
        self.shared.set_status(ScannerStatus::Closed);
        info!(session = %self.id(), accessory = self.accessory.id(), "closed");
    }

    /// Send one request and wait for its reply.
    ///
    /// A `Nack` is returned as a reply; [`Reply::ok`] turns it into
    /// `DeviceRejected`.
    ///
    /// # Errors
    /// - `NotClaimed` before `claim()` or after `close()`.
    /// - `DeviceDisconnected` in `CloseWait`, or when the link drops while
    ///   waiting.
    /// - `Protocol` in `Unknown`, or when the reply has the wrong shape.
    /// - `Validation`/`Encoding` for a request that cannot be encoded.
    /// - `Timeout` when no reply arrives in time.
    pub async fn send_command(&self, request: Request) -> Result<Reply> {
        let outcome = {
            let _serial = self.command_lock.lock().await;
            self.round_trip(&request).await
        };
        if let Err(e @ Error::Transport { .. }) = &outcome {
            self.shared.disconnected(&e.to_string());
        }
        outcome
    }

    fn ensure_claimed(&self) -> Result<()> {
        match self.status() {
            ScannerStatus::Claimed => Ok(()),
            ScannerStatus::Discovered | ScannerStatus::Closed => Err(Error::NotClaimed),
            ScannerStatus::CloseWait => Err(Error::disconnected(self.accessory.id())),
            ScannerStatus::Unknown => Err(Error::protocol(
                "session is in Unknown state; only close() is accepted",
            )),
        }
    }

    async fn round_trip(&self, request: &Request) -> Result<Reply> {
        self.ensure_claimed()?;
        self.settle_abandoned().await;
        let frame = request.encode()?;
        let name = request.name();

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = lock(&self.shared.pending);
            // Link loss moves the status under this lock.
            self.ensure_claimed()?;
            pending.waiter = Some(Waiter {
                request: name,
                expects: request.expects(),
                tx,
            });
        }

        debug!(session = %self.id(), request = name, "sending request");
        if let Err(e) = self.write(frame).await {
            lock(&self.shared.pending).waiter = None;
            return Err(e);
        }

        let budget = self.config.command_timeout() + request.device_timeout();
        match tokio::time::timeout(budget, rx).await {
            Ok(Ok(result)) => {
                let reply = result?;
                debug!(session = %self.id(), request = name, reply = ?reply.kind(), "request completed");
                Ok(reply)
            }
            Ok(Err(_)) => Err(Error::disconnected(self.accessory.id())),
            Err(_) => {
                let mut pending = lock(&self.shared.pending);
                // A waiter already taken means the reply raced the deadline.
                if pending.waiter.take().is_some() {
                    let until = Instant::now() + self.config.late_reply_window();
                    let (settled, rx) = oneshot::channel();
                    pending.abandoned = Some(Abandoned {
                        request: name,
                        until,
                        settled,
                    });
                    *lock(&self.settling) = Some(Settling { until, rx });
                }
                drop(pending);
                let duration_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
                warn!(session = %self.id(), request = name, duration_ms, "request timed out");
                Err(Error::timeout(duration_ms))
            }
        }
    }

    /// Wait for the reply of a timed-out request, or for its window to end.
    async fn settle_abandoned(&self) {
        let Some(settling) = lock(&self.settling).take() else {
            return;
        };
        let deadline = tokio::time::Instant::from_std(settling.until);
        if tokio::time::timeout_at(deadline, settling.rx).await.is_err() {
            debug!(session = %self.id(), "late reply window elapsed");
        }
        lock(&self.shared.pending).abandoned = None;
    }

    async fn write(&self, frame: Frame) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let Some(writer) = writer.as_mut() else {
            return Err(Error::NotClaimed);
        };
        trace!(session = %self.id(), kind = ?frame.kind(), len = frame.payload().len(), "frame sent");
        writer.send(frame).await.map_err(|e| match e {
            Error::Io(io) => Error::transport(format!("{}: write failed: {io}", self.accessory.id())),
            other => other,
        })
    }

    async fn expect_ack(&self, request: Request) -> Result<()> {
        self.send_command(request).await?.ok()?;
        Ok(())
    }

    // Configuration

    /// Apply `tree` and wait for the device to acknowledge it.
    ///
    /// # Errors
    /// `Validation` before anything is sent, `DeviceRejected` on a `Nack`.
    pub async fn set_configuration(&self, tree: &ConfigurationTree) -> Result<()> {
        tree.validate()?;
        self.expect_ack(Request::SetConfig(tree.clone())).await?;
        self.remember(tree.clone());
        Ok(())
    }

    /// Read the configuration of one scope from the device.
    pub async fn get_configuration(&self, scope: ConfigScope) -> Result<ConfigurationTree> {
        let reply = self.send_command(Request::GetConfig(scope)).await?.ok()?;
        let tree = reply.configuration()?;
        if tree.scope() != scope {
            return Err(Error::malformed(format!(
                "asked for {} configuration, got {}",
                scope.code(),
                tree.scope().code()
            )));
        }
        self.remember(tree.clone());
        Ok(tree)
    }

    /// The last tree applied or read for `scope` on this session.
    pub fn applied_configuration(&self, scope: ConfigScope) -> Option<ConfigurationTree> {
        lock(&self.applied).get(&scope).cloned()
    }

    fn remember(&self, tree: ConfigurationTree) {
        if let Some(lines) = tree.barcode_lines() {
            lock(&self.shared.formats).barcode_lines = lines;
        }
        lock(&self.applied).insert(tree.scope(), tree);
    }

    fn barcode_lines(&self) -> usize {
        lock(&self.applied)
            .get(&ConfigScope::Barcode)
            .and_then(ConfigurationTree::barcode_lines)
            .unwrap_or(1)
    }

    pub async fn save_params(&self) -> Result<()> {
        self.expect_ack(Request::SaveParams).await
    }

    /// Reset a subsystem. Trees this session remembers for the affected
    /// scopes are forgotten, and an RFID reset returns tag payloads to the
    /// default format.
    pub async fn init(&self, scope: InitScope) -> Result<()> {
        self.expect_ack(Request::Init(scope)).await?;
        let reset = ConfigScope::reset_by(scope);
        {
            let mut applied = lock(&self.applied);
            for scope in reset {
                applied.remove(scope);
            }
        }
        let mut formats = lock(&self.shared.formats);
        if reset.contains(&ConfigScope::Barcode) {
            formats.barcode_lines = 1;
        }
        if reset.contains(&ConfigScope::Rfid) {
            formats.rfid = ResponseFormat::binary();
        }
        Ok(())
    }

    // Indicators

    pub async fn buzzer(&self, buzzer: BuzzerType) -> Result<()> {
        self.expect_ack(Request::Buzzer(buzzer)).await
    }

    pub async fn led(&self, led: LedType, color: LedColor) -> Result<()> {
        self.expect_ack(Request::Led(led, color)).await
    }

    // Barcode

    pub async fn open_reader(&self) -> Result<()> {
        self.expect_ack(Request::OpenReader).await
    }

    pub async fn close_reader(&self) -> Result<()> {
        self.expect_ack(Request::CloseReader).await
    }

    // RFID

    /// Start inventory. Tags arrive through the data listeners.
    pub async fn open_inventory(&self, index: Option<u16>) -> Result<()> {
        self.expect_ack(Request::OpenInventory { index }).await
    }

    pub async fn close_inventory(&self) -> Result<()> {
        self.expect_ack(Request::CloseInventory).await
    }

    /// Start reading a memory bank. Results arrive through the data
    /// listeners.
    pub async fn open_read(&self, read: ReadRequest) -> Result<()> {
        self.expect_ack(Request::OpenRead(read)).await
    }

    pub async fn write_tag(&self, write: WriteRequest) -> Result<()> {
        self.expect_ack(Request::WriteTag(write)).await
    }

    pub async fn lock_tag(&self, lock_request: LockRequest) -> Result<()> {
        self.expect_ack(Request::LockTag(lock_request)).await
    }

    pub async fn kill_tag(&self, kill: KillRequest) -> Result<()> {
        self.expect_ack(Request::KillTag(kill)).await
    }

    pub async fn set_filter(&self, filters: Vec<TagFilter>, op: FilterOp) -> Result<()> {
        self.expect_ack(Request::SetFilter { filters, op }).await
    }

    pub async fn clear_filter(&self) -> Result<()> {
        self.expect_ack(Request::ClearFilter).await
    }

    /// Negotiate the tag payload shape. Tag events are decoded with the new
    /// format once the device acknowledges it.
    pub async fn set_response_format(&self, format: ResponseFormat) -> Result<()> {
        format.validate()?;
        self.expect_ack(Request::SetResponseFormat(format)).await?;
        lock(&self.shared.formats).rfid = format;
        Ok(())
    }

    pub fn response_format(&self) -> ResponseFormat {
        lock(&self.shared.formats).rfid
    }

    /// Tags buffered on the device under `index`.
    pub async fn get_count(&self, index: u16) -> Result<u32> {
        self.send_command(Request::GetCount { index })
            .await?
            .ok()?
            .count()
    }

    /// Fetch the tags buffered under `index`.
    pub async fn pull_data(&self, index: u16) -> Result<Vec<RfidRecord>> {
        let reply = self.send_command(Request::PullData { index }).await?.ok()?;
        let format = self.response_format();
        let binary = matches!(reply, Reply::DataPayload { binary: true, .. });
        if binary != (format.encoding == PayloadEncoding::Binary) {
            return Err(Error::protocol(format!(
                "buffered tags do not match the negotiated {:?} encoding",
                format.encoding
            )));
        }
        decode_rfid(reply.payload()?, &format)
    }

    pub async fn clear_double_reading_buffer(&self) -> Result<()> {
        self.expect_ack(Request::ClearDoubleReadingBuffer).await
    }

    pub async fn set_auto_link_profile(&self, enabled: bool) -> Result<()> {
        self.expect_ack(Request::SetAutoLinkProfile(enabled)).await
    }

    // Device information

    /// Identity of the accessory, cached until the next claim.
    pub async fn query_identity(&self) -> Result<ScannerIdentity> {
        if let Some(identity) = lock(&self.identity).clone() {
            return Ok(identity);
        }
        let identity = self.send_command(Request::GetInfo).await?.ok()?.identity()?;
        *lock(&self.identity) = Some(identity.clone());
        Ok(identity)
    }

    pub async fn battery_level(&self) -> Result<BatteryLevel> {
        self.send_command(Request::GetBattery).await?.ok()?.battery()
    }

    pub async fn key_status(&self, key: KeyName) -> Result<KeyState> {
        let (reported, state) = self
            .send_command(Request::GetKeyStatus(key))
            .await?
            .ok()?
            .key_state()?;
        if reported != key {
            return Err(Error::malformed(format!(
                "asked for {key:?} status, got {reported:?}"
            )));
        }
        Ok(state)
    }

    /// Stream a firmware image of `total` bytes to the device.
    ///
    /// Every chunk is acknowledged before the next is sent. Returns the
    /// number of chunks written.
    ///
    /// # Errors
    /// `Encoding` when the image is empty or its length differs from
    /// `total`; `Io` when reading the image fails.
    pub async fn upgrade_firmware<R>(&self, mut image: R, total: u32) -> Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        if total == 0 {
            return Err(Error::encoding("firmware image is empty"));
        }
        let chunk_size = self.config.firmware_chunk_size;
        let mut offset: u32 = 0;
        let mut chunks = 0;
        loop {
            let mut data = vec![0u8; chunk_size];
            let mut filled = 0;
            while filled < chunk_size {
                let n = image.read(&mut data[filled..]).await?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            if filled == 0 {
                break;
            }
            data.truncate(filled);

            let len = u32::try_from(filled)
                .map_err(|_| Error::encoding("firmware chunk too large"))?;
            let chunk = FirmwareChunk {
                offset,
                total,
                data,
            };
            self.expect_ack(Request::FirmwareChunk(chunk)).await?;
            offset = offset.saturating_add(len);
            chunks += 1;
            debug!(session = %self.id(), offset, total, "firmware chunk acknowledged");
        }

        if offset != total {
            return Err(Error::encoding(format!(
                "firmware image ended at {offset} bytes, expected {total}"
            )));
        }
        info!(session = %self.id(), total, chunks, "firmware upgrade sent");
        Ok(chunks)
    }

    // Listeners

    pub fn register_status_listener(&self, listener: Arc<dyn StatusListener>) -> ListenerId {
        self.shared.status_listeners.register(listener)
    }

    pub fn unregister_status_listener(&self, id: ListenerId) -> bool {
        self.shared.status_listeners.unregister(id)
    }

    pub fn register_key_listener(&self, listener: Arc<dyn KeyListener>) -> ListenerId {
        self.shared.key_listeners.register(listener)
    }

    pub fn unregister_key_listener(&self, id: ListenerId) -> bool {
        self.shared.key_listeners.unregister(id)
    }

    pub fn register_data_listener(&self, listener: Arc<dyn DataListener>) -> ListenerId {
        self.shared.data_listeners.register(listener)
    }

    pub fn unregister_data_listener(&self, id: ListenerId) -> bool {
        self.shared.data_listeners.unregister(id)
    }
}

impl<A: Accessory> Drop for DeviceSession<A> {
    fn drop(&mut self) {
        if let Some(dispatcher) = self.lifecycle.get_mut().take() {
            dispatcher.cancel.cancel();
        }
        self.claims.release(self.accessory.id(), self.shared.info.id);
    }
}

impl<A: Accessory> std::fmt::Debug for DeviceSession<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("id", &self.shared.info.id)
            .field("accessory", &self.shared.info.accessory)
            .field("status", &self.status())
            .finish()
    }
}

/// Builder for [`DeviceSession`].
pub struct SessionBuilder<A: Accessory> {
    accessory: A,
    config: SessionConfig,
    claims: Option<ClaimTable>,
    error_sink: Option<Arc<dyn ErrorSink>>,
}

impl<A: Accessory> SessionBuilder<A> {
    fn new(accessory: A) -> Self {
        Self {
            accessory,
            config: SessionConfig::default(),
            claims: None,
            error_sink: None,
        }
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Shorthand for a config with a different command timeout.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Claim table to compete in. Defaults to [`ClaimTable::process`].
    pub fn claims(mut self, claims: ClaimTable) -> Self {
        self.claims = Some(claims);
        self
    }

    /// Where listener failures are reported. Defaults to
    /// [`TracingErrorSink`].
    pub fn error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = Some(sink);
        self
    }

    /// # Errors
    /// `Config` when the configuration is invalid.
    pub fn build(self) -> Result<DeviceSession<A>> {
        self.config.validate()?;
        Ok(DeviceSession::from_parts(
            self.accessory,
            self.config,
            self.claims.unwrap_or_else(ClaimTable::process),
            self.error_sink.unwrap_or_else(|| Arc::new(TracingErrorSink)),
        ))
    }
}
