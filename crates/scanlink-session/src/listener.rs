//! Listener registries and failure isolation.
//!
//! Each event category has its own [`ListenerSet`]. Dispatch walks a
//! snapshot of the set in registration order; a listener that returns an
//! error or panics is reported to the session's [`ErrorSink`] and the walk
//! continues with the next listener.
//!
//! Closures implement the single-method listener traits directly:
//!
//! ```
//! use scanlink_core::ScannerStatus;
//! use scanlink_session::listener::{ListenerSet, SessionInfo, StatusListener};
//! use std::sync::Arc;
//!
//! let set: ListenerSet<dyn StatusListener> = ListenerSet::new();
//! set.register(Arc::new(|_: &SessionInfo, status: ScannerStatus| -> anyhow::Result<()> {
//!     println!("now {status}");
//!     Ok(())
//! }));
//! assert_eq!(set.len(), 1);
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::error;

use scanlink_core::{KeyEvent, ScannerStatus, SessionId};
use scanlink_protocol::{BarcodeRecord, RfidRecord};

use crate::sync::lock;

/// Identity of the session an event belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionInfo {
    pub id: SessionId,
    pub accessory: String,
}

impl fmt::Display for SessionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.accessory)
    }
}

pub trait StatusListener: Send + Sync + 'static {
    fn on_status_changed(&self, session: &SessionInfo, status: ScannerStatus) -> anyhow::Result<()>;
}

impl<F> StatusListener for F
where
    F: Fn(&SessionInfo, ScannerStatus) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn on_status_changed(&self, session: &SessionInfo, status: ScannerStatus) -> anyhow::Result<()> {
        self(session, status)
    }
}

pub trait KeyListener: Send + Sync + 'static {
    fn on_key_status_changed(&self, session: &SessionInfo, event: &KeyEvent) -> anyhow::Result<()>;
}

impl<F> KeyListener for F
where
    F: Fn(&SessionInfo, &KeyEvent) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn on_key_status_changed(&self, session: &SessionInfo, event: &KeyEvent) -> anyhow::Result<()> {
        self(session, event)
    }
}

/// Receives decoded scan data. Both methods default to ignoring the event.
pub trait DataListener: Send + Sync + 'static {
    fn on_barcode_data_received(
        &self,
        _session: &SessionInfo,
        _records: &[BarcodeRecord],
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_rfid_data_received(
        &self,
        _session: &SessionInfo,
        _records: &[RfidRecord],
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// [`DataListener`] that only handles barcode reads.
pub struct OnBarcode<F>(pub F);

impl<F> DataListener for OnBarcode<F>
where
    F: Fn(&SessionInfo, &[BarcodeRecord]) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn on_barcode_data_received(
        &self,
        session: &SessionInfo,
        records: &[BarcodeRecord],
    ) -> anyhow::Result<()> {
        (self.0)(session, records)
    }
}

/// [`DataListener`] that only handles tag data.
pub struct OnRfid<F>(pub F);

impl<F> DataListener for OnRfid<F>
where
    F: Fn(&SessionInfo, &[RfidRecord]) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn on_rfid_data_received(
        &self,
        session: &SessionInfo,
        records: &[RfidRecord],
    ) -> anyhow::Result<()> {
        (self.0)(session, records)
    }
}

/// Handle returned by `register`, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerCategory {
    Status,
    Key,
    Data,
    Accept,
}

impl fmt::Display for ListenerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ListenerCategory::Status => "status",
            ListenerCategory::Key => "key",
            ListenerCategory::Data => "data",
            ListenerCategory::Accept => "accept",
        };
        f.write_str(name)
    }
}

/// A listener that failed during dispatch.
#[derive(Debug)]
pub struct ListenerFailure {
    pub session: SessionInfo,
    pub category: ListenerCategory,
    pub listener: ListenerId,
    pub error: anyhow::Error,
}

/// Where listener failures go instead of back to the event producer.
pub trait ErrorSink: Send + Sync + 'static {
    fn report(&self, failure: ListenerFailure);
}

/// Logs failures with `tracing::error!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, failure: ListenerFailure) {
        error!(
            session = %failure.session.id,
            accessory = %failure.session.accessory,
            listener = %failure.category,
            id = %failure.listener,
            error = %failure.error,
            "listener failed"
        );
    }
}

/// Ordered set of listeners of one category.
pub struct ListenerSet<L: ?Sized> {
    entries: Mutex<Vec<(ListenerId, Arc<L>)>>,
}

impl<L: ?Sized> ListenerSet<L> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn register(&self, listener: Arc<L>) -> ListenerId {
        let id = ListenerId::next();
        lock(&self.entries).push((id, listener));
        id
    }

    /// Returns `false` when `id` was not registered here.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    /// Call every listener in registration order.
    ///
    /// The set is not locked while listeners run, so a listener may register
    /// or unregister others; changes apply from the next dispatch. Returns
    /// the number of listeners that failed.
    pub fn dispatch<F>(
        &self,
        category: ListenerCategory,
        session: &SessionInfo,
        sink: &dyn ErrorSink,
        mut call: F,
    ) -> usize
    where
        F: FnMut(&L) -> anyhow::Result<()>,
    {
        let snapshot: Vec<(ListenerId, Arc<L>)> = lock(&self.entries).clone();
        let mut failures = 0;
        for (id, listener) in snapshot {
            let outcome = match catch_unwind(AssertUnwindSafe(|| call(&*listener))) {
                Ok(result) => result,
                Err(panic) => Err(anyhow::anyhow!("listener panicked: {}", panic_message(&*panic))),
            };
            if let Err(error) = outcome {
                failures += 1;
                sink.report(ListenerFailure {
                    session: session.clone(),
                    category,
                    listener: id,
                    error,
                });
            }
        }
        failures
    }
}

impl<L: ?Sized> Default for ListenerSet<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ?Sized> fmt::Debug for ListenerSet<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet").field("len", &self.len()).finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
