//! Discovery of accessories.
//!
//! A [`SessionRegistry`] turns accessory connection events into
//! `Discovered` sessions, but only inside an accept window opened with
//! [`start_accept`](SessionRegistry::start_accept) and closed with
//! [`end_accept`](SessionRegistry::end_accept). The registry is a plain
//! value with no process-level instance; [`reset`](SessionRegistry::reset)
//! returns it to its initial state.
//!
//! ```
//! use scanlink_session::{ClaimTable, MockAccessory, SessionConfig, SessionRegistry};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let registry = SessionRegistry::new(SessionConfig::default()).with_claims(ClaimTable::new());
//! let (accessory, _handle) = MockAccessory::new("SP1-000001");
//!
//! assert!(registry.accessory_connected(accessory.clone()).is_none());
//!
//! registry.start_accept();
//! let session = registry.accessory_connected(accessory).unwrap();
//! registry.end_accept();
//!
//! assert_eq!(registry.scanners().len(), 1);
//! assert_eq!(registry.scanners()[0].id(), session.id());
//! # }
//! ```

use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use scanlink_core::{ScannerStatus, SessionId};

use crate::accessory::Accessory;
use crate::claim::ClaimTable;
use crate::config::SessionConfig;
use crate::listener::{ErrorSink, ListenerCategory, ListenerId, ListenerSet, TracingErrorSink};
use crate::session::DeviceSession;
use crate::sync::lock;

/// Notified once for every newly discovered accessory.
pub trait AcceptListener<A: Accessory>: Send + Sync + 'static {
    fn on_scanner_appeared(&self, session: &Arc<DeviceSession<A>>) -> anyhow::Result<()>;
}

impl<A, F> AcceptListener<A> for F
where
    A: Accessory,
    F: Fn(&Arc<DeviceSession<A>>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn on_scanner_appeared(&self, session: &Arc<DeviceSession<A>>) -> anyhow::Result<()> {
        self(session)
    }
}

struct Inner<A: Accessory> {
    accepting: bool,
    sessions: Vec<Arc<DeviceSession<A>>>,
}

/// Known sessions plus the accept window.
pub struct SessionRegistry<A: Accessory> {
    config: SessionConfig,
    claims: ClaimTable,
    error_sink: Arc<dyn ErrorSink>,
    inner: Mutex<Inner<A>>,
    accept_listeners: ListenerSet<dyn AcceptListener<A>>,
}

impl<A: Accessory> SessionRegistry<A> {
    /// New registry, not accepting. Sessions it creates use `config`, the
    /// process-wide [`ClaimTable`] and [`TracingErrorSink`].
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            claims: ClaimTable::process(),
            error_sink: Arc::new(TracingErrorSink),
            inner: Mutex::new(Inner {
                accepting: false,
                sessions: Vec::new(),
            }),
            accept_listeners: ListenerSet::new(),
        }
    }

    pub fn with_claims(mut self, claims: ClaimTable) -> Self {
        self.claims = claims;
        self
    }

    /// Sink for failures of accept listeners and of every session created
    /// here.
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = sink;
        self
    }

    pub fn start_accept(&self) {
        lock(&self.inner).accepting = true;
        info!("accept window opened");
    }

    pub fn end_accept(&self) {
        lock(&self.inner).accepting = false;
        info!("accept window closed");
    }

    pub fn is_accepting(&self) -> bool {
        lock(&self.inner).accepting
    }

    /// Report a physical connection event.
    ///
    /// Returns the new `Discovered` session, or `None` when the window is
    /// closed or a live session already covers this accessory. Accept
    /// listeners run once per returned session.
    pub fn accessory_connected(&self, accessory: A) -> Option<Arc<DeviceSession<A>>> {
        let session = {
            let mut inner = lock(&self.inner);
            if !inner.accepting {
                debug!(accessory = accessory.id(), "ignoring accessory outside accept window");
                return None;
            }
            if inner
                .sessions
                .iter()
                .any(|s| s.accessory().id() == accessory.id() && s.status() != ScannerStatus::Closed)
            {
                debug!(accessory = accessory.id(), "accessory already known");
                return None;
            }
            inner
                .sessions
                .retain(|s| s.accessory().id() != accessory.id());

            let session = Arc::new(DeviceSession::from_parts(
                accessory,
                self.config.clone(),
                self.claims.clone(),
                Arc::clone(&self.error_sink),
            ));
            inner.sessions.push(Arc::clone(&session));
            session
        };

        info!(session = %session.id(), accessory = session.accessory().id(), "scanner discovered");
        self.accept_listeners.dispatch(
            ListenerCategory::Accept,
            session.info(),
            &*self.error_sink,
            |listener| listener.on_scanner_appeared(&session),
        );
        Some(session)
    }

    /// Sessions known at call time.
    pub fn scanners(&self) -> Vec<Arc<DeviceSession<A>>> {
        lock(&self.inner).sessions.clone()
    }

    pub fn session(&self, id: SessionId) -> Option<Arc<DeviceSession<A>>> {
        lock(&self.inner)
            .sessions
            .iter()
            .find(|s| s.id() == id)
            .cloned()
    }

    /// Forget closed sessions. Returns how many were removed.
    pub fn prune_closed(&self) -> usize {
        let mut inner = lock(&self.inner);
        let before = inner.sessions.len();
        inner
            .sessions
            .retain(|s| s.status() != ScannerStatus::Closed);
        before - inner.sessions.len()
    }

    pub fn add_accept_status_listener(&self, listener: Arc<dyn AcceptListener<A>>) -> ListenerId {
        self.accept_listeners.register(listener)
    }

    pub fn remove_accept_status_listener(&self, id: ListenerId) -> bool {
        self.accept_listeners.unregister(id)
    }

    /// Close the window, close every session and drop all sessions and
    /// accept listeners.
    pub async fn reset(&self) {
        let sessions = {
            let mut inner = lock(&self.inner);
            inner.accepting = false;
            std::mem::take(&mut inner.sessions)
        };
        for session in &sessions {
            session.close().await;
        }
        self.accept_listeners.clear();
        info!(closed = sessions.len(), "registry reset");
    }
}

impl<A: Accessory> std::fmt::Debug for SessionRegistry<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("SessionRegistry")
            .field("accepting", &inner.accepting)
            .field("sessions", &inner.sessions.len())
            .field("accept_listeners", &self.accept_listeners.len())
            .finish()
    }
}
