//! Shared helpers for session integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use scanlink_core::ScannerStatus;
use scanlink_emulator::{EmulatorHandle, VirtualScanner};
use scanlink_session::listener::{ListenerCategory, SessionInfo};
use scanlink_session::{
    ClaimTable, DeviceSession, ErrorSink, ListenerFailure, MockAccessory, MockAccessoryHandle,
    SessionConfig,
};

/// Route `tracing` output to the test harness; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Error sink that keeps every failure.
#[derive(Default)]
pub struct CollectingSink(Mutex<Vec<(ListenerCategory, String)>>);

impl CollectingSink {
    pub fn failures(&self) -> Vec<(ListenerCategory, String)> {
        self.0.lock().unwrap().clone()
    }
}

impl ErrorSink for CollectingSink {
    fn report(&self, failure: ListenerFailure) {
        self.0
            .lock()
            .unwrap()
            .push((failure.category, failure.error.to_string()));
    }
}

/// Serve every connection the mock accessory opens with one virtual scanner.
pub fn spawn_scanner(mut device: MockAccessoryHandle) -> EmulatorHandle {
    let (mut scanner, handle) = VirtualScanner::new(VirtualScanner::default_identity());
    tokio::spawn(async move {
        while let Some(connection) = device.next_connection().await {
            let _ = scanner.serve(connection).await;
        }
    });
    handle
}

pub fn test_config() -> SessionConfig {
    SessionConfig {
        command_timeout_ms: 500,
        late_reply_window_ms: 1000,
        ..SessionConfig::default()
    }
}

pub struct Harness {
    pub session: Arc<DeviceSession<MockAccessory>>,
    pub accessory: MockAccessory,
    pub scanner: EmulatorHandle,
    pub sink: Arc<CollectingSink>,
    pub claims: ClaimTable,
}

/// Unclaimed session in front of a virtual scanner.
pub fn harness(id: &str, config: SessionConfig) -> Harness {
    init_tracing();
    let (accessory, device) = MockAccessory::new(id);
    let scanner = spawn_scanner(device);
    let sink = Arc::new(CollectingSink::default());
    let claims = ClaimTable::new();
    let session = DeviceSession::builder(accessory.clone())
        .config(config)
        .claims(claims.clone())
        .error_sink(Arc::clone(&sink) as Arc<dyn ErrorSink>)
        .build()
        .unwrap();
    Harness {
        session: Arc::new(session),
        accessory,
        scanner,
        sink,
        claims,
    }
}

/// Claimed session in front of a virtual scanner.
pub async fn claimed(id: &str) -> Harness {
    let harness = harness(id, test_config());
    harness.session.claim().await.unwrap();
    harness
}

/// Every status the session reports from now on.
pub fn record_statuses(session: &DeviceSession<MockAccessory>) -> Arc<Mutex<Vec<ScannerStatus>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    session.register_status_listener(Arc::new(
        move |_: &SessionInfo, status: ScannerStatus| -> anyhow::Result<()> {
            sink.lock().unwrap().push(status);
            Ok(())
        },
    ));
    seen
}

/// Poll `condition` for up to two seconds.
pub async fn eventually<F: FnMut() -> bool>(mut condition: F) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
