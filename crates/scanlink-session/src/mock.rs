//! In-memory accessory for tests and development.
//!
//! Each [`open`](Accessory::open) creates a `tokio::io::duplex` pair. The
//! host half goes to the session; the device half is handed to the
//! [`MockAccessoryHandle`], which typically feeds it to a virtual scanner.
//!
//! ```
//! use scanlink_session::{Accessory, MockAccessory};
//!
//! # #[tokio::main]
//! # async fn main() -> scanlink_core::Result<()> {
//! let (accessory, mut handle) = MockAccessory::new("SP1-000123");
//! let _host = accessory.open().await?;
//! let _device = handle.next_connection().await.unwrap();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::io::DuplexStream;
use tokio::sync::mpsc;

use scanlink_core::{Error, Result};

use crate::accessory::Accessory;

/// Buffer of each duplex direction.
const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Mock accessory. Clones refer to the same physical device.
#[derive(Debug, Clone)]
pub struct MockAccessory {
    id: String,
    buffer_size: usize,
    connections: mpsc::UnboundedSender<DuplexStream>,
    fail_next_open: Arc<AtomicBool>,
    opens: Arc<AtomicU64>,
}

impl MockAccessory {
    pub fn new(id: impl Into<String>) -> (Self, MockAccessoryHandle) {
        Self::with_buffer_size(id, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(id: impl Into<String>, buffer_size: usize) -> (Self, MockAccessoryHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let fail_next_open = Arc::new(AtomicBool::new(false));
        let opens = Arc::new(AtomicU64::new(0));

        let accessory = Self {
            id: id.into(),
            buffer_size,
            connections: tx,
            fail_next_open: Arc::clone(&fail_next_open),
            opens: Arc::clone(&opens),
        };
        let handle = MockAccessoryHandle {
            connections: rx,
            fail_next_open,
            opens,
        };
        (accessory, handle)
    }
}

impl Accessory for MockAccessory {
    type Stream = DuplexStream;

    fn id(&self) -> &str {
        &self.id
    }

    async fn open(&self) -> Result<DuplexStream> {
        if self.fail_next_open.swap(false, Ordering::SeqCst) {
            return Err(Error::transport(format!("{}: open refused", self.id)));
        }
        let (host, device) = tokio::io::duplex(self.buffer_size);
        self.connections
            .send(device)
            .map_err(|_| Error::transport(format!("{}: device side is gone", self.id)))?;
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(host)
    }
}

/// Device side of a [`MockAccessory`].
#[derive(Debug)]
pub struct MockAccessoryHandle {
    connections: mpsc::UnboundedReceiver<DuplexStream>,
    fail_next_open: Arc<AtomicBool>,
    opens: Arc<AtomicU64>,
}

impl MockAccessoryHandle {
    /// Device half of the next opened channel.
    ///
    /// Returns `None` once every clone of the accessory has been dropped.
    pub async fn next_connection(&mut self) -> Option<DuplexStream> {
        self.connections.recv().await
    }

    /// Make the next `open` fail with a transport error.
    pub fn fail_next_open(&self) {
        self.fail_next_open.store(true, Ordering::SeqCst);
    }

    /// Successful opens so far.
    pub fn open_count(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }
}
