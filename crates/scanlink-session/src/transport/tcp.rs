//! Accessory reached over TCP, such as a serial-to-network bridge or the
//! `scanlink-emulator` binary.
//!
//! ```no_run
//! use scanlink_session::{DeviceSession, TcpAccessory, TcpAccessoryConfig};
//!
//! # async fn example() -> scanlink_core::Result<()> {
//! let accessory = TcpAccessory::new(TcpAccessoryConfig {
//!     addr: "127.0.0.1:7400".parse().unwrap(),
//!     ..TcpAccessoryConfig::default()
//! });
//! let session = DeviceSession::builder(accessory).build()?;
//! session.claim().await?;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{info, warn};

use scanlink_core::{Error, Result};

use crate::accessory::Accessory;

#[derive(Debug, Clone)]
pub struct TcpAccessoryConfig {
    pub addr: SocketAddr,
    pub connect_timeout: Duration,
    /// Identifier used for claims; defaults to the address.
    pub id: Option<String>,
}

impl Default for TcpAccessoryConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 7400)),
            connect_timeout: Duration::from_millis(3000),
            id: None,
        }
    }
}

/// Accessory whose channel is a TCP connection.
#[derive(Debug, Clone)]
pub struct TcpAccessory {
    id: String,
    addr: SocketAddr,
    connect_timeout: Duration,
}

impl TcpAccessory {
    pub fn new(config: TcpAccessoryConfig) -> Self {
        Self {
            id: config.id.unwrap_or_else(|| format!("tcp://{}", config.addr)),
            addr: config.addr,
            connect_timeout: config.connect_timeout,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Accessory for TcpAccessory {
    type Stream = TcpStream;

    fn id(&self) -> &str {
        &self.id
    }

    async fn open(&self) -> Result<TcpStream> {
        info!(accessory = %self.id, "connecting");
        let stream = match tokio::time::timeout(self.connect_timeout, TcpStream::connect(self.addr))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(Error::transport(format!("{}: connect failed: {e}", self.id)));
            }
            Err(_) => {
                return Err(Error::transport(format!(
                    "{}: connect timeout after {}ms",
                    self.id,
                    self.connect_timeout.as_millis()
                )));
            }
        };

        // Replies are small; don't let Nagle hold them back.
        if let Err(e) = stream.set_nodelay(true) {
            warn!(accessory = %self.id, error = %e, "failed to set TCP_NODELAY");
        }
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_open_connects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let accessory = TcpAccessory::new(TcpAccessoryConfig {
            addr: listener.local_addr().unwrap(),
            ..TcpAccessoryConfig::default()
        });

        let (stream, accepted) = tokio::join!(accessory.open(), listener.accept());
        assert!(stream.is_ok());
        assert!(accepted.is_ok());
        assert!(accessory.id().starts_with("tcp://127.0.0.1:"));
    }

    #[tokio::test]
    async fn test_open_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let accessory = TcpAccessory::new(TcpAccessoryConfig {
            addr,
            id: Some("bridge-1".into()),
            ..TcpAccessoryConfig::default()
        });
        assert_eq!(accessory.id(), "bridge-1");
        assert!(matches!(accessory.open().await, Err(Error::Transport { .. })));
    }
}
