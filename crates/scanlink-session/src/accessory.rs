//! The transport seam.
//!
//! An [`Accessory`] is one physical scanner the host can open a byte stream
//! to. The session never looks inside the stream: frame boundaries come from
//! the protocol codec, and end-of-stream is the disconnect notification.
//!
//! `open` returns `impl Future` (edition 2024, no `async-trait`), so the
//! trait is not object-safe. Sessions and registries are generic over the
//! accessory type instead. Implementations may write it as `async fn`.

use std::future::Future;

use tokio::io::{AsyncRead, AsyncWrite};

use scanlink_core::Result;

/// A physical accessory that can be opened as a duplex byte stream.
pub trait Accessory: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Stable identifier of the physical device. Claims are keyed on it.
    fn id(&self) -> &str;

    /// Open the byte channel.
    ///
    /// # Errors
    /// `Transport` when the channel cannot be opened.
    fn open(&self) -> impl Future<Output = Result<Self::Stream>> + Send;
}
