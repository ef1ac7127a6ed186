use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

use scanlink_core::{
    Error, Result,
    constants::{BINARY_FRAME_OVERHEAD, ETX, MAX_BINARY_PAYLOAD, SOH, STX, TEXT_FRAME_OVERHEAD},
};

/// Shape of a frame on the accessory link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// `STX <ascii> ETX`
    Text,
    /// `SOH <len u16 BE> <bytes> ETX`
    Binary,
}

/// One protocol frame with its framing bytes stripped.
///
/// Frames are the unit exchanged by [`ScannerCodec`](crate::ScannerCodec):
/// the payload is kept as [`Bytes`] so decoders can slice records out of it
/// without copying.
///
/// # Wire Format
///
/// ```text
/// Text:   02 'B' 'Z' 'R' ']' '1' 03
/// Binary: 01 00 03 'D' 0x10 0x20 03
///            ^^^^^ payload length, big-endian
/// ```
///
/// # Example
///
/// ```
/// use scanlink_protocol::Frame;
///
/// let frame = Frame::text("BZR]1");
/// assert_eq!(frame.to_wire().as_ref(), b"\x02BZR]1\x03");
///
/// let binary = Frame::binary(vec![b'D', 0x10]);
/// assert_eq!(binary.to_wire().as_ref(), &[0x01, 0x00, 0x02, b'D', 0x10, 0x03]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    kind: FrameKind,
    payload: Bytes,
}

impl Frame {
    /// Create a text frame. The payload is expected to be ASCII without STX/ETX;
    /// [`Frame::to_wire`] does not re-check it.
    pub fn text(payload: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Text,
            payload: Bytes::from(payload.into()),
        }
    }

    /// Create a binary frame.
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self {
            kind: FrameKind::Binary,
            payload: payload.into(),
        }
    }

    pub(crate) fn from_parts(kind: FrameKind, payload: Bytes) -> Self {
        Self { kind, payload }
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn is_binary(&self) -> bool {
        self.kind == FrameKind::Binary
    }

    /// Payload bytes without framing.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload of a text frame as `&str`.
    ///
    /// # Errors
    /// Returns `Error::Protocol` for binary frames and non-ASCII payloads.
    pub fn as_text(&self) -> Result<&str> {
        if self.kind != FrameKind::Text {
            return Err(Error::protocol("expected a text frame, got binary"));
        }
        if !self.payload.is_ascii() {
            return Err(Error::protocol("text frame contains non-ASCII bytes"));
        }
        std::str::from_utf8(&self.payload)
            .map_err(|e| Error::protocol(format!("text frame is not valid ASCII: {e}")))
    }

    /// Size of the frame on the wire, framing included.
    pub fn wire_len(&self) -> usize {
        match self.kind {
            FrameKind::Text => self.payload.len() + TEXT_FRAME_OVERHEAD,
            FrameKind::Binary => self.payload.len() + BINARY_FRAME_OVERHEAD,
        }
    }

    /// Check that the frame can be put on the wire.
    ///
    /// # Errors
    /// Returns `Error::Encoding` when a text payload holds framing bytes or
    /// non-ASCII data, or a binary payload exceeds the u16 length prefix.
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            FrameKind::Text => {
                if let Some(b) = self
                    .payload
                    .iter()
                    .find(|&&b| !b.is_ascii() || b == STX || b == ETX || b == SOH)
                {
                    return Err(Error::encoding(format!(
                        "text payload contains forbidden byte 0x{b:02X}"
                    )));
                }
            }
            FrameKind::Binary => {
                if self.payload.len() > MAX_BINARY_PAYLOAD {
                    return Err(Error::encoding(format!(
                        "binary payload of {} bytes exceeds {MAX_BINARY_PAYLOAD}",
                        self.payload.len()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Serialize with framing bytes.
    pub fn to_wire(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        self.write_to(&mut buf);
        buf.freeze()
    }

    /// Append the framed bytes to `dst`.
    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.reserve(self.wire_len());
        match self.kind {
            FrameKind::Text => {
                dst.put_u8(STX);
                dst.put_slice(&self.payload);
                dst.put_u8(ETX);
            }
            FrameKind::Binary => {
                dst.put_u8(SOH);
                dst.put_u16(self.payload.len() as u16);
                dst.put_slice(&self.payload);
                dst.put_u8(ETX);
            }
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FrameKind::Text => write!(f, "{}", String::from_utf8_lossy(&self.payload)),
            FrameKind::Binary => {
                write!(f, "<binary {} bytes>", self.payload.len())?;
                for b in self.payload.iter().take(16) {
                    write!(f, " {b:02X}")?;
                }
                if self.payload.len() > 16 {
                    write!(f, " ..")?;
                }
                Ok(())
            }
        }
    }
}
