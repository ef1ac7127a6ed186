//! Tokio codec for accessory frames.
//!
//! [`ScannerCodec`] wraps the [`StreamParser`] so that any async byte stream
//! can be driven through `tokio_util::codec::{FramedRead, FramedWrite}`:
//!
//! ```text
//! accessory stream -> Decoder -> Frame -> Inbound / Request
//! Request / Reply  -> Frame   -> Encoder -> accessory stream
//! ```
//!
//! # Usage
//!
//! ```
//! use bytes::BytesMut;
//! use tokio_util::codec::{Decoder, Encoder};
//! use scanlink_protocol::{Frame, ScannerCodec};
//!
//! let mut codec = ScannerCodec::new();
//! let mut wire = BytesMut::new();
//! codec.encode(Frame::text("ACK"), &mut wire).unwrap();
//!
//! let frame = codec.decode(&mut wire).unwrap().unwrap();
//! assert_eq!(frame.as_text().unwrap(), "ACK");
//! ```

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use scanlink_core::{Error, Result, constants::MAX_FRAME_SIZE};

use crate::{Frame, StreamParser};

/// Tokio codec for accessory frames.
#[derive(Debug)]
pub struct ScannerCodec {
    parser: StreamParser,
    max_frame_size: usize,
}

impl ScannerCodec {
    /// Create a codec with the default 64 KiB frame limit.
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    /// Create a codec with a custom frame limit, applied in both directions.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            parser: StreamParser::with_max_frame_size(max_frame_size),
            max_frame_size,
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Frames dropped by the parser because of framing violations.
    pub fn frames_discarded(&self) -> u64 {
        self.parser.frames_discarded()
    }
}

impl Default for ScannerCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ScannerCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if !src.is_empty() {
            // The parser owns every byte from here on.
            self.parser.feed(src);
            src.clear();
        }

        Ok(self.parser.next_frame())
    }
}

impl Encoder<Frame> for ScannerCodec {
    type Error = Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<()> {
        item.validate()?;

        if item.wire_len() > self.max_frame_size {
            return Err(Error::FrameTooLarge {
                size: item.wire_len(),
                max_size: self.max_frame_size,
            });
        }

        item.write_to(dst);
        Ok(())
    }
}
