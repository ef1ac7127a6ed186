//! Stream parser for accessory frames.
//!
//! The accessory link is a plain byte stream: one read may hold part of a
//! frame, several frames, or line noise. The parser buffers incoming bytes
//! and extracts complete [`Frame`]s with a small state machine.
//!
//! # Framing
//!
//! ```text
//! text:   STX <ascii payload> ETX
//! binary: SOH <len u16 BE> <len bytes> ETX
//! ```
//!
//! Text frames are terminator-delimited and may not contain framing bytes.
//! Binary frames are length-prefixed, so their payload may contain any byte
//! value, including STX and ETX.
//!
//! # Usage
//!
//! ```
//! use scanlink_protocol::StreamParser;
//!
//! let mut parser = StreamParser::new();
//! parser.feed(&[0x02, b'A', b'C']);
//! parser.feed(&[b'K', 0x03]);
//!
//! let frame = parser.next_frame().unwrap();
//! assert_eq!(frame.as_text().unwrap(), "ACK");
//! ```

use bytes::{Buf, BytesMut};
use std::collections::VecDeque;

use scanlink_core::constants::{BINARY_FRAME_OVERHEAD, ETX, MAX_FRAME_SIZE, SOH, STX};

use crate::frame::{Frame, FrameKind};

/// Initial buffer capacity for incoming link data.
const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// Initial payload capacity for frame assembly.
const INITIAL_PAYLOAD_CAPACITY: usize = 1024;

const INITIAL_FRAME_QUEUE_CAPACITY: usize = 4;

/// State machine states for parsing accessory frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Scanning for STX or SOH. Other bytes are discarded.
    WaitingStart,

    /// Inside a text frame, accumulating until ETX.
    ReadingText,

    /// After SOH, waiting for the two length bytes.
    ReadingLength,

    /// Inside a binary frame, accumulating the announced number of bytes.
    ReadingBinary,

    /// Binary payload complete, expecting ETX.
    ReadingTrailer,

    /// Discarding the payload and trailer of an oversized binary frame.
    SkippingBinary,
}

/// Stateful stream parser for accessory frames.
///
/// # State Machine
///
/// ```text
///                 STX                  ETX
/// WaitingStart ────────> ReadingText ───────> frame ready
///      │                     │ STX/SOH or oversize: drop partial
///      │ SOH                 ▼
///      └──────> ReadingLength ──> ReadingBinary ──> ReadingTrailer
///                    │ len too large                  │ ETX: frame ready
///                    ▼                                │ other: drop frame
///             SkippingBinary ──> WaitingStart <───────┘
/// ```
///
/// An oversized binary frame is skipped by its announced length, so bytes
/// inside its payload are never taken for a frame of their own.
///
/// Every dropped frame increments [`frames_discarded`](Self::frames_discarded).
#[derive(Debug)]
pub struct StreamParser {
    /// Bytes received but not yet consumed by the state machine.
    buffer: BytesMut,

    state: ParserState,

    /// Payload of the frame currently being assembled.
    payload: BytesMut,

    /// Announced length of the binary frame being assembled.
    expected_len: usize,

    /// Bytes of an oversized binary frame still to be skipped.
    skip_remaining: usize,

    /// Complete frames ready for extraction.
    frames: VecDeque<Frame>,

    /// Largest accepted frame, framing included.
    max_frame_size: usize,

    discarded: u64,
}

impl StreamParser {
    /// Create a parser that accepts frames up to [`MAX_FRAME_SIZE`].
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    /// Create a parser with a custom frame size limit.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            state: ParserState::WaitingStart,
            payload: BytesMut::with_capacity(INITIAL_PAYLOAD_CAPACITY),
            expected_len: 0,
            skip_remaining: 0,
            frames: VecDeque::with_capacity(INITIAL_FRAME_QUEUE_CAPACITY),
            max_frame_size,
            discarded: 0,
        }
    }

    /// Feed bytes from the link into the parser.
    ///
    /// All complete frames contained in the data are queued.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);

        while self.step() {}
    }

    /// Extract the next complete frame, if any.
    pub fn next_frame(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Number of frames ready for extraction.
    pub fn frames_available(&self) -> usize {
        self.frames.len()
    }

    /// Number of frames dropped because of framing violations.
    pub fn frames_discarded(&self) -> u64 {
        self.discarded
    }

    /// Discard all buffered data and queued frames.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.payload.clear();
        self.frames.clear();
        self.expected_len = 0;
        self.skip_remaining = 0;
        self.state = ParserState::WaitingStart;
    }

    /// Iterator draining all currently queued frames.
    pub fn drain_frames(&mut self) -> DrainFrames<'_> {
        DrainFrames { parser: self }
    }

    /// Advance the state machine once. Returns `false` when more input is needed.
    fn step(&mut self) -> bool {
        match self.state {
            ParserState::WaitingStart => self.handle_waiting_start(),
            ParserState::ReadingText => self.handle_reading_text(),
            ParserState::ReadingLength => self.handle_reading_length(),
            ParserState::ReadingBinary => self.handle_reading_binary(),
            ParserState::ReadingTrailer => self.handle_reading_trailer(),
            ParserState::SkippingBinary => self.handle_skipping_binary(),
        }
    }

    fn handle_waiting_start(&mut self) -> bool {
        let Some(pos) = self.buffer.iter().position(|&b| b == STX || b == SOH) else {
            self.buffer.clear();
            return false;
        };

        self.buffer.advance(pos);
        let start = self.buffer.get_u8();
        self.payload.clear();
        self.state = if start == STX {
            ParserState::ReadingText
        } else {
            ParserState::ReadingLength
        };
        true
    }

    fn handle_reading_text(&mut self) -> bool {
        let marker = self
            .buffer
            .iter()
            .position(|&b| b == ETX || b == STX || b == SOH);

        match marker {
            Some(pos) if self.buffer[pos] == ETX => {
                let chunk = self.buffer.split_to(pos);
                self.buffer.advance(1);
                self.payload.extend_from_slice(&chunk);

                if self.payload.is_ascii() && self.fits(self.payload.len() + 2) {
                    let payload = self.payload.split().freeze();
                    self.frames
                        .push_back(Frame::from_parts(FrameKind::Text, payload));
                } else {
                    self.discard_current();
                }
                self.state = ParserState::WaitingStart;
                true
            }
            Some(pos) => {
                // A new start byte before ETX: the partial frame is lost.
                self.buffer.advance(pos);
                self.discard_current();
                self.state = ParserState::WaitingStart;
                true
            }
            None => {
                self.payload.extend_from_slice(&self.buffer);
                self.buffer.clear();
                if !self.fits(self.payload.len()) {
                    self.discard_current();
                    self.state = ParserState::WaitingStart;
                }
                false
            }
        }
    }

    fn handle_reading_length(&mut self) -> bool {
        if self.buffer.len() < 2 {
            return false;
        }

        let len = self.buffer.get_u16() as usize;
        if !self.fits(len + BINARY_FRAME_OVERHEAD) {
            self.discard_current();
            // Payload plus ETX.
            self.skip_remaining = len + 1;
            self.state = ParserState::SkippingBinary;
            return true;
        }

        self.expected_len = len;
        self.payload.clear();
        self.state = if len == 0 {
            ParserState::ReadingTrailer
        } else {
            ParserState::ReadingBinary
        };
        true
    }

    fn handle_reading_binary(&mut self) -> bool {
        let wanted = self.expected_len - self.payload.len();
        let take = wanted.min(self.buffer.len());
        if take == 0 {
            return false;
        }

        let chunk = self.buffer.split_to(take);
        self.payload.extend_from_slice(&chunk);

        if self.payload.len() == self.expected_len {
            self.state = ParserState::ReadingTrailer;
            true
        } else {
            false
        }
    }

    fn handle_reading_trailer(&mut self) -> bool {
        let Some(&b) = self.buffer.first() else {
            return false;
        };

        if b == ETX {
            self.buffer.advance(1);
            let payload = self.payload.split().freeze();
            self.frames
                .push_back(Frame::from_parts(FrameKind::Binary, payload));
        } else {
            // Leave the byte in place: it may start the next frame.
            self.discard_current();
        }
        self.expected_len = 0;
        self.state = ParserState::WaitingStart;
        true
    }

    fn handle_skipping_binary(&mut self) -> bool {
        let take = self.skip_remaining.min(self.buffer.len());
        self.buffer.advance(take);
        self.skip_remaining -= take;

        if self.skip_remaining == 0 {
            self.state = ParserState::WaitingStart;
            true
        } else {
            false
        }
    }

    fn fits(&self, wire_len: usize) -> bool {
        wire_len <= self.max_frame_size
    }

    fn discard_current(&mut self) {
        self.payload.clear();
        self.expected_len = 0;
        self.discarded += 1;
    }
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator that drains frames from a [`StreamParser`].
pub struct DrainFrames<'a> {
    parser: &'a mut StreamParser,
}

impl Iterator for DrainFrames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Self::Item> {
        self.parser.next_frame()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.parser.frames_available();
        (len, Some(len))
    }
}

impl ExactSizeIterator for DrainFrames<'_> {}
