//! Wire protocol of the scanner accessory link.
//!
//! - [`frame`], [`stream_parser`] and [`codec`]: framing over a byte stream.
//! - [`commands`]: host requests ([`Request`]) and their encoding.
//! - [`reply`]: device replies ([`Reply`]) and unsolicited events ([`Inbound`]).
//! - [`settings`]: the configuration model.
//! - [`response`]: barcode and RFID record decoding.

pub mod codec;
pub mod commands;
mod cursor;
pub mod field;
pub mod frame;
pub mod reply;
pub mod response;
pub mod settings;
pub mod stream_parser;
pub mod validation;

pub use codec::ScannerCodec;
pub use commands::Request;
pub use frame::{Frame, FrameKind};
pub use reply::{Inbound, Reply, ReplyKind};
pub use response::{
    BarcodeFormat, BarcodeRecord, PayloadEncoding, ResponseFormat, RfidRecord, decode_barcode,
    decode_rfid,
};
pub use settings::{ConfigScope, ConfigurationTree};
pub use stream_parser::{DrainFrames, ParserState, StreamParser};
pub use validation::validate_field;
