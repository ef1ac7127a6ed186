//! Response Decoder: typed barcode and RFID records from data payloads.
//!
//! Payloads are decoded with the format negotiated for the session
//! ([`BarcodeFormat`] for barcode reads, [`ResponseFormat`] for tags). Each
//! decode is eager and returns records in wire order.

mod barcode;
mod format;
mod rfid;

pub use barcode::{BarcodeRecord, LineRead, Symbology, decode_barcode, encode_barcode};
pub use format::{BarcodeFormat, PayloadEncoding, ResponseFormat};
pub use rfid::{RfidRecord, RfidResult, decode_rfid, encode_rfid};
