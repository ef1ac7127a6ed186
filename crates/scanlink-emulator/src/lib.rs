//! Virtual scanner accessory.
//!
//! This crate provides a software stand-in for a barcode/RFID scanner
//! accessory. It speaks the device side of the scanlink protocol over any
//! async byte stream, so it can sit behind a `tokio::io::duplex` pair in
//! tests or behind a TCP listener for development without hardware.

pub mod scanner;

pub use scanner::{EmulatorHandle, ScannerSnapshot, ServeOutcome, VirtualScanner, nak};
