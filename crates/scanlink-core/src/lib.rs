//! Shared building blocks for the scanlink accessory driver.
//!
//! Every other crate in the workspace depends on this one for three things:
//!
//! - [`Error`] and [`ValidationError`], the error taxonomy used from the
//!   configuration model up through the device session.
//! - [`constants`], the framing bytes, delimiters and default limits of the
//!   accessory wire protocol.
//! - [`types`], small value types (scanner status, key events, buzzer/LED
//!   selections, identity) that travel between the protocol and session layers.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result, ValidationError};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
