//! Error taxonomy for configuration, protocol and session operations.
//!
//! The variants follow the layer that detects the problem:
//!
//! | Variant | Raised by | Caller reaction |
//! |---------|-----------|-----------------|
//! | [`Error::Validation`] | configuration model | fix the value; nothing was sent |
//! | [`Error::Encoding`] / [`Error::Protocol`] | command codec, decoder | programming or framing bug |
//! | [`Error::MalformedResponse`] | configuration model | device reply lacks schema fields |
//! | [`Error::Sequence`] | response decoder | multi-line read dropped |
//! | [`Error::DeviceRejected`] | device session | adjust input and retry |
//! | [`Error::Transport`] / [`Error::DeviceDisconnected`] | device session | session left `Claimed` |
//! | [`Error::Timeout`] | device session | query device state before retrying |

use std::fmt;

/// Result type alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// A configuration leaf failed validation.
///
/// `field` is the full dotted path of the leaf, for example
/// `decode.symbologies.code39.length_min`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Value outside the documented range of the leaf.
    #[error("{field} = {value} is outside the allowed range {allowed}")]
    Range {
        field: String,
        value: String,
        allowed: String,
    },

    /// String leaf contains a character reserved by the wire format.
    #[error("{field} contains reserved character {character:?}")]
    ReservedCharacter { field: String, character: char },
}

impl ValidationError {
    /// Create a range violation for `field`.
    pub fn range(
        field: impl Into<String>,
        value: impl fmt::Display,
        allowed: impl Into<String>,
    ) -> Self {
        Self::Range {
            field: field.into(),
            value: value.to_string(),
            allowed: allowed.into(),
        }
    }

    /// Create a reserved-character violation for `field`.
    pub fn reserved(field: impl Into<String>, character: char) -> Self {
        Self::ReservedCharacter {
            field: field.into(),
            character,
        }
    }

    /// Dotted path of the offending leaf.
    pub fn field(&self) -> &str {
        match self {
            Self::Range { field, .. } | Self::ReservedCharacter { field, .. } => field,
        }
    }
}

/// Errors produced by the scanlink crates.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration value rejected before anything was sent.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Request fields are not a valid combination for the request variant.
    #[error("Encoding error: {message}")]
    Encoding { message: String },

    /// Frame or payload does not follow the wire format.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Device reply does not carry every field the schema expects.
    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    /// Multi-line continuation records are missing or out of order.
    #[error("Sequence error: {message}")]
    Sequence { message: String },

    /// The device answered with a negative acknowledgement.
    #[error("Device rejected request with code {code:#06x}")]
    DeviceRejected { code: u16 },

    /// The accessory channel could not be opened or written.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The accessory went away while the session was claimed.
    #[error("Device disconnected: {device}")]
    DeviceDisconnected { device: String },

    /// No reply arrived within the command budget.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Operation requires a claimed session.
    #[error("Session not claimed")]
    NotClaimed,

    /// Another session holds the accessory.
    #[error("Accessory already claimed: {accessory}")]
    AlreadyClaimed { accessory: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Frame too large: {size} bytes (max {max_size})")]
    FrameTooLarge { size: usize, max_size: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid session or emulator configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new encoding error.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Create a new protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a new malformed response error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Create a new sequence error.
    pub fn sequence(message: impl Into<String>) -> Self {
        Self::Sequence {
            message: message.into(),
        }
    }

    /// Create a new transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::DeviceDisconnected {
            device: device.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new already-claimed error.
    pub fn already_claimed(accessory: impl Into<String>) -> Self {
        Self::AlreadyClaimed {
            accessory: accessory.into(),
        }
    }

    /// True when the connection to the accessory is gone or unusable.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::DeviceDisconnected { .. } | Self::Io(_)
        )
    }

    /// True when the request may be reissued once the caller has re-queried
    /// device state. Only timeouts qualify: every other failure is either
    /// deterministic or leaves the session unusable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The validation failure, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_range_error_display() {
        let err = ValidationError::range("decode.decode_level", 12, "1..=9");
        assert_eq!(err.field(), "decode.decode_level");
        assert_eq!(
            err.to_string(),
            "decode.decode_level = 12 is outside the allowed range 1..=9"
        );
    }

    #[test]
    fn test_validation_converts_into_error() {
        let err: Error = ValidationError::reserved("decode.charset", ']').into();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.as_validation().map(|v| v.field()), Some("decode.charset"));
    }

    #[test]
    fn test_device_rejected_display() {
        let err = Error::DeviceRejected { code: 0x0012 };
        assert_eq!(err.to_string(), "Device rejected request with code 0x0012");
    }

    #[rstest]
    #[case(Error::timeout(3000), false, true)]
    #[case(Error::transport("write failed"), true, false)]
    #[case(Error::disconnected("SP1-0001"), true, false)]
    #[case(Error::protocol("unknown verb"), false, false)]
    #[case(Error::DeviceRejected { code: 1 }, false, false)]
    #[case(Error::NotClaimed, false, false)]
    fn test_error_classification(
        #[case] err: Error,
        #[case] transport: bool,
        #[case] retryable: bool,
    ) {
        assert_eq!(err.is_transport(), transport);
        assert_eq!(err.is_retryable(), retryable);
    }

    #[test]
    fn test_timeout_display() {
        assert_eq!(
            Error::timeout(250).to_string(),
            "Operation timeout after 250ms"
        );
    }
}
