//! Field validation for text payload safety.
//!
//! String values end up inside `]`-delimited text frames, so a value that
//! contains a delimiter would shift every following field. Values must also
//! stay printable ASCII, since text frames carry 7-bit data only.
//!
//! ```
//! use scanlink_protocol::validate_field;
//!
//! assert!(validate_field("decode.charset", "UTF-8").is_ok());
//! assert!(validate_field("decode.charset", "UTF]8").is_err());
//! ```

use scanlink_core::{ValidationError, constants::RESERVED_CHARS};

/// Validate a string leaf before it is placed in a text payload.
///
/// # Errors
/// Returns `ValidationError::ReservedCharacter` naming `field` when the value
/// contains a delimiter, a control character or non-ASCII data.
pub fn validate_field(field: &str, value: &str) -> Result<(), ValidationError> {
    match value
        .chars()
        .find(|c| RESERVED_CHARS.contains(c) || !c.is_ascii() || c.is_ascii_control())
    {
        Some(c) => Err(ValidationError::reserved(field, c)),
        None => Ok(()),
    }
}
