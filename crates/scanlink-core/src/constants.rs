//! Wire-level constants for the accessory protocol.
//!
//! Two frame shapes share the link:
//!
//! ```text
//! text:   STX  <ascii payload>            ETX
//!         0x02 BZR]1                      0x03
//!
//! binary: SOH  <len u16 BE>  <payload>    ETX
//!         0x01 0x00 0x05     T....        0x03
//! ```
//!
//! Text payloads are a verb followed by `]`-prefixed fields. Configuration
//! leaves travel as `key=value` fields and sub-fields are joined with `[`.

// ============================================================================
// Framing
// ============================================================================

/// Start of a text frame.
pub const STX: u8 = 0x02;

/// End of every frame.
pub const ETX: u8 = 0x03;

/// Start of a binary (length-prefixed) frame.
pub const SOH: u8 = 0x01;

/// STX + ETX.
pub const TEXT_FRAME_OVERHEAD: usize = 2;

/// SOH + two length bytes + ETX.
pub const BINARY_FRAME_OVERHEAD: usize = 4;

/// Largest frame accepted on the link, framing included.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Largest binary payload expressible by the u16 length prefix.
pub const MAX_BINARY_PAYLOAD: usize = u16::MAX as usize;

// ============================================================================
// Text payload delimiters
// ============================================================================

/// Separates the verb and its fields.
pub const DELIMITER_FIELD: char = ']';

/// Separates sub-fields inside one field.
pub const DELIMITER_SUBFIELD: char = '[';

/// Separates a configuration key from its value.
pub const DELIMITER_KEY_VALUE: char = '=';

/// Characters that may never appear inside a string leaf.
pub const RESERVED_CHARS: [char; 3] = [DELIMITER_FIELD, DELIMITER_SUBFIELD, DELIMITER_KEY_VALUE];

/// Separates RFID records in the text tag format.
pub const TEXT_RECORD_SEPARATOR: char = ']';

/// Separates fields of one RFID record in the text tag format.
pub const TEXT_FIELD_SEPARATOR: char = ',';

// ============================================================================
// Session defaults
// ============================================================================

/// Budget for one synchronous command round trip.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 3000;

/// Default firmware chunk size in bytes.
pub const DEFAULT_FIRMWARE_CHUNK_SIZE: usize = 512;

/// Largest firmware chunk a single binary frame may carry.
pub const MAX_FIRMWARE_CHUNK_SIZE: usize = 4096;

// ============================================================================
// RFID limits
// ============================================================================

/// Tag access password length in bytes.
pub const TAG_PASSWORD_LEN: usize = 4;

/// Highest bit offset a tag filter may start at.
pub const MAX_FILTER_BIT_OFFSET: u32 = 0x7FFFF;

/// Longest filter mask in bits.
pub const MAX_FILTER_BIT_LENGTH: u16 = 0xFF;

/// Longest UII carried in one record (PC length field is 5 bits of words).
pub const MAX_UII_LEN: usize = 62;
