//! Helpers for reading and writing text payloads.
//!
//! A text payload is a verb followed by `]`-prefixed fields:
//!
//! ```text
//! SET]BC]scan.trigger_mode=1]scan.light_mode=0
//! ^^^ ^^ ^^^^^^^^^^^^^^^^^^^ ^^^^^^^^^^^^^^^^^
//! verb    key=value fields
//! ```

use std::collections::HashMap;
use std::fmt::Write as _;
use std::str::FromStr;

use scanlink_core::{
    Error, Result,
    constants::{DELIMITER_FIELD, DELIMITER_KEY_VALUE},
};

/// A text payload split into its verb and fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPayload<'a> {
    pub verb: &'a str,
    pub fields: Vec<&'a str>,
}

impl<'a> TextPayload<'a> {
    /// Split `payload` on the field delimiter.
    pub fn parse(payload: &'a str) -> Self {
        let mut parts = payload.split(DELIMITER_FIELD);
        let verb = parts.next().unwrap_or_default();
        Self {
            verb,
            fields: parts.collect(),
        }
    }

    /// Field at `index`, or a protocol error naming `what`.
    pub fn field(&self, index: usize, what: &str) -> Result<&'a str> {
        self.fields
            .get(index)
            .copied()
            .ok_or_else(|| Error::protocol(format!("{} is missing {what}", self.verb)))
    }

    /// Parse the field at `index` as a number.
    pub fn number<T: FromStr>(&self, index: usize, what: &str) -> Result<T> {
        let raw = self.field(index, what)?;
        parse_number(raw, what)
    }

    /// Fail unless the payload has exactly `count` fields.
    pub fn expect_len(&self, count: usize) -> Result<()> {
        if self.fields.len() != count {
            return Err(Error::protocol(format!(
                "{} expects {count} fields, got {}",
                self.verb,
                self.fields.len()
            )));
        }
        Ok(())
    }
}

/// `key=value` fields of a configuration or identity payload.
///
/// Later duplicates overwrite earlier ones. Fields without `=` are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    entries: HashMap<String, String>,
}

impl FieldMap {
    pub fn parse<'a>(fields: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut entries = HashMap::new();
        for field in fields {
            let (key, value) = field.split_once(DELIMITER_KEY_VALUE).ok_or_else(|| {
                Error::malformed(format!("field {field:?} is not a key=value pair"))
            })?;
            entries.insert(key.to_string(), value.to_string());
        }
        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Value of `key`, or `MalformedResponse` when the device omitted it.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| Error::malformed(format!("missing field {key}")))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a decimal number, reporting `what` on failure.
///
/// Only digits with an optional leading `-` are accepted.
pub fn parse_number<T: FromStr>(raw: &str, what: &str) -> Result<T> {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if !is_decimal(digits) {
        return Err(Error::protocol(format!("{what} is not a number: {raw:?}")));
    }
    raw.parse()
        .map_err(|_| Error::protocol(format!("{what} is not a number: {raw:?}")))
}

/// Non-empty and only ASCII decimal digits.
pub(crate) fn is_decimal(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())
}

/// Non-empty and only ASCII hex digits.
pub(crate) fn is_hex(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Upper-case hex rendering of `bytes`.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02X}");
    }
    out
}

/// Parse an even-length hex string.
pub fn parse_hex(raw: &str, what: &str) -> Result<Vec<u8>> {
    if raw.len() % 2 != 0 || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::protocol(format!("{what} is not a hex byte string: {raw:?}")));
    }
    (0..raw.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&raw[i..i + 2], 16)
                .map_err(|_| Error::protocol(format!("{what} is not a hex byte string: {raw:?}")))
        })
        .collect()
}

/// Parse a hex number of any width up to 32 bits.
pub fn parse_hex_number(raw: &str, what: &str) -> Result<u32> {
    if !is_hex(raw) {
        return Err(Error::protocol(format!("{what} is not a hex number: {raw:?}")));
    }
    u32::from_str_radix(raw, 16)
        .map_err(|_| Error::protocol(format!("{what} is out of range: {raw:?}")))
}

/// Parse a hex number that must fit a 16-bit word.
pub fn parse_hex_word(raw: &str, what: &str) -> Result<u16> {
    if !is_hex(raw) {
        return Err(Error::protocol(format!("{what} is not a hex word: {raw:?}")));
    }
    u16::from_str_radix(raw, 16)
        .map_err(|_| Error::protocol(format!("{what} does not fit 16 bits: {raw:?}")))
}
