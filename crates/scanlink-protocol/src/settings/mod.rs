//! Configuration model.
//!
//! Device settings form fixed-shape trees ([`BarcodeSettings`],
//! [`RfidSettings`], [`CommonParams`], [`AutoLinkProfileSettings`]). The
//! protocol only supports whole-tree transfers: `SET` always carries every
//! leaf and `GET` always returns every leaf.
//!
//! Each node implements [`SettingsNode`] by visiting its leaves in a fixed
//! order with a [`Walker`]. The same walk drives three operations, so the
//! field order is identical for all of them:
//!
//! - validation ([`ConfigurationTree::validate`]) stops at the first leaf
//!   outside its range and names that leaf by its dotted path;
//! - encoding ([`ConfigurationTree::to_command`]) renders every leaf as
//!   `path=value`;
//! - decoding ([`ConfigurationTree::from_response`]) reads every leaf back
//!   and rejects replies that omit one.
//!
//! ```
//! use scanlink_protocol::settings::{BarcodeSettings, ConfigurationTree};
//!
//! let mut settings = BarcodeSettings::default();
//! settings.decode.decode_level = 12;
//!
//! let err = ConfigurationTree::Barcode(settings).validate().unwrap_err();
//! assert_eq!(err.field(), "decode.decode_level");
//! ```

/// Generates a [`Choice`] enum with explicit wire codes.
macro_rules! choice {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $code:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Default,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $crate::settings::Choice for $name {
            const ALL: &'static [Self] = &[$( Self::$variant ),+];

            fn code(self) -> u32 {
                match self {
                    $( Self::$variant => $code ),+
                }
            }
        }
    };
}

mod barcode;
mod common;
mod rfid;
mod walk;

pub use barcode::*;
pub use common::*;
pub use rfid::*;
pub use walk::{Decoder, Encoder, Validator};

use serde::{Deserialize, Serialize};
use std::fmt;

use scanlink_core::{Error, InitScope, Result, ValidationError, constants::DELIMITER_FIELD};

use crate::field::{FieldMap, TextPayload};
use crate::frame::Frame;

/// An enumerated leaf. Codes are the values sent on the wire.
pub trait Choice: Copy + PartialEq + fmt::Debug + 'static {
    const ALL: &'static [Self];

    fn code(self) -> u32;

    fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }
}

/// Integer leaf types.
pub trait Numeric: Copy + Into<u64> + TryFrom<u64> + fmt::Display {}

impl<T> Numeric for T where T: Copy + Into<u64> + TryFrom<u64> + fmt::Display {}

/// Inclusive range of a numeric leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min: u64,
    pub max: u64,
    /// Zero is accepted as "unspecified" even though it is below `min`.
    pub zero_unspecified: bool,
}

impl Bounds {
    pub const fn new(min: u64, max: u64) -> Self {
        Self {
            min,
            max,
            zero_unspecified: false,
        }
    }

    /// Also accept zero.
    pub const fn or_zero(self) -> Self {
        Self {
            zero_unspecified: true,
            ..self
        }
    }

    pub fn contains(&self, value: u64) -> bool {
        (self.zero_unspecified && value == 0) || (self.min..=self.max).contains(&value)
    }

    pub fn describe(&self) -> String {
        if self.zero_unspecified {
            format!("0 or {}..={}", self.min, self.max)
        } else {
            format!("{}..={}", self.min, self.max)
        }
    }
}

/// Constraint applied to a string leaf, on top of the reserved-character check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRule {
    /// Any printable ASCII.
    Free,
    /// `""` or `"?"` (unrestricted) or a single digit (exact match).
    LeadingCharacter,
    /// `""`, or two characters each in `A..=D` or `?`.
    CodabarStartStop,
    /// `""`, `"S"` or `"N"`.
    StfStartStop,
}

impl TextRule {
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            TextRule::Free => true,
            TextRule::LeadingCharacter => {
                value.is_empty()
                    || value == "?"
                    || (value.len() == 1 && value.bytes().all(|b| b.is_ascii_digit()))
            }
            TextRule::CodabarStartStop => {
                value.is_empty()
                    || (value.len() == 2
                        && value.bytes().all(|b| matches!(b, b'A'..=b'D' | b'?')))
            }
            TextRule::StfStartStop => matches!(value, "" | "S" | "N"),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            TextRule::Free => "printable ASCII",
            TextRule::LeadingCharacter => "\"\", \"?\" or one digit",
            TextRule::CodabarStartStop => "\"\" or two of A-D/?",
            TextRule::StfStartStop => "\"\", \"S\" or \"N\"",
        }
    }
}

/// Visitor over the leaves of a settings tree.
///
/// `key` is the leaf name relative to the current node; walkers that need
/// the full path keep track of the [`node`](Walker::node) nesting.
pub trait Walker {
    fn flag(&mut self, key: &str, value: &mut bool);

    fn number<T: Numeric>(&mut self, key: &str, value: &mut T, bounds: Bounds);

    fn choice<C: Choice>(&mut self, key: &str, value: &mut C);

    fn text(&mut self, key: &str, value: &mut String, rule: TextRule);

    fn node<N: SettingsNode>(&mut self, key: &str, node: &mut N);

    /// Cross-leaf constraint. A failed check is reported against `key`.
    fn check(&mut self, key: &str, ok: bool, value: &dyn fmt::Display, allowed: &str);
}

/// A fixed-shape node of a settings tree.
pub trait SettingsNode {
    fn walk<W: Walker>(&mut self, w: &mut W);
}

/// Walk `<prefix>_min` then `<prefix>_max` and require `min <= max`.
///
/// With [`Bounds::or_zero`], a zero on either side means "unspecified" and
/// skips the ordering check.
pub(crate) fn range_pair<W: Walker, T: Numeric>(
    w: &mut W,
    prefix: &str,
    min: &mut T,
    max: &mut T,
    bounds: Bounds,
) {
    let min_key = format!("{prefix}_min");
    let max_key = format!("{prefix}_max");
    w.number(&min_key, min, bounds);
    w.number(&max_key, max, bounds);

    let (lo, hi): (u64, u64) = ((*min).into(), (*max).into());
    let unspecified = bounds.zero_unspecified && (lo == 0 || hi == 0);
    w.check(&max_key, unspecified || lo <= hi, &hi, &format!(">= {min_key} ({lo})"));
}

/// Which settings tree a request or reply refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigScope {
    Barcode,
    Rfid,
    Common,
    AutoLinkProfile,
}

impl ConfigScope {
    pub const ALL: [ConfigScope; 4] = [
        ConfigScope::Barcode,
        ConfigScope::Rfid,
        ConfigScope::Common,
        ConfigScope::AutoLinkProfile,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            ConfigScope::Barcode => "BC",
            ConfigScope::Rfid => "RF",
            ConfigScope::Common => "CM",
            ConfigScope::AutoLinkProfile => "AL",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Trees an `Init` of `init` returns to their defaults.
    pub fn reset_by(init: InitScope) -> &'static [ConfigScope] {
        match init {
            InitScope::Comm | InitScope::Bluetooth => &[ConfigScope::Common],
            InitScope::Rfid => &[ConfigScope::Rfid, ConfigScope::AutoLinkProfile],
            InitScope::Barcode => &[ConfigScope::Barcode],
            InitScope::All => &Self::ALL,
        }
    }
}

impl fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A complete settings tree for one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "settings", rename_all = "snake_case")]
pub enum ConfigurationTree {
    Barcode(BarcodeSettings),
    Rfid(RfidSettings),
    Common(CommonParams),
    AutoLinkProfile(AutoLinkProfileSettings),
}

impl ConfigurationTree {
    /// Default tree for `scope`.
    pub fn default_for(scope: ConfigScope) -> Self {
        match scope {
            ConfigScope::Barcode => Self::Barcode(BarcodeSettings::default()),
            ConfigScope::Rfid => Self::Rfid(RfidSettings::default()),
            ConfigScope::Common => Self::Common(CommonParams::default()),
            ConfigScope::AutoLinkProfile => {
                Self::AutoLinkProfile(AutoLinkProfileSettings::default())
            }
        }
    }

    pub fn scope(&self) -> ConfigScope {
        match self {
            Self::Barcode(_) => ConfigScope::Barcode,
            Self::Rfid(_) => ConfigScope::Rfid,
            Self::Common(_) => ConfigScope::Common,
            Self::AutoLinkProfile(_) => ConfigScope::AutoLinkProfile,
        }
    }

    fn walk<W: Walker>(&mut self, w: &mut W) {
        match self {
            Self::Barcode(s) => s.walk(w),
            Self::Rfid(s) => s.walk(w),
            Self::Common(s) => s.walk(w),
            Self::AutoLinkProfile(s) => s.walk(w),
        }
    }

    /// Check every leaf in schema order.
    ///
    /// # Errors
    /// The first leaf outside its documented range, by dotted path.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        let mut validator = Validator::new();
        self.clone().walk(&mut validator);
        validator.finish()
    }

    /// All leaves as `path=value` fields, in schema order.
    pub fn fields(&self) -> Vec<String> {
        let mut encoder = Encoder::new();
        self.clone().walk(&mut encoder);
        encoder.finish()
    }

    /// Render the `SET` command for this tree.
    ///
    /// # Errors
    /// Returns `Error::Validation` when the tree fails [`validate`](Self::validate);
    /// nothing is rendered in that case.
    pub fn to_command(&self) -> Result<Frame> {
        self.validate()?;
        Ok(Frame::text(self.render("SET")))
    }

    /// Render the device's `DAT` reply carrying this tree.
    pub fn to_response(&self) -> Result<Frame> {
        self.validate()?;
        Ok(Frame::text(self.render("DAT")))
    }

    fn render(&self, verb: &str) -> String {
        let mut out = format!("{verb}{DELIMITER_FIELD}{}", self.scope());
        for field in self.fields() {
            out.push(DELIMITER_FIELD);
            out.push_str(&field);
        }
        out
    }

    /// Parse a `DAT]<scope>]k=v...` reply frame.
    ///
    /// # Errors
    /// `MalformedResponse` when the frame is not a configuration reply, a
    /// leaf is missing, or a value does not fit its leaf.
    pub fn from_response(frame: &Frame) -> Result<Self> {
        let text = frame.as_text()?;
        let payload = TextPayload::parse(text);
        if payload.verb != "DAT" {
            return Err(Error::malformed(format!(
                "expected a DAT reply, got {}",
                payload.verb
            )));
        }
        Self::from_fields(&payload.fields)
    }

    /// Parse the body of a data reply (`<scope>]k=v...`).
    pub fn from_body(body: &str) -> Result<Self> {
        let fields: Vec<&str> = body.split(DELIMITER_FIELD).collect();
        Self::from_fields(&fields)
    }

    /// Parse `[<scope>, k=v, ...]`. Unknown keys are ignored.
    pub fn from_fields(fields: &[&str]) -> Result<Self> {
        let (scope, leaves) = fields
            .split_first()
            .ok_or_else(|| Error::malformed("configuration reply has no scope"))?;
        let scope = ConfigScope::from_code(scope)
            .ok_or_else(|| Error::malformed(format!("unknown configuration scope {scope:?}")))?;

        let map = FieldMap::parse(leaves.iter().copied().filter(|f| !f.is_empty()))?;
        let mut tree = Self::default_for(scope);
        let mut decoder = Decoder::new(&map);
        tree.walk(&mut decoder);
        decoder.finish()?;

        tree.validate().map_err(|e| {
            Error::malformed(format!("device reported an invalid value: {e}"))
        })?;
        Ok(tree)
    }

    /// Number of physical lines a barcode read is split into.
    pub fn barcode_lines(&self) -> Option<usize> {
        match self {
            Self::Barcode(s) => Some(s.decode.multi_line.line_count()),
            _ => None,
        }
    }
}
