//! The three walkers behind validate / encode / decode.

use std::fmt;

use scanlink_core::{Error, Result, ValidationError};

use super::{Bounds, Choice, Numeric, SettingsNode, TextRule, Walker};
use crate::field::{FieldMap, is_decimal};
use crate::validation::validate_field;

/// Dotted path of the node currently being walked.
#[derive(Debug, Default)]
struct Path {
    segments: Vec<String>,
}

impl Path {
    fn push(&mut self, key: &str) {
        self.segments.push(key.to_string());
    }

    fn pop(&mut self) {
        self.segments.pop();
    }

    fn leaf(&self, key: &str) -> String {
        if self.segments.is_empty() {
            key.to_string()
        } else {
            format!("{}.{key}", self.segments.join("."))
        }
    }
}

/// Stops at the first violation, in walk order.
#[derive(Debug, Default)]
pub struct Validator {
    path: Path,
    error: Option<ValidationError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> std::result::Result<(), ValidationError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn done(&self) -> bool {
        self.error.is_some()
    }
}

impl Walker for Validator {
    fn flag(&mut self, _key: &str, _value: &mut bool) {}

    fn number<T: Numeric>(&mut self, key: &str, value: &mut T, bounds: Bounds) {
        if self.done() {
            return;
        }
        let raw: u64 = (*value).into();
        if !bounds.contains(raw) {
            self.error = Some(ValidationError::range(
                self.path.leaf(key),
                raw,
                bounds.describe(),
            ));
        }
    }

    fn choice<C: Choice>(&mut self, _key: &str, _value: &mut C) {}

    fn text(&mut self, key: &str, value: &mut String, rule: TextRule) {
        if self.done() {
            return;
        }
        let field = self.path.leaf(key);
        if let Err(err) = validate_field(&field, value) {
            self.error = Some(err);
        } else if !rule.accepts(value) {
            self.error = Some(ValidationError::range(
                field,
                format!("{value:?}"),
                rule.describe(),
            ));
        }
    }

    fn node<N: SettingsNode>(&mut self, key: &str, node: &mut N) {
        if self.done() {
            return;
        }
        self.path.push(key);
        node.walk(self);
        self.path.pop();
    }

    fn check(&mut self, key: &str, ok: bool, value: &dyn fmt::Display, allowed: &str) {
        if !self.done() && !ok {
            self.error = Some(ValidationError::range(self.path.leaf(key), value, allowed));
        }
    }
}

/// Renders every leaf as `path=value`.
#[derive(Debug, Default)]
pub struct Encoder {
    path: Path,
    fields: Vec<String>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> Vec<String> {
        self.fields
    }

    fn push(&mut self, key: &str, value: impl fmt::Display) {
        self.fields.push(format!("{}={value}", self.path.leaf(key)));
    }
}

impl Walker for Encoder {
    fn flag(&mut self, key: &str, value: &mut bool) {
        self.push(key, u8::from(*value));
    }

    fn number<T: Numeric>(&mut self, key: &str, value: &mut T, _bounds: Bounds) {
        self.push(key, *value);
    }

    fn choice<C: Choice>(&mut self, key: &str, value: &mut C) {
        self.push(key, value.code());
    }

    fn text(&mut self, key: &str, value: &mut String, _rule: TextRule) {
        let rendered = value.clone();
        self.push(key, rendered);
    }

    fn node<N: SettingsNode>(&mut self, key: &str, node: &mut N) {
        self.path.push(key);
        node.walk(self);
        self.path.pop();
    }

    fn check(&mut self, _key: &str, _ok: bool, _value: &dyn fmt::Display, _allowed: &str) {}
}

/// Overwrites every leaf from a parsed reply.
///
/// Range checks are left to a validation pass over the result.
#[derive(Debug)]
pub struct Decoder<'a> {
    path: Path,
    fields: &'a FieldMap,
    error: Option<Error>,
}

impl<'a> Decoder<'a> {
    pub fn new(fields: &'a FieldMap) -> Self {
        Self {
            path: Path::default(),
            fields,
            error: None,
        }
    }

    pub fn finish(self) -> Result<()> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Raw value of `key`, recording a missing-field error on first failure.
    fn raw(&mut self, key: &str) -> Option<(String, &'a str)> {
        if self.error.is_some() {
            return None;
        }
        let path = self.path.leaf(key);
        let fields: &'a FieldMap = self.fields;
        match fields.require(&path) {
            Ok(raw) => Some((path, raw)),
            Err(err) => {
                self.error = Some(err);
                None
            }
        }
    }

    fn bad_value(&mut self, path: &str, raw: &str) {
        self.error = Some(Error::malformed(format!("invalid value {raw:?} for {path}")));
    }
}

impl Walker for Decoder<'_> {
    fn flag(&mut self, key: &str, value: &mut bool) {
        let Some((path, raw)) = self.raw(key) else {
            return;
        };
        match raw {
            "0" => *value = false,
            "1" => *value = true,
            _ => self.bad_value(&path, raw),
        }
    }

    fn number<T: Numeric>(&mut self, key: &str, value: &mut T, _bounds: Bounds) {
        let Some((path, raw)) = self.raw(key) else {
            return;
        };
        let parsed = is_decimal(raw).then(|| raw.parse::<u64>().ok()).flatten();
        match parsed.and_then(|n| T::try_from(n).ok()) {
            Some(n) => *value = n,
            None => self.bad_value(&path, raw),
        }
    }

    fn choice<C: Choice>(&mut self, key: &str, value: &mut C) {
        let Some((path, raw)) = self.raw(key) else {
            return;
        };
        let parsed = is_decimal(raw).then(|| raw.parse::<u32>().ok()).flatten();
        match parsed.and_then(C::from_code) {
            Some(c) => *value = c,
            None => self.bad_value(&path, raw),
        }
    }

    fn text(&mut self, key: &str, value: &mut String, _rule: TextRule) {
        if let Some((_, raw)) = self.raw(key) {
            *value = raw.to_string();
        }
    }

    fn node<N: SettingsNode>(&mut self, key: &str, node: &mut N) {
        if self.error.is_some() {
            return;
        }
        self.path.push(key);
        node.walk(self);
        self.path.pop();
    }

    fn check(&mut self, _key: &str, _ok: bool, _value: &dyn fmt::Display, _allowed: &str) {}
}
