//! Negotiated shape of inbound data payloads.

use serde::{Deserialize, Serialize};

use scanlink_core::{Error, Result};

/// Wire encoding of data payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadEncoding {
    #[default]
    Binary,
    Text,
}

impl PayloadEncoding {
    pub fn code(&self) -> &'static str {
        match self {
            PayloadEncoding::Binary => "B",
            PayloadEncoding::Text => "T",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "B" => Some(PayloadEncoding::Binary),
            "T" => Some(PayloadEncoding::Text),
            _ => None,
        }
    }
}

/// Optional fields appended to every RFID record.
///
/// The flags are negotiated once per session with `RSP`. A decoded
/// [`RfidRecord`](super::RfidRecord) carries exactly the fields enabled here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ResponseFormat {
    pub encoding: PayloadEncoding,
    pub index: bool,
    pub pc: bool,
    pub rssi: bool,
    pub antenna: bool,
    pub polarization: bool,
    pub channel: bool,
    pub phase: bool,
    pub auto_link_profile: bool,
}

impl ResponseFormat {
    /// Binary encoding with no optional fields.
    pub const fn binary() -> Self {
        Self {
            encoding: PayloadEncoding::Binary,
            index: false,
            pc: false,
            rssi: false,
            antenna: false,
            polarization: false,
            channel: false,
            phase: false,
            auto_link_profile: false,
        }
    }

    /// Text encoding with no optional fields.
    pub const fn text() -> Self {
        Self {
            encoding: PayloadEncoding::Text,
            ..Self::binary()
        }
    }

    /// Flags in wire order: index, pc, rssi, antenna, polarization,
    /// channel, phase, auto link profile.
    pub fn flags(&self) -> [bool; 8] {
        [
            self.index,
            self.pc,
            self.rssi,
            self.antenna,
            self.polarization,
            self.channel,
            self.phase,
            self.auto_link_profile,
        ]
    }

    pub fn with_flags(encoding: PayloadEncoding, flags: [bool; 8]) -> Self {
        let [index, pc, rssi, antenna, polarization, channel, phase, auto_link_profile] = flags;
        Self {
            encoding,
            index,
            pc,
            rssi,
            antenna,
            polarization,
            channel,
            phase,
            auto_link_profile,
        }
    }

    /// Flags rendered as eight `0`/`1` digits.
    pub fn flag_digits(&self) -> String {
        self.flags()
            .iter()
            .map(|&f| if f { '1' } else { '0' })
            .collect()
    }

    /// Parse the eight flag digits of an `RSP` request.
    pub fn from_flag_digits(encoding: PayloadEncoding, digits: &str) -> Result<Self> {
        let bytes = digits.as_bytes();
        if bytes.len() != 8 {
            return Err(Error::protocol(format!(
                "response format needs 8 flag digits, got {digits:?}"
            )));
        }
        let mut flags = [false; 8];
        for (flag, b) in flags.iter_mut().zip(bytes) {
            *flag = match b {
                b'0' => false,
                b'1' => true,
                _ => {
                    return Err(Error::protocol(format!(
                        "invalid response format flags {digits:?}"
                    )));
                }
            };
        }
        Ok(Self::with_flags(encoding, flags))
    }

    /// Text records can only carry PC, RSSI, antenna and polarization.
    ///
    /// # Errors
    /// `Encoding` when a flag the text format cannot express is enabled.
    pub fn validate(&self) -> Result<()> {
        if self.encoding == PayloadEncoding::Text
            && (self.index || self.channel || self.phase || self.auto_link_profile)
        {
            return Err(Error::encoding(
                "text response format supports only pc, rssi, antenna and polarization",
            ));
        }
        Ok(())
    }
}

/// How barcode payloads are framed for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarcodeFormat {
    pub encoding: PayloadEncoding,
    /// Physical lines per logical read; more than one enables reassembly.
    pub lines: usize,
}

impl BarcodeFormat {
    pub fn new(encoding: PayloadEncoding, lines: usize) -> Self {
        Self {
            encoding,
            lines: lines.max(1),
        }
    }

    pub fn is_multi_line(&self) -> bool {
        self.lines > 1
    }
}

impl Default for BarcodeFormat {
    fn default() -> Self {
        Self::new(PayloadEncoding::Binary, 1)
    }
}
