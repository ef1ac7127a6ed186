use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of one device session, unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Allocate a fresh random session id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a device session.
///
/// `Discovered → Claimed → (CloseWait) → Closed`, with `Unknown` reachable
/// from any state when the link can no longer be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScannerStatus {
    /// Accessory is known but no session owns it.
    Discovered,
    /// Session owns the accessory and accepts commands.
    Claimed,
    /// Accessory disconnected; waiting for the owner to call `close()`.
    CloseWait,
    /// Session released the accessory.
    Closed,
    /// Protocol invariant violated; only `close()` is accepted.
    Unknown,
}

impl fmt::Display for ScannerStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ScannerStatus::Discovered => "Discovered",
            ScannerStatus::Claimed => "Claimed",
            ScannerStatus::CloseWait => "CloseWait",
            ScannerStatus::Closed => "Closed",
            ScannerStatus::Unknown => "Unknown",
        };
        write!(f, "{name}")
    }
}

/// Physical key on the accessory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyName {
    Trigger,
}

impl KeyName {
    /// Wire code of the key.
    pub fn code(&self) -> &'static str {
        match self {
            KeyName::Trigger => "TRG",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "TRG" => Some(KeyName::Trigger),
            _ => None,
        }
    }
}

/// Position of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    Released,
    Pressed,
}

impl KeyState {
    pub fn code(&self) -> &'static str {
        match self {
            KeyState::Released => "0",
            KeyState::Pressed => "1",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "0" => Some(KeyState::Released),
            "1" => Some(KeyState::Pressed),
            _ => None,
        }
    }
}

/// A key press or release reported by the accessory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: KeyName,
    pub state: KeyState,
    /// Host time at which the event was decoded.
    pub received_at: DateTime<Utc>,
}

impl KeyEvent {
    #[must_use]
    pub fn new(key: KeyName, state: KeyState) -> Self {
        Self {
            key,
            state,
            received_at: Utc::now(),
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.state == KeyState::Pressed
    }
}

/// Buzzer pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuzzerType {
    /// 60 ms beep.
    B1,
    /// 80 ms beep.
    B2,
    /// 120 ms beep.
    B3,
}

impl BuzzerType {
    pub fn code(&self) -> u8 {
        match self {
            BuzzerType::B1 => 1,
            BuzzerType::B2 => 2,
            BuzzerType::B3 => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(BuzzerType::B1),
            2 => Some(BuzzerType::B2),
            3 => Some(BuzzerType::B3),
            _ => None,
        }
    }

    /// How long the device sounds the buzzer.
    pub fn duration_ms(&self) -> u64 {
        match self {
            BuzzerType::B1 => 60,
            BuzzerType::B2 => 80,
            BuzzerType::B3 => 120,
        }
    }
}

/// Which LED to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedType {
    Led1,
    Led2,
    Led3,
}

impl LedType {
    pub fn code(&self) -> u8 {
        match self {
            LedType::Led1 => 1,
            LedType::Led2 => 2,
            LedType::Led3 => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(LedType::Led1),
            2 => Some(LedType::Led2),
            3 => Some(LedType::Led3),
            _ => None,
        }
    }
}

/// LED color supported by the accessory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedColor {
    Red,
    Orange,
    Blue,
    Green,
}

impl LedColor {
    pub fn code(&self) -> &'static str {
        match self {
            LedColor::Red => "R",
            LedColor::Orange => "O",
            LedColor::Blue => "B",
            LedColor::Green => "G",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "R" => Some(LedColor::Red),
            "O" => Some(LedColor::Orange),
            "B" => Some(LedColor::Blue),
            "G" => Some(LedColor::Green),
            _ => None,
        }
    }
}

/// Subsystem reset by an `Init` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitScope {
    Comm,
    Bluetooth,
    Rfid,
    Barcode,
    All,
}

impl InitScope {
    pub fn code(&self) -> &'static str {
        match self {
            InitScope::Comm => "COMM",
            InitScope::Bluetooth => "BT",
            InitScope::Rfid => "RFID",
            InitScope::Barcode => "BARCODE",
            InitScope::All => "ALL",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "COMM" => Some(InitScope::Comm),
            "BT" => Some(InitScope::Bluetooth),
            "RFID" => Some(InitScope::Rfid),
            "BARCODE" => Some(InitScope::Barcode),
            "ALL" => Some(InitScope::All),
            _ => None,
        }
    }
}

/// Reading hardware fitted to the accessory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScannerType {
    OneD,
    TwoD,
    TwoDLong,
    Rfid,
    TwoDRfid,
    Unknown,
}

impl ScannerType {
    pub fn code(&self) -> &'static str {
        match self {
            ScannerType::OneD => "1D",
            ScannerType::TwoD => "2D",
            ScannerType::TwoDLong => "2DL",
            ScannerType::Rfid => "RFID",
            ScannerType::TwoDRfid => "2DRFID",
            ScannerType::Unknown => "UNK",
        }
    }

    /// Unrecognised codes map to [`ScannerType::Unknown`].
    pub fn from_code(code: &str) -> Self {
        match code {
            "1D" => ScannerType::OneD,
            "2D" => ScannerType::TwoD,
            "2DL" => ScannerType::TwoDLong,
            "RFID" => ScannerType::Rfid,
            "2DRFID" => ScannerType::TwoDRfid,
            _ => ScannerType::Unknown,
        }
    }

    pub fn has_barcode(&self) -> bool {
        matches!(
            self,
            ScannerType::OneD | ScannerType::TwoD | ScannerType::TwoDLong | ScannerType::TwoDRfid
        )
    }

    pub fn has_rfid(&self) -> bool {
        matches!(self, ScannerType::Rfid | ScannerType::TwoDRfid)
    }
}

/// Coarse battery level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryLevel {
    Under10,
    Under40,
    Over40,
}

impl BatteryLevel {
    pub fn code(&self) -> u8 {
        match self {
            BatteryLevel::Under10 => 0,
            BatteryLevel::Under40 => 1,
            BatteryLevel::Over40 => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(BatteryLevel::Under10),
            1 => Some(BatteryLevel::Under40),
            2 => Some(BatteryLevel::Over40),
            _ => None,
        }
    }
}

/// Identity strings reported by the accessory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerIdentity {
    pub serial_number: String,
    pub part_number: String,
    pub firmware_version: String,
    pub model: String,
    pub region: String,
    pub scanner_type: ScannerType,
}
