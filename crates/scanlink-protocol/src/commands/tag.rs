//! Parameters of RFID tag operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use scanlink_core::{
    Error, Result,
    constants::{MAX_FILTER_BIT_LENGTH, MAX_FILTER_BIT_OFFSET, MAX_UII_LEN, TAG_PASSWORD_LEN},
};

use crate::field::{parse_hex, to_hex};

/// Tag memory bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfidBank {
    Reserved,
    Uii,
    Tid,
    User,
}

impl RfidBank {
    pub fn code(&self) -> u8 {
        match self {
            RfidBank::Reserved => 0,
            RfidBank::Uii => 1,
            RfidBank::Tid => 2,
            RfidBank::User => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(RfidBank::Reserved),
            1 => Some(RfidBank::Uii),
            2 => Some(RfidBank::Tid),
            3 => Some(RfidBank::User),
            _ => None,
        }
    }
}

/// 32-bit tag access password.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AccessPassword([u8; TAG_PASSWORD_LEN]);

impl AccessPassword {
    pub const fn new(bytes: [u8; TAG_PASSWORD_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_u32(value: u32) -> Self {
        Self(value.to_be_bytes())
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; TAG_PASSWORD_LEN]
    }

    pub fn as_bytes(&self) -> &[u8; TAG_PASSWORD_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }

    pub fn from_hex(raw: &str) -> Result<Self> {
        let bytes = parse_hex(raw, "access password")?;
        let bytes: [u8; TAG_PASSWORD_LEN] = bytes
            .try_into()
            .map_err(|_| Error::protocol(format!("access password must be 4 bytes: {raw:?}")))?;
        Ok(Self(bytes))
    }
}

// Never print the password itself.
impl fmt::Debug for AccessPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessPassword(****)")
    }
}

/// Which tag an `OpenRead` addresses; without one every tag in the field is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagTarget {
    Uii(Vec<u8>),
    /// Registered filter or batch index.
    Index(u16),
}

/// Read `size` words from `bank` starting at word `addr`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub bank: RfidBank,
    pub addr: u16,
    pub size: u16,
    pub password: AccessPassword,
    pub target: Option<TagTarget>,
}

impl ReadRequest {
    pub fn new(bank: RfidBank, addr: u16, size: u16) -> Self {
        Self {
            bank,
            addr,
            size,
            password: AccessPassword::zero(),
            target: None,
        }
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.size == 0 {
            return Err(Error::encoding("OpenRead size must be at least one word"));
        }
        if let Some(TagTarget::Uii(uii)) = &self.target {
            check_uii(uii)?;
        }
        Ok(())
    }
}

/// Write `data` to one tag identified by `uii`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub bank: RfidBank,
    pub addr: u16,
    pub password: AccessPassword,
    pub uii: Vec<u8>,
    /// Whole words; the length must be even.
    pub data: Vec<u8>,
    /// Time the device may spend on the tag, in milliseconds.
    pub timeout_ms: u32,
}

impl WriteRequest {
    /// Word count implied by `data`.
    pub fn size(&self) -> u16 {
        (self.data.len() / 2) as u16
    }

    pub(crate) fn check(&self) -> Result<()> {
        check_uii(&self.uii)?;
        if self.data.is_empty() || self.data.len() % 2 != 0 {
            return Err(Error::encoding(format!(
                "write data must be a non-empty whole number of words, got {} bytes",
                self.data.len()
            )));
        }
        if self.data.len() > usize::from(u16::MAX) {
            return Err(Error::encoding("write data too long"));
        }
        Ok(())
    }
}

/// Memory areas affected by a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockTargets(u8);

impl LockTargets {
    pub const USER: Self = Self(0x01);
    pub const TID: Self = Self(0x02);
    pub const UII: Self = Self(0x04);
    pub const ACCESS_PASSWORD: Self = Self(0x08);
    pub const KILL_PASSWORD: Self = Self(0x10);

    const ALL_BITS: u8 = 0x1F;

    pub fn from_bits(bits: u8) -> Option<Self> {
        (bits != 0 && bits & !Self::ALL_BITS == 0).then_some(Self(bits))
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for LockTargets {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    Unlock,
    Lock,
    PermanentUnlock,
    PermanentLock,
}

impl LockKind {
    pub fn code(&self) -> u8 {
        match self {
            LockKind::Unlock => 0,
            LockKind::Lock => 1,
            LockKind::PermanentUnlock => 2,
            LockKind::PermanentLock => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(LockKind::Unlock),
            1 => Some(LockKind::Lock),
            2 => Some(LockKind::PermanentUnlock),
            3 => Some(LockKind::PermanentLock),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRequest {
    pub targets: LockTargets,
    pub kind: LockKind,
    pub password: AccessPassword,
    pub uii: Vec<u8>,
    pub timeout_ms: u32,
}

impl LockRequest {
    pub(crate) fn check(&self) -> Result<()> {
        check_uii(&self.uii)?;
        if LockTargets::from_bits(self.targets.bits()).is_none() {
            return Err(Error::encoding(format!(
                "invalid lock target mask {:#04x}",
                self.targets.bits()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillRequest {
    pub password: AccessPassword,
    pub uii: Vec<u8>,
    pub timeout_ms: u32,
}

impl KillRequest {
    pub(crate) fn check(&self) -> Result<()> {
        check_uii(&self.uii)?;
        if self.password.is_zero() {
            return Err(Error::encoding("kill requires a non-zero kill password"));
        }
        Ok(())
    }
}

fn check_uii(uii: &[u8]) -> Result<()> {
    if uii.is_empty() || uii.len() > MAX_UII_LEN {
        return Err(Error::encoding(format!(
            "UII must be 1..={MAX_UII_LEN} bytes, got {}",
            uii.len()
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    #[default]
    And,
    Or,
}

impl FilterOp {
    pub fn code(&self) -> &'static str {
        match self {
            FilterOp::And => "AND",
            FilterOp::Or => "OR",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "AND" => Some(FilterOp::And),
            "OR" => Some(FilterOp::Or),
            _ => None,
        }
    }
}

/// Inventory filter: tags whose `bank` bits at `bit_offset` match `data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilter {
    pub bank: RfidBank,
    pub bit_offset: u32,
    pub bit_length: u16,
    /// `ceil(bit_length / 8)` bytes, most significant bit first.
    pub data: Vec<u8>,
}

impl TagFilter {
    pub(crate) fn check(&self) -> Result<()> {
        if self.bank == RfidBank::Reserved {
            return Err(Error::encoding("filters cannot match the reserved bank"));
        }
        if self.bit_offset > MAX_FILTER_BIT_OFFSET {
            return Err(Error::encoding(format!(
                "filter bit offset {:#x} exceeds {MAX_FILTER_BIT_OFFSET:#x}",
                self.bit_offset
            )));
        }
        if self.bit_length == 0 || self.bit_length > MAX_FILTER_BIT_LENGTH {
            return Err(Error::encoding(format!(
                "filter bit length {} outside 1..={MAX_FILTER_BIT_LENGTH}",
                self.bit_length
            )));
        }
        let needed = usize::from(self.bit_length).div_ceil(8);
        if self.data.len() != needed {
            return Err(Error::encoding(format!(
                "filter of {} bits needs {needed} data bytes, got {}",
                self.bit_length,
                self.data.len()
            )));
        }
        Ok(())
    }
}

/// One slice of a firmware image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareChunk {
    pub offset: u32,
    /// Size of the whole image.
    pub total: u32,
    pub data: Vec<u8>,
}

impl FirmwareChunk {
    pub fn is_last(&self) -> bool {
        u64::from(self.offset) + self.data.len() as u64 == u64::from(self.total)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.data.is_empty() || self.data.len() > usize::from(u16::MAX) {
            return Err(Error::encoding(format!(
                "firmware chunk must carry 1..=65535 bytes, got {}",
                self.data.len()
            )));
        }
        if u64::from(self.offset) + self.data.len() as u64 > u64::from(self.total) {
            return Err(Error::encoding(format!(
                "firmware chunk at {} with {} bytes overruns image of {} bytes",
                self.offset,
                self.data.len(),
                self.total
            )));
        }
        Ok(())
    }
}

pub(crate) fn tag_timeout(timeout_ms: u32) -> Duration {
    Duration::from_millis(u64::from(timeout_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_password_hex() {
        let password = AccessPassword::from_u32(0x1234ABCD);
        assert_eq!(password.to_hex(), "1234ABCD");
        assert_eq!(AccessPassword::from_hex("1234abcd").unwrap(), password);
        assert!(AccessPassword::from_hex("1234").is_err());
        assert_eq!(format!("{password:?}"), "AccessPassword(****)");
    }

    #[rstest]
    #[case(0x00, false)]
    #[case(0x01, true)]
    #[case(0x1F, true)]
    #[case(0x20, false)]
    fn test_lock_target_bits(#[case] bits: u8, #[case] ok: bool) {
        assert_eq!(LockTargets::from_bits(bits).is_some(), ok);
    }

    #[test]
    fn test_lock_target_union() {
        let targets = LockTargets::UII | LockTargets::USER;
        assert_eq!(targets.bits(), 0x05);
        assert!(targets.contains(LockTargets::UII));
        assert!(!targets.contains(LockTargets::TID));
    }

    #[rstest]
    #[case(RfidBank::Uii, 0, 8, vec![0x30], true)]
    #[case(RfidBank::Uii, 0, 9, vec![0x30], false)]
    #[case(RfidBank::Tid, 0x7FFFF, 16, vec![0xE2, 0x80], true)]
    #[case(RfidBank::Tid, 0x80000, 16, vec![0xE2, 0x80], false)]
    #[case(RfidBank::User, 0, 0, vec![], false)]
    #[case(RfidBank::Reserved, 0, 8, vec![0x00], false)]
    fn test_filter_check(
        #[case] bank: RfidBank,
        #[case] bit_offset: u32,
        #[case] bit_length: u16,
        #[case] data: Vec<u8>,
        #[case] ok: bool,
    ) {
        let filter = TagFilter {
            bank,
            bit_offset,
            bit_length,
            data,
        };
        assert_eq!(filter.check().is_ok(), ok);
    }

    #[test]
    fn test_firmware_chunk_bounds() {
        let chunk = FirmwareChunk {
            offset: 10,
            total: 12,
            data: vec![1, 2],
        };
        assert!(chunk.check().is_ok());
        assert!(chunk.is_last());

        let overrun = FirmwareChunk {
            data: vec![1, 2, 3],
            ..chunk
        };
        assert!(overrun.check().is_err());
    }
}
