//! Command Codec: host requests and their wire frames.
//!
//! Configuration and simple commands travel as text frames (`VERB]field...`).
//! Tag writes, locks, kills and firmware chunks carry raw bytes and travel as
//! binary frames whose first payload byte is an opcode.
//!
//! ```
//! use scanlink_core::{BuzzerType, LedColor, LedType};
//! use scanlink_protocol::commands::Request;
//!
//! let frame = Request::Led(LedType::Led2, LedColor::Green).encode().unwrap();
//! assert_eq!(frame.as_text().unwrap(), "LED]2]G");
//!
//! let frame = Request::Buzzer(BuzzerType::B3).encode().unwrap();
//! assert_eq!(frame.as_text().unwrap(), "BZR]3");
//! ```

mod tag;

pub use tag::{
    AccessPassword, FilterOp, FirmwareChunk, KillRequest, LockKind, LockRequest, LockTargets,
    ReadRequest, RfidBank, TagFilter, TagTarget, WriteRequest,
};

use bytes::{BufMut, BytesMut};
use std::time::Duration;

use scanlink_core::{
    BuzzerType, Error, InitScope, KeyName, LedColor, LedType, Result,
    constants::{DELIMITER_FIELD, DELIMITER_SUBFIELD},
};

use crate::cursor::Cursor;
use crate::field::{TextPayload, parse_hex, parse_hex_number, parse_hex_word, parse_number, to_hex};
use crate::frame::Frame;
use crate::reply::ReplyKind;
use crate::response::{PayloadEncoding, ResponseFormat};
use crate::settings::{ConfigScope, ConfigurationTree};

const OP_WRITE: u8 = b'W';
const OP_LOCK: u8 = b'L';
const OP_KILL: u8 = b'K';
const OP_FIRMWARE: u8 = b'F';

/// A request the host sends to the accessory.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    SetConfig(ConfigurationTree),
    GetConfig(ConfigScope),
    /// Persist the applied configuration on the device.
    SaveParams,
    Buzzer(BuzzerType),
    Led(LedType, LedColor),
    Init(InitScope),
    /// Start the barcode reader.
    OpenReader,
    CloseReader,
    OpenInventory {
        index: Option<u16>,
    },
    CloseInventory,
    OpenRead(ReadRequest),
    WriteTag(WriteRequest),
    LockTag(LockRequest),
    KillTag(KillRequest),
    SetFilter {
        filters: Vec<TagFilter>,
        op: FilterOp,
    },
    ClearFilter,
    SetResponseFormat(ResponseFormat),
    /// Number of tags buffered under `index`.
    GetCount {
        index: u16,
    },
    /// Fetch the tags buffered under `index`.
    PullData {
        index: u16,
    },
    ClearDoubleReadingBuffer,
    SetAutoLinkProfile(bool),
    GetInfo,
    GetBattery,
    GetKeyStatus(KeyName),
    FirmwareChunk(FirmwareChunk),
}

impl Request {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Request::SetConfig(_) => "SetConfig",
            Request::GetConfig(_) => "GetConfig",
            Request::SaveParams => "SaveParams",
            Request::Buzzer(_) => "Buzzer",
            Request::Led(..) => "Led",
            Request::Init(_) => "Init",
            Request::OpenReader => "OpenReader",
            Request::CloseReader => "CloseReader",
            Request::OpenInventory { .. } => "OpenInventory",
            Request::CloseInventory => "CloseInventory",
            Request::OpenRead(_) => "OpenRead",
            Request::WriteTag(_) => "WriteTag",
            Request::LockTag(_) => "LockTag",
            Request::KillTag(_) => "KillTag",
            Request::SetFilter { .. } => "SetFilter",
            Request::ClearFilter => "ClearFilter",
            Request::SetResponseFormat(_) => "SetResponseFormat",
            Request::GetCount { .. } => "GetCount",
            Request::PullData { .. } => "PullData",
            Request::ClearDoubleReadingBuffer => "ClearDoubleReadingBuffer",
            Request::SetAutoLinkProfile(_) => "SetAutoLinkProfile",
            Request::GetInfo => "GetInfo",
            Request::GetBattery => "GetBattery",
            Request::GetKeyStatus(_) => "GetKeyStatus",
            Request::FirmwareChunk(_) => "FirmwareChunk",
        }
    }

    /// Shape of a successful reply.
    pub fn expects(&self) -> ReplyKind {
        match self {
            Request::GetConfig(_)
            | Request::GetCount { .. }
            | Request::PullData { .. }
            | Request::GetInfo
            | Request::GetBattery
            | Request::GetKeyStatus(_) => ReplyKind::Data,
            _ => ReplyKind::Ack,
        }
    }

    /// Time the device itself may spend before replying, on top of the
    /// link round trip.
    pub fn device_timeout(&self) -> Duration {
        match self {
            Request::WriteTag(w) => tag::tag_timeout(w.timeout_ms),
            Request::LockTag(l) => tag::tag_timeout(l.timeout_ms),
            Request::KillTag(k) => tag::tag_timeout(k.timeout_ms),
            _ => Duration::ZERO,
        }
    }

    /// Encode into a wire frame.
    ///
    /// # Errors
    /// `Validation` for an invalid configuration tree, `Encoding` when the
    /// request's fields are not a valid combination.
    pub fn encode(&self) -> Result<Frame> {
        let frame = match self {
            Request::SetConfig(tree) => return tree.to_command(),
            Request::GetConfig(scope) => text(&["GET", scope.code()]),
            Request::SaveParams => Frame::text("SAVE"),
            Request::Buzzer(buzzer) => text(&["BZR", &buzzer.code().to_string()]),
            Request::Led(led, color) => text(&["LED", &led.code().to_string(), color.code()]),
            Request::Init(scope) => text(&["INIT", scope.code()]),
            Request::OpenReader => Frame::text("RDR]1"),
            Request::CloseReader => Frame::text("RDR]0"),
            Request::OpenInventory { index: None } => Frame::text("INV"),
            Request::OpenInventory { index: Some(i) } => text(&["INV", &i.to_string()]),
            Request::CloseInventory => Frame::text("CLS"),
            Request::OpenRead(read) => encode_open_read(read)?,
            Request::WriteTag(write) => encode_write(write)?,
            Request::LockTag(lock) => encode_lock(lock)?,
            Request::KillTag(kill) => encode_kill(kill)?,
            Request::SetFilter { filters, op } => encode_filter(filters, *op)?,
            Request::ClearFilter => Frame::text("FLTCLR"),
            Request::SetResponseFormat(format) => {
                format.validate()?;
                text(&["RSP", format.encoding.code(), &format.flag_digits()])
            }
            Request::GetCount { index } => text(&["CNT", &index.to_string()]),
            Request::PullData { index } => text(&["PULL", &index.to_string()]),
            Request::ClearDoubleReadingBuffer => Frame::text("DRC"),
            Request::SetAutoLinkProfile(on) => text(&["ALP", if *on { "1" } else { "0" }]),
            Request::GetInfo => Frame::text("INFO"),
            Request::GetBattery => Frame::text("BAT"),
            Request::GetKeyStatus(key) => text(&["KEY", key.code()]),
            Request::FirmwareChunk(chunk) => encode_firmware(chunk)?,
        };
        Ok(frame)
    }

    /// Decode a request frame, as the accessory sees it.
    ///
    /// # Errors
    /// `Protocol` for an unknown verb or opcode or malformed fields.
    pub fn decode(frame: &Frame) -> Result<Self> {
        if frame.is_binary() {
            return decode_binary(frame.payload());
        }
        let payload = TextPayload::parse(frame.as_text()?);
        let request = match payload.verb {
            "SET" => Request::SetConfig(
                ConfigurationTree::from_fields(&payload.fields)
                    .map_err(|e| Error::protocol(format!("invalid SET request: {e}")))?,
            ),
            "GET" => Request::GetConfig(scope(&payload)?),
            "SAVE" => Request::SaveParams,
            "BZR" => {
                let code = payload.number(0, "buzzer type")?;
                Request::Buzzer(
                    BuzzerType::from_code(code)
                        .ok_or_else(|| Error::protocol(format!("unknown buzzer type {code}")))?,
                )
            }
            "LED" => {
                let code = payload.number(0, "led")?;
                let led = LedType::from_code(code)
                    .ok_or_else(|| Error::protocol(format!("unknown led {code}")))?;
                let raw = payload.field(1, "color")?;
                let color = LedColor::from_code(raw)
                    .ok_or_else(|| Error::protocol(format!("unknown led color {raw:?}")))?;
                Request::Led(led, color)
            }
            "INIT" => {
                let raw = payload.field(0, "init scope")?;
                Request::Init(
                    InitScope::from_code(raw)
                        .ok_or_else(|| Error::protocol(format!("unknown init scope {raw:?}")))?,
                )
            }
            "RDR" => match payload.field(0, "reader state")? {
                "1" => Request::OpenReader,
                "0" => Request::CloseReader,
                other => return Err(Error::protocol(format!("invalid reader state {other:?}"))),
            },
            "INV" => Request::OpenInventory {
                index: match payload.fields.first() {
                    Some(_) => Some(payload.number(0, "inventory index")?),
                    None => None,
                },
            },
            "CLS" => Request::CloseInventory,
            "RD" => Request::OpenRead(decode_open_read(&payload)?),
            "FLT" => decode_filter(&payload)?,
            "FLTCLR" => Request::ClearFilter,
            "RSP" => {
                let raw = payload.field(0, "encoding")?;
                let encoding = PayloadEncoding::from_code(raw)
                    .ok_or_else(|| Error::protocol(format!("unknown encoding {raw:?}")))?;
                Request::SetResponseFormat(ResponseFormat::from_flag_digits(
                    encoding,
                    payload.field(1, "flags")?,
                )?)
            }
            "CNT" => Request::GetCount {
                index: payload.number(0, "index")?,
            },
            "PULL" => Request::PullData {
                index: payload.number(0, "index")?,
            },
            "DRC" => Request::ClearDoubleReadingBuffer,
            "ALP" => match payload.field(0, "auto link profile")? {
                "1" => Request::SetAutoLinkProfile(true),
                "0" => Request::SetAutoLinkProfile(false),
                other => return Err(Error::protocol(format!("invalid ALP flag {other:?}"))),
            },
            "INFO" => Request::GetInfo,
            "BAT" => Request::GetBattery,
            "KEY" => {
                let raw = payload.field(0, "key")?;
                Request::GetKeyStatus(
                    KeyName::from_code(raw)
                        .ok_or_else(|| Error::protocol(format!("unknown key {raw:?}")))?,
                )
            }
            other => return Err(Error::protocol(format!("unknown request verb {other:?}"))),
        };
        Ok(request)
    }
}

fn text(parts: &[&str]) -> Frame {
    Frame::text(parts.join(&DELIMITER_FIELD.to_string()))
}

fn scope(payload: &TextPayload<'_>) -> Result<ConfigScope> {
    let raw = payload.field(0, "scope")?;
    ConfigScope::from_code(raw).ok_or_else(|| Error::protocol(format!("unknown scope {raw:?}")))
}

fn encode_open_read(read: &ReadRequest) -> Result<Frame> {
    read.check()?;
    let mut out = format!(
        "RD]{}]{:04X}]{:04X}]{}",
        read.bank.code(),
        read.addr,
        read.size,
        read.password.to_hex()
    );
    match &read.target {
        Some(TagTarget::Uii(uii)) => out.push_str(&format!("]U{}", to_hex(uii))),
        Some(TagTarget::Index(i)) => out.push_str(&format!("]I{i}")),
        None => {}
    }
    Ok(Frame::text(out))
}

fn decode_open_read(payload: &TextPayload<'_>) -> Result<ReadRequest> {
    let bank_code = payload.number(0, "bank")?;
    let bank = RfidBank::from_code(bank_code)
        .ok_or_else(|| Error::protocol(format!("unknown bank {bank_code}")))?;
    let addr = parse_hex_word(payload.field(1, "address")?, "address")?;
    let size = parse_hex_word(payload.field(2, "size")?, "size")?;
    let password = AccessPassword::from_hex(payload.field(3, "password")?)?;
    let target = match payload.fields.get(4) {
        None => None,
        Some(raw) => Some(match raw.split_at_checked(1) {
            Some(("U", hex)) => TagTarget::Uii(parse_hex(hex, "uii")?),
            Some(("I", index)) => TagTarget::Index(parse_number(index, "index")?),
            _ => return Err(Error::protocol(format!("invalid read target {raw:?}"))),
        }),
    };
    let read = ReadRequest {
        bank,
        addr,
        size,
        password,
        target,
    };
    read.check()
        .map_err(|e| Error::protocol(format!("invalid read request: {e}")))?;
    Ok(read)
}

fn encode_filter(filters: &[TagFilter], op: FilterOp) -> Result<Frame> {
    if filters.is_empty() {
        return Err(Error::encoding("SetFilter needs at least one filter"));
    }
    let mut out = format!("FLT]{}", op.code());
    for filter in filters {
        filter.check()?;
        out.push(DELIMITER_FIELD);
        out.push_str(&format!(
            "{}{sep}{:X}{sep}{}{sep}{}",
            filter.bank.code(),
            filter.bit_offset,
            filter.bit_length,
            to_hex(&filter.data),
            sep = DELIMITER_SUBFIELD
        ));
    }
    Ok(Frame::text(out))
}

fn decode_filter(payload: &TextPayload<'_>) -> Result<Request> {
    let raw = payload.field(0, "filter op")?;
    let op = FilterOp::from_code(raw)
        .ok_or_else(|| Error::protocol(format!("unknown filter op {raw:?}")))?;
    let mut filters = Vec::new();
    for raw in &payload.fields[1..] {
        let parts: Vec<&str> = raw.split(DELIMITER_SUBFIELD).collect();
        let [bank, offset, bits, data] = parts.as_slice() else {
            return Err(Error::protocol(format!("invalid filter {raw:?}")));
        };
        let bank_code = parse_number(bank, "filter bank")?;
        let filter = TagFilter {
            bank: RfidBank::from_code(bank_code)
                .ok_or_else(|| Error::protocol(format!("unknown bank {bank_code}")))?,
            bit_offset: parse_hex_number(offset, "bit offset")?,
            bit_length: parse_number(bits, "bit length")?,
            data: parse_hex(data, "filter data")?,
        };
        filter
            .check()
            .map_err(|e| Error::protocol(format!("invalid filter: {e}")))?;
        filters.push(filter);
    }
    if filters.is_empty() {
        return Err(Error::protocol("FLT carries no filters"));
    }
    Ok(Request::SetFilter { filters, op })
}

fn put_uii(out: &mut BytesMut, uii: &[u8]) {
    // Length already bounded by the request checks.
    out.put_u8(uii.len() as u8);
    out.put_slice(uii);
}

fn encode_write(write: &WriteRequest) -> Result<Frame> {
    write.check()?;
    let mut out = BytesMut::new();
    out.put_u8(OP_WRITE);
    out.put_u8(write.bank.code());
    out.put_u16(write.addr);
    out.put_u16(write.size());
    out.put_slice(write.password.as_bytes());
    put_uii(&mut out, &write.uii);
    out.put_u32(write.timeout_ms);
    out.put_u16(write.data.len() as u16);
    out.put_slice(&write.data);
    Ok(Frame::binary(out.freeze()))
}

fn encode_lock(lock: &LockRequest) -> Result<Frame> {
    lock.check()?;
    let mut out = BytesMut::new();
    out.put_u8(OP_LOCK);
    out.put_u8(lock.targets.bits());
    out.put_u8(lock.kind.code());
    out.put_slice(lock.password.as_bytes());
    put_uii(&mut out, &lock.uii);
    out.put_u32(lock.timeout_ms);
    Ok(Frame::binary(out.freeze()))
}

fn encode_kill(kill: &KillRequest) -> Result<Frame> {
    kill.check()?;
    let mut out = BytesMut::new();
    out.put_u8(OP_KILL);
    out.put_slice(kill.password.as_bytes());
    put_uii(&mut out, &kill.uii);
    out.put_u32(kill.timeout_ms);
    Ok(Frame::binary(out.freeze()))
}

fn encode_firmware(chunk: &FirmwareChunk) -> Result<Frame> {
    chunk.check()?;
    let mut out = BytesMut::with_capacity(11 + chunk.data.len());
    out.put_u8(OP_FIRMWARE);
    out.put_u32(chunk.offset);
    out.put_u32(chunk.total);
    out.put_u16(chunk.data.len() as u16);
    out.put_slice(&chunk.data);
    Ok(Frame::binary(out.freeze()))
}

fn password(c: &mut Cursor<'_>) -> Result<AccessPassword> {
    let raw = c.take(4, "password")?;
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(raw);
    Ok(AccessPassword::new(bytes))
}

fn uii(c: &mut Cursor<'_>) -> Result<Vec<u8>> {
    let len = usize::from(c.u8("uii length")?);
    Ok(c.take(len, "uii")?.to_vec())
}

fn decode_binary(payload: &[u8]) -> Result<Request> {
    let mut c = Cursor::new(payload);
    let request = match c.u8("opcode")? {
        OP_WRITE => {
            let bank_code = c.u8("bank")?;
            let bank = RfidBank::from_code(bank_code)
                .ok_or_else(|| Error::protocol(format!("unknown bank {bank_code}")))?;
            let addr = c.u16("address")?;
            let size = c.u16("size")?;
            let password = password(&mut c)?;
            let uii = uii(&mut c)?;
            let timeout_ms = c.u32("timeout")?;
            let data_len = usize::from(c.u16("data length")?);
            let data = c.take(data_len, "data")?.to_vec();
            if usize::from(size) * 2 != data.len() {
                return Err(Error::protocol(format!(
                    "write declares {size} words but carries {} bytes",
                    data.len()
                )));
            }
            Request::WriteTag(WriteRequest {
                bank,
                addr,
                password,
                uii,
                data,
                timeout_ms,
            })
        }
        OP_LOCK => {
            let bits = c.u8("lock targets")?;
            let targets = LockTargets::from_bits(bits)
                .ok_or_else(|| Error::protocol(format!("invalid lock targets {bits:#04x}")))?;
            let kind_code = c.u8("lock kind")?;
            let kind = LockKind::from_code(kind_code)
                .ok_or_else(|| Error::protocol(format!("unknown lock kind {kind_code}")))?;
            Request::LockTag(LockRequest {
                targets,
                kind,
                password: password(&mut c)?,
                uii: uii(&mut c)?,
                timeout_ms: c.u32("timeout")?,
            })
        }
        OP_KILL => Request::KillTag(KillRequest {
            password: password(&mut c)?,
            uii: uii(&mut c)?,
            timeout_ms: c.u32("timeout")?,
        }),
        OP_FIRMWARE => {
            let offset = c.u32("offset")?;
            let total = c.u32("total")?;
            let len = usize::from(c.u16("chunk length")?);
            Request::FirmwareChunk(FirmwareChunk {
                offset,
                total,
                data: c.take(len, "chunk")?.to_vec(),
            })
        }
        other => return Err(Error::protocol(format!("unknown request opcode {other:#04x}"))),
    };
    c.finish("request")?;
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::Reply;
    use rstest::rstest;

    fn write_request(data: Vec<u8>) -> WriteRequest {
        WriteRequest {
            bank: RfidBank::User,
            addr: 2,
            password: AccessPassword::zero(),
            uii: vec![0xE2, 0x00],
            data,
            timeout_ms: 500,
        }
    }

    #[rstest]
    #[case(Request::GetConfig(ConfigScope::Rfid), "GET]RF")]
    #[case(Request::SaveParams, "SAVE")]
    #[case(Request::Init(InitScope::Bluetooth), "INIT]BT")]
    #[case(Request::OpenReader, "RDR]1")]
    #[case(Request::OpenInventory { index: None }, "INV")]
    #[case(Request::OpenInventory { index: Some(3) }, "INV]3")]
    #[case(Request::CloseInventory, "CLS")]
    #[case(Request::ClearFilter, "FLTCLR")]
    #[case(Request::GetCount { index: 1 }, "CNT]1")]
    #[case(Request::SetAutoLinkProfile(true), "ALP]1")]
    #[case(Request::GetKeyStatus(KeyName::Trigger), "KEY]TRG")]
    fn test_text_requests(#[case] request: Request, #[case] wire: &str) {
        let frame = request.encode().unwrap();
        assert_eq!(frame.as_text().unwrap(), wire);
        assert_eq!(Request::decode(&frame).unwrap(), request);
    }

    #[test]
    fn test_open_read_with_uii() {
        let request = Request::OpenRead(ReadRequest {
            password: AccessPassword::from_u32(0xDEADBEEF),
            target: Some(TagTarget::Uii(vec![0x30, 0x00])),
            ..ReadRequest::new(RfidBank::Tid, 0x10, 4)
        });
        let frame = request.encode().unwrap();
        assert_eq!(frame.as_text().unwrap(), "RD]2]0010]0004]DEADBEEF]U3000");
        assert_eq!(Request::decode(&frame).unwrap(), request);
    }

    #[rstest]
    #[case("RD]2]10000]0004]00000000")]
    #[case("RD]2]0010]10004]00000000")]
    #[case("RD]2]+010]0004]00000000")]
    #[case("RD]2]0010]+004]00000000")]
    #[case("RD]+2]0010]0004]00000000")]
    fn test_open_read_rejects_out_of_range_fields(#[case] wire: &str) {
        assert!(matches!(
            Request::decode(&Frame::text(wire)),
            Err(Error::Protocol { .. })
        ));
    }

    #[test]
    fn test_open_read_size_zero_is_encoding_error() {
        let request = Request::OpenRead(ReadRequest::new(RfidBank::User, 0, 0));
        assert!(matches!(request.encode(), Err(Error::Encoding { .. })));
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![0x01, 0x02, 0x03])]
    fn test_write_requires_whole_words(#[case] data: Vec<u8>) {
        let request = Request::WriteTag(write_request(data));
        assert!(matches!(request.encode(), Err(Error::Encoding { .. })));
    }

    #[test]
    fn test_write_binary_layout() {
        let request = Request::WriteTag(write_request(vec![0xAA, 0xBB]));
        let frame = request.encode().unwrap();
        assert!(frame.is_binary());
        assert_eq!(
            frame.payload().as_ref(),
            &[
                b'W', 3, 0x00, 0x02, 0x00, 0x01, 0, 0, 0, 0, 2, 0xE2, 0x00, 0x00, 0x00, 0x01,
                0xF4, 0x00, 0x02, 0xAA, 0xBB
            ]
        );
        assert_eq!(Request::decode(&frame).unwrap(), request);
        assert_eq!(request.device_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_kill_requires_password() {
        let kill = KillRequest {
            password: AccessPassword::zero(),
            uii: vec![0x01, 0x02],
            timeout_ms: 0,
        };
        assert!(Request::KillTag(kill.clone()).encode().is_err());

        let kill = KillRequest {
            password: AccessPassword::from_u32(1),
            ..kill
        };
        let frame = Request::KillTag(kill.clone()).encode().unwrap();
        assert_eq!(Request::decode(&frame).unwrap(), Request::KillTag(kill));
    }

    #[test]
    fn test_lock_round_trip() {
        let lock = Request::LockTag(LockRequest {
            targets: LockTargets::UII | LockTargets::ACCESS_PASSWORD,
            kind: LockKind::PermanentLock,
            password: AccessPassword::from_u32(7),
            uii: vec![0x01, 0x02],
            timeout_ms: 1000,
        });
        let frame = lock.encode().unwrap();
        assert_eq!(frame.payload()[1], 0x0C);
        assert_eq!(Request::decode(&frame).unwrap(), lock);
    }

    #[test]
    fn test_filter_wire() {
        let request = Request::SetFilter {
            filters: vec![
                TagFilter {
                    bank: RfidBank::Uii,
                    bit_offset: 0x20,
                    bit_length: 8,
                    data: vec![0x30],
                },
                TagFilter {
                    bank: RfidBank::Tid,
                    bit_offset: 0,
                    bit_length: 12,
                    data: vec![0xE2, 0x80],
                },
            ],
            op: FilterOp::Or,
        };
        let frame = request.encode().unwrap();
        assert_eq!(frame.as_text().unwrap(), "FLT]OR]1[20[8[30]2[0[12[E280");
        assert_eq!(Request::decode(&frame).unwrap(), request);
    }

    #[test]
    fn test_empty_filter_list() {
        let request = Request::SetFilter {
            filters: vec![],
            op: FilterOp::And,
        };
        assert!(matches!(request.encode(), Err(Error::Encoding { .. })));
    }

    #[test]
    fn test_response_format_request() {
        let format = ResponseFormat {
            pc: true,
            rssi: true,
            ..ResponseFormat::text()
        };
        let frame = Request::SetResponseFormat(format).encode().unwrap();
        assert_eq!(frame.as_text().unwrap(), "RSP]T]01100000");

        let bad = ResponseFormat {
            channel: true,
            ..ResponseFormat::text()
        };
        assert!(matches!(
            Request::SetResponseFormat(bad).encode(),
            Err(Error::Encoding { .. })
        ));
    }

    #[test]
    fn test_firmware_chunk_round_trip() {
        let request = Request::FirmwareChunk(FirmwareChunk {
            offset: 512,
            total: 1024,
            data: vec![0x55; 512],
        });
        let frame = request.encode().unwrap();
        assert_eq!(frame.payload().len(), 11 + 512);
        assert_eq!(Request::decode(&frame).unwrap(), request);
    }

    #[test]
    fn test_set_config_invalid_tree_is_validation_error() {
        let mut settings = crate::settings::AutoLinkProfileSettings::default();
        settings.max_q = 16;
        let request = Request::SetConfig(ConfigurationTree::AutoLinkProfile(settings));
        assert!(matches!(request.encode(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_unknown_verb() {
        assert!(Request::decode(&Frame::text("ZAP]1")).is_err());
        assert!(Request::decode(&Frame::binary(vec![b'Z'])).is_err());
    }

    #[rstest]
    #[case(Request::GetInfo, Reply::Ack, false)]
    #[case(Request::GetInfo, Reply::data("INFO]serial=1"), true)]
    #[case(Request::SaveParams, Reply::Ack, true)]
    #[case(Request::SaveParams, Reply::Nack(0x10), true)]
    #[case(Request::SaveParams, Reply::data("x"), false)]
    fn test_reply_shape(#[case] request: Request, #[case] reply: Reply, #[case] ok: bool) {
        assert_eq!(reply.answers(request.expects()), ok);
    }
}
