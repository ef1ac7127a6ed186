//! Device replies and unsolicited events.
//!
//! Every inbound frame is either a reply to the request in flight or an
//! event the device raised on its own:
//!
//! | Wire | Classified as |
//! |------|---------------|
//! | `ACK` | [`Reply::Ack`] |
//! | `NAK]<code hex4>` | [`Reply::Nack`] |
//! | `DAT]<body>` / binary `D<body>` | [`Reply::DataPayload`] |
//! | `KEY]<key>]<0\|1>` | [`Inbound::Key`] |
//! | `BCD]<body>` / binary `B<body>` | [`Inbound::Barcode`] |
//! | `TAG]<body>` / binary `T<body>` | [`Inbound::Rfid`] |
//!
//! Anything else is a protocol error.

use bytes::{BufMut, Bytes, BytesMut};

use scanlink_core::{
    BatteryLevel, Error, KeyName, KeyState, Result, ScannerIdentity, ScannerType,
    constants::DELIMITER_FIELD,
};

use crate::field::{FieldMap, TextPayload, parse_hex_word};
use crate::frame::{Frame, FrameKind};
use crate::response::{
    BarcodeFormat, BarcodeRecord, PayloadEncoding, ResponseFormat, RfidRecord, encode_barcode,
    encode_rfid,
};
use crate::settings::ConfigurationTree;

const OP_DATA: u8 = b'D';
const OP_BARCODE: u8 = b'B';
const OP_TAGS: u8 = b'T';

/// Reply shape a request expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyKind {
    Ack,
    Nack,
    Data,
}

/// Device reply to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ack,
    /// Request refused with a device error code.
    Nack(u16),
    DataPayload { data: Bytes, binary: bool },
}

impl Reply {
    /// Text data reply.
    pub fn data(body: impl Into<String>) -> Self {
        Reply::DataPayload {
            data: Bytes::from(body.into()),
            binary: false,
        }
    }

    /// Binary data reply.
    pub fn binary_data(body: impl Into<Bytes>) -> Self {
        Reply::DataPayload {
            data: body.into(),
            binary: true,
        }
    }

    pub fn kind(&self) -> ReplyKind {
        match self {
            Reply::Ack => ReplyKind::Ack,
            Reply::Nack(_) => ReplyKind::Nack,
            Reply::DataPayload { .. } => ReplyKind::Data,
        }
    }

    /// Whether this is a valid answer to a request expecting `expected`.
    /// A `Nack` always is.
    pub fn answers(&self, expected: ReplyKind) -> bool {
        matches!(self, Reply::Nack(_)) || self.kind() == expected
    }

    /// Decode a reply frame.
    ///
    /// # Errors
    /// `Protocol` when the frame is not a reply.
    pub fn decode(frame: &Frame) -> Result<Self> {
        match Inbound::classify(frame)? {
            Inbound::Reply(reply) => Ok(reply),
            other => Err(Error::protocol(format!("expected a reply, got {other:?}"))),
        }
    }

    pub fn encode(&self) -> Frame {
        match self {
            Reply::Ack => Frame::text("ACK"),
            Reply::Nack(code) => Frame::text(format!("NAK]{code:04X}")),
            Reply::DataPayload { data, binary: true } => {
                let mut out = BytesMut::with_capacity(1 + data.len());
                out.put_u8(OP_DATA);
                out.put_slice(data);
                Frame::binary(out.freeze())
            }
            Reply::DataPayload { data, binary: false } => {
                let mut out = BytesMut::with_capacity(4 + data.len());
                out.put_slice(b"DAT]");
                out.put_slice(data);
                Frame::from_parts(FrameKind::Text, out.freeze())
            }
        }
    }

    /// Fail with `DeviceRejected` on a `Nack`.
    pub fn ok(self) -> Result<Self> {
        match self {
            Reply::Nack(code) => Err(Error::DeviceRejected { code }),
            reply => Ok(reply),
        }
    }

    /// The text body of a data reply.
    pub fn body(&self) -> Result<&str> {
        match self {
            Reply::DataPayload { data, binary: false } => std::str::from_utf8(data)
                .map_err(|_| Error::protocol("data reply is not ASCII")),
            other => Err(Error::protocol(format!("expected a text data reply, got {other:?}"))),
        }
    }

    /// Raw bytes of a data reply in either encoding.
    pub fn payload(&self) -> Result<&Bytes> {
        match self {
            Reply::DataPayload { data, .. } => Ok(data),
            other => Err(Error::protocol(format!("expected a data reply, got {other:?}"))),
        }
    }

    pub fn configuration(&self) -> Result<ConfigurationTree> {
        ConfigurationTree::from_body(self.body()?)
    }

    pub fn with_configuration(tree: &ConfigurationTree) -> Self {
        let mut body = tree.scope().code().to_string();
        for field in tree.fields() {
            body.push(DELIMITER_FIELD);
            body.push_str(&field);
        }
        Reply::data(body)
    }

    /// Parse `INFO]serial=..]part=..]version=..]model=..]region=..]type=..`.
    pub fn identity(&self) -> Result<ScannerIdentity> {
        let payload = TextPayload::parse(self.body()?);
        expect_verb(&payload, "INFO")?;
        let map = FieldMap::parse(payload.fields.iter().copied())
            .map_err(|e| Error::protocol(format!("invalid identity reply: {e}")))?;
        let get = |key: &str| {
            map.get(key)
                .map(str::to_string)
                .ok_or_else(|| Error::protocol(format!("identity reply is missing {key}")))
        };
        Ok(ScannerIdentity {
            serial_number: get("serial")?,
            part_number: get("part")?,
            firmware_version: get("version")?,
            model: get("model")?,
            region: get("region")?,
            scanner_type: ScannerType::from_code(&get("type")?),
        })
    }

    pub fn with_identity(identity: &ScannerIdentity) -> Self {
        Reply::data(format!(
            "INFO]serial={}]part={}]version={}]model={}]region={}]type={}",
            identity.serial_number,
            identity.part_number,
            identity.firmware_version,
            identity.model,
            identity.region,
            identity.scanner_type.code()
        ))
    }

    pub fn battery(&self) -> Result<BatteryLevel> {
        let payload = TextPayload::parse(self.body()?);
        expect_verb(&payload, "BAT")?;
        payload.expect_len(1)?;
        let code = payload.number(0, "battery level")?;
        BatteryLevel::from_code(code)
            .ok_or_else(|| Error::protocol(format!("unknown battery level {code}")))
    }

    pub fn with_battery(level: BatteryLevel) -> Self {
        Reply::data(format!("BAT]{}", level.code()))
    }

    pub fn key_state(&self) -> Result<(KeyName, KeyState)> {
        let payload = TextPayload::parse(self.body()?);
        expect_verb(&payload, "KEY")?;
        parse_key(&payload)
    }

    pub fn with_key_state(key: KeyName, state: KeyState) -> Self {
        Reply::data(format!("KEY]{}]{}", key.code(), state.code()))
    }

    pub fn count(&self) -> Result<u32> {
        let payload = TextPayload::parse(self.body()?);
        expect_verb(&payload, "CNT")?;
        payload.expect_len(1)?;
        payload.number(0, "tag count")
    }

    pub fn with_count(count: u32) -> Self {
        Reply::data(format!("CNT]{count}"))
    }

    /// Buffered tags in the negotiated encoding.
    pub fn with_tags(records: &[RfidRecord], format: &ResponseFormat) -> Result<Self> {
        let body = encode_rfid(records, format)?.freeze();
        Ok(Reply::DataPayload {
            data: body,
            binary: format.encoding == PayloadEncoding::Binary,
        })
    }
}

fn expect_verb(payload: &TextPayload<'_>, verb: &str) -> Result<()> {
    if payload.verb != verb {
        return Err(Error::protocol(format!(
            "expected a {verb} body, got {:?}",
            payload.verb
        )));
    }
    Ok(())
}

fn parse_key(payload: &TextPayload<'_>) -> Result<(KeyName, KeyState)> {
    payload.expect_len(2)?;
    let raw = payload.field(0, "key")?;
    let key =
        KeyName::from_code(raw).ok_or_else(|| Error::protocol(format!("unknown key {raw:?}")))?;
    let raw = payload.field(1, "key state")?;
    let state = KeyState::from_code(raw)
        .ok_or_else(|| Error::protocol(format!("unknown key state {raw:?}")))?;
    Ok((key, state))
}

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Reply(Reply),
    Key { key: KeyName, state: KeyState },
    /// Barcode payload to decode with the session's [`BarcodeFormat`].
    Barcode { body: Bytes, encoding: PayloadEncoding },
    /// Tag payload to decode with the session's [`ResponseFormat`].
    Rfid { body: Bytes, encoding: PayloadEncoding },
}

impl Inbound {
    /// Sort an inbound frame into a reply or an event.
    ///
    /// # Errors
    /// `Protocol` for anything outside the reply and event shapes.
    pub fn classify(frame: &Frame) -> Result<Self> {
        if frame.is_binary() {
            let payload = frame.payload();
            let Some(&op) = payload.first() else {
                return Err(Error::protocol("empty binary frame"));
            };
            let body = payload.slice(1..);
            return match op {
                OP_DATA => Ok(Inbound::Reply(Reply::DataPayload { data: body, binary: true })),
                OP_BARCODE => Ok(Inbound::Barcode {
                    body,
                    encoding: PayloadEncoding::Binary,
                }),
                OP_TAGS => Ok(Inbound::Rfid {
                    body,
                    encoding: PayloadEncoding::Binary,
                }),
                other => Err(Error::protocol(format!("unknown inbound opcode {other:#04x}"))),
            };
        }

        let text = frame.as_text()?;
        let (verb, rest) = match text.split_once(DELIMITER_FIELD) {
            Some((verb, rest)) => (verb, Some(rest)),
            None => (text, None),
        };
        // Bodies are sliced out of the frame so events avoid a copy.
        let body = || {
            let start = text.len() - rest.map_or(0, str::len);
            frame.payload().slice(start..)
        };
        match (verb, rest) {
            ("ACK", None) => Ok(Inbound::Reply(Reply::Ack)),
            ("NAK", Some(code)) => {
                let code = parse_hex_word(code, "NAK code")?;
                Ok(Inbound::Reply(Reply::Nack(code)))
            }
            ("DAT", _) => Ok(Inbound::Reply(Reply::DataPayload {
                data: body(),
                binary: false,
            })),
            ("KEY", Some(_)) => {
                let (key, state) = parse_key(&TextPayload::parse(text))?;
                Ok(Inbound::Key { key, state })
            }
            ("BCD", _) => Ok(Inbound::Barcode {
                body: body(),
                encoding: PayloadEncoding::Text,
            }),
            ("TAG", _) => Ok(Inbound::Rfid {
                body: body(),
                encoding: PayloadEncoding::Text,
            }),
            _ => Err(Error::protocol(format!("unrecognized inbound frame {text:?}"))),
        }
    }

    pub fn is_reply(&self) -> bool {
        matches!(self, Inbound::Reply(_))
    }

    /// Unsolicited key event frame.
    pub fn key_frame(key: KeyName, state: KeyState) -> Frame {
        Frame::text(format!("KEY]{}]{}", key.code(), state.code()))
    }

    /// Unsolicited barcode event frame.
    pub fn barcode_frame(records: &[BarcodeRecord], format: &BarcodeFormat) -> Result<Frame> {
        let body = encode_barcode(records, format)?;
        Ok(event_frame(OP_BARCODE, "BCD", body, format.encoding))
    }

    /// Unsolicited tag event frame.
    pub fn rfid_frame(records: &[RfidRecord], format: &ResponseFormat) -> Result<Frame> {
        let body = encode_rfid(records, format)?;
        Ok(event_frame(OP_TAGS, "TAG", body, format.encoding))
    }
}

fn event_frame(op: u8, verb: &str, body: BytesMut, encoding: PayloadEncoding) -> Frame {
    let mut out = BytesMut::with_capacity(verb.len() + 1 + body.len());
    match encoding {
        PayloadEncoding::Binary => {
            out.put_u8(op);
            out.put_slice(&body);
            Frame::binary(out.freeze())
        }
        PayloadEncoding::Text => {
            out.put_slice(verb.as_bytes());
            out.put_u8(DELIMITER_FIELD as u8);
            out.put_slice(&body);
            Frame::from_parts(FrameKind::Text, out.freeze())
        }
    }
}
