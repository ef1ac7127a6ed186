//! RFID tag payloads.
//!
//! Binary layout, optional fields in brackets:
//!
//! ```text
//! count:u16 {
//!     [index:u16] [pc:u16] uii_len:u8 uii result:u8
//!     [rssi:i16] [antenna:u8] [polarization:i8] [channel:i8] [phase:i8] [alp:u16]
//!     data_len:u16 data
//! }
//! ```
//!
//! Text layout: records separated by `]`, fields by `,`, byte strings as hex:
//!
//! ```text
//! [pc:hex4,]uii,result[,rssi][,antenna][,polarization],data
//! ```

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use scanlink_core::{
    Error, Result,
    constants::{TEXT_FIELD_SEPARATOR, TEXT_RECORD_SEPARATOR},
};

use crate::cursor::Cursor;
use super::format::{PayloadEncoding, ResponseFormat};
use crate::field::{parse_hex, parse_hex_word, parse_number, to_hex};

/// Outcome of the tag operation that produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfidResult {
    Ok,
    MemoryOutOfRange,
    LockedMemory,
    InsufficientPower,
    /// Any other failure; keeps the device code.
    Other(u8),
}

impl RfidResult {
    pub fn code(&self) -> u8 {
        match self {
            RfidResult::Ok => 0,
            RfidResult::MemoryOutOfRange => 1,
            RfidResult::LockedMemory => 2,
            RfidResult::InsufficientPower => 3,
            RfidResult::Other(code) => *code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => RfidResult::Ok,
            1 => RfidResult::MemoryOutOfRange,
            2 => RfidResult::LockedMemory,
            3 => RfidResult::InsufficientPower,
            other => RfidResult::Other(other),
        }
    }

    pub fn is_ok(&self) -> bool {
        *self == RfidResult::Ok
    }
}

/// One tag reported by an inventory, read or write.
///
/// Optional fields are `Some` exactly when the matching
/// [`ResponseFormat`] flag was enabled for the decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfidRecord {
    pub index: Option<u16>,
    pub pc: Option<u16>,
    pub uii: Vec<u8>,
    pub result: RfidResult,
    /// Signal strength in 0.1 dBm.
    pub rssi: Option<i16>,
    pub antenna: Option<u8>,
    pub polarization: Option<i8>,
    pub channel: Option<i8>,
    pub phase: Option<i8>,
    pub auto_link_profile: Option<u16>,
    pub data: Vec<u8>,
}

impl RfidRecord {
    /// Record with no optional fields.
    pub fn new(uii: impl Into<Vec<u8>>) -> Self {
        Self {
            index: None,
            pc: None,
            uii: uii.into(),
            result: RfidResult::Ok,
            rssi: None,
            antenna: None,
            polarization: None,
            channel: None,
            phase: None,
            auto_link_profile: None,
            data: Vec::new(),
        }
    }

    /// PC word whose length bits match this record's UII.
    pub fn pc_for_uii(uii: &[u8]) -> u16 {
        ((uii.len() / 2) as u16) << 11
    }

    pub fn uii_hex(&self) -> String {
        to_hex(&self.uii)
    }

    /// Copy of `self` with optional fields set to match `format`.
    ///
    /// Enabled fields already present keep their value; enabled fields that
    /// are missing get a fixed value (PC is derived from the UII).
    pub fn shaped_for(&self, format: &ResponseFormat) -> Self {
        let keep = |on: bool, v: Option<i8>| if on { Some(v.unwrap_or(0)) } else { None };
        Self {
            index: format.index.then(|| self.index.unwrap_or(0)),
            pc: format.pc.then(|| self.pc.unwrap_or_else(|| Self::pc_for_uii(&self.uii))),
            uii: self.uii.clone(),
            result: self.result,
            rssi: format.rssi.then(|| self.rssi.unwrap_or(-600)),
            antenna: format.antenna.then(|| self.antenna.unwrap_or(1)),
            polarization: keep(format.polarization, self.polarization),
            channel: keep(format.channel, self.channel),
            phase: keep(format.phase, self.phase),
            auto_link_profile: format
                .auto_link_profile
                .then(|| self.auto_link_profile.unwrap_or(1)),
            data: self.data.clone(),
        }
    }
}

fn check_pc(pc: u16, uii_len: usize) -> Result<()> {
    let words = usize::from(pc >> 11);
    if words * 2 != uii_len {
        return Err(Error::protocol(format!(
            "PC {pc:#06x} declares {} UII bytes, record carries {uii_len}",
            words * 2
        )));
    }
    Ok(())
}

/// Decode an RFID payload in the negotiated format.
///
/// Records come back in wire order.
///
/// # Errors
/// `Protocol` when the payload does not match `format`, including a text
/// payload decoded with flags the text layout cannot carry.
pub fn decode_rfid(payload: &[u8], format: &ResponseFormat) -> Result<Vec<RfidRecord>> {
    match format.encoding {
        PayloadEncoding::Binary => decode_binary(payload, format),
        PayloadEncoding::Text => {
            format
                .validate()
                .map_err(|e| Error::protocol(format!("cannot decode text tag payload: {e}")))?;
            let text = std::str::from_utf8(payload)
                .map_err(|_| Error::protocol("text tag payload is not ASCII"))?;
            decode_text(text, format)
        }
    }
}

fn decode_binary(payload: &[u8], format: &ResponseFormat) -> Result<Vec<RfidRecord>> {
    let mut c = Cursor::new(payload);
    let count = c.u16("record count")?;
    let mut records = Vec::with_capacity(usize::from(count));

    for _ in 0..count {
        let index = if format.index { Some(c.u16("index")?) } else { None };
        let pc = if format.pc { Some(c.u16("pc")?) } else { None };
        let uii_len = usize::from(c.u8("uii length")?);
        let uii = c.take(uii_len, "uii")?.to_vec();
        if let Some(pc) = pc {
            check_pc(pc, uii.len())?;
        }
        let result = RfidResult::from_code(c.u8("result")?);
        let rssi = if format.rssi { Some(c.i16("rssi")?) } else { None };
        let antenna = if format.antenna { Some(c.u8("antenna")?) } else { None };
        let polarization = if format.polarization {
            Some(c.i8("polarization")?)
        } else {
            None
        };
        let channel = if format.channel { Some(c.i8("channel")?) } else { None };
        let phase = if format.phase { Some(c.i8("phase")?) } else { None };
        let auto_link_profile = if format.auto_link_profile {
            Some(c.u16("auto link profile")?)
        } else {
            None
        };
        let data_len = usize::from(c.u16("data length")?);
        let data = c.take(data_len, "tag data")?.to_vec();

        records.push(RfidRecord {
            index,
            pc,
            uii,
            result,
            rssi,
            antenna,
            polarization,
            channel,
            phase,
            auto_link_profile,
            data,
        });
    }
    c.finish("tag records")?;
    Ok(records)
}

fn decode_text(text: &str, format: &ResponseFormat) -> Result<Vec<RfidRecord>> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    text.split(TEXT_RECORD_SEPARATOR)
        .map(|record| decode_text_record(record, format))
        .collect()
}

fn decode_text_record(record: &str, format: &ResponseFormat) -> Result<RfidRecord> {
    let fields: Vec<&str> = record.split(TEXT_FIELD_SEPARATOR).collect();
    let expected = 3
        + usize::from(format.pc)
        + usize::from(format.rssi)
        + usize::from(format.antenna)
        + usize::from(format.polarization);
    if fields.len() != expected {
        return Err(Error::protocol(format!(
            "tag record {record:?} has {} fields, format expects {expected}",
            fields.len()
        )));
    }

    let mut fields = fields.into_iter();
    let mut next = |what: &str| {
        fields
            .next()
            .ok_or_else(|| Error::protocol(format!("tag record is missing {what}")))
    };

    let pc = if format.pc {
        let raw = next("pc")?;
        Some(parse_hex_word(raw, "pc")?)
    } else {
        None
    };
    let uii = parse_hex(next("uii")?, "uii")?;
    if let Some(pc) = pc {
        check_pc(pc, uii.len())?;
    }
    let result = RfidResult::from_code(parse_number(next("result")?, "result")?);
    let rssi = if format.rssi {
        Some(parse_number(next("rssi")?, "rssi")?)
    } else {
        None
    };
    let antenna = if format.antenna {
        Some(parse_number(next("antenna")?, "antenna")?)
    } else {
        None
    };
    let polarization = if format.polarization {
        Some(parse_number(next("polarization")?, "polarization")?)
    } else {
        None
    };
    let data = parse_hex(next("data")?, "data")?;

    Ok(RfidRecord {
        index: None,
        pc,
        uii,
        result,
        rssi,
        antenna,
        polarization,
        channel: None,
        phase: None,
        auto_link_profile: None,
        data,
    })
}

/// Encode records the way the device sends them.
///
/// # Errors
/// `Encoding` when a record's optional fields do not match `format`.
pub fn encode_rfid(records: &[RfidRecord], format: &ResponseFormat) -> Result<BytesMut> {
    format.validate()?;
    for record in records {
        check_shape(record, format)?;
    }
    match format.encoding {
        PayloadEncoding::Binary => encode_binary(records),
        PayloadEncoding::Text => Ok(encode_text(records)),
    }
}

fn check_shape(record: &RfidRecord, format: &ResponseFormat) -> Result<()> {
    let present = [
        record.index.is_some(),
        record.pc.is_some(),
        record.rssi.is_some(),
        record.antenna.is_some(),
        record.polarization.is_some(),
        record.channel.is_some(),
        record.phase.is_some(),
        record.auto_link_profile.is_some(),
    ];
    if present != format.flags() {
        return Err(Error::encoding(format!(
            "tag record fields do not match response format {}",
            format.flag_digits()
        )));
    }
    Ok(())
}

fn encode_binary(records: &[RfidRecord]) -> Result<BytesMut> {
    let count = u16::try_from(records.len())
        .map_err(|_| Error::encoding("too many tag records for one payload"))?;
    let mut out = BytesMut::new();
    out.put_u16(count);
    for r in records {
        let uii_len = u8::try_from(r.uii.len()).map_err(|_| Error::encoding("uii too long"))?;
        let data_len =
            u16::try_from(r.data.len()).map_err(|_| Error::encoding("tag data too long"))?;
        if let Some(index) = r.index {
            out.put_u16(index);
        }
        if let Some(pc) = r.pc {
            out.put_u16(pc);
        }
        out.put_u8(uii_len);
        out.put_slice(&r.uii);
        out.put_u8(r.result.code());
        if let Some(rssi) = r.rssi {
            out.put_i16(rssi);
        }
        if let Some(antenna) = r.antenna {
            out.put_u8(antenna);
        }
        if let Some(v) = r.polarization {
            out.put_i8(v);
        }
        if let Some(v) = r.channel {
            out.put_i8(v);
        }
        if let Some(v) = r.phase {
            out.put_i8(v);
        }
        if let Some(alp) = r.auto_link_profile {
            out.put_u16(alp);
        }
        out.put_u16(data_len);
        out.put_slice(&r.data);
    }
    Ok(out)
}

fn encode_text(records: &[RfidRecord]) -> BytesMut {
    let rendered: Vec<String> = records
        .iter()
        .map(|r| {
            let mut fields = Vec::new();
            if let Some(pc) = r.pc {
                fields.push(format!("{pc:04X}"));
            }
            fields.push(to_hex(&r.uii));
            fields.push(r.result.code().to_string());
            if let Some(rssi) = r.rssi {
                fields.push(rssi.to_string());
            }
            if let Some(antenna) = r.antenna {
                fields.push(antenna.to_string());
            }
            if let Some(p) = r.polarization {
                fields.push(p.to_string());
            }
            fields.push(to_hex(&r.data));
            fields.join(&TEXT_FIELD_SEPARATOR.to_string())
        })
        .collect();
    BytesMut::from(rendered.join(&TEXT_RECORD_SEPARATOR.to_string()).as_bytes())
}
