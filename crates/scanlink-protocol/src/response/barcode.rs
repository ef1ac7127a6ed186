//! Barcode data payloads and multi-line reassembly.
//!
//! A payload is a count followed by that many wire records:
//!
//! ```text
//! binary: count:u8 { denso:u8 aim:[u8;3] [start:u16] private_len:u16 data_len:u16 data }
//! text:   count:hex2 { denso aim:3 [start:hex4] private_len:hex4 data_len:hex4 data }
//! ```
//!
//! `start` is only present when the session reads in multi-line mode. In that
//! mode every logical read is sent as one wire record per physical line and
//! the lines are chained by their start offsets: the first line starts at 0
//! and each further line starts where the previous one ended.

use bytes::{BufMut, BytesMut};
use std::fmt;

use scanlink_core::{Error, Result};

use crate::cursor::Cursor;
use super::format::{BarcodeFormat, PayloadEncoding};

/// Symbology identifier in both vendor and AIM naming.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbology {
    /// One-character vendor code.
    pub denso: char,
    /// Three-character AIM identifier, e.g. `]Q1`.
    pub aim: String,
}

impl Symbology {
    pub fn new(denso: char, aim: impl Into<String>) -> Self {
        Self {
            denso,
            aim: aim.into(),
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.denso, self.aim)
    }
}

/// One physical line of a multi-line read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRead {
    pub symbology: Symbology,
    /// Offset of this line's data within the reassembled record.
    pub start: u16,
    pub len: u16,
    pub private_len: u16,
}

/// A decoded barcode read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarcodeRecord {
    /// Symbology of the first line.
    pub symbology: Symbology,
    pub data: Vec<u8>,
    /// Bytes of private (key-protected) data contained in `data`.
    pub private_len: usize,
    /// Read-start position of the first line; 0 outside multi-line mode.
    pub read_start_position: u16,
    /// Constituent lines when the read was reassembled; empty otherwise.
    pub lines: Vec<LineRead>,
}

impl BarcodeRecord {
    /// A single-line read.
    pub fn new(symbology: Symbology, data: impl Into<Vec<u8>>) -> Self {
        Self {
            symbology,
            data: data.into(),
            private_len: 0,
            read_start_position: 0,
            lines: Vec::new(),
        }
    }

    /// Reassembled read built from `(symbology, data)` per physical line.
    pub fn multi_line(lines: Vec<(Symbology, Vec<u8>)>) -> Result<Self> {
        let Some(symbology) = lines.first().map(|(s, _)| s.clone()) else {
            return Err(Error::encoding("multi-line record needs at least one line"));
        };
        let mut data = Vec::new();
        let mut reads = Vec::with_capacity(lines.len());
        for (symbology, line) in lines {
            let start = u16::try_from(data.len())
                .map_err(|_| Error::encoding("multi-line record too long"))?;
            let len = u16::try_from(line.len())
                .map_err(|_| Error::encoding("multi-line record too long"))?;
            reads.push(LineRead {
                symbology,
                start,
                len,
                private_len: 0,
            });
            data.extend_from_slice(&line);
        }
        Ok(Self {
            symbology,
            data,
            private_len: 0,
            read_start_position: 0,
            lines: reads,
        })
    }

    pub fn data_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

/// Wire record as sent by the device, before reassembly.
#[derive(Debug)]
struct WireRecord<'a> {
    symbology: Symbology,
    start: Option<u16>,
    private_len: u16,
    data: &'a [u8],
}

/// Numeric reads in the negotiated encoding.
struct Reader<'a> {
    cursor: Cursor<'a>,
    encoding: PayloadEncoding,
}

impl<'a> Reader<'a> {
    fn u8(&mut self, field: &str) -> Result<u8> {
        match self.encoding {
            PayloadEncoding::Binary => self.cursor.u8(field),
            // Two hex digits always fit a u8.
            PayloadEncoding::Text => Ok(self.cursor.hex(2, field)? as u8),
        }
    }

    fn u16(&mut self, field: &str) -> Result<u16> {
        match self.encoding {
            PayloadEncoding::Binary => self.cursor.u16(field),
            PayloadEncoding::Text => Ok(self.cursor.hex(4, field)? as u16),
        }
    }

    fn record(&mut self, multi_line: bool) -> Result<WireRecord<'a>> {
        let denso = char::from(self.cursor.u8("symbology")?);
        let aim = self.cursor.take(3, "aim identifier")?;
        let aim = std::str::from_utf8(aim)
            .map_err(|_| Error::protocol(format!("aim identifier is not ASCII: {aim:?}")))?;
        let start = if multi_line {
            Some(self.u16("read start position")?)
        } else {
            None
        };
        let private_len = self.u16("private data length")?;
        let data_len = self.u16("data length")?;
        if private_len > data_len {
            return Err(Error::protocol(format!(
                "private data length {private_len} exceeds data length {data_len}"
            )));
        }
        let data = self.cursor.take(usize::from(data_len), "barcode data")?;
        Ok(WireRecord {
            symbology: Symbology::new(denso, aim),
            start,
            private_len,
            data,
        })
    }
}

/// Decode a barcode payload into logical reads.
///
/// # Errors
/// `Protocol` for a truncated or inconsistent record; `Sequence` when a
/// multi-line read is missing a line or its lines are not contiguous.
pub fn decode_barcode(payload: &[u8], format: &BarcodeFormat) -> Result<Vec<BarcodeRecord>> {
    let mut reader = Reader {
        cursor: Cursor::new(payload),
        encoding: format.encoding,
    };
    let count = usize::from(reader.u8("record count")?);
    let mut wire = Vec::with_capacity(count);
    for _ in 0..count {
        wire.push(reader.record(format.is_multi_line())?);
    }
    reader.cursor.finish("barcode records")?;

    if !format.is_multi_line() {
        return Ok(wire
            .into_iter()
            .map(|w| BarcodeRecord {
                symbology: w.symbology,
                data: w.data.to_vec(),
                private_len: usize::from(w.private_len),
                read_start_position: 0,
                lines: Vec::new(),
            })
            .collect());
    }

    if wire.len() % format.lines != 0 {
        return Err(Error::sequence(format!(
            "{} line reads do not form complete {}-line records",
            wire.len(),
            format.lines
        )));
    }
    wire.chunks(format.lines).map(reassemble).collect()
}

fn reassemble(group: &[WireRecord<'_>]) -> Result<BarcodeRecord> {
    let mut data = Vec::new();
    let mut lines = Vec::with_capacity(group.len());
    let mut private_len = 0usize;
    let mut expected = 0u16;

    for (i, record) in group.iter().enumerate() {
        let start = record.start.unwrap_or_default();
        if start != expected {
            return Err(Error::sequence(format!(
                "line {} starts at {start}, expected {expected}",
                i + 1
            )));
        }
        let len = record.data.len() as u16;
        expected = start.checked_add(len).ok_or_else(|| {
            Error::sequence(format!("line {} overflows the read start position", i + 1))
        })?;
        data.extend_from_slice(record.data);
        private_len += usize::from(record.private_len);
        lines.push(LineRead {
            symbology: record.symbology.clone(),
            start,
            len,
            private_len: record.private_len,
        });
    }

    Ok(BarcodeRecord {
        symbology: group[0].symbology.clone(),
        data,
        private_len,
        read_start_position: lines[0].start,
        lines,
    })
}

/// Encode reads the way the device sends them.
///
/// In multi-line mode every record must carry exactly `format.lines` lines.
pub fn encode_barcode(records: &[BarcodeRecord], format: &BarcodeFormat) -> Result<BytesMut> {
    let mut wire: Vec<(&Symbology, Option<u16>, u16, &[u8])> = Vec::new();
    for record in records {
        if format.is_multi_line() {
            if record.lines.len() != format.lines {
                return Err(Error::encoding(format!(
                    "record has {} lines, format expects {}",
                    record.lines.len(),
                    format.lines
                )));
            }
            for line in &record.lines {
                let (start, end) = (usize::from(line.start), usize::from(line.start) + usize::from(line.len));
                let data = record
                    .data
                    .get(start..end)
                    .ok_or_else(|| Error::encoding("line range outside record data"))?;
                wire.push((&line.symbology, Some(line.start), line.private_len, data));
            }
        } else {
            let private_len = u16::try_from(record.private_len)
                .map_err(|_| Error::encoding("private data length exceeds u16"))?;
            wire.push((&record.symbology, None, private_len, record.data.as_slice()));
        }
    }

    let count = u8::try_from(wire.len())
        .map_err(|_| Error::encoding(format!("{} reads exceed one payload", wire.len())))?;
    let mut out = BytesMut::new();
    let mut writer = Writer {
        out: &mut out,
        encoding: format.encoding,
    };
    writer.u8(count);
    for (symbology, start, private_len, data) in wire {
        if symbology.aim.len() != 3 || !symbology.denso.is_ascii() {
            return Err(Error::encoding(format!("invalid symbology {symbology}")));
        }
        let data_len = u16::try_from(data.len())
            .map_err(|_| Error::encoding("barcode data exceeds u16 length"))?;
        if private_len > data_len {
            return Err(Error::encoding("private data length exceeds data length"));
        }
        writer.out.put_u8(symbology.denso as u8);
        writer.out.put_slice(symbology.aim.as_bytes());
        if let Some(start) = start {
            writer.u16(start);
        }
        writer.u16(private_len);
        writer.u16(data_len);
        writer.out.put_slice(data);
    }
    Ok(out)
}

struct Writer<'a> {
    out: &'a mut BytesMut,
    encoding: PayloadEncoding,
}

impl Writer<'_> {
    fn u8(&mut self, v: u8) {
        match self.encoding {
            PayloadEncoding::Binary => self.out.put_u8(v),
            PayloadEncoding::Text => self.out.put_slice(format!("{v:02X}").as_bytes()),
        }
    }

    fn u16(&mut self, v: u16) {
        match self.encoding {
            PayloadEncoding::Binary => self.out.put_u16(v),
            PayloadEncoding::Text => self.out.put_slice(format!("{v:04X}").as_bytes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn qr() -> Symbology {
        Symbology::new('Q', "]Q1")
    }

    #[test]
    fn test_single_binary_record() {
        let payload = [
            1, b'Q', b']', b'Q', b'1', 0x00, 0x00, 0x00, 0x03, b'a', b'b', b'c',
        ];
        let records = decode_barcode(&payload, &BarcodeFormat::default()).unwrap();
        assert_eq!(records, vec![BarcodeRecord::new(qr(), "abc")]);
    }

    #[test]
    fn test_single_text_record() {
        let payload = b"01Q]Q100020005ABCDE";
        let format = BarcodeFormat::new(PayloadEncoding::Text, 1);
        let records = decode_barcode(payload, &format).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data_str(), Some("ABCDE"));
        assert_eq!(records[0].private_len, 2);
    }

    #[rstest]
    #[case(&b"+1Q]Q10000+003ABC"[..])]
    #[case(&b"01Q]Q1+0000003ABC"[..])]
    #[case(&b"01Q]Q10000 003ABC"[..])]
    #[case(&b"01Q]Q10000-003ABC"[..])]
    fn test_text_counts_must_be_hex_digits(#[case] payload: &[u8]) {
        let format = BarcodeFormat::new(PayloadEncoding::Text, 1);
        assert!(matches!(
            decode_barcode(payload, &format),
            Err(Error::Protocol { .. })
        ));
    }

    #[test]
    fn test_private_longer_than_data() {
        let payload = [1, b'Q', b']', b'Q', b'1', 0x00, 0x04, 0x00, 0x03, b'a', b'b', b'c'];
        let err = decode_barcode(&payload, &BarcodeFormat::default()).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let payload = [0, 0xAA];
        assert!(decode_barcode(&payload, &BarcodeFormat::default()).is_err());
    }

    #[rstest]
    #[case(PayloadEncoding::Binary)]
    #[case(PayloadEncoding::Text)]
    fn test_multi_line_reassembly(#[case] encoding: PayloadEncoding) {
        let format = BarcodeFormat::new(encoding, 2);
        let record =
            BarcodeRecord::multi_line(vec![(qr(), b"HELLO".to_vec()), (qr(), b"WORLD".to_vec())])
                .unwrap();
        let wire = encode_barcode(std::slice::from_ref(&record), &format).unwrap();

        let decoded = decode_barcode(&wire, &format).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].data, b"HELLOWORLD");
        assert_eq!(decoded[0].lines[1].start, 5);
        assert_eq!(decoded[0], record);
    }

    #[test]
    fn test_multi_line_missing_continuation() {
        let format = BarcodeFormat::new(PayloadEncoding::Binary, 2);
        // One line of a two-line read.
        let payload = [
            1, b'Q', b']', b'Q', b'1', 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, b'h', b'i',
        ];
        let err = decode_barcode(&payload, &format).unwrap_err();
        assert!(matches!(err, Error::Sequence { .. }));
    }

    #[test]
    fn test_multi_line_broken_chain() {
        let format = BarcodeFormat::new(PayloadEncoding::Binary, 2);
        let mut payload = vec![2];
        for start in [0u16, 7] {
            payload.extend_from_slice(b"Q]Q1");
            payload.extend_from_slice(&start.to_be_bytes());
            payload.extend_from_slice(&[0, 0, 0, 2, b'h', b'i']);
        }
        let err = decode_barcode(&payload, &format).unwrap_err();
        assert!(matches!(err, Error::Sequence { ref message } if message.contains("expected 2")));
    }

    #[test]
    fn test_encode_requires_line_count() {
        let format = BarcodeFormat::new(PayloadEncoding::Binary, 2);
        let record = BarcodeRecord::new(qr(), "abc");
        assert!(matches!(
            encode_barcode(&[record], &format),
            Err(Error::Encoding { .. })
        ));
    }
}
