use bytes::Buf;

use scanlink_core::{Error, Result};

/// Running read position over a payload.
///
/// Every optional field shifts the offsets of the fields after it, so
/// decoders read sequentially instead of indexing.
#[derive(Debug, Clone)]
pub(crate) struct Cursor<'a> {
    buf: &'a [u8],
    len: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            len: buf.len(),
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.len - self.buf.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }

    fn need(&self, n: usize, field: &str) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(Error::protocol(format!(
                "payload truncated reading {field} at offset {} (need {n}, have {})",
                self.position(),
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    pub(crate) fn u8(&mut self, field: &str) -> Result<u8> {
        self.need(1, field)?;
        Ok(self.buf.get_u8())
    }

    pub(crate) fn i8(&mut self, field: &str) -> Result<i8> {
        self.need(1, field)?;
        Ok(self.buf.get_i8())
    }

    pub(crate) fn u16(&mut self, field: &str) -> Result<u16> {
        self.need(2, field)?;
        Ok(self.buf.get_u16())
    }

    pub(crate) fn i16(&mut self, field: &str) -> Result<i16> {
        self.need(2, field)?;
        Ok(self.buf.get_i16())
    }

    pub(crate) fn u32(&mut self, field: &str) -> Result<u32> {
        self.need(4, field)?;
        Ok(self.buf.get_u32())
    }

    pub(crate) fn take(&mut self, n: usize, field: &str) -> Result<&'a [u8]> {
        self.need(n, field)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    /// Fixed-width upper- or lower-case hex number (text payloads).
    pub(crate) fn hex(&mut self, width: usize, field: &str) -> Result<u32> {
        let raw = self.take(width, field)?;
        std::str::from_utf8(raw)
            .ok()
            .filter(|s| crate::field::is_hex(s))
            .and_then(|s| u32::from_str_radix(s, 16).ok())
            .ok_or_else(|| Error::protocol(format!("{field} is not a hex number: {raw:?}")))
    }

    pub(crate) fn finish(&self, what: &str) -> Result<()> {
        if !self.is_empty() {
            return Err(Error::protocol(format!(
                "{} trailing bytes after {what}",
                self.buf.remaining()
            )));
        }
        Ok(())
    }
}
