//! Fixed-capacity wire buffer
//!
//! ## Purpose
//!
//! One `WireBuffer` backs every build or parse pass. It holds a whole queue
//! message, so nothing on the wire is ever fragmented.
//!
//! ```text
//! ┌────────────────────────── bytes[MAX_MESSAGE_SIZE] ──────────────────────────┐
//! │ consumed / written │ remaining valid (parse) │ unused                       │
//! └────────────────────┴─────────────────────────┴──────────────────────────────┘
//!                      ↑ cursor                  ↑ valid_len
//! ```
//!
//! Invariant: `cursor <= valid_len <= MAX_MESSAGE_SIZE`. While building,
//! `valid_len` follows `cursor`; while parsing, `valid_len` is the received
//! length and `cursor` walks toward it.
//!
//! Integers are encoded in native byte order since both ends of a queue live
//! on the same host.

use crate::error::{CodecError, CodecResult};
use byteorder::{ByteOrder, NativeEndian};
use types::MAX_MESSAGE_SIZE;

/// Byte order used for every integer on the wire
pub type WireEndian = NativeEndian;

pub struct WireBuffer {
    bytes: [u8; MAX_MESSAGE_SIZE],
    cursor: usize,
    valid_len: usize,
}

impl Default for WireBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl WireBuffer {
    pub const CAPACITY: usize = MAX_MESSAGE_SIZE;

    pub fn new() -> Self {
        Self {
            bytes: [0; MAX_MESSAGE_SIZE],
            cursor: 0,
            valid_len: 0,
        }
    }

    /// Starts a new build or parse pass.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.valid_len = 0;
    }

    /// Copies a received message in and rewinds for parsing.
    pub fn load(&mut self, data: &[u8]) -> CodecResult<()> {
        if data.len() > Self::CAPACITY {
            return Err(CodecError::buffer_overflow(
                data.len(),
                Self::CAPACITY,
                "load received message",
            ));
        }
        self.bytes[..data.len()].copy_from_slice(data);
        self.cursor = 0;
        self.valid_len = data.len();
        Ok(())
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.valid_len
    }

    pub fn is_empty(&self) -> bool {
        self.valid_len == 0
    }

    /// Unread bytes in a parse pass
    pub fn remaining(&self) -> usize {
        self.valid_len - self.cursor
    }

    /// The valid region: the built message, or the received one.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.valid_len]
    }

    fn reserve(&mut self, n: usize, context: &str) -> CodecResult<&mut [u8]> {
        let available = Self::CAPACITY - self.cursor;
        if n > available {
            return Err(CodecError::buffer_overflow(n, available, context));
        }
        let start = self.cursor;
        self.cursor += n;
        self.valid_len = self.cursor;
        Ok(&mut self.bytes[start..self.cursor])
    }

    fn take(&mut self, n: usize, context: &str) -> CodecResult<&[u8]> {
        let available = self.remaining();
        if n > available {
            return Err(CodecError::truncated(n, available, context));
        }
        let start = self.cursor;
        self.cursor += n;
        Ok(&self.bytes[start..self.cursor])
    }

    pub fn put_u8(&mut self, value: u8) -> CodecResult<()> {
        self.reserve(1, "u8")?[0] = value;
        Ok(())
    }

    pub fn put_bool(&mut self, value: bool) -> CodecResult<()> {
        self.put_u8(u8::from(value))
    }

    pub fn put_u16(&mut self, value: u16) -> CodecResult<()> {
        WireEndian::write_u16(self.reserve(2, "u16")?, value);
        Ok(())
    }

    pub fn put_u32(&mut self, value: u32) -> CodecResult<()> {
        WireEndian::write_u32(self.reserve(4, "u32")?, value);
        Ok(())
    }

    pub fn put_i32(&mut self, value: i32) -> CodecResult<()> {
        WireEndian::write_i32(self.reserve(4, "i32")?, value);
        Ok(())
    }

    pub fn put_u64(&mut self, value: u64) -> CodecResult<()> {
        WireEndian::write_u64(self.reserve(8, "u64")?, value);
        Ok(())
    }

    pub fn put_i64(&mut self, value: i64) -> CodecResult<()> {
        WireEndian::write_i64(self.reserve(8, "i64")?, value);
        Ok(())
    }

    pub fn put_bytes(&mut self, value: &[u8]) -> CodecResult<()> {
        self.reserve(value.len(), "bytes")?.copy_from_slice(value);
        Ok(())
    }

    /// Writes `n` zero bytes for reserved or padding fields.
    pub fn put_zeros(&mut self, n: usize) -> CodecResult<()> {
        self.reserve(n, "reserved")?.fill(0);
        Ok(())
    }

    /// Writes `value` into a NUL-padded field of `width` bytes.
    ///
    /// At least one terminating NUL always fits.
    pub fn put_fixed_str(
        &mut self,
        field: &'static str,
        value: &str,
        width: usize,
    ) -> CodecResult<()> {
        if value.len() >= width {
            return Err(CodecError::invalid_field(
                field,
                format!("{} bytes does not fit a {} byte field", value.len(), width),
            ));
        }
        if value.as_bytes().contains(&0) {
            return Err(CodecError::invalid_field(field, "embedded NUL"));
        }
        let slot = self.reserve(width, field)?;
        slot[..value.len()].copy_from_slice(value.as_bytes());
        slot[value.len()..].fill(0);
        Ok(())
    }

    pub fn get_u8(&mut self) -> CodecResult<u8> {
        Ok(self.take(1, "u8")?[0])
    }

    /// Reads a boolean encoded as exactly 0 or 1.
    pub fn get_bool(&mut self, field: &'static str) -> CodecResult<bool> {
        match self.get_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::invalid_field(
                field,
                format!("boolean byte {other:#04x}"),
            )),
        }
    }

    pub fn get_u16(&mut self) -> CodecResult<u16> {
        Ok(WireEndian::read_u16(self.take(2, "u16")?))
    }

    pub fn get_u32(&mut self) -> CodecResult<u32> {
        Ok(WireEndian::read_u32(self.take(4, "u32")?))
    }

    pub fn get_i32(&mut self) -> CodecResult<i32> {
        Ok(WireEndian::read_i32(self.take(4, "i32")?))
    }

    pub fn get_u64(&mut self) -> CodecResult<u64> {
        Ok(WireEndian::read_u64(self.take(8, "u64")?))
    }

    pub fn get_i64(&mut self) -> CodecResult<i64> {
        Ok(WireEndian::read_i64(self.take(8, "i64")?))
    }

    pub fn get_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, "array")?);
        Ok(out)
    }

    /// Consumes `n` reserved bytes, rejecting any that are non-zero.
    pub fn expect_zeros(&mut self, n: usize, context: &str) -> CodecResult<()> {
        let offset = self.cursor;
        let bytes = self.take(n, context)?;
        match bytes.iter().position(|b| *b != 0) {
            Some(at) => Err(CodecError::reserved_non_zero(offset + at, context)),
            None => Ok(()),
        }
    }

    /// Reads a NUL-padded string field; the padding must be all zero.
    pub fn get_fixed_str(&mut self, field: &'static str, width: usize) -> CodecResult<String> {
        let offset = self.cursor;
        let bytes = self.take(width, field)?;
        let end = bytes
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| CodecError::invalid_field(field, "missing NUL terminator"))?;
        if let Some(at) = bytes[end..].iter().position(|b| *b != 0) {
            return Err(CodecError::reserved_non_zero(offset + end + at, field));
        }
        std::str::from_utf8(&bytes[..end])
            .map(str::to_owned)
            .map_err(|e| CodecError::invalid_field(field, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_then_parse_integers() {
        let mut buf = WireBuffer::new();
        buf.put_u8(7).unwrap();
        buf.put_u16(0xBEEF).unwrap();
        buf.put_i64(-100).unwrap();
        assert_eq!(buf.len(), 11);

        let sent = buf.as_bytes().to_vec();
        buf.load(&sent).unwrap();
        assert_eq!(buf.get_u8().unwrap(), 7);
        assert_eq!(buf.get_u16().unwrap(), 0xBEEF);
        assert_eq!(buf.get_i64().unwrap(), -100);
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn reading_past_valid_len_is_truncation() {
        let mut buf = WireBuffer::new();
        buf.load(&[1, 2, 3]).unwrap();
        assert!(matches!(
            buf.get_u32(),
            Err(CodecError::Truncated {
                need: 4,
                available: 3,
                ..
            })
        ));
    }

    #[test]
    fn writing_past_capacity_overflows() {
        let mut buf = WireBuffer::new();
        buf.put_zeros(WireBuffer::CAPACITY - 1).unwrap();
        assert!(matches!(
            buf.put_u16(1),
            Err(CodecError::BufferOverflow { need: 2, available: 1, .. })
        ));
        assert!(buf.load(&[0u8; WireBuffer::CAPACITY + 1]).is_err());
    }

    #[test]
    fn fixed_str_is_zero_padded() {
        let mut buf = WireBuffer::new();
        buf.put_fixed_str("name", "/clk.1234", 16).unwrap();
        assert_eq!(&buf.as_bytes()[..9], b"/clk.1234");
        assert!(buf.as_bytes()[9..].iter().all(|b| *b == 0));

        let sent = buf.as_bytes().to_vec();
        buf.load(&sent).unwrap();
        assert_eq!(buf.get_fixed_str("name", 16).unwrap(), "/clk.1234");
    }

    #[test]
    fn fixed_str_rejects_garbage_after_terminator() {
        let mut raw = [0u8; 8];
        raw[..3].copy_from_slice(b"abc");
        raw[6] = 0x41;
        let mut buf = WireBuffer::new();
        buf.load(&raw).unwrap();
        assert_eq!(
            buf.get_fixed_str("name", 8),
            Err(CodecError::reserved_non_zero(6, "name"))
        );
    }

    #[test]
    fn fixed_str_needs_room_for_terminator() {
        let mut buf = WireBuffer::new();
        assert!(buf.put_fixed_str("name", "12345678", 8).is_err());
    }

    #[test]
    fn bool_must_be_zero_or_one() {
        let mut buf = WireBuffer::new();
        buf.load(&[1, 0, 2]).unwrap();
        assert!(buf.get_bool("a").unwrap());
        assert!(!buf.get_bool("b").unwrap());
        assert!(buf.get_bool("c").is_err());
    }
}
