//! Bounds-checked little-endian reader and writer for index records

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

// =============================================================================
// Reader
// =============================================================================

/// Cursor over a serialized record. Every read checks the remaining length
/// and fails with [`Error::Decode`] instead of reading past the buffer.
pub struct RecordReader<'a> {
    buf: &'a [u8],
    total: usize,
}

impl<'a> RecordReader<'a> {
    /// Create a reader over `buf`
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            total: buf.len(),
        }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Current offset from the start of the record
    pub fn position(&self) -> usize {
        self.total - self.buf.remaining()
    }

    fn need(&self, n: usize, what: &str) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(Error::decode(format!(
                "truncated record reading {} at offset {}: need {} bytes, have {}",
                what,
                self.position(),
                n,
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    pub fn read_u8(&mut self, what: &str) -> Result<u8> {
        self.need(1, what)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_u16(&mut self, what: &str) -> Result<u16> {
        self.need(2, what)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn read_i32(&mut self, what: &str) -> Result<i32> {
        self.need(4, what)?;
        Ok(self.buf.get_i32_le())
    }

    /// Reads `len` raw bytes
    pub fn read_bytes(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        self.need(len, what)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    /// Reads a u16 length prefix followed by that many bytes
    pub fn read_short_prefixed(&mut self, what: &str) -> Result<&'a [u8]> {
        let len = self.read_u16(what)? as usize;
        self.read_bytes(len, what)
    }

    /// Skips `len` bytes
    pub fn skip(&mut self, len: usize, what: &str) -> Result<()> {
        self.need(len, what)?;
        self.buf.advance(len);
        Ok(())
    }

    /// Consumes and returns everything left
    pub fn rest(&mut self) -> Bytes {
        let rest = Bytes::copy_from_slice(self.buf);
        self.buf = &self.buf[self.buf.len()..];
        rest
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Append-only record builder
#[derive(Default)]
pub struct RecordWriter {
    buf: BytesMut,
}

impl RecordWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.put_i32_le(v);
    }

    pub fn write_bytes(&mut self, v: &[u8]) {
        self.buf.put_slice(v);
    }

    /// Writes a u16 length prefix followed by `v`
    pub fn write_short_prefixed(&mut self, v: &[u8], what: &str) -> Result<()> {
        let len = u16::try_from(v.len()).map_err(|_| {
            Error::Internal(format!("{} exceeds {} bytes ({})", what, u16::MAX, v.len()))
        })?;
        self.buf.put_u16_le(len);
        self.buf.put_slice(v);
        Ok(())
    }

    /// Finish and return the encoded record
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_reads_are_bounds_checked() {
        let mut reader = RecordReader::new(&[1, 0, 9]);
        assert_eq!(reader.read_u16("len").unwrap(), 1);
        assert_matches!(reader.read_i32("count"), Err(Error::Decode(_)));
        assert_eq!(reader.read_u8("tail").unwrap(), 9);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_short_prefixed() {
        let mut writer = RecordWriter::new();
        writer.write_short_prefixed(b"abc", "id").unwrap();
        writer.write_i32(-2);
        let bytes = writer.freeze();

        let mut reader = RecordReader::new(&bytes);
        assert_eq!(reader.read_short_prefixed("id").unwrap(), b"abc");
        assert_eq!(reader.read_i32("n").unwrap(), -2);
    }

    #[test]
    fn test_prefix_overflow_rejected() {
        let mut writer = RecordWriter::new();
        let big = vec![0u8; u16::MAX as usize + 1];
        assert!(writer.write_short_prefixed(&big, "metadata").is_err());
    }

    #[test]
    fn test_declared_length_past_end() {
        let mut reader = RecordReader::new(&[5, 0, 1, 2]);
        assert_matches!(reader.read_short_prefixed("item id"), Err(Error::Decode(_)));
    }
}
