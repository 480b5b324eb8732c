//! Primitive input: the `DataInput` trait and its slice and source implementations.

use std::io::{self, Cursor, Read};

use bytes::Buf;

use super::mutf8;
use crate::error::{Result, StreamError};

/// Trait for reading primitive values.
///
/// All multi-byte values are read in big-endian byte order. Only
/// [`read_fully`](DataInput::read_fully) is required.
pub trait DataInput {
    /// Fills `buf` completely or fails with [`StreamError::UnexpectedEof`].
    fn read_fully(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Reads a single byte (i8).
    fn read_byte(&mut self) -> Result<i8> {
        Ok(self.read_unsigned_byte()? as i8)
    }

    /// Reads a single unsigned byte.
    fn read_unsigned_byte(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_fully(&mut b)?;
        Ok(b[0])
    }

    /// Reads a boolean from a single byte; any non-zero value is true.
    fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_unsigned_byte()? != 0)
    }

    /// Reads a 16-bit signed integer.
    fn read_short(&mut self) -> Result<i16> {
        let mut b = [0u8; 2];
        self.read_fully(&mut b)?;
        Ok(i16::from_be_bytes(b))
    }

    /// Reads a 16-bit unsigned integer.
    fn read_unsigned_short(&mut self) -> Result<u16> {
        Ok(self.read_short()? as u16)
    }

    /// Reads a UTF-16 code unit.
    fn read_char(&mut self) -> Result<u16> {
        self.read_unsigned_short()
    }

    /// Reads a 32-bit signed integer.
    fn read_int(&mut self) -> Result<i32> {
        let mut b = [0u8; 4];
        self.read_fully(&mut b)?;
        Ok(i32::from_be_bytes(b))
    }

    /// Reads a 64-bit signed integer.
    fn read_long(&mut self) -> Result<i64> {
        let mut b = [0u8; 8];
        self.read_fully(&mut b)?;
        Ok(i64::from_be_bytes(b))
    }

    /// Reads a 32-bit floating point value.
    fn read_float(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_int()? as u32))
    }

    /// Reads a 64-bit floating point value.
    fn read_double(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_long()? as u64))
    }

    /// Reads the specified number of raw bytes.
    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_fully(&mut buf)?;
        Ok(buf)
    }

    /// Reads a string written by [`DataOutput::write_utf`](super::DataOutput::write_utf).
    fn read_utf(&mut self) -> Result<String> {
        let len = self.read_unsigned_short()? as usize;
        let bytes = self.read_bytes(len)?;
        mutf8::decode(&bytes)
    }
}

/// A buffer-based implementation of `DataInput`.
#[derive(Debug)]
pub struct ObjectDataInput<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> ObjectDataInput<'a> {
    /// Creates a new `ObjectDataInput` from the given byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    /// Returns the number of bytes remaining to be read.
    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }

    /// Returns the current position in the buffer.
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    fn ensure_remaining(&self, n: usize) -> Result<()> {
        if self.cursor.remaining() < n {
            Err(StreamError::UnexpectedEof(format!(
                "need {} bytes, have {}",
                n,
                self.cursor.remaining()
            )))
        } else {
            Ok(())
        }
    }
}

impl DataInput for ObjectDataInput<'_> {
    fn read_fully(&mut self, buf: &mut [u8]) -> Result<()> {
        self.ensure_remaining(buf.len())?;
        self.cursor.copy_to_slice(buf);
        Ok(())
    }

    fn read_unsigned_byte(&mut self) -> Result<u8> {
        self.ensure_remaining(1)?;
        Ok(self.cursor.get_u8())
    }

    fn read_short(&mut self) -> Result<i16> {
        self.ensure_remaining(2)?;
        Ok(self.cursor.get_i16())
    }

    fn read_int(&mut self) -> Result<i32> {
        self.ensure_remaining(4)?;
        Ok(self.cursor.get_i32())
    }

    fn read_long(&mut self) -> Result<i64> {
        self.ensure_remaining(8)?;
        Ok(self.cursor.get_i64())
    }
}

/// A `DataInput` over any [`std::io::Read`] byte source.
///
/// Holds at most one byte of pushback so the decoder can peek at the next
/// record tag, and tells a clean end of input apart from a short read.
#[derive(Debug)]
pub struct DataSource<R> {
    inner: R,
    peeked: Option<u8>,
    position: u64,
}

impl<R: Read> DataSource<R> {
    /// Wraps a byte source.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            peeked: None,
            position: 0,
        }
    }

    /// Returns the number of bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Returns the next byte without consuming it, or `None` at end of input.
    pub fn peek_byte(&mut self) -> Result<Option<u8>> {
        if let Some(b) = self.peeked {
            return Ok(Some(b));
        }
        let mut b = [0u8; 1];
        loop {
            match self.inner.read(&mut b) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.peeked = Some(b[0]);
                    return Ok(Some(b[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Consumes and returns the next byte, or `None` at end of input.
    pub fn next_byte(&mut self) -> Result<Option<u8>> {
        let b = self.peek_byte()?;
        if b.is_some() {
            self.peeked = None;
            self.position += 1;
        }
        Ok(b)
    }

    /// Returns a reference to the underlying source.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Unwraps the underlying source, dropping any peeked byte.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> DataInput for DataSource<R> {
    fn read_fully(&mut self, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let mut start = 0;
        if let Some(b) = self.peeked.take() {
            buf[0] = b;
            start = 1;
        }
        match self.inner.read_exact(&mut buf[start..]) {
            Ok(()) => {
                self.position += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(StreamError::UnexpectedEof(format!(
                    "need {} bytes at offset {}",
                    buf.len(),
                    self.position
                )))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_input() {
        let data = [1, 2, 3, 4];
        let input = ObjectDataInput::new(&data);
        assert_eq!(input.remaining(), 4);
        assert_eq!(input.position(), 0);
    }

    #[test]
    fn test_read_byte_negative() {
        let data = [0xFFu8];
        let mut input = ObjectDataInput::new(&data);
        assert_eq!(input.read_byte().unwrap(), -1);
    }

    #[test]
    fn test_read_bool_nonzero_is_true() {
        let data = [42u8];
        let mut input = ObjectDataInput::new(&data);
        assert!(input.read_bool().unwrap());
    }

    #[test]
    fn test_read_int_big_endian() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut input = ObjectDataInput::new(&data);
        assert_eq!(input.read_int().unwrap(), 0x01020304);
    }

    #[test]
    fn test_read_char_is_unsigned() {
        let data = [0xD8, 0x34];
        let mut input = ObjectDataInput::new(&data);
        assert_eq!(input.read_char().unwrap(), 0xD834);
    }

    #[test]
    fn test_read_float_and_double() {
        let mut data = Vec::new();
        data.extend_from_slice(&0.5f32.to_be_bytes());
        data.extend_from_slice(&(-3.75f64).to_be_bytes());
        let mut input = ObjectDataInput::new(&data);
        assert_eq!(input.read_float().unwrap(), 0.5);
        assert_eq!(input.read_double().unwrap(), -3.75);
    }

    #[test]
    fn test_read_utf() {
        let data = [0x00, 0x03, b'a', 0xC0, 0x80];
        let mut input = ObjectDataInput::new(&data);
        assert_eq!(input.read_utf().unwrap(), "a\u{0000}");
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn test_insufficient_data_is_unexpected_eof() {
        let data = [0x01, 0x02];
        let mut input = ObjectDataInput::new(&data);
        let err = input.read_int().unwrap_err();
        assert!(matches!(err, StreamError::UnexpectedEof(_)));
        assert!(err.to_string().contains("need 4 bytes, have 2"));
    }

    #[test]
    fn test_source_peek_then_read() {
        let data: &[u8] = &[0x73, 0x00, 0x00, 0x00, 0x05];
        let mut source = DataSource::new(data);
        assert_eq!(source.peek_byte().unwrap(), Some(0x73));
        assert_eq!(source.position(), 0);
        assert_eq!(source.read_unsigned_byte().unwrap(), 0x73);
        assert_eq!(source.read_int().unwrap(), 5);
        assert_eq!(source.position(), 5);
        assert_eq!(source.peek_byte().unwrap(), None);
    }

    #[test]
    fn test_source_peeked_byte_joins_multi_byte_read() {
        let data: &[u8] = &[0x00, 0x00, 0x01, 0x00];
        let mut source = DataSource::new(data);
        source.peek_byte().unwrap();
        assert_eq!(source.read_int().unwrap(), 256);
    }

    #[test]
    fn test_source_short_read() {
        let data: &[u8] = &[0x00, 0x01];
        let mut source = DataSource::new(data);
        let err = source.read_long().unwrap_err();
        assert!(matches!(err, StreamError::UnexpectedEof(_)));
    }

    #[test]
    fn test_source_clean_end() {
        let data: &[u8] = &[];
        let mut source = DataSource::new(data);
        assert_eq!(source.next_byte().unwrap(), None);
    }
}
