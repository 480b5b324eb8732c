//! Primitive output: the `DataOutput` trait and its buffer and sink implementations.

use std::io::Write;

use bytes::{BufMut, BytesMut};

use super::mutf8;
use crate::error::{Result, StreamError};
use crate::protocol::MAX_SHORT_STRING;

/// Trait for writing primitive values.
///
/// All multi-byte values are written in big-endian byte order. Only
/// [`write_bytes`](DataOutput::write_bytes) is required; the other methods
/// encode into it.
pub trait DataOutput {
    /// Writes raw bytes without length prefix.
    fn write_bytes(&mut self, v: &[u8]) -> Result<()>;

    /// Writes a single byte (i8).
    fn write_byte(&mut self, v: i8) -> Result<()> {
        self.write_bytes(&[v as u8])
    }

    /// Writes a boolean as a single byte (0 for false, 1 for true).
    fn write_bool(&mut self, v: bool) -> Result<()> {
        self.write_bytes(&[v as u8])
    }

    /// Writes a 16-bit signed integer.
    fn write_short(&mut self, v: i16) -> Result<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    /// Writes a UTF-16 code unit.
    fn write_char(&mut self, v: u16) -> Result<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    /// Writes a 32-bit signed integer.
    fn write_int(&mut self, v: i32) -> Result<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    /// Writes a 64-bit signed integer.
    fn write_long(&mut self, v: i64) -> Result<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    /// Writes a 32-bit floating point value.
    fn write_float(&mut self, v: f32) -> Result<()> {
        self.write_bytes(&v.to_bits().to_be_bytes())
    }

    /// Writes a 64-bit floating point value.
    fn write_double(&mut self, v: f64) -> Result<()> {
        self.write_bytes(&v.to_bits().to_be_bytes())
    }

    /// Writes a string as a 2-byte length followed by its modified UTF-8 bytes.
    fn write_utf(&mut self, v: &str) -> Result<()> {
        let len = mutf8::encoded_len(v);
        if len > MAX_SHORT_STRING {
            return Err(StreamError::StringTooLong(len));
        }
        self.write_short(len as u16 as i16)?;
        self.write_bytes(&mutf8::encode(v))
    }
}

/// A buffer-based implementation of `DataOutput`.
#[derive(Debug)]
pub struct ObjectDataOutput {
    buffer: BytesMut,
}

impl ObjectDataOutput {
    /// Creates a new `ObjectDataOutput` with default capacity.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
        }
    }

    /// Creates a new `ObjectDataOutput` with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Returns the written bytes as a slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the output and returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Removes and returns the first `n` buffered bytes.
    pub fn take_front(&mut self, n: usize) -> BytesMut {
        self.buffer.split_to(n.min(self.buffer.len()))
    }

    /// Clears the buffer, removing all written data.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for ObjectDataOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl DataOutput for ObjectDataOutput {
    fn write_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.buffer.put_slice(v);
        Ok(())
    }

    fn write_byte(&mut self, v: i8) -> Result<()> {
        self.buffer.put_i8(v);
        Ok(())
    }

    fn write_bool(&mut self, v: bool) -> Result<()> {
        self.buffer.put_u8(if v { 1 } else { 0 });
        Ok(())
    }

    fn write_short(&mut self, v: i16) -> Result<()> {
        self.buffer.put_i16(v);
        Ok(())
    }

    fn write_char(&mut self, v: u16) -> Result<()> {
        self.buffer.put_u16(v);
        Ok(())
    }

    fn write_int(&mut self, v: i32) -> Result<()> {
        self.buffer.put_i32(v);
        Ok(())
    }

    fn write_long(&mut self, v: i64) -> Result<()> {
        self.buffer.put_i64(v);
        Ok(())
    }

    fn write_float(&mut self, v: f32) -> Result<()> {
        self.buffer.put_f32(v);
        Ok(())
    }

    fn write_double(&mut self, v: f64) -> Result<()> {
        self.buffer.put_f64(v);
        Ok(())
    }

    fn write_utf(&mut self, v: &str) -> Result<()> {
        let len = mutf8::encoded_len(v);
        if len > MAX_SHORT_STRING {
            return Err(StreamError::StringTooLong(len));
        }
        self.buffer.reserve(2 + len);
        self.buffer.put_u16(len as u16);
        mutf8::encode_into(v, &mut self.buffer);
        Ok(())
    }
}

/// A `DataOutput` over any [`std::io::Write`] byte sink.
#[derive(Debug)]
pub struct DataSink<W> {
    inner: W,
    written: u64,
}

impl<W: Write> DataSink<W> {
    /// Wraps a byte sink.
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Returns the number of bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Flushes the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Returns a reference to the underlying sink.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Returns a mutable reference to the underlying sink.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Unwraps the underlying sink.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> DataOutput for DataSink<W> {
    fn write_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.inner.write_all(v)?;
        self.written += v.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_output_is_empty() {
        let output = ObjectDataOutput::new();
        assert!(output.is_empty());
        assert_eq!(output.len(), 0);
    }

    #[test]
    fn test_write_byte_negative() {
        let mut output = ObjectDataOutput::new();
        output.write_byte(-1).unwrap();
        assert_eq!(output.as_bytes(), &[0xFF]);
    }

    #[test]
    fn test_write_short_big_endian() {
        let mut output = ObjectDataOutput::new();
        output.write_short(0x0102).unwrap();
        assert_eq!(output.as_bytes(), &[0x01, 0x02]);
    }

    #[test]
    fn test_write_char_big_endian() {
        let mut output = ObjectDataOutput::new();
        output.write_char(0xD834).unwrap();
        assert_eq!(output.as_bytes(), &[0xD8, 0x34]);
    }

    #[test]
    fn test_write_long_big_endian() {
        let mut output = ObjectDataOutput::new();
        output.write_long(0x0102030405060708).unwrap();
        assert_eq!(
            output.as_bytes(),
            &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]
        );
    }

    #[test]
    fn test_write_double() {
        let mut output = ObjectDataOutput::new();
        output.write_double(1.5).unwrap();
        assert_eq!(output.as_bytes(), &1.5f64.to_be_bytes());
    }

    #[test]
    fn test_write_utf_prefixes_modified_length() {
        let mut output = ObjectDataOutput::new();
        output.write_utf("a\u{0000}").unwrap();
        assert_eq!(output.as_bytes(), &[0x00, 0x03, b'a', 0xC0, 0x80]);
    }

    #[test]
    fn test_write_utf_rejects_long_string() {
        let mut output = ObjectDataOutput::new();
        let long = "x".repeat(MAX_SHORT_STRING + 1);
        let err = output.write_utf(&long).unwrap_err();
        assert!(matches!(err, StreamError::StringTooLong(65536)));
        assert!(output.is_empty());
    }

    #[test]
    fn test_write_utf_accepts_max_length() {
        let mut output = ObjectDataOutput::new();
        output.write_utf(&"y".repeat(MAX_SHORT_STRING)).unwrap();
        assert_eq!(output.len(), MAX_SHORT_STRING + 2);
    }

    #[test]
    fn test_take_front() {
        let mut output = ObjectDataOutput::new();
        output.write_bytes(&[1, 2, 3, 4, 5]).unwrap();
        let front = output.take_front(3);
        assert_eq!(&front[..], &[1, 2, 3]);
        assert_eq!(output.as_bytes(), &[4, 5]);
        assert_eq!(output.take_front(10).len(), 2);
        assert!(output.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut output = ObjectDataOutput::new();
        output.write_int(42).unwrap();
        output.clear();
        assert!(output.is_empty());
    }

    #[test]
    fn test_sink_matches_buffer_encoding() {
        let mut buffer = ObjectDataOutput::new();
        let mut sink = DataSink::new(Vec::new());
        for out in [&mut buffer as &mut dyn DataOutput, &mut sink] {
            out.write_bool(true).unwrap();
            out.write_int(-2).unwrap();
            out.write_float(2.25).unwrap();
            out.write_utf("\u{20AC}").unwrap();
        }
        assert_eq!(sink.bytes_written(), buffer.len() as u64);
        assert_eq!(sink.into_inner(), buffer.into_bytes());
    }
}
