//! Modified UTF-8 codec.
//!
//! Every UTF-16 code unit of the string is encoded on its own, so supplementary
//! characters become two 3-byte sequences, and U+0000 uses the 2-byte form
//! `C0 80`. No 4-byte sequences are ever produced.

use bytes::BufMut;

use crate::error::{Result, StreamError};

/// Returns the number of bytes `s` occupies in modified UTF-8.
pub fn encoded_len(s: &str) -> usize {
    s.encode_utf16().map(unit_len).sum()
}

fn unit_len(unit: u16) -> usize {
    match unit {
        0x0001..=0x007F => 1,
        0x0000 | 0x0080..=0x07FF => 2,
        _ => 3,
    }
}

/// Appends the modified UTF-8 encoding of `s` to `buf`.
pub fn encode_into<B: BufMut>(s: &str, buf: &mut B) {
    for unit in s.encode_utf16() {
        match unit_len(unit) {
            1 => buf.put_u8(unit as u8),
            2 => {
                buf.put_u8(0xC0 | ((unit >> 6) & 0x1F) as u8);
                buf.put_u8(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                buf.put_u8(0xE0 | ((unit >> 12) & 0x0F) as u8);
                buf.put_u8(0x80 | ((unit >> 6) & 0x3F) as u8);
                buf.put_u8(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
}

/// Encodes `s` into a new vector.
pub fn encode(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(s));
    encode_into(s, &mut out);
    out
}

/// Decodes modified UTF-8 bytes.
///
/// Unpaired surrogates are replaced with U+FFFD.
pub fn decode(bytes: &[u8]) -> Result<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let a = bytes[i];
        if a & 0x80 == 0 {
            units.push(a as u16);
            i += 1;
        } else if a & 0xE0 == 0xC0 {
            let b = continuation(bytes, i, 1)?;
            units.push((((a & 0x1F) as u16) << 6) | b);
            i += 2;
        } else if a & 0xF0 == 0xE0 {
            let b = continuation(bytes, i, 1)?;
            let c = continuation(bytes, i, 2)?;
            units.push((((a & 0x0F) as u16) << 12) | (b << 6) | c);
            i += 3;
        } else {
            return Err(malformed(i));
        }
    }
    Ok(String::from_utf16_lossy(&units))
}

fn continuation(bytes: &[u8], start: usize, offset: usize) -> Result<u16> {
    match bytes.get(start + offset) {
        Some(&b) if b & 0xC0 == 0x80 => Ok((b & 0x3F) as u16),
        _ => Err(malformed(start)),
    }
}

fn malformed(position: usize) -> StreamError {
    StreamError::StreamCorrupted(format!(
        "malformed modified UTF-8 sequence at byte {}",
        position
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_is_one_byte_per_char() {
        assert_eq!(encode("abc"), b"abc".to_vec());
        assert_eq!(encoded_len("abc"), 3);
    }

    #[test]
    fn test_nul_uses_two_byte_form() {
        assert_eq!(encode("\u{0000}"), vec![0xC0, 0x80]);
        assert_eq!(decode(&[0xC0, 0x80]).unwrap(), "\u{0000}");
    }

    #[test]
    fn test_two_byte_range() {
        assert_eq!(encode("\u{00E9}"), vec![0xC3, 0xA9]);
        assert_eq!(encode("\u{07FF}"), vec![0xDF, 0xBF]);
    }

    #[test]
    fn test_three_byte_range() {
        assert_eq!(encode("\u{20AC}"), vec![0xE2, 0x82, 0xAC]);
    }

    #[test]
    fn test_supplementary_char_uses_surrogate_pair() {
        let clef = "\u{1D11E}";
        let encoded = encode(clef);
        assert_eq!(encoded, vec![0xED, 0xA0, 0xB4, 0xED, 0xB4, 0x9E]);
        assert_eq!(encoded_len(clef), 6);
        assert_eq!(decode(&encoded).unwrap(), clef);
    }

    #[test]
    fn test_decode_accepts_single_zero_byte() {
        assert_eq!(decode(&[0x00]).unwrap(), "\u{0000}");
    }

    #[test]
    fn test_decode_rejects_truncated_sequence() {
        assert!(decode(&[0xE2, 0x82]).is_err());
        assert!(decode(&[0xC3]).is_err());
    }

    #[test]
    fn test_decode_rejects_bad_continuation() {
        let err = decode(&[b'a', 0xC3, 0x41]).unwrap_err();
        assert!(err.to_string().contains("byte 1"));
    }

    #[test]
    fn test_decode_rejects_four_byte_lead() {
        assert!(decode(&[0xF0, 0x9D, 0x84, 0x9E]).is_err());
    }

    #[test]
    fn test_unpaired_surrogate_becomes_replacement() {
        assert_eq!(decode(&[0xED, 0xA0, 0xB4]).unwrap(), "\u{FFFD}");
    }

    #[test]
    fn test_mixed_round_trip() {
        let s = "a\u{0000}\u{00E9}\u{20AC}\u{1F600}z";
        assert_eq!(decode(&encode(s)).unwrap(), s);
    }
}
