//! Byte-level wire codec.
//!
//! All protocol payloads are laid out by hand: fixed-width integers are
//! big-endian, variable-length counts use the Bitcoin compact-size
//! encoding (a 1-byte tag followed by a little-endian 2/4/8-byte payload
//! for larger values). Byte vectors are length-prefixed with a
//! compact-size count.

use thiserror::Error;

/// Error produced while decoding a wire payload.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WireError {
    /// The payload ended before the expected field.
    #[error("unexpected end of payload at byte {0}")]
    UnexpectedEof(usize),

    /// A compact-size value used a longer encoding than necessary.
    #[error("non-canonical compact-size encoding")]
    NonCanonicalCompactSize,

    /// A length prefix exceeds the remaining payload.
    #[error("declared length {declared} exceeds remaining {remaining} bytes")]
    OversizedLength { declared: u64, remaining: usize },

    /// A field carried a value the decoder rejects.
    #[error("invalid field value: {0}")]
    InvalidValue(String),

    /// Trailing bytes were left after the last field.
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
}

/// Types that serialize themselves onto a [`ByteWriter`].
pub trait WireEncode {
    fn encode(&self, w: &mut ByteWriter);

    /// Encode into a fresh byte vector.
    fn to_wire_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        self.encode(&mut w);
        w.into_bytes()
    }
}

/// Types that deserialize themselves from a [`ByteReader`].
pub trait WireDecode: Sized {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, WireError>;

    /// Decode from a complete payload, rejecting trailing bytes.
    fn from_wire_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        let mut r = ByteReader::new(bytes);
        let value = Self::decode(&mut r)?;
        r.finish()?;
        Ok(value)
    }
}

/// Append-only buffer for encoding.
#[derive(Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_bool(&mut self, v: bool) {
        self.buf.push(u8::from(v));
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Bitcoin variable-length integer.
    pub fn put_compact_size(&mut self, v: u64) {
        match v {
            0..=0xfc => self.buf.push(v as u8),
            0xfd..=0xffff => {
                self.buf.push(0xfd);
                self.buf.extend_from_slice(&(v as u16).to_le_bytes());
            }
            0x1_0000..=0xffff_ffff => {
                self.buf.push(0xfe);
                self.buf.extend_from_slice(&(v as u32).to_le_bytes());
            }
            _ => {
                self.buf.push(0xff);
                self.buf.extend_from_slice(&v.to_le_bytes());
            }
        }
    }

    /// Raw bytes, no length prefix.
    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Compact-size length prefix followed by the bytes.
    pub fn put_byte_vec(&mut self, bytes: &[u8]) {
        self.put_compact_size(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
    }
}

/// Cursor over a received payload.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Fails unless the payload has been fully consumed.
    pub fn finish(self) -> Result<(), WireError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(WireError::TrailingBytes(n)),
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < n {
            return Err(WireError::UnexpectedEof(self.pos));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn get_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    pub fn get_bool(&mut self) -> Result<bool, WireError> {
        match self.get_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(WireError::InvalidValue(format!("bool byte {other:#x}"))),
        }
    }

    pub fn get_u16(&mut self) -> Result<u16, WireError> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn get_u32(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn get_u64(&mut self) -> Result<u64, WireError> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn get_i32(&mut self) -> Result<i32, WireError> {
        Ok(i32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn get_compact_size(&mut self) -> Result<u64, WireError> {
        let tag = self.get_u8()?;
        let value = match tag {
            0xfd => {
                let v = u64::from(u16::from_le_bytes(self.take(2)?.try_into().unwrap()));
                if v < 0xfd {
                    return Err(WireError::NonCanonicalCompactSize);
                }
                v
            }
            0xfe => {
                let v = u64::from(u32::from_le_bytes(self.take(4)?.try_into().unwrap()));
                if v <= 0xffff {
                    return Err(WireError::NonCanonicalCompactSize);
                }
                v
            }
            0xff => {
                let v = u64::from_le_bytes(self.take(8)?.try_into().unwrap());
                if v <= 0xffff_ffff {
                    return Err(WireError::NonCanonicalCompactSize);
                }
                v
            }
            small => u64::from(small),
        };
        Ok(value)
    }

    /// Compact-size length prefix followed by that many raw bytes.
    pub fn get_byte_vec(&mut self) -> Result<Vec<u8>, WireError> {
        let len = self.get_compact_size()?;
        if len > self.remaining() as u64 {
            return Err(WireError::OversizedLength {
                declared: len,
                remaining: self.remaining(),
            });
        }
        Ok(self.take(len as usize)?.to_vec())
    }

    pub fn get_array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        Ok(self.take(N)?.try_into().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_round_trip() {
        let mut w = ByteWriter::new();
        w.put_u8(0xab);
        w.put_u16(0x1234);
        w.put_u32(0xdead_beef);
        w.put_u64(0x0102_0304_0506_0708);
        w.put_i32(-7);
        w.put_bool(true);
        let bytes = w.into_bytes();

        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.get_u8().unwrap(), 0xab);
        assert_eq!(r.get_u16().unwrap(), 0x1234);
        assert_eq!(r.get_u32().unwrap(), 0xdead_beef);
        assert_eq!(r.get_u64().unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(r.get_i32().unwrap(), -7);
        assert!(r.get_bool().unwrap());
        assert!(r.finish().is_ok());
    }

    #[test]
    fn test_fixed_width_is_big_endian() {
        let mut w = ByteWriter::new();
        w.put_u32(0x0102_0304);
        assert_eq!(w.into_bytes(), vec![0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_compact_size_boundaries() {
        for v in [0u64, 0xfc, 0xfd, 0xffff, 0x1_0000, 0xffff_ffff, 0x1_0000_0000] {
            let mut w = ByteWriter::new();
            w.put_compact_size(v);
            let bytes = w.into_bytes();
            let mut r = ByteReader::new(&bytes);
            assert_eq!(r.get_compact_size().unwrap(), v, "round trip of {v}");
            assert!(r.finish().is_ok());
        }
    }

    #[test]
    fn test_compact_size_rejects_non_canonical() {
        // 0xfd prefix carrying a value that fits in one byte.
        let bytes = [0xfd, 0x10, 0x00];
        let mut r = ByteReader::new(&bytes);
        assert_eq!(
            r.get_compact_size(),
            Err(WireError::NonCanonicalCompactSize)
        );
    }

    #[test]
    fn test_byte_vec_oversized_length_rejected() {
        let mut w = ByteWriter::new();
        w.put_compact_size(100);
        w.put_raw(&[0u8; 4]);
        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes);
        assert!(matches!(
            r.get_byte_vec(),
            Err(WireError::OversizedLength { declared: 100, .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_detected() {
        let bytes = [0u8; 3];
        let mut r = ByteReader::new(&bytes);
        let _ = r.get_u8().unwrap();
        assert_eq!(r.finish(), Err(WireError::TrailingBytes(2)));
    }

    #[test]
    fn test_eof_reports_position() {
        let bytes = [0u8; 2];
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.get_u64(), Err(WireError::UnexpectedEof(0)));
    }
}
