//! Protobuf-compatible wire primitives.
//!
//! Every field is a varint tag `(field_number << 3) | wire_type` followed by
//! its value:
//!
//! ```text
//! +-----------+----------------------------------------------+
//! | wire type | value                                        |
//! +-----------+----------------------------------------------+
//! | 0 varint  | base-128 groups, least significant first     |
//! | 1 fixed64 | 8 bytes                                      |
//! | 2 length  | varint byte length | bytes                   |
//! | 5 fixed32 | 4 bytes                                      |
//! +-----------+----------------------------------------------+
//! ```
//!
//! The wire type alone determines how many bytes a value spans, so readers
//! skip fields they do not know.

use crate::error::ProtocolError;
use bytes::{BufMut, BytesMut};

/// Maximum encoded length of a 64-bit varint.
pub const MAX_VARINT_LEN: usize = 10;

/// Largest field number a tag may carry (2^29 - 1).
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// Framing kind carried in the low three bits of every tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed32 = 5,
}

impl WireType {
    /// Parses the wire type bits of a tag read for `field`.
    ///
    /// Group wire types (3, 4) and the unassigned values (6, 7) are rejected:
    /// their length cannot be computed, so they cannot be skipped either.
    pub fn from_bits(bits: u8, field: u32) -> Result<Self, ProtocolError> {
        match bits {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            5 => Ok(WireType::Fixed32),
            other => Err(ProtocolError::malformed(
                field,
                format!("unsupported wire type {}", other),
            )),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WireType::Varint => "varint",
            WireType::Fixed64 => "fixed64",
            WireType::LengthDelimited => "length-delimited",
            WireType::Fixed32 => "fixed32",
        }
    }
}

/// Returns the number of bytes `value` occupies as a varint.
pub fn varint_len(value: u64) -> usize {
    ((64 - (value | 1).leading_zeros()) as usize + 6) / 7
}

/// Fails unless a known field arrived with the wire type its kind requires.
pub fn expect_wire_type(
    field: u32,
    actual: WireType,
    expected: WireType,
) -> Result<(), ProtocolError> {
    if actual != expected {
        return Err(ProtocolError::malformed(
            field,
            format!(
                "expected wire type {}, got {}",
                expected as u8, actual as u8
            ),
        ));
    }
    Ok(())
}

/// A message with a fixed field layout on the wire.
///
/// Implemented by the top-level [`Request`](crate::Request) and
/// [`Response`](crate::Response) as well as the nested body messages.
pub trait WireMessage: Sized {
    /// Appends every non-default field, in ascending field-number order.
    fn write_fields(&self, writer: &mut WireWriter);

    /// Decodes a complete message occupying all of `buf`.
    fn read_fields(buf: &[u8]) -> Result<Self, ProtocolError>;
}

/// Encodes a message into a fresh buffer.
pub fn encode_message<M: WireMessage>(message: &M) -> BytesMut {
    let mut writer = WireWriter::new();
    message.write_fields(&mut writer);
    writer.into_inner()
}

/// Appends varints, tags and length-delimited values to a byte buffer.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn put_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.put_u8((value as u8 & 0x7F) | 0x80);
            value >>= 7;
        }
        self.buf.put_u8(value as u8);
    }

    pub fn put_tag(&mut self, field: u32, wire_type: WireType) {
        debug_assert!(field != 0 && field <= MAX_FIELD_NUMBER);
        self.put_varint((u64::from(field) << 3) | wire_type as u64);
    }

    /// Writes the byte length as a varint, then the bytes.
    pub fn put_length_delimited(&mut self, bytes: &[u8]) {
        self.put_varint(bytes.len() as u64);
        self.buf.put_slice(bytes);
    }

    /// Writes an unsigned integer field, omitted when zero.
    pub fn put_uint_field(&mut self, field: u32, value: u64) {
        if value != 0 {
            self.put_tag(field, WireType::Varint);
            self.put_varint(value);
        }
    }

    /// Writes a boolean field, omitted when false.
    pub fn put_bool_field(&mut self, field: u32, value: bool) {
        if value {
            self.put_tag(field, WireType::Varint);
            self.put_varint(1);
        }
    }

    /// Writes a string field, omitted when empty.
    pub fn put_string_field(&mut self, field: u32, value: &str) {
        if !value.is_empty() {
            self.put_tag(field, WireType::LengthDelimited);
            self.put_length_delimited(value.as_bytes());
        }
    }

    /// Writes a nested message field.
    ///
    /// Always written, even when every nested field is default: nested
    /// messages here are oneof members, and presence is what selects them.
    pub fn put_message_field<M: WireMessage>(&mut self, field: u32, message: &M) {
        let nested = encode_message(message);
        self.put_tag(field, WireType::LengthDelimited);
        self.put_length_delimited(&nested);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> BytesMut {
        self.buf
    }
}

/// Cursor over an encoded message.
///
/// Every read either consumes a complete value or fails; offsets in errors
/// are relative to the start of the buffer the reader was created over.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current offset into the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn read_varint(&mut self) -> Result<u64, ProtocolError> {
        let start = self.pos;
        let mut value: u64 = 0;

        for i in 0..MAX_VARINT_LEN {
            let Some(&byte) = self.buf.get(self.pos) else {
                return Err(ProtocolError::TruncatedVarint { offset: start });
            };
            self.pos += 1;

            // The tenth group holds only the 64th bit.
            if i == MAX_VARINT_LEN - 1 && byte > 1 {
                return Err(ProtocolError::MalformedVarint { offset: start });
            }

            value |= u64::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }

        Err(ProtocolError::MalformedVarint { offset: start })
    }

    /// Reads a varint that must fit in 32 bits.
    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        let start = self.pos;
        let value = self.read_varint()?;
        u32::try_from(value).map_err(|_| ProtocolError::MalformedVarint { offset: start })
    }

    /// Reads a varint boolean; any non-zero value is true.
    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_varint()? != 0)
    }

    /// Reads a tag, returning `(field_number, wire_type)`.
    pub fn read_tag(&mut self) -> Result<(u32, WireType), ProtocolError> {
        let key = self.read_varint()?;
        let field = key >> 3;
        if field == 0 || field > u64::from(MAX_FIELD_NUMBER) {
            return Err(ProtocolError::malformed(
                0,
                format!("invalid field number {}", field),
            ));
        }
        let field = field as u32;
        let wire_type = WireType::from_bits((key & 0x07) as u8, field)?;
        Ok((field, wire_type))
    }

    /// Reads a length varint, then exactly that many bytes.
    pub fn read_length_delimited(&mut self) -> Result<&'a [u8], ProtocolError> {
        let len = self.read_varint()?;
        let len = usize::try_from(len).unwrap_or(usize::MAX);
        self.take(len)
    }

    /// Reads a length-delimited UTF-8 string for `field`.
    pub fn read_string(&mut self, field: u32) -> Result<String, ProtocolError> {
        let bytes = self.read_length_delimited()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ProtocolError::InvalidUtf8 { field })
    }

    /// Skips one value of the given wire type.
    pub fn skip(&mut self, wire_type: WireType) -> Result<(), ProtocolError> {
        match wire_type {
            WireType::Varint => {
                self.read_varint()?;
            }
            WireType::Fixed64 => {
                self.take(8)?;
            }
            WireType::LengthDelimited => {
                self.read_length_delimited()?;
            }
            WireType::Fixed32 => {
                self.take(4)?;
            }
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(ProtocolError::TruncatedMessage {
                offset: self.pos,
                needed: len,
                remaining,
            });
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }
}

/// Reads a varint length prefix from the front of a stream buffer.
///
/// Returns `Ok(None)` if the buffer ends inside a varint that could still be
/// valid, or `Ok(Some((value, prefix_len)))` once the varint is complete.
pub fn read_length_prefix(buf: &[u8]) -> Result<Option<(u64, usize)>, ProtocolError> {
    let mut reader = WireReader::new(buf);
    match reader.read_varint() {
        Ok(value) => Ok(Some((value, reader.position()))),
        Err(ProtocolError::TruncatedVarint { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn varint_bytes(value: u64) -> Vec<u8> {
        let mut writer = WireWriter::new();
        writer.put_varint(value);
        writer.as_slice().to_vec()
    }

    #[test]
    fn test_varint_encoding() {
        assert_eq!(varint_bytes(0), vec![0x00]);
        assert_eq!(varint_bytes(1), vec![0x01]);
        assert_eq!(varint_bytes(127), vec![0x7F]);
        assert_eq!(varint_bytes(128), vec![0x80, 0x01]);
        assert_eq!(varint_bytes(300), vec![0xAC, 0x02]);
        assert_eq!(varint_bytes(1233), vec![0xD1, 0x09]);
        assert_eq!(
            varint_bytes(u64::MAX),
            vec![0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]
        );
    }

    #[test]
    fn test_varint_len_matches_encoding() {
        for value in [0, 1, 127, 128, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
            assert_eq!(varint_len(value), varint_bytes(value).len(), "{}", value);
        }
    }

    #[test]
    fn test_read_varint() {
        let bytes = [0xAC, 0x02, 0x7F];
        let mut reader = WireReader::new(&bytes);
        assert_eq!(reader.read_varint().unwrap(), 300);
        assert_eq!(reader.position(), 2);
        assert_eq!(reader.read_varint().unwrap(), 127);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_read_varint_unterminated() {
        let bytes = [0x80, 0x80];
        let mut reader = WireReader::new(&bytes);
        let err = reader.read_varint().unwrap_err();
        assert!(matches!(err, ProtocolError::TruncatedVarint { offset: 0 }));
        assert!(err.is_incomplete());
    }

    #[test]
    fn test_read_varint_overflow() {
        // Eleven groups never fit in 64 bits.
        let bytes = [0xFF; 11];
        let mut reader = WireReader::new(&bytes);
        assert!(matches!(
            reader.read_varint(),
            Err(ProtocolError::MalformedVarint { .. })
        ));

        // Tenth group carrying more than the 64th bit.
        let mut bytes = vec![0xFF; 9];
        bytes.push(0x02);
        let mut reader = WireReader::new(&bytes);
        let err = reader.read_varint().unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedVarint { offset: 0 }));
        assert!(!err.is_incomplete());
    }

    #[test]
    fn test_read_u32_overflow() {
        let bytes = varint_bytes(u64::from(u32::MAX) + 1);
        let mut reader = WireReader::new(&bytes);
        let err = reader.read_u32().unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedVarint { offset: 0 }));
        assert!(!err.is_incomplete());

        let bytes = varint_bytes(u64::from(u32::MAX));
        let mut reader = WireReader::new(&bytes);
        assert_eq!(reader.read_u32().unwrap(), u32::MAX);
    }

    #[test]
    fn test_tag_roundtrip() {
        let mut writer = WireWriter::new();
        writer.put_tag(1, WireType::Varint);
        writer.put_tag(2, WireType::LengthDelimited);
        writer.put_tag(16, WireType::Fixed64);
        assert_eq!(writer.as_slice(), &[0x08, 0x12, 0x81, 0x01]);

        let mut reader = WireReader::new(writer.as_slice());
        assert_eq!(reader.read_tag().unwrap(), (1, WireType::Varint));
        assert_eq!(reader.read_tag().unwrap(), (2, WireType::LengthDelimited));
        assert_eq!(reader.read_tag().unwrap(), (16, WireType::Fixed64));
    }

    #[test]
    fn test_invalid_tags() {
        // Field number 0
        let mut reader = WireReader::new(&[0x00]);
        assert!(matches!(
            reader.read_tag(),
            Err(ProtocolError::MalformedMessage { .. })
        ));

        // Start-group wire type
        let mut reader = WireReader::new(&[0x0B]);
        assert!(matches!(
            reader.read_tag(),
            Err(ProtocolError::MalformedMessage { field: 1, .. })
        ));

        // Unassigned wire type 7
        let mut reader = WireReader::new(&[0x0F]);
        assert!(matches!(
            reader.read_tag(),
            Err(ProtocolError::MalformedMessage { field: 1, .. })
        ));
    }

    #[test]
    fn test_length_delimited() {
        let mut writer = WireWriter::new();
        writer.put_length_delimited(b"bar");
        assert_eq!(writer.as_slice(), &[0x03, b'b', b'a', b'r']);

        let mut reader = WireReader::new(writer.as_slice());
        assert_eq!(reader.read_length_delimited().unwrap(), b"bar");
        assert!(reader.is_empty());
    }

    #[test]
    fn test_length_delimited_truncated() {
        let bytes = [0x05, b'a', b'b'];
        let mut reader = WireReader::new(&bytes);
        assert!(matches!(
            reader.read_length_delimited(),
            Err(ProtocolError::TruncatedMessage {
                offset: 1,
                needed: 5,
                remaining: 2,
            })
        ));
    }

    #[test]
    fn test_read_string_invalid_utf8() {
        let bytes = [0x02, 0xC3, 0x28];
        let mut reader = WireReader::new(&bytes);
        assert!(matches!(
            reader.read_string(4),
            Err(ProtocolError::InvalidUtf8 { field: 4 })
        ));
    }

    #[test]
    fn test_default_fields_omitted() {
        let mut writer = WireWriter::new();
        writer.put_uint_field(1, 0);
        writer.put_bool_field(2, false);
        writer.put_string_field(3, "");
        assert!(writer.is_empty());

        writer.put_uint_field(1, 5);
        writer.put_bool_field(2, true);
        writer.put_string_field(3, "x");
        assert_eq!(writer.as_slice(), &[0x08, 0x05, 0x10, 0x01, 0x1A, 0x01, b'x']);
    }

    #[test]
    fn test_skip_every_wire_type() {
        let mut writer = WireWriter::new();
        writer.put_varint(u64::MAX);
        writer.put_length_delimited(b"hello");
        let mut bytes = writer.as_slice().to_vec();
        bytes.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        bytes.extend_from_slice(&[9, 10, 11, 12]);

        let mut reader = WireReader::new(&bytes);
        reader.skip(WireType::Varint).unwrap();
        reader.skip(WireType::LengthDelimited).unwrap();
        reader.skip(WireType::Fixed64).unwrap();
        reader.skip(WireType::Fixed32).unwrap();
        assert!(reader.is_empty());
    }

    #[test]
    fn test_skip_truncated_fixed() {
        let mut reader = WireReader::new(&[1, 2, 3]);
        assert!(matches!(
            reader.skip(WireType::Fixed32),
            Err(ProtocolError::TruncatedMessage { needed: 4, .. })
        ));
    }

    #[test]
    fn test_expect_wire_type() {
        assert!(expect_wire_type(3, WireType::Varint, WireType::Varint).is_ok());
        assert!(matches!(
            expect_wire_type(3, WireType::LengthDelimited, WireType::Varint),
            Err(ProtocolError::MalformedMessage { field: 3, .. })
        ));
    }

    #[test]
    fn test_read_length_prefix() {
        assert_eq!(read_length_prefix(&[]).unwrap(), None);
        assert_eq!(read_length_prefix(&[0x80]).unwrap(), None);
        assert_eq!(read_length_prefix(&[0xAC, 0x02, 0xFF]).unwrap(), Some((300, 2)));
        assert!(matches!(
            read_length_prefix(&[0xFF; 10]),
            Err(ProtocolError::MalformedVarint { .. })
        ));
    }
}
