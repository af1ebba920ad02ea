//! Request encoding and decoding.
//!
//! Field layout:
//!
//! ```text
//! 1  id (numeric)      varint      } exactly one of the two
//! 2  id (string)       length      }
//! 3  method            varint      default TAKE
//! 4  type              length      default ""
//! 5  key               length      default ""
//! 6  count             varint      default 0
//! 7  skip_response     varint      default false
//! ```

use crate::error::ProtocolError;
use crate::message::{IdentifierSlots, Method, Request};
use crate::wire::{encode_message, expect_wire_type, WireMessage, WireReader, WireType, WireWriter};
use bytes::BytesMut;

const ID: IdentifierSlots = IdentifierSlots {
    numeric: 1,
    string: 2,
};
const FIELD_METHOD: u32 = 3;
const FIELD_TYPE: u32 = 4;
const FIELD_KEY: u32 = 5;
const FIELD_COUNT: u32 = 6;
const FIELD_SKIP_RESPONSE: u32 = 7;

impl WireMessage for Request {
    fn write_fields(&self, writer: &mut WireWriter) {
        ID.write(&self.id, writer);
        writer.put_uint_field(FIELD_METHOD, u64::from(self.method.to_wire()));
        writer.put_string_field(FIELD_TYPE, &self.bucket_type);
        writer.put_string_field(FIELD_KEY, &self.key);
        writer.put_uint_field(FIELD_COUNT, u64::from(self.count));
        writer.put_bool_field(FIELD_SKIP_RESPONSE, self.skip_response);
    }

    fn read_fields(buf: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = WireReader::new(buf);
        let mut id = None;
        let mut method = Method::default();
        let mut bucket_type = String::new();
        let mut key = String::new();
        let mut count = 0;
        let mut skip_response = false;

        while !reader.is_empty() {
            let (field, wire_type) = reader.read_tag()?;
            match field {
                f if ID.contains(f) => ID.read(f, wire_type, &mut reader, &mut id)?,
                FIELD_METHOD => {
                    expect_wire_type(field, wire_type, WireType::Varint)?;
                    method = Method::from_wire(reader.read_u32()?);
                }
                FIELD_TYPE => {
                    expect_wire_type(field, wire_type, WireType::LengthDelimited)?;
                    bucket_type = reader.read_string(field)?;
                }
                FIELD_KEY => {
                    expect_wire_type(field, wire_type, WireType::LengthDelimited)?;
                    key = reader.read_string(field)?;
                }
                FIELD_COUNT => {
                    expect_wire_type(field, wire_type, WireType::Varint)?;
                    count = reader.read_u32()?;
                }
                FIELD_SKIP_RESPONSE => {
                    expect_wire_type(field, wire_type, WireType::Varint)?;
                    skip_response = reader.read_bool()?;
                }
                _ => reader.skip(wire_type)?,
            }
        }

        Ok(Request {
            id: id.ok_or(ProtocolError::MissingField("id"))?,
            method,
            bucket_type,
            key,
            count,
            skip_response,
        })
    }
}

impl Request {
    /// Encodes the request into its wire form.
    pub fn encode(&self) -> BytesMut {
        encode_message(self)
    }

    /// Decodes a request occupying all of `buf`.
    ///
    /// Unknown fields are skipped. On error no partial request is returned.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        Self::read_fields(buf)
    }
}
