//! Response encoding and decoding.
//!
//! Field layout:
//!
//! ```text
//! 1  request_id (numeric)  varint    } exactly one of the two
//! 2  request_id (string)   length    }
//! 3  take                  TakeResult  }
//! 4  pong                  Pong        } exactly one of the three
//! 5  error                 ErrorInfo   }
//! ```
//!
//! Nested messages:
//!
//! ```text
//! TakeResult: 1 conformant (bool), 2 remaining, 3 reset, 4 limit
//! Pong:       1 protocol_version
//! ErrorInfo:  1 type (string)
//! ```

use crate::error::ProtocolError;
use crate::message::{
    Body, ErrorInfo, IdentifierSlots, Pong, Response, ResponseFields, TakeResult,
};
use crate::wire::{encode_message, expect_wire_type, WireMessage, WireReader, WireType, WireWriter};
use bytes::BytesMut;

const REQUEST_ID: IdentifierSlots = IdentifierSlots {
    numeric: 1,
    string: 2,
};
const FIELD_TAKE: u32 = 3;
const FIELD_PONG: u32 = 4;
const FIELD_ERROR: u32 = 5;

impl WireMessage for TakeResult {
    fn write_fields(&self, writer: &mut WireWriter) {
        writer.put_bool_field(1, self.conformant);
        writer.put_uint_field(2, u64::from(self.remaining));
        writer.put_uint_field(3, self.reset);
        writer.put_uint_field(4, u64::from(self.limit));
    }

    fn read_fields(buf: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = WireReader::new(buf);
        let mut take = TakeResult::default();

        while !reader.is_empty() {
            let (field, wire_type) = reader.read_tag()?;
            match field {
                1..=4 => {
                    expect_wire_type(field, wire_type, WireType::Varint)?;
                    match field {
                        1 => take.conformant = reader.read_bool()?,
                        2 => take.remaining = reader.read_u32()?,
                        3 => take.reset = reader.read_varint()?,
                        _ => take.limit = reader.read_u32()?,
                    }
                }
                _ => reader.skip(wire_type)?,
            }
        }

        Ok(take)
    }
}

impl WireMessage for Pong {
    fn write_fields(&self, writer: &mut WireWriter) {
        writer.put_uint_field(1, u64::from(self.protocol_version));
    }

    fn read_fields(buf: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = WireReader::new(buf);
        let mut pong = Pong::default();

        while !reader.is_empty() {
            let (field, wire_type) = reader.read_tag()?;
            if field == 1 {
                expect_wire_type(field, wire_type, WireType::Varint)?;
                pong.protocol_version = reader.read_u32()?;
            } else {
                reader.skip(wire_type)?;
            }
        }

        Ok(pong)
    }
}

impl WireMessage for ErrorInfo {
    fn write_fields(&self, writer: &mut WireWriter) {
        writer.put_string_field(1, &self.error_type);
    }

    fn read_fields(buf: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = WireReader::new(buf);
        let mut error = ErrorInfo::default();

        while !reader.is_empty() {
            let (field, wire_type) = reader.read_tag()?;
            if field == 1 {
                expect_wire_type(field, wire_type, WireType::LengthDelimited)?;
                error.error_type = reader.read_string(field)?;
            } else {
                reader.skip(wire_type)?;
            }
        }

        Ok(error)
    }
}

impl WireMessage for Response {
    fn write_fields(&self, writer: &mut WireWriter) {
        REQUEST_ID.write(&self.request_id, writer);
        match &self.body {
            Body::Take(take) => writer.put_message_field(FIELD_TAKE, take),
            Body::Pong(pong) => writer.put_message_field(FIELD_PONG, pong),
            Body::Error(error) => writer.put_message_field(FIELD_ERROR, error),
        }
    }

    fn read_fields(buf: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = WireReader::new(buf);
        let mut request_id = None;
        let mut body = None;

        while !reader.is_empty() {
            let (field, wire_type) = reader.read_tag()?;
            match field {
                f if REQUEST_ID.contains(f) => {
                    REQUEST_ID.read(f, wire_type, &mut reader, &mut request_id)?
                }
                FIELD_TAKE | FIELD_PONG | FIELD_ERROR => {
                    expect_wire_type(field, wire_type, WireType::LengthDelimited)?;
                    let nested = reader.read_length_delimited()?;
                    let decoded = match field {
                        FIELD_TAKE => Body::Take(TakeResult::read_fields(nested)?),
                        FIELD_PONG => Body::Pong(Pong::read_fields(nested)?),
                        _ => Body::Error(ErrorInfo::read_fields(nested)?),
                    };
                    // At most one body per response.
                    if body.replace(decoded).is_some() {
                        return Err(ProtocolError::malformed(
                            field,
                            "response carries more than one body",
                        ));
                    }
                }
                _ => reader.skip(wire_type)?,
            }
        }

        let request_id = request_id.ok_or(ProtocolError::MissingField("request_id"))?;
        let body = body.ok_or(ProtocolError::UnknownBody)?;
        Ok(Response { request_id, body })
    }
}

impl Response {
    /// Encodes the response into its wire form.
    pub fn encode(&self) -> BytesMut {
        encode_message(self)
    }

    /// Validates loose response fields and encodes them.
    ///
    /// Fails with [`ProtocolError::InvalidMessage`] unless exactly one body
    /// variant and a request id are set.
    pub fn encode_fields(fields: &ResponseFields) -> Result<BytesMut, ProtocolError> {
        let response = Response::try_from(fields.clone())?;
        Ok(response.encode())
    }

    /// Decodes a response occupying all of `buf`.
    ///
    /// Fails with [`ProtocolError::UnknownBody`] if no body variant is present
    /// and with [`ProtocolError::MalformedMessage`] if more than one is.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        Self::read_fields(buf)
    }
}
