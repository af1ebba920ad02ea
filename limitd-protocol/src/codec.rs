//! Length-prefixed framing for streams of requests and responses.
//!
//! Each message on a stream is preceded by its byte length as a varint:
//!
//! ```text
//! +----------------+----------------------+
//! | length (varint)| message (length bytes)|
//! +----------------+----------------------+
//! ```

use crate::error::ProtocolError;
use crate::message::{Request, Response};
use crate::wire::{encode_message, read_length_prefix, varint_len, WireMessage, WireWriter};
use crate::MAX_MESSAGE_SIZE;
use bytes::{Buf, Bytes, BytesMut};

/// Encodes requests and responses with a length prefix.
pub struct Encoder;

impl Encoder {
    /// Encodes a length-prefixed request.
    pub fn encode_request(request: &Request) -> Result<BytesMut, ProtocolError> {
        Self::encode_message(request)
    }

    /// Encodes a length-prefixed response.
    pub fn encode_response(response: &Response) -> Result<BytesMut, ProtocolError> {
        Self::encode_message(response)
    }

    /// Encodes any wire message with a length prefix.
    pub fn encode_message<M: WireMessage>(message: &M) -> Result<BytesMut, ProtocolError> {
        Self::encode_message_with_max(message, MAX_MESSAGE_SIZE)
    }

    /// Encodes a length-prefixed message, rejecting bodies longer than `max`
    /// bytes. Pair with [`Decoder::with_max_message_size`].
    pub fn encode_message_with_max<M: WireMessage>(
        message: &M,
        max: usize,
    ) -> Result<BytesMut, ProtocolError> {
        let body = encode_message(message);
        if body.len() > max {
            return Err(ProtocolError::MessageTooLarge {
                size: body.len() as u64,
                max,
            });
        }

        let mut writer = WireWriter::with_capacity(varint_len(body.len() as u64) + body.len());
        writer.put_length_delimited(&body);
        Ok(writer.into_inner())
    }
}

/// Buffers stream bytes and splits them into length-prefixed messages.
pub struct Decoder {
    buffer: BytesMut,
    max_message_size: usize,
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_max_message_size(MAX_MESSAGE_SIZE)
    }

    /// Creates a decoder that rejects messages longer than `max` bytes.
    pub fn with_max_message_size(max: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            max_message_size: max,
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Appends bytes to the internal buffer.
    pub fn extend_bytes(&mut self, data: Bytes) {
        self.buffer.extend_from_slice(&data);
    }

    /// Splits the next complete message body off the buffer.
    ///
    /// Returns `Ok(None)` if more data is needed. Nothing is consumed until
    /// the whole message has arrived.
    pub fn decode_frame(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        let Some((len, prefix_len)) = read_length_prefix(&self.buffer)? else {
            return Ok(None);
        };

        if len > self.max_message_size as u64 {
            return Err(ProtocolError::MessageTooLarge {
                size: len,
                max: self.max_message_size,
            });
        }

        let len = len as usize;
        if self.buffer.len() < prefix_len + len {
            return Ok(None);
        }

        self.buffer.advance(prefix_len);
        Ok(Some(self.buffer.split_to(len).freeze()))
    }

    /// Attempts to decode the next message of type `M` from the buffer.
    pub fn decode_message<M: WireMessage>(&mut self) -> Result<Option<M>, ProtocolError> {
        match self.decode_frame()? {
            Some(frame) => Ok(Some(M::read_fields(&frame)?)),
            None => Ok(None),
        }
    }

    /// Attempts to decode the next request from the buffer.
    pub fn decode_request(&mut self) -> Result<Option<Request>, ProtocolError> {
        self.decode_message()
    }

    /// Attempts to decode the next response from the buffer.
    pub fn decode_response(&mut self) -> Result<Option<Response>, ProtocolError> {
        self.decode_message()
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
