//! # limitd-protocol
//!
//! Wire protocol implementation for limitd, the rate-limiting service.
//!
//! This crate provides:
//! - Protobuf-compatible varint, tag and length-delimited primitives
//! - Request and Response codecs with default-value omission
//! - Varint length-prefixed framing for message streams
//! - Error types for malformed input
//!
//! Encoding and decoding are pure functions over in-memory buffers; moving
//! the bytes is left to the transport.

pub mod codec;
pub mod error;
pub mod message;
pub mod request;
pub mod response;
pub mod wire;

pub use codec::{Decoder, Encoder};
pub use error::ProtocolError;
pub use message::{
    Body, ErrorInfo, Identifier, Method, Pong, Request, Response, ResponseFields, TakeResult,
    UNKNOWN_BUCKET_TYPE,
};
pub use wire::{WireMessage, WireReader, WireType, WireWriter};

/// Maximum size of a single length-prefixed message (1 MiB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;
