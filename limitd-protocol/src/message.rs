//! Message types exchanged between limitd clients and the service.

use crate::error::ProtocolError;
use crate::wire::{expect_wire_type, WireReader, WireType, WireWriter};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error type reported when a request names a bucket type the service does
/// not know.
pub const UNKNOWN_BUCKET_TYPE: &str = "UNKNOWN_BUCKET_TYPE";

/// Client-supplied correlation id.
///
/// Decoding always yields the same representation that was encoded: a
/// numeric id never comes back as a string and vice versa.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Number(u64),
    String(String),
}

impl From<u64> for Identifier {
    fn from(value: u64) -> Self {
        Identifier::Number(value)
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Identifier::String(value)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Identifier::String(value.to_string())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Number(n) => write!(f, "{}", n),
            Identifier::String(s) => write!(f, "{}", s),
        }
    }
}

/// The two wire slots an [`Identifier`] may occupy.
///
/// The slots form an implicit oneof: exactly one is written, and which one
/// was read tells the decoder the original representation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IdentifierSlots {
    pub numeric: u32,
    pub string: u32,
}

impl IdentifierSlots {
    pub(crate) fn contains(&self, field: u32) -> bool {
        field == self.numeric || field == self.string
    }

    /// Always writes the id, including `0` and `""`.
    pub(crate) fn write(&self, id: &Identifier, writer: &mut WireWriter) {
        match id {
            Identifier::Number(n) => {
                writer.put_tag(self.numeric, WireType::Varint);
                writer.put_varint(*n);
            }
            Identifier::String(s) => {
                writer.put_tag(self.string, WireType::LengthDelimited);
                writer.put_length_delimited(s.as_bytes());
            }
        }
    }

    pub(crate) fn read(
        &self,
        field: u32,
        wire_type: WireType,
        reader: &mut WireReader<'_>,
        slot: &mut Option<Identifier>,
    ) -> Result<(), ProtocolError> {
        let id = if field == self.numeric {
            expect_wire_type(field, wire_type, WireType::Varint)?;
            Identifier::Number(reader.read_varint()?)
        } else {
            expect_wire_type(field, wire_type, WireType::LengthDelimited)?;
            Identifier::String(reader.read_string(field)?)
        };

        if slot.replace(id).is_some() {
            return Err(ProtocolError::malformed(field, "identifier set more than once"));
        }
        Ok(())
    }
}

/// Request methods.
///
/// Wire values are part of the protocol contract and never change. Values
/// this crate does not know are kept as [`Method::Unknown`] so they survive
/// a decode and re-encode unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Method {
    /// Consume quota from a bucket.
    #[default]
    Take,
    /// Replenish quota in a bucket.
    Put,
    /// Health check.
    Ping,
    /// Raw wire value of a method added after this crate; a bare number in JSON.
    #[serde(untagged)]
    Unknown(u32),
}

impl Method {
    pub fn to_wire(self) -> u32 {
        match self {
            Method::Take => 0,
            Method::Put => 1,
            Method::Ping => 2,
            Method::Unknown(value) => value,
        }
    }

    pub fn from_wire(value: u32) -> Self {
        match value {
            0 => Method::Take,
            1 => Method::Put,
            2 => Method::Ping,
            other => Method::Unknown(other),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Take => write!(f, "TAKE"),
            Method::Put => write!(f, "PUT"),
            Method::Ping => write!(f, "PING"),
            Method::Unknown(value) => write!(f, "UNKNOWN({})", value),
        }
    }
}

/// Request sent by a client.
///
/// `method` decides which of the other fields the service looks at, but the
/// codec encodes every field the same way regardless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id echoed in the response.
    pub id: Identifier,

    #[serde(default)]
    pub method: Method,

    /// Bucket type (the resource namespace).
    #[serde(rename = "type", default)]
    pub bucket_type: String,

    /// Bucket key within the type.
    #[serde(default)]
    pub key: String,

    /// Quota units to take or put.
    #[serde(default)]
    pub count: u32,

    /// Asks the service not to reply.
    #[serde(rename = "skipResponse", alias = "skip_response", default)]
    pub skip_response: bool,
}

impl Request {
    pub fn new(id: impl Into<Identifier>, method: Method) -> Self {
        Self {
            id: id.into(),
            method,
            bucket_type: String::new(),
            key: String::new(),
            count: 0,
            skip_response: false,
        }
    }

    pub fn take(
        id: impl Into<Identifier>,
        bucket_type: impl Into<String>,
        key: impl Into<String>,
        count: u32,
    ) -> Self {
        Self::new(id, Method::Take).with_bucket(bucket_type, key, count)
    }

    pub fn put(
        id: impl Into<Identifier>,
        bucket_type: impl Into<String>,
        key: impl Into<String>,
        count: u32,
    ) -> Self {
        Self::new(id, Method::Put).with_bucket(bucket_type, key, count)
    }

    pub fn ping(id: impl Into<Identifier>) -> Self {
        Self::new(id, Method::Ping)
    }

    pub fn with_bucket(
        mut self,
        bucket_type: impl Into<String>,
        key: impl Into<String>,
        count: u32,
    ) -> Self {
        self.bucket_type = bucket_type.into();
        self.key = key.into();
        self.count = count;
        self
    }

    pub fn with_skip_response(mut self, skip: bool) -> Self {
        self.skip_response = skip;
        self
    }
}

/// Outcome of a quota check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TakeResult {
    /// Whether the request fit within the remaining quota.
    pub conformant: bool,
    pub remaining: u32,
    /// Seconds until the bucket resets.
    pub reset: u64,
    pub limit: u32,
}

/// Health-check acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pong {
    pub protocol_version: u32,
}

/// Structured error reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorInfo {
    /// Error name, e.g. [`UNKNOWN_BUCKET_TYPE`].
    #[serde(rename = "type")]
    pub error_type: String,
}

impl ErrorInfo {
    pub fn new(error_type: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
        }
    }

    pub fn unknown_bucket_type() -> Self {
        Self::new(UNKNOWN_BUCKET_TYPE)
    }
}

/// Response payload; exactly one variant is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Take(TakeResult),
    Pong(Pong),
    Error(ErrorInfo),
}

impl Body {
    /// Name of the active variant: `"take"`, `"pong"` or `"error"`.
    pub fn name(&self) -> &'static str {
        match self {
            Body::Take(_) => "take",
            Body::Pong(_) => "pong",
            Body::Error(_) => "error",
        }
    }
}

/// Response sent by the service.
///
/// Serializes through [`ResponseFields`], so JSON looks like
/// `{"request_id": "abc", "take": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ResponseFields", into = "ResponseFields")]
pub struct Response {
    /// Id of the request this response answers.
    pub request_id: Identifier,
    pub body: Body,
}

impl Response {
    pub fn new(request_id: impl Into<Identifier>, body: Body) -> Self {
        Self {
            request_id: request_id.into(),
            body,
        }
    }

    pub fn take(request_id: impl Into<Identifier>, result: TakeResult) -> Self {
        Self::new(request_id, Body::Take(result))
    }

    pub fn pong(request_id: impl Into<Identifier>, protocol_version: u32) -> Self {
        Self::new(request_id, Body::Pong(Pong { protocol_version }))
    }

    pub fn error(request_id: impl Into<Identifier>, error: ErrorInfo) -> Self {
        Self::new(request_id, Body::Error(error))
    }

    /// Name of the active body variant.
    pub fn body_name(&self) -> &'static str {
        self.body.name()
    }

    pub fn as_take(&self) -> Option<&TakeResult> {
        match &self.body {
            Body::Take(take) => Some(take),
            _ => None,
        }
    }

    pub fn as_pong(&self) -> Option<&Pong> {
        match &self.body {
            Body::Pong(pong) => Some(pong),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorInfo> {
        match &self.body {
            Body::Error(error) => Some(error),
            _ => None,
        }
    }
}

/// Untyped shape of a response, one optional slot per body variant.
///
/// This is what callers building responses from loose data (JSON, config,
/// other languages) hand over. Converting into [`Response`] enforces that
/// exactly one variant is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Identifier>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take: Option<TakeResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pong: Option<Pong>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl TryFrom<ResponseFields> for Response {
    type Error = ProtocolError;

    fn try_from(fields: ResponseFields) -> Result<Self, Self::Error> {
        let request_id = fields
            .request_id
            .ok_or(ProtocolError::InvalidMessage("response has no request_id"))?;

        let body = match (fields.take, fields.pong, fields.error) {
            (Some(take), None, None) => Body::Take(take),
            (None, Some(pong), None) => Body::Pong(pong),
            (None, None, Some(error)) => Body::Error(error),
            (None, None, None) => {
                return Err(ProtocolError::InvalidMessage("response has no body"))
            }
            _ => {
                return Err(ProtocolError::InvalidMessage(
                    "response has more than one body",
                ))
            }
        };

        Ok(Response { request_id, body })
    }
}

impl From<Response> for ResponseFields {
    fn from(response: Response) -> Self {
        let mut fields = ResponseFields {
            request_id: Some(response.request_id),
            ..Default::default()
        };
        match response.body {
            Body::Take(take) => fields.take = Some(take),
            Body::Pong(pong) => fields.pong = Some(pong),
            Body::Error(error) => fields.error = Some(error),
        }
        fields
    }
}
