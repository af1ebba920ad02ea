//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while encoding or decoding limitd messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed varint at offset {offset}")]
    MalformedVarint { offset: usize },

    #[error("input ends inside varint at offset {offset}")]
    TruncatedVarint { offset: usize },

    #[error("truncated message at offset {offset}: need {needed} bytes, {remaining} remaining")]
    TruncatedMessage {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("malformed message at field {field}: {reason}")]
    MalformedMessage { field: u32, reason: String },

    #[error("invalid message: {0}")]
    InvalidMessage(&'static str),

    #[error("response carries no recognized body")]
    UnknownBody,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid UTF-8 in field {field}")]
    InvalidUtf8 { field: u32 },

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: u64, max: usize },
}

impl ProtocolError {
    pub(crate) fn malformed(field: u32, reason: impl Into<String>) -> Self {
        ProtocolError::MalformedMessage {
            field,
            reason: reason.into(),
        }
    }

    /// Returns whether this error means the input bytes ended early.
    ///
    /// A stream reader can treat these as "wait for more data" when it does
    /// not know message boundaries up front. Corrupt but complete input, such
    /// as an overlong varint, is never incomplete.
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            ProtocolError::TruncatedMessage { .. } | ProtocolError::TruncatedVarint { .. }
        )
    }
}
