//! Serialize error taxonomy, per `spec.md` §4.3/§7.

use thiserror::Error;

use crate::channel::ChannelError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SerializeError {
    #[error("header magic tag mismatch")]
    HeaderMagicMismatch,

    #[error("format mismatch: expected {expected}, got {got}")]
    FormatMismatch { expected: String, got: String },

    #[error("version mismatch: expected {expected_major}.{expected_minor}, got {got_major}.{got_minor}")]
    VersionMismatch {
        expected_major: u8,
        expected_minor: u8,
        got_major: u8,
        got_minor: u8,
    },

    #[error("endType name '{got}' does not match beginType name '{expected}'")]
    NameMismatchOnEnd { expected: String, got: String },

    #[error("unexpected primitive kind")]
    UnexpectedPrimitive,

    #[error("stream truncated while reading '{0}'")]
    TruncatedStream(String),

    #[error("declared type string exceeds the configured maximum ({max} bytes)")]
    DeclaredTypeTooLong { max: usize },

    #[error("beginBaseType/endBaseType called out of sequence")]
    NestedBaseType,

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}

pub type SerializeResult<T> = Result<T, SerializeError>;
