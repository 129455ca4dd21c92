//! Errors raised while building or reading back MIME entities.

use std::string::FromUtf8Error;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A header line is not a `Name: value` pair or a continuation.
    #[error("Malformed header line: {0:?}")]
    InvalidHeader(String),

    /// A content type is not of the form `type/subtype`, e.g. the one given
    /// for an attachment.
    #[error("Malformed content type: {0:?}")]
    InvalidContentType(String),

    /// A multipart entity carries no `boundary` parameter.
    #[error("Multipart entity without boundary")]
    MissingBoundary,

    /// A leaf body was requested from a multipart entity.
    #[error("Multipart entity has no leaf body")]
    NotALeaf,

    /// An RFC 2047 encoded word is malformed or uses an unsupported encoding.
    #[error("Malformed encoded word: {0}")]
    InvalidEncodedWord(String),

    /// A base64 body or encoded word does not decode.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// Decoded header text is not UTF-8.
    #[error("UTF-8 decode error: {0}")]
    Utf8Decode(#[from] FromUtf8Error),
}
