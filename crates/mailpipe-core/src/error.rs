//! Error types for the core library.

use thiserror::Error;

/// Delivery mechanism failure, re-exported for callers matching on [`Error::Delivery`].
pub use mailpipe_sendmail::Error as DeliveryError;

/// A message that does not satisfy the preconditions for sending.
///
/// These indicate misuse by the caller, not environment problems, and are
/// never silenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContractViolation {
    /// The recipient list is empty.
    #[error("No recipients have been added")]
    NoRecipients,

    /// Neither a plain-text body nor an HTML body is set.
    #[error("No body or HTML has been set")]
    NoBody,

    /// No sender was given and no default sender is configured.
    #[error("No sender address has been set")]
    NoSender,
}

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The message violates a send-time precondition.
    #[error("Contract violation: {0}")]
    Contract(#[from] ContractViolation),

    /// A header-bound field contains a line break.
    #[error("Bad header: a header field contains a line break")]
    BadHeader,

    /// The delivery mechanism failed.
    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    /// The connection has already sent its maximum number of emails.
    #[error("Connection limit of {max} emails reached")]
    ConnectionLimit {
        /// Configured cap.
        max: usize,
    },

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true for send-time precondition failures.
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        matches!(self, Self::Contract(_))
    }

    /// Returns true for errors the fail-silently policy may swallow.
    #[must_use]
    pub const fn is_silenceable(&self) -> bool {
        matches!(self, Self::Delivery(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
