//! # mailpipe-core
//!
//! Assembles RFC 5322 / MIME messages from structured fields and hands
//! them to a sendmail-compatible executable.
//!
//! This crate provides:
//! - The [`Message`] model with attachments, `Cc`/`Bcc`, reply-to and charset
//! - Serialization with [`Message::dump`]: plain text, `multipart/mixed`
//!   or `multipart/alternative` depending on content
//! - A header-injection guard, [`Message::is_bad_headers`]
//! - The [`Mailer`] facade and scoped [`Connection`]s with suppression,
//!   fail-silently and per-connection caps
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailpipe_core::{Mailer, MailerConfig};
//!
//! let mailer = Mailer::new(
//!     MailerConfig::builder()
//!         .default_sender("support@example.com")
//!         .build(),
//! );
//!
//! let message = mailer
//!     .message("Welcome")
//!     .with_recipient("user@example.com")
//!     .with_body("Hello!")
//!     .with_html("<p>Hello!</p>");
//!
//! mailer.send(&message)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod connection;
mod error;
mod mailer;
pub mod message;

pub use config::{MailerConfig, MailerConfigBuilder};
pub use connection::{Connection, DeliveryStatus, Transport};
pub use error::{ContractViolation, DeliveryError, Error, Result};
pub use mailer::Mailer;
pub use message::{AddressList, Attachment, Layout, Message, Sender};
pub use mailpipe_sendmail::Output;
