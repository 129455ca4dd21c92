//! # mailpipe-mime
//!
//! MIME entity construction and wire rendering for outgoing email.
//!
//! ## Features
//!
//! - **Entity tree**: text, binary and multipart parts rendered with CRLF
//!   line endings and content-derived boundaries
//! - **Ordered headers**: rendering keeps insertion order
//! - **Encoding**: wrapped Base64 bodies, RFC 2047 header words, RFC 2231
//!   extended parameters, charset conversion through `encoding_rs`
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailpipe_mime::{ContentType, Part};
//! use mailpipe_mime::encoding::resolve_charset;
//!
//! let charset = resolve_charset(None);
//! let mut message = Part::multipart(
//!     "mixed",
//!     vec![
//!         Part::text("plain", "Hello, World!", charset),
//!         Part::binary(&ContentType::new("image", "png"), &png_bytes),
//!     ],
//! );
//! message.headers.add("Subject", "Greetings");
//!
//! let wire = message.render();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod error;
mod header;
mod part;

pub mod encoding;

pub use content_type::ContentType;
pub use encoding_rs::Encoding;
pub use error::{Error, Result};
pub use header::{Headers, MAX_LINE_LEN, fold};
pub use part::{Body, Part, TransferEncoding};
