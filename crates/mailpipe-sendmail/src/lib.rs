//! # mailpipe-sendmail
//!
//! Runs a sendmail-compatible executable as the delivery mechanism for a
//! fully serialized message.
//!
//! ## Features
//!
//! - **Command construction**: executable path plus a flags string such as
//!   `-t` (read recipients from the message headers)
//! - **Deadlock-free piping**: stdin is written while stdout and stderr are
//!   drained on their own threads
//! - **Bounded wait**: optional timeout that kills the child on expiry
//! - **Diagnostics**: exit code and captured output are always returned
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailpipe_sendmail::SendmailCommand;
//!
//! let command = SendmailCommand::new("/usr/sbin/sendmail").with_flags("-t -i");
//! let output = command.run(b"To: someone@example.com\r\nSubject: Hi\r\n\r\nHello\r\n")?;
//! assert!(output.success());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod command;
mod error;
mod output;

pub use command::{DEFAULT_FLAGS, DEFAULT_PROGRAM, SendmailCommand};
pub use error::{Error, Result};
pub use output::Output;
