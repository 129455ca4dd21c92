//! Delivery connections.
//!
//! A [`Connection`] is opened by a [`Mailer`](crate::Mailer) right before
//! sending and dropped right after. It applies the mailer's suppression and
//! fail-silently policies around a [`SendmailCommand`] run.

use crate::config::MailerConfig;
use crate::error::{DeliveryError, Error, Result};
use crate::message::Message;
use mailpipe_sendmail::{Output, SendmailCommand};

/// Accepts validated messages for delivery.
///
/// [`Message::send`] validates before calling into a transport, so
/// implementations only deal with delivery.
pub trait Transport {
    /// Delivers one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be delivered and the failure
    /// is not silenced.
    fn send(&mut self, message: &Message) -> Result<DeliveryStatus>;
}

/// Outcome of a send that did not return an error.
#[derive(Debug)]
pub enum DeliveryStatus {
    /// Sending is suppressed; no process was spawned.
    Suppressed,
    /// The delivery mechanism exited with status 0.
    Delivered(Output),
    /// Delivery failed and the fail-silently policy swallowed the error.
    Silenced(DeliveryError),
}

impl DeliveryStatus {
    /// Returns true unless a failure was silenced.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Silenced(_))
    }

    /// Returns the delivery mechanism's exit code, when it ran to completion.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Suppressed => None,
            Self::Delivered(output) => output.exit_code,
            Self::Silenced(error) => error.exit_code(),
        }
    }

    /// Returns the captured output of the delivery mechanism, if it ran.
    #[must_use]
    pub const fn output(&self) -> Option<&Output> {
        match self {
            Self::Suppressed => None,
            Self::Delivered(output) => Some(output),
            Self::Silenced(error) => error.output(),
        }
    }
}

/// A scoped handle for sending one or more messages.
///
/// The connection is released when dropped; [`Connection::close`] makes
/// that explicit.
#[derive(Debug)]
pub struct Connection<'a> {
    config: &'a MailerConfig,
    command: SendmailCommand,
    max_emails: Option<usize>,
    sent: usize,
}

impl<'a> Connection<'a> {
    /// Opens a connection.
    ///
    /// `max_emails` caps the number of sends; when `None` the configured
    /// cap applies. A cap of zero means unlimited.
    #[must_use]
    pub fn new(config: &'a MailerConfig, max_emails: Option<usize>) -> Self {
        let max_emails = max_emails.or(config.max_emails).filter(|&max| max > 0);
        tracing::debug!(?max_emails, "Connection opened");

        Self {
            config,
            command: config.command(),
            max_emails,
            sent: 0,
        }
    }

    /// Returns the number of messages sent through this connection.
    #[must_use]
    pub const fn sent(&self) -> usize {
        self.sent
    }

    /// Returns the send cap, if any.
    #[must_use]
    pub const fn max_emails(&self) -> Option<usize> {
        self.max_emails
    }

    /// Builds a message with the configured default sender, lets
    /// `configure` fill it in, and sends it through this connection.
    ///
    /// # Errors
    ///
    /// Same as [`Message::send`].
    pub fn send_message<F>(
        &mut self,
        subject: impl Into<String>,
        configure: F,
    ) -> Result<DeliveryStatus>
    where
        F: FnOnce(Message) -> Message,
    {
        let message = configure(self.config.new_message(subject));
        message.send(self)
    }

    /// Releases the connection.
    pub fn close(self) {}
}

impl Transport for Connection<'_> {
    fn send(&mut self, message: &Message) -> Result<DeliveryStatus> {
        if let Some(max) = self.max_emails
            && self.sent >= max
        {
            return Err(Error::ConnectionLimit { max });
        }

        let bytes = message.dump();
        self.sent += 1;

        if self.config.debug {
            tracing::debug!(
                message = %String::from_utf8_lossy(&bytes),
                "Serialized message"
            );
        }

        if self.config.effective_suppress() {
            tracing::debug!(subject = %message.subject, "Sending suppressed");
            return Ok(DeliveryStatus::Suppressed);
        }

        match self.command.run(&bytes) {
            Ok(output) => {
                tracing::debug!(
                    subject = %message.subject,
                    recipients = message.recipients.len(),
                    "Message handed to delivery mechanism"
                );
                Ok(DeliveryStatus::Delivered(output))
            }
            Err(e) if self.config.fail_silently => {
                tracing::warn!(
                    error = %e,
                    output = %e.output().map(Output::combined).unwrap_or_default(),
                    "Delivery failed, continuing silently"
                );
                Ok(DeliveryStatus::Silenced(e))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for Connection<'_> {
    fn drop(&mut self) {
        tracing::debug!(sent = self.sent, "Connection closed");
    }
}
