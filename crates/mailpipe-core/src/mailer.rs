//! The mailer facade.

use crate::config::MailerConfig;
use crate::connection::{Connection, DeliveryStatus};
use crate::error::Result;
use crate::message::Message;
use std::path::Path;

/// Entry point for sending mail through a sendmail-compatible executable.
///
/// A mailer only exists in its configured state: every constructor takes
/// or loads a [`MailerConfig`], which is read-only afterwards. Mailers are
/// cheap to share between threads; each send opens its own [`Connection`].
#[derive(Debug, Clone, Default)]
pub struct Mailer {
    config: MailerConfig,
}

impl Mailer {
    /// Creates a mailer from a configuration.
    #[must_use]
    pub fn new(config: MailerConfig) -> Self {
        tracing::debug!(
            mailer = %config.mailer.display(),
            flags = %config.mailer_flags,
            suppress = config.effective_suppress(),
            fail_silently = config.fail_silently,
            "Mailer configured"
        );
        Self { config }
    }

    /// Creates a mailer from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable has an invalid value.
    pub fn from_env() -> Result<Self> {
        MailerConfig::from_env().map(Self::new)
    }

    /// Creates a mailer from a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        MailerConfig::load(path).map(Self::new)
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &MailerConfig {
        &self.config
    }

    /// Creates a message carrying the configured default sender.
    #[must_use]
    pub fn message(&self, subject: impl Into<String>) -> Message {
        self.config.new_message(subject)
    }

    /// Opens a connection, optionally capped at `max_emails` sends.
    #[must_use]
    pub fn connect(&self, max_emails: Option<usize>) -> Connection<'_> {
        Connection::new(&self.config, max_emails)
    }

    /// Sends a message through a fresh connection.
    ///
    /// The connection is released whether or not the send succeeds.
    ///
    /// # Errors
    ///
    /// Returns contract and header errors unconditionally, and delivery
    /// errors unless the fail-silently policy is on.
    pub fn send(&self, message: &Message) -> Result<DeliveryStatus> {
        let mut connection = self.connect(None);
        message.send(&mut connection)
    }

    /// Builds a message with [`Mailer::message`], lets `configure` fill it
    /// in, and sends it.
    ///
    /// # Errors
    ///
    /// Same as [`Mailer::send`].
    pub fn send_message<F>(&self, subject: impl Into<String>, configure: F) -> Result<DeliveryStatus>
    where
        F: FnOnce(Message) -> Message,
    {
        self.send(&configure(self.message(subject)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::{ContractViolation, Error};
    use crate::message::Sender;

    fn mailer() -> Mailer {
        Mailer::new(
            MailerConfig::builder()
                .testing(true)
                .default_sender("support@example.com")
                .build(),
        )
    }

    #[test]
    fn test_message_uses_default_sender() {
        let message = mailer().message("subject").with_recipient("to@example.com");
        assert_eq!(message.sender, Some(Sender::from("support@example.com")));
        assert_eq!(message.recipients, vec!["to@example.com"]);
    }

    #[test]
    fn test_send_under_testing_is_suppressed() {
        let mailer = mailer();
        let message = mailer
            .message("testing")
            .with_recipient("to@example.com")
            .with_body("testing");

        let status = mailer.send(&message).unwrap();
        assert!(matches!(status, DeliveryStatus::Suppressed));
    }

    #[test]
    fn test_send_without_sender() {
        let mailer = Mailer::new(MailerConfig::builder().testing(true).build());
        let message = mailer
            .message("testing")
            .with_recipient("to@example.com")
            .with_body("testing");

        let err = mailer.send(&message).unwrap_err();
        assert!(matches!(err, Error::Contract(ContractViolation::NoSender)));
    }

    #[test]
    fn test_send_without_recipients() {
        let err = mailer()
            .send_message("testing", |m| m.with_body("testing"))
            .unwrap_err();
        assert!(matches!(err, Error::Contract(ContractViolation::NoRecipients)));
    }

    #[test]
    fn test_send_without_body() {
        let err = mailer()
            .send_message("testing", |m| m.with_recipient("to@example.com"))
            .unwrap_err();
        assert!(matches!(err, Error::Contract(ContractViolation::NoBody)));
    }

    #[test]
    fn test_bad_header_is_rejected_even_when_suppressed() {
        let err = mailer()
            .send_message("testing\r\nBcc: victim@example.com", |m| {
                m.with_recipient("to@example.com").with_body("testing")
            })
            .unwrap_err();
        assert!(matches!(err, Error::BadHeader));
    }
}
