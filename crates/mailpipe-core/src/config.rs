//! Mailer configuration.
//!
//! Configuration is read once when a [`Mailer`](crate::Mailer) is created
//! and is read-only afterwards. It can come from a TOML file, from the host
//! application's key/value settings (environment variables by default), or
//! from [`MailerConfigBuilder`].

use crate::error::{Error, Result};
use crate::message::{Message, Sender};
use mailpipe_sendmail::{DEFAULT_FLAGS, DEFAULT_PROGRAM, SendmailCommand};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::{Duration, TryFromFloatSecsError};

/// Host setting: delivery mechanism path.
pub const KEY_MAILER: &str = "MAIL_MAILER";
/// Host setting: delivery mechanism flags.
pub const KEY_MAILER_FLAGS: &str = "MAIL_MAILER_FLAGS";
/// Host setting: serialize but never spawn the delivery mechanism.
pub const KEY_SUPPRESS_SEND: &str = "MAIL_SUPPRESS_SEND";
/// Host setting: swallow delivery failures.
pub const KEY_FAIL_SILENTLY: &str = "MAIL_FAIL_SILENTLY";
/// Host setting: sender used when a message has none.
pub const KEY_DEFAULT_SENDER: &str = "DEFAULT_MAIL_SENDER";
/// Host setting: log serialized messages.
pub const KEY_DEBUG: &str = "MAIL_DEBUG";
/// Host setting: the host runs under test, which implies suppression.
pub const KEY_TESTING: &str = "TESTING";
/// Host setting: default per-connection send cap.
pub const KEY_MAX_EMAILS: &str = "MAIL_MAX_EMAILS";
/// Host setting: delivery mechanism timeout in seconds, zero for none.
pub const KEY_TIMEOUT: &str = "MAIL_TIMEOUT";

/// Configuration shared by a mailer and all of its connections.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MailerConfig {
    /// Path of the sendmail-compatible executable.
    pub mailer: PathBuf,
    /// Flags passed to the executable, split on whitespace.
    pub mailer_flags: String,
    /// Serialize messages but never spawn the executable.
    pub suppress_send: bool,
    /// Swallow delivery failures instead of returning them.
    pub fail_silently: bool,
    /// Sender for messages created through the mailer.
    pub default_sender: Option<String>,
    /// Log every serialized message at debug level.
    pub debug: bool,
    /// Test mode; implies `suppress_send`.
    pub testing: bool,
    /// Default per-connection send cap, zero or unset for unlimited.
    pub max_emails: Option<usize>,
    /// How long to wait for the executable before killing it. Read from
    /// `timeout_secs` in seconds, fractions allowed; zero means no limit.
    #[serde(rename = "timeout_secs", deserialize_with = "deserialize_timeout")]
    pub timeout: Option<Duration>,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            mailer: PathBuf::from(DEFAULT_PROGRAM),
            mailer_flags: DEFAULT_FLAGS.to_string(),
            suppress_send: false,
            fail_silently: true,
            default_sender: None,
            debug: false,
            testing: false,
            max_emails: None,
            timeout: None,
        }
    }
}

impl MailerConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> MailerConfigBuilder {
        MailerConfigBuilder::new()
    }

    /// Parses a TOML document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or a value has
    /// the wrong type.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(Into::into)
    }

    /// Loads a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), "Loaded mailer config");
        Ok(config)
    }

    /// Builds a configuration from host settings on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a boolean or numeric setting cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().with_lookup(lookup)
    }

    /// Builds a configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a boolean or numeric variable cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Overrides fields with the host settings that `lookup` provides.
    ///
    /// # Errors
    ///
    /// Returns an error if a boolean or numeric setting cannot be parsed.
    pub fn with_lookup<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mailer) = lookup(KEY_MAILER) {
            self.mailer = PathBuf::from(mailer);
        }
        if let Some(flags) = lookup(KEY_MAILER_FLAGS) {
            self.mailer_flags = flags;
        }
        if let Some(value) = lookup(KEY_SUPPRESS_SEND) {
            self.suppress_send = parse_bool(KEY_SUPPRESS_SEND, &value)?;
        }
        if let Some(value) = lookup(KEY_FAIL_SILENTLY) {
            self.fail_silently = parse_bool(KEY_FAIL_SILENTLY, &value)?;
        }
        if let Some(sender) = lookup(KEY_DEFAULT_SENDER) {
            self.default_sender = Some(sender).filter(|s| !s.is_empty());
        }
        if let Some(value) = lookup(KEY_DEBUG) {
            self.debug = parse_bool(KEY_DEBUG, &value)?;
        }
        if let Some(value) = lookup(KEY_TESTING) {
            self.testing = parse_bool(KEY_TESTING, &value)?;
        }
        if let Some(value) = lookup(KEY_MAX_EMAILS) {
            self.max_emails = Some(parse_number(KEY_MAX_EMAILS, &value)?);
        }
        if let Some(value) = lookup(KEY_TIMEOUT) {
            self.timeout = timeout_from_secs(parse_number(KEY_TIMEOUT, &value)?)
                .map_err(|e| Error::Config(format!("{KEY_TIMEOUT}: {e}")))?;
        }
        Ok(self)
    }

    /// Returns true if sending is suppressed, explicitly or by test mode.
    #[must_use]
    pub const fn effective_suppress(&self) -> bool {
        self.suppress_send || self.testing
    }

    /// Returns the delivery timeout.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the default sender, if configured.
    #[must_use]
    pub fn default_sender(&self) -> Option<Sender> {
        self.default_sender.as_deref().map(Sender::from)
    }

    /// Creates a message carrying the default sender.
    #[must_use]
    pub fn new_message(&self, subject: impl Into<String>) -> Message {
        Message::with_default_sender(subject, self.default_sender())
    }

    /// Builds the delivery mechanism command line.
    #[must_use]
    pub fn command(&self) -> SendmailCommand {
        SendmailCommand::from_flags(&self.mailer, &self.mailer_flags).with_timeout(self.timeout())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::Config(format!("{key}: expected a boolean, got {other:?}"))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key}: expected a number, got {value:?}")))
}

/// Zero seconds disables the timeout.
fn timeout_from_secs(secs: f64) -> std::result::Result<Option<Duration>, TryFromFloatSecsError> {
    Duration::try_from_secs_f64(secs).map(|timeout| Some(timeout).filter(|t| !t.is_zero()))
}

fn deserialize_timeout<'de, D>(deserializer: D) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<f64>::deserialize(deserializer)? {
        Some(secs) => timeout_from_secs(secs).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Builder for [`MailerConfig`].
#[derive(Debug, Clone, Default)]
pub struct MailerConfigBuilder {
    config: MailerConfig,
}

impl MailerConfigBuilder {
    /// Creates a builder starting from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the executable path.
    #[must_use]
    pub fn mailer(mut self, mailer: impl Into<PathBuf>) -> Self {
        self.config.mailer = mailer.into();
        self
    }

    /// Sets the executable flags.
    #[must_use]
    pub fn mailer_flags(mut self, flags: impl Into<String>) -> Self {
        self.config.mailer_flags = flags.into();
        self
    }

    /// Sets send suppression.
    #[must_use]
    pub const fn suppress_send(mut self, suppress: bool) -> Self {
        self.config.suppress_send = suppress;
        self
    }

    /// Sets the fail-silently policy.
    #[must_use]
    pub const fn fail_silently(mut self, fail_silently: bool) -> Self {
        self.config.fail_silently = fail_silently;
        self
    }

    /// Sets the default sender.
    #[must_use]
    pub fn default_sender(mut self, sender: impl Into<String>) -> Self {
        self.config.default_sender = Some(sender.into());
        self
    }

    /// Enables logging of serialized messages.
    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Sets test mode.
    #[must_use]
    pub const fn testing(mut self, testing: bool) -> Self {
        self.config.testing = testing;
        self
    }

    /// Sets the default per-connection send cap.
    #[must_use]
    pub const fn max_emails(mut self, max_emails: usize) -> Self {
        self.config.max_emails = Some(max_emails);
        self
    }

    /// Sets the delivery timeout. A zero duration means no limit.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout).filter(|t| !t.is_zero());
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> MailerConfig {
        self.config
    }
}
