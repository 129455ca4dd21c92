//! Sender and address list types.

use mailpipe_mime::encoding::encode_rfc2047;
use std::fmt;

/// RFC 5322 `specials` that force a display name into a quoted string.
const SPECIALS: &str = "()<>[]:;@\\,.\"";

/// The author of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sender {
    /// A bare address or a preformatted `Name <address>` string.
    Address(String),
    /// A display name and an address.
    Named {
        /// Display name.
        name: String,
        /// Mailbox address.
        address: String,
    },
}

impl Sender {
    /// Creates a sender with a display name.
    #[must_use]
    pub fn named(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Returns the address part, or the whole string for [`Sender::Address`].
    #[must_use]
    pub fn address(&self) -> &str {
        match self {
            Self::Address(address) | Self::Named { address, .. } => address,
        }
    }

    /// Returns true if there is no usable address.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.address().trim().is_empty()
    }

    /// Renders the `From` header value, encoding a non-ASCII display name.
    pub(crate) fn header_value(&self) -> String {
        match self {
            Self::Address(address) => address.clone(),
            Self::Named { name, address } if !name.is_ascii() => {
                format!("{} <{address}>", encode_rfc2047(name, "utf-8"))
            }
            Self::Named { .. } => self.to_string(),
        }
    }
}

impl fmt::Display for Sender {
    /// Renders `name <address>`, quoting the name when it contains specials.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(address) => f.write_str(address),
            Self::Named { name, address } if name.contains(|c: char| SPECIALS.contains(c)) => {
                let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "\"{escaped}\" <{address}>")
            }
            Self::Named { name, address } => write!(f, "{name} <{address}>"),
        }
    }
}

impl From<&str> for Sender {
    fn from(address: &str) -> Self {
        Self::Address(address.to_string())
    }
}

impl From<String> for Sender {
    fn from(address: String) -> Self {
        Self::Address(address)
    }
}

impl<N, A> From<(N, A)> for Sender
where
    N: Into<String>,
    A: Into<String>,
{
    fn from((name, address): (N, A)) -> Self {
        Self::named(name, address)
    }
}

/// A `Cc` or `Bcc` value: one preformatted string or a list of addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressList {
    /// Used verbatim.
    Single(String),
    /// Joined with `", "`.
    Many(Vec<String>),
}

impl AddressList {
    /// Returns true if there is nothing to render.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(address) => address.is_empty(),
            Self::Many(addresses) => addresses.is_empty(),
        }
    }

    /// Iterates over the stored entries.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let entries: &[String] = match self {
            Self::Single(address) => std::slice::from_ref(address),
            Self::Many(addresses) => addresses,
        };
        entries.iter().map(String::as_str)
    }

    /// Renders the header value.
    #[must_use]
    pub fn header_value(&self) -> String {
        match self {
            Self::Single(address) => address.clone(),
            Self::Many(addresses) => addresses.join(", "),
        }
    }
}

impl From<&str> for AddressList {
    fn from(address: &str) -> Self {
        Self::Single(address.to_string())
    }
}

impl From<String> for AddressList {
    fn from(address: String) -> Self {
        Self::Single(address)
    }
}

impl From<Vec<String>> for AddressList {
    fn from(addresses: Vec<String>) -> Self {
        Self::Many(addresses)
    }
}

impl From<Vec<&str>> for AddressList {
    fn from(addresses: Vec<&str>) -> Self {
        Self::Many(addresses.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for AddressList {
    fn from(addresses: [&str; N]) -> Self {
        Self::Many(addresses.iter().map(|a| (*a).to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_from_tuple() {
        let sender = Sender::from(("tester", "tester@example.com"));
        assert_eq!(sender.to_string(), "tester <tester@example.com>");
        assert_eq!(sender.address(), "tester@example.com");
    }

    #[test]
    fn test_sender_quotes_specials() {
        let sender = Sender::named("Doe, Jane", "jane@example.com");
        assert_eq!(sender.to_string(), "\"Doe, Jane\" <jane@example.com>");
    }

    #[test]
    fn test_sender_header_value_encodes_non_ascii_name() {
        let sender = Sender::named("Jörg", "joerg@example.com");
        assert_eq!(sender.header_value(), "=?utf-8?B?SsO2cmc=?= <joerg@example.com>");
        assert_eq!(sender.to_string(), "Jörg <joerg@example.com>");
    }

    #[test]
    fn test_sender_is_empty() {
        assert!(Sender::from("").is_empty());
        assert!(Sender::named("Nobody", " ").is_empty());
        assert!(!Sender::from("a@example.com").is_empty());
    }

    #[test]
    fn test_address_list_rendering() {
        let single = AddressList::from("a@example.com, b@example.com");
        assert_eq!(single.header_value(), "a@example.com, b@example.com");

        let many = AddressList::from(["a@example.com", "b@example.com"]);
        assert_eq!(many.header_value(), "a@example.com, b@example.com");
        assert_eq!(many.iter().count(), 2);
    }

    #[test]
    fn test_address_list_is_empty() {
        assert!(AddressList::Many(Vec::new()).is_empty());
        assert!(AddressList::from("").is_empty());
        assert!(!AddressList::from(vec!["x@example.com"]).is_empty());
    }
}
