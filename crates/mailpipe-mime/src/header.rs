//! MIME header handling.

use crate::error::{Error, Result};
use std::fmt;

/// Ordered collection of email headers.
///
/// Names keep the spelling they were added with and are matched
/// case-insensitively. Rendering preserves insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header value, keeping any existing values.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Sets a header value, replacing any existing values.
    ///
    /// The first existing occurrence keeps its position; the rest are dropped.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        match self
            .entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(index) => {
                self.entries[index] = (name, value);
                let mut i = index + 1;
                while i < self.entries.len() {
                    if self.entries[i].0.eq_ignore_ascii_case(&self.entries[index].0) {
                        self.entries.remove(i);
                    } else {
                        i += 1;
                    }
                }
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Returns the number of header lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over all headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Parses a header block.
    ///
    /// Parsing stops at the first empty line. Folded continuation lines
    /// are unfolded with a single space.
    ///
    /// # Errors
    ///
    /// Returns an error if a line is neither a continuation nor a
    /// `Name: value` pair.
    pub fn parse(text: &str) -> Result<Self> {
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;

        for line in text.lines() {
            if line.is_empty() {
                break;
            }

            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some((_, value)) = current.as_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }

            if let Some((name, value)) = current.take() {
                headers.add(name, value);
            }

            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::InvalidHeader(line.to_string()))?;
            current = Some((name.trim().to_string(), value.trim().to_string()));
        }

        if let Some((name, value)) = current {
            headers.add(name, value);
        }

        Ok(headers)
    }
}

/// Preferred maximum line length, CRLF excluded (RFC 5322 section 2.1.1).
pub const MAX_LINE_LEN: usize = 78;

/// Folds a header value so its lines stay within [`MAX_LINE_LEN`].
///
/// The value is split at `separator` and a line break is inserted in place
/// of the separator's trailing whitespace wherever the next item would
/// overflow. `name` only counts toward the width of the first line. An
/// item longer than a whole line is left intact.
///
/// Unfolding the result with [`Headers::parse`] yields the original value.
#[must_use]
pub fn fold(name: &str, value: &str, separator: &str) -> String {
    let glue = separator.trim_end();
    let mut folded = String::with_capacity(value.len());
    let mut column = name.len() + 2;

    for (i, item) in value.split(separator).enumerate() {
        if i > 0 {
            // Leave room for the glue in case the line breaks after this item.
            let width = column + separator.len() + item.len() + glue.len();
            if !item.is_empty() && width > MAX_LINE_LEN {
                folded.push_str(glue);
                folded.push_str("\r\n ");
                column = 1;
            } else {
                folded.push_str(separator);
                column += separator.len();
            }
        }
        folded.push_str(item);
        column += item.len();
    }

    folded
}

impl fmt::Display for Headers {
    /// Writes each header as `Name: value` followed by CRLF.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain"));
    }

    #[test]
    fn test_headers_set_replaces_in_place() {
        let mut headers = Headers::new();
        headers.add("Subject", "s");
        headers.add("To", "alice@example.com");
        headers.add("From", "f");
        headers.add("to", "bob@example.com");
        assert_eq!(headers.get_all("To").len(), 2);

        headers.set("TO", "charlie@example.com");
        assert_eq!(headers.get_all("To"), vec!["charlie@example.com"]);

        let names: Vec<&str> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Subject", "TO", "From"]);
    }

    #[test]
    fn test_headers_remove() {
        let mut headers = Headers::new();
        headers.add("Subject", "Test");
        headers.remove("subject");
        assert!(headers.get("Subject").is_none());
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_display_keeps_order() {
        let mut headers = Headers::new();
        headers.add("Subject", "Hi");
        headers.add("To", "a@example.com");
        headers.add("From", "b@example.com");

        assert_eq!(
            headers.to_string(),
            "Subject: Hi\r\nTo: a@example.com\r\nFrom: b@example.com\r\n"
        );
    }

    #[test]
    fn test_headers_parse() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
            "\r\n",
            "Body: not a header\r\n",
        );

        let headers = Headers::parse(text).unwrap();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
        assert!(headers.get("Body").is_none());
    }

    #[test]
    fn test_fold_short_value_is_unchanged() {
        let value = "a@example.com, b@example.com";
        assert_eq!(fold("To", value, ", "), value);
    }

    #[test]
    fn test_fold_address_list() {
        let addresses: Vec<String> = (0..40).map(|i| format!("user{i:02}@example.com")).collect();
        let value = addresses.join(", ");
        let folded = fold("To", &value, ", ");

        let mut headers = Headers::new();
        headers.add("To", folded.as_str());
        let rendered = headers.to_string();
        for line in rendered.split("\r\n") {
            assert!(line.len() <= MAX_LINE_LEN, "{line:?}");
        }
        assert!(rendered.lines().count() > 1);
        assert!(rendered.lines().skip(1).all(|l| l.is_empty() || l.starts_with(' ')));

        let parsed = Headers::parse(&rendered).unwrap();
        assert_eq!(parsed.get("To"), Some(value.as_str()));
    }

    #[test]
    fn test_fold_words() {
        let value = "word ".repeat(40);
        let value = value.trim_end();
        let folded = fold("Subject", value, " ");
        assert!(folded.contains("\r\n "));

        let parsed = Headers::parse(&format!("Subject: {folded}\r\n")).unwrap();
        assert_eq!(parsed.get("Subject"), Some(value));
    }

    #[test]
    fn test_fold_keeps_overlong_item_whole() {
        let long = "x".repeat(120);
        let value = format!("{long}, a@example.com");
        let folded = fold("To", &value, ", ");
        assert_eq!(folded, format!("{long},\r\n a@example.com"));
    }

    #[test]
    fn test_headers_parse_rejects_garbage() {
        assert!(Headers::parse("not a header line\r\n").is_err());
    }
}
