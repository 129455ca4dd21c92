//! File attachments.

use mailpipe_mime::encoding::encode_rfc2231;
use mailpipe_mime::{ContentType, Part};

/// Content type used when none is given.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Disposition used when none is given.
pub const DEFAULT_DISPOSITION: &str = "attachment";

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Filename shown to the recipient.
    pub filename: Option<String>,
    /// MIME type, `type/subtype`.
    pub content_type: String,
    /// Raw file contents.
    pub data: Vec<u8>,
    /// Content disposition, usually `attachment` or `inline`.
    pub disposition: String,
    /// Additional part headers, applied in order.
    pub headers: Vec<(String, String)>,
}

impl Default for Attachment {
    fn default() -> Self {
        Self {
            filename: None,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            data: Vec::new(),
            disposition: DEFAULT_DISPOSITION.to_string(),
            headers: Vec::new(),
        }
    }
}

impl Attachment {
    /// Creates an attachment with default type and disposition.
    #[must_use]
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// Sets the filename.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Sets the disposition.
    #[must_use]
    pub fn with_disposition(mut self, disposition: impl Into<String>) -> Self {
        self.disposition = disposition.into();
        self
    }

    /// Adds a part header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Values of this attachment that end up in header lines.
    pub(crate) fn header_fields(&self) -> impl Iterator<Item = &str> {
        self.filename
            .as_deref()
            .into_iter()
            .chain([self.content_type.as_str(), self.disposition.as_str()])
            .chain(
                self.headers
                    .iter()
                    .flat_map(|(name, value)| [name.as_str(), value.as_str()]),
            )
    }

    /// Builds the base64 MIME part for this attachment.
    pub(crate) fn to_part(&self) -> Part {
        let content_type = ContentType::parse(&self.content_type).unwrap_or_else(|e| {
            tracing::warn!(
                content_type = %self.content_type,
                error = %e,
                "Invalid attachment content type, using {DEFAULT_CONTENT_TYPE}"
            );
            ContentType::octet_stream()
        });

        let mut part = Part::binary(&content_type, &self.data);
        part.headers.add("Content-Disposition", self.disposition_value());

        for (name, value) in &self.headers {
            part.headers.set(name.as_str(), value.as_str());
        }

        part
    }

    fn disposition_value(&self) -> String {
        match self.filename.as_deref() {
            None => self.disposition.clone(),
            Some(filename) if filename.is_ascii() => {
                let escaped = filename.replace('\\', "\\\\").replace('"', "\\\"");
                format!("{}; filename=\"{escaped}\"", self.disposition)
            }
            Some(filename) => format!(
                "{}; filename*={}",
                self.disposition,
                encode_rfc2231(filename, "utf-8")
            ),
        }
    }
}
