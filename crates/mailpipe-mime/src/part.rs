//! MIME entity tree and its wire rendering.

use crate::content_type::ContentType;
use crate::encoding::{
    charset_name, decode_base64, encode_base64_lines, encode_text, is_7bit_safe,
    normalize_line_endings,
};
use crate::error::{Error, Result};
use crate::header::Headers;
use encoding_rs::Encoding;
use sha2::{Digest, Sha256};
use std::fmt::{self, Write as _};

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit text.
    EightBit,
    /// Base64 encoding.
    Base64,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            _ => Self::SevenBit,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
        }
    }
}

/// Body of a MIME entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Leaf content, already transfer-encoded.
    Encoded(String),
    /// Child entities separated by a boundary.
    Multipart {
        /// Delimiter between the children.
        boundary: String,
        /// Child entities in order.
        parts: Vec<Part>,
    },
}

/// A MIME entity: headers plus a leaf or multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Entity headers.
    pub headers: Headers,
    /// Entity body.
    pub body: Body,
}

impl Part {
    /// Creates a `text/<sub_type>` part.
    ///
    /// Line endings are normalized to CRLF and the text is encoded into
    /// `charset`. The body travels as `7bit` when possible, otherwise as
    /// `base64`.
    #[must_use]
    pub fn text(sub_type: &str, text: &str, charset: &'static Encoding) -> Self {
        let bytes = encode_text(&normalize_line_endings(text), charset);

        let (encoding, body) = if is_7bit_safe(&bytes) {
            (
                TransferEncoding::SevenBit,
                String::from_utf8_lossy(&bytes).into_owned(),
            )
        } else {
            (TransferEncoding::Base64, encode_base64_lines(&bytes))
        };

        let mut headers = Headers::new();
        headers.add(
            "Content-Type",
            ContentType::text(sub_type, charset_name(charset)).to_string(),
        );
        headers.add("Content-Transfer-Encoding", encoding.to_string());

        Self {
            headers,
            body: Body::Encoded(body),
        }
    }

    /// Creates a base64-encoded part carrying `data`.
    #[must_use]
    pub fn binary(content_type: &ContentType, data: &[u8]) -> Self {
        let mut headers = Headers::new();
        headers.add("Content-Type", content_type.to_string());
        headers.add(
            "Content-Transfer-Encoding",
            TransferEncoding::Base64.to_string(),
        );

        Self {
            headers,
            body: Body::Encoded(encode_base64_lines(data)),
        }
    }

    /// Creates a `multipart/<sub_type>` container.
    ///
    /// The boundary is derived from the children's content, so the same
    /// children always produce the same boundary.
    #[must_use]
    pub fn multipart(sub_type: &str, parts: Vec<Self>) -> Self {
        let boundary = derive_boundary(&parts);

        let mut headers = Headers::new();
        headers.add(
            "Content-Type",
            ContentType::multipart(sub_type, boundary.as_str()).to_string(),
        );

        Self {
            headers,
            body: Body::Multipart { boundary, parts },
        }
    }

    /// Parses a rendered entity.
    ///
    /// Understands what [`Part::render`] produces: a header block, an empty
    /// line, and either a leaf body or boundary-delimited children.
    ///
    /// # Errors
    ///
    /// Returns an error if the headers or a content type are malformed, or a
    /// multipart entity has no boundary.
    pub fn parse(text: &str) -> Result<Self> {
        let (head, body) = split_head_body(text);
        let headers = Headers::parse(head)?;

        let content_type = headers
            .get("content-type")
            .map(ContentType::parse)
            .transpose()?;

        if let Some(content_type) = content_type.filter(ContentType::is_multipart) {
            let boundary = content_type
                .boundary()
                .ok_or(Error::MissingBoundary)?
                .to_string();
            let parts = split_multipart(body, &boundary)
                .into_iter()
                .map(Self::parse)
                .collect::<Result<Vec<_>>>()?;

            return Ok(Self {
                headers,
                body: Body::Multipart { boundary, parts },
            });
        }

        Ok(Self {
            headers,
            body: Body::Encoded(body.to_string()),
        })
    }

    /// Gets the content type, defaulting to `text/plain`.
    ///
    /// # Errors
    ///
    /// Returns an error if the content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers.get("content-type").map_or_else(
            || Ok(ContentType::text("plain", "us-ascii")),
            ContentType::parse,
        )
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Returns the child entities of a multipart body.
    #[must_use]
    pub fn parts(&self) -> &[Self] {
        match &self.body {
            Body::Multipart { parts, .. } => parts,
            Body::Encoded(_) => &[],
        }
    }

    /// Decodes a leaf body according to its transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if this is a multipart entity or decoding fails.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        let Body::Encoded(body) = &self.body else {
            return Err(Error::NotALeaf);
        };

        match self.transfer_encoding() {
            TransferEncoding::Base64 => decode_base64(body),
            TransferEncoding::SevenBit | TransferEncoding::EightBit => {
                Ok(body.as_bytes().to_vec())
            }
        }
    }

    /// Renders the entity to wire text with CRLF line endings.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        if !out.ends_with("\r\n") {
            out.push_str("\r\n");
        }
        out
    }

    fn write_to(&self, out: &mut String) {
        out.push_str(&self.headers.to_string());
        out.push_str("\r\n");

        match &self.body {
            Body::Encoded(text) => out.push_str(text),
            Body::Multipart { boundary, parts } => {
                for part in parts {
                    let _ = write!(out, "--{boundary}\r\n");
                    part.write_to(out);
                    // The CRLF before each delimiter belongs to the delimiter.
                    out.push_str("\r\n");
                }
                let _ = write!(out, "--{boundary}--");
            }
        }
    }
}

/// Derives a boundary that does not occur in any of the children.
fn derive_boundary(parts: &[Part]) -> String {
    let rendered: Vec<String> = parts.iter().map(Part::render).collect();

    let mut salt: u32 = 0;
    loop {
        let mut hasher = Sha256::new();
        hasher.update(salt.to_be_bytes());
        for text in &rendered {
            hasher.update(text.as_bytes());
        }
        let digest = hasher.finalize();

        let mut boundary = String::from("===============");
        for byte in &digest[..12] {
            let _ = write!(boundary, "{byte:02x}");
        }
        boundary.push_str("==");

        if !rendered.iter().any(|text| text.contains(&boundary)) {
            return boundary;
        }
        salt += 1;
    }
}

fn split_head_body(text: &str) -> (&str, &str) {
    if let Some(rest) = text.strip_prefix("\r\n") {
        return ("", rest);
    }
    text.find("\r\n\r\n")
        .map_or((text, ""), |i| (&text[..i + 2], &text[i + 4..]))
}

fn split_multipart<'a>(body: &'a str, boundary: &str) -> Vec<&'a str> {
    let delimiter = format!("--{boundary}");
    let separator = format!("\r\n{delimiter}");
    let mut parts = Vec::new();

    let Some(start) = body.find(&delimiter) else {
        return parts;
    };
    let mut rest = &body[start + delimiter.len()..];

    while !rest.starts_with("--") {
        rest = rest.strip_prefix("\r\n").unwrap_or(rest);
        if let Some(end) = rest.find(&separator) {
            parts.push(&rest[..end]);
            rest = &rest[end + separator.len()..];
        } else {
            parts.push(rest);
            break;
        }
    }

    parts
}
