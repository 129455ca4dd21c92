//! MIME encoding utilities.
//!
//! Supports Base64 bodies, RFC 2047 encoded words for header text, RFC 2231
//! extended parameters for non-ASCII filenames and charset conversion of
//! text bodies.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use encoding_rs::{Encoding, UTF_8};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Maximum encoded line length for Base64 bodies (RFC 2045).
pub const MAX_LINE_LENGTH: usize = 76;

/// Maximum line length for a 7bit body, excluding CRLF (RFC 5322).
pub const MAX_7BIT_LINE_LENGTH: usize = 998;

/// Raw bytes carried per RFC 2047 encoded word so each word stays under 75 chars.
const ENCODED_WORD_CHUNK: usize = 45;

// Everything outside RFC 5987 `attr-char` gets percent-encoded. `CONTROLS`
// already covers 0x00-0x1f, 0x7f and every non-ASCII byte.
const ATTR_CHAR_COMPLEMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b',')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'{')
    .add(b'}');

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64, wrapped at 76 columns with CRLF line breaks.
///
/// The result has no trailing line break.
#[must_use]
pub fn encode_base64_lines(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut wrapped = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2);

    // Base64 output is pure ASCII, so byte chunks are valid char boundaries.
    for (i, line) in encoded.as_bytes().chunks(MAX_LINE_LENGTH).enumerate() {
        if i > 0 {
            wrapped.push_str("\r\n");
        }
        wrapped.push_str(&String::from_utf8_lossy(line));
    }

    wrapped
}

/// Decodes Base64 data, ignoring embedded line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Encodes a header value using RFC 2047 `B` encoded words.
///
/// Pure ASCII text without `=?` sequences is returned unchanged. Longer text
/// is split into several encoded words on character boundaries, separated
/// by folding whitespace.
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    if text.is_ascii() && !text.contains("=?") {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut chunk = String::new();
    for ch in text.chars() {
        if chunk.len() + ch.len_utf8() > ENCODED_WORD_CHUNK {
            words.push(encoded_word(&chunk, charset));
            chunk.clear();
        }
        chunk.push(ch);
    }
    if !chunk.is_empty() {
        words.push(encoded_word(&chunk, charset));
    }

    words.join("\r\n ")
}

fn encoded_word(text: &str, charset: &str) -> String {
    format!("=?{charset}?B?{}?=", encode_base64(text.as_bytes()))
}

/// Decodes a header value made of RFC 2047 `B` encoded words.
///
/// Whitespace between adjacent encoded words is dropped. Values that are
/// not encoded are returned unchanged.
///
/// # Errors
///
/// Returns an error if an encoded word is malformed or uses an encoding
/// other than `B`.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || !words.iter().all(|w| w.starts_with("=?") && w.ends_with("?=")) {
        return Ok(text.to_string());
    }

    let mut bytes = Vec::new();
    for word in words {
        // Markers must not overlap, as they do in "=?=".
        let Some(inner) = word
            .strip_prefix("=?")
            .and_then(|rest| rest.strip_suffix("?="))
        else {
            return Err(Error::InvalidEncodedWord(word.to_string()));
        };
        let parts: Vec<&str> = inner.split('?').collect();

        if parts.len() != 3 {
            return Err(Error::InvalidEncodedWord(word.to_string()));
        }

        let encoding = parts[1].to_uppercase();
        if encoding != "B" {
            return Err(Error::InvalidEncodedWord(format!(
                "unsupported encoding {encoding} in {word}"
            )));
        }
        bytes.extend(decode_base64(parts[2])?);
    }

    String::from_utf8(bytes).map_err(Into::into)
}

/// Encodes a parameter value as an RFC 2231 extended value.
///
/// Produces `charset''percent-encoded-bytes` with an empty language tag,
/// suitable for a `name*=` parameter.
#[must_use]
pub fn encode_rfc2231(value: &str, charset: &str) -> String {
    format!("{charset}''{}", utf8_percent_encode(value, ATTR_CHAR_COMPLEMENT))
}

/// Resolves a charset label, falling back to UTF-8 for unknown labels.
#[must_use]
pub fn resolve_charset(label: Option<&str>) -> &'static Encoding {
    let Some(label) = label else {
        return UTF_8;
    };

    Encoding::for_label(label.trim().as_bytes()).map_or_else(
        || {
            tracing::warn!(charset = label, "Unknown charset, falling back to utf-8");
            UTF_8
        },
        Encoding::output_encoding,
    )
}

/// Returns the lowercase MIME name of a charset.
#[must_use]
pub fn charset_name(encoding: &'static Encoding) -> String {
    encoding.name().to_ascii_lowercase()
}

/// Encodes text into the bytes of the given charset.
///
/// Characters the charset cannot represent are replaced with numeric
/// character references.
#[must_use]
pub fn encode_text(text: &str, encoding: &'static Encoding) -> Vec<u8> {
    let (bytes, used, unmappable) = encoding.encode(text);
    if unmappable {
        tracing::warn!(
            charset = used.name(),
            "Text contains characters the charset cannot represent"
        );
    }
    bytes.into_owned()
}

/// Normalizes every line ending (`\n`, `\r`, `\r\n`) to CRLF.
#[must_use]
pub fn normalize_line_endings(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                normalized.push_str("\r\n");
            }
            '\n' => normalized.push_str("\r\n"),
            _ => normalized.push(ch),
        }
    }

    normalized
}

/// Checks whether bytes can travel as a `7bit` body.
#[must_use]
pub fn is_7bit_safe(data: &[u8]) -> bool {
    data.is_ascii()
        && !data.contains(&0)
        && data
            .split(|&b| b == b'\n')
            .all(|line| line.len() <= MAX_7BIT_LINE_LENGTH + 1)
}
