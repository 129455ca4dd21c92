//! The email message model and its serialization.

mod address;
mod attachment;

pub use address::{AddressList, Sender};
pub use attachment::{Attachment, DEFAULT_CONTENT_TYPE, DEFAULT_DISPOSITION};

use crate::connection::{DeliveryStatus, Transport};
use crate::error::{ContractViolation, Error, Result};
use chrono::{DateTime, FixedOffset};
use mailpipe_mime::encoding::{encode_rfc2047, encode_text, resolve_charset};
use mailpipe_mime::{Encoding, Headers, Part, fold};

/// MIME structure of a serialized message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// A single `text/plain` entity.
    PlainText,
    /// `multipart/mixed`: the plain-text body followed by attachments.
    MultipartMixed,
    /// `multipart/mixed` whose first child is a `multipart/alternative`
    /// holding the plain-text body (when set) and the HTML body, followed
    /// by attachments.
    MultipartAlternative,
}

/// An email message.
///
/// Fields can be set directly or through the `with_*` methods. Nothing is
/// validated until [`Message::send`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// Subject line.
    pub subject: String,
    /// Author; required at send time.
    pub sender: Option<Sender>,
    /// `To` addresses.
    pub recipients: Vec<String>,
    /// Plain-text body.
    pub body: Option<String>,
    /// HTML body.
    pub html: Option<String>,
    /// `Cc` addresses.
    pub cc: Option<AddressList>,
    /// `Bcc` addresses.
    pub bcc: Option<AddressList>,
    /// `Reply-To` address.
    pub reply_to: Option<String>,
    /// Charset for text bodies and the final byte encoding, UTF-8 when unset.
    pub charset: Option<String>,
    /// Attachments in order.
    pub attachments: Vec<Attachment>,
    /// `Date` header; left to the delivery mechanism when unset.
    pub date: Option<DateTime<FixedOffset>>,
    /// `Message-ID` header, with or without angle brackets.
    pub message_id: Option<String>,
    /// Additional top-level headers, applied after all others.
    pub extra_headers: Vec<(String, String)>,
}

impl Message {
    /// Creates a message with only a subject.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Self::default()
        }
    }

    /// Creates a message whose sender is `default_sender`, if any.
    #[must_use]
    pub fn with_default_sender(subject: impl Into<String>, default_sender: Option<Sender>) -> Self {
        Self {
            sender: default_sender,
            ..Self::new(subject)
        }
    }

    /// Sets the subject.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the sender.
    #[must_use]
    pub fn with_sender(mut self, sender: impl Into<Sender>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Adds a recipient.
    #[must_use]
    pub fn with_recipient(mut self, address: impl Into<String>) -> Self {
        self.add_recipient(address);
        self
    }

    /// Adds several recipients.
    #[must_use]
    pub fn with_recipients<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recipients.extend(addresses.into_iter().map(Into::into));
        self
    }

    /// Sets the plain-text body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the HTML body.
    #[must_use]
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Sets the `Cc` addresses.
    #[must_use]
    pub fn with_cc(mut self, cc: impl Into<AddressList>) -> Self {
        self.cc = Some(cc.into());
        self
    }

    /// Sets the `Bcc` addresses.
    #[must_use]
    pub fn with_bcc(mut self, bcc: impl Into<AddressList>) -> Self {
        self.bcc = Some(bcc.into());
        self
    }

    /// Sets the `Reply-To` address.
    #[must_use]
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Sets the charset.
    #[must_use]
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Adds an attachment.
    #[must_use]
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Sets the `Date` header.
    #[must_use]
    pub const fn with_date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.date = Some(date);
        self
    }

    /// Sets the `Message-ID` header.
    #[must_use]
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    /// Adds a top-level header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    /// Appends a recipient. Duplicates are kept.
    pub fn add_recipient(&mut self, address: impl Into<String>) {
        self.recipients.push(address.into());
    }

    /// Appends an attachment.
    pub fn add_attachment(&mut self, attachment: Attachment) -> &mut Self {
        self.attachments.push(attachment);
        self
    }

    fn body_text(&self) -> Option<&str> {
        self.body.as_deref().filter(|b| !b.is_empty())
    }

    fn html_text(&self) -> Option<&str> {
        self.html.as_deref().filter(|h| !h.is_empty())
    }

    fn present<'a>(list: Option<&'a AddressList>) -> Option<&'a AddressList> {
        list.filter(|l| !l.is_empty())
    }

    /// Checks the send-time preconditions, in order: recipients, body,
    /// sender.
    ///
    /// # Errors
    ///
    /// Returns the first violated precondition.
    pub fn validate(&self) -> std::result::Result<(), ContractViolation> {
        if self.recipients.is_empty() {
            return Err(ContractViolation::NoRecipients);
        }
        if self.body_text().is_none() && self.html_text().is_none() {
            return Err(ContractViolation::NoBody);
        }
        if self.sender.as_ref().is_none_or(Sender::is_empty) {
            return Err(ContractViolation::NoSender);
        }
        Ok(())
    }

    /// Returns true if any value that ends up in a header line contains a
    /// carriage return or line feed.
    ///
    /// Covers the subject, the rendered sender, the reply-to address, every
    /// recipient, `Cc` and `Bcc` entries, the message id, extra headers and
    /// attachment header values.
    #[must_use]
    pub fn is_bad_headers(&self) -> bool {
        let sender = self
            .sender
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();

        let mut fields = [
            self.subject.as_str(),
            sender.as_str(),
            self.reply_to.as_deref().unwrap_or_default(),
            self.message_id.as_deref().unwrap_or_default(),
        ]
        .into_iter()
        .chain(self.recipients.iter().map(String::as_str))
        .chain(self.cc.iter().flat_map(AddressList::iter))
        .chain(self.bcc.iter().flat_map(AddressList::iter))
        .chain(
            self.extra_headers
                .iter()
                .flat_map(|(name, value)| [name.as_str(), value.as_str()]),
        )
        .chain(self.attachments.iter().flat_map(Attachment::header_fields));

        fields.any(|field| field.contains(['\r', '\n']))
    }

    /// Selects the MIME structure for the current content.
    #[must_use]
    pub fn layout(&self) -> Layout {
        match (self.html_text().is_some(), self.attachments.is_empty()) {
            (true, _) => Layout::MultipartAlternative,
            (false, true) => Layout::PlainText,
            (false, false) => Layout::MultipartMixed,
        }
    }

    fn charset_encoding(&self) -> &'static Encoding {
        resolve_charset(self.charset.as_deref())
    }

    /// Builds the MIME entity tree with all top-level headers.
    #[must_use]
    pub fn to_mime(&self) -> Part {
        let charset = self.charset_encoding();
        let plain = || Part::text("plain", self.body.as_deref().unwrap_or_default(), charset);
        let attachments = || self.attachments.iter().map(Attachment::to_part);

        let mut root = match self.layout() {
            Layout::PlainText => plain(),
            Layout::MultipartMixed => {
                Part::multipart("mixed", std::iter::once(plain()).chain(attachments()).collect())
            }
            Layout::MultipartAlternative => {
                let mut alternatives = Vec::with_capacity(2);
                if self.body_text().is_some() {
                    alternatives.push(plain());
                }
                alternatives.push(Part::text(
                    "html",
                    self.html.as_deref().unwrap_or_default(),
                    charset,
                ));

                let alternative = Part::multipart("alternative", alternatives);
                Part::multipart(
                    "mixed",
                    std::iter::once(alternative).chain(attachments()).collect(),
                )
            }
        };

        root.headers = self.headers(&root.headers);
        root
    }

    fn headers(&self, entity: &Headers) -> Headers {
        let mut headers = Headers::new();
        headers.add("MIME-Version", "1.0");
        for (name, value) in entity.iter() {
            headers.add(name, value);
        }

        // Encoded words come back already folded; plain text is folded here.
        let subject = encode_rfc2047(&self.subject, "utf-8");
        if subject == self.subject {
            headers.set("Subject", fold("Subject", &subject, " "));
        } else {
            headers.set("Subject", subject);
        }
        if !self.recipients.is_empty() {
            headers.set("To", fold("To", &self.recipients.join(", "), ", "));
        }
        if let Some(sender) = &self.sender {
            headers.set("From", sender.header_value());
        }
        if let Some(cc) = Self::present(self.cc.as_ref()) {
            headers.set("Cc", fold("Cc", &cc.header_value(), ", "));
        }
        if let Some(bcc) = Self::present(self.bcc.as_ref()) {
            headers.set("Bcc", fold("Bcc", &bcc.header_value(), ", "));
        }
        if let Some(reply_to) = self.reply_to.as_deref().filter(|r| !r.is_empty()) {
            headers.set("Reply-To", fold("Reply-To", reply_to, ", "));
        }
        if let Some(date) = self.date {
            headers.set("Date", date.to_rfc2822());
        }
        if let Some(id) = self.message_id.as_deref().filter(|id| !id.is_empty()) {
            if id.starts_with('<') {
                headers.set("Message-ID", id);
            } else {
                headers.set("Message-ID", format!("<{id}>"));
            }
        }
        for (name, value) in &self.extra_headers {
            headers.set(name.as_str(), value.as_str());
        }

        headers
    }

    /// Serializes the message to its wire bytes.
    ///
    /// This is a pure read of the current state and may be called at any
    /// time. It does not validate: a message that would fail
    /// [`Message::send`] still serializes, but the result is not meant for
    /// delivery.
    #[must_use]
    pub fn dump(&self) -> Vec<u8> {
        encode_text(&self.to_mime().render(), self.charset_encoding())
    }

    /// Validates the message and hands it to `transport`.
    ///
    /// Preconditions are checked first, then header safety; the transport
    /// is only reached when both pass.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Contract`] for a violated precondition,
    /// [`Error::BadHeader`] when [`Message::is_bad_headers`] is true, or
    /// whatever the transport reports.
    pub fn send<T>(&self, transport: &mut T) -> Result<DeliveryStatus>
    where
        T: Transport + ?Sized,
    {
        self.validate()?;

        if self.is_bad_headers() {
            return Err(Error::BadHeader);
        }

        transport.send(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mailpipe_mime::encoding::decode_rfc2047;
    use mailpipe_mime::{Body, TransferEncoding};

    fn dump_str(message: &Message) -> String {
        String::from_utf8(message.dump()).unwrap()
    }

    fn parse(message: &Message) -> Part {
        Part::parse(&dump_str(message)).unwrap()
    }

    fn base() -> Message {
        Message::new("testing")
            .with_sender("support@example.com")
            .with_recipient("to@example.com")
    }

    #[test]
    fn test_new_message_is_empty() {
        let message = Message::new("subject");
        assert_eq!(message.subject, "subject");
        assert!(message.recipients.is_empty());
        assert!(message.sender.is_none());
        assert!(message.attachments.is_empty());
    }

    #[test]
    fn test_with_default_sender() {
        let message = Message::with_default_sender("s", Some(Sender::from("d@example.com")));
        assert_eq!(message.sender, Some(Sender::from("d@example.com")));
        assert_eq!(message.subject, "s");
        assert!(Message::with_default_sender("s", None).sender.is_none());
    }

    #[test]
    fn test_add_recipient_keeps_duplicates() {
        let mut message = Message::new("testing");
        message.add_recipient("to@example.com");
        message.add_recipient("to@example.com");
        assert_eq!(message.recipients, vec!["to@example.com", "to@example.com"]);
    }

    #[test]
    fn test_add_attachment_chains() {
        let mut message = Message::new("testing");
        message
            .add_attachment(Attachment::new(vec![1]))
            .add_attachment(Attachment::new(vec![2]));
        assert_eq!(message.attachments.len(), 2);
    }

    #[test]
    fn test_sender_as_tuple() {
        let message = Message::new("testing")
            .with_sender(("tester", "tester@example.com"))
            .with_body("test");

        assert!(dump_str(&message).contains("From: tester <tester@example.com>"));
    }

    #[test]
    fn test_reply_to() {
        let message = base()
            .with_sender("spammer <spammer@example.com>")
            .with_reply_to("somebody <somebody@example.com>")
            .with_body("testing");

        assert!(dump_str(&message).contains("Reply-To: somebody <somebody@example.com>"));
    }

    #[test]
    fn test_cc_and_bcc() {
        let message = base()
            .with_body("testing")
            .with_cc(["tosomeoneelse@example.com"])
            .with_bcc(vec!["hidden@example.com", "other@example.com"]);

        let dumped = dump_str(&message);
        assert!(dumped.contains("Cc: tosomeoneelse@example.com\r\n"));
        assert!(dumped.contains("Bcc: hidden@example.com, other@example.com\r\n"));
    }

    #[test]
    fn test_scalar_cc_is_used_verbatim() {
        let message = base().with_body("x").with_cc("a@example.com, b@example.com");
        assert!(dump_str(&message).contains("Cc: a@example.com, b@example.com\r\n"));
    }

    #[test]
    fn test_empty_cc_is_omitted() {
        let message = base().with_body("x").with_cc(Vec::<String>::new());
        assert!(!dump_str(&message).contains("Cc:"));
    }

    #[test]
    fn test_header_order() {
        let message = base()
            .with_body("x")
            .with_cc("cc@example.com")
            .with_bcc("bcc@example.com")
            .with_reply_to("reply@example.com");

        let root = parse(&message);
        let names: Vec<&str> = root.headers.iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec![
                "MIME-Version",
                "Content-Type",
                "Content-Transfer-Encoding",
                "Subject",
                "To",
                "From",
                "Cc",
                "Bcc",
                "Reply-To",
            ]
        );
    }

    #[test]
    fn test_recipients_joined() {
        let message = base().with_recipient("second@example.com").with_body("x");
        assert!(dump_str(&message).contains("To: to@example.com, second@example.com\r\n"));
    }

    #[test]
    fn test_plain_text_layout() {
        let message = base().with_body("Hello\nWorld");
        assert_eq!(message.layout(), Layout::PlainText);

        let root = parse(&message);
        assert_eq!(
            root.headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
        assert_eq!(root.decode_body().unwrap(), b"Hello\r\nWorld\r\n");
    }

    #[test]
    fn test_mixed_layout_with_attachment() {
        let message = base()
            .with_body("see attached")
            .with_attachment(
                Attachment::new(b"%PDF".to_vec())
                    .with_filename("a.pdf")
                    .with_content_type("application/pdf"),
            );
        assert_eq!(message.layout(), Layout::MultipartMixed);

        let root = parse(&message);
        assert_eq!(root.content_type().unwrap().sub_type, "mixed");
        assert_eq!(root.parts().len(), 2);
        assert_eq!(root.parts()[0].decode_body().unwrap(), b"see attached");

        let pdf = &root.parts()[1];
        assert_eq!(pdf.headers.get("Content-Type"), Some("application/pdf"));
        assert_eq!(pdf.transfer_encoding(), TransferEncoding::Base64);
        assert_eq!(pdf.decode_body().unwrap(), b"%PDF");
    }

    #[test]
    fn test_alternative_layout_keeps_plain_body() {
        let message = base().with_body("plain").with_html("<p>html</p>");
        assert_eq!(message.layout(), Layout::MultipartAlternative);

        let root = parse(&message);
        assert_eq!(root.content_type().unwrap().sub_type, "mixed");
        assert_eq!(root.parts().len(), 1);

        let alternative = &root.parts()[0];
        assert_eq!(alternative.content_type().unwrap().sub_type, "alternative");
        let subtypes: Vec<String> = alternative
            .parts()
            .iter()
            .map(|p| p.content_type().unwrap().sub_type)
            .collect();
        assert_eq!(subtypes, vec!["plain", "html"]);
    }

    #[test]
    fn test_html_only_with_attachments() {
        let message = base()
            .with_html("<p>html</p>")
            .with_attachment(Attachment::new(vec![1, 2]))
            .with_attachment(Attachment::new(vec![3]));

        let root = parse(&message);
        assert_eq!(root.parts().len(), 3);
        assert_eq!(root.parts()[0].parts().len(), 1);
        assert_eq!(
            root.parts()[0].parts()[0].decode_body().unwrap(),
            b"<p>html</p>"
        );
        assert_eq!(root.parts()[2].decode_body().unwrap(), vec![3]);
    }

    #[test]
    fn test_layout_matrix() {
        let attachment = || Attachment::new(vec![0]);
        let cases = [
            (false, false, false, Layout::PlainText),
            (true, false, false, Layout::PlainText),
            (false, false, true, Layout::MultipartMixed),
            (true, false, true, Layout::MultipartMixed),
            (false, true, false, Layout::MultipartAlternative),
            (true, true, false, Layout::MultipartAlternative),
            (false, true, true, Layout::MultipartAlternative),
            (true, true, true, Layout::MultipartAlternative),
        ];

        for (body, html, attach, expected) in cases {
            let mut message = base();
            if body {
                message.body = Some("b".into());
            }
            if html {
                message.html = Some("<i>h</i>".into());
            }
            if attach {
                message.add_attachment(attachment());
            }
            assert_eq!(message.layout(), expected, "body={body} html={html} attach={attach}");
            assert!(Part::parse(&dump_str(&message)).is_ok());
        }
    }

    #[test]
    fn test_non_ascii_subject_is_encoded() {
        let message = base().with_subject("Grüße").with_body("x");
        let root = parse(&message);
        let subject = root.headers.get("Subject").unwrap();
        assert!(subject.starts_with("=?utf-8?B?"));
        assert_eq!(decode_rfc2047(subject).unwrap(), "Grüße");
    }

    #[test]
    fn test_charset_applies_to_body() {
        let message = base().with_body("café").with_charset("iso-8859-1");
        let root = parse(&message);

        assert_eq!(
            root.headers.get("Content-Type"),
            Some("text/plain; charset=windows-1252")
        );
        assert_eq!(root.decode_body().unwrap(), vec![b'c', b'a', b'f', 0xE9]);
    }

    #[test]
    fn test_date_message_id_and_extra_headers() {
        let date = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 1, 12, 30, 0)
            .unwrap();
        let message = base()
            .with_body("x")
            .with_date(date)
            .with_message_id("abc@example.com")
            .with_header("X-Mailer", "mailpipe")
            .with_header("X-Mailer", "mailpipe 2");

        let root = parse(&message);
        assert_eq!(root.headers.get("Date"), Some("Fri, 1 Mar 2024 12:30:00 +0100"));
        assert_eq!(root.headers.get("Message-ID"), Some("<abc@example.com>"));
        assert_eq!(root.headers.get_all("X-Mailer"), vec!["mailpipe 2"]);
    }

    #[test]
    fn test_dump_folds_long_headers() {
        let recipients: Vec<String> =
            (0..100).map(|i| format!("recipient{i:03}@example.com")).collect();
        let cc: Vec<String> = (0..30).map(|i| format!("copy{i:02}@example.org")).collect();
        let subject = "quarterly report for every team in the northern region ".repeat(4);
        let subject = subject.trim_end();
        let message = Message::new(subject)
            .with_sender("support@example.com")
            .with_recipients(recipients.clone())
            .with_cc(cc.clone())
            .with_body("testing");

        let text = dump_str(&message);
        let (head, _) = text.split_once("\r\n\r\n").unwrap();
        for line in text.split("\r\n") {
            assert!(line.len() <= 998, "{} octets", line.len());
        }
        for line in head.split("\r\n") {
            assert!(line.len() <= 78, "{line:?}");
        }

        let part = parse(&message);
        assert_eq!(part.headers.get("To"), Some(recipients.join(", ").as_str()));
        assert_eq!(part.headers.get("Cc"), Some(cc.join(", ").as_str()));
        assert_eq!(part.headers.get("Subject"), Some(subject));
    }

    #[test]
    fn test_dump_is_repeatable() {
        let message = base()
            .with_body("plain")
            .with_html("<p>x</p>")
            .with_attachment(Attachment::new(vec![9; 100]));
        assert_eq!(message.dump(), message.dump());
    }

    #[test]
    fn test_dump_without_body_is_best_effort() {
        let root = parse(&base());
        assert!(matches!(root.body, Body::Encoded(ref text) if text.trim().is_empty()));
    }

    #[test]
    fn test_is_bad_headers() {
        let good = base().with_body("line one\nline two");
        assert!(!good.is_bad_headers());

        assert!(base().with_subject("hi\r\nBcc: x@example.com").is_bad_headers());
        assert!(base().with_sender("a@example.com\n").is_bad_headers());
        assert!(base().with_sender(("Evil\r\n", "a@example.com")).is_bad_headers());
        assert!(base().with_reply_to("r@example.com\r").is_bad_headers());
        assert!(base().with_recipient("x@example.com\nCc: y").is_bad_headers());
        assert!(base().with_cc(["c@example.com\n"]).is_bad_headers());
        assert!(base().with_header("X-Test", "a\nb").is_bad_headers());
        assert!(
            base()
                .with_attachment(Attachment::new(vec![]).with_filename("a\r\n.txt"))
                .is_bad_headers()
        );
    }

    #[test]
    fn test_validate_order() {
        let empty = Message::new("s");
        assert_eq!(empty.validate(), Err(ContractViolation::NoRecipients));

        let no_body = Message::new("s").with_recipient("to@example.com");
        assert_eq!(no_body.validate(), Err(ContractViolation::NoBody));

        let no_sender = no_body.clone().with_body("b");
        assert_eq!(no_sender.validate(), Err(ContractViolation::NoSender));

        let empty_body = no_body.clone().with_body("").with_sender("a@example.com");
        assert_eq!(empty_body.validate(), Err(ContractViolation::NoBody));

        assert_eq!(no_sender.with_sender("a@example.com").validate(), Ok(()));
    }
}
