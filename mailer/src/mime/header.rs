//! # Header
//!
//! Module dedicated to the header block of a message: header value
//! sanitization, RFC 2047 encoding and rendering of the header block
//! itself.

use std::{fmt::Write as _, net::IpAddr};

use base64::{engine::general_purpose::STANDARD, Engine};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{text::CRLF, BoundarySet, MessageType};
use crate::{message::Mailbox, transport::TransportKind};

/// Tokens that could be used to inject headers.
static INJECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\r|\n|%0d|%0a|content-type:|bcc:|to:|cc:").unwrap());

/// Maximum number of raw bytes per encoded word, so that a full
/// `=?UTF-8?B?...?=` word stays within 75 characters.
const ENCODED_WORD_MAX_BYTES: usize = 45;

/// Preferred header line length.
const FOLD_WIDTH: usize = 76;

/// Preamble of multipart messages, for clients that do not
/// understand MIME.
const PREAMBLE: &str = "This is a multi-part message in MIME format.";

/// Strips line breaks, their URL-encoded forms and header name
/// tokens out of the given value.
///
/// Removal is repeated until nothing matches anymore, so that
/// removing a token cannot reveal a new one.
pub fn sanitize(value: &str) -> String {
    let mut value = value.to_owned();

    while INJECTION.is_match(&value) {
        value = INJECTION.replace_all(&value, "").to_string();
    }

    value.trim().to_owned()
}

/// Encodes the given value as one or more RFC 2047 base64 encoded
/// words, folded on multiple lines if needed.
pub fn encode_word(value: &str) -> String {
    let mut words = Vec::new();
    let mut chunk = String::new();

    for c in value.chars() {
        if chunk.len() + c.len_utf8() > ENCODED_WORD_MAX_BYTES {
            words.push(format!("=?UTF-8?B?{}?=", STANDARD.encode(&chunk)));
            chunk.clear();
        }
        chunk.push(c);
    }

    if !chunk.is_empty() {
        words.push(format!("=?UTF-8?B?{}?=", STANDARD.encode(&chunk)));
    }

    words.join("\r\n ")
}

/// Sanitizes the given value, then encodes it if it contains
/// non-ASCII characters.
pub fn encode_value(value: &str) -> String {
    let value = sanitize(value);

    if value.is_ascii() {
        value
    } else {
        encode_word(&value)
    }
}

/// Renders an address list header, folded so that lines stay short.
fn address_header(name: &str, mailboxes: &[Mailbox]) -> String {
    let mut header = format!("{name}: ");
    let mut line_len = header.len();

    for (i, mailbox) in mailboxes.iter().enumerate() {
        let mailbox = mailbox.to_string();

        if i > 0 {
            header.push(',');
            line_len += 1;

            if line_len + 1 + mailbox.len() > FOLD_WIDTH {
                header.push_str("\r\n ");
                line_len = 1;
            } else {
                header.push(' ');
                line_len += 1;
            }
        }

        line_len += mailbox.len();
        header.push_str(&mailbox);
    }

    header.push_str(CRLF);
    header
}

fn multipart(subtype: &str, boundary: &str) -> String {
    format!("Content-Type: multipart/{subtype};{CRLF}\tboundary=\"{boundary}\"{CRLF}")
}

/// Header fields collected from the message at composition time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HeaderFields {
    pub return_path: String,
    pub from: Mailbox,
    pub reply_to: Vec<Mailbox>,
    pub to: Vec<Mailbox>,
    pub cc: Vec<Mailbox>,
    pub bcc: Vec<Mailbox>,
    pub subject: String,
    pub priority: u8,
    pub confirm_reading: Option<Mailbox>,
    pub confirm_receipt: Option<Mailbox>,
    pub custom: Vec<(String, String)>,
}

/// Header values generated at composition time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HeaderStamps {
    pub date: String,
    pub message_id: String,
    pub originating_ip: Option<IpAddr>,
}

/// Renders the `To` and `Subject` headers.
///
/// When there is no `To` recipient but some `Bcc` ones, the `To`
/// header announces undisclosed recipients.
pub fn render_recipients(fields: &HeaderFields) -> String {
    let mut h = String::new();

    if !fields.to.is_empty() {
        h.push_str(&address_header("To", &fields.to));
    } else if !fields.bcc.is_empty() {
        let _ = write!(h, "To: undisclosed-recipients:;{CRLF}");
    }

    let _ = write!(h, "Subject: {}{CRLF}", encode_value(&fields.subject));
    h
}

/// Renders the header block.
///
/// The block ends with the opening of the innermost
/// `multipart/alternative` container: when the message type requires
/// nested containers, their openings (preamble, boundary lines and
/// part headers) are part of the block. The block always ends with
/// CRLF, and must be separated from the body by an empty line.
pub fn render_headers(
    fields: &HeaderFields,
    stamps: &HeaderStamps,
    kind: MessageType,
    boundaries: &BoundarySet,
    transport: TransportKind,
) -> String {
    let mut h = String::new();

    // writing into a string cannot fail
    let _ = write!(h, "Return-Path: <{}>{CRLF}", fields.return_path);
    let _ = write!(h, "Date: {}{CRLF}", stamps.date);
    h.push_str(&address_header("From", std::slice::from_ref(&fields.from)));

    if fields.reply_to.is_empty() {
        h.push_str(&address_header("Reply-To", std::slice::from_ref(&fields.from)));
    } else {
        h.push_str(&address_header("Reply-To", &fields.reply_to));
    }

    if !fields.cc.is_empty() {
        h.push_str(&address_header("Cc", &fields.cc));
    }

    if !fields.bcc.is_empty() && transport.renders_bcc() {
        h.push_str(&address_header("Bcc", &fields.bcc));
    }

    let _ = write!(h, "Message-Id: {}{CRLF}", stamps.message_id);

    if let Some(ip) = stamps.originating_ip {
        let _ = write!(h, "X-Originating-IP: {ip}{CRLF}");
    }

    let _ = write!(
        h,
        "X-Mailer: {} v{} {transport} ({}){CRLF}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_HOMEPAGE"),
    );

    if fields.priority != 0 {
        let _ = write!(h, "X-Priority: {}{CRLF}", fields.priority);
    }

    if let Some(mailbox) = &fields.confirm_reading {
        h.push_str(&address_header("Disposition-Notification-To", std::slice::from_ref(mailbox)));
    }

    if let Some(mailbox) = &fields.confirm_receipt {
        h.push_str(&address_header("Return-Receipt-To", std::slice::from_ref(mailbox)));
    }

    for (name, value) in &fields.custom {
        let _ = write!(h, "{name}: {}{CRLF}", encode_value(value));
    }

    if transport.renders_recipients() {
        h.push_str(&render_recipients(fields));
    }

    let _ = write!(h, "MIME-Version: 1.0{CRLF}");

    let alternative = multipart("alternative", boundaries.alternative());

    match (kind.is_mixed(), kind.is_related()) {
        (false, false) => {
            h.push_str(&alternative);
        }
        (true, false) => {
            h.push_str(&multipart("mixed", boundaries.outer()));
            let _ = write!(h, "{CRLF}{PREAMBLE}{CRLF}--{}{CRLF}", boundaries.outer());
            h.push_str(&alternative);
        }
        (false, true) => {
            h.push_str(&multipart("related", boundaries.related()));
            let _ = write!(h, "{CRLF}{PREAMBLE}{CRLF}--{}{CRLF}", boundaries.related());
            h.push_str(&alternative);
        }
        (true, true) => {
            h.push_str(&multipart("mixed", boundaries.outer()));
            let _ = write!(h, "{CRLF}{PREAMBLE}{CRLF}--{}{CRLF}", boundaries.outer());
            h.push_str(&multipart("related", boundaries.related()));
            let _ = write!(h, "{CRLF}--{}{CRLF}", boundaries.related());
            h.push_str(&alternative);
        }
    }

    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn sanitize_injection() {
        assert_eq!(sanitize("Hello\r\nBcc: evil@example.com"), "Hello evil@example.com");
        assert_eq!(sanitize("a%0D%0aCC:b"), "ab");
        assert_eq!(sanitize("  content-TYPE: text/html "), "text/html");
        assert_eq!(sanitize("bcbcc:c:x"), "x");
    }

    #[test_log::test]
    fn encode_non_ascii() {
        assert_eq!(encode_value("Hello"), "Hello");
        assert_eq!(encode_value("Café"), "=?UTF-8?B?Q2Fmw6k=?=");
    }

    #[test_log::test]
    fn encode_long_value() {
        let value = "é".repeat(40);
        let encoded = encode_word(&value);
        let words: Vec<_> = encoded.split("\r\n ").collect();

        assert_eq!(words.len(), 2);
        for word in words {
            assert!(word.len() <= 75);
            assert!(word.starts_with("=?UTF-8?B?") && word.ends_with("?="));
        }
    }

    #[test_log::test]
    fn fold_address_list() {
        let mailboxes: Vec<_> = (0..5)
            .map(|i| Mailbox::new(Some(format!("Recipient {i}")), format!("recipient{i}@example.com")))
            .collect();
        let header = address_header("To", &mailboxes);

        assert!(header.starts_with("To: Recipient 0 <recipient0@example.com>,\r\n Recipient 1"));
        for line in header.split_terminator(CRLF) {
            assert!(line.len() <= FOLD_WIDTH, "line too long: {line:?}");
        }
    }
}
