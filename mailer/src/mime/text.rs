//! # Text
//!
//! Module dedicated to text normalization: line endings, word
//! wrapping, blank lines collapsing and base64 line wrapping.

use base64::{engine::general_purpose::STANDARD, Engine};

pub const CRLF: &str = "\r\n";

/// Maximum length of a base64 line, as defined by RFC 2045.
pub const BASE64_MAX_LINE_LENGTH: usize = 76;

/// Turns every line ending (CRLF, CR or LF) into CRLF.
pub fn fix_crlf(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\n', CRLF)
}

/// Wraps the given text so that no line exceeds `width` characters.
///
/// Lines are broken on spaces only: a single word longer than the
/// width is kept intact on its own line. Every line of the output,
/// including the last one, ends with CRLF. An empty text gives an
/// empty output.
pub fn wrap_text(text: &str, width: usize) -> String {
    let text = fix_crlf(text);
    let text = text.strip_suffix(CRLF).unwrap_or(&text);

    if text.is_empty() {
        return String::new();
    }

    let mut wrapped = String::with_capacity(text.len());

    for line in text.split(CRLF) {
        let mut buf = String::new();
        let mut buf_len = 0;

        for (i, word) in line.split(' ').enumerate() {
            let word_len = word.chars().count();

            if i == 0 {
                buf.push_str(word);
                buf_len = word_len;
            } else if buf_len + 1 + word_len > width {
                wrapped.push_str(&buf);
                wrapped.push_str(CRLF);
                buf = word.to_owned();
                buf_len = word_len;
            } else {
                buf.push(' ');
                buf.push_str(word);
                buf_len += 1 + word_len;
            }
        }

        wrapped.push_str(&buf);
        wrapped.push_str(CRLF);
    }

    wrapped
}

/// Collapses every sequence of three or more line endings into two.
pub fn collapse_blank_lines(text: &str) -> String {
    let mut text = text.to_owned();
    while text.contains("\r\n\r\n\r\n") {
        text = text.replace("\r\n\r\n\r\n", "\r\n\r\n");
    }
    text
}

/// Encodes the given bytes in base64, split into lines of at most
/// `width` characters, each one ending with CRLF.
pub fn wrap_base64(bytes: &[u8], width: usize) -> String {
    let width = width.clamp(1, BASE64_MAX_LINE_LENGTH);
    let encoded = STANDARD.encode(bytes);
    let mut wrapped = String::with_capacity(encoded.len() + encoded.len() / width * 2 + 2);

    // base64 output is pure ASCII, so byte chunks are char chunks
    for chunk in encoded.as_bytes().chunks(width) {
        wrapped.push_str(&String::from_utf8_lossy(chunk));
        wrapped.push_str(CRLF);
    }

    wrapped
}
