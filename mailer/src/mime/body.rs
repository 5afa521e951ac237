//! # Body
//!
//! Module dedicated to the body block of a message.

use std::collections::HashSet;

use super::{
    text::{collapse_blank_lines, wrap_base64, wrap_text, CRLF},
    BoundarySet, MessageType,
};
use crate::message::{Disposition, TransferEncoding};

/// An attachment whose content has been loaded and whose MIME type
/// has been resolved, ready to be rendered.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedPart {
    pub name: String,
    pub mime: String,
    pub encoding: Option<TransferEncoding>,
    pub disposition: Disposition,
    pub cid: Option<String>,
    pub content: Vec<u8>,
}

/// Everything the body block is made of.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BodyParts {
    pub text: String,
    pub html: Option<String>,
    pub parts: Vec<ResolvedPart>,
}

/// Accumulates the body block.
///
/// Text is buffered so that blank lines can be collapsed, whereas raw
/// attachment content is written as it is.
#[derive(Default)]
struct BodyWriter {
    out: Vec<u8>,
    text: String,
}

impl BodyWriter {
    fn push_str(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn push_raw(&mut self, bytes: &[u8]) {
        self.flush();
        self.out.extend_from_slice(bytes);
    }

    fn flush(&mut self) {
        if !self.text.is_empty() {
            let text = collapse_blank_lines(&self.text);
            self.out.extend_from_slice(text.as_bytes());
            self.text.clear();
        }
    }

    fn finish(mut self) -> Vec<u8> {
        self.flush();
        self.out
    }
}

fn quote(name: &str) -> String {
    name.replace(['\r', '\n'], "").replace('\\', "\\\\").replace('"', "\\\"")
}

fn render_part(w: &mut BodyWriter, boundary: &str, part: &ResolvedPart, width: usize) {
    let name = quote(&part.name);

    w.push_str(&format!("--{boundary}{CRLF}"));
    w.push_str(&format!("Content-Type: {}; name=\"{name}\"{CRLF}", part.mime));

    if let Some(encoding) = part.encoding {
        w.push_str(&format!("Content-Transfer-Encoding: {encoding}{CRLF}"));
    }

    if part.disposition == Disposition::Inline {
        if let Some(cid) = &part.cid {
            w.push_str(&format!("Content-ID: <{cid}>{CRLF}"));
        }
    }

    w.push_str(&format!(
        "Content-Disposition: {}; filename=\"{name}\"{CRLF}{CRLF}",
        part.disposition
    ));

    match part.encoding {
        Some(TransferEncoding::Base64) => {
            w.push_str(&wrap_base64(&part.content, width));
            w.push_str(CRLF);
        }
        _ => {
            w.push_raw(&part.content);
            w.push_str(CRLF);
        }
    }
}

/// Renders the body block.
///
/// The alternative container (plain text, then HTML if any) comes
/// first, followed by inline parts within the related container,
/// then by attachments within the mixed container. Containers are
/// closed in the reverse order they were opened by the header block.
/// Among inline parts, only the first one carrying a given
/// content-id is rendered.
pub fn render_body(
    parts: &BodyParts,
    kind: MessageType,
    boundaries: &BoundarySet,
    width: usize,
) -> Vec<u8> {
    let mut w = BodyWriter::default();
    let alternative = boundaries.alternative();

    let text = wrap_text(&parts.text, width);
    let text_encoding = if text.is_ascii() { "7bit" } else { "8bit" };

    w.push_str(&format!("--{alternative}{CRLF}"));
    w.push_str(&format!("Content-Type: text/plain; charset=\"utf-8\"{CRLF}"));
    w.push_str(&format!("Content-Transfer-Encoding: {text_encoding}{CRLF}{CRLF}"));
    w.push_str(&text);
    w.push_str(CRLF);

    if let Some(html) = &parts.html {
        w.push_str(&format!("--{alternative}{CRLF}"));
        w.push_str(&format!("Content-Type: text/html; charset=\"utf-8\"{CRLF}"));
        w.push_str(&format!("Content-Transfer-Encoding: base64{CRLF}{CRLF}"));
        w.push_str(&wrap_base64(html.as_bytes(), width));
        w.push_str(CRLF);
    }

    w.push_str(&format!("--{alternative}--{CRLF}"));

    if kind.is_related() {
        let related = boundaries.related();
        let mut cids = HashSet::new();

        w.push_str(CRLF);

        let inline_parts = parts
            .parts
            .iter()
            .filter(|part| part.disposition == Disposition::Inline);

        for part in inline_parts {
            if let Some(cid) = &part.cid {
                if !cids.insert(cid.as_str()) {
                    continue;
                }
            }

            render_part(&mut w, related, part, width);
        }

        w.push_str(&format!("--{related}--{CRLF}"));
    }

    if kind.is_mixed() {
        let outer = boundaries.outer();

        w.push_str(CRLF);

        let attachments = parts
            .parts
            .iter()
            .filter(|part| part.disposition == Disposition::Attachment);

        for part in attachments {
            render_part(&mut w, outer, part, width);
        }

        w.push_str(&format!("--{outer}--{CRLF}"));
    }

    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(name: &str, disposition: Disposition, cid: Option<&str>) -> ResolvedPart {
        ResolvedPart {
            name: name.to_owned(),
            mime: "image/png".to_owned(),
            encoding: Some(TransferEncoding::Base64),
            disposition,
            cid: cid.map(ToOwned::to_owned),
            content: name.as_bytes().to_vec(),
        }
    }

    #[test_log::test]
    fn dedup_inline_cids() {
        let parts = BodyParts {
            text: "Hello".into(),
            html: Some("<img src=\"cid:logo\">".into()),
            parts: vec![
                part("first.png", Disposition::Inline, Some("logo")),
                part("second.png", Disposition::Inline, Some("logo")),
            ],
        };
        let kind = MessageType::classify(true, true, false);
        let body = render_body(&parts, kind, &BoundarySet::from_seed("x"), 70);
        let body = String::from_utf8(body).unwrap();

        assert_eq!(body.matches("Content-ID: <logo>").count(), 1);
        assert!(body.contains("filename=\"first.png\""));
        assert!(!body.contains("filename=\"second.png\""));
    }

    #[test_log::test]
    fn raw_content_is_not_altered() {
        let mut raw = part("raw.bin", Disposition::Attachment, None);
        raw.encoding = None;
        raw.content = b"a\r\n\r\n\r\n\r\nb".to_vec();

        let parts = BodyParts {
            text: "Hello".into(),
            html: None,
            parts: vec![raw],
        };
        let kind = MessageType::classify(true, false, true);
        let body = render_body(&parts, kind, &BoundarySet::from_seed("x"), 70);

        let needle = b"a\r\n\r\n\r\n\r\nb";
        assert!(body.windows(needle.len()).any(|w| w == needle));
    }

    #[test_log::test]
    fn no_triple_blank_lines() {
        let parts = BodyParts {
            text: "Hello\n\n\n\n\nWorld\n\n\n".into(),
            ..Default::default()
        };
        let kind = MessageType::classify(true, false, false);
        let body = render_body(&parts, kind, &BoundarySet::from_seed("x"), 70);
        let body = String::from_utf8(body).unwrap();

        assert!(!body.contains("\r\n\r\n\r\n"));
        assert!(body.ends_with("--=_Alternative_x--\r\n"));
    }
}
