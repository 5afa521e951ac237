//! Module dedicated to the DATA payload framing.
//!
//! The payload is sent as CRLF-terminated lines of at most 998
//! octets. Lines starting with a dot get an extra dot, and the
//! payload ends with a line made of a single dot.

/// Maximum length of a line, line ending excluded.
pub const MAX_LINE_LENGTH: usize = 998;

const CRLF: &[u8] = b"\r\n";

fn is_utf8_continuation(byte: u8) -> bool {
    byte & 0b1100_0000 == 0b1000_0000
}

/// Splits a line into segments that fit the maximum line length once
/// dot-stuffed, without cutting multi-byte characters.
fn segments(mut line: &[u8]) -> Vec<&[u8]> {
    let mut segments = Vec::new();

    loop {
        let max = if line.first() == Some(&b'.') {
            MAX_LINE_LENGTH - 1
        } else {
            MAX_LINE_LENGTH
        };

        if line.len() <= max {
            segments.push(line);
            return segments;
        }

        let mut cut = max;
        while cut > 0 && is_utf8_continuation(line[cut]) {
            cut -= 1;
        }
        if cut == 0 {
            cut = max;
        }

        let (segment, rest) = line.split_at(cut);
        segments.push(segment);
        line = rest;
    }
}

/// Frames the given payload for the DATA command, terminating dot
/// line included.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + payload.len() / 64 + 5);

    let payload = payload.strip_suffix(b"\n").unwrap_or(payload);

    if !payload.is_empty() {
        for line in payload.split(|b| *b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);

            for segment in segments(line) {
                if segment.first() == Some(&b'.') {
                    out.push(b'.');
                }
                out.extend_from_slice(segment);
                out.extend_from_slice(CRLF);
            }
        }
    }

    out.extend_from_slice(b".\r\n");
    out
}
