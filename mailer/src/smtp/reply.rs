//! Module dedicated to SMTP replies.

use std::fmt;

use super::{Error, Result};

/// A complete SMTP reply, possibly made of multiple lines.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Reply {
    pub fn new(code: u16, line: impl ToString) -> Self {
        Self {
            code,
            lines: vec![line.to_string()],
        }
    }

    /// Parses one reply line.
    ///
    /// Returns the code, whether the line is the last one of the
    /// reply and the text of the line.
    pub fn parse_line(line: &str) -> Result<(u16, bool, &str)> {
        let code = line
            .get(..3)
            .filter(|code| code.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|code| code.parse::<u16>().ok())
            .ok_or_else(|| Error::ParseReplyError(line.to_owned()))?;

        match line.as_bytes().get(3) {
            None => Ok((code, true, "")),
            Some(b' ') => Ok((code, true, &line[4..])),
            Some(b'-') => Ok((code, false, &line[4..])),
            Some(_) => Err(Error::ParseReplyError(line.to_owned())),
        }
    }

    /// Collects reply lines until the last one.
    pub fn read(mut next_line: impl FnMut() -> Result<String>) -> Result<Self> {
        let mut reply: Option<Reply> = None;

        loop {
            let line = next_line()?;
            let (code, last, text) = Self::parse_line(&line)?;

            match reply.as_mut() {
                None => reply = Some(Reply::new(code, text)),
                Some(reply) if reply.code == code => reply.lines.push(text.to_owned()),
                Some(_) => return Err(Error::ParseReplyError(line)),
            }

            if last {
                break;
            }
        }

        // the loop runs at least once
        reply.ok_or_else(|| Error::ParseReplyError(String::new()))
    }

    /// Returns `true` if the code is one of the given ones.
    pub fn is(&self, codes: &[u16]) -> bool {
        codes.contains(&self.code)
    }

    /// Returns the text of all lines, joined by spaces.
    pub fn text(&self) -> String {
        self.lines.join(" ")
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(lines: &[&str]) -> Result<Reply> {
        let mut lines = lines.iter();
        Reply::read(|| Ok(lines.next().unwrap().to_string()))
    }

    #[test_log::test]
    fn single_line() {
        let reply = read(&["220 smtp.example.com ESMTP ready"]).unwrap();
        assert_eq!(reply, Reply::new(220, "smtp.example.com ESMTP ready"));
        assert!(reply.is(&[220]));
    }

    #[test_log::test]
    fn multi_line() {
        let reply = read(&["250-smtp.example.com", "250-STARTTLS", "250 AUTH LOGIN"]).unwrap();
        assert_eq!(reply.code, 250);
        assert_eq!(reply.lines, ["smtp.example.com", "STARTTLS", "AUTH LOGIN"]);
        assert_eq!(reply.to_string(), "250 smtp.example.com STARTTLS AUTH LOGIN");
    }

    #[test_log::test]
    fn code_only() {
        assert_eq!(read(&["354"]).unwrap(), Reply::new(354, ""));
    }

    #[test_log::test]
    fn invalid_lines() {
        assert!(matches!(read(&["hello"]), Err(Error::ParseReplyError(_))));
        assert!(matches!(read(&["250_ok"]), Err(Error::ParseReplyError(_))));
        assert!(matches!(
            read(&["250-first", "550 second"]),
            Err(Error::ParseReplyError(_))
        ));
    }
}
