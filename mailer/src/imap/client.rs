//! Module dedicated to the blocking IMAP client.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::{Error, ImapAppend, ImapConfig, ImapEncryption, Result};
use crate::{
    stream::{LineStream, Stream},
    tls::{RustlsUpgrade, TlsUpgrade},
};

/// Quotes the given string as an IMAP quoted string.
pub fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// The IMAP client.
///
/// Every append opens its own connection, logs in, appends the
/// message then logs out.
#[derive(Clone)]
pub struct ImapClient {
    config: ImapConfig,
    upgrade: Arc<dyn TlsUpgrade>,
}

impl ImapClient {
    pub fn new(config: ImapConfig) -> Self {
        let upgrade = RustlsUpgrade::new(config.insecure);

        Self {
            config,
            upgrade: Arc::new(upgrade),
        }
    }

    pub fn with_tls_upgrade(mut self, upgrade: impl TlsUpgrade + 'static) -> Self {
        self.upgrade = Arc::new(upgrade);
        self
    }

    pub fn config(&self) -> &ImapConfig {
        &self.config
    }

    fn connect(&self) -> Result<ImapConnection> {
        let host = &self.config.host;
        let port = self.config.port();

        let stream = Stream::connect(host, port, self.config.timeout())
            .map_err(|err| Error::ConnectError(err, host.clone(), port))?;

        let stream = match self.config.encryption {
            ImapEncryption::Tls => self.upgrade.upgrade(host, stream)?,
            ImapEncryption::None => stream,
        };

        let mut conn = ImapConnection {
            stream: LineStream::new(stream),
            tag: 0,
        };

        let greeting = conn.read_line()?;
        if !greeting.starts_with("* OK") {
            return Err(Error::GreetingError(greeting));
        }

        info!(host, port, "connected to imap server");
        Ok(conn)
    }
}

impl ImapAppend for ImapClient {
    #[instrument(skip(self, bytes))]
    fn append(&self, folder: &str, bytes: &[u8]) -> Result<()> {
        let mut conn = self.connect()?;

        let login = format!(
            "LOGIN {} {}",
            quote(&self.config.login),
            quote(&self.config.passwd)
        );
        conn.command(&login, "LOGIN <redacted>")?;

        let append = format!("APPEND {} (\\Seen) {{{}}}", quote(folder), bytes.len());
        let tag = conn.send(&append, &append)?;

        let cont = conn.read_line()?;
        if !cont.starts_with('+') {
            return Err(Error::AppendRejectedError(folder.to_owned(), cont));
        }

        conn.write(bytes)?;
        conn.write(b"\r\n")?;
        conn.read_tagged(&tag)
            .map_err(|err| match err {
                Error::CommandRejectedError(_, line) => {
                    Error::AppendRejectedError(folder.to_owned(), line)
                }
                err => err,
            })?;

        conn.command("LOGOUT", "LOGOUT")?;

        info!(folder, bytes = bytes.len(), "message appended via imap");
        Ok(())
    }
}

struct ImapConnection {
    stream: LineStream,
    tag: usize,
}

impl ImapConnection {
    fn read_line(&mut self) -> Result<String> {
        let line = self.stream.read_line().map_err(Error::ReadResponseError)?;
        debug!(line, "imap response");
        Ok(line)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream
            .write_all(bytes)
            .map_err(Error::WriteCommandError)
    }

    /// Sends the given command, returning its tag.
    fn send(&mut self, command: &str, shown: &str) -> Result<String> {
        self.tag += 1;
        let tag = format!("A{}", self.tag);
        debug!(tag, command = shown, "imap command");
        self.write(format!("{tag} {command}\r\n").as_bytes())?;
        Ok(tag)
    }

    /// Reads responses until the tagged one, which must be OK.
    fn read_tagged(&mut self, tag: &str) -> Result<()> {
        let prefix = format!("{tag} ");

        loop {
            let line = self.read_line()?;

            let Some(status) = line.strip_prefix(&prefix) else {
                continue;
            };

            if status.get(..2).is_some_and(|s| s.eq_ignore_ascii_case("OK")) {
                return Ok(());
            }

            return Err(Error::CommandRejectedError(tag.to_owned(), line));
        }
    }

    fn command(&mut self, command: &str, shown: &str) -> Result<()> {
        let tag = self.send(command, shown)?;
        self.read_tagged(&tag)
    }
}

#[cfg(test)]
mod tests {
    use super::quote;

    #[test_log::test]
    fn quote_strings() {
        assert_eq!(quote("INBOX.Sent"), r#""INBOX.Sent""#);
        assert_eq!(quote(r#"pa"ss\word"#), r#""pa\"ss\\word""#);
    }
}
