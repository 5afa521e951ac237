//! Module dedicated to the SMTP session state machine.

use std::{fmt, sync::Arc};

use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::{debug, info, instrument, warn};

use super::{data, Error, Reply, Result, SmtpConfig, SmtpEncryption, UnexpectedReply};
use crate::{
    stream::{LineStream, Stream},
    tls::{RustlsUpgrade, TlsUpgrade},
};

/// Placeholder recorded instead of credentials.
const REDACTED: &str = "<redacted>";

/// The SMTP session state.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SmtpState {
    #[default]
    Disconnected,
    Connected,
    HelloSent,
    TlsRequested,
    TlsEstablished,
    HelloSentSecure,
    Authenticated,
    MailFromAccepted,
    RcptToAccepted,
    DataOpened,
    DataAccepted,
    Reset,
    Closed,
}

impl fmt::Display for SmtpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// One command and the reply it produced.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Exchange {
    pub command: String,
    pub reply: Reply,
}

/// The SMTP session.
///
/// A session owns at most one connection. The connection is dropped
/// as soon as the session is closed, aborted or itself dropped.
pub struct SmtpSession {
    config: SmtpConfig,
    hostname: String,
    upgrade: Arc<dyn TlsUpgrade>,
    stream: Option<LineStream>,
    host: Option<String>,
    port: Option<u16>,
    state: SmtpState,
    authenticated: bool,
    last_reply: Option<Reply>,
    transcript: Vec<Exchange>,
    unexpected: Vec<UnexpectedReply>,
}

impl SmtpSession {
    /// Creates a new session. The given host name is the one
    /// announced with EHLO.
    pub fn new(config: SmtpConfig, hostname: impl ToString) -> Self {
        let upgrade = RustlsUpgrade::new(config.insecure);

        Self {
            config,
            hostname: hostname.to_string(),
            upgrade: Arc::new(upgrade),
            stream: None,
            host: None,
            port: None,
            state: SmtpState::Disconnected,
            authenticated: false,
            last_reply: None,
            transcript: Vec::new(),
            unexpected: Vec::new(),
        }
    }

    pub fn with_tls_upgrade(mut self, upgrade: impl TlsUpgrade + 'static) -> Self {
        self.upgrade = Arc::new(upgrade);
        self
    }

    pub fn state(&self) -> SmtpState {
        self.state
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn is_encrypted(&self) -> bool {
        self.stream.as_ref().is_some_and(LineStream::is_encrypted)
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn last_reply(&self) -> Option<&Reply> {
        self.last_reply.as_ref()
    }

    /// Returns every command sent so far with the reply it got.
    /// Credentials are redacted.
    pub fn transcript(&self) -> &[Exchange] {
        &self.transcript
    }

    fn stream(&mut self) -> Result<&mut LineStream> {
        self.stream.as_mut().ok_or(Error::NotConnectedError)
    }

    fn read_reply(&mut self) -> Result<Reply> {
        let stream = self.stream()?;
        let reply = Reply::read(|| stream.read_line().map_err(Error::ReadReplyError))?;
        debug!(code = reply.code, reply = reply.text(), "smtp reply");
        self.last_reply = Some(reply.clone());
        Ok(reply)
    }

    /// Compares the reply code against the expected ones.
    ///
    /// On mismatch, the session either fails straight away or, in
    /// lenient mode, records the mismatch and moves on.
    fn check(&mut self, command: &str, reply: &Reply, expected: &[u16], next: SmtpState) -> Result<()> {
        self.transcript.push(Exchange {
            command: command.to_owned(),
            reply: reply.clone(),
        });

        if !reply.is(expected) {
            let unexpected = UnexpectedReply {
                command: command.to_owned(),
                expected: expected.to_vec(),
                reply: reply.clone(),
            };

            if !self.config.lenient {
                return Err(Error::UnexpectedReplyError(unexpected));
            }

            warn!(%unexpected, "unexpected smtp reply, keep going");
            self.unexpected.push(unexpected);
        }

        debug!(from = %self.state, to = %next, "smtp state transition");
        self.state = next;
        Ok(())
    }

    /// Sends a command and checks its reply. The logged and recorded
    /// form of the command is `shown`.
    fn command_as(
        &mut self,
        command: &str,
        shown: &str,
        expected: &[u16],
        next: SmtpState,
    ) -> Result<Reply> {
        debug!(command = shown, "smtp command");

        self.stream()?
            .write_all(format!("{command}\r\n").as_bytes())
            .map_err(Error::WriteCommandError)?;

        let reply = self.read_reply()?;
        self.check(shown, &reply, expected, next)?;
        Ok(reply)
    }

    fn command(&mut self, command: &str, expected: &[u16], next: SmtpState) -> Result<Reply> {
        self.command_as(command, command, expected, next)
    }

    /// Connects to the given host, trying the configured ports in
    /// order.
    pub fn connect(&mut self, host: &str) -> Result<()> {
        let ports = self.config.ports();
        self.connect_to(host, &ports)
    }

    /// Connects to the given host, trying the given ports in order.
    /// The first port answering with a 220 greeting wins.
    #[instrument(skip(self))]
    pub fn connect_to(&mut self, host: &str, ports: &[u16]) -> Result<()> {
        let timeout = self.config.timeout();
        let mut last_err = None;
        let mut reached = false;

        for port in ports.iter().copied() {
            let stream = match Stream::connect(host, port, timeout) {
                Ok(stream) => stream,
                Err(err) => {
                    debug!(host, port, ?err, "cannot connect to smtp server");
                    last_err = Some(err);
                    continue;
                }
            };

            reached = true;

            let stream = if self.config.encryption() == SmtpEncryption::Tls {
                match self.upgrade.upgrade(host, stream) {
                    Ok(stream) => stream,
                    Err(err) => {
                        debug!(host, port, ?err, "cannot negotiate implicit tls");
                        continue;
                    }
                }
            } else {
                stream
            };

            self.stream = Some(LineStream::new(stream));

            match self.read_reply() {
                Ok(reply) if reply.is(&[220]) => {
                    info!(host, port, "connected to smtp server");
                    self.transcript.push(Exchange {
                        command: format!("CONNECT {host}:{port}"),
                        reply,
                    });
                    self.host = Some(host.to_owned());
                    self.port = Some(port);
                    self.state = SmtpState::Connected;
                    return Ok(());
                }
                Ok(reply) => {
                    debug!(host, port, %reply, "unexpected smtp greeting");
                }
                Err(err) => {
                    debug!(host, port, ?err, "cannot read smtp greeting");
                }
            }

            self.stream = None;
        }

        match last_err {
            Some(err) if !reached => Err(Error::ConnectError(host.to_owned(), ports.to_vec(), err)),
            _ => Err(Error::GreetingError(host.to_owned(), ports.to_vec())),
        }
    }

    /// Sends EHLO, over the plain or the encrypted channel.
    #[instrument(skip_all)]
    pub fn hello(&mut self) -> Result<Reply> {
        let next = if self.is_encrypted() {
            SmtpState::HelloSentSecure
        } else {
            SmtpState::HelloSent
        };

        let command = format!("EHLO {}", self.hostname);
        self.command(&command, &[250], next)
    }

    /// Upgrades the connection using STARTTLS, then says hello
    /// again over the encrypted channel.
    #[instrument(skip_all)]
    pub fn start_tls(&mut self) -> Result<()> {
        self.command("STARTTLS", &[220], SmtpState::TlsRequested)?;

        let stream = self.stream.take().ok_or(Error::NotConnectedError)?;

        if stream.has_pending_bytes() {
            return Err(Error::StartTlsPendingDataError);
        }

        let host = self.host.clone().unwrap_or_default();
        let stream = self
            .upgrade
            .upgrade(&host, stream.into_inner())
            .map_err(Error::StartTlsError)?;

        self.stream = Some(LineStream::new(stream));
        self.state = SmtpState::TlsEstablished;
        debug!("smtp connection upgraded");

        self.hello()?;
        Ok(())
    }

    /// Authenticates using the LOGIN mechanism.
    #[instrument(skip_all)]
    pub fn authenticate(&mut self, login: &str, passwd: &str) -> Result<()> {
        if self.config.encryption() == SmtpEncryption::None {
            return Err(Error::AuthOverPlainTextError);
        }

        let login = STANDARD.encode(login);
        let passwd = STANDARD.encode(passwd);

        self.command("AUTH LOGIN", &[334], self.state)?;
        self.command_as(&login, REDACTED, &[334], self.state)?;
        self.command_as(&passwd, REDACTED, &[235], SmtpState::Authenticated)?;

        self.authenticated = true;
        info!("authenticated to smtp server");
        Ok(())
    }

    pub fn mail_from(&mut self, sender: &str) -> Result<Reply> {
        let mut command = format!("MAIL FROM:<{sender}>");

        if self.config.verp {
            command.push_str(" XVERP");
        }

        self.command(&command, &[250], SmtpState::MailFromAccepted)
    }

    pub fn rcpt_to(&mut self, rcpt: &str) -> Result<Reply> {
        let command = format!("RCPT TO:<{rcpt}>");
        self.command(&command, &[250, 251], SmtpState::RcptToAccepted)
    }

    /// Sends the DATA command, then the given payload.
    #[instrument(skip_all)]
    pub fn data(&mut self, payload: &[u8]) -> Result<Reply> {
        self.command("DATA", &[354], SmtpState::DataOpened)?;

        let payload = data::encode(payload);
        debug!(bytes = payload.len(), "send smtp data");

        self.stream()?
            .write_all(&payload)
            .map_err(Error::WriteCommandError)?;

        let reply = self.read_reply()?;
        self.check("<data>", &reply, &[250], SmtpState::DataAccepted)?;
        Ok(reply)
    }

    pub fn reset(&mut self) -> Result<Reply> {
        self.command("RSET", &[250], SmtpState::Reset)
    }

    /// Says goodbye and closes the connection.
    pub fn quit(&mut self) -> Result<()> {
        let result = self.command("QUIT", &[221], SmtpState::Closed);
        self.close();
        result.map(|_| ())
    }

    /// Closes the connection without saying goodbye.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("smtp connection closed");
        }
        self.state = SmtpState::Closed;
    }

    /// Closes the connection after a failure, trying to say goodbye
    /// first.
    fn abort(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            let _ = stream.write_all(b"QUIT\r\n");
        }
        self.close();
    }

    fn transaction(&mut self, host: &str, sender: &str, rcpts: &[String], payload: &[u8]) -> Result<()> {
        if self.state != SmtpState::Reset {
            self.connect(host)?;
            self.hello()?;

            if self.config.encryption() == SmtpEncryption::StartTls {
                self.start_tls()?;
            }

            if let Some(login) = self.config.login.clone() {
                let passwd = self.config.passwd.clone().unwrap_or_default();
                self.authenticate(&login, &passwd)?;
            }
        }

        self.mail_from(sender)?;

        for rcpt in rcpts {
            self.rcpt_to(rcpt)?;
        }

        self.data(payload)?;

        if self.config.keep_alive {
            self.reset()?;
        } else {
            self.quit()?;
        }

        Ok(())
    }

    /// Runs a complete delivery transaction.
    ///
    /// When the session is kept alive after a previous transaction,
    /// the connection is reused and the transaction starts straight
    /// from MAIL FROM. Otherwise the session connects to the given
    /// host first.
    #[instrument(skip(self, rcpts, payload))]
    pub fn send(&mut self, host: &str, sender: &str, rcpts: &[String], payload: &[u8]) -> Result<()> {
        if rcpts.is_empty() {
            return Err(Error::MissingRecipientError);
        }

        self.unexpected.clear();

        if let Err(err) = self.transaction(host, sender, rcpts, payload) {
            self.abort();
            return Err(err);
        }

        if !self.unexpected.is_empty() {
            self.abort();
            return Err(Error::UnexpectedRepliesError(std::mem::take(&mut self.unexpected)));
        }

        info!(rcpts = rcpts.len(), "message sent via smtp");
        Ok(())
    }
}

impl Drop for SmtpSession {
    fn drop(&mut self) {
        if self.stream.is_some() {
            self.abort();
        }
    }
}
