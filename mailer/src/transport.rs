//! # Transport
//!
//! Module dedicated to message delivery. A [`Transport`] delivers an
//! already composed message. The [`Mailer`] composes a message once,
//! then tries the transports in the fixed order smtp, sendmail, imap,
//! starting from the requested one, until one of them succeeds.

use std::{
    collections::BTreeMap,
    fmt,
    str::FromStr,
    sync::Arc,
};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::{
    config::MailerConfig,
    dns::{DnsMxResolver, MxResolver},
    imap::{ImapAppend, ImapClient, ImapConfig},
    message::Message,
    mime::{Composition, MimeComposer},
    sendmail::{Sendmail, SendmailConfig},
    smtp::{self, SmtpConfig, SmtpSession},
    tls::TlsUpgrade,
    ErrorKind,
};

/// The global `Result` alias of the module.
pub type Result<T> = std::result::Result<T, Error>;

fn display_errors(errors: &[(TransportKind, crate::Error)]) -> String {
    errors
        .iter()
        .map(|(kind, err)| format!("{kind}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// The global `Error` enum of the module.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot send message: no recipient")]
    MissingRecipientsError,
    #[error("cannot send message: unsupported transport {0}")]
    UnsupportedTransportError(String),
    #[error("cannot send message: all transports failed: {}", display_errors(.0))]
    TransportsExhaustedError(Vec<(TransportKind, crate::Error)>),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingRecipientsError | Self::UnsupportedTransportError(_) => {
                ErrorKind::Configuration
            }
            Self::TransportsExhaustedError(_) => ErrorKind::TransportExhausted,
        }
    }
}

/// The transport kind.
///
/// Kinds are ordered the way fallbacks are tried.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum TransportKind {
    Smtp,
    Sendmail,
    Imap,
}

impl TransportKind {
    pub const ALL: [TransportKind; 3] = [Self::Smtp, Self::Sendmail, Self::Imap];

    /// Returns the given kind followed by the kinds to fall back on.
    pub fn fallbacks(self) -> impl Iterator<Item = TransportKind> {
        Self::ALL.into_iter().skip_while(move |kind| *kind != self)
    }

    /// Whether the `Bcc` header is part of the header block.
    ///
    /// Only sendmail reads recipients out of the headers, and strips
    /// the `Bcc` header itself.
    pub fn renders_bcc(self) -> bool {
        matches!(self, Self::Sendmail)
    }

    /// Whether the `To` and `Subject` headers are part of the header
    /// block.
    pub fn renders_recipients(self) -> bool {
        matches!(self, Self::Smtp | Self::Sendmail)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Smtp => write!(f, "smtp"),
            Self::Sendmail => write!(f, "sendmail"),
            Self::Imap => write!(f, "imap"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "smtp" => Ok(Self::Smtp),
            "sendmail" => Ok(Self::Sendmail),
            "imap" => Ok(Self::Imap),
            _ => Err(Error::UnsupportedTransportError(s.to_owned())),
        }
    }
}

/// The envelope of a message: who sends it, and to whom it is
/// delivered.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Envelope {
    pub sender: String,
    pub rcpts: Vec<String>,
}

/// Renders the message the given transport expects.
///
/// Transports that do not take `To` and `Subject` as part of the
/// header block get them prepended.
pub fn render(composition: &Composition, kind: TransportKind) -> Vec<u8> {
    let bytes = composition.to_bytes(kind);

    if kind.renders_recipients() {
        return bytes;
    }

    let mut rendered = composition.render_recipients().into_bytes();
    rendered.extend(bytes);
    rendered
}

/// The transport.
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Delivers the given composed message.
    fn deliver(&self, composition: &Composition, envelope: &Envelope) -> crate::Result<()>;
}

/// The SMTP transport.
///
/// Every delivery runs in its own session. Connections are never
/// shared between messages.
pub struct SmtpTransport {
    config: SmtpConfig,
    hostname: String,
    server_name: Option<String>,
    resolver: Arc<dyn MxResolver>,
    upgrade: Option<Arc<dyn TlsUpgrade>>,
}

impl SmtpTransport {
    pub fn new(config: SmtpConfig, hostname: impl ToString) -> Self {
        Self {
            config,
            hostname: hostname.to_string(),
            server_name: None,
            resolver: Arc::new(DnsMxResolver),
            upgrade: None,
        }
    }

    pub fn with_server_name(mut self, server_name: Option<String>) -> Self {
        self.server_name = server_name;
        self
    }

    pub fn with_mx_resolver(mut self, resolver: impl MxResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn with_tls_upgrade(mut self, upgrade: impl TlsUpgrade + 'static) -> Self {
        self.upgrade = Some(Arc::new(upgrade));
        self
    }

    /// Finds the host to deliver to: the configured one, the mail
    /// exchanger of the sender domain or the server name.
    pub fn host(&self, sender: &str) -> smtp::Result<String> {
        if let Some(host) = &self.config.host {
            return Ok(host.clone());
        }

        let mx = sender
            .rsplit_once('@')
            .and_then(|(_, domain)| self.resolver.resolve(domain));

        if let Some(host) = mx {
            debug!(host, "using mail exchanger of sender domain");
            return Ok(host);
        }

        self.server_name
            .clone()
            .ok_or(smtp::Error::ResolveHostError)
    }

    fn session(&self) -> SmtpSession {
        let session = SmtpSession::new(self.config.clone(), &self.hostname);

        match &self.upgrade {
            Some(upgrade) => session.with_tls_upgrade(upgrade.clone()),
            None => session,
        }
    }
}

impl Transport for SmtpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Smtp
    }

    #[instrument(skip_all)]
    fn deliver(&self, composition: &Composition, envelope: &Envelope) -> crate::Result<()> {
        let host = self.host(&envelope.sender)?;
        let payload = render(composition, self.kind());

        self.session()
            .send(&host, &envelope.sender, &envelope.rcpts, &payload)?;

        Ok(())
    }
}

/// The sendmail transport.
#[derive(Clone, Debug, Default)]
pub struct SendmailTransport {
    sendmail: Sendmail,
}

impl SendmailTransport {
    pub fn new(config: SendmailConfig) -> Self {
        Self {
            sendmail: Sendmail::new(config),
        }
    }
}

impl Transport for SendmailTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Sendmail
    }

    fn deliver(&self, composition: &Composition, envelope: &Envelope) -> crate::Result<()> {
        let bytes = render(composition, self.kind());
        self.sendmail.send(&envelope.sender, &bytes)?;
        Ok(())
    }
}

/// The IMAP transport, which injects the message straight into a
/// mailbox folder.
pub struct ImapTransport {
    appender: Arc<dyn ImapAppend>,
    folder: String,
}

impl ImapTransport {
    pub fn new(config: ImapConfig) -> Self {
        let folder = config.inject_folder.clone();
        Self::new_with_appender(ImapClient::new(config), folder)
    }

    pub fn new_with_appender(appender: impl ImapAppend + 'static, folder: impl ToString) -> Self {
        Self {
            appender: Arc::new(appender),
            folder: folder.to_string(),
        }
    }
}

impl Transport for ImapTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Imap
    }

    fn deliver(&self, composition: &Composition, _envelope: &Envelope) -> crate::Result<()> {
        let bytes = render(composition, self.kind());
        self.appender.append(&self.folder, &bytes)?;
        info!(folder = self.folder, "message injected via imap");
        Ok(())
    }
}

/// The delivery report.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeliveryReport {
    /// The transport that delivered the message.
    pub transport: TransportKind,

    /// The Message-Id of the delivered message.
    pub message_id: String,

    /// The number of transports tried, the successful one included.
    pub attempts: usize,
}

/// The mailer.
///
/// Holds the composer, one transport per kind and, optionally, the
/// collaborator keeping a copy of every sent message.
pub struct Mailer {
    composer: MimeComposer,
    transports: BTreeMap<TransportKind, Box<dyn Transport>>,
    sent: Option<(Arc<dyn ImapAppend>, String)>,
}

impl Mailer {
    /// Creates a mailer with the default collaborators.
    ///
    /// The IMAP transport is only available when IMAP is configured.
    pub fn new(config: MailerConfig) -> Self {
        let ctx = config.context.clone();
        let composer = MimeComposer::new(ctx.clone()).with_word_wrap(config.word_wrap());

        let mut mailer = Self {
            composer,
            transports: BTreeMap::new(),
            sent: None,
        };

        let smtp = SmtpTransport::new(config.smtp, &ctx.hostname)
            .with_server_name(ctx.server_name.clone());
        mailer = mailer
            .with_transport(smtp)
            .with_transport(SendmailTransport::new(config.sendmail));

        if let Some(imap) = config.imap {
            if imap.append_to_sent {
                let folder = imap.sent_folder.clone();
                mailer = mailer.with_sent_copy(ImapClient::new(imap.clone()), folder);
            }

            mailer = mailer.with_transport(ImapTransport::new(imap));
        }

        mailer
    }

    pub fn with_composer(mut self, composer: MimeComposer) -> Self {
        self.composer = composer;
        self
    }

    /// Sets the transport of its kind, replacing the previous one.
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transports.insert(transport.kind(), Box::new(transport));
        self
    }

    pub fn without_transport(mut self, kind: TransportKind) -> Self {
        self.transports.remove(&kind);
        self
    }

    /// Appends a copy of every sent message to the given folder.
    pub fn with_sent_copy(mut self, appender: impl ImapAppend + 'static, folder: impl ToString) -> Self {
        self.sent = Some((Arc::new(appender), folder.to_string()));
        self
    }

    pub fn composer(&self) -> &MimeComposer {
        &self.composer
    }

    /// Sends the given message, trying the given transport first.
    ///
    /// The message is composed once: a composition failure aborts
    /// before any transport is tried.
    #[instrument(skip(self, msg))]
    pub fn send(&self, msg: &Message, kind: TransportKind) -> crate::Result<DeliveryReport> {
        if msg.routes().is_empty() {
            return Err(Error::MissingRecipientsError.into());
        }

        let composition = self.composer.compose(msg)?;

        let envelope = Envelope {
            sender: composition.fields.return_path.clone(),
            rcpts: msg.routes().to_vec(),
        };

        let mut errors = Vec::new();
        let mut attempts = 0;

        for kind in kind.fallbacks() {
            let Some(transport) = self.transports.get(&kind) else {
                debug!(%kind, "transport not available, skipping it");
                continue;
            };

            attempts += 1;
            info!(%kind, "sending message");

            match transport.deliver(&composition, &envelope) {
                Ok(()) => {
                    info!(%kind, message_id = composition.message_id(), "message sent");
                    self.append_to_sent(&composition, kind);

                    return Ok(DeliveryReport {
                        transport: kind,
                        message_id: composition.message_id().to_owned(),
                        attempts,
                    });
                }
                Err(err) => {
                    warn!(%kind, %err, "cannot send message, trying next transport");
                    errors.push((kind, err));
                }
            }
        }

        Err(Error::TransportsExhaustedError(errors).into())
    }

    /// Sends the given message using the transport of the given name.
    pub fn send_via(&self, msg: &Message, transport: &str) -> crate::Result<DeliveryReport> {
        let kind = transport.parse::<TransportKind>()?;
        self.send(msg, kind)
    }

    fn append_to_sent(&self, composition: &Composition, kind: TransportKind) {
        let Some((appender, folder)) = &self.sent else {
            return;
        };

        let bytes = render(composition, kind);

        match appender.append(folder, &bytes) {
            Ok(()) => debug!(folder, "message appended to sent folder"),
            Err(err) => warn!(folder, %err, "cannot append message to sent folder"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SmtpTransport, TransportKind};
    use crate::{
        dns::MxResolver,
        smtp::{self, SmtpConfig},
    };

    struct StaticMx(Option<&'static str>);

    impl MxResolver for StaticMx {
        fn resolve(&self, _domain: &str) -> Option<String> {
            self.0.map(ToOwned::to_owned)
        }
    }

    #[test_log::test]
    fn smtp_host_resolution() {
        let config = SmtpConfig::default().with_host("smtp.example.com");
        let transport = SmtpTransport::new(config, "localhost")
            .with_mx_resolver(StaticMx(Some("mx.example.com")));
        assert_eq!(transport.host("alice@example.com").unwrap(), "smtp.example.com");

        let transport = SmtpTransport::new(SmtpConfig::default(), "localhost")
            .with_mx_resolver(StaticMx(Some("mx.example.com")));
        assert_eq!(transport.host("alice@example.com").unwrap(), "mx.example.com");

        let transport = SmtpTransport::new(SmtpConfig::default(), "localhost")
            .with_mx_resolver(StaticMx(None))
            .with_server_name(Some(String::from("example.org")));
        assert_eq!(transport.host("alice@example.com").unwrap(), "example.org");

        let transport = SmtpTransport::new(SmtpConfig::default(), "localhost")
            .with_mx_resolver(StaticMx(None));
        assert!(matches!(
            transport.host("alice@example.com"),
            Err(smtp::Error::ResolveHostError)
        ));
    }

    #[test_log::test]
    fn parse_kind() {
        assert_eq!("smtp".parse::<TransportKind>().unwrap(), TransportKind::Smtp);
        assert_eq!(" Sendmail ".parse::<TransportKind>().unwrap(), TransportKind::Sendmail);
        assert_eq!("imap".parse::<TransportKind>().unwrap(), TransportKind::Imap);
        assert!("mail".parse::<TransportKind>().is_err());
    }

    #[test_log::test]
    fn fallback_order() {
        let kinds: Vec<_> = TransportKind::Smtp.fallbacks().collect();
        assert_eq!(kinds, TransportKind::ALL);

        let kinds: Vec<_> = TransportKind::Sendmail.fallbacks().collect();
        assert_eq!(kinds, [TransportKind::Sendmail, TransportKind::Imap]);

        let kinds: Vec<_> = TransportKind::Imap.fallbacks().collect();
        assert_eq!(kinds, [TransportKind::Imap]);
    }

    #[test_log::test]
    fn header_profiles() {
        assert!(!TransportKind::Smtp.renders_bcc());
        assert!(TransportKind::Sendmail.renders_bcc());
        assert!(!TransportKind::Imap.renders_recipients());
    }
}
