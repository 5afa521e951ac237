//! # Config
//!
//! Module dedicated to the mailer configuration, which gathers the
//! request context and the configuration of every transport.

use crate::{
    context::RequestContext, imap::ImapConfig, mime::DEFAULT_WORD_WRAP, sendmail::SendmailConfig,
    smtp::SmtpConfig,
};

/// The mailer configuration.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case", default)
)]
pub struct MailerConfig {
    /// The request context.
    ///
    /// Defaults to the context of the local system.
    pub context: RequestContext,

    /// The SMTP transport configuration.
    pub smtp: SmtpConfig,

    /// The sendmail transport configuration.
    pub sendmail: SendmailConfig,

    /// The IMAP configuration.
    ///
    /// When defined, the IMAP transport becomes available and sent
    /// messages can be copied to the sent folder.
    pub imap: Option<ImapConfig>,

    /// The column plain text bodies are wrapped at.
    ///
    /// Defaults to [`DEFAULT_WORD_WRAP`].
    pub word_wrap: Option<usize>,
}

impl MailerConfig {
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_smtp(mut self, smtp: SmtpConfig) -> Self {
        self.smtp = smtp;
        self
    }

    pub fn with_sendmail(mut self, sendmail: SendmailConfig) -> Self {
        self.sendmail = sendmail;
        self
    }

    pub fn with_imap(mut self, imap: ImapConfig) -> Self {
        self.imap = Some(imap);
        self
    }

    pub fn word_wrap(&self) -> usize {
        self.word_wrap.unwrap_or(DEFAULT_WORD_WRAP)
    }
}
