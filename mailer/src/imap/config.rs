//! Module dedicated to the IMAP configuration.

use std::{fmt, time::Duration};

/// The IMAP configuration, used both by the injection transport and
/// to keep a copy of sent messages.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case", default)
)]
pub struct ImapConfig {
    /// The IMAP server host name.
    pub host: String,

    /// The IMAP server port.
    ///
    /// Defaults to 993 with TLS, 143 otherwise.
    pub port: Option<u16>,

    /// The IMAP encryption. Defaults to implicit TLS.
    pub encryption: ImapEncryption,

    /// Disables server certificate verification.
    pub insecure: bool,

    /// The IMAP server login.
    pub login: String,

    /// The IMAP server password.
    pub passwd: String,

    /// The network timeout, in seconds.
    pub timeout: Option<u64>,

    /// The folder receiving a copy of every sent message.
    pub sent_folder: String,

    /// The folder the IMAP transport injects messages into.
    pub inject_folder: String,

    /// Appends a copy of every sent message to the sent folder.
    pub append_to_sent: bool,
}

impl Default for ImapConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: None,
            encryption: ImapEncryption::default(),
            insecure: false,
            login: String::new(),
            passwd: String::new(),
            timeout: None,
            sent_folder: String::from("INBOX.Sent"),
            inject_folder: String::from("INBOX"),
            append_to_sent: false,
        }
    }
}

impl ImapConfig {
    pub fn with_host(mut self, host: impl ToString) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_encryption(mut self, encryption: ImapEncryption) -> Self {
        self.encryption = encryption;
        self
    }

    pub fn with_credentials(mut self, login: impl ToString, passwd: impl ToString) -> Self {
        self.login = login.to_string();
        self.passwd = passwd.to_string();
        self
    }

    pub fn with_sent_folder(mut self, folder: impl ToString) -> Self {
        self.sent_folder = folder.to_string();
        self
    }

    pub fn with_inject_folder(mut self, folder: impl ToString) -> Self {
        self.inject_folder = folder.to_string();
        self
    }

    pub fn with_append_to_sent(mut self, append: bool) -> Self {
        self.append_to_sent = append;
        self
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(match self.encryption {
            ImapEncryption::Tls => 993,
            ImapEncryption::None => 143,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.unwrap_or(crate::smtp::config::DEFAULT_TIMEOUT))
    }
}

/// The IMAP encryption.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum ImapEncryption {
    #[default]
    Tls,
    None,
}

impl fmt::Display for ImapEncryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tls => write!(f, "SSL/TLS"),
            Self::None => write!(f, "None"),
        }
    }
}
