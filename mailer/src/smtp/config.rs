//! Module dedicated to the SMTP configuration.

use std::{fmt, time::Duration};

/// Ports tried in order when no port is configured.
pub const DEFAULT_PORTS: [u16; 3] = [587, 2525, 25];

/// Default timeout of connections, reads and writes, in seconds.
pub const DEFAULT_TIMEOUT: u64 = 30;

/// The SMTP configuration.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub struct SmtpConfig {
    /// The SMTP server host name.
    ///
    /// When undefined, the mail exchanger of the sender domain is
    /// used.
    pub host: Option<String>,

    /// The SMTP server port.
    ///
    /// When undefined, ports 587, 2525 then 25 are tried in order.
    pub port: Option<u16>,

    /// The encryption protocol to use.
    ///
    /// Defaults to STARTTLS.
    pub encryption: Option<SmtpEncryption>,

    /// Disables the verification of the server certificate.
    #[cfg_attr(feature = "derive", serde(default))]
    pub insecure: bool,

    /// The SMTP login. Authentication is skipped when undefined.
    pub login: Option<String>,

    /// The SMTP password.
    pub passwd: Option<String>,

    /// Timeout of connections, reads and writes, in seconds.
    pub timeout: Option<u64>,

    /// Resets the session instead of closing it after a message has
    /// been sent, so the connection can be reused.
    #[cfg_attr(feature = "derive", serde(default))]
    pub keep_alive: bool,

    /// Appends the XVERP marker to the MAIL FROM command.
    #[cfg_attr(feature = "derive", serde(default))]
    pub verp: bool,

    /// Keeps going through the whole session when the server
    /// replies with an unexpected code, instead of aborting straight
    /// away. The session still fails at the end.
    #[cfg_attr(feature = "derive", serde(default))]
    pub lenient: bool,
}

impl SmtpConfig {
    pub fn with_host(mut self, host: impl ToString) -> Self {
        self.host = Some(host.to_string());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_encryption(mut self, encryption: SmtpEncryption) -> Self {
        self.encryption = Some(encryption);
        self
    }

    pub fn with_credentials(mut self, login: impl ToString, passwd: impl ToString) -> Self {
        self.login = Some(login.to_string());
        self.passwd = Some(passwd.to_string());
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_verp(mut self, verp: bool) -> Self {
        self.verp = verp;
        self
    }

    pub fn with_lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(secs);
        self
    }

    /// Returns the ports to try, in order.
    pub fn ports(&self) -> Vec<u16> {
        match self.port {
            Some(port) => vec![port],
            None => DEFAULT_PORTS.to_vec(),
        }
    }

    pub fn encryption(&self) -> SmtpEncryption {
        self.encryption.clone().unwrap_or_default()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum SmtpEncryption {
    /// Implicit TLS, from the very first byte.
    #[cfg_attr(feature = "derive", serde(alias = "ssl"))]
    Tls,
    /// Plain connection upgraded with the STARTTLS command.
    #[default]
    #[cfg_attr(feature = "derive", serde(alias = "starttls"))]
    StartTls,
    /// Plain connection. Authentication is refused.
    None,
}

impl fmt::Display for SmtpEncryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tls => write!(f, "SSL/TLS"),
            Self::StartTls => write!(f, "StartTLS"),
            Self::None => write!(f, "None"),
        }
    }
}
