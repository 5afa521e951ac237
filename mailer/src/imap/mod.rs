//! # IMAP
//!
//! Module dedicated to IMAP mailbox injection. It is used by the IMAP
//! transport and to keep a copy of sent messages.

pub mod client;
pub mod config;

use std::io;

use thiserror::Error;

#[doc(inline)]
pub use self::{
    client::ImapClient,
    config::{ImapConfig, ImapEncryption},
};
use crate::{tls, ErrorKind};

/// The global `Result` alias of the module.
pub type Result<T> = std::result::Result<T, Error>;

/// The global `Error` enum of the module.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot connect to imap server {1}:{2}")]
    ConnectError(#[source] io::Error, String, u16),
    #[error(transparent)]
    TlsError(#[from] tls::Error),
    #[error("cannot connect to imap server: unexpected greeting {0:?}")]
    GreetingError(String),
    #[error("cannot read imap response")]
    ReadResponseError(#[source] io::Error),
    #[error("cannot write imap command")]
    WriteCommandError(#[source] io::Error),
    #[error("imap command {0} rejected: {1}")]
    CommandRejectedError(String, String),
    #[error("cannot append message to imap folder {0}: {1}")]
    AppendRejectedError(String, String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Protocol
    }
}

/// The IMAP append collaborator.
pub trait ImapAppend: Send + Sync {
    /// Appends the given rendered message to the given folder.
    fn append(&self, folder: &str, bytes: &[u8]) -> Result<()>;
}
