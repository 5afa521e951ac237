//! # SMTP
//!
//! Module dedicated to the SMTP protocol. The [`SmtpSession`] drives
//! one connection through the EHLO, STARTTLS, AUTH, MAIL, RCPT, DATA
//! and QUIT exchange, checking every reply code on the way.

pub mod config;
pub mod data;
pub mod reply;
pub mod session;

use std::{fmt, io};

use thiserror::Error;

#[doc(inline)]
pub use self::{
    config::{SmtpConfig, SmtpEncryption},
    reply::Reply,
    session::{Exchange, SmtpSession, SmtpState},
};
use crate::{tls, ErrorKind};

/// The global `Result` alias of the module.
pub type Result<T> = std::result::Result<T, Error>;

/// An unexpected reply, attributed to the command that produced it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnexpectedReply {
    pub command: String,
    pub expected: Vec<u16>,
    pub reply: Reply,
}

impl fmt::Display for UnexpectedReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {:?}, got {}",
            self.command, self.expected, self.reply
        )
    }
}

fn display_replies(replies: &[UnexpectedReply]) -> String {
    replies
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// The global `Error` enum of the module.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot find smtp host: no host configured and no mail exchanger found")]
    ResolveHostError,
    #[error("cannot connect to smtp server {0} on ports {1:?}")]
    ConnectError(String, Vec<u16>, #[source] io::Error),
    #[error("cannot connect to smtp server {0}: no greeting on ports {1:?}")]
    GreetingError(String, Vec<u16>),
    #[error("cannot use smtp session: not connected")]
    NotConnectedError,
    #[error("cannot read smtp reply")]
    ReadReplyError(#[source] io::Error),
    #[error("cannot parse smtp reply line {0:?}")]
    ParseReplyError(String),
    #[error("cannot write smtp command")]
    WriteCommandError(#[source] io::Error),
    #[error("unexpected smtp reply to {0}")]
    UnexpectedReplyError(UnexpectedReply),
    #[error("cannot send message: {} unexpected replies: {}", .0.len(), display_replies(.0))]
    UnexpectedRepliesError(Vec<UnexpectedReply>),
    #[error("cannot start tls: data received before handshake")]
    StartTlsPendingDataError,
    #[error("cannot start tls")]
    StartTlsError(#[source] tls::Error),
    #[error("cannot authenticate: encryption disabled, credentials would be sent in clear")]
    AuthOverPlainTextError,
    #[error("cannot send message: no recipient")]
    MissingRecipientError,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ResolveHostError | Self::AuthOverPlainTextError | Self::MissingRecipientError => {
                ErrorKind::Configuration
            }
            _ => ErrorKind::Protocol,
        }
    }
}
