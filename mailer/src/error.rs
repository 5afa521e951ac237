//! # Error
//!
//! Module dedicated to the global library error. Every module exposes
//! its own `Error` enum, which is wrapped transparently by the global
//! [`Error`] defined here. Whatever the module it comes from, an
//! error can be classified using [`Error::kind`].

use std::fmt;

use thiserror::Error;

use crate::{imap, message, mime, sendmail, smtp, transport};

/// The global `Result` alias of the library.
pub type Result<T> = std::result::Result<T, Error>;

/// The global `Error` enum of the library.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    MessageError(#[from] message::Error),
    #[error(transparent)]
    MimeError(#[from] mime::Error),
    #[error(transparent)]
    SmtpError(#[from] smtp::Error),
    #[error(transparent)]
    SendmailError(#[from] sendmail::Error),
    #[error(transparent)]
    ImapError(#[from] imap::Error),
    #[error(transparent)]
    TransportError(#[from] transport::Error),
}

impl Error {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MessageError(err) => err.kind(),
            Self::MimeError(err) => err.kind(),
            Self::SmtpError(err) => err.kind(),
            Self::SendmailError(err) => err.kind(),
            Self::ImapError(err) => err.kind(),
            Self::TransportError(err) => err.kind(),
        }
    }
}

/// The error classification.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// Missing sender or recipients, unsupported transport name,
    /// inconsistent settings.
    Configuration,
    /// A source file (attachment, HTML body, calendar) cannot be
    /// read.
    ResourceUnavailable,
    /// Malformed user input (address, header, priority).
    Validation,
    /// Unexpected server reply, connection failure, TLS negotiation
    /// failure or local pipe failure.
    Protocol,
    /// Every transport failed.
    TransportExhausted,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration error"),
            Self::ResourceUnavailable => write!(f, "resource unavailable"),
            Self::Validation => write!(f, "validation error"),
            Self::Protocol => write!(f, "protocol error"),
            Self::TransportExhausted => write!(f, "transports exhausted"),
        }
    }
}
