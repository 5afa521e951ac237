#![doc = include_str!("../README.md")]

pub mod config;
pub mod context;
pub mod dns;
pub mod error;
pub mod fs;
pub mod imap;
pub mod message;
pub mod mime;
pub mod sendmail;
pub mod smtp;
pub mod stream;
pub mod tls;
pub mod transport;

#[doc(inline)]
pub use self::{
    config::MailerConfig,
    context::RequestContext,
    error::{Error, ErrorKind, Result},
    message::{AddressInput, Attachment, Mailbox, Message},
    mime::{Composition, MessageType, MimeComposer},
    transport::{DeliveryReport, Mailer, TransportKind},
};
