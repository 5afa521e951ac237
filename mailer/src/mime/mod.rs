//! # MIME
//!
//! Module dedicated to the composition of MIME messages. The
//! [`MimeComposer`] takes a [`Message`], embeds the local images its
//! HTML body references, classifies it into a [`MessageType`], then
//! renders the body block. The resulting [`Composition`] renders the
//! header block on demand, since it slightly depends on the
//! transport.

pub mod body;
pub mod boundary;
pub mod header;
pub mod html;
pub mod kind;
pub mod sniff;
pub mod text;

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use thiserror::Error;
use tracing::{debug, info, instrument};

#[doc(inline)]
pub use self::{
    body::{BodyParts, ResolvedPart},
    boundary::BoundarySet,
    header::{HeaderFields, HeaderStamps},
    kind::MessageType,
    sniff::{MagicSniffer, MimeSniffer},
};
use self::text::CRLF;
use crate::{
    context::RequestContext,
    fs::{FsPathGuard, PathGuard},
    message::{
        attachment::file_name, Attachment, AttachmentSource, CalendarSource, HtmlSource, Mailbox,
        Message,
    },
    transport::TransportKind,
    ErrorKind,
};

/// Default column plain text bodies are wrapped at.
pub const DEFAULT_WORD_WRAP: usize = 70;

/// MIME type used when nothing better can be found.
const DEFAULT_MIME: &str = "application/octet-stream";

/// The global `Result` alias of the module.
pub type Result<T> = std::result::Result<T, Error>;

/// The global `Error` enum of the module.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot get metadata of file {1}")]
    GetFileMetadataError(#[source] io::Error, PathBuf),
    #[error("cannot read {0}: not a regular file")]
    NotAFileError(PathBuf),
    #[error("cannot canonicalize path {1}")]
    CanonicalizePathError(#[source] io::Error, PathBuf),
    #[error("cannot read {0}: path outside of document root {1}")]
    UnsafePathError(PathBuf, PathBuf),
    #[error("cannot read attachment at {1}")]
    ReadAttachmentError(#[source] io::Error, PathBuf),
    #[error("cannot read html body at {1}")]
    ReadHtmlError(#[source] io::Error, PathBuf),
    #[error("cannot read calendar at {1}")]
    ReadCalendarError(#[source] io::Error, PathBuf),
    #[error("cannot compose message: missing sender")]
    MissingSenderError,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingSenderError => ErrorKind::Configuration,
            _ => ErrorKind::ResourceUnavailable,
        }
    }
}

/// The message once its HTML body and calendar have been resolved.
///
/// Images referenced by the HTML body and the calendar are part of
/// the attachments list, so the message type can be computed from
/// it.
#[derive(Clone, Debug)]
pub struct PreparedMessage {
    pub text: String,
    pub html: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl PreparedMessage {
    /// Classifies the message.
    pub fn classify(&self) -> MessageType {
        let has_body = !self.text.trim().is_empty()
            || self.html.as_ref().is_some_and(|html| !html.trim().is_empty());
        let has_inline = self.attachments.iter().any(Attachment::is_inline);
        let has_attachment = self.attachments.iter().any(|a| !a.is_inline());

        MessageType::classify(has_body, has_inline, has_attachment)
    }
}

/// The composed message.
#[derive(Clone, Debug)]
pub struct Composition {
    pub message_type: MessageType,
    pub boundaries: BoundarySet,
    pub fields: HeaderFields,
    pub stamps: HeaderStamps,
    body: Vec<u8>,
}

impl Composition {
    /// Renders the header block for the given transport.
    pub fn render_headers(&self, transport: TransportKind) -> String {
        header::render_headers(
            &self.fields,
            &self.stamps,
            self.message_type,
            &self.boundaries,
            transport,
        )
    }

    /// Returns the rendered body block.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns the Message-Id of the message, brackets included.
    pub fn message_id(&self) -> &str {
        &self.stamps.message_id
    }

    /// Renders the `To` and `Subject` headers alone, for transports
    /// that take them apart from the header block.
    pub fn render_recipients(&self) -> String {
        header::render_recipients(&self.fields)
    }

    /// Renders the whole message for the given transport: header
    /// block, empty line, body block.
    pub fn to_bytes(&self, transport: TransportKind) -> Vec<u8> {
        let headers = self.render_headers(transport);
        let mut bytes = Vec::with_capacity(headers.len() + CRLF.len() + self.body.len());
        bytes.extend_from_slice(headers.as_bytes());
        bytes.extend_from_slice(CRLF.as_bytes());
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

/// The MIME composer.
#[derive(Clone)]
pub struct MimeComposer {
    ctx: RequestContext,
    guard: Arc<dyn PathGuard>,
    sniffer: Arc<dyn MimeSniffer>,
    word_wrap: usize,
}

impl MimeComposer {
    pub fn new(ctx: RequestContext) -> Self {
        Self {
            ctx,
            guard: Arc::new(FsPathGuard),
            sniffer: Arc::new(MagicSniffer),
            word_wrap: DEFAULT_WORD_WRAP,
        }
    }

    pub fn with_path_guard(mut self, guard: impl PathGuard + 'static) -> Self {
        self.guard = Arc::new(guard);
        self
    }

    pub fn with_sniffer(mut self, sniffer: impl MimeSniffer + 'static) -> Self {
        self.sniffer = Arc::new(sniffer);
        self
    }

    pub fn with_word_wrap(mut self, width: usize) -> Self {
        self.word_wrap = width.max(1);
        self
    }

    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    /// Resolves the HTML body, the images it references and the
    /// calendar of the given message.
    ///
    /// The message itself is left untouched.
    pub fn prepare(&self, msg: &Message) -> Result<PreparedMessage> {
        let mut attachments = msg.attachments().to_vec();

        let html = match msg.html() {
            None => None,
            Some(body) => {
                let content = match &body.source {
                    HtmlSource::Inline(html) => html.clone(),
                    HtmlSource::File(path) => {
                        self.guard.check(&self.ctx, path)?;
                        let bytes = fs::read(path)
                            .map_err(|err| Error::ReadHtmlError(err, path.clone()))?;
                        String::from_utf8_lossy(&bytes).to_string()
                    }
                };

                let base_dir = body.base_dir.as_deref();
                let (html, images) =
                    html::embed_images(&content, base_dir, &self.ctx, self.guard.as_ref());

                for image in images {
                    let duplicate = attachments
                        .iter()
                        .any(|a| a.is_inline() && a.path().is_some() && a.path() == image.path());
                    if !duplicate {
                        attachments.push(image);
                    }
                }

                Some(html)
            }
        };

        if let Some(calendar) = msg.calendar() {
            let attachment = match calendar {
                CalendarSource::Inline(ics) => Attachment::from_bytes(ics.as_bytes(), "calendar.ics"),
                CalendarSource::File(path) => {
                    self.guard.check(&self.ctx, path)?;
                    let bytes = fs::read(path)
                        .map_err(|err| Error::ReadCalendarError(err, path.clone()))?;
                    Attachment::from_bytes(bytes, calendar_file_name(path))
                }
            };

            attachments.push(attachment.with_mime("text/calendar"));
        }

        Ok(PreparedMessage {
            text: msg.text().to_owned(),
            html,
            attachments,
        })
    }

    /// Loads the content of an attachment and resolves its MIME
    /// type.
    fn resolve(&self, attachment: &Attachment) -> Result<ResolvedPart> {
        let (content, sniffed) = match &attachment.source {
            AttachmentSource::Bytes(bytes) => (bytes.clone(), None),
            AttachmentSource::Path(path) => {
                self.guard.check(&self.ctx, path)?;
                let bytes = fs::read(path)
                    .map_err(|err| Error::ReadAttachmentError(err, path.clone()))?;
                let mime = match &attachment.mime {
                    Some(_) => None,
                    None => self.sniffer.sniff_path(path),
                };
                (bytes, mime)
            }
        };

        let mime = attachment
            .mime
            .clone()
            .or(sniffed)
            .unwrap_or_else(|| self.sniffer.sniff_bytes(&content));
        let mime = if mime.trim().is_empty() {
            DEFAULT_MIME.to_owned()
        } else {
            mime
        };

        Ok(ResolvedPart {
            name: attachment.name.clone(),
            mime,
            encoding: attachment.encoding,
            disposition: attachment.disposition,
            cid: attachment.cid.clone(),
            content,
        })
    }

    fn header_fields(&self, msg: &Message) -> Result<HeaderFields> {
        let from = match msg.sender() {
            Some(from) => from.clone(),
            None => match &self.ctx.server_name {
                Some(server) => Mailbox::new(Some("No Reply"), format!("noreply@{server}")),
                None => return Err(Error::MissingSenderError),
            },
        };

        let return_path = msg
            .return_path()
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| from.addr.clone());

        Ok(HeaderFields {
            return_path,
            from,
            reply_to: msg.reply_to().to_vec(),
            to: msg.to().to_vec(),
            cc: msg.cc().to_vec(),
            bcc: msg.bcc().to_vec(),
            subject: msg.subject().to_owned(),
            priority: msg.priority(),
            confirm_reading: msg.confirm_reading().cloned(),
            confirm_receipt: msg.confirm_receipt().cloned(),
            custom: msg.custom_headers().to_vec(),
        })
    }

    fn stamps(&self) -> HeaderStamps {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let seed = md5::compute(format!("{nanos}{}", rand::random::<u64>()));

        HeaderStamps {
            date: chrono::Local::now().to_rfc2822(),
            message_id: format!("<{seed:x}@{}>", self.ctx.hostname),
            originating_ip: self.ctx.originating_ip,
        }
    }

    /// Computes the structural type of the given message.
    pub fn message_type(&self, msg: &Message) -> Result<MessageType> {
        Ok(self.prepare(msg)?.classify())
    }

    /// Composes the given message.
    ///
    /// Any file that cannot be read aborts the composition.
    #[instrument(skip_all)]
    pub fn compose(&self, msg: &Message) -> Result<Composition> {
        let fields = self.header_fields(msg)?;
        let prepared = self.prepare(msg)?;
        let message_type = prepared.classify();
        debug!(%message_type, "classified message");

        let parts = prepared
            .attachments
            .iter()
            .map(|attachment| self.resolve(attachment))
            .collect::<Result<Vec<_>>>()?;

        let parts = BodyParts {
            text: prepared.text,
            html: prepared.html,
            parts,
        };

        let boundaries = msg.boundaries().clone();
        let body = body::render_body(&parts, message_type, &boundaries, self.word_wrap);
        let stamps = self.stamps();

        info!(
            message_id = stamps.message_id,
            %message_type,
            bytes = body.len(),
            "composed message"
        );

        Ok(Composition {
            message_type,
            boundaries,
            fields,
            stamps,
            body,
        })
    }
}

fn calendar_file_name(path: &Path) -> String {
    let name = file_name(path);
    if name.is_empty() {
        String::from("calendar.ics")
    } else {
        name
    }
}
