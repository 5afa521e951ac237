//! # Attachment
//!
//! Module dedicated to message attachments.

use std::{
    fmt,
    path::{Path, PathBuf},
};

/// Where the attachment content comes from.
#[derive(Clone, Eq, PartialEq)]
pub enum AttachmentSource {
    /// The content is read from the file system at composition time.
    Path(PathBuf),
    /// The content is already in memory.
    Bytes(Vec<u8>),
}

impl fmt::Debug for AttachmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
        }
    }
}

/// The attachment disposition.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Disposition {
    /// Displayed within the message body, referenced by its
    /// content-id.
    Inline,
    /// Offered as a downloadable file.
    #[default]
    Attachment,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline => write!(f, "inline"),
            Self::Attachment => write!(f, "attachment"),
        }
    }
}

/// The attachment content transfer encoding.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TransferEncoding {
    #[default]
    Base64,
    SevenBit,
    EightBit,
    Binary,
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base64 => write!(f, "base64"),
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// The attachment structure.
///
/// When no MIME type is given, it is sniffed from the content at
/// composition time. When no encoding is given, the content is
/// rendered as it is, without `Content-Transfer-Encoding` header.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Attachment {
    pub source: AttachmentSource,
    pub name: String,
    pub encoding: Option<TransferEncoding>,
    pub mime: Option<String>,
    pub disposition: Disposition,
    pub cid: Option<String>,
}

impl Attachment {
    /// Creates a file attachment, named after the file name of the
    /// given path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = file_name(&path);

        Self {
            source: AttachmentSource::Path(path),
            name,
            encoding: Some(TransferEncoding::Base64),
            mime: None,
            disposition: Disposition::Attachment,
            cid: None,
        }
    }

    /// Creates an in-memory attachment.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, name: impl ToString) -> Self {
        Self {
            source: AttachmentSource::Bytes(bytes.into()),
            name: name.to_string(),
            encoding: Some(TransferEncoding::Base64),
            mime: None,
            disposition: Disposition::Attachment,
            cid: None,
        }
    }

    pub fn with_name(mut self, name: impl ToString) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_mime(mut self, mime: impl ToString) -> Self {
        self.mime = Some(mime.to_string());
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<Option<TransferEncoding>>) -> Self {
        self.encoding = encoding.into();
        self
    }

    /// Turns the attachment into an inline one, referenced by the
    /// given content-id.
    pub fn inline(mut self, cid: impl ToString) -> Self {
        self.disposition = Disposition::Inline;
        self.cid = Some(cid.to_string());
        self
    }

    pub fn is_inline(&self) -> bool {
        self.disposition == Disposition::Inline
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            AttachmentSource::Path(path) => Some(path),
            AttachmentSource::Bytes(_) => None,
        }
    }
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}
