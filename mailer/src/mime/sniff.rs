//! # MIME type sniffing
//!
//! Module dedicated to the detection of attachments MIME type.

use std::path::Path;

use tracing::trace;

/// The MIME type sniffer collaborator.
pub trait MimeSniffer: Send + Sync {
    /// Detects the MIME type of the file at the given path.
    fn sniff_path(&self, path: &Path) -> Option<String>;

    /// Detects the MIME type of the given content.
    fn sniff_bytes(&self, bytes: &[u8]) -> String;
}

/// The default sniffer, based on magic numbers.
#[derive(Clone, Debug, Default)]
pub struct MagicSniffer;

impl MimeSniffer for MagicSniffer {
    fn sniff_path(&self, path: &Path) -> Option<String> {
        let mime = tree_magic_mini::from_filepath(path)?;
        trace!(?path, mime, "sniffed mime type from path");
        Some(mime.to_owned())
    }

    fn sniff_bytes(&self, bytes: &[u8]) -> String {
        let mime = tree_magic_mini::from_u8(bytes);
        trace!(mime, "sniffed mime type from bytes");
        mime.to_owned()
    }
}
