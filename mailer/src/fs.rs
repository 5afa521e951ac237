//! # File system
//!
//! Module dedicated to file system safety. Every local file read by
//! the composer (attachments, HTML body, images referenced by the
//! HTML body, calendar) first goes through a [`PathGuard`].

use std::{fs, path::Path};

use tracing::debug;

use crate::{
    context::RequestContext,
    mime::{Error, Result},
};

/// The path safety collaborator.
pub trait PathGuard: Send + Sync {
    /// Checks that the given path can be read safely.
    fn check(&self, ctx: &RequestContext, path: &Path) -> Result<()>;
}

/// The default path guard.
///
/// The path must point to a regular file. If the context defines a
/// document root, the canonical path must also live under it.
#[derive(Clone, Debug, Default)]
pub struct FsPathGuard;

impl PathGuard for FsPathGuard {
    fn check(&self, ctx: &RequestContext, path: &Path) -> Result<()> {
        let metadata =
            fs::metadata(path).map_err(|err| Error::GetFileMetadataError(err, path.to_owned()))?;

        if !metadata.is_file() {
            return Err(Error::NotAFileError(path.to_owned()));
        }

        if let Some(root) = &ctx.document_root {
            let root = root
                .canonicalize()
                .map_err(|err| Error::CanonicalizePathError(err, root.to_owned()))?;
            let canonical = path
                .canonicalize()
                .map_err(|err| Error::CanonicalizePathError(err, path.to_owned()))?;

            if !canonical.starts_with(&root) {
                debug!(?canonical, ?root, "path escapes document root");
                return Err(Error::UnsafePathError(path.to_owned(), root));
            }
        }

        Ok(())
    }
}
