//! # HTML
//!
//! Module dedicated to the conversion of local images referenced by
//! an HTML body into inline attachments.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use crate::{
    context::RequestContext,
    fs::PathGuard,
    message::{attachment::file_name, Attachment},
};

/// Regular expression matching `src` and `background` attributes.
static IMAGE_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\b(src|background)="([^"]*)""#).unwrap());

/// Regular expression matching values carrying a URL scheme
/// (`http:`, `cid:`, `data:`…).
static URL_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*:").unwrap());

/// Computes the content-id of an embedded image from its file name.
pub fn image_cid(name: &str) -> String {
    format!("{:x}", md5::compute(name))
}

fn is_local(url: &str) -> bool {
    !(url.is_empty() || url.starts_with("//") || url.starts_with('#') || URL_SCHEME.is_match(url))
}

/// Embeds the local images referenced by the given HTML.
///
/// Every local reference accepted by the path guard is registered
/// once as an inline attachment, and every occurrence of it is
/// rewritten as `cid:<hash>`. References that are URLs or that the
/// guard rejects are left untouched.
pub fn embed_images(
    html: &str,
    base_dir: Option<&Path>,
    ctx: &RequestContext,
    guard: &dyn PathGuard,
) -> (String, Vec<Attachment>) {
    let mut cids: HashMap<String, String> = HashMap::new();
    let mut attachments = Vec::new();
    let mut seen_paths: HashMap<PathBuf, String> = HashMap::new();

    for captures in IMAGE_ATTR.captures_iter(html) {
        let url = &captures[2];

        if !is_local(url) || cids.contains_key(url) {
            continue;
        }

        let path = match base_dir {
            Some(dir) => dir.join(url),
            None => PathBuf::from(url),
        };

        if let Err(err) = guard.check(ctx, &path) {
            debug!(url, ?err, "skip image embedding");
            continue;
        }

        if let Some(cid) = seen_paths.get(&path) {
            cids.insert(url.to_owned(), cid.clone());
            continue;
        }

        let name = file_name(&path);
        let cid = image_cid(&name);
        debug!(url, cid, "embed local image");

        attachments.push(Attachment::from_path(&path).with_name(&name).inline(&cid));
        seen_paths.insert(path, cid.clone());
        cids.insert(url.to_owned(), cid);
    }

    let html = IMAGE_ATTR.replace_all(html, |captures: &Captures| match cids.get(&captures[2]) {
        Some(cid) => format!("{}=\"cid:{cid}\"", &captures[1]),
        None => captures[0].to_owned(),
    });

    (html.to_string(), attachments)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::{fs::FsPathGuard, message::Disposition};

    #[test_log::test]
    fn embed_local_image() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("pic.png"), b"\x89PNG\r\n\x1a\n").unwrap();

        let ctx = RequestContext::new("localhost");
        let html = r#"<p><img src="pic.png"><img SRC="pic.png"></p>"#;
        let (html, attachments) = embed_images(html, Some(dir.path()), &ctx, &FsPathGuard);

        let cid = image_cid("pic.png");
        assert_eq!(html, format!(r#"<p><img src="cid:{cid}"><img SRC="cid:{cid}"></p>"#));
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].disposition, Disposition::Inline);
        assert_eq!(attachments[0].cid.as_deref(), Some(cid.as_str()));
        assert_eq!(attachments[0].name, "pic.png");
    }

    #[test_log::test]
    fn skip_urls_and_missing_files() {
        let dir = tempdir().unwrap();
        let ctx = RequestContext::new("localhost");
        let html = concat!(
            r#"<img src="https://example.com/a.png">"#,
            r#"<img src="cid:already">"#,
            r#"<td background="missing.png">"#,
        );
        let (converted, attachments) = embed_images(html, Some(dir.path()), &ctx, &FsPathGuard);

        assert_eq!(converted, html);
        assert!(attachments.is_empty());
    }
}
