//! # Request context
//!
//! Module dedicated to the [`RequestContext`], which carries every
//! piece of environment information the composer, the path guard and
//! the transports need. Nothing is looked up implicitly: whatever is
//! not in the context is not used.

use std::{net::IpAddr, path::PathBuf};

use tracing::debug;

/// Host name used when the system one cannot be determined.
pub const DEFAULT_HOSTNAME: &str = "localhost.localdomain";

/// The request context.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub struct RequestContext {
    /// The local host name.
    ///
    /// Used as the right part of generated Message-Ids and as the
    /// EHLO argument.
    pub hostname: String,

    /// The name of the server the message originates from.
    ///
    /// Used to build the default sender `noreply@<server-name>` and
    /// as a fallback domain for the mail exchanger lookup.
    pub server_name: Option<String>,

    /// The IP address of the client that triggered the message.
    ///
    /// When defined, it is exposed through the `X-Originating-IP`
    /// header.
    pub originating_ip: Option<IpAddr>,

    /// Directory local files must live in.
    ///
    /// When defined, the default path guard rejects any file outside
    /// of it.
    pub document_root: Option<PathBuf>,
}

impl RequestContext {
    pub fn new(hostname: impl ToString) -> Self {
        Self {
            hostname: hostname.to_string(),
            server_name: None,
            originating_ip: None,
            document_root: None,
        }
    }

    pub fn with_server_name(mut self, name: impl ToString) -> Self {
        self.server_name = Some(name.to_string());
        self
    }

    pub fn with_originating_ip(mut self, ip: impl Into<IpAddr>) -> Self {
        self.originating_ip = Some(ip.into());
        self
    }

    pub fn with_document_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.document_root = Some(root.into());
        self
    }

    /// Builds a context from the system host name.
    pub fn from_system() -> Self {
        let hostname = gethostname::gethostname()
            .into_string()
            .ok()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| {
                debug!("cannot get system host name, using {DEFAULT_HOSTNAME}");
                DEFAULT_HOSTNAME.to_owned()
            });

        Self::new(hostname)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::from_system()
    }
}
