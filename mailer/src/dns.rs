//! # DNS
//!
//! Module dedicated to mail exchanger discovery. When no SMTP host is
//! configured, the message is delivered to the mail exchanger of the
//! sender domain.

use std::{cmp::Ordering, ops::Deref};

use hickory_resolver::{
    config::{ResolverConfig, ResolverOpts},
    proto::rr::rdata::MX,
    Resolver,
};
use tracing::{debug, trace};

/// The mail exchanger lookup collaborator.
pub trait MxResolver: Send + Sync {
    /// Returns the preferred mail exchanger host of the given domain,
    /// if any.
    fn resolve(&self, domain: &str) -> Option<String>;
}

/// Sortable wrapper around a MX record.
///
/// This wrapper allows MX records to be sorted by preference.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MxRecord(MX);

impl MxRecord {
    pub fn new(record: MX) -> Self {
        Self(record)
    }

    /// Returns the exchange host name, without its trailing dot.
    pub fn host(&self) -> String {
        self.exchange().to_utf8().trim_end_matches('.').to_owned()
    }
}

impl Deref for MxRecord {
    type Target = MX;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Ord for MxRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.preference().cmp(&other.preference())
    }
}

impl PartialOrd for MxRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Mail exchanger lookup based on the blocking hickory resolver.
///
/// The system resolver configuration is used when available,
/// otherwise the hickory defaults.
#[derive(Clone, Debug, Default)]
pub struct DnsMxResolver;

impl DnsMxResolver {
    fn resolver() -> Option<Resolver> {
        match Resolver::from_system_conf() {
            Ok(resolver) => Some(resolver),
            Err(err) => {
                debug!(?err, "cannot read system resolver config, using defaults");
                Resolver::new(ResolverConfig::default(), ResolverOpts::default()).ok()
            }
        }
    }
}

impl MxResolver for DnsMxResolver {
    fn resolve(&self, domain: &str) -> Option<String> {
        let resolver = Self::resolver()?;

        let mut records: Vec<MxRecord> = match resolver.mx_lookup(domain) {
            Ok(lookup) => lookup.into_iter().map(MxRecord::new).collect(),
            Err(err) => {
                debug!(domain, ?err, "cannot look up mx records");
                return None;
            }
        };

        debug!("{domain}: discovered {} MX record(s)", records.len());
        trace!("{records:#?}");

        records.sort();

        let host = records.first().map(MxRecord::host)?;
        debug!("{domain}: best MX domain found: {host}");
        Some(host)
    }
}
