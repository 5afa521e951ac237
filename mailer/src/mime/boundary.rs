//! # Boundary
//!
//! Module dedicated to multipart boundaries.

use std::time::{SystemTime, UNIX_EPOCH};

/// The set of boundaries of a message, one per multipart level.
///
/// All three tokens share the same random seed and only differ by
/// their prefix. Tokens start with `=_`, a sequence that can neither
/// appear in base64 nor in quoted-printable content.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BoundarySet {
    outer: String,
    related: String,
    alternative: String,
}

impl BoundarySet {
    /// Generates a new set of boundaries from the current time and a
    /// random value.
    pub fn generate() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let seed = format!("{:x}", md5::compute(format!("{nanos}{}", rand::random::<u64>())));
        Self::from_seed(&seed)
    }

    /// Builds a set of boundaries from the given seed.
    pub fn from_seed(seed: &str) -> Self {
        Self {
            outer: format!("=_Mixed_{seed}"),
            related: format!("=_Related_{seed}"),
            alternative: format!("=_Alternative_{seed}"),
        }
    }

    /// The boundary of the outer `multipart/mixed` container.
    pub fn outer(&self) -> &str {
        &self.outer
    }

    /// The boundary of the `multipart/related` container.
    pub fn related(&self) -> &str {
        &self.related
    }

    /// The boundary of the innermost `multipart/alternative`
    /// container.
    pub fn alternative(&self) -> &str {
        &self.alternative
    }
}
