//! # Address
//!
//! Module dedicated to email addresses. It contains the typed
//! [`AddressInput`] accepted by the message builder, the normalized
//! [`Mailbox`] and the [`AddressParser`] collaborator turning the
//! former into the latter.

use std::{fmt, str::FromStr};

use email_address::EmailAddress;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{Error, Result};
use crate::mime::header::{encode_word, sanitize};

/// Regular expression used to extract an address out of a free-form
/// string.
static ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());

/// The address input.
///
/// Addresses are given either as free-form strings (`"Name
/// <addr@host>"`, `"addr@host"`, or several of them separated by
/// commas), or as explicit name/address pairs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AddressInput {
    List(Vec<String>),
    Pairs(Vec<(String, String)>),
}

impl From<&str> for AddressInput {
    fn from(addr: &str) -> Self {
        Self::List(vec![addr.to_owned()])
    }
}

impl From<String> for AddressInput {
    fn from(addr: String) -> Self {
        Self::List(vec![addr])
    }
}

impl From<Vec<&str>> for AddressInput {
    fn from(addrs: Vec<&str>) -> Self {
        Self::List(addrs.into_iter().map(ToOwned::to_owned).collect())
    }
}

impl From<Vec<String>> for AddressInput {
    fn from(addrs: Vec<String>) -> Self {
        Self::List(addrs)
    }
}

impl From<(&str, &str)> for AddressInput {
    fn from((name, addr): (&str, &str)) -> Self {
        Self::Pairs(vec![(name.to_owned(), addr.to_owned())])
    }
}

impl From<Vec<(&str, &str)>> for AddressInput {
    fn from(pairs: Vec<(&str, &str)>) -> Self {
        Self::Pairs(
            pairs
                .into_iter()
                .map(|(name, addr)| (name.to_owned(), addr.to_owned()))
                .collect(),
        )
    }
}

impl From<Vec<(String, String)>> for AddressInput {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self::Pairs(pairs)
    }
}

/// A normalized mailbox: an optional display name plus a bare route
/// address.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub struct Mailbox {
    pub name: Option<String>,
    pub addr: String,
}

impl Mailbox {
    pub fn new(name: Option<impl ToString>, addr: impl ToString) -> Self {
        let name = name
            .map(|name| name.to_string())
            .filter(|name| !name.trim().is_empty());

        Self {
            name,
            addr: addr.to_string(),
        }
    }

    /// Returns the bare route address.
    pub fn route(&self) -> &str {
        &self.addr
    }

    /// Returns the domain part of the address.
    pub fn domain(&self) -> Option<&str> {
        self.addr.rsplit_once('@').map(|(_, domain)| domain)
    }
}

impl fmt::Display for Mailbox {
    /// Formats the mailbox the RFC 5322 way, ready to be used as a
    /// header value.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            None => write!(f, "<{}>", self.addr),
            Some(name) if !name.is_ascii() => write!(f, "{} <{}>", encode_word(name), self.addr),
            Some(name) if name.contains(|c: char| "()<>[]:;@\\,.\"".contains(c)) => {
                let name = name.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "\"{name}\" <{}>", self.addr)
            }
            Some(name) => write!(f, "{name} <{}>", self.addr),
        }
    }
}

/// The address parser collaborator.
///
/// Turns free-form address input into validated mailboxes.
pub trait AddressParser: Send + Sync {
    fn parse(&self, input: &AddressInput) -> Result<Vec<Mailbox>>;
}

/// The default address parser.
///
/// Extracts the first address-looking token of each comma-separated
/// item, validates it with [`email_address`], and keeps whatever
/// surrounds it as the display name.
#[derive(Clone, Debug, Default)]
pub struct DefaultAddressParser;

impl DefaultAddressParser {
    fn parse_addr(addr: &str) -> Result<String> {
        let addr = addr
            .trim()
            .trim_start_matches('<')
            .trim_end_matches('>')
            .trim();

        match EmailAddress::from_str(addr) {
            Ok(_) => Ok(addr.to_owned()),
            Err(err) => {
                debug!(addr, ?err, "invalid email address");
                Err(Error::InvalidAddressError(addr.to_owned()))
            }
        }
    }

    fn parse_item(item: &str) -> Result<Option<Mailbox>> {
        let item = item.trim();

        if item.is_empty() {
            return Ok(None);
        }

        let Some(found) = ADDRESS.find(item) else {
            return Err(Error::InvalidAddressError(item.to_owned()));
        };

        let addr = Self::parse_addr(found.as_str())?;

        let name = item.replace(found.as_str(), "");
        let name = name.replace(['<', '>', '[', ']', '"', '\t'], "");
        let name = sanitize(&name);

        Ok(Some(Mailbox::new(Some(name), addr)))
    }
}

impl AddressParser for DefaultAddressParser {
    fn parse(&self, input: &AddressInput) -> Result<Vec<Mailbox>> {
        let mut mailboxes = Vec::new();

        match input {
            AddressInput::List(items) => {
                for item in items.iter().flat_map(|items| items.split(',')) {
                    if let Some(mailbox) = Self::parse_item(item)? {
                        mailboxes.push(mailbox);
                    }
                }
            }
            AddressInput::Pairs(pairs) => {
                for (name, addr) in pairs {
                    let addr = Self::parse_addr(addr)?;
                    let name = sanitize(&name.replace(['<', '>', '"'], ""));
                    mailboxes.push(Mailbox::new(Some(name), addr));
                }
            }
        }

        Ok(mailboxes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn parse_free_form_list() {
        let input = AddressInput::from("John Doe <john@example.com>, jane@example.org");
        let mailboxes = DefaultAddressParser.parse(&input).unwrap();

        assert_eq!(
            mailboxes,
            vec![
                Mailbox::new(Some("John Doe"), "john@example.com"),
                Mailbox::new(None::<String>, "jane@example.org"),
            ]
        );
        assert_eq!(mailboxes[0].to_string(), "John Doe <john@example.com>");
        assert_eq!(mailboxes[1].to_string(), "<jane@example.org>");
    }

    #[test_log::test]
    fn parse_pairs() {
        let input = AddressInput::from(vec![("Doe, John", "john@example.com")]);
        let mailboxes = DefaultAddressParser.parse(&input).unwrap();

        assert_eq!(mailboxes[0].route(), "john@example.com");
        assert_eq!(mailboxes[0].domain(), Some("example.com"));
        assert_eq!(mailboxes[0].to_string(), "\"Doe, John\" <john@example.com>");
    }

    #[test_log::test]
    fn parse_invalid_address() {
        let input = AddressInput::from("not an address");
        let err = DefaultAddressParser.parse(&input).unwrap_err();
        assert!(matches!(err, Error::InvalidAddressError(_)));

        let input = AddressInput::from(vec![("Name", "bad@@host")]);
        let err = DefaultAddressParser.parse(&input).unwrap_err();
        assert!(matches!(err, Error::InvalidAddressError(_)));
    }

    #[test_log::test]
    fn format_non_ascii_name() {
        let mailbox = Mailbox::new(Some("Zoë"), "zoe@example.com");
        assert_eq!(mailbox.to_string(), "=?UTF-8?B?Wm/Dqw==?= <zoe@example.com>");
    }
}
