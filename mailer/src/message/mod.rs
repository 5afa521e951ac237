//! # Message
//!
//! Module dedicated to the message model. A [`Message`] is built
//! incrementally using setters, then handed over to the
//! [`MimeComposer`](crate::mime::MimeComposer) which renders it
//! without altering it.

pub mod address;
pub mod attachment;

use std::{fmt, path::PathBuf, sync::Arc};

use thiserror::Error;
use tracing::debug;

#[doc(inline)]
pub use self::{
    address::{AddressInput, AddressParser, DefaultAddressParser, Mailbox},
    attachment::{Attachment, AttachmentSource, Disposition, TransferEncoding},
};
use crate::{mime::BoundarySet, ErrorKind};

/// The global `Result` alias of the module.
pub type Result<T> = std::result::Result<T, Error>;

/// The global `Error` enum of the module.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot parse email address {0}")]
    InvalidAddressError(String),
    #[error("cannot set priority {0}: expected a value between 0 and 5")]
    InvalidPriorityError(u8),
    #[error("cannot add custom header: invalid header name {0}")]
    InvalidHeaderNameError(String),
    #[error("cannot parse custom header {0}: missing colon")]
    ParseRawHeaderError(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// The HTML body source.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HtmlSource {
    Inline(String),
    File(PathBuf),
}

/// The HTML body.
///
/// Local images referenced by the HTML content are resolved relative
/// to the base directory, then embedded into the message as inline
/// attachments.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HtmlBody {
    pub source: HtmlSource,
    pub base_dir: Option<PathBuf>,
}

/// The calendar source.
///
/// A calendar is always rendered as an attachment named
/// `calendar.ics`, unless it comes from a file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CalendarSource {
    Inline(String),
    File(PathBuf),
}

/// The message structure.
#[derive(Clone)]
pub struct Message {
    parser: Arc<dyn AddressParser>,
    boundaries: BoundarySet,

    from: Option<Mailbox>,
    to: Vec<Mailbox>,
    cc: Vec<Mailbox>,
    bcc: Vec<Mailbox>,
    routes: Vec<String>,
    reply_to: Vec<Mailbox>,
    return_path: Option<String>,
    confirm_reading: Option<Mailbox>,
    confirm_receipt: Option<Mailbox>,

    subject: String,
    priority: u8,
    headers: Vec<(String, String)>,

    text: String,
    html: Option<HtmlBody>,
    calendar: Option<CalendarSource>,
    attachments: Vec<Attachment>,
}

impl Message {
    /// Creates an empty message using the default address parser.
    pub fn new() -> Self {
        Self::new_with_address_parser(DefaultAddressParser)
    }

    pub fn new_with_address_parser(parser: impl AddressParser + 'static) -> Self {
        Self {
            parser: Arc::new(parser),
            boundaries: BoundarySet::generate(),
            from: None,
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            routes: Vec::new(),
            reply_to: Vec::new(),
            return_path: None,
            confirm_reading: None,
            confirm_receipt: None,
            subject: String::new(),
            priority: 0,
            headers: Vec::new(),
            text: String::new(),
            html: None,
            calendar: None,
            attachments: Vec::new(),
        }
    }

    fn parse(&self, input: impl Into<AddressInput>) -> Result<Vec<Mailbox>> {
        self.parser.parse(&input.into())
    }

    fn parse_one(&self, input: impl Into<AddressInput>) -> Result<Mailbox> {
        let input = input.into();
        let mut mailboxes = self.parser.parse(&input)?.into_iter();
        mailboxes
            .next()
            .ok_or_else(|| Error::InvalidAddressError(format!("{input:?}")))
    }

    fn add_recipients(&mut self, input: impl Into<AddressInput>) -> Result<Vec<Mailbox>> {
        let mailboxes = self.parse(input)?;
        let routes = mailboxes.iter().map(|mailbox| mailbox.addr.clone());
        self.routes.extend(routes);
        Ok(mailboxes)
    }

    /// Sets the sender. Only the first address of the input is kept.
    pub fn set_from(&mut self, input: impl Into<AddressInput>) -> Result<()> {
        self.from = Some(self.parse_one(input)?);
        Ok(())
    }

    pub fn add_to(&mut self, input: impl Into<AddressInput>) -> Result<()> {
        let mailboxes = self.add_recipients(input)?;
        self.to.extend(mailboxes);
        Ok(())
    }

    pub fn add_cc(&mut self, input: impl Into<AddressInput>) -> Result<()> {
        let mailboxes = self.add_recipients(input)?;
        self.cc.extend(mailboxes);
        Ok(())
    }

    pub fn add_bcc(&mut self, input: impl Into<AddressInput>) -> Result<()> {
        let mailboxes = self.add_recipients(input)?;
        self.bcc.extend(mailboxes);
        Ok(())
    }

    pub fn add_reply_to(&mut self, input: impl Into<AddressInput>) -> Result<()> {
        let mailboxes = self.parse(input)?;
        self.reply_to.extend(mailboxes);
        Ok(())
    }

    /// Sets the bounce address. Defaults to the sender address.
    pub fn set_return_path(&mut self, input: impl Into<AddressInput>) -> Result<()> {
        self.return_path = Some(self.parse_one(input)?.addr);
        Ok(())
    }

    /// Asks the recipient client to send back a reading
    /// notification to the given address.
    pub fn set_confirm_reading(&mut self, input: impl Into<AddressInput>) -> Result<()> {
        self.confirm_reading = Some(self.parse_one(input)?);
        Ok(())
    }

    /// Asks the recipient server to send back a delivery receipt to
    /// the given address.
    pub fn set_confirm_receipt(&mut self, input: impl Into<AddressInput>) -> Result<()> {
        self.confirm_receipt = Some(self.parse_one(input)?);
        Ok(())
    }

    pub fn set_subject(&mut self, subject: impl ToString) {
        self.subject = subject.to_string();
    }

    pub fn with_subject(mut self, subject: impl ToString) -> Self {
        self.set_subject(subject);
        self
    }

    /// Sets the priority, from 1 (highest) to 5 (lowest). A priority
    /// of 0 unsets it.
    pub fn set_priority(&mut self, priority: u8) -> Result<()> {
        if priority > 5 {
            return Err(Error::InvalidPriorityError(priority));
        }

        self.priority = priority;
        Ok(())
    }

    /// Adds a custom header. Headers are rendered in insertion
    /// order, after the standard ones.
    pub fn add_custom_header(&mut self, name: impl ToString, value: impl ToString) -> Result<()> {
        let name = name.to_string().trim().to_owned();

        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_graphic() && c != ':');

        if !valid {
            return Err(Error::InvalidHeaderNameError(name));
        }

        self.headers.push((name, value.to_string()));
        Ok(())
    }

    /// Adds a custom header from its raw `Name: value` form.
    pub fn add_raw_custom_header(&mut self, header: impl AsRef<str>) -> Result<()> {
        let header = header.as_ref();
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| Error::ParseRawHeaderError(header.to_owned()))?;
        self.add_custom_header(name, value.trim())
    }

    pub fn set_text(&mut self, text: impl ToString) {
        self.text = text.to_string();
    }

    pub fn with_text(mut self, text: impl ToString) -> Self {
        self.set_text(text);
        self
    }

    /// Sets the HTML body. Local images it references are resolved
    /// against the current directory.
    pub fn set_html(&mut self, html: impl ToString) {
        self.html = Some(HtmlBody {
            source: HtmlSource::Inline(html.to_string()),
            base_dir: None,
        });
    }

    pub fn with_html(mut self, html: impl ToString) -> Self {
        self.set_html(html);
        self
    }

    /// Sets the HTML body. Local images it references are resolved
    /// against the given directory.
    pub fn set_html_with_base_dir(&mut self, html: impl ToString, dir: impl Into<PathBuf>) {
        self.html = Some(HtmlBody {
            source: HtmlSource::Inline(html.to_string()),
            base_dir: Some(dir.into()),
        });
    }

    /// Sets the HTML body from a file, read at composition time.
    /// Local images it references are resolved against the directory
    /// of the file.
    pub fn set_html_file(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        let base_dir = path.parent().map(ToOwned::to_owned);
        self.html = Some(HtmlBody {
            source: HtmlSource::File(path),
            base_dir,
        });
    }

    pub fn set_calendar(&mut self, calendar: CalendarSource) {
        self.calendar = Some(calendar);
    }

    pub fn add_attachment(&mut self, attachment: Attachment) {
        debug!(name = attachment.name, disposition = %attachment.disposition, "add attachment");
        self.attachments.push(attachment);
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.add_attachment(attachment);
        self
    }

    /// Adds an image from the file system as an inline attachment,
    /// referenced by the given content-id.
    pub fn add_embedded_image(&mut self, path: impl Into<PathBuf>, cid: impl ToString) {
        self.add_attachment(Attachment::from_path(path).inline(cid));
    }

    /// Same as [`Message::add_embedded_image`], but also offers the
    /// image as a downloadable attachment under the given name.
    pub fn add_embedded_image_with_copy(
        &mut self,
        path: impl Into<PathBuf>,
        cid: impl ToString,
        name: impl ToString,
    ) {
        let path = path.into();
        self.add_embedded_image(path.clone(), cid);
        self.add_attachment(Attachment::from_path(path).with_name(name));
    }

    /// Adds an in-memory attachment.
    pub fn add_string_attachment(&mut self, bytes: impl Into<Vec<u8>>, name: impl ToString) {
        self.add_attachment(Attachment::from_bytes(bytes, name));
    }

    /// Generates a brand new set of boundaries, required before
    /// sending the same message twice.
    pub fn reset_boundaries(&mut self) {
        self.boundaries = BoundarySet::generate();
    }

    pub fn boundaries(&self) -> &BoundarySet {
        &self.boundaries
    }

    pub fn sender(&self) -> Option<&Mailbox> {
        self.from.as_ref()
    }

    pub fn to(&self) -> &[Mailbox] {
        &self.to
    }

    pub fn cc(&self) -> &[Mailbox] {
        &self.cc
    }

    pub fn bcc(&self) -> &[Mailbox] {
        &self.bcc
    }

    /// Returns the bare addresses of all recipients (to, cc and bcc)
    /// in the order they were added.
    pub fn routes(&self) -> &[String] {
        &self.routes
    }

    pub fn reply_to(&self) -> &[Mailbox] {
        &self.reply_to
    }

    pub fn return_path(&self) -> Option<&str> {
        self.return_path.as_deref()
    }

    pub fn confirm_reading(&self) -> Option<&Mailbox> {
        self.confirm_reading.as_ref()
    }

    pub fn confirm_receipt(&self) -> Option<&Mailbox> {
        self.confirm_receipt.as_ref()
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn custom_headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn html(&self) -> Option<&HtmlBody> {
        self.html.as_ref()
    }

    pub fn calendar(&self) -> Option<&CalendarSource> {
        self.calendar.as_ref()
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("boundaries", &self.boundaries)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("cc", &self.cc)
            .field("bcc", &self.bcc)
            .field("subject", &self.subject)
            .field("priority", &self.priority)
            .field("headers", &self.headers)
            .field("html", &self.html)
            .field("calendar", &self.calendar)
            .field("attachments", &self.attachments)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn routes_follow_call_order() {
        let mut msg = Message::new();
        msg.add_bcc("hidden@example.com").unwrap();
        msg.add_to("A <a@example.com>, b@example.com").unwrap();
        msg.add_cc(vec![("C", "c@example.com")]).unwrap();

        assert_eq!(
            msg.routes(),
            ["hidden@example.com", "a@example.com", "b@example.com", "c@example.com"]
        );
        assert_eq!(msg.to().len(), 2);
        assert_eq!(msg.bcc()[0].addr, "hidden@example.com");
    }

    #[test_log::test]
    fn priority_range() {
        let mut msg = Message::new();
        msg.set_priority(1).unwrap();
        assert_eq!(msg.priority(), 1);
        msg.set_priority(0).unwrap();
        assert_eq!(msg.priority(), 0);
        assert!(matches!(
            msg.set_priority(6),
            Err(Error::InvalidPriorityError(6))
        ));
    }

    #[test_log::test]
    fn custom_headers() {
        let mut msg = Message::new();
        msg.add_raw_custom_header("X-Campaign: spring").unwrap();
        msg.add_custom_header("X-Other", "value").unwrap();

        assert_eq!(
            msg.custom_headers(),
            [
                ("X-Campaign".to_owned(), "spring".to_owned()),
                ("X-Other".to_owned(), "value".to_owned()),
            ]
        );

        assert!(matches!(
            msg.add_custom_header("Bad Name", "value"),
            Err(Error::InvalidHeaderNameError(_))
        ));
        assert!(matches!(
            msg.add_raw_custom_header("no colon"),
            Err(Error::ParseRawHeaderError(_))
        ));
    }

    #[test_log::test]
    fn embedded_image_with_copy() {
        let mut msg = Message::new();
        msg.add_embedded_image_with_copy("/img/logo.png", "logo", "logo-full.png");

        let attachments = msg.attachments();
        assert_eq!(attachments.len(), 2);

        assert!(attachments[0].is_inline());
        assert_eq!(attachments[0].cid.as_deref(), Some("logo"));
        assert_eq!(attachments[0].name, "logo.png");

        assert!(!attachments[1].is_inline());
        assert_eq!(attachments[1].cid, None);
        assert_eq!(attachments[1].name, "logo-full.png");
        assert_eq!(attachments[1].path(), attachments[0].path());
    }

    #[test_log::test]
    fn reset_boundaries() {
        let mut msg = Message::new();
        let before = msg.boundaries().clone();
        msg.reset_boundaries();
        assert_ne!(&before, msg.boundaries());
    }
}
