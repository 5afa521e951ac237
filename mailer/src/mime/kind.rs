//! # Message type
//!
//! Module dedicated to the structural classification of a message.

use std::fmt;

/// The message type.
///
/// The message type is derived from the message content and drives
/// the multipart nesting of the rendered message. Its canonical
/// string form is the alphabetically sorted, pipe-joined list of the
/// tags `attachment`, `inline` and `message`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct MessageType {
    pub message: bool,
    pub inline: bool,
    pub attachment: bool,
}

impl MessageType {
    /// Classifies a message from the presence of a body and the
    /// dispositions of its attachments.
    ///
    /// When nothing applies, the message is considered `inline`.
    pub fn classify(has_body: bool, has_inline: bool, has_attachment: bool) -> Self {
        let mut kind = Self {
            message: has_body,
            inline: has_inline,
            attachment: has_attachment,
        };

        if !(kind.message || kind.inline || kind.attachment) {
            kind.inline = true;
        }

        kind
    }

    /// Returns `true` if the message needs an outer
    /// `multipart/mixed` container.
    pub fn is_mixed(&self) -> bool {
        self.attachment
    }

    /// Returns `true` if the message needs a `multipart/related`
    /// container.
    pub fn is_related(&self) -> bool {
        self.inline
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = [
            (self.attachment, "attachment"),
            (self.inline, "inline"),
            (self.message, "message"),
        ]
        .into_iter()
        .filter_map(|(set, tag)| set.then_some(tag))
        .collect();

        write!(f, "{}", tags.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::MessageType;

    fn classify(body: bool, inline: bool, attachment: bool) -> String {
        MessageType::classify(body, inline, attachment).to_string()
    }

    #[test_log::test]
    fn without_attachments() {
        assert_eq!(classify(true, false, false), "message");
        assert_eq!(classify(false, false, false), "inline");
    }

    #[test_log::test]
    fn with_one_disposition() {
        assert_eq!(classify(false, true, false), "inline");
        assert_eq!(classify(true, true, false), "inline|message");
        assert_eq!(classify(false, false, true), "attachment");
        assert_eq!(classify(true, false, true), "attachment|message");
    }

    #[test_log::test]
    fn with_both_dispositions() {
        assert_eq!(classify(true, true, true), "attachment|inline|message");
        assert_eq!(classify(false, true, true), "attachment|inline");
    }
}
