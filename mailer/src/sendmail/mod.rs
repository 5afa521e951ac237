//! # Sendmail
//!
//! Module dedicated to the local pipe transport. The rendered message
//! is written to the standard input of a sendmail-compatible command.

pub mod config;

use process::Command;
use thiserror::Error;
use tracing::{debug, info, instrument};

#[doc(inline)]
pub use self::config::{SendmailConfig, SENDMAIL_DEFAULT_COMMAND};
use crate::ErrorKind;

/// The global `Result` alias of the module.
pub type Result<T> = std::result::Result<T, Error>;

/// The global `Error` enum of the module.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot send message via sendmail: sender {0:?} is not shell safe")]
    UnsafeSenderError(String),
    #[error("cannot send message via sendmail command {1}")]
    RunSendmailCommandError(#[source] process::Error, Command),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsafeSenderError(_) => ErrorKind::Validation,
            Self::RunSendmailCommandError(..) => ErrorKind::Protocol,
        }
    }
}

/// Returns `true` if the given address can be passed to the shell
/// as is: only ASCII alphanumerics and `@`, `_`, `-`, `.` are
/// allowed.
pub fn is_shell_safe(addr: &str) -> bool {
    !addr.trim().is_empty()
        && addr
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '_' | '-' | '.'))
}

/// The sendmail pipe.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Sendmail {
    config: SendmailConfig,
}

impl Sendmail {
    pub fn new(config: SendmailConfig) -> Self {
        Self { config }
    }

    /// Builds the command line for the given envelope sender.
    ///
    /// The sender ends up in a shell command line, so it is refused
    /// unless it is shell safe.
    pub fn command(&self, sender: &str) -> Result<Command> {
        if !is_shell_safe(sender) {
            return Err(Error::UnsafeSenderError(sender.to_owned()));
        }

        Ok(self.config.cmd().clone().with_arg(format!("-f{sender}")))
    }

    /// Pipes the given rendered message to the sendmail command.
    #[instrument(skip(self, bytes))]
    pub fn send(&self, sender: &str, bytes: &[u8]) -> Result<()> {
        let cmd = self.command(sender)?;
        debug!(%cmd, bytes = bytes.len(), "run sendmail command");

        cmd.run_with(bytes)
            .map_err(|err| Error::RunSendmailCommandError(err, cmd.clone()))?;

        info!("message sent via sendmail");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use process::Command;

    use super::{is_shell_safe, Error, Sendmail, SendmailConfig};
    use crate::ErrorKind;

    #[test_log::test]
    fn default_command() {
        let sendmail = Sendmail::default();
        let cmd = sendmail.command("alice@example.com").unwrap();
        assert_eq!(cmd.to_string(), "/usr/sbin/sendmail -t -i -falice@example.com");
    }

    #[test_log::test]
    fn shell_safe_addresses() {
        assert!(is_shell_safe("alice@example.com"));
        assert!(is_shell_safe("first.last_name-1@sub.example.com"));

        assert!(!is_shell_safe(""));
        assert!(!is_shell_safe("  "));
        assert!(!is_shell_safe("a`id`@example.com"));
        assert!(!is_shell_safe("a$(id)@example.com"));
        assert!(!is_shell_safe("a${IFS}b@example.com"));
        assert!(!is_shell_safe("a|b@example.com"));
        assert!(!is_shell_safe("a&b@example.com"));
        assert!(!is_shell_safe("a;b@example.com"));
        assert!(!is_shell_safe("a b@example.com"));
        assert!(!is_shell_safe("alice+tag@example.com"));
        assert!(!is_shell_safe("andré@example.com"));
    }

    #[test_log::test]
    fn refuse_unsafe_sender() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let sender = format!("a`touch${{IFS}}{}`@example.com", marker.display());

        let cmd = Command::new("cat > /dev/null #");
        let sendmail = Sendmail::new(SendmailConfig::default().with_cmd(cmd));
        let err = sendmail.send(&sender, b"x").unwrap_err();

        assert!(matches!(err, Error::UnsafeSenderError(_)));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!marker.exists());
    }

    #[test_log::test]
    fn pipe_message() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.eml");
        // the sender flag lands after the redirection target
        let cmd = Command::new(format!("cat > {} #", out.display()));
        let sendmail = Sendmail::new(SendmailConfig::default().with_cmd(cmd));

        sendmail.send("alice@example.com", b"Subject: hi\r\n\r\nbody\r\n").unwrap();

        let piped = fs::read_to_string(out).unwrap();
        assert_eq!(piped, "Subject: hi\r\n\r\nbody\r\n");
    }

    #[test_log::test]
    fn non_zero_exit_code() {
        let cmd = Command::new("exit 75 #");
        let sendmail = Sendmail::new(SendmailConfig::default().with_cmd(cmd));
        assert!(sendmail.send("alice@example.com", b"x").is_err());
    }
}
