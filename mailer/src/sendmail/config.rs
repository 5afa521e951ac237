//! Module dedicated to the sendmail transport configuration.

use once_cell::sync::Lazy;
use process::Command;

/// The default sendmail command. Recipients are read from the
/// headers and a line with a single dot does not end the input.
pub static SENDMAIL_DEFAULT_COMMAND: Lazy<Command> =
    Lazy::new(|| Command::new("/usr/sbin/sendmail -t -i"));

/// The sendmail transport configuration.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub struct SendmailConfig {
    /// The sendmail command.
    ///
    /// Defaults to [`SENDMAIL_DEFAULT_COMMAND`].
    pub cmd: Option<Command>,
}

impl SendmailConfig {
    pub fn with_cmd(mut self, cmd: impl Into<Command>) -> Self {
        self.cmd = Some(cmd.into());
        self
    }

    pub fn cmd(&self) -> &Command {
        self.cmd.as_ref().unwrap_or(&*SENDMAIL_DEFAULT_COMMAND)
    }
}
