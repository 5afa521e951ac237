use std::{
    fmt,
    io::Write,
    ops::Deref,
    process::{self, Stdio},
};

use tracing::{debug, info};

use crate::{Error, Output, Result};

/// The shell command structure.
///
/// The inner string is passed as a whole to the platform shell, so
/// it can contain arguments, redirections and pipes.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(from = "String", into = "String")
)]
pub struct Command {
    inner: String,
}

impl Command {
    pub fn new(cmd: impl ToString) -> Self {
        Self {
            inner: cmd.to_string(),
        }
    }

    /// Appends the given argument to the command line, separated by
    /// a single space.
    pub fn with_arg(mut self, arg: impl AsRef<str>) -> Self {
        self.inner.push(' ');
        self.inner.push_str(arg.as_ref());
        self
    }

    pub fn run(&self) -> Result<Output> {
        self.run_with([])
    }

    /// Run the command with the given input.
    ///
    /// If the given input is empty, the standard input is closed
    /// straight away. Otherwise the input is written to the standard
    /// input channel, which is then closed so the command sees the
    /// end of the stream. Standard output and standard error are
    /// always captured.
    pub fn run_with(&self, input: impl AsRef<[u8]>) -> Result<Output> {
        info!(cmd = self.inner, "run shell command");

        let input = input.as_ref();

        let mut child = new_shell_command()
            .arg(&self.inner)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| Error::SpawnCommandError(err, self.to_string()))?;

        // the handle is dropped at the end of the scope, which closes
        // the pipe
        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| Error::GetStdinError(self.to_string()))?;

            if !input.is_empty() {
                debug!(bytes = input.len(), "write input to stdin");
                stdin
                    .write_all(input)
                    .map_err(|err| Error::WriteStdinError(err, self.to_string()))?;
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|err| Error::WaitForOutputError(err, self.to_string()))?;

        let code = output
            .status
            .code()
            .ok_or_else(|| Error::GetExitStatusCodeNotAvailableError(self.to_string()))?;

        if code == 0 {
            debug!(code, "shell command gracefully exited");
        } else {
            let cmd = self.to_string();
            let err = String::from_utf8_lossy(&output.stderr).to_string();
            debug!(code, err, "shell command ungracefully exited");
            return Err(Error::GetExitStatusCodeNonZeroError(cmd, code, err));
        }

        Ok(Output::from(output.stdout))
    }
}

impl Deref for Command {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<String> for Command {
    fn from(cmd: String) -> Self {
        Self::new(cmd)
    }
}

impl From<&str> for Command {
    fn from(cmd: &str) -> Self {
        Self::new(cmd)
    }
}

impl From<Command> for String {
    fn from(cmd: Command) -> Self {
        cmd.inner
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

fn new_shell_command() -> process::Command {
    #[cfg(windows)]
    let windows = !std::env::var("MSYSTEM")
        .map(|env| env.starts_with("MINGW"))
        .unwrap_or_default();
    #[cfg(not(windows))]
    let windows = false;

    let (shell, arg) = if windows { ("cmd", "/C") } else { ("sh", "-c") };

    let mut cmd = process::Command::new(shell);
    cmd.arg(arg);
    cmd
}
