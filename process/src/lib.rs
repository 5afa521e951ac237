//! Cross-platform, blocking library to pipe bytes into shell
//! commands.
//!
//! The library exists to hand a fully rendered message over to a
//! local mail transfer agent (sendmail and friends), following these
//! rules:
//!
//! 1. Commands are executed synchronously and block the calling
//! thread until the child process exits.
//!
//! 2. Commands are interpreted by the platform shell (`sh -c` on
//! unix, `cmd /C` on windows), so arguments can be part of the
//! command line.
//!
//! 3. A non-zero exit status is an error carrying the standard error
//! output of the child.

mod command;
mod error;
mod output;

#[doc(inline)]
pub use self::{
    command::Command,
    error::{Error, Result},
    output::Output,
};
