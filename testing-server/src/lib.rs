//! Scripted SMTP and IMAP servers for testing purpose.
//!
//! Servers are bound on random local ports, so multiple servers can
//! be spawned at the same time. Each server runs in its own thread,
//! serves a fixed number of connections, then returns what it
//! received when joined.

mod imap;
mod smtp;

use std::net::TcpListener;

pub use self::{
    imap::{ImapTestingServer, ImapTestingServerHandle, ImapTranscript},
    smtp::{SmtpTestingServer, SmtpTestingServerHandle, SmtpTranscript},
};

/// Returns a local port nothing listens on.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("should bind a random port");
    listener
        .local_addr()
        .expect("should get the local address")
        .port()
}
