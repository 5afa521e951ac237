use std::{
    collections::HashMap,
    io::{BufRead, BufReader, Write},
    net::{TcpListener, TcpStream},
    thread::{self, JoinHandle},
    time::Duration,
};

use tracing::debug;

const TIMEOUT: Duration = Duration::from_secs(10);

/// What the SMTP testing server received.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SmtpTranscript {
    /// Every command line received, in order. Lines of DATA payloads
    /// are not part of it.
    pub commands: Vec<String>,

    /// Every DATA payload received, exactly as sent on the wire,
    /// without the terminating dot line.
    pub messages: Vec<Vec<u8>>,
}

impl SmtpTranscript {
    /// Returns the verbs of the received commands.
    pub fn verbs(&self) -> Vec<String> {
        self.commands
            .iter()
            .map(|cmd| {
                cmd.split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_ascii_uppercase()
            })
            .collect()
    }
}

/// The SMTP testing server.
///
/// Every verb gets a sensible default reply, which can be overridden
/// using [`SmtpTestingServer::with_reply`]. STARTTLS is accepted but
/// nothing is actually encrypted: clients are expected to use a
/// passthrough upgrade.
pub struct SmtpTestingServer {
    listener: TcpListener,
    greeting: String,
    replies: HashMap<String, String>,
    connections: usize,
}

impl Default for SmtpTestingServer {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtpTestingServer {
    pub fn new() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("should bind a random port");

        Self {
            listener,
            greeting: String::from("220 localhost ESMTP testing server"),
            replies: HashMap::new(),
            connections: 1,
        }
    }

    pub fn port(&self) -> u16 {
        self.listener
            .local_addr()
            .expect("should get the local address")
            .port()
    }

    pub fn with_greeting(mut self, greeting: impl ToString) -> Self {
        self.greeting = greeting.to_string();
        self
    }

    /// Overrides the reply to the given verb. Use `.` for the reply
    /// to the end of a DATA payload, and `AUTH PASS` for the reply to
    /// the AUTH LOGIN password. Multi-line replies are separated by
    /// CRLF.
    pub fn with_reply(mut self, verb: impl AsRef<str>, reply: impl ToString) -> Self {
        self.replies
            .insert(verb.as_ref().to_ascii_uppercase(), reply.to_string());
        self
    }

    /// Sets the number of connections to serve before stopping.
    pub fn with_connections(mut self, connections: usize) -> Self {
        self.connections = connections;
        self
    }

    pub fn spawn(self) -> SmtpTestingServerHandle {
        let port = self.port();
        let thread = thread::spawn(move || self.run());
        SmtpTestingServerHandle { port, thread }
    }

    fn run(self) -> SmtpTranscript {
        let mut transcript = SmtpTranscript::default();

        for _ in 0..self.connections {
            let (stream, addr) = self.listener.accept().expect("should accept connection");
            debug!(%addr, "smtp testing server: connection accepted");
            self.serve(stream, &mut transcript);
        }

        transcript
    }

    fn reply(&self, verb: &str, default: &str) -> String {
        self.replies
            .get(verb)
            .cloned()
            .unwrap_or_else(|| default.to_owned())
    }

    fn serve(&self, stream: TcpStream, transcript: &mut SmtpTranscript) {
        stream.set_read_timeout(Some(TIMEOUT)).ok();
        let mut writer = stream.try_clone().expect("should clone stream");
        let mut reader = BufReader::new(stream);

        let mut send = |reply: &str| {
            debug!(reply, "smtp testing server: send");
            writer
                .write_all(format!("{reply}\r\n").as_bytes())
                .and_then(|()| writer.flush())
                .is_ok()
        };

        if !send(&self.greeting) || !self.greeting.starts_with("220") {
            return;
        }

        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => (),
            }

            let cmd = line.trim_end_matches(['\r', '\n']).to_owned();
            debug!(cmd, "smtp testing server: receive");
            transcript.commands.push(cmd.clone());

            let verb = cmd
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_ascii_uppercase();

            match verb.as_str() {
                "EHLO" | "HELO" => {
                    send(&self.reply(&verb, "250-localhost\r\n250-STARTTLS\r\n250 AUTH LOGIN"));
                }
                "STARTTLS" => {
                    send(&self.reply(&verb, "220 ready to start tls"));
                }
                "AUTH" => {
                    let reply = self.reply(&verb, "334 VXNlcm5hbWU6");
                    send(&reply);

                    if !reply.starts_with("334") {
                        continue;
                    }

                    let pass = self.reply("AUTH PASS", "235 authenticated");

                    for reply in ["334 UGFzc3dvcmQ6", pass.as_str()] {
                        line.clear();
                        if reader.read_line(&mut line).unwrap_or_default() == 0 {
                            return;
                        }
                        transcript
                            .commands
                            .push(line.trim_end_matches(['\r', '\n']).to_owned());
                        send(reply);
                    }
                }
                "DATA" => {
                    let reply = self.reply(&verb, "354 end data with <CR><LF>.<CR><LF>");
                    send(&reply);

                    if !reply.starts_with("354") {
                        continue;
                    }

                    let mut data = Vec::new();

                    loop {
                        let mut data_line = Vec::new();
                        if reader.read_until(b'\n', &mut data_line).unwrap_or_default() == 0 {
                            return;
                        }
                        if data_line == b".\r\n" {
                            break;
                        }
                        data.extend(data_line);
                    }

                    transcript.messages.push(data);
                    send(&self.reply(".", "250 queued"));
                }
                "QUIT" => {
                    send(&self.reply(&verb, "221 bye"));
                    break;
                }
                "MAIL" | "RCPT" | "RSET" | "NOOP" => {
                    send(&self.reply(&verb, "250 ok"));
                }
                _ => {
                    send(&self.reply(&verb, "502 command not implemented"));
                }
            }
        }
    }
}

/// The handle of a spawned SMTP testing server.
pub struct SmtpTestingServerHandle {
    port: u16,
    thread: JoinHandle<SmtpTranscript>,
}

impl SmtpTestingServerHandle {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Waits for the server to serve all its connections, then
    /// returns what it received.
    pub fn join(self) -> SmtpTranscript {
        self.thread.join().expect("smtp testing server should not panic")
    }
}
