use std::{
    io::{BufRead, BufReader, Read, Write},
    net::{TcpListener, TcpStream},
    thread::{self, JoinHandle},
    time::Duration,
};

use tracing::debug;

const TIMEOUT: Duration = Duration::from_secs(10);

/// What the IMAP testing server received.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ImapTranscript {
    /// Every command line received, in order.
    pub commands: Vec<String>,

    /// Every appended message, with the folder it was appended to.
    pub appended: Vec<(String, Vec<u8>)>,
}

/// The IMAP testing server.
///
/// Understands LOGIN, APPEND and LOGOUT only.
pub struct ImapTestingServer {
    listener: TcpListener,
    reject_append: bool,
    connections: usize,
}

impl Default for ImapTestingServer {
    fn default() -> Self {
        Self::new()
    }
}

impl ImapTestingServer {
    pub fn new() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("should bind a random port");

        Self {
            listener,
            reject_append: false,
            connections: 1,
        }
    }

    pub fn port(&self) -> u16 {
        self.listener
            .local_addr()
            .expect("should get the local address")
            .port()
    }

    /// Answers NO to every APPEND command.
    pub fn with_rejected_append(mut self) -> Self {
        self.reject_append = true;
        self
    }

    /// Sets the number of connections to serve before stopping.
    pub fn with_connections(mut self, connections: usize) -> Self {
        self.connections = connections;
        self
    }

    pub fn spawn(self) -> ImapTestingServerHandle {
        let port = self.port();
        let thread = thread::spawn(move || self.run());
        ImapTestingServerHandle { port, thread }
    }

    fn run(self) -> ImapTranscript {
        let mut transcript = ImapTranscript::default();

        for _ in 0..self.connections {
            let (stream, addr) = self.listener.accept().expect("should accept connection");
            debug!(%addr, "imap testing server: connection accepted");
            self.serve(stream, &mut transcript);
        }

        transcript
    }

    fn serve(&self, stream: TcpStream, transcript: &mut ImapTranscript) {
        stream.set_read_timeout(Some(TIMEOUT)).ok();
        let mut writer = stream.try_clone().expect("should clone stream");
        let mut reader = BufReader::new(stream);

        let mut send = |reply: String| {
            debug!(reply, "imap testing server: send");
            writer
                .write_all(format!("{reply}\r\n").as_bytes())
                .and_then(|()| writer.flush())
                .is_ok()
        };

        send(String::from("* OK IMAP4rev1 testing server ready"));

        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => (),
            }

            let cmd = line.trim_end_matches(['\r', '\n']).to_owned();
            debug!(cmd, "imap testing server: receive");
            transcript.commands.push(cmd.clone());

            let mut words = cmd.splitn(3, ' ');
            let tag = words.next().unwrap_or_default();
            let verb = words.next().unwrap_or_default().to_ascii_uppercase();
            let args = words.next().unwrap_or_default();

            match verb.as_str() {
                "LOGIN" => {
                    send(format!("{tag} OK LOGIN completed"));
                }
                "APPEND" => {
                    let Some((folder, size)) = parse_append(args) else {
                        send(format!("{tag} BAD invalid APPEND arguments"));
                        continue;
                    };

                    send(String::from("+ Ready for literal data"));

                    let mut bytes = vec![0; size];
                    if reader.read_exact(&mut bytes).is_err() {
                        return;
                    }

                    // the literal is followed by the end of the command line
                    line.clear();
                    if reader.read_line(&mut line).unwrap_or_default() == 0 {
                        return;
                    }

                    if self.reject_append {
                        send(format!("{tag} NO [TRYCREATE] folder does not exist"));
                    } else {
                        transcript.appended.push((folder, bytes));
                        send(format!("{tag} OK APPEND completed"));
                    }
                }
                "LOGOUT" => {
                    send(String::from("* BYE logging out"));
                    send(format!("{tag} OK LOGOUT completed"));
                    break;
                }
                _ => {
                    send(format!("{tag} BAD unknown command"));
                }
            }
        }
    }
}

/// Parses `"folder" (flags) {size}` APPEND arguments.
fn parse_append(args: &str) -> Option<(String, usize)> {
    let folder = if let Some(rest) = args.strip_prefix('"') {
        let end = rest.find('"')?;
        rest[..end].to_owned()
    } else {
        args.split_whitespace().next()?.to_owned()
    };

    let size = args
        .rsplit_once('{')?
        .1
        .trim_end_matches('}')
        .parse()
        .ok()?;

    Some((folder, size))
}

/// The handle of a spawned IMAP testing server.
pub struct ImapTestingServerHandle {
    port: u16,
    thread: JoinHandle<ImapTranscript>,
}

impl ImapTestingServerHandle {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Waits for the server to serve all its connections, then
    /// returns what it received.
    pub fn join(self) -> ImapTranscript {
        self.thread.join().expect("imap testing server should not panic")
    }
}
