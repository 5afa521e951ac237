//! # Stream
//!
//! Module dedicated to line-oriented network streams, shared by the
//! SMTP session and the IMAP client.

use std::{
    io::{self, Read, Write},
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use rustls::{ClientConnection, StreamOwned};
use tracing::{debug, instrument, trace};

/// Network stream, either plain or encrypted.
pub enum Stream {
    Tcp(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Stream {
    /// Connects to the given host and port, trying every resolved
    /// address within the given timeout. The timeout also applies to
    /// subsequent reads and writes.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> io::Result<Self> {
        let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
        let mut last_err = None;

        for addr in addrs {
            debug!(%addr, ?timeout, "connecting");

            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(tcp) => {
                    tcp.set_read_timeout(Some(timeout))?;
                    tcp.set_write_timeout(Some(timeout))?;
                    return Ok(Self::Tcp(tcp));
                }
                Err(err) => {
                    debug!(%addr, ?err, "cannot connect");
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("cannot resolve {host}"))
        }))
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            Self::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            Self::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            Self::Tls(stream) => stream.flush(),
        }
    }
}

/// Escapes non-printable bytes, for tracing purpose.
pub fn escape_byte_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .flat_map(|byte| std::ascii::escape_default(*byte))
        .map(char::from)
        .collect()
}

/// Buffered stream reading CRLF-terminated lines.
pub struct LineStream {
    stream: Stream,
    read_buf: Box<[u8]>,
    pending: Vec<u8>,
}

impl LineStream {
    pub fn new(stream: Stream) -> Self {
        Self::new_with_capacity(stream, 1024)
    }

    pub fn new_with_capacity(stream: Stream, capacity: usize) -> Self {
        Self {
            stream,
            read_buf: vec![0; capacity].into(),
            pending: Vec::new(),
        }
    }

    /// Returns `true` if bytes were received but not consumed yet.
    pub fn has_pending_bytes(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn is_encrypted(&self) -> bool {
        self.stream.is_encrypted()
    }

    pub fn into_inner(self) -> Stream {
        self.stream
    }

    #[instrument(skip_all)]
    fn progress_read(&mut self) -> io::Result<usize> {
        let n = self.stream.read(&mut self.read_buf)?;

        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by peer",
            ));
        }

        let bytes = &self.read_buf[..n];
        trace!(data = escape_byte_string(bytes), "read");
        self.pending.extend_from_slice(bytes);

        Ok(n)
    }

    /// Reads the next line, without its line ending.
    pub fn read_line(&mut self) -> io::Result<String> {
        loop {
            if let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
                let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(String::from_utf8_lossy(&line).to_string());
            }

            self.progress_read()?;
        }
    }

    /// Writes all the given bytes and flushes the stream.
    #[instrument(skip_all)]
    pub fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()?;
        trace!(bytes = bytes.len(), "write");
        Ok(())
    }
}
