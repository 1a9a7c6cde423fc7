//! Blocking client.
//!
//! One request per connection: connect, send one framed command, read one
//! framed reply, close. The whole round trip shares a single deadline,
//! enforced by shrinking per-read socket timeouts. [`FileClient::request`]
//! is total: transport and decode failures come back as `ERROR` envelopes,
//! never as panics or hangs.

use std::fs;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::{Duration, Instant};

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use tracing::debug;

use crate::framing::FrameCodec;
use crate::protocol::{Payload, Response, Status};
use crate::session::READ_CHUNK;
use crate::store::valid_name;

/// Default round-trip deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// A finished transfer, for throughput reporting.
#[derive(Debug, Clone, Copy)]
pub struct Transfer {
    /// Decoded payload size in bytes.
    pub bytes: u64,
    /// Wall-clock duration of the whole operation.
    pub elapsed: Duration,
}

/// Client-side failures surfaced by the transfer helpers.
#[derive(Debug)]
pub enum ClientError {
    /// The server answered with an `ERROR` envelope, or the transport
    /// failed and was rendered as one.
    Rejected(String),
    /// The server answered `OK` but the envelope is unusable.
    MalformedReply(String),
    /// Local filesystem failure.
    Io(io::Error),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Rejected(msg) => write!(f, "server rejected the request: {}", msg),
            ClientError::MalformedReply(msg) => write!(f, "malformed server reply: {}", msg),
            ClientError::Io(e) => write!(f, "local i/o failed: {}", e),
        }
    }
}

impl std::error::Error for ClientError {}

/// Handle to one server address.
pub struct FileClient {
    server: String,
    timeout: Duration,
}

impl FileClient {
    /// Client with the default 300 second round-trip deadline.
    pub fn new(server: impl Into<String>) -> FileClient {
        FileClient::with_timeout(server, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(server: impl Into<String>, timeout: Duration) -> FileClient {
        FileClient {
            server: server.into(),
            timeout,
        }
    }

    /// Send one command line and return the server's reply.
    ///
    /// Never fails: connection, timeout and decode problems are returned as
    /// `ERROR` envelopes describing the failure.
    pub fn request(&self, command: &str) -> Response {
        match self.round_trip(command) {
            Ok(response) => response,
            Err(e) => {
                debug!(server = %self.server, error = %e, "request failed");
                Response::error(e.to_string())
            }
        }
    }

    fn round_trip(&self, command: &str) -> io::Result<Response> {
        let deadline = Instant::now() + self.timeout;

        let addr = self
            .server
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("no address for {}", self.server),
                )
            })?;
        let mut stream = TcpStream::connect_timeout(&addr, time_left(deadline)?)?;

        stream.set_write_timeout(Some(time_left(deadline)?))?;
        stream.write_all(&FrameCodec::encode(command.as_bytes()))?;

        let mut codec = FrameCodec::new();
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            stream.set_read_timeout(Some(time_left(deadline)?))?;
            let n = stream.read(&mut chunk)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "server closed the connection before replying",
                ));
            }
            if let Some(frame) = codec.append(&chunk[..n]).next() {
                return Ok(Response::decode(&frame)?);
            }
        }
    }

    /// Names of the files the server holds.
    pub fn list(&self) -> Result<Vec<String>, ClientError> {
        let response = self.request("LIST");
        match response.status {
            Status::Error => Err(ClientError::Rejected(error_text(response.data))),
            Status::Ok => match response.data {
                Some(Payload::Names(names)) => Ok(names),
                other => Err(ClientError::MalformedReply(format!(
                    "LIST reply carried no name listing: {:?}",
                    other
                ))),
            },
        }
    }

    /// Fetch `name` and write it into `dest_dir` under the server-reported
    /// file name.
    pub fn download(&self, name: &str, dest_dir: &Path) -> Result<Transfer, ClientError> {
        let start = Instant::now();
        let response = self.request(&format!("GET {}", name));
        if response.status == Status::Error {
            return Err(ClientError::Rejected(error_text(response.data)));
        }

        let file_name = response
            .file_name
            .ok_or_else(|| ClientError::MalformedReply("GET reply without a file name".into()))?;
        let content = response
            .file_content
            .ok_or_else(|| ClientError::MalformedReply("GET reply without file content".into()))?;
        if !valid_name(&file_name) {
            return Err(ClientError::MalformedReply(format!(
                "server sent an unsafe file name: {:?}",
                file_name
            )));
        }

        let bytes = BASE64_STANDARD
            .decode(content.as_bytes())
            .map_err(|e| ClientError::MalformedReply(format!("undecodable file content: {}", e)))?;

        fs::create_dir_all(dest_dir).map_err(ClientError::Io)?;
        fs::write(dest_dir.join(&file_name), &bytes).map_err(ClientError::Io)?;

        Ok(Transfer {
            bytes: bytes.len() as u64,
            elapsed: start.elapsed(),
        })
    }

    /// Upload the file at `path` under its own file name.
    pub fn upload(&self, path: &Path) -> Result<Transfer, ClientError> {
        let start = Instant::now();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| invalid_upload_name(path))?;
        // The request line splits the name from the content on whitespace,
        // so names with whitespace cannot travel.
        if !valid_name(name) || name.contains(char::is_whitespace) {
            return Err(invalid_upload_name(path));
        }

        let bytes = fs::read(path).map_err(ClientError::Io)?;
        let command = format!("UPLOAD {} {}", name, BASE64_STANDARD.encode(&bytes));

        let response = self.request(&command);
        match response.status {
            Status::Ok => Ok(Transfer {
                bytes: bytes.len() as u64,
                elapsed: start.elapsed(),
            }),
            Status::Error => Err(ClientError::Rejected(error_text(response.data))),
        }
    }
}

fn invalid_upload_name(path: &Path) -> ClientError {
    ClientError::Io(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("not an uploadable file name: {}", path.display()),
    ))
}

fn error_text(data: Option<Payload>) -> String {
    match data {
        Some(Payload::Text(message)) => message,
        _ => "unspecified server error".to_string(),
    }
}

fn time_left(deadline: Instant) -> io::Result<Duration> {
    let now = Instant::now();
    if now >= deadline {
        return Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "round-trip deadline exceeded",
        ));
    }
    Ok(deadline - now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_request_is_total_when_nothing_listens() {
        // Port 1 is reserved and virtually never bound.
        let client = FileClient::with_timeout("127.0.0.1:1", Duration::from_secs(2));
        let response = client.request("LIST");
        assert_eq!(response.status, Status::Error);
    }

    #[test]
    fn test_request_times_out_against_a_silent_server() {
        // Bound but never accepted: the handshake completes via the backlog
        // and then nothing ever answers.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let client = FileClient::with_timeout(addr.to_string(), Duration::from_millis(200));
        let start = Instant::now();
        let response = client.request("LIST");
        assert_eq!(response.status, Status::Error);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_upload_rejects_names_the_protocol_cannot_carry() {
        let client = FileClient::new("127.0.0.1:1");
        match client.upload(Path::new("has space.dat")) {
            Err(ClientError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::InvalidInput),
            other => panic!("Expected Io error, got {:?}", other),
        }
    }
}
