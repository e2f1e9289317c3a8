//! SMTP server implementation

use crate::smtp::commands::{Action, SmtpCommandHandler};
use crate::smtp::config::ServerConfig;
use crate::smtp::dot;
use crate::smtp::error::SmtpError;
use crate::smtp::response::Reply;
use crate::smtp::session::SmtpSession;
use crate::smtp::storage::Storage;

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, info_span, warn};

/// SMTP listener that hands every received message to a [`Storage`]
#[derive(Clone)]
pub struct SmtpServer {
    handler: SmtpCommandHandler,
}

impl SmtpServer {
    /// Create a new SMTP server
    pub fn new(config: ServerConfig, storage: Arc<dyn Storage>) -> Self {
        Self {
            handler: SmtpCommandHandler::new(Arc::new(config), storage),
        }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        self.handler.config()
    }

    /// Start the server on the specified address (blocking)
    pub fn start(&self, addr: &str) -> Result<(), SmtpError> {
        let listener = TcpListener::bind(addr)?;
        self.start_with_listener(listener)
    }

    /// Start the server with an existing listener (blocking).
    ///
    /// Every connection is served on its own thread.
    pub fn start_with_listener(&self, listener: TcpListener) -> Result<(), SmtpError> {
        let addr = listener.local_addr()?;
        info!(
            addr = %addr,
            hostname = %self.config().hostname,
            "SMTP server listening"
        );

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => self.spawn_client(stream),
                Err(e) => warn!(error = %e, "error accepting connection"),
            }
        }

        Ok(())
    }

    fn spawn_client(&self, stream: TcpStream) {
        let server = self.clone();
        thread::spawn(move || {
            let peer = stream
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "unknown".to_owned());
            let span = info_span!("session", %peer);
            let _entered = span.enter();

            info!("connection accepted");
            match server.handle_client(stream) {
                Ok(()) => info!("connection closed"),
                Err(e) => warn!(error = %e, "session ended with error"),
            }
        });
    }

    /// Handle a client connection, applying the idle timeout to every line
    /// read and every write
    pub fn handle_client(&self, stream: TcpStream) -> Result<(), SmtpError> {
        let timeout = self.config().idle_timeout;
        let timeout = (!timeout.is_zero()).then_some(timeout);
        stream.set_write_timeout(timeout)?;

        let reader = LineDeadlineReader::new(stream.try_clone()?, timeout);
        self.handle_connection(reader, stream)
    }

    /// Run one session over a line-oriented transport.
    ///
    /// Returns once the client quits, the error limit closes the session, or
    /// the stream ends. Transport errors end the session without a reply.
    pub fn handle_connection<R: BufRead, W: Write>(
        &self,
        mut reader: R,
        mut writer: W,
    ) -> Result<(), SmtpError> {
        let mut session = SmtpSession::new();
        send_reply(&mut writer, &self.handler.greeting())?;

        let mut line = Vec::new();
        while dot::read_line(&mut reader, &mut line)? {
            let command = String::from_utf8_lossy(&line);
            match self.handler.process_command(&command, &mut session) {
                Action::None => {}
                Action::Reply(reply) => send_reply(&mut writer, &reply)?,
                Action::ReadBody(reply) => {
                    send_reply(&mut writer, &reply)?;
                    let body = dot::decode(&mut reader)?;
                    let reply = self.handler.finish_data(&body, &mut session);
                    send_reply(&mut writer, &reply)?;
                }
                Action::Close(reply) => {
                    send_reply(&mut writer, &reply)?;
                    return Ok(());
                }
            }
        }

        debug!("client disconnected");
        Ok(())
    }
}

/// Buffered socket reader that gives each line a single idle timeout.
///
/// The deadline starts when the reader first waits for a byte of a line and
/// is cleared once the line break is consumed.
struct LineDeadlineReader {
    inner: BufReader<TcpStream>,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
}

impl LineDeadlineReader {
    fn new(stream: TcpStream, timeout: Option<Duration>) -> Self {
        Self {
            inner: BufReader::new(stream),
            timeout,
            deadline: None,
        }
    }
}

impl Read for LineDeadlineReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl BufRead for LineDeadlineReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self.timeout {
            Some(timeout) if self.inner.buffer().is_empty() => {
                let deadline = *self
                    .deadline
                    .get_or_insert_with(|| Instant::now() + timeout);
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "line not completed within idle timeout",
                    ));
                }
                self.inner.get_ref().set_read_timeout(Some(remaining))?;
            }
            _ => {}
        }
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        if self.inner.buffer().iter().take(amt).any(|&b| b == b'\n') {
            self.deadline = None;
        }
        self.inner.consume(amt);
    }
}

/// Send a reply to the client
fn send_reply<W: Write>(writer: &mut W, reply: &Reply) -> Result<(), SmtpError> {
    writer.write_all(reply.format().as_bytes())?;
    writer.flush()?;
    Ok(())
}
