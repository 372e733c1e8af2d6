//! Connection Handler
//!
//! Each client gets its own handler task that runs in a loop, reading
//! command lines, executing them, and writing (or deliberately not writing)
//! responses.
//!
//! ## Buffer Management
//!
//! TCP is a stream protocol: a read may deliver half a command or a dozen
//! pipelined ones. Incoming bytes accumulate in a `BytesMut`; the parser
//! lifts complete units off the front and tells us how many bytes to
//! discard. The buffer has a hard cap so a client cannot grow it without
//! bound.
//!
//! ## Silence is part of the protocol
//!
//! A command carrying `noreply` must produce zero response bytes, whatever
//! happened - including `ERROR`. The handler therefore writes only when the
//! command layer hands back a response, and counts the suppressed replies
//! so the silence is still observable in the stats.

use crate::commands::CommandHandler;
use crate::protocol::{parse_command, Command, ParseError, Parsed, Response};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, error, info, trace, warn};

/// Hard cap on the connection read buffer (1 MB).
const MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Replies suppressed because the command carried `noreply`
    pub replies_suppressed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reply_suppressed(&self) {
        self.replies_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
pub struct ConnectionHandler {
    /// The TCP stream for this connection
    stream: BufWriter<TcpStream>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// The command handler (shared cache behind it)
    command_handler: CommandHandler,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            stats,
        }
    }

    /// Runs the main connection loop until the client disconnects, sends
    /// `quit`, or the stream becomes unrecoverable.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::IoError(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-parse-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            loop {
                match parse_command(&self.buffer) {
                    Ok(Some((parsed, consumed))) => {
                        let _ = self.buffer.split_to(consumed);
                        self.stats.command_processed();
                        trace!(
                            client = %self.addr,
                            consumed = consumed,
                            remaining = self.buffer.len(),
                            "Parsed command"
                        );

                        if matches!(parsed, Parsed::Command(Command::Quit)) {
                            self.stream.flush().await?;
                            return Ok(());
                        }

                        match self.command_handler.execute(parsed) {
                            Some(response) => self.send_response(&response).await?,
                            None => {
                                self.stats.reply_suppressed();
                                trace!(client = %self.addr, "Reply suppressed (noreply)");
                            }
                        }
                    }
                    Ok(None) => break, // incomplete, need more bytes
                    Err(e) => {
                        // Command framing is lost; answer once (unless the
                        // client asked for silence) and drop the connection.
                        warn!(client = %self.addr, error = %e, "Lost command framing");
                        if !e.noreply() {
                            self.send_response(&Response::Error).await?;
                        }
                        return Err(ConnectionError::LostSync(e));
                    }
                }
            }

            self.read_more_data().await?;
        }
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            error!(
                client = %self.addr,
                size = self.buffer.len(),
                "Buffer size limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            // Connection closed by client
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                // Partial command left behind
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    /// Sends a response to the client.
    async fn send_response(&mut self, response: &Response) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(
            client = %self.addr,
            bytes = bytes.len(),
            "Sent response"
        );
        Ok(())
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The command stream can no longer be resynchronized
    #[error("lost command framing: {0}")]
    LostSync(ParseError),

    /// Client disconnected normally
    #[error("client disconnected")]
    ClientDisconnected,

    /// Unexpected end of stream (partial command)
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// Buffer size limit exceeded
    #[error("buffer size limit exceeded")]
    BufferFull,
}

/// Handles a client connection to completion.
///
/// This is a convenience wrapper around [`ConnectionHandler`] for use with
/// `tokio::spawn`.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}
