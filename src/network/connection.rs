//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, TideError};
use crate::protocol::{read_frame, write_frame};
use crate::shutdown::Shutdown;

use super::RequestHandler;

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// What requests are dispatched to
    handler: Arc<dyn RequestHandler>,

    /// Largest accepted request frame
    max_message_size: usize,

    /// Peer address, also the client id given to the handler
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    pub fn new(
        stream: TcpStream,
        handler: Arc<dyn RequestHandler>,
        max_message_size: usize,
    ) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            handler,
            max_message_size,
            peer_addr,
        })
    }

    /// Close the connection after `idle` without a request
    pub fn set_idle_timeout(&mut self, idle: Duration) -> Result<()> {
        if !idle.is_zero() {
            self.reader.get_ref().set_read_timeout(Some(idle))?;
            self.writer.get_ref().set_write_timeout(Some(idle))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Returns when the client disconnects, goes idle, the server shuts
    /// down or an error occurs.
    pub fn handle(&mut self, shutdown: &Shutdown) -> Result<()> {
        tracing::debug!(peer = %self.peer_addr, "connection established");

        while !shutdown.is_cancelled() {
            let request = match read_frame(&mut self.reader, self.max_message_size) {
                Ok(request) => request,
                Err(TideError::Io(ref e)) if is_disconnect(e.kind()) => {
                    tracing::debug!(peer = %self.peer_addr, "client disconnected");
                    return Ok(());
                }
                Err(TideError::Io(ref e))
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    tracing::warn!(peer = %self.peer_addr, "idle connection closed");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(peer = %self.peer_addr, error = %e, "error reading request");
                    return Err(e);
                }
            };

            let response = self.handler.handle(&self.peer_addr, &request);

            if let Err(e) = write_frame(&mut self.writer, &response) {
                if let TideError::Io(ref io_err) = e {
                    if is_disconnect(io_err.kind()) {
                        tracing::debug!(
                            peer = %self.peer_addr,
                            "client disconnected before response could be sent"
                        );
                        return Ok(());
                    }
                }
                tracing::warn!(peer = %self.peer_addr, error = %e, "error writing response");
                return Err(e);
            }
        }

        Ok(())
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
    )
}
