//! TCP Client
//!
//! Blocking request/response client over the framed protocol.

use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{Result, TideError};
use crate::protocol::{read_frame, write_frame};

pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    max_message_size: usize,
}

impl Client {
    /// Connect to `addr`; `timeout` bounds connecting, reads and writes
    pub fn connect(addr: &str, timeout: Option<Duration>, max_message_size: usize) -> Result<Self> {
        let stream = match timeout {
            Some(timeout) => {
                let socket_addr = addr
                    .to_socket_addrs()?
                    .next()
                    .ok_or_else(|| TideError::Network(format!("cannot resolve {}", addr)))?;
                TcpStream::connect_timeout(&socket_addr, timeout)?
            }
            None => TcpStream::connect(addr)?,
        };

        stream.set_nodelay(true)?;
        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)?;

        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
            max_message_size,
        })
    }

    /// Send one request frame and wait for the response frame
    pub fn send(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        write_frame(&mut self.writer, request)?;
        read_frame(&mut self.reader, self.max_message_size)
    }

    /// Execute a text command, returning the server's text response
    pub fn execute(&mut self, command: &str) -> Result<String> {
        let response = self.send(command.as_bytes())?;
        String::from_utf8(response)
            .map_err(|e| TideError::Protocol(format!("response is not UTF-8: {}", e)))
    }

    pub fn close(self) -> Result<()> {
        match self.writer.get_ref().shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
