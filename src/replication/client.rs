//! Slave-side transport to the master

use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TideError};
use crate::network::Client;

/// Request/response exchange with a master
pub trait ReplicationClient: Send {
    fn send(&mut self, request: &[u8]) -> Result<Vec<u8>>;

    fn close(&mut self) -> Result<()>;
}

/// TCP transport that connects lazily and reconnects after any failure
pub struct TcpReplicationClient {
    address: String,
    timeout: Duration,
    max_message_size: usize,
    client: Option<Client>,
}

/// Segments can be far larger than client commands
pub const DEFAULT_MAX_SEGMENT_MESSAGE: usize = 64 * 1024 * 1024;

impl TcpReplicationClient {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
            max_message_size: DEFAULT_MAX_SEGMENT_MESSAGE,
            client: None,
        }
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    fn connected(&mut self) -> Result<&mut Client> {
        if self.client.is_none() {
            debug!(address = %self.address, "connecting to master");
            let client = Client::connect(&self.address, Some(self.timeout), self.max_message_size)?;
            self.client = Some(client);
        }
        self.client
            .as_mut()
            .ok_or_else(|| TideError::Network("not connected".to_string()))
    }
}

impl ReplicationClient for TcpReplicationClient {
    fn send(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        let result = self.connected()?.send(request);
        if result.is_err() {
            // Stream state is unknown after a failure
            self.client = None;
        }
        result
    }

    fn close(&mut self) -> Result<()> {
        match self.client.take() {
            Some(client) => client.close(),
            None => Ok(()),
        }
    }
}
