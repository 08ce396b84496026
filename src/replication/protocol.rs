//! Replication wire messages
//!
//! Both messages are bincode-encoded and travel as one length-prefixed
//! frame each (see [`crate::protocol::write_frame`]).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Slave → master: "send me the segment after this one"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Last segment the slave holds; empty if none
    pub last_segment: String,
}

/// Master → slave
///
/// `ok = true` with an empty `filename` means there is nothing new.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    pub filename: String,
    pub segment: Vec<u8>,
}

impl Request {
    pub fn new(last_segment: impl Into<String>) -> Self {
        Self {
            last_segment: last_segment.into(),
        }
    }
}

impl Response {
    pub fn success(filename: impl Into<String>, segment: Vec<u8>) -> Self {
        Self {
            ok: true,
            filename: filename.into(),
            segment,
        }
    }

    pub fn no_data() -> Self {
        Self::success(String::new(), Vec::new())
    }

    pub fn error() -> Self {
        Self {
            ok: false,
            filename: String::new(),
            segment: Vec::new(),
        }
    }

    pub fn has_segment(&self) -> bool {
        self.ok && !self.filename.is_empty()
    }
}

pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(message)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}
