//! Replication master
//!
//! Serves WAL segments to slaves, one per request, in write order.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::disk::SegmentDisk;
use crate::error::Result;
use crate::network::RequestHandler;

use super::protocol::{decode, encode, Request, Response};

pub struct Master {
    disk: Arc<SegmentDisk>,
}

impl Master {
    pub fn new(disk: Arc<SegmentDisk>) -> Self {
        Self { disk }
    }

    /// Answer one encoded [`Request`] with an encoded [`Response`]
    ///
    /// Never fails: any error becomes an `ok = false` response.
    pub fn handle_request(&self, request: &[u8]) -> Vec<u8> {
        let response = self.serve(request).unwrap_or_else(|e| {
            warn!(error = %e, "failed to handle replication request");
            Response::error()
        });

        match encode(&response) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, "failed to encode replication response");
                Vec::new()
            }
        }
    }

    fn serve(&self, request: &[u8]) -> Result<Response> {
        let request: Request = decode(request)?;
        debug!(last_segment = %request.last_segment, "received request from slave");

        match self.disk.next_segment(&request.last_segment)? {
            Some(filename) => {
                let segment = self.disk.read_for_shipping(&filename)?;
                debug!(%filename, bytes = segment.len(), "serving segment");
                Ok(Response::success(filename, segment))
            }
            None => Ok(Response::no_data()),
        }
    }
}

impl RequestHandler for Master {
    fn handle(&self, _client: &str, request: &[u8]) -> Vec<u8> {
        self.handle_request(request)
    }
}
