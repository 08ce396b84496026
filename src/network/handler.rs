//! Request handler seam between the TCP server and what it serves

/// Turns one request frame into one response frame
///
/// `client` identifies the connection (its peer address) so handlers can
/// keep per-connection state.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, client: &str, request: &[u8]) -> Vec<u8>;

    /// Called once after the connection closed
    fn on_disconnect(&self, _client: &str) {}
}
