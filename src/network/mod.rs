//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread (non-blocking accept, polls for shutdown)
//! - One thread per connection, bounded by a connection limiter
//! - Requests routed through a [`RequestHandler`]

mod client;
mod connection;
mod handler;
mod server;

pub use client::Client;
pub use connection::Connection;
pub use handler::RequestHandler;
pub use server::{Server, ServerOptions};
