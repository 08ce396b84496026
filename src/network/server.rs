//! TCP Server
//!
//! Accepts connections and runs each on its own thread.
//!
//! ## Lifecycle
//! ```text
//! bind ──► run (accept loop) ──shutdown──► drain(grace) ──deadline──► force close
//! ```

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{Shutdown as SocketShutdown, SocketAddr, TcpListener, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use parking_lot::{Condvar, Mutex};

use crate::config::Config;
use crate::error::{Result, TideError};
use crate::shutdown::Shutdown;

use super::{Connection, RequestHandler};

/// How often the accept loop checks for shutdown
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Per-server connection settings
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub max_connections: usize,
    pub idle_timeout: Duration,
    pub max_message_size: usize,
}

impl ServerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_connections: config.max_connections,
            idle_timeout: config.idle_timeout,
            max_message_size: config.max_message_size,
        }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            max_connections: 1024,
            idle_timeout: Duration::from_secs(300),
            max_message_size: 4 * 1024,
        }
    }
}

/// Open sockets, for force-closing at the grace deadline
#[derive(Default)]
struct ConnectionRegistry {
    next_id: AtomicU64,
    streams: Mutex<HashMap<u64, TcpStream>>,
    drained: Condvar,
}

impl ConnectionRegistry {
    fn register(&self, stream: TcpStream) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.streams.lock().insert(id, stream);
        id
    }

    fn unregister(&self, id: u64) {
        let mut streams = self.streams.lock();
        streams.remove(&id);
        if streams.is_empty() {
            self.drained.notify_all();
        }
    }

    /// Wait until every connection closed; false on deadline
    fn wait_drained(&self, deadline: Instant) -> bool {
        let mut streams = self.streams.lock();
        while !streams.is_empty() {
            if self.drained.wait_until(&mut streams, deadline).timed_out() {
                return streams.is_empty();
            }
        }
        true
    }

    fn close_all(&self) {
        for stream in self.streams.lock().values() {
            let _ = stream.shutdown(SocketShutdown::Both);
        }
    }

    fn len(&self) -> usize {
        self.streams.lock().len()
    }
}

/// Framed request/response TCP server
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    options: ServerOptions,
    handler: Arc<dyn RequestHandler>,
    registry: Arc<ConnectionRegistry>,
    /// Connection slots: a send takes one, a receive frees one
    permits: (Sender<()>, Receiver<()>),
}

impl Server {
    /// Bind the listening socket
    pub fn bind(addr: &str, options: ServerOptions, handler: Arc<dyn RequestHandler>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| TideError::Network(format!("failed to bind {}: {}", addr, e)))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        tracing::info!(address = %local_addr, "started listening");

        Ok(Self {
            listener,
            local_addr,
            permits: channel::bounded(options.max_connections.max(1)),
            options,
            handler,
            registry: Arc::new(ConnectionRegistry::default()),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of open connections
    pub fn active_connections(&self) -> usize {
        self.registry.len()
    }

    /// Accept loop (blocking until shutdown)
    pub fn run(&self, shutdown: &Shutdown) -> Result<()> {
        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match self.listener.accept() {
                Ok((stream, addr)) => {
                    // Blocks while the connection limit is reached
                    let acquired = select! {
                        send(self.permits.0, ()) -> res => res.is_ok(),
                        recv(shutdown.receiver()) -> _ => false,
                    };
                    if !acquired {
                        break;
                    }

                    if let Err(e) = self.spawn_connection(stream, shutdown.clone()) {
                        tracing::error!(peer = %addr, error = %e, "failed to start connection");
                        let _ = self.permits.1.try_recv();
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    shutdown.wait_timeout(ACCEPT_POLL_INTERVAL);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                    return Err(e.into());
                }
            }
        }

        tracing::info!(address = %self.local_addr, "stopped accepting connections");
        Ok(())
    }

    /// Wait up to `grace` for connections to finish, then force-close the rest
    ///
    /// Returns true if every connection finished on its own.
    pub fn drain(&self, grace: Duration) -> bool {
        if self.registry.wait_drained(Instant::now() + grace) {
            tracing::info!("all connections closed");
            return true;
        }

        tracing::info!(open = self.registry.len(), "force shutdown of remaining connections");
        self.registry.close_all();
        false
    }

    /// Run one accepted connection on its own thread
    ///
    /// The caller holds a permit; the thread frees it when the connection ends.
    fn spawn_connection(&self, stream: TcpStream, shutdown: Shutdown) -> Result<()> {
        stream.set_nonblocking(false)?;
        let registered = stream.try_clone()?;

        let handler = Arc::clone(&self.handler);
        let registry = Arc::clone(&self.registry);
        let release = self.permits.1.clone();
        let options = self.options.clone();

        thread::Builder::new()
            .name("tidekv-conn".to_string())
            .spawn(move || {
                let id = registry.register(registered);
                let mut peer = None;

                let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<()> {
                    let mut connection =
                        Connection::new(stream, Arc::clone(&handler), options.max_message_size)?;
                    peer = Some(connection.peer_addr().to_string());
                    connection.set_idle_timeout(options.idle_timeout)?;
                    connection.handle(&shutdown)
                }));

                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::debug!(error = %e, "connection ended with error"),
                    Err(_) => tracing::error!("panic recovered in connection handler"),
                }

                if let Some(peer) = peer {
                    handler.on_disconnect(&peer);
                }
                registry.unregister(id);
                let _ = release.recv();
            })?;

        Ok(())
    }
}
