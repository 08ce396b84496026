//! Node wiring
//!
//! Builds every component from a [`Config`] and owns the background
//! threads.
//!
//! ## Threads
//! ```text
//! client accept loop ── one thread per connection
//! WAL flusher                      (master / standalone)
//! replication listener             (master)
//! replication slave + replica apply (slave)
//! ```
//!
//! ## Shutdown Order
//! 1. stop accepting, stop the slave
//! 2. wait for open connections up to the grace deadline, then force-close
//! 3. join replication threads
//! 4. drain and stop the WAL flusher

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::{Config, ReplicaRole};
use crate::database::Database;
use crate::disk::SegmentDisk;
use crate::engine::ShardedEngine;
use crate::error::{Result, TideError};
use crate::mvcc::Coordinator;
use crate::network::{RequestHandler, Server, ServerOptions};
use crate::replication::{
    Master, Replication, Slave, TcpReplicationClient, DEFAULT_MAX_SEGMENT_MESSAGE,
};
use crate::shutdown::Shutdown;
use crate::wal::{SegmentLog, Wal, WalOptions};

/// Timeout for connecting to and exchanging with the master
const REPLICATION_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// A running TideKV node
pub struct Node {
    database: Arc<Database>,
    server: Arc<Server>,
    replication_server: Option<Arc<Server>>,
    /// Stops listeners, connections and the slave
    shutdown: Shutdown,
    /// Stops the WAL flusher, after everything else
    wal_shutdown: Shutdown,
    threads: Vec<(&'static str, JoinHandle<()>)>,
    wal_thread: Option<JoinHandle<()>>,
}

impl Node {
    /// Build, recover and start a node
    pub fn start(config: Config) -> Result<Self> {
        config.validate()?;
        let role = config.role();
        info!(data_dir = %config.data_dir.display(), role = ?role, "starting node");

        let engine = Arc::new(ShardedEngine::new(config.shard_count)?);

        let disk = if config.wal_enabled {
            Some(Arc::new(SegmentDisk::open(
                &config.data_dir,
                config.wal_max_segment_size,
            )?))
        } else {
            None
        };

        let wal = disk.as_ref().map(|disk| {
            let store = Arc::new(SegmentLog::new(Arc::clone(disk)));
            Arc::new(Wal::new(WalOptions::from_config(&config), store))
        });

        // A slave never logs its own writes; its segments come from the master
        let is_slave = role == Some(ReplicaRole::Slave);
        let coordinator_wal = if is_slave { None } else { wal.clone() };
        let coordinator = Coordinator::with_sweep_threshold(
            engine,
            coordinator_wal,
            config.lock_table_sweep_threshold,
        );

        let replication = match (&config.replication, &disk) {
            (Some(replication), Some(disk)) => Some(match replication.role {
                ReplicaRole::Master => Replication::Master(Arc::new(Master::new(Arc::clone(disk)))),
                ReplicaRole::Slave => {
                    let max_message = DEFAULT_MAX_SEGMENT_MESSAGE
                        .max(config.wal_max_segment_size as usize * 2);
                    let client = TcpReplicationClient::new(
                        replication.master_address.clone(),
                        REPLICATION_IO_TIMEOUT,
                    )
                    .with_max_message_size(max_message);
                    Replication::Slave(Arc::new(Slave::new(
                        replication.sync_interval,
                        Box::new(client),
                        Arc::clone(disk),
                    )?))
                }
            }),
            (Some(_), None) => {
                return Err(TideError::Config("replication requires the WAL".to_string()))
            }
            (None, _) => None,
        };

        let database = Arc::new(Database::new(coordinator, wal.clone(), replication.clone())?);
        database.recover()?;

        let shutdown = Shutdown::new();
        let wal_shutdown = Shutdown::new();
        let mut threads = Vec::new();

        let wal_thread = match (&wal, is_slave) {
            (Some(wal), false) => {
                let wal = Arc::clone(wal);
                let token = wal_shutdown.clone();
                Some(spawn("tidekv-wal", move || wal.run(&token))?)
            }
            _ => None,
        };

        let mut replication_server = None;
        match &replication {
            Some(Replication::Master(master)) => {
                let address = config
                    .replication
                    .as_ref()
                    .map(|r| r.master_address.clone())
                    .unwrap_or_default();
                let handler: Arc<dyn RequestHandler> = Arc::clone(master) as Arc<dyn RequestHandler>;
                let server = Arc::new(Server::bind(
                    &address,
                    ServerOptions::from_config(&config),
                    handler,
                )?);
                threads.push(("replication listener", spawn_server(&server, &shutdown)?));
                replication_server = Some(server);
            }
            Some(Replication::Slave(slave)) => {
                let slave = Arc::clone(slave);
                let token = shutdown.clone();
                threads.push(("replication slave", spawn("tidekv-slave", move || slave.run(&token))?));
            }
            None => {}
        }

        let handler: Arc<dyn RequestHandler> = Arc::clone(&database) as Arc<dyn RequestHandler>;
        let server = Arc::new(Server::bind(
            &config.listen_addr,
            ServerOptions::from_config(&config),
            handler,
        )?);
        threads.push(("client listener", spawn_server(&server, &shutdown)?));

        info!(address = %server.local_addr(), "node started");

        Ok(Self {
            database,
            server,
            replication_server,
            shutdown,
            wal_shutdown,
            threads,
            wal_thread,
        })
    }

    /// Address clients connect to
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// Address slaves connect to (masters only)
    pub fn replication_addr(&self) -> Option<SocketAddr> {
        self.replication_server.as_ref().map(|s| s.local_addr())
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    /// Token cancelled when the node begins shutting down
    pub fn shutdown_token(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Stop the node, giving open connections up to `grace` to finish
    pub fn shutdown(mut self, grace: Duration) {
        info!(grace_ms = grace.as_millis() as u64, "shutting down node");
        let deadline = Instant::now() + grace;

        self.shutdown.cancel();

        let servers = std::iter::once(&self.server).chain(self.replication_server.iter());
        for server in servers {
            server.drain(deadline.saturating_duration_since(Instant::now()));
        }

        for (name, handle) in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!(thread = name, "background thread panicked");
            }
        }
        self.database.join_replica_apply();

        self.wal_shutdown.cancel();
        if let Some(handle) = self.wal_thread.take() {
            if handle.join().is_err() {
                warn!("WAL flusher panicked");
            }
        }

        info!("node stopped");
    }
}

fn spawn<F>(name: &str, body: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    Ok(thread::Builder::new().name(name.to_string()).spawn(body)?)
}

fn spawn_server(server: &Arc<Server>, shutdown: &Shutdown) -> Result<JoinHandle<()>> {
    let server = Arc::clone(server);
    let token = shutdown.clone();
    spawn("tidekv-accept", move || {
        if let Err(e) = server.run(&token) {
            warn!(error = %e, "accept loop stopped with error");
        }
    })
}
