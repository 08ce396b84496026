//! TideKV Server Binary
//!
//! Starts a TideKV node: client listener, WAL flusher and, when
//! configured, the replication master or slave.

use std::time::Duration;

use clap::Parser;
use tidekv::config::parse_size;
use tidekv::{Config, Node, ReplicaRole, ReplicationConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// TideKV Server
#[derive(Parser, Debug)]
#[command(name = "tidekv-server")]
#[command(about = "In-memory multi-version key-value store")]
#[command(version)]
struct Args {
    /// Data directory (WAL segments)
    #[arg(short, long, default_value = "./tidekv_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:3223")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Close connections idle for this many seconds
    #[arg(long, default_value = "300")]
    idle_timeout_secs: u64,

    /// Largest accepted request, e.g. 4KB
    #[arg(long, default_value = "4KB")]
    max_message_size: String,

    /// Number of engine shards
    #[arg(long, default_value = "16")]
    shards: usize,

    /// Run without a WAL (no durability, no replication)
    #[arg(long)]
    no_wal: bool,

    /// Records per WAL batch
    #[arg(long, default_value = "100")]
    wal_batch_size: usize,

    /// Longest a partial WAL batch waits, in milliseconds
    #[arg(long, default_value = "10")]
    wal_flush_timeout_ms: u64,

    /// WAL segment size before rotation, e.g. 10MB
    #[arg(long, default_value = "10MB")]
    max_segment_size: String,

    /// Replication role: master or slave
    #[arg(long)]
    role: Option<ReplicaRole>,

    /// Master replication address (listen on a master, dial on a slave)
    #[arg(long, default_value = "127.0.0.1:3232")]
    master_address: String,

    /// Slave poll interval, in milliseconds
    #[arg(long, default_value = "1000")]
    sync_interval_ms: u64,

    /// Log filter, overrides RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
}

fn main() {
    let args = Args::parse();

    // Initialize tracing/logging
    let filter = match &args.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,tidekv=debug")),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    tracing::info!("TideKV Server v{}", tidekv::VERSION);

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("Listen address: {}", config.listen_addr);

    let node = match Node::start(config) {
        Ok(node) => node,
        Err(e) => {
            tracing::error!("Failed to start node: {}", e);
            std::process::exit(1);
        }
    };

    // Every acknowledged write is already durable, so the process may be
    // stopped at any point; this only returns if the node is cancelled.
    let token = node.shutdown_token();
    let _ = token.receiver().recv();

    node.shutdown(Duration::from_secs(5));
    tracing::info!("Server stopped");
}

fn build_config(args: &Args) -> tidekv::Result<Config> {
    let mut builder = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .idle_timeout(Duration::from_secs(args.idle_timeout_secs))
        .max_message_size(parse_size(&args.max_message_size)? as usize)
        .shard_count(args.shards)
        .wal_enabled(!args.no_wal)
        .wal_batch_size(args.wal_batch_size)
        .wal_flush_timeout(Duration::from_millis(args.wal_flush_timeout_ms))
        .wal_max_segment_size(parse_size(&args.max_segment_size)?);

    if let Some(role) = args.role {
        builder = builder.replication(ReplicationConfig {
            role,
            master_address: args.master_address.clone(),
            sync_interval: Duration::from_millis(args.sync_interval_ms),
        });
    }

    let config = builder.build();
    config.validate()?;
    Ok(config)
}
