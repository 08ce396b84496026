//! Configuration for TideKV
//!
//! Centralized configuration with sensible defaults.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, TideError};

/// Main configuration for a TideKV node
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding the WAL segments
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal_00000000000000000001.log
    ///     └── wal_00000000000000000002.log
    pub data_dir: PathBuf,

    /// Number of independent shards in the engine
    pub shard_count: usize,

    /// Lock table size above which free per-key locks are evicted
    pub lock_table_sweep_threshold: usize,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Whether writes are logged at all (a node without WAL is purely in-memory)
    pub wal_enabled: bool,

    /// Records per batch before an immediate flush
    pub wal_batch_size: usize,

    /// Upper bound on how long a partial batch waits for its flush
    pub wal_flush_timeout: Duration,

    /// Segment size (bytes) after which a new segment file is started
    pub wal_max_segment_size: u64,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address for clients
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Idle connections are closed after this long without a request
    pub idle_timeout: Duration,

    /// Largest accepted client frame (bytes)
    pub max_message_size: usize,

    // -------------------------------------------------------------------------
    // Replication Configuration
    // -------------------------------------------------------------------------
    /// Replication role; `None` runs a standalone node
    pub replication: Option<ReplicationConfig>,
}

/// Replication settings
#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    /// Role of this node, fixed for the lifetime of the process
    pub role: ReplicaRole,

    /// Master replication endpoint: listen address on a master, dial address on a slave
    pub master_address: String,

    /// How often a slave polls the master
    pub sync_interval: Duration,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            role: ReplicaRole::Master,
            master_address: "127.0.0.1:3232".to_string(),
            sync_interval: Duration::from_secs(1),
        }
    }
}

/// Replication role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaRole {
    Master,
    Slave,
}

impl FromStr for ReplicaRole {
    type Err = TideError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "master" => Ok(ReplicaRole::Master),
            "slave" => Ok(ReplicaRole::Slave),
            other => Err(TideError::Config(format!("unknown replica role: {}", other))),
        }
    }
}

impl fmt::Display for ReplicaRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicaRole::Master => write!(f, "master"),
            ReplicaRole::Slave => write!(f, "slave"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./tidekv_data"),
            shard_count: 16,
            lock_table_sweep_threshold: 64 * 1024,
            wal_enabled: true,
            wal_batch_size: 100,
            wal_flush_timeout: Duration::from_millis(10),
            wal_max_segment_size: 10 * 1024 * 1024, // 10 MB
            listen_addr: "127.0.0.1:3223".to_string(),
            max_connections: 1024,
            idle_timeout: Duration::from_secs(300),
            max_message_size: 4 * 1024,
            replication: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.shard_count == 0 {
            return Err(TideError::Config("shard count must be positive".to_string()));
        }
        if self.wal_batch_size == 0 {
            return Err(TideError::Config("WAL batch size must be positive".to_string()));
        }
        if self.wal_flush_timeout.is_zero() {
            return Err(TideError::Config("WAL flush timeout must be positive".to_string()));
        }
        if self.wal_max_segment_size == 0 {
            return Err(TideError::Config("max segment size must be positive".to_string()));
        }
        if self.max_connections == 0 {
            return Err(TideError::Config("max connections must be positive".to_string()));
        }
        if let Some(replication) = &self.replication {
            if replication.role == ReplicaRole::Slave && replication.sync_interval.is_zero() {
                return Err(TideError::Config("sync interval must be positive".to_string()));
            }
            if !self.wal_enabled {
                return Err(TideError::Config("replication requires the WAL".to_string()));
            }
        }
        Ok(())
    }

    /// Role of this node, if replication is configured
    pub fn role(&self) -> Option<ReplicaRole> {
        self.replication.as_ref().map(|r| r.role)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (where WAL segments live)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the number of engine shards
    pub fn shard_count(mut self, count: usize) -> Self {
        self.config.shard_count = count;
        self
    }

    /// Set the lock table sweep threshold
    pub fn lock_table_sweep_threshold(mut self, threshold: usize) -> Self {
        self.config.lock_table_sweep_threshold = threshold;
        self
    }

    /// Enable or disable the WAL
    pub fn wal_enabled(mut self, enabled: bool) -> Self {
        self.config.wal_enabled = enabled;
        self
    }

    /// Set the WAL batch size (records)
    pub fn wal_batch_size(mut self, size: usize) -> Self {
        self.config.wal_batch_size = size;
        self
    }

    /// Set the WAL flush timeout
    pub fn wal_flush_timeout(mut self, timeout: Duration) -> Self {
        self.config.wal_flush_timeout = timeout;
        self
    }

    /// Set the maximum segment size (bytes)
    pub fn wal_max_segment_size(mut self, size: u64) -> Self {
        self.config.wal_max_segment_size = size;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the idle connection timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Set the maximum client frame size (bytes)
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// Configure replication
    pub fn replication(mut self, replication: ReplicationConfig) -> Self {
        self.config.replication = Some(replication);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// Parse a human-readable size such as `"10MB"`, `"512 KB"` or `"64B"`.
///
/// Units are binary (`KB` = 1024 bytes). A bare number is taken as bytes.
pub fn parse_size(input: &str) -> Result<u64> {
    let input = input.trim();
    let digits_end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());

    let (number, unit) = input.split_at(digits_end);
    if number.is_empty() {
        return Err(TideError::Config(format!("invalid size: {:?}", input)));
    }

    let value: u64 = number
        .parse()
        .map_err(|_| TideError::Config(format!("invalid size: {:?}", input)))?;

    let shift = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 0,
        "KB" => 10,
        "MB" => 20,
        "GB" => 30,
        other => {
            return Err(TideError::Config(format!("invalid size unit: {:?}", other)));
        }
    };

    value
        .checked_mul(1u64 << shift)
        .ok_or_else(|| TideError::Config(format!("size overflows: {:?}", input)))
}
