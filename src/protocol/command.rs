//! Command definitions
//!
//! Text commands from clients and their parser.
//!
//! ## Grammar
//! ```text
//! GET <key> | SET <key> <value> | DEL <key> | BEGIN | COMMIT | ROLLBACK
//! ```
//! Tokens are whitespace-separated; keywords are case-insensitive.

use std::fmt;

use crate::error::{Result, TideError};

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    Get,
    Set,
    Del,
    Begin,
    Commit,
    Rollback,
}

impl CommandType {
    fn from_keyword(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "get" => Some(CommandType::Get),
            "set" => Some(CommandType::Set),
            "del" => Some(CommandType::Del),
            "begin" => Some(CommandType::Begin),
            "commit" => Some(CommandType::Commit),
            "rollback" => Some(CommandType::Rollback),
            _ => None,
        }
    }

    /// Number of arguments the command takes
    pub fn arg_count(self) -> usize {
        match self {
            CommandType::Set => 2,
            CommandType::Get | CommandType::Del => 1,
            CommandType::Begin | CommandType::Commit | CommandType::Rollback => 0,
        }
    }

    /// Whether the command mutates data
    pub fn is_write(self) -> bool {
        matches!(self, CommandType::Set | CommandType::Del)
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Get a value by key
    Get { key: String },

    /// Set a key to a value
    Set { key: String, value: String },

    /// Delete a key
    Del { key: String },

    /// Open a session transaction
    Begin,

    /// Commit the session transaction
    Commit,

    /// Discard the session transaction
    Rollback,
}

impl Command {
    /// Parse one line of client input
    pub fn parse(source: &str) -> Result<Self> {
        let tokens: Vec<&str> = source.split_whitespace().collect();
        let (keyword, args) = tokens
            .split_first()
            .ok_or_else(|| TideError::InvalidCommand("empty command".to_string()))?;

        let command_type = CommandType::from_keyword(keyword).ok_or_else(|| {
            tracing::debug!(keyword, "bad command type");
            TideError::InvalidCommand("bad command type".to_string())
        })?;

        if args.len() != command_type.arg_count() {
            tracing::debug!(
                args = args.len(),
                expected = command_type.arg_count(),
                "bad amount of args"
            );
            return Err(TideError::InvalidCommand("bad amount of args".to_string()));
        }

        Ok(match command_type {
            CommandType::Get => Command::Get {
                key: args[0].to_string(),
            },
            CommandType::Set => Command::Set {
                key: args[0].to_string(),
                value: args[1].to_string(),
            },
            CommandType::Del => Command::Del {
                key: args[0].to_string(),
            },
            CommandType::Begin => Command::Begin,
            CommandType::Commit => Command::Commit,
            CommandType::Rollback => Command::Rollback,
        })
    }

    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Get { .. } => CommandType::Get,
            Command::Set { .. } => CommandType::Set,
            Command::Del { .. } => CommandType::Del,
            Command::Begin => CommandType::Begin,
            Command::Commit => CommandType::Commit,
            Command::Rollback => CommandType::Rollback,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Get { key } => write!(f, "GET {}", key),
            Command::Set { key, value } => write!(f, "SET {} {}", key, value),
            Command::Del { key } => write!(f, "DEL {}", key),
            Command::Begin => write!(f, "BEGIN"),
            Command::Commit => write!(f, "COMMIT"),
            Command::Rollback => write!(f, "ROLLBACK"),
        }
    }
}
