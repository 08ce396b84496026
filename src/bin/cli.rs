//! TideKV CLI Client
//!
//! Command-line interface for interacting with TideKV. With a subcommand
//! it runs one command; without, it reads commands from stdin.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tidekv::network::Client;

/// TideKV CLI
#[derive(Parser, Debug)]
#[command(name = "tidekv-cli")]
#[command(about = "CLI for TideKV key-value store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:3223")]
    server: String,

    /// Connect/read/write timeout in seconds
    #[arg(long, default_value = "5")]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },
}

/// Responses can be at most one value, well under this
const MAX_RESPONSE_SIZE: usize = 1024 * 1024;

fn main() {
    let args = Args::parse();

    let timeout = Some(Duration::from_secs(args.timeout_secs));
    let mut client = match Client::connect(&args.server, timeout, MAX_RESPONSE_SIZE) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("failed to connect to {}: {}", args.server, e);
            std::process::exit(1);
        }
    };

    let result = match args.command {
        Some(command) => {
            let line = match command {
                Commands::Get { key } => format!("GET {}", key),
                Commands::Set { key, value } => format!("SET {} {}", key, value),
                Commands::Del { key } => format!("DEL {}", key),
            };
            client.execute(&line).map(|response| println!("{}", response))
        }
        None => repl(&mut client),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn repl(client: &mut Client) -> tidekv::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "# ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            return Ok(());
        }

        println!("{}", client.execute(line)?);
    }
}
