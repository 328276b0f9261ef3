//! EmberKV Admin Binary
//!
//! Runs a single engine operation against a data directory and exits.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use emberkv::wal::WalRecovery;
use emberkv::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// EmberKV administration tool
#[derive(Parser, Debug)]
#[command(name = "emberkv-admin")]
#[command(about = "Inspect and operate an EmberKV data directory")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./emberkv_data")]
    data_dir: String,

    /// Flush after this many memtable entries
    #[arg(short = 'e', long, default_value = "2000")]
    memtable_entries: usize,

    /// Flush after this many MB of memtable data
    #[arg(short = 'm', long, default_value = "64")]
    memtable_mb: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Flush the memtable to a new segment
    Flush,

    /// Merge all segments into one
    Compact,

    /// Print engine statistics
    Stats,

    /// Check the WAL without modifying it
    VerifyWal,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,emberkv=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> emberkv::Result<()> {
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .memtable_entry_limit(args.memtable_entries)
        .memtable_size_limit(args.memtable_mb * 1024 * 1024)
        .build();

    match args.command {
        Commands::Set { key, value } => {
            Engine::open(config)?.put(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Get { key } => match Engine::open(config)?.get(key.as_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Commands::Flush => {
            Engine::open(config)?.flush()?;
            println!("Flushed to disk");
        }
        Commands::Compact => {
            Engine::open(config)?.compact()?;
            println!("Compacted");
        }
        Commands::Stats => println!("{:#?}", Engine::open(config)?.stats()),
        Commands::VerifyWal => {
            // Read-only: opening an engine would truncate a torn tail
            let wal_path = config.data_dir.join("wal.log");
            if wal_path.exists() {
                println!("{:#?}", WalRecovery::verify(&wal_path)?);
            } else {
                println!("no WAL at {}", wal_path.display());
            }
        }
    }

    Ok(())
}
