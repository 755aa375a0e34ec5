use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "bagstore",
    about = "bagstore -- storage node for ledger-authorized content",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the storage node server
    Server(ServerArgs),
    /// Generate an operator key
    Keygen(KeygenArgs),
}

/// Flags override values from `--config`.
#[derive(Args, Debug, Default)]
pub struct ServerArgs {
    /// TOML node configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Storage provider worker ID
    #[arg(short, long)]
    pub worker: Option<u64>,
    /// Data uploading directory
    #[arg(short = 'd', long)]
    pub uploads: Option<PathBuf>,
    /// Server port
    #[arg(short = 'o', long)]
    pub port: Option<u16>,
    /// Enable data synchronization
    #[arg(short, long)]
    pub sync: bool,
    /// Interval between synchronizations, in minutes
    #[arg(short = 'i', long)]
    pub sync_interval: Option<u64>,
    /// Sync workers number (max fetches in progress)
    #[arg(short = 'r', long)]
    pub sync_workers: Option<usize>,
    /// Query node host and port (e.g. some.com:8081)
    #[arg(short, long, conflicts_with = "query_node_url")]
    pub query_node_host: Option<String>,
    /// Full query node GraphQL URL
    #[arg(long)]
    pub query_node_url: Option<String>,
    /// TOML ledger snapshot backing the development ledger
    #[arg(short, long)]
    pub ledger_snapshot: Option<PathBuf>,
    /// File holding the operator's hex-encoded key seed
    #[arg(short = 'k', long)]
    pub operator_key: Option<PathBuf>,
    /// Refuse uploads without a valid x-upload-token header
    #[arg(long)]
    pub require_upload_token: bool,
    /// Upload token validity window, in seconds
    #[arg(long)]
    pub max_token_age: Option<u64>,
}

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Write the seed to this file instead of printing it
    #[arg(short, long)]
    pub out: Option<PathBuf>,
    /// Overwrite an existing key file
    #[arg(long)]
    pub force: bool,
}
