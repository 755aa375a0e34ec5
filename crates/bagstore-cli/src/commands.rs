use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use tracing::info;

use bagstore_crypto::SigningKey;
use bagstore_server::{query_node_url, NodeConfig, StorageNode};
use bagstore_types::WorkerId;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Server(args) => cmd_server(args).await,
        Command::Keygen(args) => cmd_keygen(args),
    }
}

/// Configuration file (or defaults) with flags applied on top.
fn node_config(args: &ServerArgs) -> anyhow::Result<NodeConfig> {
    let mut config = match &args.config {
        Some(path) => NodeConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => NodeConfig::default(),
    };

    if let Some(worker) = args.worker {
        config.worker_id = WorkerId(worker);
    }
    if let Some(uploads) = &args.uploads {
        config.uploads_dir = uploads.clone();
    }
    if let Some(port) = args.port {
        config = config.with_port(port);
    }
    if args.sync {
        config.sync.enabled = true;
    }
    if let Some(minutes) = args.sync_interval {
        config.sync.interval_mins = minutes;
    }
    if let Some(workers) = args.sync_workers {
        config.sync.workers = workers;
    }
    if let Some(host) = &args.query_node_host {
        config.query_node_url = Some(query_node_url(host));
    }
    if let Some(url) = &args.query_node_url {
        config.query_node_url = Some(url.clone());
    }
    if let Some(path) = &args.ledger_snapshot {
        config.ledger_snapshot = Some(path.clone());
    }
    if let Some(path) = &args.operator_key {
        config.operator_key = Some(path.clone());
    }
    if args.require_upload_token {
        config.require_upload_token = true;
    }
    if let Some(secs) = args.max_token_age {
        config.auth.max_token_age_secs = Some(secs);
    }
    Ok(config)
}

async fn cmd_server(args: ServerArgs) -> anyhow::Result<()> {
    let config = node_config(&args)?;

    println!(
        "{} worker {} on {}",
        "bagstore".bold(),
        config.worker_id.to_string().yellow(),
        config.bind_addr.to_string().cyan()
    );
    if let Some(url) = &config.query_node_url {
        info!(url = %url, "query node endpoint set");
    }
    if config.sync.enabled {
        info!(
            interval_mins = config.sync.interval_mins,
            workers = config.sync.worker_count(),
            "synchronization enabled"
        );
    }

    let node = StorageNode::from_config(config)
        .await
        .context("starting storage node")?;
    node.serve().await?;
    println!("{} stopped.", "bagstore".bold());
    Ok(())
}

fn cmd_keygen(args: KeygenArgs) -> anyhow::Result<()> {
    let key = SigningKey::generate();
    match &args.out {
        Some(path) => {
            if path.exists() && !args.force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            write_key_file(path, &key)?;
            println!("{} Wrote operator key to {}", "✓".green().bold(), path.display());
        }
        None => println!("{} {}", "seed:   ".dimmed(), key.to_hex()),
    }
    println!("{} {}", "account:".bold(), key.account_id().to_string().cyan());
    Ok(())
}

fn write_key_file(path: &Path, key: &SigningKey) -> anyhow::Result<()> {
    std::fs::write(path, format!("{}\n", key.to_hex()))
        .with_context(|| format!("writing {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("restricting permissions of {}", path.display()))?;
    }
    Ok(())
}
