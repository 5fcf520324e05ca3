use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tracing::warn;

use cradlesync::cli::args::{Cli, Commands};
use cradlesync::cli::commands::{self, EnqueueArgs};
use cradlesync::config::{Config, Paths};
use cradlesync::error::Error;
use cradlesync::storage::SqliteStore;
use cradlesync::sync::{HttpRemote, SyncQueue};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}

async fn run() -> Result<(), Error> {
    let cli = Cli::parse();
    let format = cli.output;

    if let Commands::Completions { shell } = cli.command {
        print!("{}", commands::completions(shell)?);
        return Ok(());
    }

    let paths = match cli.root {
        Some(root) => Paths::with_root(root),
        None => Paths::new()?,
    };
    let config_file = cli.config.unwrap_or_else(|| paths.config_file.clone());
    let config = Config::load_from_path(&config_file)?;
    cradlesync::logging::init(&config.logging.filter);

    paths.ensure_dirs()?;
    let store = SqliteStore::open_at(&paths.database)?;
    let remote = HttpRemote::new(
        &config.remote.base_url,
        config.remote.timeout(),
        config.remote.auth_token.clone(),
    )?;
    let client = remote.client().clone();

    let queue = SyncQueue::with_policy(Arc::new(store), Arc::new(remote), config.sync.retry_policy());
    if let Some(reason) = queue.load_error() {
        warn!(%reason, "started with an empty queue");
    }

    let output = match cli.command {
        Commands::Status => commands::status(&queue, format)?,
        Commands::List { limit } => commands::list(&queue, limit, format)?,
        Commands::Enqueue {
            change_type,
            payload,
            payload_file,
            target,
            id,
        } => commands::enqueue(
            &queue,
            EnqueueArgs {
                change_type,
                payload,
                payload_file,
                target,
                id,
            },
            format,
        )?,
        Commands::Dequeue { id } => commands::dequeue(&queue, &id, format)?,
        Commands::Clear { force } => commands::clear(&queue, force, format)?,
        Commands::Run => {
            commands::run(&queue, client, config.probe_url(), format).await?
        },
        Commands::DeadLetters { limit } => commands::dead_letters(&queue, limit, format)?,
        Commands::Daemon { interval } => {
            commands::daemon(queue.clone(), client, &config, interval).await?
        },
        Commands::Completions { .. } => String::new(),
    };

    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
