use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "cradlesync")]
#[command(about = "Offline change queue and sync engine for baby-care tracking")]
#[command(long_about = "cradlesync - offline sync queue for baby-care tracking

Records feeding, sleep, nappy, milestone and appointment changes while the
device is offline and replays them against the backend, in order, once
connectivity returns.

QUICK START:
  cradlesync status                         Show queue status
  cradlesync enqueue -t tracking-record -p '{\"id\":\"t1\"}'
  cradlesync run                            Run one sync pass now
  cradlesync daemon                         Sync on reconnect and every interval

OUTPUT FORMATS:
  --output pretty    Human-readable colored output (default)
  --output json      Machine-readable JSON for scripting")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// Output format for command results
    #[arg(short, long, value_enum, default_value = "pretty", global = true)]
    pub output: OutputFormat,

    /// Data directory (defaults to ~/.cradlesync)
    #[arg(long, global = true, env = "CRADLESYNC_ROOT")]
    pub root: Option<PathBuf>,

    /// Config file (defaults to <root>/config.yaml)
    #[arg(long, global = true, env = "CRADLESYNC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for command results.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable colored output.
    #[default]
    Pretty,
    /// Machine-readable JSON output.
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show sync queue status
    ///
    /// Displays pending count, last sync time and dead-lettered changes.
    Status,

    /// List pending changes in queue order
    List {
        /// Maximum changes to show
        #[arg(long, short = 'n', default_value = "20")]
        limit: usize,
    },

    /// Add a change to the queue
    ///
    /// Examples:
    ///   cradlesync enqueue -t milestone-create -p '{"id":"m1","title":"First smile"}'
    ///   cradlesync enqueue -t baby-update --payload-file baby.json
    ///   cradlesync enqueue -t milestone-delete --target m1
    Enqueue {
        /// Change type (baby-update, milestone-create, tracking-record, ...)
        #[arg(long = "type", short = 't')]
        change_type: String,

        /// Inline JSON payload
        #[arg(long, short = 'p', conflicts_with_all = ["payload_file", "target"])]
        payload: Option<String>,

        /// Read the payload from a file
        #[arg(long, conflicts_with = "target")]
        payload_file: Option<PathBuf>,

        /// Record to delete (milestone-delete, appointment-delete)
        #[arg(long)]
        target: Option<String>,

        /// Explicit change id (generated if omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// Remove a pending change by id
    Dequeue {
        /// Change id
        id: String,
    },

    /// Remove every pending change
    Clear {
        /// Required confirmation
        #[arg(long)]
        force: bool,
    },

    /// Run one sync pass against the backend
    Run,

    /// List changes abandoned after exhausting their retries
    DeadLetters {
        /// Maximum entries to show
        #[arg(long, short = 'n', default_value = "20")]
        limit: usize,
    },

    /// Keep syncing: on reconnect and on a fixed interval, until Ctrl-C
    Daemon {
        /// Override the configured interval, in seconds
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Generate shell completions
    ///
    /// Example: cradlesync completions bash > ~/.bash_completion.d/cradlesync
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_enqueue() {
        let cli = Cli::parse_from([
            "cradlesync",
            "enqueue",
            "-t",
            "tracking-record",
            "-p",
            "{}",
            "--id",
            "abc",
        ]);
        match cli.command {
            Commands::Enqueue {
                change_type,
                payload,
                id,
                payload_file,
                ..
            } => {
                assert_eq!(change_type, "tracking-record");
                assert_eq!(payload.as_deref(), Some("{}"));
                assert_eq!(id.as_deref(), Some("abc"));
                assert!(payload_file.is_none());
            },
            _ => panic!("expected enqueue"),
        }
    }

    #[test]
    fn test_payload_sources_conflict() {
        let result = Cli::try_parse_from([
            "cradlesync",
            "enqueue",
            "-t",
            "baby-update",
            "-p",
            "{}",
            "--payload-file",
            "x.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_output_flag() {
        let cli = Cli::parse_from(["cradlesync", "status", "--output", "json"]);
        assert_eq!(cli.output, OutputFormat::Json);
    }
}
