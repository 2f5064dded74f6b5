//! IFCB Dashboard CLI - manage and synchronize IFCB datasets
//!
//! Provides commands for:
//! - Creating datasets and registering their data directories
//! - Synchronizing datasets with the filesets on disk
//! - Polling sync state and clearing leaked locks
//! - Scanning directories and resolving bins to filesets
//! - Querying bins and metric timelines

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ifcbdb_core::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod output;

use commands::{
    config::ConfigCommand, dataset::DatasetCommand, directory::DirectoryCommand,
    query::QueryCommand, resolve::ResolveCommand, scan::ScanCommand, status::StatusCommand,
    sync::SyncCommand, unlock::UnlockCommand,
};
use context::CliContext;
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "ifcbdb", version, about = "IFCB dataset dashboard tooling")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use this database file instead of the configured one
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage datasets
    #[command(subcommand)]
    Dataset(DatasetCommand),
    /// Manage the data directories of a dataset
    #[command(subcommand)]
    Directory(DirectoryCommand),
    /// Synchronize a dataset with its raw data directories
    Sync(SyncCommand),
    /// Show the state of a dataset's latest sync
    Status(StatusCommand),
    /// Release a sync lock left behind by a crashed run
    Unlock(UnlockCommand),
    /// List the filesets under a directory
    Scan(ScanCommand),
    /// Locate the raw fileset of a bin
    Resolve(ResolveCommand),
    /// Query stored bins
    #[command(subcommand)]
    Query(QueryCommand),
    /// View and check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Installs the tracing subscriber
///
/// `RUST_LOG` wins over `-v`, which wins over the configured level. Logs
/// go to stderr so `--json` output on stdout stays clean.
fn init_tracing(verbose: u8, logging: &LoggingConfig) {
    let level = match verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut ctx = CliContext::load(cli.config.as_deref())?;
    if let Some(database) = cli.database.clone() {
        ctx = ctx.with_database(database);
    }

    init_tracing(cli.verbose, &ctx.config().logging);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match &cli.command {
        Commands::Dataset(cmd) => cmd.execute(&ctx, format).await,
        Commands::Directory(cmd) => cmd.execute(&ctx, format).await,
        Commands::Sync(cmd) => cmd.execute(&ctx, format).await,
        Commands::Status(cmd) => cmd.execute(&ctx, format).await,
        Commands::Unlock(cmd) => cmd.execute(&ctx, format).await,
        Commands::Scan(cmd) => cmd.execute(&ctx, format).await,
        Commands::Resolve(cmd) => cmd.execute(&ctx, format).await,
        Commands::Query(cmd) => cmd.execute(&ctx, format).await,
        Commands::Config(cmd) => cmd.execute(&ctx, format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sync_with_timeout() {
        let cli = Cli::try_parse_from(["ifcbdb", "--json", "sync", "mvco", "--timeout", "30"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Sync(cmd) => {
                assert_eq!(cmd.dataset, "mvco");
                assert_eq!(cmd.timeout, Some(30));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_directory_add_defaults() {
        let cli = Cli::try_parse_from(["ifcbdb", "directory", "add", "mvco", "/data/mvco"]).unwrap();
        match cli.command {
            Commands::Directory(DirectoryCommand::Add { priority, whitelist, .. }) => {
                assert_eq!(priority, 1);
                assert!(whitelist.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_query_latest_at() {
        let cli =
            Cli::try_parse_from(["ifcbdb", "query", "latest", "mvco", "--at", "2019-01-04"]).unwrap();
        match cli.command {
            Commands::Query(QueryCommand::Latest { dataset, at }) => {
                assert_eq!(dataset, "mvco");
                let at = at.map(|t| t.to_rfc3339());
                assert_eq!(at.as_deref(), Some("2019-01-04T00:00:00+00:00"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_database_flag_is_global() {
        let cli =
            Cli::try_parse_from(["ifcbdb", "status", "mvco", "--database", "/tmp/x.db"]).unwrap();
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/x.db")));
    }

    #[test]
    fn test_parse_rejects_bad_pid() {
        assert!(Cli::try_parse_from(["ifcbdb", "resolve", "not-a-bin"]).is_err());
    }
}
