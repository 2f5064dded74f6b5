//! Directory command - manage the data directories of a dataset

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use ifcbdb_core::domain::{DataDirectory, DirectoryId, DirectoryKind};
use ifcbdb_core::ports::IDatasetStore;
use tracing::info;

use crate::context::CliContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum DirectoryCommand {
    /// Register a data directory
    Add {
        /// Dataset name or id
        dataset: String,
        /// Directory root; relative paths are resolved against the working directory
        path: PathBuf,
        /// `raw` or `derived`
        #[arg(long, default_value = "raw")]
        kind: DirectoryKind,
        /// Search order within the dataset (lower is searched first)
        #[arg(long, default_value_t = 1)]
        priority: i32,
        /// Comma-separated directory-name substrings to descend into
        #[arg(long)]
        whitelist: Option<String>,
        /// Comma-separated directory-name substrings to skip
        #[arg(long)]
        blacklist: Option<String>,
    },
    /// List a dataset's directories in search order
    List {
        /// Dataset name or id
        dataset: String,
    },
    /// Remove a data directory
    Remove {
        /// Directory id
        id: DirectoryId,
    },
}

impl DirectoryCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let backend = ctx.connect().await?;

        match self {
            DirectoryCommand::Add {
                dataset,
                path,
                kind,
                priority,
                whitelist,
                blacklist,
            } => {
                let dataset = backend.dataset(dataset).await?;
                let path = absolute(path)?;
                if !path.is_dir() {
                    formatter.warn(&format!("{} is not a directory yet", path.display()));
                }

                let scanner = &ctx.config().scanner;
                let directory = DataDirectory::new(*dataset.id(), path)?
                    .with_kind(*kind)
                    .with_priority(*priority)
                    .with_whitelist(whitelist.as_deref().unwrap_or(&scanner.default_whitelist))
                    .with_blacklist(blacklist.as_deref().unwrap_or(&scanner.default_blacklist));
                backend
                    .store
                    .save_directory(&directory)
                    .await
                    .context("Failed to save data directory")?;
                info!(dataset = %dataset.name(), directory = %directory, "Directory added");

                if format.is_json() {
                    formatter.print_json(&serde_json::to_value(&directory)?);
                } else {
                    formatter.success(&format!("Added {} to {}", directory, dataset.name()));
                    formatter.info(&format!("id: {}", directory.id()));
                }
            }
            DirectoryCommand::List { dataset } => {
                let dataset = backend.dataset(dataset).await?;
                let directories = backend.store.list_directories(dataset.id(), None).await?;

                if format.is_json() {
                    formatter.print_json(&serde_json::to_value(&directories)?);
                } else if directories.is_empty() {
                    formatter.info(&format!("{} has no data directories", dataset.name()));
                } else {
                    formatter.success(&format!("Data directories of {}", dataset.name()));
                    for d in &directories {
                        let synced = d
                            .last_synced()
                            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                            .unwrap_or_else(|| "never".to_string());
                        formatter.info(&format!("[{}] {}", d.priority(), d));
                        formatter.info(&format!(
                            "    id: {}  whitelist: {}  blacklist: {}  last synced: {}",
                            d.id(),
                            d.whitelist_string(),
                            d.blacklist_string(),
                            synced
                        ));
                    }
                }
            }
            DirectoryCommand::Remove { id } => {
                let removed = backend.store.delete_directory(id).await?;
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({"id": id, "removed": removed}));
                } else if removed {
                    formatter.success(&format!("Removed directory {}", id));
                } else {
                    anyhow::bail!("No data directory with id {}", id);
                }
            }
        }
        Ok(())
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    Ok(cwd.join(path))
}
