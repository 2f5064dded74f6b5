//! Dataset command - create and list datasets

use anyhow::{Context, Result};
use clap::Subcommand;
use ifcbdb_core::domain::Dataset;
use ifcbdb_core::ports::IDatasetStore;
use tracing::info;

use crate::context::CliContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum DatasetCommand {
    /// Create a dataset
    Add {
        /// Unique dataset name
        name: String,
        /// Human-readable title (defaults to the name)
        #[arg(long)]
        title: Option<String>,
    },
    /// List datasets with their bin counts
    List,
}

impl DatasetCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let backend = ctx.connect().await?;

        match self {
            DatasetCommand::Add { name, title } => {
                if backend.store.get_dataset_by_name(name).await?.is_some() {
                    anyhow::bail!("Dataset '{}' already exists", name);
                }
                let dataset = Dataset::new(name.as_str(), title.as_deref().unwrap_or(name))?;
                backend
                    .store
                    .save_dataset(&dataset)
                    .await
                    .context("Failed to save dataset")?;
                info!(dataset = %dataset.name(), id = %dataset.id(), "Dataset created");

                if format.is_json() {
                    formatter.print_json(&serde_json::to_value(&dataset)?);
                } else {
                    formatter.success(&format!("Created dataset {} ({})", dataset.name(), dataset.id()));
                }
            }
            DatasetCommand::List => {
                let datasets = backend.store.list_datasets().await?;
                let mut rows = Vec::with_capacity(datasets.len());
                for dataset in &datasets {
                    let bins = backend.store.count_bins(dataset.id()).await?;
                    rows.push((dataset, bins));
                }

                if format.is_json() {
                    let json: Vec<_> = rows
                        .iter()
                        .map(|(d, bins)| {
                            serde_json::json!({
                                "id": d.id(),
                                "name": d.name(),
                                "title": d.title(),
                                "active": d.is_active(),
                                "bins": bins,
                            })
                        })
                        .collect();
                    formatter.print_json(&serde_json::Value::Array(json));
                } else if rows.is_empty() {
                    formatter.info("No datasets. Create one with 'ifcbdb dataset add <name>'.");
                } else {
                    formatter.info(&format!("{:<20} {:>8}  {}", "NAME", "BINS", "TITLE"));
                    for (d, bins) in rows {
                        formatter.info(&format!("{:<20} {:>8}  {}", d.name(), bins, d.title()));
                    }
                }
            }
        }
        Ok(())
    }
}
