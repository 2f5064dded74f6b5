//! Status command - report the latest sync of a dataset
//!
//! A dataset with no recorded task reports PENDING, the same answer a
//! poller gets just before a requested sync starts.

use anyhow::Result;
use clap::Args;
use ifcbdb_core::ports::IDatasetStore;

use crate::context::CliContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Dataset name or id
    pub dataset: String,
}

impl StatusCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let backend = ctx.connect().await?;
        let dataset = backend.dataset(&self.dataset).await?;

        let status = backend.service.sync_status(dataset.id()).await?;
        let held_since = backend.service.lock_held_since(dataset.id()).await?;
        let directories = backend.store.list_directories(dataset.id(), None).await?;
        let last_synced = directories.iter().filter_map(|d| d.last_synced()).max();
        let bins = backend.store.count_bins(dataset.id()).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "dataset": dataset.name(),
                "state": status.state,
                "info": status.info,
                "locked_since": held_since,
                "last_synced": last_synced,
                "bins": bins,
            }));
            return Ok(());
        }

        formatter.success(&format!("{}: {}", dataset.name(), status.state));
        if let Some(info) = &status.info {
            match info.as_str() {
                Some(message) => formatter.info(&format!("Info: {}", message)),
                None => formatter.info(&format!("Info: {}", info)),
            }
        }
        if let Some(since) = held_since {
            formatter.info(&format!("Locked since {}", since.format("%Y-%m-%d %H:%M:%S UTC")));
        }
        match last_synced {
            Some(at) => formatter.info(&format!("Last synced: {}", at.format("%Y-%m-%d %H:%M:%S UTC"))),
            None => formatter.info("Last synced: never"),
        }
        formatter.info(&format!("Bins: {}", bins));
        Ok(())
    }
}
