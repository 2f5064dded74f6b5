//! Unlock command - clear a sync lock left behind by a crashed run

use anyhow::Result;
use clap::Args;

use crate::context::CliContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct UnlockCommand {
    /// Dataset name or id
    pub dataset: String,
}

impl UnlockCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let backend = ctx.connect().await?;
        let dataset = backend.dataset(&self.dataset).await?;

        let held_since = backend.service.lock_held_since(dataset.id()).await?;
        let removed = backend.service.force_unlock(dataset.id()).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "dataset": dataset.name(),
                "removed": removed,
                "held_since": held_since,
            }));
        } else if removed {
            formatter.success(&format!("Released sync lock of {}", dataset.name()));
            if let Some(since) = held_since {
                formatter.info(&format!("Held since {}", since.format("%Y-%m-%d %H:%M:%S UTC")));
            }
        } else {
            formatter.info(&format!("{} is not locked", dataset.name()));
        }
        Ok(())
    }
}
