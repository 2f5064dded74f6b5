//! Resolve command - locate the raw fileset of a bin

use anyhow::Result;
use clap::Args;
use ifcbdb_core::domain::Pid;
use ifcbdb_data::{BinResolver, ResolveError};

use crate::context::CliContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct ResolveCommand {
    /// Permanent identifier, e.g. D20190102T1234_IFCB927
    pub pid: Pid,
}

impl ResolveCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let backend = ctx.connect().await?;
        let resolver =
            BinResolver::new(backend.store.clone()).follow_links(ctx.config().scanner.follow_links);

        match resolver.resolve(&self.pid).await {
            Ok(resolved) => {
                let fileset = &resolved.fileset;
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "pid": self.pid,
                        "found": true,
                        "dataset_id": resolved.dataset_id,
                        "directory_id": resolved.directory_id,
                        "hdr": fileset.hdr_path(),
                        "adc": fileset.adc_path(),
                        "roi": fileset.roi_path(),
                    }));
                } else {
                    formatter.success(&format!("{} found", self.pid));
                    formatter.info(&format!("hdr: {}", fileset.hdr_path().display()));
                    formatter.info(&format!("adc: {}", fileset.adc_path().display()));
                    formatter.info(&format!("roi: {}", fileset.roi_path().display()));
                }
                Ok(())
            }
            // A miss is an answer, not a failure of the command
            Err(ResolveError::NotFound(pid)) => {
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({"pid": pid, "found": false}));
                } else {
                    formatter.warn(&format!(
                        "No data directory holds {}; its data may have been moved or archived",
                        pid
                    ));
                }
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
