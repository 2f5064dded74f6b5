//! Sync command - synchronize a dataset with its data directories
//!
//! Provides the `ifcbdb sync` CLI command which:
//! 1. Requests a sync (answers LOCKED if another run holds the dataset)
//! 2. Polls the task until it finishes
//! 3. Prints the sync report
//!
//! The run lives inside this process, so leaving early would orphan it.
//! `--timeout` and Ctrl-C instead cancel the run, which stops at its next
//! checkpoint, releases the lock and ends FAILED.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use ifcbdb_core::domain::{SyncReport, SyncState, TaskId, TaskState, TaskStatus};
use tracing::{info, warn};

use crate::context::{Backend, CliContext};
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Dataset name or id
    pub dataset: String,

    /// Cancel the run after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let backend = ctx.connect().await?;
        let dataset = backend.dataset(&self.dataset).await?;

        let request = backend
            .service
            .request_sync(dataset.id())
            .await
            .context("Failed to request sync")?;

        let task_id = match (request.state, request.task_id) {
            (SyncState::Locked, _) | (_, None) => {
                let since = backend.service.lock_held_since(dataset.id()).await?;
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "dataset": dataset.name(),
                        "state": SyncState::Locked,
                        "held_since": since,
                    }));
                } else {
                    formatter.warn(&format!("A sync of {} is already in progress", dataset.name()));
                    if let Some(since) = since {
                        formatter.info(&format!(
                            "Locked since {}; use 'ifcbdb unlock' if that run crashed",
                            since.format("%Y-%m-%d %H:%M:%S UTC")
                        ));
                    }
                }
                return Ok(());
            }
            (_, Some(task_id)) => task_id,
        };

        formatter.info(&format!("Synchronizing {} (task {})...", dataset.name(), task_id));
        let status = self.wait(&backend, &task_id, ctx.config().sync.poll_interval()).await?;

        match status.state {
            TaskState::Succeeded => {
                let report: SyncReport = status
                    .info
                    .clone()
                    .map(serde_json::from_value)
                    .transpose()
                    .context("Malformed sync report")?
                    .unwrap_or_default();
                print_report(&report, format, &*formatter);
                Ok(())
            }
            _ => {
                let reason = status
                    .info
                    .as_ref()
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown error")
                    .to_string();
                if format.is_json() {
                    formatter.print_json(&serde_json::to_value(&status)?);
                }
                anyhow::bail!("Sync of {} failed: {}", dataset.name(), reason)
            }
        }
    }

    /// Waits for the task, cancelling it on timeout or Ctrl-C
    async fn wait(
        &self,
        backend: &Backend,
        task_id: &TaskId,
        poll: Duration,
    ) -> Result<TaskStatus> {
        let deadline = async {
            match self.timeout {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            status = backend.service.wait_for(task_id, poll) => return Ok(status?),
            _ = deadline => warn!("Sync timed out; cancelling"),
            _ = tokio::signal::ctrl_c() => warn!("Interrupted; cancelling sync"),
        }

        backend.service.shutdown();
        let status = backend.service.wait_for(task_id, poll).await?;
        info!(state = %status.state, "Sync stopped");
        Ok(status)
    }
}

fn print_report(report: &SyncReport, format: OutputFormat, formatter: &dyn OutputFormatter) {
    if format.is_json() {
        formatter.print_json(&report.to_info());
        return;
    }

    let duration = if report.duration_ms >= 1000 {
        format!("{:.1}s", report.duration_ms as f64 / 1000.0)
    } else {
        format!("{}ms", report.duration_ms)
    };
    formatter.success(&format!("Synchronized {} in {}", report.dataset, duration));
    formatter.info(&format!("Directories scanned: {}", report.directories_scanned));
    formatter.info(&format!("Filesets found:      {}", report.filesets_found));
    formatter.info(&format!("Bins created:        {}", report.bins_created));
    formatter.info(&format!("Bins updated:        {}", report.bins_updated));
    formatter.info(&format!("Bins unchanged:      {}", report.bins_unchanged));
    formatter.info(&format!("Bins written:        {}", report.bins_written()));
    if report.duplicates_shadowed > 0 {
        formatter.info(&format!("Shadowed duplicates: {}", report.duplicates_shadowed));
    }
    if report.partial_filesets + report.malformed_filesets > 0 {
        formatter.info(&format!(
            "Skipped:             {} partial, {} malformed",
            report.partial_filesets, report.malformed_filesets
        ));
    }
    if !report.errors.is_empty() {
        formatter.warn(&format!("{} entries could not be read:", report.errors.len()));
        for error in &report.errors {
            formatter.info(&format!("  {}", error));
        }
    }
}
