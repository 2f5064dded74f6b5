//! Sync executor
//!
//! One run reconciles a dataset's raw data directories with the stored bins.
//! Directories are processed in ascending priority order. Within each one a
//! blocking scan task walks the tree and reads headers while the async side
//! diffs readings against the store and writes them in batches:
//!
//! ```text
//! spawn_blocking(scan) ──ScanItem──→ mpsc ──→ diff vs store ──→ save_bins + link_bins
//! ```
//!
//! A permanent identifier already seen earlier in the run shadows later
//! occurrences, so the highest-priority copy of a fileset is the one stored.
//! Existing bins only get their metrics and `qc_no_rois` refreshed.
//!
//! The lock is not handled here: callers hold it for the whole run.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use ifcbdb_core::config::Config;
use ifcbdb_core::domain::{Bin, DataDirectory, Dataset, DatasetId, DirectoryKind, Pid, SyncReport};
use ifcbdb_core::ports::IDatasetStore;
use ifcbdb_data::{DataDirectoryScanner, Discovery, FilesetReading, ScanError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::SyncError;

/// Readings buffered between the scan thread and the writer
const SCAN_CHANNEL_CAPACITY: usize = 256;

/// Tuning for a sync run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Bins written per store transaction
    pub batch_size: usize,
    pub follow_links: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: 500,
            follow_links: false,
        }
    }
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.sync.batch_size.max(1),
            follow_links: config.scanner.follow_links,
        }
    }
}

// ============================================================================
// Scan side
// ============================================================================

/// What the scan thread hands to the writer
#[derive(Debug)]
enum ScanItem {
    Reading(Pid, FilesetReading),
    Partial { path: PathBuf, missing: Vec<&'static str> },
    Malformed(PathBuf),
    Failed { path: Option<PathBuf>, message: String },
}

/// Walks one directory, reading every complete fileset
///
/// Stops early when the receiver is gone. Only an unreadable root is an
/// error; everything else becomes a [`ScanItem`].
fn scan_directory(
    scanner: &DataDirectoryScanner,
    tx: &mpsc::Sender<ScanItem>,
) -> Result<(), ScanError> {
    scanner.check_root()?;

    for discovery in scanner.iter() {
        let item = match discovery {
            Discovery::Fileset(fileset) => match fileset.read() {
                Ok(reading) => ScanItem::Reading(fileset.pid().clone(), reading),
                Err(e) => ScanItem::Failed {
                    path: Some(fileset.hdr_path().to_path_buf()),
                    message: e.to_string(),
                },
            },
            Discovery::Partial { path, missing, .. } => ScanItem::Partial { path, missing },
            Discovery::Malformed(path) => ScanItem::Malformed(path),
            Discovery::Unreadable { path, message } => ScanItem::Failed { path, message },
        };

        if tx.blocking_send(item).is_err() {
            break;
        }
    }
    Ok(())
}

// ============================================================================
// Write side
// ============================================================================

#[derive(Default)]
struct PendingWrites {
    bins: Vec<Bin>,
    links: Vec<Pid>,
}

impl PendingWrites {
    fn len(&self) -> usize {
        self.links.len()
    }
}

/// Runs dataset reconciliations against a store
pub struct SyncExecutor {
    store: Arc<dyn IDatasetStore>,
    options: SyncOptions,
}

impl SyncExecutor {
    pub fn new(store: Arc<dyn IDatasetStore>, options: SyncOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Reconciles every raw directory of `dataset`
    ///
    /// `cancel` is checked before each directory and after each batch
    /// write; a cancelled run returns [`SyncError::Cancelled`].
    ///
    /// # Errors
    ///
    /// Fails when a directory root cannot be read or the store fails.
    /// Unreadable headers and entries are recorded in the report instead.
    #[tracing::instrument(skip(self, dataset, cancel), fields(dataset = %dataset.name()))]
    pub async fn run(
        &self,
        dataset: &Dataset,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, SyncError> {
        let clock = Instant::now();
        let mut report = SyncReport::new(dataset.name(), Utc::now());

        let directories = self
            .store
            .list_directories(dataset.id(), Some(DirectoryKind::Raw))
            .await?;
        info!(directories = directories.len(), "Starting dataset sync");

        let mut seen = HashSet::new();
        for directory in &directories {
            if cancel.is_cancelled() {
                info!("Sync cancelled between directories");
                return Err(SyncError::Cancelled);
            }
            self.sync_directory(dataset.id(), directory, &mut seen, &mut report, cancel)
                .await?;
        }

        report.duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            directories = report.directories_scanned,
            filesets = report.filesets_found,
            created = report.bins_created,
            updated = report.bins_updated,
            unchanged = report.bins_unchanged,
            written = report.bins_written(),
            shadowed = report.duplicates_shadowed,
            errors = report.errors.len(),
            duration_ms = report.duration_ms,
            "Dataset sync completed"
        );
        Ok(report)
    }

    async fn sync_directory(
        &self,
        dataset_id: &DatasetId,
        directory: &DataDirectory,
        seen: &mut HashSet<Pid>,
        report: &mut SyncReport,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        debug!(
            path = %directory.path().display(),
            priority = directory.priority(),
            "Scanning directory"
        );

        let scanner =
            DataDirectoryScanner::for_directory(directory).follow_links(self.options.follow_links);
        let (tx, mut rx) = mpsc::channel(SCAN_CHANNEL_CAPACITY);
        let producer = tokio::task::spawn_blocking(move || scan_directory(&scanner, &tx));

        let mut pending = PendingWrites::default();
        while let Some(item) = rx.recv().await {
            match item {
                ScanItem::Reading(pid, reading) => {
                    report.filesets_found += 1;
                    if !seen.insert(pid.clone()) {
                        debug!(pid = %pid, "Shadowed by a higher-priority directory");
                        report.duplicates_shadowed += 1;
                        continue;
                    }
                    self.diff(pid, &reading, &mut pending, report).await?;

                    if pending.len() >= self.options.batch_size {
                        self.flush(dataset_id, &mut pending).await?;
                        if cancel.is_cancelled() {
                            info!("Sync cancelled mid-directory");
                            return Err(SyncError::Cancelled);
                        }
                    }
                }
                ScanItem::Partial { path, missing } => {
                    debug!(path = %path.display(), ?missing, "Skipping partial fileset");
                    report.partial_filesets += 1;
                }
                ScanItem::Malformed(path) => {
                    debug!(path = %path.display(), "Skipping malformed fileset");
                    report.malformed_filesets += 1;
                }
                ScanItem::Failed { path, message } => {
                    let msg = match path {
                        Some(path) => format!("{}: {message}", path.display()),
                        None => message,
                    };
                    warn!(%msg, "Skipping unreadable entry");
                    report.errors.push(msg);
                }
            }
        }

        producer
            .await
            .map_err(|e| SyncError::Interrupted(e.to_string()))??;

        self.flush(dataset_id, &mut pending).await?;
        self.store
            .mark_directory_synced(directory.id(), Utc::now())
            .await?;
        report.directories_scanned += 1;
        Ok(())
    }

    /// Queues the create or update a reading calls for
    async fn diff(
        &self,
        pid: Pid,
        reading: &FilesetReading,
        pending: &mut PendingWrites,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        match self.store.get_bin(&pid).await? {
            None => {
                pending.bins.push(reading.to_new_bin(pid.clone()));
                report.bins_created += 1;
            }
            Some(mut bin) => {
                if reading.refresh(&mut bin) {
                    pending.bins.push(bin);
                    report.bins_updated += 1;
                } else {
                    report.bins_unchanged += 1;
                }
            }
        }
        // unchanged bins still get linked; the bin may be new to this dataset
        pending.links.push(pid);
        Ok(())
    }

    async fn flush(
        &self,
        dataset_id: &DatasetId,
        pending: &mut PendingWrites,
    ) -> Result<(), SyncError> {
        if pending.links.is_empty() {
            return Ok(());
        }
        let writes = std::mem::take(pending);
        if !writes.bins.is_empty() {
            self.store.save_bins(&writes.bins).await?;
        }
        self.store.link_bins(dataset_id, &writes.links).await?;
        debug!(bins = writes.bins.len(), links = writes.links.len(), "Flushed batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config_clamps_batch_size() {
        let mut config = Config::default();
        config.sync.batch_size = 0;
        config.scanner.follow_links = true;

        let options = SyncOptions::from_config(&config);
        assert_eq!(options.batch_size, 1);
        assert!(options.follow_links);
    }

    #[test]
    fn test_default_options() {
        assert_eq!(SyncOptions::default().batch_size, 500);
    }

    #[test]
    fn test_scan_reports_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = DataDirectoryScanner::new(dir.path().join("gone"));
        let (tx, _rx) = mpsc::channel(1);
        assert!(matches!(
            scan_directory(&scanner, &tx),
            Err(ScanError::RootUnreadable { .. })
        ));
    }

    #[test]
    fn test_scan_stops_when_receiver_dropped() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            std::fs::write(dir.path().join(format!("D2019010{}T0000_IFCB1.hdr", i + 1)), "").unwrap();
        }
        let scanner = DataDirectoryScanner::new(dir.path());
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        assert!(scan_directory(&scanner, &tx).is_ok());
    }
}
