//! Bin resolver
//!
//! Locates the raw fileset of a bin. The search visits the datasets the bin
//! belongs to and, within each, the raw data directories in ascending
//! priority order. The first directory holding the fileset wins.

use std::sync::Arc;

use ifcbdb_core::domain::{
    newtypes::{DatasetId, DirectoryId},
    Dataset, DirectoryKind, Pid,
};
use ifcbdb_core::ports::IDatasetStore;

use crate::{fileset::Fileset, scanner::DataDirectoryScanner, ResolveError};

/// Where a bin's fileset was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFileset {
    pub dataset_id: DatasetId,
    pub directory_id: DirectoryId,
    pub fileset: Fileset,
}

/// Resolves permanent identifiers to filesets on disk
pub struct BinResolver {
    store: Arc<dyn IDatasetStore>,
    follow_links: bool,
}

impl BinResolver {
    pub fn new(store: Arc<dyn IDatasetStore>) -> Self {
        Self {
            store,
            follow_links: false,
        }
    }

    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Resolves a bin using the datasets it is linked to
    #[tracing::instrument(skip(self, pid), fields(pid = %pid))]
    pub async fn resolve(&self, pid: &Pid) -> Result<ResolvedFileset, ResolveError> {
        let datasets = self.store.datasets_for_bin(pid).await?;
        self.resolve_in(pid, &datasets).await
    }

    /// Resolves a bin by searching the given datasets in order
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NotFound`] when no raw directory of any of the
    /// datasets holds a complete fileset for `pid`.
    pub async fn resolve_in(
        &self,
        pid: &Pid,
        datasets: &[Dataset],
    ) -> Result<ResolvedFileset, ResolveError> {
        for dataset in datasets {
            let directories = self
                .store
                .list_directories(dataset.id(), Some(DirectoryKind::Raw))
                .await?;

            for directory in directories {
                let scanner =
                    DataDirectoryScanner::for_directory(&directory).follow_links(self.follow_links);
                let wanted = pid.clone();
                let found = tokio::task::spawn_blocking(move || scanner.find(&wanted))
                    .await
                    .map_err(|e| ResolveError::Interrupted(e.to_string()))?;

                if let Some(fileset) = found {
                    tracing::debug!(
                        dataset = %dataset.name(),
                        directory = %directory.path().display(),
                        "Resolved fileset"
                    );
                    return Ok(ResolvedFileset {
                        dataset_id: *dataset.id(),
                        directory_id: *directory.id(),
                        fileset,
                    });
                }
            }
        }

        tracing::debug!(datasets = datasets.len(), "Fileset not found");
        Err(ResolveError::NotFound(pid.clone()))
    }
}
