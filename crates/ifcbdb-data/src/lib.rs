//! IFCB Dashboard Data - raw fileset access
//!
//! This crate reads instrument data directly from disk:
//!
//! - [`Fileset`] - the `.hdr`/`.adc`/`.roi` companions of one bin
//! - [`Header`] - parsed `.hdr` key/value pairs and the metrics derived from them
//! - [`DataDirectoryScanner`] - lazy, filtered walk of a data directory
//! - [`BinResolver`] - locates the fileset of a bin across a dataset's directories
//!
//! Filesystem access is blocking. Async callers run scans on the blocking
//! thread pool, as [`BinResolver`] does.

pub mod fileset;
pub mod header;
pub mod resolver;
pub mod scanner;

use std::path::PathBuf;

use ifcbdb_core::domain::Pid;

pub use fileset::{Fileset, FilesetReading};
pub use header::Header;
pub use resolver::{BinResolver, ResolvedFileset};
pub use scanner::{DataDirectoryScanner, Discovery, Discoveries};

/// Errors raised while reading filesets from disk
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The root of a data directory is missing or not a readable directory
    #[error("Cannot read data directory {path}: {message}")]
    RootUnreadable { path: PathBuf, message: String },

    /// A file belonging to a fileset could not be read
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScanError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised by [`BinResolver`]
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No directory of any owning dataset holds the fileset
    ///
    /// This is an expected condition (data archived or moved) and callers
    /// should treat it as a miss.
    #[error("Fileset not found for bin {0}")]
    NotFound(Pid),

    /// A directory scan was interrupted before it finished
    #[error("Scan interrupted: {0}")]
    Interrupted(String),

    /// Looking up datasets or directories failed
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl ResolveError {
    /// Returns true for the recoverable "fileset missing" condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound(_))
    }
}
