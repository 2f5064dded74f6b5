//! DataDirectory domain entity
//!
//! A data directory is an absolute filesystem path belonging to exactly
//! one dataset. Raw directories are walked by the sync pipeline and by the
//! bin resolver in ascending `priority` order (lower is searched first).
//! The whitelist and blacklist are substring filters on directory names,
//! persisted as comma-separated strings.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    errors::DomainError,
    newtypes::{DatasetId, DirectoryId},
};

/// Default whitelist for new directories
pub const DEFAULT_WHITELIST: &str = "data";

/// Default blacklist for new directories
pub const DEFAULT_BLACKLIST: &str = "skip,bad";

/// Default search priority
pub const DEFAULT_PRIORITY: i32 = 1;

/// What a data directory holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryKind {
    /// Raw instrument filesets; scanned by sync and searched by the resolver
    #[default]
    Raw,
    /// Products derived from raw data; never scanned for bins
    Derived,
}

impl DirectoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectoryKind::Raw => "raw",
            DirectoryKind::Derived => "derived",
        }
    }
}

impl std::fmt::Display for DirectoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DirectoryKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(DirectoryKind::Raw),
            "derived" => Ok(DirectoryKind::Derived),
            other => Err(DomainError::InvalidKind(other.to_string())),
        }
    }
}

/// Splits a comma-separated filter list, trimming entries and dropping empty ones
pub fn split_filter_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// A filesystem location that holds data for one dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDirectory {
    id: DirectoryId,
    dataset_id: DatasetId,
    /// Absolute path of the directory root
    path: PathBuf,
    kind: DirectoryKind,
    /// Search order within the dataset (lower is earlier)
    priority: i32,
    /// Directory-name substrings that must appear on the way to a fileset
    whitelist: Vec<String>,
    /// Directory-name substrings that exclude a subtree
    blacklist: Vec<String>,
    /// When the directory was last reconciled against the store
    last_synced: Option<DateTime<Utc>>,
}

impl DataDirectory {
    /// Creates a raw directory with default priority and filters
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ValidationFailed` if `path` is not absolute.
    pub fn new(dataset_id: DatasetId, path: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let path = path.into();
        if !path.is_absolute() {
            return Err(DomainError::ValidationFailed(format!(
                "data directory path must be absolute: {}",
                path.display()
            )));
        }
        Ok(Self {
            id: DirectoryId::new(),
            dataset_id,
            path,
            kind: DirectoryKind::Raw,
            priority: DEFAULT_PRIORITY,
            whitelist: split_filter_list(DEFAULT_WHITELIST),
            blacklist: split_filter_list(DEFAULT_BLACKLIST),
            last_synced: None,
        })
    }

    /// Reconstructs a directory from stored fields
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: DirectoryId,
        dataset_id: DatasetId,
        path: PathBuf,
        kind: DirectoryKind,
        priority: i32,
        whitelist: &str,
        blacklist: &str,
        last_synced: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            dataset_id,
            path,
            kind,
            priority,
            whitelist: split_filter_list(whitelist),
            blacklist: split_filter_list(blacklist),
            last_synced,
        }
    }

    pub fn with_kind(mut self, kind: DirectoryKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Replaces the whitelist from a comma-separated list
    pub fn with_whitelist(mut self, list: &str) -> Self {
        self.whitelist = split_filter_list(list);
        self
    }

    /// Replaces the blacklist from a comma-separated list
    pub fn with_blacklist(mut self, list: &str) -> Self {
        self.blacklist = split_filter_list(list);
        self
    }

    pub fn id(&self) -> &DirectoryId {
        &self.id
    }

    pub fn dataset_id(&self) -> &DatasetId {
        &self.dataset_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> DirectoryKind {
        self.kind
    }

    pub fn is_raw(&self) -> bool {
        self.kind == DirectoryKind::Raw
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn whitelist(&self) -> &[String] {
        &self.whitelist
    }

    pub fn blacklist(&self) -> &[String] {
        &self.blacklist
    }

    /// Whitelist in its persisted comma-separated form
    pub fn whitelist_string(&self) -> String {
        self.whitelist.join(",")
    }

    /// Blacklist in its persisted comma-separated form
    pub fn blacklist_string(&self) -> String {
        self.blacklist.join(",")
    }

    pub fn last_synced(&self) -> Option<DateTime<Utc>> {
        self.last_synced
    }

    /// Records a completed reconciliation
    pub fn mark_synced(&mut self, at: DateTime<Utc>) {
        self.last_synced = Some(at);
    }
}

impl std::fmt::Display for DataDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.path.display(), self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_filter_list() {
        assert_eq!(split_filter_list("skip, bad,,"), vec!["skip", "bad"]);
        assert_eq!(split_filter_list(""), Vec::<String>::new());
        assert_eq!(split_filter_list(" data "), vec!["data"]);
    }

    #[test]
    fn test_new_directory_defaults() {
        let dir = DataDirectory::new(DatasetId::new(), "/data/ifcb").unwrap();
        assert!(dir.is_raw());
        assert_eq!(dir.priority(), DEFAULT_PRIORITY);
        assert_eq!(dir.whitelist(), ["data"]);
        assert_eq!(dir.blacklist(), ["skip", "bad"]);
        assert_eq!(dir.blacklist_string(), "skip,bad");
        assert!(dir.last_synced().is_none());
    }

    #[test]
    fn test_relative_path_rejected() {
        let result = DataDirectory::new(DatasetId::new(), "relative/path");
        assert!(matches!(result, Err(DomainError::ValidationFailed(_))));
    }

    #[test]
    fn test_builder_overrides() {
        let dir = DataDirectory::new(DatasetId::new(), "/a")
            .unwrap()
            .with_kind(DirectoryKind::Derived)
            .with_priority(3)
            .with_whitelist("data,raw")
            .with_blacklist("");
        assert_eq!(dir.kind(), DirectoryKind::Derived);
        assert_eq!(dir.priority(), 3);
        assert_eq!(dir.whitelist(), ["data", "raw"]);
        assert!(dir.blacklist().is_empty());
        assert_eq!(dir.to_string(), "/a (derived)");
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("RAW".parse::<DirectoryKind>().unwrap(), DirectoryKind::Raw);
        assert_eq!(
            "derived".parse::<DirectoryKind>().unwrap(),
            DirectoryKind::Derived
        );
        assert!("blobs".parse::<DirectoryKind>().is_err());
    }
}
