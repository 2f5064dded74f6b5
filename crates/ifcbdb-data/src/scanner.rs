//! Data directory scanner
//!
//! Walks a data directory and reports every fileset found below it. The walk
//! is lazy and restartable: [`DataDirectoryScanner::iter`] starts a fresh
//! traversal each time, nothing is cached between calls.
//!
//! ## Filtering
//!
//! - **Blacklist**: a subdirectory whose name contains any blacklist entry
//!   is pruned together with everything below it. The root itself is never
//!   pruned.
//! - **Whitelist**: a fileset is reported only if at least one directory
//!   between the root and the fileset has a name containing a whitelist
//!   entry. Filesets directly in the root, and every fileset when the
//!   whitelist is empty, pass.
//!
//! Both filters are substring matches on single path components. A
//! blacklisted directory stays excluded even when it also matches the
//! whitelist.
//!
//! Traversal order is sorted by file name, so two scans of an unchanged tree
//! report filesets in the same order.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use ifcbdb_core::domain::{DataDirectory, Pid};
use walkdir::{DirEntry, WalkDir};

use crate::{
    fileset::{Fileset, HDR_EXT},
    ScanError,
};

/// One result of a directory walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// A complete fileset
    Fileset(Fileset),
    /// A header whose companion files are missing
    Partial {
        pid: Pid,
        path: PathBuf,
        missing: Vec<&'static str>,
    },
    /// A header whose name is not a permanent identifier
    Malformed(PathBuf),
    /// An entry that could not be read during the walk
    Unreadable {
        path: Option<PathBuf>,
        message: String,
    },
}

impl Discovery {
    pub fn into_fileset(self) -> Option<Fileset> {
        match self {
            Discovery::Fileset(fileset) => Some(fileset),
            _ => None,
        }
    }
}

/// Scanner over one data directory
#[derive(Debug, Clone)]
pub struct DataDirectoryScanner {
    root: PathBuf,
    whitelist: Vec<String>,
    blacklist: Vec<String>,
    follow_links: bool,
}

impl DataDirectoryScanner {
    /// Creates a scanner with empty filter lists
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            whitelist: Vec::new(),
            blacklist: Vec::new(),
            follow_links: false,
        }
    }

    /// Creates a scanner configured from a stored data directory
    pub fn for_directory(directory: &DataDirectory) -> Self {
        Self::new(directory.path())
            .with_whitelist(directory.whitelist().to_vec())
            .with_blacklist(directory.blacklist().to_vec())
    }

    pub fn with_whitelist(mut self, whitelist: Vec<String>) -> Self {
        self.whitelist = whitelist;
        self
    }

    pub fn with_blacklist(mut self, blacklist: Vec<String>) -> Self {
        self.blacklist = blacklist;
        self
    }

    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Verifies that the root exists and can be listed
    pub fn check_root(&self) -> Result<(), ScanError> {
        let unreadable = |message: String| ScanError::RootUnreadable {
            path: self.root.clone(),
            message,
        };

        let meta = std::fs::metadata(&self.root).map_err(|e| unreadable(e.to_string()))?;
        if !meta.is_dir() {
            return Err(unreadable("not a directory".to_string()));
        }
        std::fs::read_dir(&self.root).map_err(|e| unreadable(e.to_string()))?;
        Ok(())
    }

    /// Starts a new walk
    pub fn iter(&self) -> Discoveries {
        let blacklist = self.blacklist.clone();
        let entries = WalkDir::new(&self.root)
            .follow_links(self.follow_links)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| !is_blacklisted(entry, &blacklist));

        Discoveries {
            entries: Box::new(entries),
            root: self.root.clone(),
            whitelist: self.whitelist.clone(),
        }
    }

    /// Complete filesets only
    pub fn filesets(&self) -> impl Iterator<Item = Fileset> {
        self.iter().filter_map(Discovery::into_fileset)
    }

    /// Finds the complete fileset for `pid`, if this directory has one
    pub fn find(&self, pid: &Pid) -> Option<Fileset> {
        self.filesets().find(|fileset| fileset.pid() == pid)
    }
}

fn component_matches(name: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| name.contains(p.as_str()))
}

fn is_blacklisted(entry: &DirEntry, blacklist: &[String]) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map_or(false, |name| component_matches(name, blacklist))
}

/// Lazy sequence of [`Discovery`] values from one walk
pub struct Discoveries {
    entries: Box<dyn Iterator<Item = walkdir::Result<DirEntry>> + Send>,
    root: PathBuf,
    whitelist: Vec<String>,
}

impl Discoveries {
    fn is_whitelisted(&self, hdr_path: &Path) -> bool {
        if self.whitelist.is_empty() {
            return true;
        }
        let Some(parent) = hdr_path.parent() else {
            return true;
        };
        let Ok(relative) = parent.strip_prefix(&self.root) else {
            return false;
        };

        let mut components = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => name.to_str(),
                _ => None,
            })
            .peekable();

        // Filesets directly in the root pass
        if components.peek().is_none() {
            return true;
        }
        components.any(|name| component_matches(name, &self.whitelist))
    }
}

impl Iterator for Discoveries {
    type Item = Discovery;

    fn next(&mut self) -> Option<Discovery> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf);
                    tracing::warn!(
                        path = ?path,
                        error = %err,
                        "Skipping unreadable entry"
                    );
                    return Some(Discovery::Unreadable {
                        path,
                        message: err.to_string(),
                    });
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(OsStr::to_str) != Some(HDR_EXT) {
                continue;
            }
            if !self.is_whitelisted(path) {
                continue;
            }

            let pid = path
                .file_stem()
                .and_then(OsStr::to_str)
                .and_then(|stem| Pid::new(stem).ok());
            let Some(pid) = pid else {
                tracing::debug!(path = %path.display(), "Header name is not a permanent identifier");
                return Some(Discovery::Malformed(path.to_path_buf()));
            };

            let fileset = Fileset::new(pid, path);
            let missing = fileset.missing_companions();
            if missing.is_empty() {
                return Some(Discovery::Fileset(fileset));
            }

            tracing::debug!(pid = %fileset.pid(), ?missing, "Partial fileset");
            return Some(Discovery::Partial {
                pid: fileset.pid().clone(),
                path: path.to_path_buf(),
                missing,
            });
        }
    }
}
