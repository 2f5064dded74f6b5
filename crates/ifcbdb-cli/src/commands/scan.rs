//! Scan command - list the filesets a directory would contribute
//!
//! Walks a directory with the same filters a sync would apply, without
//! touching the database.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ifcbdb_core::domain::directory::split_filter_list;
use ifcbdb_data::{DataDirectoryScanner, Discovery};

use crate::context::CliContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct ScanCommand {
    /// Directory to walk
    pub path: PathBuf,

    /// Comma-separated whitelist (defaults to the configured one)
    #[arg(long)]
    pub whitelist: Option<String>,

    /// Comma-separated blacklist (defaults to the configured one)
    #[arg(long)]
    pub blacklist: Option<String>,

    /// Also list partial, malformed and unreadable entries
    #[arg(long)]
    pub all: bool,
}

impl ScanCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let defaults = &ctx.config().scanner;

        let scanner = DataDirectoryScanner::new(&self.path)
            .with_whitelist(split_filter_list(
                self.whitelist.as_deref().unwrap_or(&defaults.default_whitelist),
            ))
            .with_blacklist(split_filter_list(
                self.blacklist.as_deref().unwrap_or(&defaults.default_blacklist),
            ))
            .follow_links(defaults.follow_links);

        let discoveries = tokio::task::spawn_blocking(move || -> Result<Vec<Discovery>> {
            scanner.check_root()?;
            Ok(scanner.iter().collect())
        })
        .await
        .context("Scan task failed")??;

        let filesets = discoveries
            .iter()
            .filter(|d| matches!(d, Discovery::Fileset(_)))
            .count();

        if format.is_json() {
            let entries: Vec<_> = discoveries
                .iter()
                .filter(|d| self.all || matches!(d, Discovery::Fileset(_)))
                .map(discovery_json)
                .collect();
            formatter.print_json(&serde_json::json!({
                "root": self.path,
                "filesets": filesets,
                "skipped": discoveries.len() - filesets,
                "entries": entries,
            }));
            return Ok(());
        }

        for discovery in &discoveries {
            match discovery {
                Discovery::Fileset(fileset) => {
                    formatter.info(&format!("{}  {}", fileset.pid(), fileset.directory().display()))
                }
                Discovery::Partial { pid, missing, .. } if self.all => {
                    formatter.warn(&format!("{} is missing {}", pid, missing.join(", ")))
                }
                Discovery::Malformed(path) if self.all => {
                    formatter.warn(&format!("{} is not a valid bin name", path.display()))
                }
                Discovery::Unreadable { path, message } if self.all => match path {
                    Some(path) => formatter.warn(&format!("{}: {}", path.display(), message)),
                    None => formatter.warn(message),
                },
                _ => {}
            }
        }
        formatter.success(&format!(
            "{} fileset(s) under {} ({} skipped)",
            filesets,
            self.path.display(),
            discoveries.len() - filesets
        ));
        Ok(())
    }
}

fn discovery_json(discovery: &Discovery) -> serde_json::Value {
    match discovery {
        Discovery::Fileset(fileset) => serde_json::json!({
            "kind": "fileset",
            "pid": fileset.pid(),
            "path": fileset.hdr_path().with_extension(""),
        }),
        Discovery::Partial { pid, path, missing } => serde_json::json!({
            "kind": "partial",
            "pid": pid,
            "path": path,
            "missing": missing,
        }),
        Discovery::Malformed(path) => serde_json::json!({
            "kind": "malformed",
            "path": path,
        }),
        Discovery::Unreadable { path, message } => serde_json::json!({
            "kind": "unreadable",
            "path": path,
            "error": message,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifcbdb_core::domain::Pid;
    use ifcbdb_data::Fileset;

    #[test]
    fn test_discovery_json_kinds() {
        let pid = Pid::new("D20190102T1234_IFCB927").unwrap();
        let fileset = Fileset::new(pid.clone(), "/a/data/D20190102T1234_IFCB927.hdr");
        let json = discovery_json(&Discovery::Fileset(fileset));
        assert_eq!(json["kind"], "fileset");
        assert_eq!(json["path"], "/a/data/D20190102T1234_IFCB927");

        let partial = Discovery::Partial {
            pid,
            path: PathBuf::from("/a/x.hdr"),
            missing: vec!["roi"],
        };
        assert_eq!(discovery_json(&partial)["missing"], serde_json::json!(["roi"]));
    }
}
