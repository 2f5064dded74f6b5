//! Raw filesets
//!
//! A fileset is the group of files one bin leaves on disk, all named by the
//! bin's permanent identifier:
//!
//! - `<pid>.hdr` - text header with instrument settings and readings
//! - `<pid>.adc` - per-ROI analog-to-digital records
//! - `<pid>.roi` - concatenated region-of-interest images

use std::path::{Path, PathBuf};

use ifcbdb_core::domain::{Bin, BinMetrics, Location, Pid};

use crate::{header::Header, ScanError};

pub const HDR_EXT: &str = "hdr";
pub const ADC_EXT: &str = "adc";
pub const ROI_EXT: &str = "roi";

/// The companion files of one bin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fileset {
    pid: Pid,
    hdr_path: PathBuf,
}

impl Fileset {
    /// Creates a fileset anchored on its header path
    pub fn new(pid: Pid, hdr_path: impl Into<PathBuf>) -> Self {
        Self {
            pid,
            hdr_path: hdr_path.into(),
        }
    }

    pub fn pid(&self) -> &Pid {
        &self.pid
    }

    /// Directory holding the fileset
    pub fn directory(&self) -> &Path {
        self.hdr_path.parent().unwrap_or_else(|| Path::new(""))
    }

    pub fn hdr_path(&self) -> &Path {
        &self.hdr_path
    }

    pub fn adc_path(&self) -> PathBuf {
        self.hdr_path.with_extension(ADC_EXT)
    }

    pub fn roi_path(&self) -> PathBuf {
        self.hdr_path.with_extension(ROI_EXT)
    }

    /// Extensions of companion files that are not on disk
    pub fn missing_companions(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.adc_path().is_file() {
            missing.push(ADC_EXT);
        }
        if !self.roi_path().is_file() {
            missing.push(ROI_EXT);
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.hdr_path.is_file() && self.missing_companions().is_empty()
    }

    /// Combined size of the three files in bytes
    pub fn size(&self) -> Result<u64, ScanError> {
        let mut total = 0u64;
        for path in [self.hdr_path.clone(), self.adc_path(), self.roi_path()] {
            let meta = std::fs::metadata(&path).map_err(|e| ScanError::io(&path, e))?;
            total = total.saturating_add(meta.len());
        }
        Ok(total)
    }

    /// Reads the header and file sizes
    pub fn read(&self) -> Result<FilesetReading, ScanError> {
        let header = Header::read(&self.hdr_path)?;
        let roi = self.roi_path();
        let roi_len = std::fs::metadata(&roi)
            .map_err(|e| ScanError::io(&roi, e))?
            .len();

        Ok(FilesetReading {
            metrics: header.metrics(self.size()?),
            qc_no_rois: roi_len == 0,
            metadata: header.to_metadata(),
            location: header.location(),
            depth: header.depth(),
        })
    }
}

impl std::fmt::Display for Fileset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hdr_path.with_extension("").display())
    }
}

/// Everything a sync needs from a fileset on disk
#[derive(Debug, Clone, PartialEq)]
pub struct FilesetReading {
    pub metrics: BinMetrics,
    /// The ROI file is empty
    pub qc_no_rois: bool,
    /// Header pairs as a JSON object
    pub metadata: serde_json::Value,
    pub location: Option<Location>,
    pub depth: Option<f64>,
}

impl FilesetReading {
    /// Builds the bin for a newly discovered fileset
    pub fn to_new_bin(&self, pid: Pid) -> Bin {
        let mut bin = Bin::new(pid);
        bin.set_location(self.location);
        if let Some(depth) = self.depth {
            bin.set_depth(depth);
        }
        bin.set_metadata(self.metadata.clone());
        bin.update_qc_no_rois(self.qc_no_rois);
        bin.apply_metrics(self.metrics.clone());
        bin
    }

    /// Refreshes the mutable fields of a known bin; true if any changed
    pub fn refresh(&self, bin: &mut Bin) -> bool {
        let metrics_changed = bin.apply_metrics(self.metrics.clone());
        let flag_changed = bin.update_qc_no_rois(self.qc_no_rois);
        metrics_changed || flag_changed
    }
}
