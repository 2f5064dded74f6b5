//! Bin domain entity
//!
//! A bin is one discrete acquisition from the instrument. Bins are created
//! and updated only by the sync pipeline: a newly discovered fileset yields
//! a new bin, and a rediscovered one refreshes the metrics that can change
//! on disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{errors::DomainError, pid::Pid};

/// Sentinel stored for environmental metrics that were not recorded
pub const FILL_VALUE: f64 = -9999.0;

/// Mean Earth radius used for great-circle distances
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// A WGS84 position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub longitude: f64,
    pub latitude: f64,
}

impl Location {
    /// Creates a location, validating coordinate ranges
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, DomainError> {
        if !(-180.0..=180.0).contains(&longitude) || !(-90.0..=90.0).contains(&latitude) {
            return Err(DomainError::ValidationFailed(format!(
                "coordinates out of range: lon={longitude}, lat={latitude}"
            )));
        }
        Ok(Self {
            longitude,
            latitude,
        })
    }

    /// Great-circle (haversine) distance in kilometres
    pub fn distance_km(&self, other: &Location) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

/// Values of a bin that are recomputed from disk on every sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinMetrics {
    /// Total size of the raw fileset in bytes
    pub size: u64,
    pub temperature: f64,
    pub humidity: f64,
    /// Seconds the instrument ran for this sample
    pub run_time: f64,
    /// Run time minus inhibit time, in seconds
    pub look_time: f64,
    /// Millilitres of sample analyzed
    pub ml_analyzed: f64,
}

impl Default for BinMetrics {
    fn default() -> Self {
        Self {
            size: 0,
            temperature: FILL_VALUE,
            humidity: FILL_VALUE,
            run_time: FILL_VALUE,
            look_time: FILL_VALUE,
            ml_analyzed: FILL_VALUE,
        }
    }
}

impl BinMetrics {
    /// Replaces non-finite readings with [`FILL_VALUE`]
    ///
    /// Keeps comparisons between runs stable: `NaN` never equals itself.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        for v in [
            &mut self.temperature,
            &mut self.humidity,
            &mut self.run_time,
            &mut self.look_time,
            &mut self.ml_analyzed,
        ] {
            if !v.is_finite() {
                *v = FILL_VALUE;
            }
        }
        self
    }
}

/// One instrument sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pid: Pid,
    /// Time parsed from the permanent identifier
    timestamp: DateTime<Utc>,
    /// Time the sample was taken
    sample_time: DateTime<Utc>,
    location: Option<Location>,
    depth: f64,
    /// Bin has been flagged as invalid
    qc_bad: bool,
    /// Bin has no regions of interest
    qc_no_rois: bool,
    /// Free-form metadata, a JSON object
    metadata: serde_json::Value,
    metrics: BinMetrics,
}

impl Bin {
    /// Creates a bin for a newly discovered fileset
    ///
    /// Timestamp and sample time both come from the identifier; every
    /// metric starts at its fill value.
    pub fn new(pid: Pid) -> Self {
        let timestamp = pid.timestamp();
        Self {
            pid,
            timestamp,
            sample_time: timestamp,
            location: None,
            depth: 0.0,
            qc_bad: false,
            qc_no_rois: false,
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            metrics: BinMetrics::default(),
        }
    }

    pub fn pid(&self) -> &Pid {
        &self.pid
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn sample_time(&self) -> DateTime<Utc> {
        self.sample_time
    }

    pub fn location(&self) -> Option<Location> {
        self.location
    }

    pub fn depth(&self) -> f64 {
        self.depth
    }

    pub fn qc_bad(&self) -> bool {
        self.qc_bad
    }

    pub fn qc_no_rois(&self) -> bool {
        self.qc_no_rois
    }

    pub fn metadata(&self) -> &serde_json::Value {
        &self.metadata
    }

    pub fn metrics(&self) -> &BinMetrics {
        &self.metrics
    }

    pub fn set_sample_time(&mut self, sample_time: DateTime<Utc>) {
        self.sample_time = sample_time;
    }

    pub fn set_location(&mut self, location: Option<Location>) {
        self.location = location;
    }

    pub fn set_depth(&mut self, depth: f64) {
        self.depth = depth;
    }

    pub fn set_qc_bad(&mut self, bad: bool) {
        self.qc_bad = bad;
    }

    /// Sets the metadata blob; anything other than a JSON object is wrapped
    /// under a `"value"` key
    pub fn set_metadata(&mut self, metadata: serde_json::Value) {
        self.metadata = match metadata {
            serde_json::Value::Object(_) => metadata,
            serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
            other => serde_json::json!({ "value": other }),
        };
    }

    /// Replaces the metrics, returning `true` if anything changed
    pub fn apply_metrics(&mut self, metrics: BinMetrics) -> bool {
        let metrics = metrics.normalized();
        if self.metrics == metrics {
            return false;
        }
        self.metrics = metrics;
        true
    }

    /// Sets the no-ROI flag, returning `true` if it changed
    pub fn update_qc_no_rois(&mut self, no_rois: bool) -> bool {
        let changed = self.qc_no_rois != no_rois;
        self.qc_no_rois = no_rois;
        changed
    }
}

impl std::fmt::Display for Bin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.pid.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid() -> Pid {
        Pid::new("D20190102T1234_IFCB927").unwrap()
    }

    #[test]
    fn test_new_bin_uses_fill_values() {
        let bin = Bin::new(pid());
        assert_eq!(bin.timestamp(), pid().timestamp());
        assert_eq!(bin.sample_time(), bin.timestamp());
        assert_eq!(bin.metrics().temperature, FILL_VALUE);
        assert_eq!(bin.metrics().ml_analyzed, FILL_VALUE);
        assert_eq!(bin.metrics().size, 0);
        assert!(bin.location().is_none());
        assert!(bin.metadata().is_object());
    }

    #[test]
    fn test_apply_metrics_reports_changes() {
        let mut bin = Bin::new(pid());
        let metrics = BinMetrics {
            size: 1024,
            temperature: 12.5,
            ..BinMetrics::default()
        };
        assert!(bin.apply_metrics(metrics.clone()));
        assert!(!bin.apply_metrics(metrics));
        assert_eq!(bin.metrics().size, 1024);
    }

    #[test]
    fn test_nan_metrics_are_stable() {
        let mut bin = Bin::new(pid());
        let metrics = BinMetrics {
            humidity: f64::NAN,
            ..BinMetrics::default()
        };
        // NaN normalizes to the fill value, which is already stored
        assert!(!bin.apply_metrics(metrics));
        assert_eq!(bin.metrics().humidity, FILL_VALUE);
    }

    #[test]
    fn test_update_qc_no_rois() {
        let mut bin = Bin::new(pid());
        assert!(bin.update_qc_no_rois(true));
        assert!(!bin.update_qc_no_rois(true));
        assert!(bin.qc_no_rois());
    }

    #[test]
    fn test_set_metadata_wraps_non_objects() {
        let mut bin = Bin::new(pid());
        bin.set_metadata(serde_json::json!(3));
        assert_eq!(bin.metadata(), &serde_json::json!({"value": 3}));
        bin.set_metadata(serde_json::Value::Null);
        assert_eq!(bin.metadata(), &serde_json::json!({}));
    }

    #[test]
    fn test_location_validation_and_distance() {
        assert!(Location::new(200.0, 0.0).is_err());
        assert!(Location::new(0.0, -91.0).is_err());

        let woods_hole = Location::new(-70.67, 41.52).unwrap();
        let same = Location::new(-70.67, 41.52).unwrap();
        assert!(woods_hole.distance_km(&same).abs() < 1e-9);

        // one degree of latitude is roughly 111 km
        let north = Location::new(-70.67, 42.52).unwrap();
        let d = woods_hole.distance_km(&north);
        assert!((d - 111.2).abs() < 0.5, "distance was {d}");
    }
}
