//! Instrument header (`.hdr`) parsing
//!
//! Headers are plain text, one `key: value` pair per line. Lines without a
//! colon (banners, blank lines) are ignored. Keys are matched
//! case-insensitively; the first occurrence of a key wins.

use std::path::Path;

use ifcbdb_core::domain::{BinMetrics, Location, FILL_VALUE};

use crate::ScanError;

/// Sample flow rate of the instrument in millilitres per minute
pub const FLOW_RATE_ML_PER_MIN: f64 = 0.25;

const TEMPERATURE_KEYS: &[&str] = &["temperature"];
const HUMIDITY_KEYS: &[&str] = &["humidity"];
const RUN_TIME_KEYS: &[&str] = &["runTime"];
const INHIBIT_TIME_KEYS: &[&str] = &["inhibitTime"];
const LATITUDE_KEYS: &[&str] = &["latitude", "gpsLatitude", "gps_latitude"];
const LONGITUDE_KEYS: &[&str] = &["longitude", "gpsLongitude", "gps_longitude"];
const DEPTH_KEYS: &[&str] = &["depth"];

/// Parsed header of one fileset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    entries: Vec<(String, String)>,
}

impl Header {
    /// Parses header text
    pub fn parse(text: &str) -> Self {
        let mut entries: Vec<(String, String)> = Vec::new();
        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() || entries.iter().any(|(k, _)| k.eq_ignore_ascii_case(key)) {
                continue;
            }
            entries.push((key.to_string(), value.trim().to_string()));
        }
        Self { entries }
    }

    /// Reads and parses a header file
    ///
    /// Invalid UTF-8 is replaced rather than rejected; instrument headers
    /// occasionally carry stray bytes in free-text fields.
    pub fn read(path: &Path) -> Result<Self, ScanError> {
        let bytes = std::fs::read(path).map_err(|e| ScanError::io(path, e))?;
        Ok(Self::parse(&String::from_utf8_lossy(&bytes)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw value of a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// First finite numeric value among `keys`
    fn number(&self, keys: &[&str]) -> Option<f64> {
        keys.iter()
            .filter_map(|k| self.get(k))
            .filter_map(|v| v.parse::<f64>().ok())
            .find(|v| v.is_finite())
    }

    pub fn temperature(&self) -> Option<f64> {
        self.number(TEMPERATURE_KEYS)
    }

    pub fn humidity(&self) -> Option<f64> {
        self.number(HUMIDITY_KEYS)
    }

    /// Seconds the instrument ran
    pub fn run_time(&self) -> Option<f64> {
        self.number(RUN_TIME_KEYS)
    }

    /// Seconds the instrument was inhibited from triggering
    pub fn inhibit_time(&self) -> Option<f64> {
        self.number(INHIBIT_TIME_KEYS)
    }

    /// Run time minus inhibit time
    pub fn look_time(&self) -> Option<f64> {
        Some(self.run_time()? - self.inhibit_time()?)
    }

    /// Millilitres analyzed over the look time
    pub fn ml_analyzed(&self) -> Option<f64> {
        self.look_time()
            .map(|look| FLOW_RATE_ML_PER_MIN * look / 60.0)
    }

    /// Position, when both coordinates are present and in range
    pub fn location(&self) -> Option<Location> {
        let lat = self.number(LATITUDE_KEYS)?;
        let lon = self.number(LONGITUDE_KEYS)?;
        Location::new(lon, lat).ok()
    }

    pub fn depth(&self) -> Option<f64> {
        self.number(DEPTH_KEYS)
    }

    /// Metrics derived from this header, with the given fileset size
    pub fn metrics(&self, size: u64) -> BinMetrics {
        BinMetrics {
            size,
            temperature: self.temperature().unwrap_or(FILL_VALUE),
            humidity: self.humidity().unwrap_or(FILL_VALUE),
            run_time: self.run_time().unwrap_or(FILL_VALUE),
            look_time: self.look_time().unwrap_or(FILL_VALUE),
            ml_analyzed: self.ml_analyzed().unwrap_or(FILL_VALUE),
        }
        .normalized()
    }

    /// All pairs as a JSON object, numbers as JSON numbers
    pub fn to_metadata(&self) -> serde_json::Value {
        let mut map = serde_json::Map::with_capacity(self.entries.len());
        for (key, value) in &self.entries {
            map.insert(key.clone(), json_value(value));
        }
        serde_json::Value::Object(map)
    }
}

fn json_value(raw: &str) -> serde_json::Value {
    if let Ok(i) = raw.parse::<i64>() {
        return serde_json::Value::from(i);
    }
    match raw.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        Some(n) => serde_json::Value::Number(n),
        None => serde_json::Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Imaging FlowCytobot
softwareVersion: 1.2.3
temperature: 20.5
humidity: 33
runTime: 1200
inhibitTime: 120
gpsLatitude: 41.325
gpsLongitude: -70.567
depth: 3.5
runType: NORMAL
";

    #[test]
    fn test_parse_pairs() {
        let header = Header::parse(SAMPLE);
        assert_eq!(header.len(), 9);
        assert_eq!(header.get("runtype"), Some("NORMAL"));
        assert_eq!(header.temperature(), Some(20.5));
        assert_eq!(header.humidity(), Some(33.0));
    }

    #[test]
    fn test_derived_times() {
        let header = Header::parse(SAMPLE);
        assert_eq!(header.look_time(), Some(1080.0));
        // 1080 s = 18 min at 0.25 ml/min
        assert_eq!(header.ml_analyzed(), Some(4.5));
    }

    #[test]
    fn test_location_from_gps_keys() {
        let header = Header::parse(SAMPLE);
        let loc = header.location().unwrap();
        assert_eq!(loc.latitude, 41.325);
        assert_eq!(loc.longitude, -70.567);
        assert_eq!(header.depth(), Some(3.5));
    }

    #[test]
    fn test_missing_values_use_fill() {
        let header = Header::parse("runTime: 100\nhumidity: nan\n");
        let m = header.metrics(42);
        assert_eq!(m.size, 42);
        assert_eq!(m.run_time, 100.0);
        assert_eq!(m.humidity, FILL_VALUE);
        assert_eq!(m.temperature, FILL_VALUE);
        // no inhibit time means no look time
        assert_eq!(m.look_time, FILL_VALUE);
        assert_eq!(m.ml_analyzed, FILL_VALUE);
        assert!(header.location().is_none());
    }

    #[test]
    fn test_first_occurrence_wins() {
        let header = Header::parse("temperature: 1\nTemperature: 2\n");
        assert_eq!(header.temperature(), Some(1.0));
        assert_eq!(header.len(), 1);
    }

    #[test]
    fn test_metadata_types() {
        let header = Header::parse("a: 3\nb: 2.5\nc: text: with colon\nd:\n");
        assert_eq!(
            header.to_metadata(),
            serde_json::json!({"a": 3, "b": 2.5, "c": "text: with colon", "d": ""})
        );
    }

    #[test]
    fn test_out_of_range_location_is_dropped() {
        let header = Header::parse("latitude: 123\nlongitude: 0\n");
        assert!(header.location().is_none());
    }
}
