//! Time-bucketed aggregation of bin metrics

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::{
    bin::{Bin, FILL_VALUE},
    errors::DomainError,
};

/// Width of a timeline bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimelineResolution {
    Month,
    #[default]
    Day,
    Hour,
}

impl TimelineResolution {
    /// Truncates a timestamp to the start of its bucket
    pub fn truncate(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let start = match self {
            TimelineResolution::Month => NaiveDate::from_ymd_opt(at.year(), at.month(), 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
            TimelineResolution::Day => at.date_naive().and_hms_opt(0, 0, 0),
            TimelineResolution::Hour => at.date_naive().and_hms_opt(at.hour(), 0, 0),
        };
        start.map(|naive| naive.and_utc()).unwrap_or(at)
    }
}

impl std::str::FromStr for TimelineResolution {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "month" => Ok(TimelineResolution::Month),
            "day" => Ok(TimelineResolution::Day),
            "hour" => Ok(TimelineResolution::Hour),
            other => Err(DomainError::InvalidTimeline(format!(
                "unknown resolution '{other}'"
            ))),
        }
    }
}

/// Bin metric that can be plotted on a timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimelineMetric {
    #[default]
    Size,
    Temperature,
    Humidity,
    RunTime,
    LookTime,
    MlAnalyzed,
}

impl TimelineMetric {
    /// Value of this metric for a bin, `None` when it was not recorded
    pub fn value(&self, bin: &Bin) -> Option<f64> {
        let m = bin.metrics();
        let v = match self {
            TimelineMetric::Size => return Some(m.size as f64),
            TimelineMetric::Temperature => m.temperature,
            TimelineMetric::Humidity => m.humidity,
            TimelineMetric::RunTime => m.run_time,
            TimelineMetric::LookTime => m.look_time,
            TimelineMetric::MlAnalyzed => m.ml_analyzed,
        };
        if v == FILL_VALUE || !v.is_finite() {
            None
        } else {
            Some(v)
        }
    }
}

impl std::str::FromStr for TimelineMetric {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "size" => Ok(TimelineMetric::Size),
            "temperature" => Ok(TimelineMetric::Temperature),
            "humidity" => Ok(TimelineMetric::Humidity),
            "run_time" => Ok(TimelineMetric::RunTime),
            "look_time" => Ok(TimelineMetric::LookTime),
            "ml_analyzed" => Ok(TimelineMetric::MlAnalyzed),
            other => Err(DomainError::InvalidTimeline(format!("unknown metric '{other}'"))),
        }
    }
}

/// One bucket of a timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub bucket: DateTime<Utc>,
    /// Mean of the recorded values in the bucket
    pub value: f64,
    /// Number of bins that contributed a value
    pub count: u64,
}

/// Averages `metric` over `bins`, bucketed by sample time
///
/// Bins whose metric holds the fill value are left out. Buckets without
/// any contributing bin are not emitted. Points are in ascending order.
pub fn aggregate(
    bins: &[Bin],
    metric: TimelineMetric,
    resolution: TimelineResolution,
) -> Vec<TimelinePoint> {
    let mut buckets: BTreeMap<DateTime<Utc>, (f64, u64)> = BTreeMap::new();
    for bin in bins {
        if let Some(v) = metric.value(bin) {
            let entry = buckets
                .entry(resolution.truncate(bin.sample_time()))
                .or_insert((0.0, 0));
            entry.0 += v;
            entry.1 += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(bucket, (sum, count))| TimelinePoint {
            bucket,
            value: sum / count as f64,
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::domain::{BinMetrics, Pid};

    fn bin(pid: &str, temperature: f64) -> Bin {
        let mut bin = Bin::new(Pid::new(pid).unwrap());
        bin.apply_metrics(BinMetrics {
            temperature,
            ..BinMetrics::default()
        });
        bin
    }

    #[test]
    fn test_truncate() {
        let at = Utc.with_ymd_and_hms(2019, 3, 17, 14, 45, 12).unwrap();
        assert_eq!(
            TimelineResolution::Month.truncate(at),
            Utc.with_ymd_and_hms(2019, 3, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            TimelineResolution::Day.truncate(at),
            Utc.with_ymd_and_hms(2019, 3, 17, 0, 0, 0).unwrap()
        );
        assert_eq!(
            TimelineResolution::Hour.truncate(at),
            Utc.with_ymd_and_hms(2019, 3, 17, 14, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_aggregate_skips_fill_values() {
        let bins = vec![
            bin("D20190102T0100_IFCB1", 10.0),
            bin("D20190102T0500_IFCB1", 14.0),
            bin("D20190102T0900_IFCB1", FILL_VALUE),
            bin("D20190103T0100_IFCB1", 8.0),
        ];

        let points = aggregate(&bins, TimelineMetric::Temperature, TimelineResolution::Day);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].value, 12.0);
        assert_eq!(points[0].count, 2);
        assert_eq!(points[1].value, 8.0);
        assert!(points[0].bucket < points[1].bucket);
    }

    #[test]
    fn test_size_always_counts() {
        let bins = vec![bin("D20190102T0100_IFCB1", FILL_VALUE)];
        let points = aggregate(&bins, TimelineMetric::Size, TimelineResolution::Hour);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, 0.0);
    }

    #[test]
    fn test_parse_metric_and_resolution() {
        assert_eq!("ml_analyzed".parse::<TimelineMetric>().unwrap(), TimelineMetric::MlAnalyzed);
        assert_eq!("Hour".parse::<TimelineResolution>().unwrap(), TimelineResolution::Hour);
        assert!("week".parse::<TimelineResolution>().is_err());
        assert!("depth".parse::<TimelineMetric>().is_err());
    }
}
