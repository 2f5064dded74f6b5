//! Query command - read bins back out of a dataset

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use ifcbdb_core::domain::{timeline, Bin, Location, TimelineMetric, TimelineResolution};
use ifcbdb_core::ports::{BinQuery, IDatasetStore};

use super::parse_time;
use crate::context::CliContext;
use crate::output::{get_formatter, metric, OutputFormat, OutputFormatter};

#[derive(Debug, Subcommand)]
pub enum QueryCommand {
    /// List bins sampled within a time range, oldest first
    List {
        /// Dataset name or id
        dataset: String,
        /// Inclusive start (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_time)]
        start: Option<DateTime<Utc>>,
        /// Inclusive end (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_time)]
        end: Option<DateTime<Utc>>,
        /// Leave out bins flagged bad
        #[arg(long)]
        exclude_bad: bool,
        /// Maximum number of bins
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Show the most recently sampled bin
    Latest {
        /// Dataset name or id
        dataset: String,
        /// Latest bin sampled at or before this time
        #[arg(long, value_parser = parse_time)]
        at: Option<DateTime<Utc>>,
    },
    /// Show the bin sampled nearest to a location
    Closest {
        /// Dataset name or id
        dataset: String,
        #[arg(long, allow_hyphen_values = true)]
        latitude: f64,
        #[arg(long, allow_hyphen_values = true)]
        longitude: f64,
    },
    /// Average a metric over time buckets
    Timeline {
        /// Dataset name or id
        dataset: String,
        /// size, temperature, humidity, run_time, look_time or ml_analyzed
        #[arg(long, default_value = "size")]
        metric: TimelineMetric,
        /// hour, day or month
        #[arg(long, default_value = "day")]
        resolution: TimelineResolution,
        #[arg(long, value_parser = parse_time)]
        start: Option<DateTime<Utc>>,
        #[arg(long, value_parser = parse_time)]
        end: Option<DateTime<Utc>>,
    },
}

impl QueryCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let backend = ctx.connect().await?;

        match self {
            QueryCommand::List {
                dataset,
                start,
                end,
                exclude_bad,
                limit,
            } => {
                let dataset = backend.dataset(dataset).await?;
                let mut query = range_query(BinQuery::new().with_dataset(*dataset.id()), *start, *end);
                if *exclude_bad {
                    query = query.excluding_bad();
                }
                if let Some(limit) = limit {
                    query = query.with_limit(*limit);
                }

                let bins = backend.store.query_bins(&query).await?;
                if format.is_json() {
                    formatter.print_json(&serde_json::to_value(&bins)?);
                } else {
                    print_bins(&bins, &*formatter);
                    formatter.success(&format!("{} bin(s)", bins.len()));
                }
            }
            QueryCommand::Latest { dataset, at } => {
                let dataset = backend.dataset(dataset).await?;
                let bin = backend.store.most_recent_bin(dataset.id(), *at).await?;
                let empty = match at {
                    Some(at) => format!(
                        "{} has no bins at or before {}",
                        dataset.name(),
                        at.to_rfc3339()
                    ),
                    None => format!("{} has no bins", dataset.name()),
                };
                show_one(bin, format, &*formatter, &empty)?;
            }
            QueryCommand::Closest {
                dataset,
                latitude,
                longitude,
            } => {
                let dataset = backend.dataset(dataset).await?;
                let target = Location::new(*longitude, *latitude)?;
                let bin = backend.store.closest_bin(dataset.id(), &target).await?;
                if let (Some(bin), false) = (&bin, format.is_json()) {
                    if let Some(location) = bin.location() {
                        formatter.info(&format!("{:.2} km away", location.distance_km(&target)));
                    }
                }
                show_one(
                    bin,
                    format,
                    &*formatter,
                    &format!("{} has no located bins", dataset.name()),
                )?;
            }
            QueryCommand::Timeline {
                dataset,
                metric: which,
                resolution,
                start,
                end,
            } => {
                let dataset = backend.dataset(dataset).await?;
                let query = range_query(BinQuery::new().with_dataset(*dataset.id()), *start, *end);
                let bins = backend.store.query_bins(&query).await?;
                let points = timeline::aggregate(&bins, *which, *resolution);

                if format.is_json() {
                    formatter.print_json(&serde_json::to_value(&points)?);
                } else if points.is_empty() {
                    formatter.info("No recorded values in range");
                } else {
                    for point in &points {
                        formatter.info(&format!(
                            "{}  {:>14}  ({} bins)",
                            point.bucket.format("%Y-%m-%d %H:%M"),
                            metric(point.value),
                            point.count
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

fn range_query(
    query: BinQuery,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> BinQuery {
    let query = match start {
        Some(start) => query.with_start(start),
        None => query,
    };
    match end {
        Some(end) => query.with_end(end),
        None => query,
    }
}

fn show_one(
    bin: Option<Bin>,
    format: OutputFormat,
    formatter: &dyn OutputFormatter,
    empty: &str,
) -> Result<()> {
    if format.is_json() {
        formatter.print_json(&serde_json::to_value(&bin)?);
        return Ok(());
    }
    match bin {
        Some(bin) => print_bins(std::slice::from_ref(&bin), formatter),
        None => formatter.info(empty),
    }
    Ok(())
}

fn print_bins(bins: &[Bin], formatter: &dyn OutputFormatter) {
    for bin in bins {
        let m = bin.metrics();
        let location = bin
            .location()
            .map(|l| format!("{:.4},{:.4}", l.latitude, l.longitude))
            .unwrap_or_else(|| "-".to_string());
        let flags = match (bin.qc_bad(), bin.qc_no_rois()) {
            (true, true) => " [bad, no rois]",
            (true, false) => " [bad]",
            (false, true) => " [no rois]",
            (false, false) => "",
        };
        formatter.info(&format!(
            "{}  {}  size={}  temp={}  ml={}  at={}{}",
            bin.pid(),
            bin.sample_time().format("%Y-%m-%d %H:%M:%S"),
            m.size,
            metric(m.temperature),
            metric(m.ml_analyzed),
            location,
            flags
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_range_query_sets_only_given_bounds() {
        let start = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
        let q = range_query(BinQuery::new(), Some(start), None);
        assert_eq!(q.start, Some(start));
        assert!(q.end.is_none());
    }
}
