//! CLI subcommands

pub mod config;
pub mod dataset;
pub mod directory;
pub mod query;
pub mod resolve;
pub mod scan;
pub mod status;
pub mod sync;
pub mod unlock;

use chrono::{DateTime, NaiveDate, Utc};

/// Parses an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC)
pub fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("expected YYYY-MM-DD or an RFC 3339 timestamp, got '{s}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_time_accepts_date_and_rfc3339() {
        assert_eq!(
            parse_time("2019-01-02").unwrap(),
            Utc.with_ymd_and_hms(2019, 1, 2, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time("2019-01-02T12:34:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2019, 1, 2, 10, 34, 0).unwrap()
        );
        assert!(parse_time("yesterday").is_err());
    }
}
