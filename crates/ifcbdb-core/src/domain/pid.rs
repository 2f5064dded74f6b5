//! Permanent identifiers
//!
//! Every bin is named by a permanent identifier that embeds the instrument
//! number and the acquisition time. Two naming schemes exist in the field:
//!
//! | Scheme | Example                    | Layout                              |
//! |--------|----------------------------|-------------------------------------|
//! | V2     | `D20190102T123456_IFCB927` | `D` date `T` time `_IFCB` instrument |
//! | V1     | `IFCB1_2009_216_112409`    | `IFCB` instrument, year, day-of-year, time |
//!
//! V2 identifiers are also accepted with minute resolution
//! (`D20190102T1234_IFCB927`), seconds then default to zero.

use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Naming scheme a permanent identifier was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PidScheme {
    /// `IFCBn_YYYY_DDD_HHMMSS`
    V1,
    /// `DYYYYMMDDTHHMM[SS]_IFCBn`
    V2,
}

/// A validated permanent identifier
///
/// Construction parses the identifier, so holding a `Pid` guarantees that
/// [`Pid::timestamp`] and [`Pid::instrument`] are available. Equality,
/// ordering and hashing only consider the identifier string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pid {
    value: String,
    timestamp: DateTime<Utc>,
    instrument: u32,
    scheme: PidScheme,
}

impl Pid {
    /// Parse and validate a permanent identifier
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        let parsed = parse_v2(&value)
            .map(|(ts, n)| (ts, n, PidScheme::V2))
            .or_else(|| parse_v1(&value).map(|(ts, n)| (ts, n, PidScheme::V1)));

        match parsed {
            Some((timestamp, instrument, scheme)) => Ok(Self {
                value,
                timestamp,
                instrument,
                scheme,
            }),
            None => Err(DomainError::InvalidPid(value)),
        }
    }

    /// Returns the identifier string
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Acquisition time encoded in the identifier
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Instrument number encoded in the identifier
    pub fn instrument(&self) -> u32 {
        self.instrument
    }

    /// Naming scheme of the identifier
    pub fn scheme(&self) -> PidScheme {
        self.scheme
    }
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_instrument(s: &str) -> Option<u32> {
    if all_digits(s) {
        s.parse().ok()
    } else {
        None
    }
}

/// Parses `HHMM` or `HHMMSS` (digits already validated)
fn parse_hms(time: &str) -> Option<NaiveTime> {
    let hour: u32 = time[0..2].parse().ok()?;
    let minute: u32 = time[2..4].parse().ok()?;
    let second: u32 = if time.len() == 6 {
        time[4..6].parse().ok()?
    } else {
        0
    };
    NaiveTime::from_hms_opt(hour, minute, second)
}

fn parse_v2(s: &str) -> Option<(DateTime<Utc>, u32)> {
    let rest = s.strip_prefix('D')?;
    let (stamp, instrument) = rest.split_once("_IFCB")?;
    let (date, time) = stamp.split_once('T')?;

    if date.len() != 8 || !all_digits(date) {
        return None;
    }
    if !(time.len() == 4 || time.len() == 6) || !all_digits(time) {
        return None;
    }

    let instrument = parse_instrument(instrument)?;
    let date = NaiveDate::from_ymd_opt(
        date[0..4].parse().ok()?,
        date[4..6].parse().ok()?,
        date[6..8].parse().ok()?,
    )?;
    let time = parse_hms(time)?;

    Some((date.and_time(time).and_utc(), instrument))
}

fn parse_v1(s: &str) -> Option<(DateTime<Utc>, u32)> {
    let rest = s.strip_prefix("IFCB")?;
    let mut parts = rest.split('_');
    let instrument = parse_instrument(parts.next()?)?;
    let year = parts.next()?;
    let day_of_year = parts.next()?;
    let time = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    if year.len() != 4 || !all_digits(year) {
        return None;
    }
    if day_of_year.len() != 3 || !all_digits(day_of_year) {
        return None;
    }
    if time.len() != 6 || !all_digits(time) {
        return None;
    }

    let date = NaiveDate::from_yo_opt(year.parse().ok()?, day_of_year.parse().ok()?)?;
    let time = parse_hms(time)?;

    Some((date.and_time(time).and_utc(), instrument))
}

impl PartialEq for Pid {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Pid {}

impl Hash for Pid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl PartialOrd for Pid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pid {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl Display for Pid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl FromStr for Pid {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

impl TryFrom<String> for Pid {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Pid> for String {
    fn from(pid: Pid) -> Self {
        pid.value
    }
}

impl AsRef<str> for Pid {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_parse_v2_minute_resolution() {
        let pid = Pid::new("D20190102T1234_IFCB927").unwrap();
        assert_eq!(pid.scheme(), PidScheme::V2);
        assert_eq!(pid.instrument(), 927);
        assert_eq!(
            pid.timestamp(),
            Utc.with_ymd_and_hms(2019, 1, 2, 12, 34, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_v2_second_resolution() {
        let pid = Pid::new("D20190102T123456_IFCB010").unwrap();
        assert_eq!(pid.instrument(), 10);
        assert_eq!(
            pid.timestamp(),
            Utc.with_ymd_and_hms(2019, 1, 2, 12, 34, 56).unwrap()
        );
    }

    #[test]
    fn test_parse_v1() {
        let pid = Pid::new("IFCB1_2009_216_112409").unwrap();
        assert_eq!(pid.scheme(), PidScheme::V1);
        assert_eq!(pid.instrument(), 1);
        // day 216 of 2009 is August 4th
        assert_eq!(
            pid.timestamp(),
            Utc.with_ymd_and_hms(2009, 8, 4, 11, 24, 9).unwrap()
        );
    }

    #[test]
    fn test_rejects_malformed_identifiers() {
        for bad in [
            "",
            "D20190102_IFCB927",
            "D20190102T12_IFCB927",
            "D20191302T1234_IFCB927",
            "D20190102T1234_IFCB",
            "D20190102T1234_IFCBx1",
            "X20190102T1234_IFCB927",
            "IFCB1_2009_400_112409",
            "IFCB1_2009_216",
            "IFCB1_2009_216_112409_extra",
            "notes",
        ] {
            assert!(
                matches!(Pid::new(bad), Err(DomainError::InvalidPid(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_from_str_trims() {
        let pid: Pid = "  D20190102T1234_IFCB927\n".parse().unwrap();
        assert_eq!(pid.as_str(), "D20190102T1234_IFCB927");
    }

    #[test]
    fn test_ordering_follows_identifier_string() {
        let a = Pid::new("D20190102T1234_IFCB927").unwrap();
        let b = Pid::new("D20190103T0000_IFCB927").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_serde_as_string() {
        let pid = Pid::new("D20190102T1234_IFCB927").unwrap();
        let json = serde_json::to_string(&pid).unwrap();
        assert_eq!(json, "\"D20190102T1234_IFCB927\"");

        let back: Pid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pid);
        assert_eq!(back.instrument(), 927);

        let bad: Result<Pid, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }
}
