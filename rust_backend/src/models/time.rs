use std::fmt;
use std::ops::Sub;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::*;

/// MJD of the Unix epoch (1970-01-01 00:00:00 UTC).
const UNIX_EPOCH_MJD: f64 = 40587.0;

/// Offset between Julian Date and Modified Julian Date.
pub const MJD_TO_JD: f64 = 2_400_000.5;

/// Accepted textual UTC layouts, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Modified Julian Date representation (UTC).
/// MJD 0 = 1858-11-17 00:00:00 UTC
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ModifiedJulianDate(qtty::Days);

impl ModifiedJulianDate {
    /// Create a new MJD value.
    pub fn new<V: Into<qtty::Days>>(v: V) -> Self {
        Self(v.into())
    }

    /// Raw MJD value as f64.
    pub fn value(&self) -> f64 {
        self.0.value()
    }

    /// Julian Date of this instant.
    pub fn julian_date(&self) -> f64 {
        self.value() + MJD_TO_JD
    }

    /// Convert to Unix timestamp (seconds since 1970-01-01 00:00:00 UTC).
    pub fn to_unix_timestamp(&self) -> f64 {
        (self.value() - UNIX_EPOCH_MJD) * 86400.0
    }

    /// Create from Unix timestamp (seconds since 1970-01-01 00:00:00 UTC).
    pub fn from_unix_timestamp(timestamp: f64) -> Self {
        Self::new(timestamp / 86400.0 + UNIX_EPOCH_MJD)
    }

    /// Convert to chrono DateTime<Utc>.
    pub fn to_datetime(&self) -> DateTime<Utc> {
        let secs = self.to_unix_timestamp();
        let secs_i64 = secs.floor() as i64;
        let nanos = ((secs - secs.floor()) * 1e9) as u32;
        DateTime::from_timestamp(secs_i64, nanos).unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Create from chrono DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self::from_unix_timestamp(dt.timestamp() as f64 + dt.timestamp_subsec_nanos() as f64 / 1e9)
    }

    /// Parse a UTC instant.
    ///
    /// Accepts ISO-like date-times (`2018-01-15T06:30:00`, `2018-01-15 06:30`),
    /// RFC 3339 strings, bare dates (`2018-01-15`, midnight) and raw MJD numbers
    /// (`58133.25`).
    pub fn parse_utc(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        if let Ok(mjd) = text.parse::<f64>() {
            return mjd.is_finite().then(|| Self::new(mjd));
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(Self::from_datetime(dt.with_timezone(&Utc)));
        }

        for format in DATETIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
                return Some(Self::from_datetime(naive.and_utc()));
            }
        }

        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| Self::from_datetime(naive.and_utc()))
    }

    /// Shift this instant by a number of days (negative values move backwards).
    pub fn add_days(&self, days: f64) -> Self {
        Self::new(self.value() + days)
    }

    /// Shift this instant by a duration.
    pub fn add_seconds(&self, seconds: qtty::Seconds) -> Self {
        self.add_days(seconds.value() / 86400.0)
    }
}

impl From<f64> for ModifiedJulianDate {
    fn from(v: f64) -> Self {
        ModifiedJulianDate::new(v)
    }
}

impl Sub for ModifiedJulianDate {
    type Output = qtty::Days;

    fn sub(self, rhs: Self) -> Self::Output {
        qtty::Days::new(self.value() - rhs.value())
    }
}

impl fmt::Display for ModifiedJulianDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().format("%Y-%m-%d %H:%M:%S"))
    }
}
