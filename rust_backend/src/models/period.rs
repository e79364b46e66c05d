use serde::{Deserialize, Serialize};

use super::ModifiedJulianDate;

/// Time period in Modified Julian Date (MJD) format.
///
/// Invariant: `start <= stop`. Use [`Period::try_new`] when the ordering of the
/// bounds is not already known.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Period {
    /// Start time in MJD
    pub start: ModifiedJulianDate,
    /// End time in MJD
    pub stop: ModifiedJulianDate,
}

impl Period {
    /// Build a period, returning `None` when `stop` precedes `start`.
    pub fn try_new(start: ModifiedJulianDate, stop: ModifiedJulianDate) -> Option<Self> {
        if start.value() <= stop.value() {
            Some(Self { start, stop })
        } else {
            None
        }
    }

    pub fn from_mjd(start: f64, stop: f64) -> Self {
        Self {
            start: ModifiedJulianDate::new(start),
            stop: ModifiedJulianDate::new(stop),
        }
    }

    /// Length of the interval in days.
    pub fn duration(&self) -> qtty::Days {
        self.stop - self.start
    }

    /// Length of the interval in hours.
    pub fn duration_hours(&self) -> f64 {
        self.duration().value() * 24.0
    }

    /// Check if a given MJD instant lies inside this interval (inclusive start, exclusive end).
    pub fn contains(&self, t_mjd: ModifiedJulianDate) -> bool {
        self.start.value() <= t_mjd.value() && t_mjd.value() < self.stop.value()
    }

    /// Check if `other` lies entirely within this interval (bounds inclusive).
    pub fn encloses(&self, other: &Period) -> bool {
        self.start.value() <= other.start.value() && other.stop.value() <= self.stop.value()
    }

    /// Check if this interval overlaps with another.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start.value() < other.stop.value() && other.start.value() < self.stop.value()
    }
}
