//! Instrument configuration selection.
//!
//! Exposure times are scaled from a reference of 300 s for a V = 24.5 source,
//! using the squared flux ratio (background-limited regime), then snapped to
//! the configured bucket table. Bucket `i` is exposed in the observing
//! program as instrument configuration `I{i+1}`.

use qtty::Seconds;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Exposure buckets configured in the telescope phase-2 program, seconds.
pub const DEFAULT_EXPOSURE_BUCKETS: [f64; 13] = [
    40.0, 80.0, 120.0, 160.0, 200.0, 240.0, 300.0, 340.0, 380.0, 420.0, 440.0, 480.0, 500.0,
];

pub const REFERENCE_EXPOSURE_SEC: f64 = 300.0;
pub const REFERENCE_MAGNITUDE: f64 = 24.5;
pub const MIN_IDEAL_EXPOSURE_SEC: f64 = 40.0;
pub const MAX_IDEAL_EXPOSURE_SEC: f64 = 499.0;

#[derive(Debug, Error, PartialEq)]
pub enum ExposureTableError {
    #[error("exposure table is empty")]
    Empty,
    #[error("exposure table must be strictly ascending (entry {index}: {value}s)")]
    NotAscending { index: usize, value: f64 },
    #[error("exposure table entries must be positive and finite (entry {index}: {value}s)")]
    InvalidEntry { index: usize, value: f64 },
}

/// Chosen bucket for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureSelection {
    /// Zero-based bucket index.
    pub index: usize,
    pub exposure: Seconds,
    pub configuration_id: String,
}

/// Strictly ascending table of exposure buckets.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentConfigurations {
    buckets: Vec<f64>,
}

impl InstrumentConfigurations {
    pub fn new(buckets: Vec<f64>) -> Result<Self, ExposureTableError> {
        if buckets.is_empty() {
            return Err(ExposureTableError::Empty);
        }
        for (index, value) in buckets.iter().copied().enumerate() {
            if !value.is_finite() || value <= 0.0 {
                return Err(ExposureTableError::InvalidEntry { index, value });
            }
            if index > 0 && value <= buckets[index - 1] {
                return Err(ExposureTableError::NotAscending { index, value });
            }
        }
        Ok(Self { buckets })
    }

    pub fn buckets(&self) -> &[f64] {
        &self.buckets
    }

    /// Pick the bucket for a source of magnitude `magnitude`.
    ///
    /// The index is the table length minus the number of buckets strictly
    /// longer than the ideal exposure, bounded to the table.
    pub fn select(&self, magnitude: f64) -> ExposureSelection {
        let ideal = ideal_exposure(magnitude).value();
        let longer = self.buckets.iter().filter(|&&bucket| ideal < bucket).count();
        let index = (self.buckets.len() - longer).min(self.buckets.len() - 1);

        ExposureSelection {
            index,
            exposure: Seconds::new(self.buckets[index]),
            configuration_id: configuration_identifier(index),
        }
    }

    pub fn exposure_time(&self, magnitude: f64) -> Seconds {
        self.select(magnitude).exposure
    }
}

impl Default for InstrumentConfigurations {
    fn default() -> Self {
        Self {
            buckets: DEFAULT_EXPOSURE_BUCKETS.to_vec(),
        }
    }
}

/// Unsnapped exposure for `magnitude`, clamped to the instrument limits.
///
/// A NaN magnitude lands on the lower limit.
pub fn ideal_exposure(magnitude: f64) -> Seconds {
    let flux_ratio = 10f64.powf((REFERENCE_MAGNITUDE - magnitude) / 2.5);
    let exact = REFERENCE_EXPOSURE_SEC / (flux_ratio * flux_ratio);
    Seconds::new(exact.max(MIN_IDEAL_EXPOSURE_SEC).min(MAX_IDEAL_EXPOSURE_SEC))
}

pub fn configuration_identifier(index: usize) -> String {
    format!("I{}", index + 1)
}
