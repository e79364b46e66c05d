//! Ephemeris provider abstraction.
//!
//! The planner asks a provider for the apparent position and magnitude of a
//! minor planet at one instant. Lookups are read-only and idempotent per
//! `(designation, instant)` pair, so callers may issue them concurrently.
//!
//! [`TableEphemeris`] serves positions from a pre-computed JSON table; a
//! networked service would implement the same trait.

pub mod table;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{Designation, ModifiedJulianDate, SkyCoordinate};

pub use table::{EphemerisDocument, EphemerisRow, TableEphemeris, TargetEphemeris};

/// Predicted position of a target at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EphemerisPoint {
    pub at: ModifiedJulianDate,
    pub coordinate: SkyCoordinate,
    /// Apparent visual magnitude.
    pub magnitude: f64,
}

/// Result type for ephemeris lookups
pub type EphemerisResult<T> = Result<T, EphemerisError>;

#[derive(Debug, thiserror::Error)]
pub enum EphemerisError {
    #[error("No ephemeris available for {0}")]
    UnknownTarget(String),

    #[error("{designation}: {at} is outside the tabulated range {start} .. {stop}")]
    OutOfRange {
        designation: String,
        at: ModifiedJulianDate,
        start: ModifiedJulianDate,
        stop: ModifiedJulianDate,
    },

    #[error("Invalid ephemeris for {designation}: {message}")]
    InvalidData { designation: String, message: String },

    #[error("Failed to read ephemeris file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse ephemeris document at '{path}': {message}")]
    Parse { path: String, message: String },

    #[error("Ephemeris service error: {0}")]
    Service(String),
}

/// Source of target positions.
///
/// Implementations must be `Send + Sync` so lookups can be driven from
/// concurrent tasks.
#[async_trait]
pub trait EphemerisProvider: Send + Sync {
    /// Position and magnitude of `designation` at `at`.
    async fn predict(
        &self,
        designation: &Designation,
        at: ModifiedJulianDate,
    ) -> EphemerisResult<EphemerisPoint>;
}
