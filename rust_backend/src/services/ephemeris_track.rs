//! Fixed-step ephemeris tracks.
//!
//! Samples a target's predicted position between two instants and keeps the
//! samples taken while the target is above the site's observable horizon
//! and the Sun is below the dark horizon.

use std::fmt;

use futures::future::join_all;
use log::debug;
use qtty::{Degrees, Seconds};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::astro::{altitude, is_dark, night_periods};
use crate::ephemeris::{EphemerisError, EphemerisPoint, EphemerisProvider};
use crate::models::{Designation, ModifiedJulianDate, ObserverSite, Period};

pub const DEFAULT_STEP_MINUTES: f64 = 30.0;

pub fn default_step() -> Seconds {
    Seconds::new(DEFAULT_STEP_MINUTES * 60.0)
}

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("step size must be positive, got {0} s")]
    InvalidStep(f64),

    #[error(transparent)]
    Ephemeris(#[from] EphemerisError),
}

/// One retained sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub point: EphemerisPoint,
    pub altitude: Degrees,
}

impl fmt::Display for TrackPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} mag {:.2} alt {:.1}",
            self.point.at,
            self.point.coordinate,
            self.point.magnitude,
            self.altitude.value()
        )
    }
}

/// Sample instants from `span.start` up to, but excluding, `span.stop`.
pub fn sample_instants(span: &Period, step: Seconds) -> Result<Vec<ModifiedJulianDate>, TrackError> {
    let step_sec = step.value();
    if !(step_sec.is_finite() && step_sec > 0.0) {
        return Err(TrackError::InvalidStep(step_sec));
    }
    let span_sec = span.duration().value() * 86_400.0;
    // Tolerate rounding so that a stop instant on the grid is not sampled.
    let count = (span_sec / step_sec - 1e-9).ceil().max(0.0) as usize;
    Ok((0..count)
        .map(|i| span.start.add_seconds(Seconds::new(step_sec * i as f64)))
        .collect())
}

/// Observable samples of `designation` over `span`.
///
/// One provider lookup is issued per step; lookups run concurrently and the
/// result keeps time order. Any failed lookup fails the track.
pub async fn build_track<P: EphemerisProvider + ?Sized>(
    provider: &P,
    site: &ObserverSite,
    designation: &Designation,
    span: &Period,
    step: Seconds,
) -> Result<Vec<TrackPoint>, TrackError> {
    let instants = sample_instants(span, step)?;
    let nights = night_periods(site, span);
    let predictions = join_all(
        instants
            .iter()
            .map(|at| provider.predict(designation, *at)),
    )
    .await;

    let mut track = Vec::new();
    for prediction in predictions {
        let point = prediction?;
        if !is_dark(&nights, point.at) {
            continue;
        }
        let target_altitude = altitude(&point.coordinate, site.latitude, site.longitude, point.at);
        if target_altitude > site.observable_horizon {
            track.push(TrackPoint {
                point,
                altitude: target_altitude,
            });
        }
    }

    debug!(
        "{}: kept {} of {} samples",
        designation,
        track.len(),
        instants.len()
    );
    Ok(track)
}
