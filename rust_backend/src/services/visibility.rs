//! Visibility window computation.
//!
//! A target is observable while it is above the site's observable horizon
//! and the Sun is below the dark horizon. The darkness interval and the
//! target's rise/set times are computed relative to the same reference
//! instant, then reconciled into a single window:
//!
//! 1. the target rises after sunrise: usable only if it is already up at dusk,
//!    from sunset until it sets (or sunrise);
//! 2. the target rises before sunset: from sunset until it sets (or sunrise);
//! 3. the target rises during the night: from its rise until it sets (or
//!    sunrise).
//!
//! Windows shorter than the minimum duration are rejected. Rejection is an
//! expected outcome and is reported as data, not as an error.

use log::debug;
use qtty::{Hour, Hours};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::astro::{fixed_body_rise_set, night_periods, RiseSet};
use crate::models::{ModifiedJulianDate, ObserverSite, Period, SkyCoordinate};

/// Default minimum usable window.
pub const MINIMUM_UP_TIME_HOURS: f64 = 1.0;

/// Days searched ahead for the next dark period.
const DARKNESS_SEARCH_DAYS: f64 = 2.0;

/// Slack when deciding that a night runs into the end of the search span.
const SEARCH_EDGE_DAYS: f64 = 1e-6;

#[derive(Debug, Error, PartialEq)]
pub enum VisibilityError {
    #[error("the Sun never sets below {horizon}° at {site}")]
    NoDarkness { site: String, horizon: f64 },
}

/// Reconciled overlap between the dark interval and the target's up time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WindowOutcome {
    Overlap(Period),
    /// Target is below the observable horizon for the whole dark interval.
    NoOverlap,
    /// Target never reaches the observable horizon from this site.
    NeverRises,
}

/// Why a target was filtered out for the night.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Rejection {
    TooShort { window: Period },
    NoOverlap,
    NeverRises,
}

impl Rejection {
    pub fn describe(&self) -> String {
        match self {
            Rejection::TooShort { window } => {
                format!("only up for {:.2} hours", window.duration_hours())
            }
            Rejection::NoOverlap => "not up during the dark interval".to_string(),
            Rejection::NeverRises => "never reaches the observable horizon".to_string(),
        }
    }
}

/// Visibility verdict for one target and one night.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Visibility {
    Visible { window: Period, rise_set: RiseSet },
    Rejected { rejection: Rejection, rise_set: RiseSet },
}

impl Visibility {
    pub fn window(&self) -> Option<Period> {
        match self {
            Visibility::Visible { window, .. } => Some(*window),
            Visibility::Rejected { .. } => None,
        }
    }

    pub fn is_visible(&self) -> bool {
        matches!(self, Visibility::Visible { .. })
    }
}

/// Dark interval (Sun below `site.dark_horizon`) for the night at or after `after`.
///
/// If the sky is already dark at `after`, the interval starts at `after`.
/// Under continuous darkness the interval spans one day from `after`.
pub fn darkness_interval(
    site: &ObserverSite,
    after: ModifiedJulianDate,
) -> Result<Period, VisibilityError> {
    let no_darkness = || VisibilityError::NoDarkness {
        site: site.name.clone(),
        horizon: site.dark_horizon.value(),
    };

    let search = Period::try_new(after, after.add_days(DARKNESS_SEARCH_DAYS))
        .ok_or_else(no_darkness)?;
    let night = night_periods(site, &search)
        .into_iter()
        .next()
        .ok_or_else(no_darkness)?;

    let (sun_set, sun_rise) = if night.stop.value() >= search.stop.value() - SEARCH_EDGE_DAYS {
        // No sunrise within the search span.
        (night.start, night.start.add_days(1.0))
    } else {
        (night.start, night.stop)
    };

    debug!(
        "Dark interval at {}: {} -> {} ({:.2} h)",
        site.name,
        sun_set,
        sun_rise,
        (sun_rise - sun_set).value() * 24.0
    );

    Period::try_new(sun_set, sun_rise).ok_or_else(no_darkness)
}

/// Rise and set of `coordinate` across the site's observable horizon.
pub fn target_rise_set(
    site: &ObserverSite,
    coordinate: &SkyCoordinate,
    after: ModifiedJulianDate,
) -> RiseSet {
    fixed_body_rise_set(site, coordinate, site.observable_horizon, after)
}

/// Intersect the dark interval with the target's time above the horizon.
///
/// The decision order follows the three cases in the module docs. A case-1
/// target whose next set follows its next rise is below the horizon all
/// night; any branch whose end precedes its start means the target set
/// before dusk. Both are reported as [`WindowOutcome::NoOverlap`].
pub fn reconcile(dark: &Period, rise_set: &RiseSet) -> WindowOutcome {
    let (sun_set, sun_rise) = (dark.start, dark.stop);
    let (target_rise, target_set) = match rise_set {
        RiseSet::Crosses { rise, set } => (*rise, *set),
        RiseSet::AlwaysUp => return WindowOutcome::Overlap(*dark),
        RiseSet::NeverUp => return WindowOutcome::NeverRises,
    };

    let end = if target_set < sun_rise { target_set } else { sun_rise };

    let start = if target_rise > sun_rise {
        if target_set > sun_set && target_set < target_rise {
            sun_set
        } else {
            return WindowOutcome::NoOverlap;
        }
    } else if target_rise < sun_set {
        sun_set
    } else {
        target_rise
    };

    match Period::try_new(start, end) {
        Some(window) => WindowOutcome::Overlap(window),
        None => WindowOutcome::NoOverlap,
    }
}

/// Classify a reconciled window against the minimum duration.
pub fn apply_minimum(outcome: WindowOutcome, minimum: Hours) -> Result<Period, Rejection> {
    match outcome {
        WindowOutcome::Overlap(window) => {
            let duration: Hours = window.duration().to::<Hour>();
            if duration < minimum {
                Err(Rejection::TooShort { window })
            } else {
                Ok(window)
            }
        }
        WindowOutcome::NoOverlap => Err(Rejection::NoOverlap),
        WindowOutcome::NeverRises => Err(Rejection::NeverRises),
    }
}

/// Full visibility verdict for one target position.
///
/// `reference` is the instant rise/set times are searched from; it must be
/// the same instant the dark interval was derived from.
pub fn compute_visibility(
    site: &ObserverSite,
    coordinate: &SkyCoordinate,
    dark: &Period,
    reference: ModifiedJulianDate,
    minimum: Hours,
) -> Visibility {
    let rise_set = target_rise_set(site, coordinate, reference);
    match apply_minimum(reconcile(dark, &rise_set), minimum) {
        Ok(window) => Visibility::Visible { window, rise_set },
        Err(rejection) => Visibility::Rejected { rejection, rise_set },
    }
}

pub fn default_minimum() -> Hours {
    Hours::new(MINIMUM_UP_TIME_HOURS)
}
