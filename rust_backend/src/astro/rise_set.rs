//! Horizon crossings for fixed bodies.
//!
//! Crossings are geometric, with no refraction. The horizon altitude passed
//! in already encodes the elevation limit the caller cares about.

use qtty::Degrees;
use serde::{Deserialize, Serialize};

use super::sidereal::next_sidereal_crossing;
use crate::models::{ModifiedJulianDate, ObserverSite, SkyCoordinate};

/// Next horizon crossings of a body relative to a reference instant.
///
/// `rise` and `set` are each the first such event after the reference, found
/// independently; when the body is up at the reference, `set < rise`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RiseSet {
    Crosses {
        rise: ModifiedJulianDate,
        set: ModifiedJulianDate,
    },
    /// Body never drops below the horizon at this latitude.
    AlwaysUp,
    /// Body never climbs above the horizon at this latitude.
    NeverUp,
}

impl RiseSet {
    pub fn rise(&self) -> Option<ModifiedJulianDate> {
        match self {
            RiseSet::Crosses { rise, .. } => Some(*rise),
            _ => None,
        }
    }

    pub fn set(&self) -> Option<ModifiedJulianDate> {
        match self {
            RiseSet::Crosses { set, .. } => Some(*set),
            _ => None,
        }
    }
}

/// Hour angle at which a body of declination `dec` crosses `horizon`.
enum HorizonHourAngle {
    Crossing(Degrees),
    AlwaysUp,
    NeverUp,
}

fn horizon_hour_angle(latitude: Degrees, dec: Degrees, horizon: Degrees) -> HorizonHourAngle {
    let (sin_lat, cos_lat) = latitude.sin_cos();
    let (sin_dec, cos_dec) = dec.sin_cos();
    let denominator = cos_lat * cos_dec;

    if denominator.abs() < 1e-12 {
        // Pole or polar body: altitude is constant through the day.
        return if sin_lat * sin_dec > horizon.sin() {
            HorizonHourAngle::AlwaysUp
        } else {
            HorizonHourAngle::NeverUp
        };
    }

    let cos_h0 = (horizon.sin() - sin_lat * sin_dec) / denominator;
    if cos_h0 < -1.0 {
        HorizonHourAngle::AlwaysUp
    } else if cos_h0 > 1.0 {
        HorizonHourAngle::NeverUp
    } else {
        HorizonHourAngle::Crossing(Degrees::new(cos_h0.acos().to_degrees()))
    }
}

/// Next rise and set of a fixed body across `horizon` after `after`.
pub fn fixed_body_rise_set(
    site: &ObserverSite,
    coordinate: &SkyCoordinate,
    horizon: Degrees,
    after: ModifiedJulianDate,
) -> RiseSet {
    match horizon_hour_angle(site.latitude, coordinate.dec, horizon) {
        HorizonHourAngle::AlwaysUp => RiseSet::AlwaysUp,
        HorizonHourAngle::NeverUp => RiseSet::NeverUp,
        HorizonHourAngle::Crossing(h0) => RiseSet::Crosses {
            rise: next_sidereal_crossing(after, site.longitude, coordinate.ra - h0),
            set: next_sidereal_crossing(after, site.longitude, coordinate.ra + h0),
        },
    }
}
