//! Sidereal time and horizon geometry.

use qtty::Degrees;

use crate::models::{ModifiedJulianDate, SkyCoordinate};

/// Julian Date of J2000.0.
pub const J2000_JD: f64 = 2_451_545.0;

pub const DAYS_PER_JULIAN_CENTURY: f64 = 36_525.0;

/// Sidereal degrees swept per solar day.
pub const SIDEREAL_DEGREES_PER_DAY: f64 = 360.985_647_366_29;

/// Greenwich mean sidereal time, wrapped into `[0, 360)`.
///
/// UTC stands in for UT1; the sub-second difference is irrelevant at the
/// minute-level precision planning needs.
pub fn greenwich_mean_sidereal_time(at: ModifiedJulianDate) -> Degrees {
    let d = at.julian_date() - J2000_JD;
    let t = d / DAYS_PER_JULIAN_CENTURY;
    let theta = 280.460_618_37 + SIDEREAL_DEGREES_PER_DAY * d + 0.000_387_933 * t * t
        - t * t * t / 38_710_000.0;
    Degrees::new(theta.rem_euclid(360.0))
}

/// Local mean sidereal time for an east-positive longitude.
pub fn local_sidereal_time(at: ModifiedJulianDate, longitude: Degrees) -> Degrees {
    Degrees::new((greenwich_mean_sidereal_time(at).value() + longitude.value()).rem_euclid(360.0))
}

/// Altitude of `coordinate` above the geometric horizon.
pub fn altitude(
    coordinate: &SkyCoordinate,
    latitude: Degrees,
    longitude: Degrees,
    at: ModifiedJulianDate,
) -> Degrees {
    let hour_angle = local_sidereal_time(at, longitude) - coordinate.ra;
    let (sin_lat, cos_lat) = latitude.sin_cos();
    let (sin_dec, cos_dec) = coordinate.dec.sin_cos();
    let sin_alt = sin_lat * sin_dec + cos_lat * cos_dec * hour_angle.cos();
    Degrees::new(sin_alt.clamp(-1.0, 1.0).asin().to_degrees())
}

/// Earliest instant at or after `after` at which the local sidereal time
/// equals `sidereal_angle`.
pub fn next_sidereal_crossing(
    after: ModifiedJulianDate,
    longitude: Degrees,
    sidereal_angle: Degrees,
) -> ModifiedJulianDate {
    let current = local_sidereal_time(after, longitude);
    let delta = (sidereal_angle.value() - current.value()).rem_euclid(360.0);
    after.add_days(delta / SIDEREAL_DEGREES_PER_DAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gmst_at_j2000() {
        // 2000-01-01 12:00 UT, GMST = 280.46061837°
        let j2000 = ModifiedJulianDate::new(J2000_JD - crate::models::MJD_TO_JD);
        let gmst = greenwich_mean_sidereal_time(j2000);
        assert!((gmst.value() - 280.460_618_37).abs() < 1e-6);
    }

    #[test]
    fn test_gmst_meeus_example() {
        // Meeus example 12.a: 1987-04-10 0h UT, GMST = 13h10m46.3668s
        let at = ModifiedJulianDate::parse_utc("1987-04-10T00:00:00").unwrap();
        let expected = (13.0 + 10.0 / 60.0 + 46.3668 / 3600.0) * 15.0;
        assert!((greenwich_mean_sidereal_time(at).value() - expected).abs() < 1e-4);
    }

    #[test]
    fn test_local_sidereal_time_wraps() {
        let at = ModifiedJulianDate::new(58133.0);
        let lst = local_sidereal_time(at, Degrees::new(-155.0));
        assert!((0.0..360.0).contains(&lst.value()));
    }

    #[test]
    fn test_next_crossing_hits_requested_angle() {
        let after = ModifiedJulianDate::new(58133.1);
        let longitude = Degrees::new(-155.4689);
        let target = Degrees::new(42.0);
        let crossing = next_sidereal_crossing(after, longitude, target);

        assert!(crossing >= after);
        assert!(crossing.value() - after.value() < 1.0);
        let lst = local_sidereal_time(crossing, longitude);
        assert!((lst.value() - 42.0).abs() < 1e-6);
    }

    #[test]
    fn test_altitude_at_transit_matches_zenith_distance() {
        let latitude = Degrees::new(19.8);
        let longitude = Degrees::new(-155.5);
        let coordinate = SkyCoordinate::from_degrees(80.0, 10.0).unwrap();
        let transit = next_sidereal_crossing(ModifiedJulianDate::new(58133.0), longitude, coordinate.ra);

        let alt = altitude(&coordinate, latitude, longitude, transit);
        assert!((alt.value() - (90.0 - 9.8)).abs() < 1e-6);
    }
}
