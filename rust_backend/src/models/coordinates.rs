//! Equatorial sky coordinates.

use std::fmt;

use qtty::{Degree, Degrees, Radian};
use serde::{Deserialize, Serialize};

/// Right ascension / declination pair, both in degrees.
///
/// Right ascension is kept in `[0, 360)`; declination in `[-90, 90]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyCoordinate {
    pub ra: Degrees,
    pub dec: Degrees,
}

impl SkyCoordinate {
    /// Build a coordinate, wrapping RA into `[0, 360)`.
    ///
    /// Returns `None` for non-finite input or a declination outside ±90°.
    pub fn new(ra: Degrees, dec: Degrees) -> Option<Self> {
        if !ra.value().is_finite() || !dec.value().is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&dec.value()) {
            return None;
        }
        Some(Self {
            ra: Degrees::new(ra.value().rem_euclid(360.0)),
            dec,
        })
    }

    pub fn from_degrees(ra: f64, dec: f64) -> Option<Self> {
        Self::new(Degrees::new(ra), Degrees::new(dec))
    }

    /// Great-circle distance to `other`.
    ///
    /// Uses the Vincenty form, which stays well conditioned for both tiny and
    /// near-antipodal separations.
    pub fn separation(&self, other: &SkyCoordinate) -> Degrees {
        let (sin_dec1, cos_dec1) = self.dec.sin_cos();
        let (sin_dec2, cos_dec2) = other.dec.sin_cos();
        let delta_ra = (other.ra - self.ra).to::<Radian>().value();
        let (sin_dra, cos_dra) = delta_ra.sin_cos();

        let num = ((cos_dec2 * sin_dra).powi(2)
            + (cos_dec1 * sin_dec2 - sin_dec1 * cos_dec2 * cos_dra).powi(2))
        .sqrt();
        let den = sin_dec1 * sin_dec2 + cos_dec1 * cos_dec2 * cos_dra;

        qtty::Radians::new(num.atan2(den)).to::<Degree>()
    }
}

impl fmt::Display for SkyCoordinate {
    /// Sexagesimal `HH:MM:SS.ss +DD:MM:SS.s`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ra_hours = self.ra.value() / 15.0;
        let (rh, rm, rs) = sexagesimal(ra_hours, 2);
        let sign = if self.dec.value() < 0.0 { '-' } else { '+' };
        let (dd, dm, ds) = sexagesimal(self.dec.value().abs(), 1);
        write!(
            f,
            "{:02}:{:02}:{:05.2} {}{:02}:{:02}:{:04.1}",
            rh % 24, rm, rs, sign, dd, dm, ds
        )
    }
}

/// Split a non-negative value into units, minutes and seconds, rounded to
/// `decimals` places of a second before carrying.
fn sexagesimal(value: f64, decimals: u32) -> (u64, u64, f64) {
    let unit = 10u64.pow(decimals);
    let scaled = (value * 3600.0 * unit as f64).round() as u64;
    let whole = scaled / (3600 * unit);
    let minutes = (scaled % (3600 * unit)) / (60 * unit);
    let seconds = (scaled % (60 * unit)) as f64 / unit as f64;
    (whole, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(ra: f64, dec: f64) -> SkyCoordinate {
        SkyCoordinate::from_degrees(ra, dec).unwrap()
    }

    #[test]
    fn test_ra_is_wrapped() {
        assert!((coord(370.0, 0.0).ra.value() - 10.0).abs() < 1e-12);
        assert!((coord(-10.0, 0.0).ra.value() - 350.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_declination_rejected() {
        assert!(SkyCoordinate::from_degrees(0.0, 91.0).is_none());
        assert!(SkyCoordinate::from_degrees(f64::NAN, 0.0).is_none());
    }

    #[test]
    fn test_separation_along_equator() {
        let sep = coord(10.0, 0.0).separation(&coord(12.0, 0.0));
        assert!((sep.value() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_separation_across_ra_wrap() {
        let sep = coord(359.0, 0.0).separation(&coord(1.0, 0.0));
        assert!((sep.value() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_separation_to_pole_and_self() {
        let sep = coord(0.0, 0.0).separation(&coord(123.0, 90.0));
        assert!((sep.value() - 90.0).abs() < 1e-9);
        assert!(coord(45.0, 20.0).separation(&coord(45.0, 20.0)).value().abs() < 1e-12);
    }

    #[test]
    fn test_separation_is_symmetric() {
        let a = coord(10.0, 15.0);
        let b = coord(200.0, -30.0);
        assert!((a.separation(&b).value() - b.separation(&a).value()).abs() < 1e-12);
    }

    #[test]
    fn test_display_sexagesimal() {
        let text = coord(15.0, -1.5).to_string();
        assert_eq!(text, "01:00:00.00 -01:30:00.0");
    }

    #[test]
    fn test_display_carries_rounded_seconds() {
        assert_eq!(coord(15.0, 1.999_999_9).to_string(), "01:00:00.00 +02:00:00.0");
        // 23:59:59.9996 rounds up to the next day.
        let ra = (24.0 - 0.0004 / 3600.0) * 15.0;
        assert_eq!(coord(ra, -0.5).to_string(), "00:00:00.00 -00:30:00.0");
    }
}
