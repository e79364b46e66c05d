//! Dark-sky periods from siderust.
//!
//! Night periods are the intervals during which the Sun's altitude stays
//! below a twilight threshold; here the threshold is the site's dark
//! horizon.

use qtty::{Meter, Quantity};
use siderust::astro::ModifiedJulianDate as SiderustMJD;
use siderust::calculus::solar::altitude_periods::find_night_periods;
use siderust::coordinates::centers::ObserverSite as SiderustSite;
use siderust::time::Period as SiderustPeriod;

use crate::models::{ModifiedJulianDate, ObserverSite, Period};

fn to_siderust_site(site: &ObserverSite) -> SiderustSite {
    SiderustSite::new(
        site.longitude,
        site.latitude,
        Quantity::<Meter>::new(site.elevation_m),
    )
}

/// Periods within `span` during which the Sun is below `site.dark_horizon`.
///
/// Periods are clipped to `span` and returned in time order.
pub fn night_periods(site: &ObserverSite, span: &Period) -> Vec<Period> {
    let search = SiderustPeriod::new(
        SiderustMJD::new(span.start.value()),
        SiderustMJD::new(span.stop.value()),
    );

    let mut nights: Vec<Period> = find_night_periods(to_siderust_site(site), search, site.dark_horizon)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| {
            Period::try_new(
                ModifiedJulianDate::new(p.start.value()),
                ModifiedJulianDate::new(p.end.value()),
            )
        })
        .collect();
    nights.sort_by(|a, b| a.start.value().total_cmp(&b.start.value()));
    nights
}

/// Whether `at` falls inside one of `nights`.
pub fn is_dark(nights: &[Period], at: ModifiedJulianDate) -> bool {
    nights.iter().any(|night| night.contains(at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use qtty::Degrees;

    #[test]
    fn test_one_night_per_day_at_mauna_kea() {
        let site = ObserverSite::cfht();
        // 2018-01-15 00:00 UTC .. 2018-01-18 00:00 UTC
        let span = Period::from_mjd(58133.0, 58136.0);
        let nights = night_periods(&site, &span);

        assert_eq!(nights.len(), 3);
        for night in &nights {
            assert!(span.encloses(night));
            assert!(night.duration_hours() > 10.0 && night.duration_hours() < 13.5);
        }
        assert!(nights.windows(2).all(|pair| pair[0].stop < pair[1].start));
    }

    #[test]
    fn test_midnight_sun_has_no_night() {
        let site = ObserverSite::new("svalbard", Degrees::new(78.2), Degrees::new(15.6), 0.0).unwrap();
        let start = ModifiedJulianDate::parse_utc("2018-06-21T00:00:00").unwrap();
        let span = Period::try_new(start, start.add_days(2.0)).unwrap();
        assert!(night_periods(&site, &span).is_empty());
    }

    #[test]
    fn test_is_dark_checks_every_period() {
        let nights = vec![Period::from_mjd(58133.2, 58133.7), Period::from_mjd(58134.2, 58134.7)];
        assert!(is_dark(&nights, ModifiedJulianDate::new(58133.4)));
        assert!(is_dark(&nights, ModifiedJulianDate::new(58134.4)));
        assert!(!is_dark(&nights, ModifiedJulianDate::new(58133.9)));
    }
}
