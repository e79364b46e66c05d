use qtty::Degrees;
use serde::{Deserialize, Serialize};

/// Telescope site plus the two horizons used for planning.
///
/// The dark horizon is the Sun altitude below which the sky counts as dark
/// (negative, e.g. -7°). The observable horizon is the minimum target
/// elevation worth pointing at (e.g. 40°).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverSite {
    pub name: String,
    /// Geodetic latitude, north positive.
    pub latitude: Degrees,
    /// Longitude, east positive.
    pub longitude: Degrees,
    pub elevation_m: f64,
    pub dark_horizon: Degrees,
    pub observable_horizon: Degrees,
}

impl ObserverSite {
    pub fn new(
        name: impl Into<String>,
        latitude: Degrees,
        longitude: Degrees,
        elevation_m: f64,
    ) -> Result<Self, String> {
        if !(-90.0..=90.0).contains(&latitude.value()) {
            return Err("Latitude must be between -90 and 90 degrees".to_string());
        }
        if !(-180.0..=180.0).contains(&longitude.value()) {
            return Err("Longitude must be between -180 and 180 degrees".to_string());
        }
        Ok(Self {
            name: name.into(),
            latitude,
            longitude,
            elevation_m,
            dark_horizon: Degrees::new(-7.0),
            observable_horizon: Degrees::new(40.0),
        })
    }

    /// Canada-France-Hawaii Telescope, Maunakea.
    pub fn cfht() -> Self {
        Self {
            name: "CFHT".to_string(),
            latitude: Degrees::new(19.8253),
            longitude: Degrees::new(-155.4689),
            elevation_m: 4204.0,
            dark_horizon: Degrees::new(-7.0),
            observable_horizon: Degrees::new(40.0),
        }
    }

    pub fn with_horizons(mut self, dark: Degrees, observable: Degrees) -> Self {
        self.dark_horizon = dark;
        self.observable_horizon = observable;
        self
    }
}

impl Default for ObserverSite {
    fn default() -> Self {
        Self::cfht()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates_ranges() {
        assert!(ObserverSite::new("x", Degrees::new(95.0), Degrees::new(0.0), 0.0).is_err());
        assert!(ObserverSite::new("x", Degrees::new(0.0), Degrees::new(190.0), 0.0).is_err());
        let site = ObserverSite::new("x", Degrees::new(-30.0), Degrees::new(-70.0), 2200.0).unwrap();
        assert_eq!(site.dark_horizon.value(), -7.0);
        assert_eq!(site.observable_horizon.value(), 40.0);
    }

    #[test]
    fn test_default_is_cfht() {
        let site = ObserverSite::default();
        assert_eq!(site.name, "CFHT");
        assert!(site.longitude.value() < 0.0);
    }
}
