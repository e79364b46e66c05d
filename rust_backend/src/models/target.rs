//! Candidate and visibility-confirmed targets.

use std::fmt;
use std::str::FromStr;

use qtty::Arcseconds;
use serde::{Deserialize, Serialize};

use super::{ModifiedJulianDate, Period, SkyCoordinate};
use crate::astro::RiseSet;

/// Dynamical classes used by the RECON candidate lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrbitClass {
    #[serde(rename = "CENTAURR")]
    Centaur,
    #[serde(rename = "ERR2LARGE")]
    ErrTooLarge,
    #[serde(rename = "RESONANT")]
    Resonant,
    #[serde(rename = "CLASSICAL")]
    Classical,
    #[serde(rename = "SCATNEAR")]
    ScatNear,
}

impl OrbitClass {
    pub const ALL: [OrbitClass; 5] = [
        OrbitClass::Centaur,
        OrbitClass::ErrTooLarge,
        OrbitClass::Resonant,
        OrbitClass::Classical,
        OrbitClass::ScatNear,
    ];

    /// Classes tracked when the operator does not pick any.
    pub const DEFAULT_SELECTION: [OrbitClass; 4] = [
        OrbitClass::ErrTooLarge,
        OrbitClass::Resonant,
        OrbitClass::Classical,
        OrbitClass::ScatNear,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            OrbitClass::Centaur => "CENTAURR",
            OrbitClass::ErrTooLarge => "ERR2LARGE",
            OrbitClass::Resonant => "RESONANT",
            OrbitClass::Classical => "CLASSICAL",
            OrbitClass::ScatNear => "SCATNEAR",
        }
    }

    /// Map a table label onto a class; labels outside the known set are
    /// treated as resonant.
    pub fn from_label_or_default(label: &str) -> Self {
        label.parse().unwrap_or(OrbitClass::Resonant)
    }
}

impl FromStr for OrbitClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        OrbitClass::ALL
            .into_iter()
            .find(|class| class.label() == wanted)
            .ok_or_else(|| format!("Unknown orbit class: {}", s))
    }
}

impl fmt::Display for OrbitClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Decoded minor-planet designation, in the form an ephemeris service expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Designation {
    /// Permanent number, e.g. `15760`.
    Numbered(u32),
    /// Provisional designation in unpacked form, e.g. `2003 UZ413`.
    Provisional(String),
}

impl Designation {
    /// Designation with spaces replaced, usable inside tokens and file names.
    pub fn token_name(&self) -> String {
        self.to_string().replace(' ', "_")
    }
}

impl fmt::Display for Designation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Designation::Numbered(number) => write!(f, "{}", number),
            Designation::Provisional(name) => f.write_str(name),
        }
    }
}

/// One row of a candidate table after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTarget {
    /// Designation exactly as it appeared in the table.
    pub raw_designation: String,
    pub designation: Designation,
    pub orbit_class: OrbitClass,
    pub position_uncertainty: Arcseconds,
    /// Predicted occultation event time, when the list carries one.
    pub event_time: Option<ModifiedJulianDate>,
}

/// Target that passed the visibility filter for the night.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibleTarget {
    pub candidate: CandidateTarget,
    /// Position at the start of the dark interval.
    pub coordinate: SkyCoordinate,
    pub magnitude: f64,
    /// Dark time with the target above the observable horizon.
    pub window: Period,
    pub rise_set: RiseSet,
}

impl VisibleTarget {
    pub fn designation(&self) -> &Designation {
        &self.candidate.designation
    }
}

/// What the program repository stores for a target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub token: String,
    pub name: String,
    pub coordinate: SkyCoordinate,
    pub magnitude: f64,
    /// Instant the coordinate refers to.
    pub epoch: ModifiedJulianDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orbit_class_parsing_is_case_insensitive() {
        assert_eq!("classical".parse::<OrbitClass>().unwrap(), OrbitClass::Classical);
        assert_eq!(" SCATNEAR ".parse::<OrbitClass>().unwrap(), OrbitClass::ScatNear);
        assert!("PLUTINO".parse::<OrbitClass>().is_err());
    }

    #[test]
    fn test_unknown_class_defaults_to_resonant() {
        assert_eq!(OrbitClass::from_label_or_default("DETACHED"), OrbitClass::Resonant);
        assert_eq!(OrbitClass::from_label_or_default("CENTAURR"), OrbitClass::Centaur);
    }

    #[test]
    fn test_default_selection_excludes_centaurs() {
        assert!(!OrbitClass::DEFAULT_SELECTION.contains(&OrbitClass::Centaur));
    }

    #[test]
    fn test_designation_display_and_token_name() {
        let provisional = Designation::Provisional("2003 UZ413".to_string());
        assert_eq!(provisional.to_string(), "2003 UZ413");
        assert_eq!(provisional.token_name(), "2003_UZ413");
        assert_eq!(Designation::Numbered(15760).token_name(), "15760");
    }
}
