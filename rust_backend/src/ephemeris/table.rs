//! File-backed ephemeris tables.
//!
//! ```json
//! {
//!   "targets": [
//!     {
//!       "designation": "2014 UZ224",
//!       "points": [
//!         { "mjd": 58133.25, "ra": 45.10, "dec": 3.52, "mag": 23.4 },
//!         { "mjd": 58133.75, "ra": 45.08, "dec": 3.51, "mag": 23.4 }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Designations may be written in any form the decoder accepts (`03UZ413`,
//! `K14UM4Z`, `15760 Albion`). Positions between rows are interpolated
//! linearly; a single-row track is served as a fixed position.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use super::{EphemerisError, EphemerisPoint, EphemerisProvider, EphemerisResult};
use crate::models::{Designation, ModifiedJulianDate, SkyCoordinate};
use crate::parsing::designation::parse_designation;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EphemerisDocument {
    #[serde(default)]
    pub targets: Vec<TargetEphemeris>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetEphemeris {
    pub designation: String,
    pub points: Vec<EphemerisRow>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EphemerisRow {
    pub mjd: f64,
    #[serde(alias = "ra_deg")]
    pub ra: f64,
    #[serde(alias = "dec_deg")]
    pub dec: f64,
    #[serde(alias = "magnitude", alias = "V")]
    pub mag: f64,
}

/// In-memory ephemeris keyed by decoded designation.
#[derive(Debug, Clone, Default)]
pub struct TableEphemeris {
    tracks: HashMap<Designation, Vec<EphemerisPoint>>,
}

impl TableEphemeris {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> EphemerisResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| EphemerisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_json_str(&content)?;
        debug!(
            "Loaded ephemeris for {} target(s) from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    /// Parse a JSON document, reporting the JSON path of the first bad field.
    pub fn from_json_str(content: &str) -> EphemerisResult<Self> {
        let deserializer = &mut serde_json::Deserializer::from_str(content);
        let document: EphemerisDocument =
            serde_path_to_error::deserialize(deserializer).map_err(|err| EphemerisError::Parse {
                path: err.path().to_string(),
                message: err.inner().to_string(),
            })?;
        Self::from_document(document)
    }

    pub fn from_document(document: EphemerisDocument) -> EphemerisResult<Self> {
        let mut table = Self::new();
        for target in document.targets {
            let designation = parse_designation(&target.designation).map_err(|err| {
                EphemerisError::InvalidData {
                    designation: target.designation.clone(),
                    message: err.to_string(),
                }
            })?;

            let points = target
                .points
                .iter()
                .map(|row| row_to_point(&target.designation, row))
                .collect::<EphemerisResult<Vec<_>>>()?;
            table.insert(designation, points)?;
        }
        Ok(table)
    }

    /// Add (or extend) the track of `designation`.
    pub fn insert(
        &mut self,
        designation: Designation,
        points: Vec<EphemerisPoint>,
    ) -> EphemerisResult<()> {
        if points.is_empty() {
            return Err(EphemerisError::InvalidData {
                designation: designation.to_string(),
                message: "track has no points".to_string(),
            });
        }
        let track = self.tracks.entry(designation).or_default();
        track.extend(points);
        track.sort_by(|a, b| a.at.value().total_cmp(&b.at.value()));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn contains(&self, designation: &Designation) -> bool {
        self.tracks.contains_key(designation)
    }

    /// Position of `designation` at `at`, interpolated between rows.
    pub fn lookup(
        &self,
        designation: &Designation,
        at: ModifiedJulianDate,
    ) -> EphemerisResult<EphemerisPoint> {
        let track = self
            .tracks
            .get(designation)
            .ok_or_else(|| EphemerisError::UnknownTarget(designation.to_string()))?;

        let (first, last) = match (track.first(), track.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Err(EphemerisError::UnknownTarget(designation.to_string())),
        };

        if track.len() == 1 {
            return Ok(EphemerisPoint { at, ..first });
        }
        if at < first.at || at > last.at {
            return Err(EphemerisError::OutOfRange {
                designation: designation.to_string(),
                at,
                start: first.at,
                stop: last.at,
            });
        }

        let upper = track.partition_point(|point| point.at <= at);
        if upper >= track.len() {
            return Ok(last);
        }
        let (before, after) = (track[upper - 1], track[upper]);
        interpolate(designation, &before, &after, at)
    }
}

#[async_trait]
impl EphemerisProvider for TableEphemeris {
    async fn predict(
        &self,
        designation: &Designation,
        at: ModifiedJulianDate,
    ) -> EphemerisResult<EphemerisPoint> {
        self.lookup(designation, at)
    }
}

fn row_to_point(designation: &str, row: &EphemerisRow) -> EphemerisResult<EphemerisPoint> {
    let invalid = |message: String| EphemerisError::InvalidData {
        designation: designation.to_string(),
        message,
    };

    if !row.mjd.is_finite() {
        return Err(invalid(format!("non-finite epoch {}", row.mjd)));
    }
    if !row.mag.is_finite() {
        return Err(invalid(format!("non-finite magnitude at MJD {}", row.mjd)));
    }
    let coordinate = SkyCoordinate::from_degrees(row.ra, row.dec)
        .ok_or_else(|| invalid(format!("invalid position ({}, {})", row.ra, row.dec)))?;

    Ok(EphemerisPoint {
        at: ModifiedJulianDate::new(row.mjd),
        coordinate,
        magnitude: row.mag,
    })
}

fn interpolate(
    designation: &Designation,
    before: &EphemerisPoint,
    after: &EphemerisPoint,
    at: ModifiedJulianDate,
) -> EphemerisResult<EphemerisPoint> {
    let span = (after.at - before.at).value();
    let fraction = if span > 0.0 {
        (at - before.at).value() / span
    } else {
        0.0
    };

    // Shortest way round the RA circle.
    let ra_a = before.coordinate.ra.value();
    let delta_ra = (after.coordinate.ra.value() - ra_a + 180.0).rem_euclid(360.0) - 180.0;
    let ra = ra_a + fraction * delta_ra;

    let dec_a = before.coordinate.dec.value();
    let dec = dec_a + fraction * (after.coordinate.dec.value() - dec_a);
    let magnitude = before.magnitude + fraction * (after.magnitude - before.magnitude);

    let coordinate =
        SkyCoordinate::from_degrees(ra, dec).ok_or_else(|| EphemerisError::InvalidData {
            designation: designation.to_string(),
            message: format!("interpolated position ({}, {}) is invalid", ra, dec),
        })?;

    Ok(EphemerisPoint {
        at,
        coordinate,
        magnitude,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "targets": [
            {
                "designation": "03UZ413",
                "points": [
                    { "mjd": 58133.0, "ra": 359.0, "dec": 10.0, "mag": 22.0 },
                    { "mjd": 58134.0, "ra": 1.0, "dec": 12.0, "mag": 23.0 }
                ]
            },
            {
                "designation": "15760 Albion",
                "points": [ { "mjd": 58133.0, "ra_deg": 30.0, "dec_deg": -5.0, "magnitude": 24.0 } ]
            }
        ]
    }"#;

    fn table() -> TableEphemeris {
        TableEphemeris::from_json_str(DOCUMENT).unwrap()
    }

    #[test]
    fn test_designations_are_decoded_on_load() {
        let table = table();
        assert_eq!(table.len(), 2);
        assert!(table.contains(&Designation::Provisional("2003 UZ413".to_string())));
        assert!(table.contains(&Designation::Numbered(15760)));
    }

    #[test]
    fn test_interpolation_wraps_right_ascension() {
        let point = table()
            .lookup(
                &Designation::Provisional("2003 UZ413".to_string()),
                ModifiedJulianDate::new(58133.5),
            )
            .unwrap();
        assert!(point.coordinate.ra.value().abs() < 1e-9 || (point.coordinate.ra.value() - 360.0).abs() < 1e-9);
        assert!((point.coordinate.dec.value() - 11.0).abs() < 1e-9);
        assert!((point.magnitude - 22.5).abs() < 1e-9);
    }

    #[test]
    fn test_single_point_track_is_fixed() {
        let at = ModifiedJulianDate::new(60000.0);
        let point = table().lookup(&Designation::Numbered(15760), at).unwrap();
        assert_eq!(point.at, at);
        assert_eq!(point.coordinate.ra.value(), 30.0);
        assert_eq!(point.magnitude, 24.0);
    }

    #[test]
    fn test_endpoints_and_out_of_range() {
        let table = table();
        let designation = Designation::Provisional("2003 UZ413".to_string());

        let last = table.lookup(&designation, ModifiedJulianDate::new(58134.0)).unwrap();
        assert_eq!(last.coordinate.dec.value(), 12.0);

        let err = table.lookup(&designation, ModifiedJulianDate::new(58135.0)).unwrap_err();
        assert!(matches!(err, EphemerisError::OutOfRange { .. }));
    }

    #[test]
    fn test_unknown_target() {
        let err = table()
            .lookup(&Designation::Numbered(1), ModifiedJulianDate::new(58133.0))
            .unwrap_err();
        assert!(matches!(err, EphemerisError::UnknownTarget(ref name) if name == "1"));
    }

    #[test]
    fn test_parse_error_reports_json_path() {
        let bad = r#"{ "targets": [ { "designation": "1", "points": [ { "mjd": "soon", "ra": 1, "dec": 1, "mag": 1 } ] } ] }"#;
        match TableEphemeris::from_json_str(bad) {
            Err(EphemerisError::Parse { path, .. }) => assert_eq!(path, "targets[0].points[0].mjd"),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_rows_are_rejected() {
        let bad = r#"{ "targets": [ { "designation": "1", "points": [ { "mjd": 1, "ra": 1, "dec": 95, "mag": 1 } ] } ] }"#;
        assert!(matches!(
            TableEphemeris::from_json_str(bad),
            Err(EphemerisError::InvalidData { .. })
        ));

        let empty = r#"{ "targets": [ { "designation": "1", "points": [] } ] }"#;
        assert!(matches!(
            TableEphemeris::from_json_str(empty),
            Err(EphemerisError::InvalidData { .. })
        ));
    }

    #[tokio::test]
    async fn test_provider_trait_delegates_to_lookup() {
        let provider: Box<dyn EphemerisProvider> = Box::new(table());
        let point = provider
            .predict(&Designation::Numbered(15760), ModifiedJulianDate::new(58133.0))
            .await
            .unwrap();
        assert_eq!(point.coordinate.dec.value(), -5.0);
    }
}
