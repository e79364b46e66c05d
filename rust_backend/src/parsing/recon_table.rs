//! RECON candidate table ingestion.
//!
//! The candidate lists come in a few flavours whose headers differ. Known
//! alternate names are mapped onto the canonical ones once, at load time;
//! every row is then validated into a [`CandidateTarget`]. Rows whose
//! designation cannot be decoded are kept aside instead of failing the table.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use chrono::NaiveDateTime;
use log::{debug, info};
use polars::prelude::*;
use qtty::Arcseconds;

use super::designation::{parse_designation, DesignationError};
use crate::models::{CandidateTarget, Designation, ModifiedJulianDate, OrbitClass, Period};

pub const DESIGNATION_COLUMN: &str = "Desig";
pub const CLASS_COLUMN: &str = "DES Classification";
pub const UNCERTAINTY_COLUMN: &str = "TNO pos err";
pub const EVENT_TIME_COLUMN: &str = "ET";

/// Alternate header -> canonical header.
pub const COLUMN_ALIASES: &[(&str, &str)] = &[
    ("Object ID", DESIGNATION_COLUMN),
    ("Type", CLASS_COLUMN),
    ("PosErr", UNCERTAINTY_COLUMN),
];

/// Layout of the event-time column, e.g. `2018 Jan 20 06:12:45`.
pub const EVENT_TIME_FORMAT: &str = "%Y %b %d %H:%M:%S";

/// Default minimum position uncertainty worth tracking, arcseconds.
pub const DEFAULT_MIN_UNCERTAINTY_ARCSEC: f64 = 0.1;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Failed to read candidate table: {0}")]
    Read(#[from] PolarsError),

    #[error("Candidate table has no '{column}' column (also accepted: {aliases})")]
    MissingColumn {
        column: &'static str,
        aliases: String,
    },

    #[error("Row {row}: missing value in column '{column}'")]
    MissingValue { row: usize, column: &'static str },

    #[error("Row {row}: invalid value '{value}' in column '{column}'")]
    InvalidValue {
        row: usize,
        column: &'static str,
        value: String,
    },
}

/// Row whose designation could not be decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct UndecodedRow {
    pub row: usize,
    pub raw_designation: String,
    pub error: DesignationError,
}

/// Validated contents of one candidate table.
#[derive(Debug, Clone, Default)]
pub struct CandidateTable {
    pub candidates: Vec<CandidateTarget>,
    pub undecoded: Vec<UndecodedRow>,
    /// Whether the table carried an event-time column.
    pub has_event_times: bool,
}

impl CandidateTable {
    /// Candidates passing `criteria`, in table order.
    pub fn select(&self, criteria: &SelectionCriteria) -> Vec<CandidateTarget> {
        let selected: Vec<CandidateTarget> = self
            .candidates
            .iter()
            .filter(|candidate| criteria.accepts(candidate))
            .cloned()
            .collect();
        info!(
            "Candidate table contains {} matching entries (of {})",
            selected.len(),
            self.candidates.len()
        );
        selected
    }
}

/// Collapse rows that name the same object into one candidate.
///
/// The row with the earliest event time is kept (rows without one rank
/// last, ties keep table order). Kept candidates stay where their
/// designation first appears. Returns `(kept, dropped)`.
pub fn split_duplicates(
    candidates: Vec<CandidateTarget>,
) -> (Vec<CandidateTarget>, Vec<CandidateTarget>) {
    let mut slots: HashMap<Designation, usize> = HashMap::new();
    let mut kept: Vec<CandidateTarget> = Vec::new();
    let mut dropped = Vec::new();

    for candidate in candidates {
        match slots.get(&candidate.designation) {
            None => {
                slots.insert(candidate.designation.clone(), kept.len());
                kept.push(candidate);
            }
            Some(&slot) => {
                if event_rank(&candidate) < event_rank(&kept[slot]) {
                    dropped.push(std::mem::replace(&mut kept[slot], candidate));
                } else {
                    dropped.push(candidate);
                }
            }
        }
    }

    if !dropped.is_empty() {
        debug!("Dropped {} repeated row(s) for {} object(s)", dropped.len(), kept.len());
    }
    (kept, dropped)
}

fn event_rank(candidate: &CandidateTarget) -> f64 {
    candidate.event_time.map_or(f64::INFINITY, |at| at.value())
}

/// Which candidates are worth tracking.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionCriteria {
    pub classes: Vec<OrbitClass>,
    /// Rows must have a strictly larger position uncertainty.
    pub min_uncertainty: Arcseconds,
    /// Event times, when present, must fall strictly inside this period.
    pub event_window: Option<Period>,
}

impl Default for SelectionCriteria {
    fn default() -> Self {
        Self {
            classes: OrbitClass::DEFAULT_SELECTION.to_vec(),
            min_uncertainty: Arcseconds::new(DEFAULT_MIN_UNCERTAINTY_ARCSEC),
            event_window: None,
        }
    }
}

impl SelectionCriteria {
    pub fn accepts(&self, candidate: &CandidateTarget) -> bool {
        if !self.classes.contains(&candidate.orbit_class) {
            return false;
        }
        if candidate.position_uncertainty <= self.min_uncertainty {
            return false;
        }
        match (self.event_window, candidate.event_time) {
            (Some(window), Some(event)) => window.start < event && event < window.stop,
            _ => true,
        }
    }
}

/// Read a candidate CSV file.
pub fn read_candidate_table<P: AsRef<Path>>(path: P) -> Result<CandidateTable, IngestError> {
    let path = path.as_ref();
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.into()))?
        .finish()?;
    debug!("Read {} row(s) from {}", df.height(), path.display());
    candidates_from_dataframe(df)
}

/// Parse candidate CSV text.
pub fn parse_candidate_csv(content: &str) -> Result<CandidateTable, IngestError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(content.as_bytes().to_vec()))
        .finish()?;
    candidates_from_dataframe(df)
}

/// Rename alternate headers to their canonical names.
pub fn normalize_columns(df: &mut DataFrame) -> Result<(), IngestError> {
    for (alias, canonical) in COLUMN_ALIASES {
        if has_column(df, alias) && !has_column(df, canonical) {
            df.rename(alias, (*canonical).into())?;
        }
    }
    for column in [DESIGNATION_COLUMN, CLASS_COLUMN, UNCERTAINTY_COLUMN] {
        if !has_column(df, column) {
            return Err(IngestError::MissingColumn {
                column,
                aliases: aliases_of(column),
            });
        }
    }
    Ok(())
}

/// Validate every row of a candidate frame.
///
/// All columns are read as text; numeric and time fields are parsed here so
/// that a malformed cell is reported with its row.
pub fn candidates_from_dataframe(mut df: DataFrame) -> Result<CandidateTable, IngestError> {
    normalize_columns(&mut df)?;

    let designations = df.column(DESIGNATION_COLUMN)?.cast(&DataType::String)?;
    let designations = designations.str()?;
    let classes = df.column(CLASS_COLUMN)?.cast(&DataType::String)?;
    let classes = classes.str()?;
    let uncertainties = df.column(UNCERTAINTY_COLUMN)?.cast(&DataType::String)?;
    let uncertainties = uncertainties.str()?;
    let event_times = if has_column(&df, EVENT_TIME_COLUMN) {
        Some(df.column(EVENT_TIME_COLUMN)?.cast(&DataType::String)?)
    } else {
        None
    };
    let event_times = event_times.as_ref().map(|column| column.str()).transpose()?;

    let mut table = CandidateTable {
        has_event_times: event_times.is_some(),
        ..CandidateTable::default()
    };

    for row in 0..df.height() {
        let raw_designation = cell(designations.get(row))
            .ok_or(IngestError::MissingValue {
                row,
                column: DESIGNATION_COLUMN,
            })?
            .to_string();

        let orbit_class = cell(classes.get(row))
            .map(OrbitClass::from_label_or_default)
            .unwrap_or(OrbitClass::Resonant);

        let uncertainty_text = cell(uncertainties.get(row)).ok_or(IngestError::MissingValue {
            row,
            column: UNCERTAINTY_COLUMN,
        })?;
        let position_uncertainty = parse_number(uncertainty_text)
            .map(Arcseconds::new)
            .ok_or_else(|| IngestError::InvalidValue {
                row,
                column: UNCERTAINTY_COLUMN,
                value: uncertainty_text.to_string(),
            })?;

        let event_time = match event_times.and_then(|column| cell(column.get(row))) {
            Some(text) => Some(parse_event_time(text).ok_or_else(|| IngestError::InvalidValue {
                row,
                column: EVENT_TIME_COLUMN,
                value: text.to_string(),
            })?),
            None => None,
        };

        match parse_designation(&raw_designation) {
            Ok(designation) => table.candidates.push(CandidateTarget {
                raw_designation,
                designation,
                orbit_class,
                position_uncertainty,
                event_time,
            }),
            Err(error) => {
                debug!("Row {}: cannot decode '{}': {}", row, raw_designation, error);
                table.undecoded.push(UndecodedRow {
                    row,
                    raw_designation,
                    error,
                });
            }
        }
    }

    Ok(table)
}

/// Parse an event time in the table layout, falling back to ISO forms.
pub fn parse_event_time(text: &str) -> Option<ModifiedJulianDate> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, EVENT_TIME_FORMAT)
        .ok()
        .map(|naive| ModifiedJulianDate::from_datetime(naive.and_utc()))
        .or_else(|| ModifiedJulianDate::parse_utc(text))
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|column| column.as_str() == name)
}

fn aliases_of(canonical: &str) -> String {
    COLUMN_ALIASES
        .iter()
        .filter(|(_, target)| *target == canonical)
        .map(|(alias, _)| *alias)
        .collect::<Vec<_>>()
        .join(", ")
}

fn cell(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}

fn parse_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|value| value.is_finite())
}
