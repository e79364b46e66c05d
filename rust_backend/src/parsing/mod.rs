//! Parsers for candidate tables and minor-planet designations.
//!
//! - [`recon_table`]: RECON candidate lists (CSV), column aliasing and selection
//! - [`designation`]: designation layouts used by candidate lists and catalogues

pub mod designation;
pub mod recon_table;


pub use designation::{parse_designation, DesignationError};
pub use recon_table::{
    parse_candidate_csv, read_candidate_table, split_duplicates, CandidateTable, IngestError,
    SelectionCriteria,
};
