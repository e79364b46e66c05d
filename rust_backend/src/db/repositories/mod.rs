//! Repository implementations module.
//!
//! This module contains different implementations of the `ProgramRepository` trait:
//! - `local`: In-memory implementation for unit testing and dry runs
//! - `json_file`: Program document written to disk on flush
//! - `print`: One line per persisted record

pub mod json_file;
pub mod local;
pub mod print;

pub use json_file::{default_document_path, JsonProgramRepository, ProgramDocument};
pub use local::LocalRepository;
pub use print::PrintRepository;
