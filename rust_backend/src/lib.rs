//! Recon scheduler
//!
//! Plans follow-up imaging of trans-Neptunian objects ahead of stellar
//! occultation campaigns: candidate tables are filtered, each target's
//! visibility window for the coming night is computed, and the visible
//! targets are packed into observing groups for the telescope queue.

pub mod astro;
pub mod config;
pub mod db;
pub mod ephemeris;
pub mod models;
pub mod parsing;
pub mod services;
