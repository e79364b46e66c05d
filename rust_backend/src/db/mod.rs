//! Program storage.
//!
//! The scheduler hands its targets, observing blocks and observing groups to
//! a [`ProgramRepository`]; the backend is chosen at runtime.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Planner (services::planner)                            │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository Trait (repository) - Abstract Interface     │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!     ┌───────────────┼─────────────────┐
//!     │               │                 │
//! ┌───▼──────┐  ┌─────▼────────┐  ┌────▼─────┐
//! │ Local    │  │ JSON program │  │ Print    │
//! │ (memory) │  │ document     │  │ (stdout) │
//! └──────────┘  └──────────────┘  └──────────┘
//! ```

pub mod factory;
pub mod repo_config;
pub mod repositories;
pub mod repository;

pub use factory::{RepositoryFactory, RepositoryType};
pub use repo_config::{RepositoryConfig, RepositorySettings};
pub use repositories::{JsonProgramRepository, LocalRepository, PrintRepository};
pub use repository::{
    ErrorContext, ProgramRepository, RepositoryError, RepositoryResult,
};
