//! Repository factory for dependency injection.
//!
//! Creates repository instances based on runtime configuration.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::repo_config::RepositorySettings;
use super::repositories::{default_document_path, JsonProgramRepository, LocalRepository, PrintRepository};
use super::repository::{ProgramRepository, RepositoryResult};
use crate::models::ProgramTokens;

/// Repository type configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryType {
    /// In-memory store, nothing leaves the process
    Local,
    /// Program document on disk
    Json,
    /// One line per record on stdout
    Print,
}

impl FromStr for RepositoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "memory" => Ok(Self::Local),
            "json" | "ph2" => Ok(Self::Json),
            "print" | "stdout" => Ok(Self::Print),
            _ => Err(format!("Unknown repository type: {}", s)),
        }
    }
}

impl fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Json => "json",
            Self::Print => "print",
        })
    }
}

impl RepositoryType {
    /// Get repository type from the `REPOSITORY_TYPE` environment variable.
    pub fn from_env() -> Option<Self> {
        std::env::var("REPOSITORY_TYPE")
            .ok()
            .and_then(|s| Self::from_str(&s).ok())
    }
}

/// Repository factory for creating repository instances.
///
/// # Example
/// ```no_run
/// use recon_scheduler::db::{RepositoryFactory, RepositorySettings, RepositoryType};
/// use recon_scheduler::models::ProgramTokens;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let tokens = ProgramTokens::new("18AC99", "Q1");
///     let settings = RepositorySettings::default();
///     let repo = RepositoryFactory::create(RepositoryType::Json, &settings, &tokens).await?;
///     repo.flush().await?;
///     Ok(())
/// }
/// ```
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create a repository instance based on type.
    ///
    /// The JSON repository opens (and later rewrites) `settings.output`, or
    /// the default document name for the run.
    pub async fn create(
        repo_type: RepositoryType,
        settings: &RepositorySettings,
        tokens: &ProgramTokens,
    ) -> RepositoryResult<Arc<dyn ProgramRepository>> {
        match repo_type {
            RepositoryType::Local => Ok(Self::create_local()),
            RepositoryType::Json => {
                let path = settings
                    .output
                    .clone()
                    .unwrap_or_else(|| default_document_path(&tokens.runid, &tokens.qrunid));
                let repo =
                    JsonProgramRepository::open(path, tokens.runid.clone(), settings.pi_login.clone())
                        .await?;
                Ok(Arc::new(repo))
            }
            RepositoryType::Print => Ok(Arc::new(PrintRepository::stdout())),
        }
    }

    /// Create an in-memory repository.
    pub fn create_local() -> Arc<dyn ProgramRepository> {
        Arc::new(LocalRepository::new())
    }
}
