//! Program repository trait.
//!
//! The scheduler's output sink. Targets, observing blocks and observing
//! groups are addressed by caller-generated tokens; persisting a record whose
//! token already exists replaces it (create-or-update).
//!
//! ```ignore
//! async fn store<R: ProgramRepository + ?Sized>(repo: &R, group: &ObservingGroup) -> RepositoryResult<()> {
//!     for block in &group.blocks {
//!         repo.persist_block(block).await?;
//!     }
//!     repo.persist_group(group).await
//! }
//! ```

pub mod error;

use async_trait::async_trait;

use crate::models::{ObservingBlock, ObservingGroup, TargetRecord};

pub use error::{ErrorContext, RepositoryError, RepositoryResult};

/// Storage for a telescope observing program.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` so a repository can be shared
/// across tasks behind an `Arc`.
#[async_trait]
pub trait ProgramRepository: Send + Sync {
    /// Check if the backing store is usable.
    async fn health_check(&self) -> RepositoryResult<bool>;

    /// Create or update a target, keyed by `target.token`.
    async fn persist_target(&self, target: &TargetRecord) -> RepositoryResult<()>;

    /// Create or update an observing block, keyed by `block.token`.
    async fn persist_block(&self, block: &ObservingBlock) -> RepositoryResult<()>;

    /// Create or update an observing group, keyed by `group.token`.
    ///
    /// The group's blocks are referenced by token; persist them first.
    async fn persist_group(&self, group: &ObservingGroup) -> RepositoryResult<()>;

    async fn get_target(&self, token: &str) -> RepositoryResult<TargetRecord>;

    async fn get_block(&self, token: &str) -> RepositoryResult<ObservingBlock>;

    /// Retrieve a group with its blocks resolved.
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If the group or one of its blocks is missing
    async fn get_observing_group(&self, token: &str) -> RepositoryResult<ObservingGroup>;

    /// Tokens of all stored groups, in first-persisted order.
    async fn list_observing_groups(&self) -> RepositoryResult<Vec<String>>;

    /// Make persisted records durable. A no-op for in-memory stores.
    async fn flush(&self) -> RepositoryResult<()> {
        Ok(())
    }
}
