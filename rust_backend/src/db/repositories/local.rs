//! In-memory local repository implementation.
//!
//! Stores every record in memory, keyed by token, and remembers the order in
//! which tokens were first persisted. Used directly in tests and dry runs,
//! and as the record store behind the JSON and print repositories.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::db::repository::*;
use crate::models::{ObservingBlock, ObservingGroup, TargetRecord};

/// In-memory local repository.
///
/// # Example
/// ```
/// use recon_scheduler::db::repositories::LocalRepository;
///
/// let repo = LocalRepository::new();
/// assert_eq!(repo.group_count(), 0);
/// ```
#[derive(Clone, Default)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

/// Records of one kind in first-persisted order.
struct Keyed<T> {
    order: Vec<String>,
    items: HashMap<String, T>,
}

impl<T: Clone> Keyed<T> {
    fn upsert(&mut self, token: &str, item: T) {
        if self.items.insert(token.to_string(), item).is_none() {
            self.order.push(token.to_string());
        }
    }

    fn get(&self, token: &str) -> Option<T> {
        self.items.get(token).cloned()
    }

    fn ordered(&self) -> Vec<T> {
        self.order
            .iter()
            .filter_map(|token| self.items.get(token).cloned())
            .collect()
    }
}

impl<T> Default for Keyed<T> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            items: HashMap::new(),
        }
    }
}

struct LocalData {
    targets: Keyed<TargetRecord>,
    blocks: Keyed<ObservingBlock>,
    groups: Keyed<ObservingGroup>,

    /// Tokens whose writes are refused, to exercise failure reporting.
    failing_tokens: HashSet<String>,

    // Connection health
    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            targets: Keyed::default(),
            blocks: Keyed::default(),
            groups: Keyed::default(),
            failing_tokens: HashSet::new(),
            is_healthy: true,
        }
    }
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) {
        self.write().is_healthy = healthy;
    }

    /// Refuse every later write of the record with this token.
    pub fn fail_on(&self, token: impl Into<String>) {
        self.write().failing_tokens.insert(token.into());
    }

    /// Clear all records, keeping health and failure settings.
    pub fn clear(&self) {
        let mut data = self.write();
        data.targets = Keyed::default();
        data.blocks = Keyed::default();
        data.groups = Keyed::default();
    }

    pub fn target_count(&self) -> usize {
        self.read().targets.items.len()
    }

    pub fn block_count(&self) -> usize {
        self.read().blocks.items.len()
    }

    pub fn group_count(&self) -> usize {
        self.read().groups.items.len()
    }

    /// Stored targets in first-persisted order.
    pub fn targets(&self) -> Vec<TargetRecord> {
        self.read().targets.ordered()
    }

    /// Stored blocks in first-persisted order.
    pub fn blocks(&self) -> Vec<ObservingBlock> {
        self.read().blocks.ordered()
    }

    /// Stored groups in first-persisted order.
    pub fn groups(&self) -> Vec<ObservingGroup> {
        self.read().groups.ordered()
    }

    fn read(&self) -> RwLockReadGuard<'_, LocalData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LocalData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Helper to check health and refused tokens before a write.
    fn check_writable(&self, operation: &str, entity: &str, token: &str) -> RepositoryResult<()> {
        let data = self.read();
        let context = || {
            ErrorContext::new(operation)
                .with_entity(entity)
                .with_entity_id(token)
        };
        if !data.is_healthy {
            return Err(RepositoryError::connection_with_context(
                "Repository is not healthy",
                context(),
            ));
        }
        if data.failing_tokens.contains(token) {
            return Err(RepositoryError::InternalError {
                message: "Write refused".to_string(),
                context: context(),
            });
        }
        if token.trim().is_empty() {
            return Err(RepositoryError::validation_with_context(
                "Empty token",
                context(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ProgramRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.read().is_healthy)
    }

    async fn persist_target(&self, target: &TargetRecord) -> RepositoryResult<()> {
        self.check_writable("persist_target", "target", &target.token)?;
        self.write().targets.upsert(&target.token, target.clone());
        Ok(())
    }

    async fn persist_block(&self, block: &ObservingBlock) -> RepositoryResult<()> {
        self.check_writable("persist_block", "observing_block", &block.token)?;
        let mut data = self.write();
        if !data.targets.items.contains_key(&block.target_token) {
            return Err(RepositoryError::validation_with_context(
                format!("Unknown target {}", block.target_token),
                ErrorContext::new("persist_block")
                    .with_entity("observing_block")
                    .with_entity_id(&block.token),
            ));
        }
        data.blocks.upsert(&block.token, block.clone());
        Ok(())
    }

    async fn persist_group(&self, group: &ObservingGroup) -> RepositoryResult<()> {
        self.check_writable("persist_group", "observing_group", &group.token)?;
        let mut data = self.write();
        let missing: Vec<&str> = group
            .block_tokens()
            .into_iter()
            .filter(|token| !data.blocks.items.contains_key(*token))
            .collect();
        if !missing.is_empty() {
            return Err(RepositoryError::validation_with_context(
                format!("Unknown observing block(s) {}", missing.join(", ")),
                ErrorContext::new("persist_group")
                    .with_entity("observing_group")
                    .with_entity_id(&group.token),
            ));
        }
        data.groups.upsert(&group.token, group.clone());
        Ok(())
    }

    async fn get_target(&self, token: &str) -> RepositoryResult<TargetRecord> {
        self.read().targets.get(token).ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Target {} not found", token),
                ErrorContext::new("get_target").with_entity_id(token),
            )
        })
    }

    async fn get_block(&self, token: &str) -> RepositoryResult<ObservingBlock> {
        self.read().blocks.get(token).ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Observing block {} not found", token),
                ErrorContext::new("get_block").with_entity_id(token),
            )
        })
    }

    async fn get_observing_group(&self, token: &str) -> RepositoryResult<ObservingGroup> {
        let data = self.read();
        let mut group = data.groups.get(token).ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Observing group {} not found", token),
                ErrorContext::new("get_observing_group").with_entity_id(token),
            )
        })?;
        // Resolve against the current block records.
        for block in &mut group.blocks {
            *block = data.blocks.get(&block.token).ok_or_else(|| {
                RepositoryError::not_found_with_context(
                    format!("Observing block {} not found", block.token),
                    ErrorContext::new("get_observing_group")
                        .with_entity("observing_group")
                        .with_entity_id(token),
                )
            })?;
        }
        Ok(group)
    }

    async fn list_observing_groups(&self) -> RepositoryResult<Vec<String>> {
        Ok(self.read().groups.order.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Designation, ModifiedJulianDate, SkyCoordinate, DEFAULT_CONSTRAINT_ID};
    use qtty::Seconds;

    fn target(token: &str) -> TargetRecord {
        TargetRecord {
            token: token.to_string(),
            name: "2003 UZ413".to_string(),
            coordinate: SkyCoordinate::from_degrees(60.0, 15.0).unwrap(),
            magnitude: 21.0,
            epoch: ModifiedJulianDate::new(58133.0),
        }
    }

    fn block(token: &str, target_token: &str) -> ObservingBlock {
        ObservingBlock {
            token: token.to_string(),
            target_token: target_token.to_string(),
            designation: Designation::Provisional("2003 UZ413".to_string()),
            configuration_id: "I7".to_string(),
            exposure: Seconds::new(300.0),
            constraint_id: DEFAULT_CONSTRAINT_ID.to_string(),
        }
    }

    fn group(token: &str, blocks: Vec<ObservingBlock>) -> ObservingGroup {
        ObservingGroup {
            token: token.to_string(),
            index: 1,
            repeat: 0,
            anchor: SkyCoordinate::from_degrees(60.0, 15.0).unwrap(),
            duration: Seconds::new(300.0),
            blocks,
        }
    }

    #[tokio::test]
    async fn test_persist_and_read_back() {
        let repo = LocalRepository::new();
        repo.persist_target(&target("T1")).await.unwrap();
        repo.persist_block(&block("OB-1", "T1")).await.unwrap();
        repo.persist_group(&group("OG-1", vec![block("OB-1", "T1")]))
            .await
            .unwrap();

        let stored = repo.get_observing_group("OG-1").await.unwrap();
        assert_eq!(stored.block_tokens(), vec!["OB-1"]);
        assert_eq!(repo.get_target("T1").await.unwrap().magnitude, 21.0);
        assert_eq!(repo.list_observing_groups().await.unwrap(), vec!["OG-1"]);
    }

    #[tokio::test]
    async fn test_persist_is_create_or_update() {
        let repo = LocalRepository::new();
        repo.persist_target(&target("T1")).await.unwrap();
        let mut updated = target("T1");
        updated.magnitude = 22.5;
        repo.persist_target(&updated).await.unwrap();

        assert_eq!(repo.target_count(), 1);
        assert_eq!(repo.get_target("T1").await.unwrap().magnitude, 22.5);
    }

    #[tokio::test]
    async fn test_group_with_unknown_block_is_rejected() {
        let repo = LocalRepository::new();
        let err = repo
            .persist_group(&group("OG-1", vec![block("OB-404", "T1")]))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::ValidationError { .. }));
        assert_eq!(err.context().entity_id.as_deref(), Some("OG-1"));
        assert_eq!(repo.group_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_records_are_not_found() {
        let repo = LocalRepository::new();
        assert!(matches!(
            repo.get_block("OB-404").await,
            Err(RepositoryError::NotFound { .. })
        ));
        assert!(matches!(
            repo.get_observing_group("OG-404").await,
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_unhealthy_repository_refuses_writes() {
        let repo = LocalRepository::new();
        repo.set_healthy(false);
        assert!(!repo.health_check().await.unwrap());

        let err = repo.persist_target(&target("T1")).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_refused_token_only_affects_that_record() {
        let repo = LocalRepository::new();
        repo.fail_on("T2");
        repo.persist_target(&target("T1")).await.unwrap();
        assert!(repo.persist_target(&target("T2")).await.is_err());
        assert_eq!(repo.targets().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_keeps_settings() {
        let repo = LocalRepository::new();
        repo.fail_on("T2");
        repo.persist_target(&target("T1")).await.unwrap();
        repo.clear();
        assert_eq!(repo.target_count(), 0);
        assert!(repo.persist_target(&target("T2")).await.is_err());
    }
}
