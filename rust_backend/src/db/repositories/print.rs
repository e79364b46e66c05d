//! Repository that echoes every persisted record to a writer.
//!
//! Used for dry runs: records are kept in memory so reads still work, and a
//! one-line summary of each write goes to the writer (stdout in the CLI).

use async_trait::async_trait;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

use super::LocalRepository;
use crate::db::repository::*;
use crate::models::{ObservingBlock, ObservingGroup, TargetRecord};

pub struct PrintRepository {
    writer: Mutex<Box<dyn Write + Send>>,
    store: LocalRepository,
}

impl PrintRepository {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
            store: LocalRepository::new(),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    fn emit(&self, operation: &str, token: &str, line: String) -> RepositoryResult<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{}", line).map_err(|e| {
            RepositoryError::storage_with_context(
                e.to_string(),
                ErrorContext::new(operation).with_entity_id(token),
            )
        })
    }
}

#[async_trait]
impl ProgramRepository for PrintRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.store.health_check().await
    }

    async fn persist_target(&self, target: &TargetRecord) -> RepositoryResult<()> {
        self.store.persist_target(target).await?;
        self.emit(
            "persist_target",
            &target.token,
            format!(
                "target {} {} {} mag {:.1}",
                target.token, target.name, target.coordinate, target.magnitude
            ),
        )
    }

    async fn persist_block(&self, block: &ObservingBlock) -> RepositoryResult<()> {
        self.store.persist_block(block).await?;
        self.emit(
            "persist_block",
            &block.token,
            format!(
                "block {} target {} {} {}s {}",
                block.token,
                block.target_token,
                block.configuration_id,
                block.exposure.value(),
                block.constraint_id
            ),
        )
    }

    async fn persist_group(&self, group: &ObservingGroup) -> RepositoryResult<()> {
        self.store.persist_group(group).await?;
        self.emit(
            "persist_group",
            &group.token,
            format!(
                "group {} [{}] {}s",
                group.token,
                group.block_tokens().join(", "),
                group.duration.value()
            ),
        )
    }

    async fn get_target(&self, token: &str) -> RepositoryResult<TargetRecord> {
        self.store.get_target(token).await
    }

    async fn get_block(&self, token: &str) -> RepositoryResult<ObservingBlock> {
        self.store.get_block(token).await
    }

    async fn get_observing_group(&self, token: &str) -> RepositoryResult<ObservingGroup> {
        self.store.get_observing_group(token).await
    }

    async fn list_observing_groups(&self) -> RepositoryResult<Vec<String>> {
        self.store.list_observing_groups().await
    }

    async fn flush(&self) -> RepositoryResult<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.flush().map_err(|e| {
            RepositoryError::storage_with_context(e.to_string(), ErrorContext::new("flush"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Designation, ModifiedJulianDate, SkyCoordinate, DEFAULT_CONSTRAINT_ID};
    use qtty::Seconds;
    use std::sync::Arc;

    /// Writer sharing its buffer with the test.
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_one_line_per_record() {
        let buffer = SharedBuffer::default();
        let repo = PrintRepository::new(Box::new(buffer.clone()));

        let target = TargetRecord {
            token: "18AC99-15760".to_string(),
            name: "15760".to_string(),
            coordinate: SkyCoordinate::from_degrees(30.0, 10.0).unwrap(),
            magnitude: 22.0,
            epoch: ModifiedJulianDate::new(58133.0),
        };
        let block = ObservingBlock {
            token: "OB-Q1-18AC99-15760".to_string(),
            target_token: target.token.clone(),
            designation: Designation::Numbered(15760),
            configuration_id: "I13".to_string(),
            exposure: Seconds::new(500.0),
            constraint_id: DEFAULT_CONSTRAINT_ID.to_string(),
        };
        let group = ObservingGroup {
            token: "OG-18AC99-Q1-1-0".to_string(),
            index: 1,
            repeat: 0,
            anchor: target.coordinate,
            blocks: vec![block.clone()],
            duration: Seconds::new(500.0),
        };

        repo.persist_target(&target).await.unwrap();
        repo.persist_block(&block).await.unwrap();
        repo.persist_group(&group).await.unwrap();
        repo.flush().await.unwrap();

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("target 18AC99-15760"));
        assert_eq!(
            lines[1],
            "block OB-Q1-18AC99-15760 target 18AC99-15760 I13 500s C1"
        );
        assert_eq!(lines[2], "group OG-18AC99-Q1-1-0 [OB-Q1-18AC99-15760] 500s");
        assert_eq!(
            repo.get_observing_group("OG-18AC99-Q1-1-0").await.unwrap(),
            group
        );
    }
}
