//! Program document repository.
//!
//! Keeps records in a [`LocalRepository`] and writes the whole program to a
//! JSON document on [`ProgramRepository::flush`]. The document layout is the
//! one the telescope's phase-2 tool accepts:
//!
//! ```json
//! {
//!   "runid": "18AC99",
//!   "pi_login": "recon",
//!   "program_configuration": {
//!     "targets": [{"identifier": {"client_token": "18AC99-2003_UZ413"}, ...}],
//!     "observing_blocks": [...],
//!     "observing_groups": [...]
//!   }
//! }
//! ```
//!
//! Opening an existing document loads its records, so a later run updates
//! the same program instead of replacing it.

use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::LocalRepository;
use crate::db::repository::*;
use crate::models::{
    Designation, ModifiedJulianDate, ObservingBlock, ObservingGroup, SkyCoordinate, TargetRecord,
    DEFAULT_CONSTRAINT_ID,
};
use qtty::Seconds;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientToken {
    pub client_token: String,
}

impl ClientToken {
    fn new(token: &str) -> Self {
        Self {
            client_token: token.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerToken {
    pub server_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocumentCoordinate {
    pub ra: f64,
    pub dec: f64,
}

impl From<SkyCoordinate> for DocumentCoordinate {
    fn from(coordinate: SkyCoordinate) -> Self {
        Self {
            ra: coordinate.ra.value(),
            dec: coordinate.dec.value(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EphemerisPointEntry {
    pub epoch_mjd: f64,
    pub coordinate: DocumentCoordinate,
    pub mag: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingTarget {
    pub ephemeris_points: Vec<EphemerisPointEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetEntry {
    pub identifier: ClientToken,
    pub name: String,
    pub moving_target: MovingTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservingBlockEntry {
    pub identifier: ClientToken,
    pub target_identifier: ClientToken,
    pub constraint_identifiers: Vec<ServerToken>,
    pub instrument_config_identifiers: Vec<ServerToken>,
    pub designation: Designation,
    pub exposure_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservingGroupEntry {
    pub identifier: ClientToken,
    pub observing_block_identifiers: Vec<ClientToken>,
    pub index: u32,
    pub repeat: u32,
    pub anchor: DocumentCoordinate,
    pub duration: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramConfiguration {
    #[serde(default)]
    pub targets: Vec<TargetEntry>,
    #[serde(default)]
    pub observing_blocks: Vec<ObservingBlockEntry>,
    #[serde(default)]
    pub observing_groups: Vec<ObservingGroupEntry>,
}

/// Serialized program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramDocument {
    pub runid: String,
    pub pi_login: String,
    #[serde(default)]
    pub program_configuration: ProgramConfiguration,
}

impl From<&TargetRecord> for TargetEntry {
    fn from(target: &TargetRecord) -> Self {
        Self {
            identifier: ClientToken::new(&target.token),
            name: target.name.clone(),
            moving_target: MovingTarget {
                ephemeris_points: vec![EphemerisPointEntry {
                    epoch_mjd: target.epoch.value(),
                    coordinate: target.coordinate.into(),
                    mag: target.magnitude,
                }],
            },
        }
    }
}

impl From<&ObservingBlock> for ObservingBlockEntry {
    fn from(block: &ObservingBlock) -> Self {
        Self {
            identifier: ClientToken::new(&block.token),
            target_identifier: ClientToken::new(&block.target_token),
            constraint_identifiers: vec![ServerToken {
                server_token: block.constraint_id.clone(),
            }],
            instrument_config_identifiers: vec![ServerToken {
                server_token: block.configuration_id.clone(),
            }],
            designation: block.designation.clone(),
            exposure_time: block.exposure.value(),
        }
    }
}

impl From<&ObservingGroup> for ObservingGroupEntry {
    fn from(group: &ObservingGroup) -> Self {
        Self {
            identifier: ClientToken::new(&group.token),
            observing_block_identifiers: group
                .block_tokens()
                .into_iter()
                .map(ClientToken::new)
                .collect(),
            index: group.index,
            repeat: group.repeat,
            anchor: group.anchor.into(),
            duration: group.duration.value(),
        }
    }
}

fn invalid(entity: &str, token: &str, message: impl Into<String>) -> RepositoryError {
    RepositoryError::validation_with_context(
        message,
        ErrorContext::new("load_document")
            .with_entity(entity)
            .with_entity_id(token),
    )
}

fn document_coordinate(
    entity: &str,
    token: &str,
    coordinate: DocumentCoordinate,
) -> RepositoryResult<SkyCoordinate> {
    SkyCoordinate::from_degrees(coordinate.ra, coordinate.dec).ok_or_else(|| {
        invalid(
            entity,
            token,
            format!("coordinate out of range: ra={} dec={}", coordinate.ra, coordinate.dec),
        )
    })
}

impl TryFrom<&TargetEntry> for TargetRecord {
    type Error = RepositoryError;

    fn try_from(entry: &TargetEntry) -> RepositoryResult<Self> {
        let token = &entry.identifier.client_token;
        let point = entry
            .moving_target
            .ephemeris_points
            .first()
            .ok_or_else(|| invalid("target", token, "no ephemeris points"))?;
        Ok(TargetRecord {
            token: token.clone(),
            name: entry.name.clone(),
            coordinate: document_coordinate("target", token, point.coordinate)?,
            magnitude: point.mag,
            epoch: ModifiedJulianDate::new(point.epoch_mjd),
        })
    }
}

impl TryFrom<&ObservingBlockEntry> for ObservingBlock {
    type Error = RepositoryError;

    fn try_from(entry: &ObservingBlockEntry) -> RepositoryResult<Self> {
        let token = &entry.identifier.client_token;
        let configuration_id = entry
            .instrument_config_identifiers
            .first()
            .ok_or_else(|| invalid("observing_block", token, "no instrument configuration"))?
            .server_token
            .clone();
        let constraint_id = entry
            .constraint_identifiers
            .first()
            .map(|constraint| constraint.server_token.clone())
            .unwrap_or_else(|| DEFAULT_CONSTRAINT_ID.to_string());
        Ok(ObservingBlock {
            token: token.clone(),
            target_token: entry.target_identifier.client_token.clone(),
            designation: entry.designation.clone(),
            configuration_id,
            exposure: Seconds::new(entry.exposure_time),
            constraint_id,
        })
    }
}

impl ProgramDocument {
    pub fn new(runid: impl Into<String>, pi_login: impl Into<String>) -> Self {
        Self {
            runid: runid.into(),
            pi_login: pi_login.into(),
            program_configuration: ProgramConfiguration::default(),
        }
    }

    /// Parse a document, reporting the JSON path of the first bad field.
    pub fn from_json_str(json: &str) -> RepositoryResult<Self> {
        let deserializer = &mut serde_json::Deserializer::from_str(json);
        serde_path_to_error::deserialize(deserializer).map_err(|e| {
            RepositoryError::validation_with_context(
                e.inner().to_string(),
                ErrorContext::new("load_document").with_details(format!("at {}", e.path())),
            )
        })
    }

    /// Snapshot the records held by `store`.
    fn from_store(runid: &str, pi_login: &str, store: &LocalRepository) -> Self {
        let mut document = Self::new(runid, pi_login);
        let configuration = &mut document.program_configuration;
        configuration.targets = store.targets().iter().map(TargetEntry::from).collect();
        configuration.observing_blocks = store.blocks().iter().map(ObservingBlockEntry::from).collect();
        configuration.observing_groups = store.groups().iter().map(ObservingGroupEntry::from).collect();
        document
    }

    /// Load every record of the document into `store`.
    async fn load_into(&self, store: &LocalRepository) -> RepositoryResult<()> {
        let configuration = &self.program_configuration;
        for entry in &configuration.targets {
            store.persist_target(&TargetRecord::try_from(entry)?).await?;
        }
        for entry in &configuration.observing_blocks {
            store.persist_block(&ObservingBlock::try_from(entry)?).await?;
        }
        for entry in &configuration.observing_groups {
            let token = &entry.identifier.client_token;
            let mut blocks = Vec::with_capacity(entry.observing_block_identifiers.len());
            for identifier in &entry.observing_block_identifiers {
                blocks.push(store.get_block(&identifier.client_token).await?);
            }
            store
                .persist_group(&ObservingGroup {
                    token: token.clone(),
                    index: entry.index,
                    repeat: entry.repeat,
                    anchor: document_coordinate("observing_group", token, entry.anchor)?,
                    blocks,
                    duration: Seconds::new(entry.duration),
                })
                .await?;
        }
        Ok(())
    }
}

/// Default document name for a queue run, `PH2_{runid}_{qrunid}.json`.
pub fn default_document_path(runid: &str, qrunid: &str) -> PathBuf {
    PathBuf::from(format!("PH2_{}_{}.json", runid, qrunid))
}

/// Repository backed by a program document on disk.
pub struct JsonProgramRepository {
    path: PathBuf,
    runid: String,
    pi_login: String,
    store: LocalRepository,
}

impl JsonProgramRepository {
    /// Open the document at `path`, loading its records when it exists.
    ///
    /// # Errors
    /// A document written for another `runid` is a configuration error.
    pub async fn open(
        path: impl AsRef<Path>,
        runid: impl Into<String>,
        pi_login: impl Into<String>,
    ) -> RepositoryResult<Self> {
        let path = path.as_ref().to_path_buf();
        let runid = runid.into();
        let store = LocalRepository::new();

        if path.exists() {
            let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
                RepositoryError::storage_with_context(
                    e.to_string(),
                    ErrorContext::new("open_document").with_details(path.display().to_string()),
                )
            })?;
            let document = ProgramDocument::from_json_str(&content)?;
            if document.runid != runid {
                return Err(RepositoryError::configuration(format!(
                    "{} belongs to run {}, not {}",
                    path.display(),
                    document.runid,
                    runid
                )));
            }
            document.load_into(&store).await?;
            info!(
                "Loaded {} target(s) and {} group(s) from {}",
                store.target_count(),
                store.group_count(),
                path.display()
            );
        }

        Ok(Self {
            path,
            runid,
            pi_login: pi_login.into(),
            store,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents as a document.
    pub fn document(&self) -> ProgramDocument {
        ProgramDocument::from_store(&self.runid, &self.pi_login, &self.store)
    }
}

#[async_trait]
impl ProgramRepository for JsonProgramRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.store.health_check().await
    }

    async fn persist_target(&self, target: &TargetRecord) -> RepositoryResult<()> {
        self.store.persist_target(target).await
    }

    async fn persist_block(&self, block: &ObservingBlock) -> RepositoryResult<()> {
        self.store.persist_block(block).await
    }

    async fn persist_group(&self, group: &ObservingGroup) -> RepositoryResult<()> {
        self.store.persist_group(group).await
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
        let context = || ErrorContext::new("flush").with_details(self.path.display().to_string());
        let json = serde_json::to_string_pretty(&self.document())
            .map_err(|e| RepositoryError::storage_with_context(e.to_string(), context()))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| RepositoryError::storage_with_context(e.to_string(), context().retryable()))?;
        debug!("Wrote program document {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn target() -> TargetRecord {
        TargetRecord {
            token: "18AC99-2003_UZ413".to_string(),
            name: "2003 UZ413".to_string(),
            coordinate: SkyCoordinate::from_degrees(61.5, 17.25).unwrap(),
            magnitude: 20.4,
            epoch: ModifiedJulianDate::new(58133.25),
        }
    }

    fn block() -> ObservingBlock {
        ObservingBlock {
            token: "OB-Q1-18AC99-2003_UZ413".to_string(),
            target_token: "18AC99-2003_UZ413".to_string(),
            designation: Designation::Provisional("2003 UZ413".to_string()),
            configuration_id: "I5".to_string(),
            exposure: Seconds::new(200.0),
            constraint_id: DEFAULT_CONSTRAINT_ID.to_string(),
        }
    }

    fn group(repeat: u32) -> ObservingGroup {
        ObservingGroup {
            token: format!("OG-18AC99-Q1-1-{}", repeat),
            index: 1,
            repeat,
            anchor: SkyCoordinate::from_degrees(61.5, 17.25).unwrap(),
            blocks: vec![block()],
            duration: Seconds::new(200.0),
        }
    }

    async fn populate(repo: &JsonProgramRepository) {
        repo.persist_target(&target()).await.unwrap();
        repo.persist_block(&block()).await.unwrap();
        for repeat in 0..3 {
            repo.persist_group(&group(repeat)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_flush_writes_phase2_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("PH2_18AC99_Q1.json");
        let repo = JsonProgramRepository::open(&path, "18AC99", "recon").await.unwrap();
        populate(&repo).await;
        repo.flush().await.unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["runid"], "18AC99");
        assert_eq!(value["pi_login"], "recon");
        let configuration = &value["program_configuration"];
        assert_eq!(
            configuration["targets"][0]["moving_target"]["ephemeris_points"][0]["coordinate"]["ra"],
            61.5
        );
        assert_eq!(
            configuration["observing_blocks"][0]["instrument_config_identifiers"][0]["server_token"],
            "I5"
        );
        assert_eq!(
            configuration["observing_blocks"][0]["constraint_identifiers"][0]["server_token"],
            "C1"
        );
        let groups = configuration["observing_groups"].as_array().unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[2]["identifier"]["client_token"], "OG-18AC99-Q1-1-2");
        assert_eq!(
            groups[0]["observing_block_identifiers"][0]["client_token"],
            "OB-Q1-18AC99-2003_UZ413"
        );
    }

    #[tokio::test]
    async fn test_reopen_loads_existing_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("program.json");
        let repo = JsonProgramRepository::open(&path, "18AC99", "recon").await.unwrap();
        populate(&repo).await;
        repo.flush().await.unwrap();

        let reopened = JsonProgramRepository::open(&path, "18AC99", "recon").await.unwrap();
        assert_eq!(reopened.get_target(&target().token).await.unwrap(), target());
        let stored = reopened.get_observing_group("OG-18AC99-Q1-1-1").await.unwrap();
        assert_eq!(stored, group(1));
        assert_eq!(reopened.document(), repo.document());
    }

    #[tokio::test]
    async fn test_document_of_another_run_is_refused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("program.json");
        let repo = JsonProgramRepository::open(&path, "18AC99", "recon").await.unwrap();
        repo.flush().await.unwrap();

        let err = JsonProgramRepository::open(&path, "18BC01", "recon")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RepositoryError::ConfigurationError { .. }));
    }

    #[test]
    fn test_bad_document_reports_path() {
        let json = r#"{"runid": "18AC99", "pi_login": "recon",
            "program_configuration": {"targets": [{"identifier": {"client_token": 7}}]}}"#;
        let err = ProgramDocument::from_json_str(json).unwrap_err();
        let details = err.context().details.clone().unwrap();
        assert!(details.contains("program_configuration.targets[0].identifier.client_token"));
    }

    #[test]
    fn test_default_document_path() {
        assert_eq!(
            default_document_path("18AC99", "Q1"),
            PathBuf::from("PH2_18AC99_Q1.json")
        );
    }
}
