//! Observing blocks, observing groups and the tokens that address them.

use qtty::Seconds;
use serde::{Deserialize, Serialize};

use super::{Designation, SkyCoordinate};

/// Constraint set every block references.
pub const DEFAULT_CONSTRAINT_ID: &str = "C1";

/// One exposure of one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservingBlock {
    pub token: String,
    pub target_token: String,
    pub designation: Designation,
    /// Instrument configuration identifier, `I1`, `I2`, ...
    pub configuration_id: String,
    pub exposure: Seconds,
    pub constraint_id: String,
}

/// Batch of blocks executed together, one physical copy of a logical group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservingGroup {
    pub token: String,
    /// Logical group index, starting at 1.
    pub index: u32,
    /// Copy number, starting at 0.
    pub repeat: u32,
    pub anchor: SkyCoordinate,
    pub blocks: Vec<ObservingBlock>,
    /// Accumulated exposure (plus per-block overhead) of this copy.
    pub duration: Seconds,
}

impl ObservingGroup {
    pub fn block_tokens(&self) -> Vec<&str> {
        self.blocks.iter().map(|block| block.token.as_str()).collect()
    }
}

/// Deterministic token factory for one scheduling run.
///
/// `runid` is the telescope program (e.g. `18AC99`); `qrunid` names the queue
/// run so that a new run always produces fresh group tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramTokens {
    pub runid: String,
    pub qrunid: String,
}

impl ProgramTokens {
    pub fn new(runid: impl Into<String>, qrunid: impl Into<String>) -> Self {
        Self {
            runid: runid.into(),
            qrunid: qrunid.into(),
        }
    }

    pub fn target_token(&self, designation: &Designation) -> String {
        format!("{}-{}", self.runid, designation.token_name())
    }

    pub fn block_token(&self, target_token: &str) -> String {
        format!("OB-{}-{}", self.qrunid, target_token)
    }

    pub fn group_token(&self, index: u32, repeat: u32) -> String {
        format!("OG-{}-{}-{}-{}", self.runid, self.qrunid, index, repeat)
    }
}
