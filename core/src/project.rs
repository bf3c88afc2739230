//! Project fixtures
//!
//! A project file lists targets with their block records:
//!
//! ```json
//! {"targets": [{"name": "Stage", "isStage": true, "blocks": []},
//!              {"name": "Cat", "blocks": [{"id": "flag", "opcode": "event_whenflagclicked", "topLevel": true}]}]}
//! ```

use crate::engine::{Block, Blocks, Runtime, TargetId, TargetKind};
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub targets: Vec<TargetDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDef {
    pub name: String,
    #[serde(default)]
    pub is_stage: bool,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Project {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Add every target to `runtime`, in file order. The first sprite
    /// becomes the editing target.
    pub fn install(self, runtime: &mut Runtime) -> Result<Vec<TargetId>> {
        let mut seen = HashSet::new();
        for target in &self.targets {
            if !seen.insert(target.name.as_str()) {
                return Err(EngineError::DuplicateTarget(target.name.clone()));
            }
        }

        let mut ids = Vec::with_capacity(self.targets.len());
        for target in self.targets {
            let kind = if target.is_stage {
                TargetKind::Stage
            } else {
                TargetKind::Sprite { is_original: true }
            };
            let blocks = Blocks::from_blocks(target.blocks);
            info!(target_name = %target.name, blocks = blocks.len(), "target loaded");
            ids.push(runtime.add_target(target.name, kind, blocks));
        }

        let editing = runtime
            .targets()
            .find(|t| !t.is_stage())
            .map(|t| t.id);
        runtime.set_editing_target(editing);
        Ok(ids)
    }
}

/// Id of the original target called `name`
pub fn target_by_name(runtime: &Runtime, name: &str) -> Result<TargetId> {
    runtime
        .targets()
        .find(|t| t.is_original() && t.name == name)
        .map(|t| t.id)
        .ok_or_else(|| EngineError::UnknownTarget(name.to_string()))
}
