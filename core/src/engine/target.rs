//! Execution targets
//!
//! A target is the stage or a sprite (original or clone). It does not own its
//! blocks: it holds a handle into the runtime's container arena, so clones
//! share the scripts of the sprite they were cloned from.

use super::blocks::BlockId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetId(Uuid);

impl TargetId {
    pub fn new() -> Self {
        TargetId(Uuid::new_v4())
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle of a block container owned by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum TargetKind {
    Stage,
    Sprite { is_original: bool },
}

#[derive(Debug, Clone)]
pub struct Target {
    pub id: TargetId,
    pub name: String,
    pub kind: TargetKind,
    pub blocks: ContainerId,
    edge_activated_values: HashMap<BlockId, bool>,
}

impl Target {
    pub fn new(name: impl Into<String>, kind: TargetKind, blocks: ContainerId) -> Self {
        Target {
            id: TargetId::new(),
            name: name.into(),
            kind,
            blocks,
            edge_activated_values: HashMap::new(),
        }
    }

    pub fn is_stage(&self) -> bool {
        matches!(self.kind, TargetKind::Stage)
    }

    pub fn is_original(&self) -> bool {
        match self.kind {
            TargetKind::Stage => true,
            TargetKind::Sprite { is_original } => is_original,
        }
    }

    /// A fresh clone sharing this sprite's container
    pub(crate) fn make_clone(&self) -> Target {
        Target::new(
            self.name.clone(),
            TargetKind::Sprite { is_original: false },
            self.blocks,
        )
    }

    pub fn has_edge_activated_value(&self, block_id: &str) -> bool {
        self.edge_activated_values.contains_key(block_id)
    }

    /// Store the latest predicate value, returning the previous one
    /// (`false` when none was stored)
    pub fn update_edge_activated_value(&mut self, block_id: &str, value: bool) -> bool {
        self.edge_activated_values
            .insert(block_id.to_string(), value)
            .unwrap_or(false)
    }

    pub fn clear_edge_activated_values(&mut self) {
        self.edge_activated_values.clear();
    }
}
