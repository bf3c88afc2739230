//! Block graph
//!
//! A [`Blocks`] container stores the block records of one execution
//! container (a sprite's own blocks, or the shared flyout) together with
//! its list of scripts. Queries never fail on a missing id: they return
//! `None`, which control flow treats as "nothing to execute here".
//!
//! All structural changes go through the mutation API (`create_block`,
//! `change_block`, `move_block`, `delete_block`), which keeps the script
//! list current and clears the container's caches.

use super::cache::{BlocksCache, CachedBlock, ProcedureParams, ScriptEntry};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

pub type BlockId = String;

pub(crate) const BRANCH_INPUT_PREFIX: &str = "SUBSTACK";
const PROCEDURE_DEFINITION: &str = "procedures_definition";
const PROCEDURE_PROTOTYPE: &str = "procedures_prototype";
pub(crate) const PROCEDURE_PROTOTYPE_INPUT: &str = "custom_block";

/* ===================== Opcode ===================== */

/// Block opcode, the key of the primitive dispatch table
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Opcode(String);

impl Opcode {
    pub fn new(name: impl Into<String>) -> Self {
        Opcode(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Opcode {
    fn from(name: &str) -> Self {
        Opcode(name.to_string())
    }
}

impl From<String> for Opcode {
    fn from(name: String) -> Self {
        Opcode(name)
    }
}

impl Borrow<str> for Opcode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/* ===================== Block record ===================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub name: String,
    #[serde(default)]
    pub block: Option<BlockId>,
    #[serde(default)]
    pub shadow: Option<BlockId>,
}

/// Extra per-block data used by procedures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    #[serde(default, rename = "proccode", skip_serializing_if = "Option::is_none")]
    pub procedure_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warp: Option<bool>,
    #[serde(default, rename = "argumentnames")]
    pub arg_names: Vec<String>,
    #[serde(default, rename = "argumentids")]
    pub arg_ids: Vec<String>,
    #[serde(default, rename = "argumentdefaults")]
    pub arg_defaults: Vec<Value>,
}

impl Mutation {
    pub fn procedure(code: impl Into<String>) -> Self {
        Mutation {
            procedure_code: Some(code.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: BlockId,
    pub opcode: Opcode,
    #[serde(default)]
    pub fields: BTreeMap<String, Field>,
    #[serde(default)]
    pub inputs: BTreeMap<String, Input>,
    #[serde(default)]
    pub next: Option<BlockId>,
    #[serde(default)]
    pub parent: Option<BlockId>,
    #[serde(default)]
    pub mutation: Option<Mutation>,
    #[serde(default)]
    pub top_level: bool,
    #[serde(default)]
    pub shadow: bool,
}

impl Block {
    pub fn new(id: impl Into<BlockId>, opcode: impl Into<Opcode>) -> Self {
        Block {
            id: id.into(),
            opcode: opcode.into(),
            fields: BTreeMap::new(),
            inputs: BTreeMap::new(),
            next: None,
            parent: None,
            mutation: None,
            top_level: false,
            shadow: false,
        }
    }

    pub fn top_level(mut self) -> Self {
        self.top_level = true;
        self
    }

    pub fn as_shadow(mut self) -> Self {
        self.shadow = true;
        self
    }

    pub fn with_next(mut self, next: impl Into<BlockId>) -> Self {
        self.next = Some(next.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<BlockId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(
            name.to_string(),
            Field {
                name: name.to_string(),
                value: value.into(),
            },
        );
        self
    }

    /// Attach a non-shadow child to an input
    pub fn with_input(mut self, name: &str, child: impl Into<BlockId>) -> Self {
        self.inputs.insert(
            name.to_string(),
            Input {
                name: name.to_string(),
                block: Some(child.into()),
                shadow: None,
            },
        );
        self
    }

    /// Attach a shadow child, which fills both the block and shadow slots
    pub fn with_shadow_input(mut self, name: &str, shadow: impl Into<BlockId>) -> Self {
        let shadow = shadow.into();
        self.inputs.insert(
            name.to_string(),
            Input {
                name: name.to_string(),
                block: Some(shadow.clone()),
                shadow: Some(shadow),
            },
        );
        self
    }

    pub fn with_mutation(mut self, mutation: Mutation) -> Self {
        self.mutation = Some(mutation);
        self
    }
}

/* ===================== Mutation events ===================== */

/// An edit to an existing block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "element", rename_all = "camelCase")]
pub enum BlockChange {
    Field {
        id: BlockId,
        name: String,
        value: Value,
    },
    Mutation {
        id: BlockId,
        mutation: Mutation,
    },
}

/// A block being dragged from one attachment point to another
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockMove {
    pub id: BlockId,
    #[serde(default)]
    pub old_parent: Option<BlockId>,
    #[serde(default)]
    pub old_input: Option<String>,
    #[serde(default)]
    pub new_parent: Option<BlockId>,
    #[serde(default)]
    pub new_input: Option<String>,
}

/* ===================== Container ===================== */

#[derive(Debug, Default)]
pub struct Blocks {
    blocks: HashMap<BlockId, Block>,
    scripts: Vec<BlockId>,
    cache: BlocksCache,
}

impl Blocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a container from a list of records
    pub fn from_blocks(blocks: impl IntoIterator<Item = Block>) -> Self {
        let mut container = Blocks::new();
        for block in blocks {
            container.create_block(block);
        }
        container
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.blocks.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    /* ----- queries ----- */

    pub fn get_block(&self, id: &str) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn get_opcode(&self, id: &str) -> Option<&Opcode> {
        self.blocks.get(id).map(|b| &b.opcode)
    }

    pub fn get_fields(&self, id: &str) -> Option<&BTreeMap<String, Field>> {
        self.blocks.get(id).map(|b| &b.fields)
    }

    pub fn get_inputs(&self, id: &str) -> Option<&BTreeMap<String, Input>> {
        self.blocks.get(id).map(|b| &b.inputs)
    }

    pub fn get_mutation(&self, id: &str) -> Option<&Mutation> {
        self.blocks.get(id).and_then(|b| b.mutation.as_ref())
    }

    pub fn get_next_block(&self, id: &str) -> Option<&BlockId> {
        self.blocks.get(id).and_then(|b| b.next.as_ref())
    }

    /// First block of branch `branch_num` (1-based) of a C-shaped block
    pub fn get_branch(&self, id: &str, branch_num: usize) -> Option<&BlockId> {
        let block = self.blocks.get(id)?;
        let name = if branch_num > 1 {
            format!("{}{}", BRANCH_INPUT_PREFIX, branch_num)
        } else {
            BRANCH_INPUT_PREFIX.to_string()
        };
        block.inputs.get(&name).and_then(|input| input.block.as_ref())
    }

    /// Walk parents up to the script that contains `id`
    pub fn get_top_level_script(&self, id: &str) -> Option<BlockId> {
        let mut current = self.blocks.get(id)?;
        while let Some(parent) = current.parent.as_ref().and_then(|p| self.blocks.get(p)) {
            current = parent;
        }
        Some(current.id.clone())
    }

    pub fn get_scripts(&self) -> &[BlockId] {
        &self.scripts
    }

    /// Scripts whose top block has `opcode`, with uppercased fields
    pub fn get_scripts_by_opcode(&self, opcode: &str) -> Rc<[ScriptEntry]> {
        if let Some(hit) = self.cache.scripts_by_opcode.borrow().get(opcode) {
            return Rc::clone(hit);
        }

        let entries: Rc<[ScriptEntry]> = self
            .scripts
            .iter()
            .filter_map(|id| self.blocks.get(id))
            .filter(|block| block.opcode.as_str() == opcode)
            .map(|block| ScriptEntry::new(block, &self.blocks))
            .collect();

        self.cache
            .scripts_by_opcode
            .borrow_mut()
            .insert(Opcode::from(opcode), Rc::clone(&entries));
        entries
    }

    /// Executor view of a block
    pub fn get_cached(&self, id: &str) -> Option<Rc<CachedBlock>> {
        if let Some(hit) = self.cache.execute.borrow().get(id) {
            return Some(Rc::clone(hit));
        }

        let block = self.blocks.get(id)?;
        let entry = Rc::new(CachedBlock::from_block(block));
        self.cache
            .execute
            .borrow_mut()
            .insert(id.to_string(), Rc::clone(&entry));
        Some(entry)
    }

    /// Definition block of the procedure named `code`
    pub fn get_procedure_definition(&self, code: &str) -> Option<BlockId> {
        if let Some(hit) = self.cache.procedure_definitions.borrow().get(code) {
            return hit.clone();
        }

        let found = self
            .blocks
            .values()
            .filter(|block| block.opcode.as_str() == PROCEDURE_DEFINITION)
            .find(|block| {
                self.procedure_signature_of(block)
                    .and_then(|m| m.procedure_code.as_deref())
                    == Some(code)
            })
            .map(|block| block.id.clone());

        self.cache
            .procedure_definitions
            .borrow_mut()
            .insert(code.to_string(), found.clone());
        found
    }

    pub fn get_procedure_param_names_and_ids(&self, code: &str) -> Option<(Vec<String>, Vec<String>)> {
        self.get_procedure_param_names_ids_and_defaults(code)
            .map(|params| (params.names.clone(), params.ids.clone()))
    }

    pub fn get_procedure_param_names_ids_and_defaults(&self, code: &str) -> Option<Rc<ProcedureParams>> {
        if let Some(hit) = self.cache.procedure_params.borrow().get(code) {
            return hit.clone();
        }

        let prototype = self
            .blocks
            .values()
            .filter(|block| block.opcode.as_str() == PROCEDURE_PROTOTYPE)
            .filter_map(|block| block.mutation.as_ref())
            .find(|m| m.procedure_code.as_deref() == Some(code));
        let signature = prototype.or_else(|| {
            self.get_procedure_definition(code)
                .and_then(|id| self.blocks.get(&id))
                .and_then(|definition| definition.mutation.as_ref())
        });

        let params = signature.map(|m| {
            Rc::new(ProcedureParams {
                names: m.arg_names.clone(),
                ids: m.arg_ids.clone(),
                defaults: m.arg_defaults.clone(),
            })
        });

        self.cache
            .procedure_params
            .borrow_mut()
            .insert(code.to_string(), params.clone());
        params
    }

    /// Whether a procedure definition runs without screen refresh
    pub fn procedure_warp(&self, definition_id: &str) -> bool {
        self.blocks
            .get(definition_id)
            .and_then(|block| self.procedure_signature_of(block))
            .and_then(|m| m.warp)
            .unwrap_or(false)
    }

    /// Mutation of the prototype plugged into a definition, or the
    /// definition's own mutation
    fn procedure_signature_of<'a>(&'a self, definition: &'a Block) -> Option<&'a Mutation> {
        definition
            .inputs
            .get(PROCEDURE_PROTOTYPE_INPUT)
            .and_then(|input| input.block.as_ref())
            .and_then(|id| self.blocks.get(id))
            .and_then(|prototype| prototype.mutation.as_ref())
            .or(definition.mutation.as_ref())
    }

    /* ----- mutation ----- */

    /// Add a block. An id already present is left untouched.
    pub fn create_block(&mut self, block: Block) {
        if self.blocks.contains_key(&block.id) {
            return;
        }
        if block.top_level {
            self.add_script(&block.id);
        }
        self.blocks.insert(block.id.clone(), block);
        self.reset_cache();
    }

    pub fn change_block(&mut self, change: BlockChange) {
        match change {
            BlockChange::Field { id, name, value } => {
                let Some(block) = self.blocks.get_mut(&id) else {
                    return;
                };
                let Some(field) = block.fields.get_mut(&name) else {
                    return;
                };
                field.value = value;
            }
            BlockChange::Mutation { id, mutation } => {
                let Some(block) = self.blocks.get_mut(&id) else {
                    return;
                };
                block.mutation = Some(mutation);
            }
        }
        self.reset_cache();
    }

    pub fn move_block(&mut self, mv: BlockMove) {
        if !self.blocks.contains_key(&mv.id) {
            return;
        }

        // Detach from the old parent
        if let Some(old_parent) = mv.old_parent.as_ref() {
            if let Some(parent) = self.blocks.get_mut(old_parent) {
                let from_input = match mv.old_input.as_ref() {
                    Some(name) => parent
                        .inputs
                        .get_mut(name)
                        .filter(|input| input.block.as_deref() == Some(mv.id.as_str())),
                    None => None,
                };
                if let Some(input) = from_input {
                    input.block = None;
                } else if parent.next.as_deref() == Some(mv.id.as_str()) {
                    parent.next = None;
                }
            }
            if let Some(block) = self.blocks.get_mut(&mv.id) {
                block.parent = None;
            }
        }

        match mv.new_parent.as_ref() {
            None => self.add_script(&mv.id),
            Some(new_parent) => {
                self.delete_script(&mv.id);
                let moved_is_shadow = self.blocks.get(&mv.id).map_or(false, |b| b.shadow);
                if let Some(parent) = self.blocks.get_mut(new_parent) {
                    match mv.new_input.as_ref() {
                        None => parent.next = Some(mv.id.clone()),
                        Some(input_name) => {
                            let old_shadow = if moved_is_shadow {
                                Some(mv.id.clone())
                            } else {
                                parent.inputs.get(input_name).and_then(|i| i.shadow.clone())
                            };
                            parent.inputs.insert(
                                input_name.clone(),
                                Input {
                                    name: input_name.clone(),
                                    block: Some(mv.id.clone()),
                                    shadow: old_shadow,
                                },
                            );
                        }
                    }
                }
                if let Some(block) = self.blocks.get_mut(&mv.id) {
                    block.parent = Some(new_parent.clone());
                }
            }
        }

        self.reset_cache();
    }

    /// Delete a block, its `next` chain and everything plugged into it
    pub fn delete_block(&mut self, id: &str) {
        let Some(parent_id) = self.blocks.get(id).map(|b| b.parent.clone()) else {
            return;
        };

        let parent = match parent_id {
            Some(parent_id) => self.blocks.get_mut(&parent_id),
            None => None,
        };
        if let Some(parent) = parent {
            if parent.next.as_deref() == Some(id) {
                parent.next = None;
            }
            for input in parent.inputs.values_mut() {
                if input.shadow.as_deref() == Some(id) {
                    input.shadow = None;
                }
                if input.block.as_deref() == Some(id) {
                    // Revealing the obscured shadow, if there is one
                    input.block = input.shadow.clone();
                }
            }
        }

        self.remove_subtree(id);
        self.reset_cache();
    }

    fn remove_subtree(&mut self, id: &str) {
        let mut pending = vec![id.to_string()];
        let mut obscured = Vec::new();

        while let Some(current) = pending.pop() {
            let Some(block) = self.blocks.remove(&current) else {
                continue;
            };
            self.delete_script(&current);

            pending.extend(block.next);
            for input in block.inputs.into_values() {
                if let Some(shadow) = input.shadow.filter(|s| input.block.as_ref() != Some(s)) {
                    obscured.push(shadow);
                }
                pending.extend(input.block);
            }
        }

        // an obscured shadow goes only once nothing else points at it
        for shadow in obscured {
            if !self.is_referenced(&shadow) {
                self.remove_subtree(&shadow);
            }
        }
    }

    fn is_referenced(&self, id: &str) -> bool {
        self.blocks.values().any(|block| {
            block.next.as_deref() == Some(id)
                || block
                    .inputs
                    .values()
                    .any(|i| i.block.as_deref() == Some(id) || i.shadow.as_deref() == Some(id))
        })
    }

    fn add_script(&mut self, id: &str) {
        if !self.scripts.iter().any(|s| s == id) {
            self.scripts.push(id.to_string());
        }
        if let Some(block) = self.blocks.get_mut(id) {
            block.top_level = true;
        }
    }

    fn delete_script(&mut self, id: &str) {
        self.scripts.retain(|s| s != id);
        if let Some(block) = self.blocks.get_mut(id) {
            block.top_level = false;
        }
    }

    pub fn reset_cache(&mut self) {
        self.cache.clear();
    }

    #[cfg(test)]
    pub(crate) fn cache(&self) -> &BlocksCache {
        &self.cache
    }
}

/* ===================== Scope ===================== */

/// Lookup view for one thread: its target's own container first, then the
/// shared flyout container
#[derive(Debug, Clone, Copy)]
pub struct BlockScope<'a> {
    own: Option<&'a Blocks>,
    flyout: &'a Blocks,
}

impl<'a> BlockScope<'a> {
    pub fn new(own: Option<&'a Blocks>, flyout: &'a Blocks) -> Self {
        BlockScope { own, flyout }
    }

    /// Container holding `id`
    fn containing(&self, id: &str) -> Option<&'a Blocks> {
        match self.own {
            Some(own) if own.contains(id) => Some(own),
            _ if self.flyout.contains(id) => Some(self.flyout),
            _ => None,
        }
    }

    pub fn get_block(&self, id: &str) -> Option<&'a Block> {
        self.containing(id).and_then(|c| c.get_block(id))
    }

    pub fn get_opcode(&self, id: &str) -> Option<&'a Opcode> {
        self.containing(id).and_then(|c| c.get_opcode(id))
    }

    pub fn get_cached(&self, id: &str) -> Option<Rc<CachedBlock>> {
        self.containing(id).and_then(|c| c.get_cached(id))
    }

    pub fn get_next_block(&self, id: &str) -> Option<BlockId> {
        self.containing(id).and_then(|c| c.get_next_block(id)).cloned()
    }

    pub fn get_branch(&self, id: &str, branch_num: usize) -> Option<BlockId> {
        self.containing(id)
            .and_then(|c| c.get_branch(id, branch_num))
            .cloned()
    }

    pub fn get_procedure_definition(&self, code: &str) -> Option<BlockId> {
        self.own
            .and_then(|own| own.get_procedure_definition(code))
            .or_else(|| self.flyout.get_procedure_definition(code))
    }

    pub fn get_procedure_param_names_ids_and_defaults(&self, code: &str) -> Option<Rc<ProcedureParams>> {
        self.own
            .and_then(|own| own.get_procedure_param_names_ids_and_defaults(code))
            .or_else(|| self.flyout.get_procedure_param_names_ids_and_defaults(code))
    }

    pub fn procedure_warp(&self, definition_id: &str) -> bool {
        self.containing(definition_id)
            .map_or(false, |c| c.procedure_warp(definition_id))
    }

    pub fn get_top_level_script(&self, id: &str) -> Option<BlockId> {
        self.containing(id).and_then(|c| c.get_top_level_script(id))
    }
}
