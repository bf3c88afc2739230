//! Per-container lookup caches
//!
//! Both caches are arenas keyed by block id (or opcode) owned by a single
//! [`Blocks`](super::blocks::Blocks) container. Every structural mutation of
//! the container clears them, so a cached entry never outlives the block
//! shape it was derived from.

use super::blocks::{Block, BlockId, Mutation, Opcode, BRANCH_INPUT_PREFIX, PROCEDURE_PROTOTYPE_INPUT};
use crate::value::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

/* ===================== Execute cache ===================== */

/// Everything the executor needs from a block, precomputed once
#[derive(Debug, Clone)]
pub struct CachedBlock {
    pub id: BlockId,
    pub opcode: Opcode,
    /// Field values, already in argument form
    pub field_args: BTreeMap<String, Value>,
    /// Inputs in evaluation order with their attached child, if any
    pub inputs: Vec<(String, Option<BlockId>)>,
    pub mutation: Option<Mutation>,
    /// Set when the block has exactly one field and no inputs, so it can
    /// stand in for a literal when no primitive is registered
    pub literal: Option<Value>,
    pub next: Option<BlockId>,
}

impl CachedBlock {
    pub(crate) fn from_block(block: &Block) -> Self {
        let field_args: BTreeMap<String, Value> = block
            .fields
            .iter()
            .map(|(name, field)| (name.clone(), field.value.clone()))
            .collect();

        // branches are entered by the primitive, never evaluated as reporters
        let inputs = block
            .inputs
            .iter()
            .filter(|(name, _)| {
                !name.starts_with(BRANCH_INPUT_PREFIX) && name.as_str() != PROCEDURE_PROTOTYPE_INPUT
            })
            .map(|(name, input)| (name.clone(), input.block.clone()))
            .collect::<Vec<_>>();

        let literal = if block.fields.len() == 1 && block.inputs.is_empty() {
            block.fields.values().next().map(|f| f.value.clone())
        } else {
            None
        };

        CachedBlock {
            id: block.id.clone(),
            opcode: block.opcode.clone(),
            field_args,
            inputs,
            mutation: block.mutation.clone(),
            literal,
            next: block.next.clone(),
        }
    }
}

/* ===================== Runtime script cache ===================== */

/// A script whose top block has a given opcode, with its field values
/// uppercased for hat matching
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptEntry {
    pub block_id: BlockId,
    pub fields: BTreeMap<String, String>,
}

impl ScriptEntry {
    /// Fields of the hat itself, falling back to the fields of the blocks
    /// plugged into its inputs (menus are often shadow children).
    pub(crate) fn new(hat: &Block, blocks: &HashMap<BlockId, Block>) -> Self {
        let mut fields: BTreeMap<String, String> = hat
            .fields
            .iter()
            .map(|(name, field)| (name.clone(), field.value.to_string().to_uppercase()))
            .collect();

        if fields.is_empty() {
            for input in hat.inputs.values() {
                let Some(child) = input.block.as_ref().and_then(|id| blocks.get(id)) else {
                    continue;
                };
                for (name, field) in &child.fields {
                    fields.insert(name.clone(), field.value.to_string().to_uppercase());
                }
            }
        }

        ScriptEntry {
            block_id: hat.id.clone(),
            fields,
        }
    }

    /// True when every requested (already uppercased) field matches
    pub fn matches(&self, match_fields: &BTreeMap<String, String>) -> bool {
        match_fields
            .iter()
            .all(|(name, value)| self.fields.get(name) == Some(value))
    }
}

/* ===================== Procedure cache ===================== */

/// Parameter signature of a procedure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcedureParams {
    pub names: Vec<String>,
    pub ids: Vec<String>,
    pub defaults: Vec<Value>,
}

/* ===================== Arena ===================== */

#[derive(Debug, Default)]
pub struct BlocksCache {
    pub(crate) execute: RefCell<HashMap<BlockId, Rc<CachedBlock>>>,
    pub(crate) scripts_by_opcode: RefCell<HashMap<Opcode, Rc<[ScriptEntry]>>>,
    pub(crate) procedure_definitions: RefCell<HashMap<String, Option<BlockId>>>,
    pub(crate) procedure_params: RefCell<HashMap<String, Option<Rc<ProcedureParams>>>>,
}

impl BlocksCache {
    pub fn clear(&mut self) {
        self.execute.get_mut().clear();
        self.scripts_by_opcode.get_mut().clear();
        self.procedure_definitions.get_mut().clear();
        self.procedure_params.get_mut().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.execute.borrow().is_empty()
            && self.scripts_by_opcode.borrow().is_empty()
            && self.procedure_definitions.borrow().is_empty()
            && self.procedure_params.borrow().is_empty()
    }
}
