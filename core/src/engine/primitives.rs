//! Primitive dispatch table
//!
//! Block packages register one function per opcode, plus static metadata for
//! the hats they own. Lookups of unknown opcodes return `None`.

use super::blocks::{Mutation, Opcode};
use super::block_utility::BlockUtility;
use super::promise::Promise;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

/* ===================== Primitive contract ===================== */

/// What a primitive hands back to the executor
#[derive(Debug)]
pub enum Reported {
    /// Command block, no value
    Nothing,
    Value(Value),
    /// Finishes later; the thread waits in `PROMISE_WAIT`
    Promise(Promise),
}

impl From<Value> for Reported {
    fn from(value: Value) -> Self {
        Reported::Value(value)
    }
}

impl From<Option<Value>> for Reported {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Reported::Nothing, Reported::Value)
    }
}

impl From<f64> for Reported {
    fn from(n: f64) -> Self {
        Reported::Value(Value::Num(n))
    }
}

impl From<bool> for Reported {
    fn from(b: bool) -> Self {
        Reported::Value(Value::Bool(b))
    }
}

impl From<String> for Reported {
    fn from(s: String) -> Self {
        Reported::Value(Value::Str(s))
    }
}

impl From<Promise> for Reported {
    fn from(promise: Promise) -> Self {
        Reported::Promise(promise)
    }
}

/// Evaluated fields and inputs of the block being executed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockArgs {
    pub values: BTreeMap<String, Value>,
    pub mutation: Option<Mutation>,
}

impl BlockArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn number(&self, name: &str) -> f64 {
        self.values.get(name).map_or(0.0, Value::to_number)
    }

    pub fn boolean(&self, name: &str) -> bool {
        self.values.get(name).map_or(false, Value::to_bool)
    }

    pub fn string(&self, name: &str) -> String {
        self.values
            .get(name)
            .map(|v| v.to_string())
            .unwrap_or_default()
    }
}

pub type Primitive = Rc<dyn Fn(&BlockArgs, &mut BlockUtility<'_, '_>) -> Reported>;

/// Static metadata of a hat opcode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HatInfo {
    /// Triggering a running script restarts it instead of leaving it be
    pub restart_existing_threads: bool,
    /// Started every tick; the body only runs on a false-to-true edge
    pub edge_activated: bool,
}

impl HatInfo {
    pub fn restarting() -> Self {
        HatInfo {
            restart_existing_threads: true,
            edge_activated: false,
        }
    }

    pub fn edge_activated() -> Self {
        HatInfo {
            restart_existing_threads: false,
            edge_activated: true,
        }
    }
}

/// A set of primitives and hats registered together
pub trait BlockPackage {
    fn primitives(&self) -> Vec<(&'static str, Primitive)>;

    fn hats(&self) -> Vec<(&'static str, HatInfo)> {
        Vec::new()
    }
}

/* ===================== Registry ===================== */

#[derive(Default)]
pub struct Registry {
    primitives: HashMap<Opcode, Primitive>,
    hats: BTreeMap<Opcode, HatInfo>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_package(&mut self, package: &dyn BlockPackage) {
        for (opcode, primitive) in package.primitives() {
            self.primitives.insert(Opcode::from(opcode), primitive);
        }
        for (opcode, info) in package.hats() {
            self.hats.insert(Opcode::from(opcode), info);
        }
    }

    pub fn add_primitive<F>(&mut self, opcode: impl Into<Opcode>, primitive: F)
    where
        F: Fn(&BlockArgs, &mut BlockUtility<'_, '_>) -> Reported + 'static,
    {
        self.primitives.insert(opcode.into(), Rc::new(primitive));
    }

    pub fn add_hat(&mut self, opcode: impl Into<Opcode>, info: HatInfo) {
        self.hats.insert(opcode.into(), info);
    }

    pub fn primitive(&self, opcode: &str) -> Option<Primitive> {
        self.primitives.get(opcode).cloned()
    }

    pub fn hat_info(&self, opcode: &str) -> Option<HatInfo> {
        self.hats.get(opcode).copied()
    }

    pub fn is_hat(&self, opcode: &str) -> bool {
        self.hats.contains_key(opcode)
    }

    pub fn is_edge_activated_hat(&self, opcode: &str) -> bool {
        self.hats.get(opcode).map_or(false, |info| info.edge_activated)
    }

    /// Edge-activated hat opcodes in a stable order
    pub fn edge_activated_hats(&self) -> Vec<Opcode> {
        self.hats
            .iter()
            .filter(|(_, info)| info.edge_activated)
            .map(|(opcode, _)| opcode.clone())
            .collect()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("primitives", &self.primitives.keys().collect::<Vec<_>>())
            .field("hats", &self.hats)
            .finish()
    }
}

/// Wrap a plain function or closure as a [`Primitive`]
pub fn primitive<F>(f: F) -> Primitive
where
    F: Fn(&BlockArgs, &mut BlockUtility<'_, '_>) -> Reported + 'static,
{
    Rc::new(f)
}
