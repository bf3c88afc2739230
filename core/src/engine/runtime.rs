//! Runtime: thread pool, targets, hats and frame loop
//!
//! The runtime owns everything the engine touches: the block containers,
//! the targets that point into them, the ordered thread pool, the primitive
//! registry, IO devices and the queue of pending promise continuations.
//! The sequencer and block utility only ever borrow it.

use super::blocks::{BlockId, BlockScope, Blocks};
use super::execute::resume_after_settlement;
use super::primitives::Registry;
use super::promise::Promise;
use super::sequencer::Sequencer;
use super::target::{ContainerId, Target, TargetId, TargetKind};
use super::thread::{Thread, ThreadId, ThreadOptions, ThreadStatus};
use super::timer::Clock;
use crate::blocks::register_default_packages;
use crate::io::{ClockDevice, IoDevice};
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Maximum number of clones alive at once
pub const MAX_CLONES: usize = 300;

/// Frame interval at 60 Hz
pub const THREAD_STEP_INTERVAL: Duration = Duration::from_nanos(16_666_667);

/// Frame interval at 30 Hz, used in compatibility mode
pub const THREAD_STEP_INTERVAL_COMPATIBILITY: Duration = Duration::from_nanos(33_333_333);

/// Budget a warp-mode thread may run before it has to yield
pub const WARP_TIME: Duration = Duration::from_millis(500);

const FLAG_CLICKED: &str = "event_whenflagclicked";

/* ===================== Options & Events ===================== */

#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub compatibility_mode: bool,
    pub turbo_mode: bool,
    pub max_clones: usize,
    pub warp_time: Duration,
    pub clock: Clock,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        RuntimeOptions {
            compatibility_mode: false,
            turbo_mode: false,
            max_clones: MAX_CLONES,
            warp_time: WARP_TIME,
            clock: Clock::system(),
        }
    }
}

/// Side effects for the host (editor, renderer, logger) to consume
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    ScriptGlowOn { top_block: BlockId },
    ScriptGlowOff { top_block: BlockId },
    VisualReport { block_id: BlockId, value: Value },
    MonitorUpdate { block_id: BlockId, value: Value },
    ProjectRunStart,
    ProjectRunStop,
}

/// Continuation of a thread parked on a primitive's promise
#[derive(Debug)]
pub(crate) struct PendingPromise {
    pub thread: ThreadId,
    pub block_id: BlockId,
    pub opcode: String,
    pub is_hat: bool,
    pub promise: Promise,
}

/* ===================== Runtime ===================== */

pub struct Runtime {
    pub(crate) threads: Vec<Thread>,
    targets: HashMap<TargetId, Target>,
    /// Execution order of targets, back to front
    execution_order: Vec<TargetId>,
    containers: HashMap<ContainerId, Blocks>,
    next_container: u32,
    flyout: Blocks,
    pub(crate) registry: Registry,
    io_devices: HashMap<String, Box<dyn IoDevice>>,
    pub(crate) pending_promises: Vec<PendingPromise>,
    events: Vec<RuntimeEvent>,
    options: RuntimeOptions,
    pub(crate) redraw_requested: bool,
    clone_count: usize,
    next_thread_id: u64,
    editing_target: Option<TargetId>,
    glowing_scripts: Vec<BlockId>,
    non_monitor_thread_count: usize,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_options(RuntimeOptions::default())
    }

    /// A runtime with the default block packages and the clock device
    pub fn with_options(options: RuntimeOptions) -> Self {
        let mut registry = Registry::new();
        register_default_packages(&mut registry);

        let mut runtime = Runtime {
            threads: Vec::new(),
            targets: HashMap::new(),
            execution_order: Vec::new(),
            containers: HashMap::new(),
            next_container: 0,
            flyout: Blocks::new(),
            registry,
            io_devices: HashMap::new(),
            pending_promises: Vec::new(),
            events: Vec::new(),
            options,
            redraw_requested: false,
            clone_count: 0,
            next_thread_id: 0,
            editing_target: None,
            glowing_scripts: Vec::new(),
            non_monitor_thread_count: 0,
        };
        let clock = ClockDevice::new(&runtime.options.clock);
        runtime.register_io_device("clock", Box::new(clock));
        runtime
    }

    /* ----- settings ----- */

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    pub fn clock(&self) -> &Clock {
        &self.options.clock
    }

    pub fn set_compatibility_mode(&mut self, enabled: bool) {
        self.options.compatibility_mode = enabled;
    }

    pub fn set_turbo_mode(&mut self, enabled: bool) {
        self.options.turbo_mode = enabled;
    }

    pub fn turbo_mode(&self) -> bool {
        self.options.turbo_mode
    }

    pub fn current_step_time(&self) -> Duration {
        if self.options.compatibility_mode {
            THREAD_STEP_INTERVAL_COMPATIBILITY
        } else {
            THREAD_STEP_INTERVAL
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /* ----- targets & containers ----- */

    /// Add a stage or original sprite owning `blocks`
    pub fn add_target(&mut self, name: impl Into<String>, kind: TargetKind, blocks: Blocks) -> TargetId {
        let container = ContainerId(self.next_container);
        self.next_container += 1;
        self.containers.insert(container, blocks);

        let target = Target::new(name, kind, container);
        let id = target.id;
        self.targets.insert(id, target);
        self.execution_order.push(id);
        id
    }

    pub fn target(&self, id: TargetId) -> Option<&Target> {
        self.targets.get(&id)
    }

    pub fn target_mut(&mut self, id: TargetId) -> Option<&mut Target> {
        self.targets.get_mut(&id)
    }

    /// Targets in execution order
    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.execution_order
            .iter()
            .filter_map(|id| self.targets.get(id))
    }

    pub fn stage(&self) -> Option<TargetId> {
        self.targets().find(|t| t.is_stage()).map(|t| t.id)
    }

    pub fn sprite_target_by_name(&self, name: &str) -> Option<TargetId> {
        self.targets()
            .find(|t| !t.is_stage() && t.is_original() && t.name == name)
            .map(|t| t.id)
    }

    pub fn blocks_of(&self, target: TargetId) -> Option<&Blocks> {
        let container = self.targets.get(&target)?.blocks;
        self.containers.get(&container)
    }

    /// Mutable access to a target's container; clones share it
    pub fn blocks_of_mut(&mut self, target: TargetId) -> Option<&mut Blocks> {
        let container = self.targets.get(&target)?.blocks;
        self.containers.get_mut(&container)
    }

    pub fn flyout_blocks(&self) -> &Blocks {
        &self.flyout
    }

    pub fn flyout_blocks_mut(&mut self) -> &mut Blocks {
        &mut self.flyout
    }

    /// Block lookup for threads running on `target`
    pub fn scope(&self, target: TargetId) -> BlockScope<'_> {
        BlockScope::new(self.blocks_of(target), &self.flyout)
    }

    pub fn editing_target(&self) -> Option<TargetId> {
        self.editing_target
    }

    pub fn set_editing_target(&mut self, target: Option<TargetId>) {
        self.editing_target = target;
    }

    /* ----- clones ----- */

    pub fn clones_available(&self) -> bool {
        self.clone_count < self.options.max_clones
    }

    pub fn clone_count(&self) -> usize {
        self.clone_count
    }

    pub fn change_clone_counter(&mut self, delta: isize) {
        self.clone_count = self.clone_count.saturating_add_signed(delta);
    }

    /// Clone a sprite. `None` for the stage or when the clone limit is hit.
    pub fn clone_target(&mut self, source: TargetId) -> Option<TargetId> {
        let original = self.targets.get(&source)?;
        if original.is_stage() {
            return None;
        }
        if !self.clones_available() {
            warn!(target_name = %original.name, "clone limit reached");
            return None;
        }

        let clone = original.make_clone();
        let id = clone.id;
        self.targets.insert(id, clone);
        self.execution_order.push(id);
        self.change_clone_counter(1);
        debug!(%id, source = %source, "clone created");
        Some(id)
    }

    /// Remove a target, stopping its threads
    pub fn dispose_target(&mut self, id: TargetId) {
        let Some(target) = self.targets.remove(&id) else {
            return;
        };
        self.stop_for_target(id, None);
        self.execution_order.retain(|t| *t != id);
        if !target.is_original() {
            self.change_clone_counter(-1);
        }
        if self.editing_target == Some(id) {
            self.editing_target = None;
        }
    }

    /* ----- threads ----- */

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn thread(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.iter().find(|t| t.id == id)
    }

    /// A thread positioned at `top_block`, not yet in the pool
    pub fn new_thread(&mut self, top_block: impl Into<BlockId>, target: TargetId, opts: ThreadOptions) -> Thread {
        let id = ThreadId(self.next_thread_id);
        self.next_thread_id += 1;

        let top_block = top_block.into();
        let mut thread = Thread::new(id, top_block.clone(), target, opts);
        thread.push_stack(Some(top_block));
        thread
    }

    /// Create a thread for `top_block` and append it to the pool
    pub fn push_thread(&mut self, top_block: impl Into<BlockId>, target: TargetId, opts: ThreadOptions) -> ThreadId {
        let thread = self.new_thread(top_block, target, opts);
        let id = thread.id;
        debug!(thread = %id, top_block = %thread.top_block, "thread pushed");
        self.threads.push(thread);
        id
    }

    /// Replace the thread in slot `index` with a fresh one for the same
    /// script, keeping its pool position
    fn restart_thread(&mut self, index: usize) -> ThreadId {
        let (top_block, target, opts) = {
            let old = &self.threads[index];
            (old.top_block.clone(), old.target, old.options())
        };
        let thread = self.new_thread(top_block, target, opts);
        let id = thread.id;
        let replaced = self.threads[index].id;
        debug!(thread = %id, %replaced, "thread restarted");
        self.threads[index] = thread;
        self.forget_promises_of(&[replaced]);
        id
    }

    /// Drop the continuations of threads that will never resume
    fn forget_promises_of(&mut self, threads: &[ThreadId]) {
        if threads.is_empty() {
            return;
        }
        self.pending_promises
            .retain(|pending| !threads.contains(&pending.thread));
    }

    fn position_of_script(&self, top_block: &str, target: TargetId) -> Option<usize> {
        self.threads
            .iter()
            .position(|t| t.top_block == top_block && t.target == target && !t.is_done())
    }

    /// Stop the script if it is running, otherwise start it
    pub fn toggle_script(&mut self, top_block: &str, target: TargetId, opts: ThreadOptions) -> Option<ThreadId> {
        if let Some(index) = self.position_of_script(top_block, target) {
            self.threads[index].retire();
            let id = self.threads[index].id;
            self.forget_promises_of(&[id]);
            return None;
        }
        Some(self.push_thread(top_block, target, opts))
    }

    pub fn is_active_thread(&self, id: ThreadId) -> bool {
        self.threads.iter().any(|t| t.id == id)
    }

    /// Whether a thread is idle this tick: parked, deferred, finished or gone
    pub fn is_waiting_thread(&self, id: ThreadId) -> bool {
        match self.thread(id) {
            Some(t) => matches!(
                t.status,
                ThreadStatus::PromiseWait | ThreadStatus::YieldTick | ThreadStatus::Done
            ),
            None => true,
        }
    }

    /* ----- hats ----- */

    /// Start (or restart) every script under the hat `opcode`
    ///
    /// `match_fields` restricts to hats whose fields equal the given values,
    /// compared case-insensitively. Returns the started thread ids.
    pub fn start_hats(
        &mut self,
        opcode: &str,
        match_fields: Option<&BTreeMap<String, String>>,
        target: Option<TargetId>,
    ) -> Vec<ThreadId> {
        let Some(hat) = self.registry.hat_info(opcode) else {
            return Vec::new();
        };

        let match_fields: Option<BTreeMap<String, String>> = match_fields.map(|fields| {
            fields
                .iter()
                .map(|(name, value)| (name.clone(), value.to_uppercase()))
                .collect()
        });

        let targets: Vec<TargetId> = match target {
            Some(id) => vec![id],
            None => self.execution_order.iter().rev().copied().collect(),
        };

        let mut started = Vec::new();
        for target_id in targets {
            let Some(blocks) = self.blocks_of(target_id) else {
                continue;
            };
            let scripts = blocks.get_scripts_by_opcode(opcode);

            for script in scripts.iter() {
                if let Some(fields) = match_fields.as_ref() {
                    if !script.matches(fields) {
                        continue;
                    }
                }

                match self.position_of_script(&script.block_id, target_id) {
                    Some(index) if hat.restart_existing_threads => {
                        started.push(self.restart_thread(index));
                    }
                    Some(_) => {}
                    None => {
                        started.push(self.push_thread(
                            script.block_id.clone(),
                            target_id,
                            ThreadOptions::default(),
                        ));
                    }
                }
            }
        }

        if !started.is_empty() {
            debug!(opcode, count = started.len(), "hats started");
        }
        started
    }

    /* ----- stopping ----- */

    /// Retire every thread and dispose every clone
    pub fn stop_all(&mut self) {
        for thread in self.threads.iter_mut() {
            thread.retire();
        }
        self.pending_promises.clear();

        let clones: Vec<TargetId> = self
            .targets()
            .filter(|t| !t.is_original())
            .map(|t| t.id)
            .collect();
        for id in clones {
            self.dispose_target(id);
        }
        self.clone_count = 0;
        self.request_redraw();
    }

    /// Retire the threads of `target`, except `except`
    pub fn stop_for_target(&mut self, target: TargetId, except: Option<ThreadId>) {
        let mut stopped = Vec::new();
        for thread in self.threads.iter_mut() {
            if thread.target == target && Some(thread.id) != except {
                thread.retire();
                stopped.push(thread.id);
            }
        }
        self.forget_promises_of(&stopped);
    }

    /// Stop everything, reset edge state and the project timer, then fire
    /// the green flag hats
    pub fn green_flag(&mut self) {
        self.stop_all();
        for target in self.targets.values_mut() {
            target.clear_edge_activated_values();
        }
        self.io_query("clock", "resetProjectTimer", &[]);
        self.start_hats(FLAG_CLICKED, None, None);
    }

    /* ----- io ----- */

    pub fn register_io_device(&mut self, name: impl Into<String>, device: Box<dyn IoDevice>) {
        self.io_devices.insert(name.into(), device);
    }

    pub fn io_query(&mut self, device: &str, func: &str, args: &[Value]) -> Option<Value> {
        self.io_devices.get_mut(device)?.query(func, args)
    }

    /* ----- events ----- */

    pub fn request_redraw(&mut self) {
        self.redraw_requested = true;
    }

    pub fn redraw_requested(&self) -> bool {
        self.redraw_requested
    }

    pub fn visual_report(&mut self, block_id: &str, value: Value) {
        self.events.push(RuntimeEvent::VisualReport {
            block_id: block_id.to_string(),
            value,
        });
    }

    pub fn request_update_monitor(&mut self, block_id: &str, value: Value) {
        self.events.push(RuntimeEvent::MonitorUpdate {
            block_id: block_id.to_string(),
            value,
        });
    }

    pub fn drain_events(&mut self) -> Vec<RuntimeEvent> {
        std::mem::take(&mut self.events)
    }

    /* ----- frame loop ----- */

    /// Run one frame
    pub fn step(&mut self) {
        self.settle_promises();

        for opcode in self.registry.edge_activated_hats() {
            self.start_hats(opcode.as_str(), None, None);
        }

        self.redraw_requested = false;
        let finished = Sequencer::new(self).step_threads();

        self.update_glows(&finished);
        self.update_run_state(&finished);
        trace!(
            threads = self.threads.len(),
            finished = finished.len(),
            pending = self.pending_promises.len(),
            "frame stepped"
        );
    }

    /// Resume threads whose promises have settled since the last frame
    fn settle_promises(&mut self) {
        if self.pending_promises.is_empty() {
            return;
        }

        let pending = std::mem::take(&mut self.pending_promises);
        for mut entry in pending {
            // orphaned: its thread was restarted or stopped while stepping
            let parked = self
                .threads
                .iter()
                .any(|t| t.id == entry.thread && t.status == ThreadStatus::PromiseWait);
            if !parked {
                debug!(thread = %entry.thread, "dropping promise of a thread that moved on");
                continue;
            }
            match entry.promise.try_settle() {
                Some(settlement) => resume_after_settlement(self, entry, settlement),
                None => self.pending_promises.push(entry),
            }
        }
    }

    fn update_glows(&mut self, finished: &[Thread]) {
        let mut requested: Vec<BlockId> = Vec::new();
        for thread in self.threads.iter().chain(finished.iter()) {
            if Some(thread.target) != self.editing_target || !thread.request_script_glow_in_frame {
                continue;
            }
            if !requested.contains(&thread.top_block) {
                requested.push(thread.top_block.clone());
            }
        }

        let mut still_glowing = Vec::new();
        for script in std::mem::take(&mut self.glowing_scripts) {
            if requested.contains(&script) {
                still_glowing.push(script);
            } else {
                self.events.push(RuntimeEvent::ScriptGlowOff { top_block: script });
            }
        }
        for script in requested {
            if !still_glowing.contains(&script) {
                self.events.push(RuntimeEvent::ScriptGlowOn {
                    top_block: script.clone(),
                });
                still_glowing.push(script);
            }
        }
        self.glowing_scripts = still_glowing;
    }

    fn update_run_state(&mut self, finished: &[Thread]) {
        let count = self
            .threads
            .iter()
            .chain(finished.iter())
            .filter(|t| !t.update_monitor)
            .count();

        if count == 0 && self.non_monitor_thread_count > 0 {
            self.events.push(RuntimeEvent::ProjectRunStop);
        }
        if count > 0 && self.non_monitor_thread_count == 0 {
            self.events.push(RuntimeEvent::ProjectRunStart);
        }
        self.non_monitor_thread_count = count;
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
