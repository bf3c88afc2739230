//! Thread: one script's execution state
//!
//! A thread holds a stack of block ids and a parallel stack of [`Frame`]s.
//! The two always have the same length; every push/pop goes through the
//! methods here so that never drifts. A `None` stack entry is the
//! placeholder for an empty branch and is popped on the next visit.

use super::blocks::{BlockId, BlockScope};
use super::target::TargetId;
use super::timer::Timer;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// How many enclosing levels `is_recursive_call` looks at
const RECURSION_SCAN_DEPTH: usize = 5;

const PROCEDURE_CALL: &str = "procedures_call";

/* ===================== Identity & Status ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadId(pub(crate) u64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadStatus {
    /// Runnable; the sequencer keeps stepping it
    Running,
    /// Yield to other threads, resume later in this tick
    Yield,
    /// Yield until the next tick
    YieldTick,
    /// Suspended on a primitive's promise
    PromiseWait,
    /// Finished or retired
    Done,
}

/// Flags for how a thread was started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadOptions {
    /// Started by clicking the script in the editor
    pub stack_click: bool,
    /// Evaluates a monitor's reporter
    pub update_monitor: bool,
}

/* ===================== Frames ===================== */

/// Execution state for one stack level
#[derive(Debug, Clone, Default)]
pub struct Frame {
    /// The block at this level re-runs after its branch finishes
    pub is_loop: bool,
    pub warp_mode: bool,
    /// Stack timer for timed blocks (wait, glide)
    pub timer: Option<Timer>,
    pub duration: Option<Duration>,
    /// Input name a nested reporter is being evaluated for
    pub waiting_reporter: Option<String>,
    /// Values of already evaluated inputs. A `None` value means the reporter
    /// ran but produced nothing.
    pub reported: HashMap<String, Option<Value>>,
    /// Procedure arguments; `Some` marks a procedure invocation boundary
    pub params: Option<HashMap<String, Value>>,
    /// Threads started by broadcast-and-wait
    pub triggered_threads: Option<Vec<ThreadId>>,
    /// Scratch space for primitives (loop counters, flags)
    pub execution_context: HashMap<String, Value>,
}

impl Frame {
    fn inheriting(parent: Option<&Frame>) -> Self {
        Frame {
            warp_mode: parent.map_or(false, |f| f.warp_mode),
            ..Default::default()
        }
    }

    /// Reset for the next block at the same level; warp mode survives
    fn reset(&mut self) {
        *self = Frame {
            warp_mode: self.warp_mode,
            ..Default::default()
        };
    }
}

/* ===================== Thread ===================== */

#[derive(Debug, Clone)]
pub struct Thread {
    pub id: ThreadId,
    /// First block of the script this thread runs
    pub top_block: BlockId,
    pub target: TargetId,
    stack: Vec<Option<BlockId>>,
    stack_frames: Vec<Frame>,
    pub status: ThreadStatus,
    pub stack_click: bool,
    pub update_monitor: bool,
    /// Runs while this thread is in warp mode during one step
    pub warp_timer: Option<Timer>,
    pub request_script_glow_in_frame: bool,
    pub block_glow_in_frame: Option<BlockId>,
}

impl Thread {
    pub fn new(id: ThreadId, top_block: impl Into<BlockId>, target: TargetId, opts: ThreadOptions) -> Self {
        Thread {
            id,
            top_block: top_block.into(),
            target,
            stack: Vec::new(),
            stack_frames: Vec::new(),
            status: ThreadStatus::Running,
            stack_click: opts.stack_click,
            update_monitor: opts.update_monitor,
            warp_timer: None,
            request_script_glow_in_frame: false,
            block_glow_in_frame: None,
        }
    }

    pub fn options(&self) -> ThreadOptions {
        ThreadOptions {
            stack_click: self.stack_click,
            update_monitor: self.update_monitor,
        }
    }

    /// Identity-only copy left in the pool while the real thread is being
    /// stepped, so pool scans still see who occupies the slot
    pub(crate) fn detached_shell(&self) -> Thread {
        let mut shell = Thread::new(self.id, self.top_block.clone(), self.target, self.options());
        shell.status = self.status;
        shell.push_stack(Some(self.top_block.clone()));
        shell
    }

    pub fn stack(&self) -> &[Option<BlockId>] {
        &self.stack
    }

    pub fn stack_frames(&self) -> &[Frame] {
        &self.stack_frames
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_done(&self) -> bool {
        self.status == ThreadStatus::Done || self.stack.is_empty()
    }

    /* ----- stack ----- */

    /// Enter a new level. The frame inherits warp mode from the level below.
    pub fn push_stack(&mut self, block_id: Option<BlockId>) {
        let frame = Frame::inheriting(self.stack_frames.last());
        self.stack.push(block_id);
        self.stack_frames.push(frame);
    }

    /// Continue at the same level with a different block
    pub fn reuse_stack_for_next_block(&mut self, block_id: Option<BlockId>) {
        if let (Some(top), Some(frame)) = (self.stack.last_mut(), self.stack_frames.last_mut()) {
            *top = block_id;
            frame.reset();
        }
    }

    pub fn pop_stack(&mut self) -> Option<(Option<BlockId>, Frame)> {
        let block_id = self.stack.pop()?;
        let frame = self.stack_frames.pop().unwrap_or_default();
        Some((block_id, frame))
    }

    /// Top block id; `None` for an empty stack or an empty-branch placeholder
    pub fn peek_stack(&self) -> Option<&BlockId> {
        self.stack.last().and_then(|entry| entry.as_ref())
    }

    pub fn peek_stack_frame(&self) -> Option<&Frame> {
        self.stack_frames.last()
    }

    pub fn peek_stack_frame_mut(&mut self) -> Option<&mut Frame> {
        self.stack_frames.last_mut()
    }

    pub fn peek_parent_stack_frame(&self) -> Option<&Frame> {
        let len = self.stack_frames.len();
        if len < 2 {
            return None;
        }
        self.stack_frames.get(len - 2)
    }

    pub(crate) fn frame_mut(&mut self, depth: usize) -> Option<&mut Frame> {
        self.stack_frames.get_mut(depth)
    }

    /// True when nothing is being evaluated above the script's own level
    pub fn at_stack_top(&self) -> bool {
        self.stack.len() == 1
    }

    /// Hand a reporter's value to the frame that is waiting on it
    pub fn push_reported_value(&mut self, value: Option<Value>) {
        let len = self.stack_frames.len();
        if len < 2 {
            return;
        }
        let parent = &mut self.stack_frames[len - 2];
        if let Some(name) = parent.waiting_reporter.clone() {
            parent.reported.insert(name, value);
        }
    }

    /// Move to the next block at this level, or leave a placeholder to be
    /// popped when the level has no more blocks
    pub fn go_to_next_block(&mut self, scope: &BlockScope<'_>) {
        let next = self.peek_stack().and_then(|id| scope.get_next_block(id));
        self.reuse_stack_for_next_block(next);
    }

    /// Hard stop: forget every level and mark the thread done
    pub fn retire(&mut self) {
        self.stack.clear();
        self.stack_frames.clear();
        self.status = ThreadStatus::Done;
        self.request_script_glow_in_frame = false;
        self.block_glow_in_frame = None;
    }

    /* ----- procedures ----- */

    pub fn init_params(&mut self) {
        if let Some(frame) = self.stack_frames.last_mut() {
            frame.params.get_or_insert_with(HashMap::new);
        }
    }

    pub fn push_param(&mut self, name: impl Into<String>, value: Value) {
        if let Some(frame) = self.stack_frames.last_mut() {
            frame
                .params
                .get_or_insert_with(HashMap::new)
                .insert(name.into(), value);
        }
    }

    /// Look up an argument of the innermost procedure invocation
    pub fn get_param(&self, name: &str) -> Option<&Value> {
        self.stack_frames
            .iter()
            .rev()
            .find_map(|frame| frame.params.as_ref())
            .and_then(|params| params.get(name))
    }

    /// Whether a call to `code` is already in progress below the top level
    pub fn is_recursive_call(&self, code: &str, scope: &BlockScope<'_>) -> bool {
        let below_top = self.stack.len().saturating_sub(1);
        self.stack[..below_top]
            .iter()
            .rev()
            .take(RECURSION_SCAN_DEPTH)
            .filter_map(|entry| entry.as_deref())
            .filter_map(|id| scope.get_block(id))
            .any(|block| {
                block.opcode.as_str() == PROCEDURE_CALL
                    && block
                        .mutation
                        .as_ref()
                        .and_then(|m| m.procedure_code.as_deref())
                        == Some(code)
            })
    }

    /// Unwind to the procedure call that is running this script, or finish
    /// the thread when there is none
    pub fn stop_this_script(&mut self, scope: &BlockScope<'_>) {
        while let Some(block_id) = self.peek_stack() {
            if scope.get_opcode(block_id).map(|op| op.as_str()) == Some(PROCEDURE_CALL) {
                break;
            }
            self.pop_stack();
        }

        if self.stack.is_empty() {
            self.request_script_glow_in_frame = false;
            self.status = ThreadStatus::Done;
        }
    }
}
