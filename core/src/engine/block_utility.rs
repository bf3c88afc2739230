//! The handle primitives get to the engine
//!
//! A `BlockUtility` lives for exactly one primitive call. It borrows the
//! sequencer (and through it the runtime) and the thread being executed.

use super::blocks::BlockScope;
use super::cache::ProcedureParams;
use super::runtime::Runtime;
use super::sequencer::Sequencer;
use super::target::TargetId;
use super::thread::{Frame, Thread, ThreadId, ThreadStatus};
use crate::value::Value;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

pub struct BlockUtility<'a, 'rt> {
    sequencer: &'a mut Sequencer<'rt>,
    thread: &'a mut Thread,
}

impl<'a, 'rt> BlockUtility<'a, 'rt> {
    pub fn new(sequencer: &'a mut Sequencer<'rt>, thread: &'a mut Thread) -> Self {
        BlockUtility { sequencer, thread }
    }

    pub fn runtime(&mut self) -> &mut Runtime {
        &mut *self.sequencer.runtime
    }

    pub fn thread(&self) -> &Thread {
        &*self.thread
    }

    pub fn thread_mut(&mut self) -> &mut Thread {
        &mut *self.thread
    }

    pub fn target_id(&self) -> TargetId {
        self.thread.target
    }

    fn scope(&self) -> BlockScope<'_> {
        self.sequencer.runtime.scope(self.thread.target)
    }

    /* ----- frame state ----- */

    /// Frame of the block being executed
    pub fn stack_frame(&mut self) -> Option<&mut Frame> {
        self.thread.peek_stack_frame_mut()
    }

    pub fn context_value(&self, key: &str) -> Option<&Value> {
        self.thread
            .peek_stack_frame()
            .and_then(|frame| frame.execution_context.get(key))
    }

    pub fn set_context_value(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        if let Some(frame) = self.thread.peek_stack_frame_mut() {
            frame.execution_context.insert(key.into(), value.into());
        }
    }

    /* ----- scheduling ----- */

    pub fn yield_thread(&mut self) {
        self.thread.status = ThreadStatus::Yield;
    }

    pub fn yield_tick(&mut self) {
        self.thread.status = ThreadStatus::YieldTick;
    }

    pub fn start_branch(&mut self, branch_num: usize, is_loop: bool) {
        self.sequencer.step_to_branch(self.thread, branch_num, is_loop);
    }

    pub fn start_procedure(&mut self, procedure_code: &str) -> bool {
        self.sequencer.step_to_procedure(self.thread, procedure_code)
    }

    pub fn procedure_param_names_ids_and_defaults(&self, procedure_code: &str) -> Option<Rc<ProcedureParams>> {
        self.scope()
            .get_procedure_param_names_ids_and_defaults(procedure_code)
    }

    /* ----- procedure params ----- */

    pub fn init_params(&mut self) {
        self.thread.init_params();
    }

    pub fn push_param(&mut self, name: impl Into<String>, value: Value) {
        self.thread.push_param(name, value);
    }

    pub fn get_param(&self, name: &str) -> Option<Value> {
        self.thread.get_param(name).cloned()
    }

    /* ----- stack timer ----- */

    pub fn stack_timer_needs_init(&self) -> bool {
        self.thread
            .peek_stack_frame()
            .map_or(true, |frame| frame.timer.is_none())
    }

    pub fn start_stack_timer(&mut self, duration: Duration) {
        let timer = self.sequencer.runtime.clock().start_timer();
        if let Some(frame) = self.thread.peek_stack_frame_mut() {
            frame.timer = Some(timer);
            frame.duration = Some(duration);
        }
    }

    pub fn stack_timer_finished(&self) -> bool {
        match self.thread.peek_stack_frame() {
            Some(Frame {
                timer: Some(timer),
                duration,
                ..
            }) => timer.elapsed() >= duration.unwrap_or(Duration::ZERO),
            _ => true,
        }
    }

    /* ----- hats & threads ----- */

    /// Start hats from inside a primitive. The utility still refers to the
    /// same thread afterwards.
    pub fn start_hats(
        &mut self,
        opcode: &str,
        match_fields: Option<&BTreeMap<String, String>>,
        target: Option<TargetId>,
    ) -> Vec<ThreadId> {
        self.sequencer.runtime.start_hats(opcode, match_fields, target)
    }

    pub fn is_active_thread(&self, id: ThreadId) -> bool {
        self.sequencer.runtime.is_active_thread(id)
    }

    pub fn is_waiting_thread(&self, id: ThreadId) -> bool {
        self.sequencer.runtime.is_waiting_thread(id)
    }

    pub fn stop_all(&mut self) {
        self.sequencer.runtime.stop_all();
    }

    pub fn stop_other_target_threads(&mut self) {
        self.sequencer
            .runtime
            .stop_for_target(self.thread.target, Some(self.thread.id));
    }

    pub fn stop_this_script(&mut self) {
        let scope = self.sequencer.runtime.scope(self.thread.target);
        self.thread.stop_this_script(&scope);
    }

    /* ----- io, clones, redraw ----- */

    pub fn io_query(&mut self, device: &str, func: &str, args: &[Value]) -> Option<Value> {
        self.sequencer.runtime.io_query(device, func, args)
    }

    pub fn create_clone(&mut self, source: TargetId) -> Option<TargetId> {
        self.sequencer.runtime.clone_target(source)
    }

    pub fn dispose_target(&mut self, target: TargetId) {
        self.sequencer.runtime.dispose_target(target);
    }

    pub fn request_redraw(&mut self) {
        self.sequencer.runtime.request_redraw();
    }
}
