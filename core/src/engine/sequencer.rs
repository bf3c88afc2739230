//! Sequencer: one scheduler tick over the thread pool
//!
//! A `Sequencer` borrows the runtime for a single tick. The thread being
//! stepped is detached from its pool slot (a shell with the same id stays
//! behind) so primitives can reach the pool through the runtime while the
//! thread itself is borrowed separately.

use super::execute::execute;
use super::runtime::Runtime;
use super::thread::{Thread, ThreadId, ThreadStatus};
use super::timer::Timer;
use std::mem;
use tracing::{debug, trace};

pub struct Sequencer<'rt> {
    pub(crate) runtime: &'rt mut Runtime,
    timer: Timer,
    /// Pool slot and id of the thread being stepped
    active: Option<(usize, ThreadId)>,
}

impl<'rt> Sequencer<'rt> {
    pub fn new(runtime: &'rt mut Runtime) -> Self {
        let timer = runtime.clock().start_timer();
        Sequencer {
            runtime,
            timer,
            active: None,
        }
    }

    pub fn runtime(&mut self) -> &mut Runtime {
        &mut *self.runtime
    }

    /// Step every runnable thread, repeatedly, until the tick's work budget
    /// runs out, nothing progresses or a redraw is due. Returns the threads
    /// that finished, removed from the pool.
    pub fn step_threads(&mut self) -> Vec<Thread> {
        let work_time = self.runtime.current_step_time().mul_f64(0.75);
        self.timer.start();

        let mut num_active_threads = usize::MAX;
        let mut ran_first_tick = false;
        let mut passes = 0usize;
        let mut done = Vec::new();

        while !self.runtime.threads.is_empty()
            && num_active_threads > 0
            && self.timer.elapsed() < work_time
            && (self.runtime.turbo_mode() || !self.runtime.redraw_requested)
        {
            num_active_threads = 0;
            let mut stopped_thread = false;

            let mut index = 0;
            while index < self.runtime.threads.len() {
                let slot = &mut self.runtime.threads[index];
                if slot.is_done() {
                    stopped_thread = true;
                    index += 1;
                    continue;
                }
                if slot.status == ThreadStatus::YieldTick && !ran_first_tick {
                    slot.status = ThreadStatus::Running;
                }

                if matches!(slot.status, ThreadStatus::Running | ThreadStatus::Yield) {
                    let shell = slot.detached_shell();
                    let mut thread = mem::replace(slot, shell);

                    self.active = Some((index, thread.id));
                    self.step_thread(&mut thread);
                    thread.warp_timer = None;
                    self.active = None;

                    self.reattach(index, thread);
                }

                match self.runtime.threads[index].status {
                    ThreadStatus::Running => num_active_threads += 1,
                    ThreadStatus::Done => stopped_thread = true,
                    _ => {}
                }
                index += 1;
            }

            ran_first_tick = true;
            passes += 1;

            // finished threads leave the pool before the next pass
            if stopped_thread {
                let (finished, live): (Vec<Thread>, Vec<Thread>) = mem::take(&mut self.runtime.threads)
                    .into_iter()
                    .partition(Thread::is_done);
                self.runtime.threads = live;
                done.extend(finished);
            }
        }

        trace!(passes, done = done.len(), "threads stepped");
        done
    }

    /// Put a stepped thread back into its slot unless the slot was
    /// restarted, or retire it if the slot was stopped meanwhile
    fn reattach(&mut self, index: usize, mut thread: Thread) {
        let slot = &mut self.runtime.threads[index];
        if slot.id != thread.id {
            debug!(thread = %thread.id, "stepped thread replaced by restart");
            return;
        }
        if slot.status == ThreadStatus::Done {
            thread.retire();
        }
        *slot = thread;
    }

    /// Whether the pool slot of the thread being stepped was stopped while
    /// it ran. A slot restarted in place is not a stop: the stepped thread
    /// keeps going until it yields and is dropped on reattach.
    pub(crate) fn active_thread_stopped(&self) -> bool {
        match self.active {
            Some((index, id)) => self
                .runtime
                .threads
                .get(index)
                .map_or(false, |slot| slot.id == id && slot.status == ThreadStatus::Done),
            None => false,
        }
    }

    fn warp_time_remaining(&self, thread: &Thread) -> bool {
        let warp_time = self.runtime.options().warp_time;
        thread
            .warp_timer
            .as_ref()
            .map_or(false, |timer| timer.elapsed() <= warp_time)
    }

    fn warp_time_exceeded(&self, thread: &Thread) -> bool {
        let warp_time = self.runtime.options().warp_time;
        thread
            .warp_timer
            .as_ref()
            .map_or(false, |timer| timer.elapsed() > warp_time)
    }

    /// Run one thread until it yields, waits or finishes
    pub fn step_thread(&mut self, thread: &mut Thread) {
        if thread.peek_stack().is_none() {
            thread.pop_stack();
            if thread.stack_len() == 0 {
                thread.status = ThreadStatus::Done;
                return;
            }
        }

        while let Some(current) = thread.peek_stack().cloned() {
            let mut warp_mode = thread.peek_stack_frame().map_or(false, |f| f.warp_mode);
            if warp_mode && thread.warp_timer.is_none() {
                thread.warp_timer = Some(self.runtime.clock().start_timer());
            }

            let depth = thread.stack_len();
            execute(self, thread);
            thread.block_glow_in_frame = Some(current.clone());

            match thread.status {
                ThreadStatus::Yield => {
                    thread.status = ThreadStatus::Running;
                    if warp_mode && self.warp_time_remaining(thread) {
                        continue;
                    }
                    return;
                }
                ThreadStatus::PromiseWait | ThreadStatus::YieldTick | ThreadStatus::Done => return,
                ThreadStatus::Running => {}
            }

            if thread.stack_len() == depth && thread.peek_stack() == Some(&current) {
                let scope = self.runtime.scope(thread.target);
                thread.go_to_next_block(&scope);
            }

            while thread.peek_stack().is_none() {
                thread.pop_stack();
                if thread.stack_len() == 0 {
                    thread.status = ThreadStatus::Done;
                    return;
                }

                let Some(frame) = thread.peek_stack_frame() else {
                    return;
                };
                warp_mode = frame.warp_mode;
                if frame.is_loop {
                    if !warp_mode || !self.warp_time_remaining(thread) {
                        return;
                    }
                    // re-run the loop block at this level
                    break;
                }
                if frame.waiting_reporter.is_some() {
                    return;
                }

                let scope = self.runtime.scope(thread.target);
                thread.go_to_next_block(&scope);
            }
        }
    }

    /// Enter branch `branch_num` of the block on top of the stack
    pub fn step_to_branch(&mut self, thread: &mut Thread, branch_num: usize, is_loop: bool) {
        let branch = thread
            .peek_stack()
            .and_then(|id| self.runtime.scope(thread.target).get_branch(id, branch_num));

        if let Some(frame) = thread.peek_stack_frame_mut() {
            frame.is_loop = is_loop;
        }
        thread.push_stack(branch);
    }

    /// Enter the definition of `procedure_code`; `false` if it has none
    pub fn step_to_procedure(&mut self, thread: &mut Thread, procedure_code: &str) -> bool {
        let scope = self.runtime.scope(thread.target);
        let Some(definition) = scope.get_procedure_definition(procedure_code) else {
            return false;
        };
        let is_recursive = thread.is_recursive_call(procedure_code, &scope);
        let do_warp = scope.procedure_warp(&definition);

        thread.push_stack(Some(definition));

        let in_warp = thread.peek_stack_frame().map_or(false, |f| f.warp_mode);
        if in_warp && self.warp_time_exceeded(thread) {
            thread.status = ThreadStatus::Yield;
        } else if do_warp {
            if thread.warp_timer.is_none() {
                thread.warp_timer = Some(self.runtime.clock().start_timer());
            }
            if let Some(frame) = thread.peek_stack_frame_mut() {
                frame.warp_mode = true;
            }
        } else if is_recursive {
            thread.status = ThreadStatus::Yield;
        }
        true
    }

    pub fn retire_thread(&mut self, thread: &mut Thread) {
        debug!(thread = %thread.id, "thread retired");
        thread.retire();
    }
}
