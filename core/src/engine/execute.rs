//! Executor: one block's unit of work
//!
//! `execute` runs the block on top of a thread's stack: it evaluates the
//! block's inputs (recursively, through the same stack), calls the
//! primitive and feeds the result back into the thread. Draining a script
//! is the sequencer's job.

use super::block_utility::BlockUtility;
use super::primitives::{BlockArgs, Reported};
use super::promise::Settlement;
use super::runtime::{PendingPromise, Runtime};
use super::sequencer::Sequencer;
use super::thread::{Thread, ThreadStatus};
use crate::value::Value;
use std::mem;
use tracing::{debug, warn};

pub(crate) fn execute(seq: &mut Sequencer<'_>, thread: &mut Thread) {
    if seq.runtime.target(thread.target).is_none() {
        seq.retire_thread(thread);
        return;
    }
    let Some(block_id) = thread.peek_stack().cloned() else {
        return;
    };
    let Some(cached) = seq.runtime.scope(thread.target).get_cached(&block_id) else {
        debug!(block = %block_id, "block no longer exists");
        seq.retire_thread(thread);
        return;
    };

    let opcode = cached.opcode.as_str();
    let is_hat = seq.runtime.registry.is_hat(opcode);

    let Some(primitive) = seq.runtime.registry.primitive(opcode) else {
        // hat without a predicate: fall through into the script
        if is_hat {
            return;
        }
        match cached.literal.clone() {
            Some(literal) => handle_report(seq.runtime, thread, &block_id, opcode, false, Some(literal)),
            None => warn!(opcode, block = %block_id, "could not find implementation for opcode"),
        }
        thread.request_script_glow_in_frame = true;
        return;
    };

    /* ----- arguments ----- */

    let mut args = BlockArgs {
        values: cached.field_args.clone(),
        mutation: None,
    };
    let depth = thread.stack_len();
    let mut evaluated: Vec<(String, Option<Value>)> = Vec::new();

    for (name, child) in cached.inputs.iter() {
        let Some(child) = child else {
            continue;
        };

        let already_reported: Option<Option<Value>> = thread
            .peek_stack_frame()
            .and_then(|frame| frame.reported.get(name))
            .cloned();

        let value = match already_reported {
            Some(value) => value,
            None => {
                if let Some(frame) = thread.peek_stack_frame_mut() {
                    frame.waiting_reporter = Some(name.clone());
                }
                thread.push_stack(Some(child.clone()));
                execute(seq, thread);

                if thread.status == ThreadStatus::PromiseWait {
                    if let Some(frame) = thread.frame_mut(depth - 1) {
                        frame.reported.extend(evaluated);
                    }
                    return;
                }
                if thread.status == ThreadStatus::Done || thread.stack_len() != depth + 1 {
                    return;
                }

                if let Some(frame) = thread.frame_mut(depth - 1) {
                    frame.waiting_reporter = None;
                }
                thread.pop_stack();
                thread
                    .peek_stack_frame()
                    .and_then(|frame| frame.reported.get(name))
                    .cloned()
                    .flatten()
            }
        };

        if let Some(value) = value.clone() {
            args.values.insert(name.clone(), value);
        }
        evaluated.push((name.clone(), value));
    }

    args.mutation = cached.mutation.clone();

    /* ----- primitive ----- */

    if let Some(frame) = thread.peek_stack_frame_mut() {
        frame.reported.clear();
    }

    let reported = {
        let mut util = BlockUtility::new(seq, thread);
        primitive(&args, &mut util)
    };

    if seq.active_thread_stopped() && thread.status != ThreadStatus::Done {
        seq.retire_thread(thread);
    }

    match reported {
        Reported::Nothing => {
            if thread.status != ThreadStatus::Done {
                thread.request_script_glow_in_frame = true;
            }
            if thread.status == ThreadStatus::Running {
                handle_report(seq.runtime, thread, &block_id, opcode, is_hat, None);
            }
        }
        Reported::Value(value) => {
            if thread.status == ThreadStatus::Running {
                handle_report(seq.runtime, thread, &block_id, opcode, is_hat, Some(value));
            }
        }
        Reported::Promise(promise) => {
            if thread.status == ThreadStatus::Running {
                thread.status = ThreadStatus::PromiseWait;
            }
            seq.runtime.pending_promises.push(PendingPromise {
                thread: thread.id,
                block_id: block_id.clone(),
                opcode: opcode.to_string(),
                is_hat,
                promise,
            });
        }
    }
}

/// Deliver a block's result to the thread: the waiting parent frame, the
/// host (visual/monitor reports) and, for hats, the predicate policy
pub(crate) fn handle_report(
    runtime: &mut Runtime,
    thread: &mut Thread,
    block_id: &str,
    opcode: &str,
    is_hat: bool,
    value: Option<Value>,
) {
    thread.push_reported_value(value.clone());

    if is_hat {
        let truthy = value.as_ref().map_or(false, Value::to_bool);
        if runtime.registry.is_edge_activated_hat(opcode) {
            if thread.stack_click {
                return;
            }
            let old = runtime
                .target_mut(thread.target)
                .map_or(false, |target| target.update_edge_activated_value(block_id, truthy));
            if old || !truthy {
                thread.retire();
            }
        } else if !truthy {
            thread.retire();
        }
        return;
    }

    if let Some(value) = value {
        if thread.at_stack_top() {
            runtime.visual_report(block_id, value.clone());
            if thread.update_monitor {
                runtime.request_update_monitor(block_id, value);
            }
        }
    }
    thread.status = ThreadStatus::Running;
}

/// Resume a thread parked on `pending` now that its promise settled
pub(crate) fn resume_after_settlement(runtime: &mut Runtime, pending: PendingPromise, settlement: Settlement) {
    let Some(index) = runtime.threads.iter().position(|t| t.id == pending.thread) else {
        debug!(thread = %pending.thread, "promise settled for a thread that is gone");
        return;
    };
    if runtime.threads[index].status != ThreadStatus::PromiseWait {
        return;
    }

    let shell = runtime.threads[index].detached_shell();
    let mut thread = mem::replace(&mut runtime.threads[index], shell);

    let nested_reporter = thread
        .peek_parent_stack_frame()
        .map_or(false, |frame| frame.waiting_reporter.is_some());

    match settlement {
        Ok(value) => {
            debug!(thread = %thread.id, block = %pending.block_id, "promise resolved");
            handle_report(runtime, &mut thread, &pending.block_id, &pending.opcode, pending.is_hat, value);
        }
        Err(reason) => {
            warn!(thread = %thread.id, opcode = %pending.opcode, %reason, "primitive rejected promise");
            if nested_reporter {
                thread.push_reported_value(None);
            }
        }
    }

    if thread.status != ThreadStatus::Done {
        thread.status = ThreadStatus::Running;
        if nested_reporter {
            thread.pop_stack();
            if let Some(frame) = thread.peek_stack_frame_mut() {
                frame.waiting_reporter = None;
            }
        } else {
            advance_past_block(runtime, &mut thread);
        }
    }

    runtime.threads[index] = thread;
}

/// Pop the finished block and continue at its `next`, unwinding levels that
/// have none until a loop level (re-run) or the end of the script
fn advance_past_block(runtime: &Runtime, thread: &mut Thread) {
    let scope = runtime.scope(thread.target);
    while let Some((popped, _)) = thread.pop_stack() {
        let next = popped.and_then(|id| scope.get_next_block(&id));
        if next.is_some() {
            thread.push_stack(next);
            return;
        }
        match thread.peek_stack_frame() {
            Some(frame) if frame.is_loop => {
                thread.push_stack(None);
                return;
            }
            Some(_) => {}
            None => break,
        }
    }
    thread.status = ThreadStatus::Done;
}
