//! Tests for thread stack and frame bookkeeping

use crate::engine::{
    Block, BlockScope, Blocks, Mutation, TargetId, Thread, ThreadId, ThreadOptions, ThreadStatus,
};
use crate::value::Value;

fn thread() -> Thread {
    Thread::new(ThreadId(1), "top", TargetId::new(), ThreadOptions::default())
}

#[test]
fn test_push_and_pop_keep_stacks_aligned() {
    let mut t = thread();
    t.push_stack(Some("a".to_string()));
    t.push_stack(None);
    t.push_stack(Some("b".to_string()));
    assert_eq!(t.stack().len(), 3);
    assert_eq!(t.stack_frames().len(), 3);

    t.reuse_stack_for_next_block(Some("c".to_string()));
    assert_eq!(t.peek_stack().map(String::as_str), Some("c"));
    assert_eq!(t.stack_frames().len(), 3);

    while t.pop_stack().is_some() {
        assert_eq!(t.stack().len(), t.stack_frames().len());
    }
    assert!(t.is_done());
    assert!(t.pop_stack().is_none());
}

#[test]
fn test_placeholder_peeks_as_none() {
    let mut t = thread();
    t.push_stack(Some("a".to_string()));
    t.push_stack(None);

    assert_eq!(t.peek_stack(), None);
    assert_eq!(t.stack_len(), 2);
    assert!(!t.is_done());
}

#[test]
fn test_new_frames_inherit_warp_mode() {
    let mut t = thread();
    t.push_stack(Some("a".to_string()));
    t.peek_stack_frame_mut().unwrap().warp_mode = true;

    t.push_stack(Some("b".to_string()));
    assert!(t.peek_stack_frame().unwrap().warp_mode);
}

#[test]
fn test_reuse_resets_frame_but_keeps_warp() {
    let mut t = thread();
    t.push_stack(Some("a".to_string()));
    {
        let frame = t.peek_stack_frame_mut().unwrap();
        frame.warp_mode = true;
        frame.is_loop = true;
        frame.waiting_reporter = Some("X".to_string());
        frame.execution_context.insert("loop_counter".to_string(), Value::Num(2.0));
    }

    t.reuse_stack_for_next_block(Some("b".to_string()));
    let frame = t.peek_stack_frame().unwrap();
    assert!(frame.warp_mode);
    assert!(!frame.is_loop);
    assert!(frame.waiting_reporter.is_none());
    assert!(frame.execution_context.is_empty());
}

#[test]
fn test_push_reported_value_goes_to_waiting_parent() {
    let mut t = thread();
    t.push_stack(Some("say".to_string()));
    t.peek_stack_frame_mut().unwrap().waiting_reporter = Some("MESSAGE".to_string());
    t.push_stack(Some("join".to_string()));

    t.push_reported_value(Some(Value::from("hello")));

    let parent = t.peek_parent_stack_frame().unwrap();
    assert_eq!(
        parent.reported.get("MESSAGE"),
        Some(&Some(Value::from("hello")))
    );
}

#[test]
fn test_push_reported_value_without_parent_is_ignored() {
    let mut t = thread();
    t.push_stack(Some("say".to_string()));
    t.push_reported_value(Some(Value::Num(1.0)));
    assert!(t.peek_stack_frame().unwrap().reported.is_empty());
}

#[test]
fn test_get_param_stops_at_innermost_invocation() {
    let mut t = thread();
    t.push_stack(Some("outer_call".to_string()));
    t.init_params();
    t.push_param("x", Value::Num(1.0));
    t.push_param("y", Value::Num(2.0));

    t.push_stack(Some("inner_call".to_string()));
    t.init_params();
    t.push_param("x", Value::Num(10.0));

    t.push_stack(Some("body".to_string()));
    assert_eq!(t.get_param("x"), Some(&Value::Num(10.0)));
    // the inner call has no "y"; the outer value is out of reach
    assert_eq!(t.get_param("y"), None);

    t.pop_stack();
    t.pop_stack();
    assert_eq!(t.get_param("y"), Some(&Value::Num(2.0)));
}

#[test]
fn test_get_param_outside_procedure() {
    let mut t = thread();
    t.push_stack(Some("a".to_string()));
    assert_eq!(t.get_param("x"), None);
}

fn procedure_blocks() -> Blocks {
    Blocks::from_blocks(vec![
        Block::new("call_a", "procedures_call").with_mutation(Mutation::procedure("a")),
        Block::new("call_b", "procedures_call").with_mutation(Mutation::procedure("b")),
        Block::new("move", "motion_movesteps"),
    ])
}

#[test]
fn test_is_recursive_call() {
    let blocks = procedure_blocks();
    let flyout = Blocks::new();
    let scope = BlockScope::new(Some(&blocks), &flyout);

    let mut t = thread();
    t.push_stack(Some("call_a".to_string()));
    t.push_stack(Some("move".to_string()));
    t.push_stack(Some("call_b".to_string()));

    assert!(t.is_recursive_call("a", &scope));
    // the top level does not count
    assert!(!t.is_recursive_call("b", &scope));
    assert!(!t.is_recursive_call("c", &scope));
}

#[test]
fn test_is_recursive_call_looks_five_levels_deep() {
    let blocks = procedure_blocks();
    let flyout = Blocks::new();
    let scope = BlockScope::new(Some(&blocks), &flyout);

    let mut t = thread();
    t.push_stack(Some("call_a".to_string()));
    for _ in 0..5 {
        t.push_stack(Some("move".to_string()));
    }
    t.push_stack(Some("move".to_string()));

    assert!(!t.is_recursive_call("a", &scope));
}

#[test]
fn test_stop_this_script_unwinds_to_call() {
    let blocks = procedure_blocks();
    let flyout = Blocks::new();
    let scope = BlockScope::new(Some(&blocks), &flyout);

    let mut t = thread();
    t.push_stack(Some("move".to_string()));
    t.push_stack(Some("call_a".to_string()));
    t.push_stack(Some("move".to_string()));
    t.push_stack(Some("move".to_string()));

    t.stop_this_script(&scope);
    assert_eq!(t.peek_stack().map(String::as_str), Some("call_a"));
    assert_eq!(t.stack_len(), 2);
    assert_ne!(t.status, ThreadStatus::Done);
}

#[test]
fn test_stop_this_script_outside_procedure_finishes() {
    let blocks = procedure_blocks();
    let flyout = Blocks::new();
    let scope = BlockScope::new(Some(&blocks), &flyout);

    let mut t = thread();
    t.push_stack(Some("move".to_string()));
    t.push_stack(Some("move".to_string()));
    t.request_script_glow_in_frame = true;

    t.stop_this_script(&scope);
    assert_eq!(t.status, ThreadStatus::Done);
    assert_eq!(t.stack_len(), 0);
    assert!(!t.request_script_glow_in_frame);
}

#[test]
fn test_retire_clears_everything() {
    let mut t = thread();
    t.push_stack(Some("a".to_string()));
    t.push_stack(Some("b".to_string()));
    t.block_glow_in_frame = Some("b".to_string());

    t.retire();
    assert_eq!(t.status, ThreadStatus::Done);
    assert!(t.stack().is_empty());
    assert!(t.stack_frames().is_empty());
    assert!(t.block_glow_in_frame.is_none());
}
