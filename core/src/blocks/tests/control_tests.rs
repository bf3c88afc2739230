use crate::engine::tests::helpers::{blocks_from_json, counting_command, number, sprite_runtime, step_frames, text};
use crate::engine::{
    Block, Blocks, Reported, Runtime, RuntimeEvent, Sequencer, TargetId, TargetKind, ThreadOptions, ThreadStatus,
};
use crate::value::Value;
use serde_json::json;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

fn condition(id: &str, parent: &str, value: bool) -> Block {
    Block::new(id, "test_literal")
        .as_shadow()
        .with_parent(parent)
        .with_field("BOOL", value)
}

fn run(rt: &mut Runtime, target: TargetId, top: &str) {
    rt.push_thread(top, target, ThreadOptions::default());
    step_frames(rt, 1);
}

#[test]
fn test_if_else_takes_one_branch() {
    for (value, expected_then, expected_else) in [(true, 1, 0), (false, 0, 1)] {
        let (mut rt, sprite) = sprite_runtime(vec![
            Block::new("if", "control_if_else")
                .top_level()
                .with_shadow_input("CONDITION", "cond")
                .with_input("SUBSTACK", "then")
                .with_input("SUBSTACK2", "else")
                .with_next("after"),
            condition("cond", "if", value),
            Block::new("then", "test_then").with_parent("if"),
            Block::new("else", "test_else").with_parent("if"),
            Block::new("after", "test_after").with_parent("if"),
        ]);
        let then = counting_command(&mut rt, "test_then");
        let otherwise = counting_command(&mut rt, "test_else");
        let after = counting_command(&mut rt, "test_after");

        run(&mut rt, sprite, "if");

        assert_eq!(then.get(), expected_then);
        assert_eq!(otherwise.get(), expected_else);
        assert_eq!(after.get(), 1);
    }
}

#[test]
fn test_if_with_empty_branch_continues() {
    let (mut rt, sprite) = sprite_runtime(vec![
        Block::new("if", "control_if")
            .top_level()
            .with_shadow_input("CONDITION", "cond")
            .with_next("after"),
        condition("cond", "if", true),
        Block::new("after", "test_after").with_parent("if"),
    ]);
    let after = counting_command(&mut rt, "test_after");

    run(&mut rt, sprite, "if");

    assert_eq!(after.get(), 1);
    assert!(rt.threads().is_empty());
}

#[test]
fn test_repeat_rounds_times() {
    let (mut rt, sprite) = sprite_runtime(vec![
        Block::new("repeat", "control_repeat")
            .top_level()
            .with_shadow_input("TIMES", "times")
            .with_input("SUBSTACK", "body"),
        text("times", "2.6").with_parent("repeat"),
        Block::new("body", "test_body").with_parent("repeat"),
    ]);
    let body = counting_command(&mut rt, "test_body");

    run(&mut rt, sprite, "repeat");

    assert_eq!(body.get(), 3);
}

#[test]
fn test_repeat_until_checks_before_each_iteration() {
    let (mut rt, sprite) = sprite_runtime(vec![
        Block::new("loop", "control_repeat_until")
            .top_level()
            .with_input("CONDITION", "gt")
            .with_input("SUBSTACK", "incr")
            .with_next("after"),
        Block::new("gt", "operator_gt")
            .with_parent("loop")
            .with_input("OPERAND1", "count")
            .with_shadow_input("OPERAND2", "three"),
        Block::new("count", "control_get_counter").with_parent("gt"),
        number("three", 3.0).with_parent("gt"),
        Block::new("incr", "control_incr_counter").with_parent("loop"),
        Block::new("after", "test_after").with_parent("loop"),
    ]);
    let after = counting_command(&mut rt, "test_after");

    run(&mut rt, sprite, "loop");

    assert_eq!(after.get(), 1);

    // the counter is shared by every script of the project
    rt.push_thread("count", sprite, ThreadOptions { stack_click: true, update_monitor: false });
    rt.step();
    assert!(rt.drain_events().contains(&RuntimeEvent::VisualReport {
        block_id: "count".to_string(),
        value: Value::Num(4.0),
    }));
}

#[test]
fn test_while_stops_when_condition_false() {
    let (mut rt, sprite) = sprite_runtime(vec![
        Block::new("loop", "control_while")
            .top_level()
            .with_shadow_input("CONDITION", "cond")
            .with_input("SUBSTACK", "body")
            .with_next("after"),
        condition("cond", "loop", false),
        Block::new("body", "test_body").with_parent("loop"),
        Block::new("after", "test_after").with_parent("loop"),
    ]);
    let body = counting_command(&mut rt, "test_body");
    let after = counting_command(&mut rt, "test_after");

    run(&mut rt, sprite, "loop");

    assert_eq!(body.get(), 0);
    assert_eq!(after.get(), 1);
}

#[test]
fn test_wait_yields_until_elapsed() {
    let (mut rt, sprite) = sprite_runtime(vec![
        Block::new("wait", "control_wait")
            .top_level()
            .with_shadow_input("DURATION", "secs")
            .with_next("after"),
        number("secs", 0.03).with_parent("wait"),
        Block::new("after", "test_after").with_parent("wait"),
    ]);
    let after = counting_command(&mut rt, "test_after");

    run(&mut rt, sprite, "wait");
    assert_eq!(after.get(), 0);
    assert!(rt.redraw_requested());

    step_frames(&mut rt, 1);
    assert_eq!(after.get(), 0);

    std::thread::sleep(Duration::from_millis(40));
    step_frames(&mut rt, 1);
    assert_eq!(after.get(), 1);
}

#[test]
fn test_negative_wait_does_not_block() {
    let (mut rt, sprite) = sprite_runtime(vec![
        Block::new("wait", "control_wait")
            .top_level()
            .with_shadow_input("DURATION", "secs")
            .with_next("after"),
        number("secs", -5.0).with_parent("wait"),
        Block::new("after", "test_after").with_parent("wait"),
    ]);
    let after = counting_command(&mut rt, "test_after");

    run(&mut rt, sprite, "wait");
    step_frames(&mut rt, 1);

    assert_eq!(after.get(), 1);
}

#[test]
fn test_wait_until_polls_condition() {
    let (mut rt, sprite) = sprite_runtime(vec![
        Block::new("wait", "control_wait_until")
            .top_level()
            .with_input("CONDITION", "ready")
            .with_next("after"),
        Block::new("ready", "test_ready").with_parent("wait"),
        Block::new("after", "test_after").with_parent("wait"),
    ]);
    let ready = Rc::new(Cell::new(false));
    let r = ready.clone();
    rt.registry_mut()
        .add_primitive("test_ready", move |_, _| Reported::from(r.get()));
    let after = counting_command(&mut rt, "test_after");

    run(&mut rt, sprite, "wait");
    assert_eq!(after.get(), 0);

    ready.set(true);
    step_frames(&mut rt, 1);
    assert_eq!(after.get(), 1);
}

#[test]
fn test_stop_other_scripts_spares_caller() {
    let (mut rt, sprite) = sprite_runtime(blocks_from_json(json!([
        {
            "id": "loop",
            "opcode": "control_forever",
            "topLevel": true,
            "inputs": {"SUBSTACK": {"name": "SUBSTACK", "block": "spin"}}
        },
        {"id": "spin", "opcode": "test_spin", "parent": "loop"},
        {
            "id": "stop",
            "opcode": "control_stop",
            "topLevel": true,
            "next": "after",
            "fields": {"STOP_OPTION": {"name": "STOP_OPTION", "value": "other scripts in sprite"}}
        },
        {"id": "after", "opcode": "test_after", "parent": "stop"}
    ])));
    counting_command(&mut rt, "test_spin");
    let after = counting_command(&mut rt, "test_after");

    let spinner = rt.push_thread("loop", sprite, ThreadOptions::default());
    let stopper = rt.push_thread("stop", sprite, ThreadOptions::default());
    rt.step();

    assert!(rt.thread(spinner).is_none());
    assert!(rt.thread(stopper).is_none());
    assert_eq!(after.get(), 1);
}

#[test]
fn test_stop_all_from_script() {
    let (mut rt, sprite) = sprite_runtime(vec![
        Block::new("stop", "control_stop")
            .top_level()
            .with_field("STOP_OPTION", "all")
            .with_next("after"),
        Block::new("after", "test_after").with_parent("stop"),
        Block::new("loop", "control_forever").top_level().with_input("SUBSTACK", "spin"),
        Block::new("spin", "test_spin").with_parent("loop"),
    ]);
    counting_command(&mut rt, "test_spin");
    let after = counting_command(&mut rt, "test_after");

    rt.push_thread("loop", sprite, ThreadOptions::default());
    rt.push_thread("stop", sprite, ThreadOptions::default());
    rt.step();

    assert_eq!(after.get(), 0);
    assert!(rt.threads().is_empty());
}

#[test]
fn test_stop_this_script_outside_procedure() {
    let (mut rt, sprite) = sprite_runtime(vec![
        Block::new("stop", "control_stop")
            .top_level()
            .with_field("STOP_OPTION", "this script")
            .with_next("after"),
        Block::new("after", "test_after").with_parent("stop"),
    ]);
    let after = counting_command(&mut rt, "test_after");

    let id = rt.push_thread("stop", sprite, ThreadOptions::default());
    let finished = Sequencer::new(&mut rt).step_threads();

    assert_eq!(after.get(), 0);
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].id, id);
    assert_eq!(finished[0].status, ThreadStatus::Done);
}

fn clone_scripts() -> Vec<Block> {
    vec![
        Block::new("make", "control_create_clone_of")
            .top_level()
            .with_shadow_input("CLONE_OPTION", "menu"),
        Block::new("menu", "control_create_clone_of_menu")
            .as_shadow()
            .with_parent("make")
            .with_field("CLONE_OPTION", "_myself_"),
        Block::new("hat", "control_start_as_clone").top_level().with_next("hello"),
        Block::new("hello", "test_hello").with_parent("hat").with_next("bye"),
        Block::new("bye", "control_delete_this_clone").with_parent("hello"),
    ]
}

#[test]
fn test_clone_runs_start_as_clone_then_deletes_itself() {
    let (mut rt, sprite) = sprite_runtime(clone_scripts());
    let hello = counting_command(&mut rt, "test_hello");

    run(&mut rt, sprite, "make");

    assert_eq!(hello.get(), 1);
    assert_eq!(rt.clone_count(), 0);
    assert_eq!(rt.targets().count(), 2);
    assert!(rt.threads().is_empty());
}

#[test]
fn test_delete_this_clone_ignores_originals() {
    let (mut rt, sprite) = sprite_runtime(vec![Block::new("bye", "control_delete_this_clone").top_level()]);

    run(&mut rt, sprite, "bye");

    assert!(rt.target(sprite).is_some());
}

#[test]
fn test_create_clone_of_named_sprite() {
    let (mut rt, sprite) = sprite_runtime(vec![]);
    let other = rt.add_target(
        "Cat",
        TargetKind::Sprite { is_original: true },
        Blocks::new(),
    );
    if let Some(stage) = rt.stage() {
        if let Some(blocks) = rt.blocks_of_mut(stage) {
            blocks.create_block(
                Block::new("make", "control_create_clone_of")
                    .top_level()
                    .with_field("CLONE_OPTION", "Cat"),
            );
        }
        run(&mut rt, stage, "make");
    }

    assert_eq!(rt.clone_count(), 1);
    let clone = rt.targets().last().expect("clone exists");
    assert_eq!(clone.name, "Cat");
    assert!(!clone.is_original());
    assert_ne!(clone.id, other);
    assert_ne!(clone.id, sprite);
}
