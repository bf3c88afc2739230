//! Test helpers for engine tests
//!
//! Runtimes with a single sprite, plus recording primitives

use crate::engine::{
    Block, BlockArgs, Blocks, Reported, Runtime, RuntimeEvent, RuntimeOptions, TargetId, TargetKind,
    ThreadOptions,
};
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Runtime with an empty stage and one sprite owning `blocks`. The sprite
/// is the editing target.
pub fn sprite_runtime(blocks: Vec<Block>) -> (Runtime, TargetId) {
    sprite_runtime_with(RuntimeOptions::default(), blocks)
}

pub fn sprite_runtime_with(options: RuntimeOptions, blocks: Vec<Block>) -> (Runtime, TargetId) {
    let mut runtime = Runtime::with_options(options);
    runtime.add_target("Stage", TargetKind::Stage, Blocks::new());
    let sprite = runtime.add_target(
        "Sprite1",
        TargetKind::Sprite { is_original: true },
        Blocks::from_blocks(blocks),
    );
    runtime.set_editing_target(Some(sprite));
    (runtime, sprite)
}

/// Parse block records from a JSON fixture
pub fn blocks_from_json(json: serde_json::Value) -> Vec<Block> {
    serde_json::from_value(json).expect("Fixture blocks should deserialize")
}

/// Register `opcode` as a command that counts how often it ran
pub fn counting_command(runtime: &mut Runtime, opcode: &str) -> Rc<Cell<usize>> {
    let count = Rc::new(Cell::new(0));
    let counter = count.clone();
    runtime.registry_mut().add_primitive(opcode, move |_, _| {
        counter.set(counter.get() + 1);
        Reported::Nothing
    });
    count
}

/// Register `test_record`, a command that records its `VALUE` argument
/// (`None` when the argument is missing)
pub fn recording_command(runtime: &mut Runtime) -> Rc<RefCell<Vec<Option<Value>>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    runtime
        .registry_mut()
        .add_primitive("test_record", move |args: &BlockArgs, _| {
            sink.borrow_mut().push(args.get("VALUE").cloned());
            Reported::Nothing
        });
    log
}

/// A `math_number` literal shadow
pub fn number(id: &str, n: f64) -> Block {
    Block::new(id, "math_number").as_shadow().with_field("NUM", n)
}

/// A `text` literal shadow
pub fn text(id: &str, s: &str) -> Block {
    Block::new(id, "text").as_shadow().with_field("TEXT", s)
}

/// Step `n` frames, checking the stack/frame invariant after each
pub fn step_frames(runtime: &mut Runtime, n: usize) {
    for _ in 0..n {
        runtime.step();
        assert_stacks_consistent(runtime);
    }
}

pub fn assert_stacks_consistent(runtime: &Runtime) {
    for thread in runtime.threads() {
        assert_eq!(
            thread.stack().len(),
            thread.stack_frames().len(),
            "stack and frames diverged for {}",
            thread.id
        );
    }
}

/// Evaluate the reporter `block_id` as if clicked in the editor and return
/// the value it reported
pub fn click_report(runtime: &mut Runtime, target: TargetId, block_id: &str) -> Option<Value> {
    let opts = ThreadOptions {
        stack_click: true,
        update_monitor: false,
    };
    runtime.toggle_script(block_id, target, opts);
    runtime.step();
    runtime.drain_events().into_iter().find_map(|event| match event {
        RuntimeEvent::VisualReport { block_id: id, value } if id == block_id => Some(value),
        _ => None,
    })
}
