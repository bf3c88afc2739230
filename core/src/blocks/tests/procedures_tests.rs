use crate::engine::tests::helpers::{
    click_report, counting_command, number, recording_command, sprite_runtime, step_frames,
};
use crate::engine::{Block, Mutation, ThreadOptions};
use crate::value::Value;

fn greet_signature() -> Mutation {
    Mutation {
        procedure_code: Some("greet %s".to_string()),
        warp: Some(false),
        arg_names: vec!["who".to_string()],
        arg_ids: vec!["arg0".to_string()],
        arg_defaults: vec![Value::from("world")],
    }
}

/// `greet %s` records its argument through an argument reporter
fn greet_definition() -> Vec<Block> {
    vec![
        Block::new("def", "procedures_definition")
            .top_level()
            .with_shadow_input("custom_block", "proto")
            .with_next("rec"),
        Block::new("proto", "procedures_prototype")
            .as_shadow()
            .with_parent("def")
            .with_mutation(greet_signature()),
        Block::new("rec", "test_record")
            .with_parent("def")
            .with_input("VALUE", "who"),
        Block::new("who", "argument_reporter_string_number")
            .with_parent("rec")
            .with_field("VALUE", "who"),
    ]
}

#[test]
fn test_call_binds_arguments() {
    let mut blocks = greet_definition();
    blocks.push(
        Block::new("call", "procedures_call")
            .top_level()
            .with_mutation(greet_signature())
            .with_shadow_input("arg0", "five")
            .with_next("call_default"),
    );
    blocks.push(number("five", 5.0).with_parent("call"));
    blocks.push(
        Block::new("call_default", "procedures_call")
            .with_parent("call")
            .with_mutation(greet_signature()),
    );
    let (mut rt, sprite) = sprite_runtime(blocks);
    let log = recording_command(&mut rt);

    rt.push_thread("call", sprite, ThreadOptions::default());
    step_frames(&mut rt, 1);

    assert_eq!(
        *log.borrow(),
        vec![Some(Value::Num(5.0)), Some(Value::from("world"))]
    );
    assert!(rt.threads().is_empty());
}

#[test]
fn test_argument_reporter_outside_procedure_is_zero() {
    let (mut rt, sprite) = sprite_runtime(vec![
        Block::new("who", "argument_reporter_string_number")
            .top_level()
            .with_field("VALUE", "who"),
    ]);

    assert_eq!(click_report(&mut rt, sprite, "who"), Some(Value::Num(0.0)));
}

#[test]
fn test_stop_this_script_returns_to_caller() {
    let (mut rt, sprite) = sprite_runtime(vec![
        Block::new("call", "procedures_call")
            .top_level()
            .with_mutation(Mutation::procedure("bail"))
            .with_next("after"),
        Block::new("after", "test_after").with_parent("call"),
        Block::new("def", "procedures_definition")
            .top_level()
            .with_shadow_input("custom_block", "proto")
            .with_next("stop"),
        Block::new("proto", "procedures_prototype")
            .as_shadow()
            .with_parent("def")
            .with_mutation(Mutation::procedure("bail")),
        Block::new("stop", "control_stop")
            .with_parent("def")
            .with_field("STOP_OPTION", "this script")
            .with_next("never"),
        Block::new("never", "test_never").with_parent("stop"),
    ]);
    let after = counting_command(&mut rt, "test_after");
    let never = counting_command(&mut rt, "test_never");

    rt.push_thread("call", sprite, ThreadOptions::default());
    step_frames(&mut rt, 1);

    assert_eq!(never.get(), 0);
    assert_eq!(after.get(), 1);
    assert!(rt.threads().is_empty());
}

#[test]
fn test_call_without_definition_is_skipped() {
    let (mut rt, sprite) = sprite_runtime(vec![
        Block::new("call", "procedures_call")
            .top_level()
            .with_mutation(Mutation::procedure("missing"))
            .with_next("after"),
        Block::new("after", "test_after").with_parent("call"),
    ]);
    let after = counting_command(&mut rt, "test_after");

    rt.push_thread("call", sprite, ThreadOptions::default());
    step_frames(&mut rt, 1);

    assert_eq!(after.get(), 1);
}

#[test]
fn test_nested_calls_see_their_own_arguments() {
    let mut blocks = greet_definition();
    blocks.extend(vec![
        Block::new("outer", "procedures_definition")
            .top_level()
            .with_shadow_input("custom_block", "outer_proto")
            .with_next("inner_call"),
        Block::new("outer_proto", "procedures_prototype")
            .as_shadow()
            .with_parent("outer")
            .with_mutation(Mutation {
                procedure_code: Some("outer %s".to_string()),
                arg_names: vec!["who".to_string()],
                arg_ids: vec!["o0".to_string()],
                ..Default::default()
            }),
        Block::new("inner_call", "procedures_call")
            .with_parent("outer")
            .with_mutation(greet_signature())
            .with_input("arg0", "outer_who")
            .with_next("outer_rec"),
        Block::new("outer_who", "operator_join")
            .with_parent("inner_call")
            .with_input("STRING1", "outer_arg")
            .with_shadow_input("STRING2", "bang"),
        Block::new("outer_arg", "argument_reporter_string_number")
            .with_parent("outer_who")
            .with_field("VALUE", "who"),
        Block::new("bang", "text")
            .as_shadow()
            .with_parent("outer_who")
            .with_field("TEXT", "!"),
        Block::new("outer_rec", "test_record")
            .with_parent("inner_call")
            .with_input("VALUE", "outer_again"),
        Block::new("outer_again", "argument_reporter_string_number")
            .with_parent("outer_rec")
            .with_field("VALUE", "who"),
        Block::new("start", "procedures_call")
            .top_level()
            .with_mutation(Mutation::procedure("outer %s"))
            .with_shadow_input("o0", "hi"),
        Block::new("hi", "text").as_shadow().with_parent("start").with_field("TEXT", "hi"),
    ]);
    let (mut rt, sprite) = sprite_runtime(blocks);
    let log = recording_command(&mut rt);

    rt.push_thread("start", sprite, ThreadOptions::default());
    step_frames(&mut rt, 1);

    assert_eq!(
        *log.borrow(),
        vec![Some(Value::from("hi!")), Some(Value::from("hi"))]
    );
}
