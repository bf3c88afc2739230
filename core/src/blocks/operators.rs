//! Operator reporters, using the casting rules of [`Value`]

use crate::engine::{primitive, BlockArgs, BlockPackage, BlockUtility, Primitive, Reported};
use crate::value::Value;
use std::cmp::Ordering;

pub struct Operators;

impl BlockPackage for Operators {
    fn primitives(&self) -> Vec<(&'static str, Primitive)> {
        vec![
            ("operator_add", primitive(|args, _| arithmetic(args, |a, b| a + b))),
            ("operator_subtract", primitive(|args, _| arithmetic(args, |a, b| a - b))),
            ("operator_multiply", primitive(|args, _| arithmetic(args, |a, b| a * b))),
            ("operator_divide", primitive(|args, _| arithmetic(args, |a, b| a / b))),
            ("operator_lt", primitive(|args, _| comparison(args, Ordering::Less))),
            ("operator_gt", primitive(|args, _| comparison(args, Ordering::Greater))),
            ("operator_equals", primitive(|args, _| comparison(args, Ordering::Equal))),
            ("operator_and", primitive(and)),
            ("operator_or", primitive(or)),
            ("operator_not", primitive(not)),
            ("operator_join", primitive(join)),
        ]
    }
}

fn arithmetic(args: &BlockArgs, op: impl Fn(f64, f64) -> f64) -> Reported {
    Reported::from(op(args.number("NUM1"), args.number("NUM2")))
}

fn comparison(args: &BlockArgs, expected: Ordering) -> Reported {
    let missing = Value::default();
    let a = args.get("OPERAND1").unwrap_or(&missing);
    let b = args.get("OPERAND2").unwrap_or(&missing);
    Reported::from(a.compare(b) == expected)
}

fn and(args: &BlockArgs, _: &mut BlockUtility<'_, '_>) -> Reported {
    Reported::from(args.boolean("OPERAND1") && args.boolean("OPERAND2"))
}

fn or(args: &BlockArgs, _: &mut BlockUtility<'_, '_>) -> Reported {
    Reported::from(args.boolean("OPERAND1") || args.boolean("OPERAND2"))
}

fn not(args: &BlockArgs, _: &mut BlockUtility<'_, '_>) -> Reported {
    Reported::from(!args.boolean("OPERAND"))
}

fn join(args: &BlockArgs, _: &mut BlockUtility<'_, '_>) -> Reported {
    Reported::from(format!("{}{}", args.string("STRING1"), args.string("STRING2")))
}
