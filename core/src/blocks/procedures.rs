//! Custom block definitions, calls and argument reporters

use crate::engine::{primitive, BlockArgs, BlockPackage, BlockUtility, Primitive, Reported};
use crate::value::Value;

/// Set on the call's frame once the procedure was entered, so a
/// `stop this script` that unwinds back to the call does not re-enter it
const EXECUTED: &str = "executed";

pub struct Procedures;

impl BlockPackage for Procedures {
    fn primitives(&self) -> Vec<(&'static str, Primitive)> {
        vec![
            ("procedures_definition", primitive(|_, _| Reported::Nothing)),
            ("procedures_call", primitive(call)),
            ("argument_reporter_string_number", primitive(argument_reporter)),
            ("argument_reporter_boolean", primitive(argument_reporter)),
        ]
    }
}

fn call(args: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Reported {
    if util.context_value(EXECUTED).is_some() {
        return Reported::Nothing;
    }
    let Some(code) = args
        .mutation
        .as_ref()
        .and_then(|m| m.procedure_code.clone())
    else {
        return Reported::Nothing;
    };

    // definition dragged in without its sprite: nothing to run
    let Some(params) = util.procedure_param_names_ids_and_defaults(&code) else {
        return Reported::Nothing;
    };

    util.init_params();
    for (index, (name, id)) in params.names.iter().zip(params.ids.iter()).enumerate() {
        let value = args
            .get(id)
            .cloned()
            .or_else(|| params.defaults.get(index).cloned())
            .unwrap_or_default();
        util.push_param(name.clone(), value);
    }

    util.set_context_value(EXECUTED, true);
    util.start_procedure(&code);
    Reported::Nothing
}

/// Value of the named argument in the innermost call, or 0 outside one
fn argument_reporter(args: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Reported {
    let name = args.string("VALUE");
    Reported::from(util.get_param(&name).unwrap_or(Value::Num(0.0)))
}
