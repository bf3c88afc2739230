//! Control blocks: loops, conditionals, waits, stop and clones

use crate::engine::{primitive, BlockArgs, BlockPackage, BlockUtility, HatInfo, Primitive, Reported};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

const LOOP_COUNTER: &str = "loop_counter";

/* ===================== Package ===================== */

/// Control package. The counter blocks share one project-wide counter.
#[derive(Debug, Clone, Default)]
pub struct Control {
    counter: Rc<Cell<f64>>,
}

impl Control {
    pub fn counter(&self) -> f64 {
        self.counter.get()
    }
}

impl BlockPackage for Control {
    fn primitives(&self) -> Vec<(&'static str, Primitive)> {
        let get = self.counter.clone();
        let incr = self.counter.clone();
        let clear = self.counter.clone();

        vec![
            ("control_repeat", primitive(repeat)),
            ("control_repeat_until", primitive(repeat_until)),
            ("control_while", primitive(repeat_while)),
            ("control_forever", primitive(forever)),
            ("control_if", primitive(if_then)),
            ("control_if_else", primitive(if_else)),
            ("control_wait", primitive(wait)),
            ("control_wait_until", primitive(wait_until)),
            ("control_stop", primitive(stop)),
            ("control_create_clone_of", primitive(create_clone_of)),
            ("control_delete_this_clone", primitive(delete_this_clone)),
            (
                "control_get_counter",
                primitive(move |_, _| Reported::from(get.get())),
            ),
            (
                "control_incr_counter",
                primitive(move |_, _| {
                    incr.set(incr.get() + 1.0);
                    Reported::Nothing
                }),
            ),
            (
                "control_clear_counter",
                primitive(move |_, _| {
                    clear.set(0.0);
                    Reported::Nothing
                }),
            ),
        ]
    }

    fn hats(&self) -> Vec<(&'static str, HatInfo)> {
        vec![("control_start_as_clone", HatInfo::default())]
    }
}

/* ===================== Loops ===================== */

fn repeat(args: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Reported {
    let remaining = match util.context_value(LOOP_COUNTER) {
        Some(counter) => counter.to_number(),
        None => args.number("TIMES").round(),
    } - 1.0;
    util.set_context_value(LOOP_COUNTER, remaining);

    if remaining >= 0.0 {
        util.start_branch(1, true);
    }
    Reported::Nothing
}

fn repeat_until(args: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Reported {
    if !args.boolean("CONDITION") {
        util.start_branch(1, true);
    }
    Reported::Nothing
}

fn repeat_while(args: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Reported {
    if args.boolean("CONDITION") {
        util.start_branch(1, true);
    }
    Reported::Nothing
}

fn forever(_: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Reported {
    util.start_branch(1, true);
    Reported::Nothing
}

/* ===================== Conditionals ===================== */

fn if_then(args: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Reported {
    if args.boolean("CONDITION") {
        util.start_branch(1, false);
    }
    Reported::Nothing
}

fn if_else(args: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Reported {
    let branch = if args.boolean("CONDITION") { 1 } else { 2 };
    util.start_branch(branch, false);
    Reported::Nothing
}

/* ===================== Waiting ===================== */

fn wait(args: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Reported {
    if util.stack_timer_needs_init() {
        let seconds = args.number("DURATION").max(0.0);
        let duration = Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX);
        util.start_stack_timer(duration);
        util.request_redraw();
        util.yield_thread();
    } else if !util.stack_timer_finished() {
        util.yield_thread();
    }
    Reported::Nothing
}

fn wait_until(args: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Reported {
    if !args.boolean("CONDITION") {
        util.yield_thread();
    }
    Reported::Nothing
}

fn stop(args: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Reported {
    match args.string("STOP_OPTION").as_str() {
        "all" => util.stop_all(),
        "other scripts in sprite" | "other scripts in stage" => util.stop_other_target_threads(),
        "this script" => util.stop_this_script(),
        _ => {}
    }
    Reported::Nothing
}

/* ===================== Clones ===================== */

fn create_clone_of(args: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Reported {
    let option = args.string("CLONE_OPTION");
    let source = if option == "_myself_" {
        Some(util.target_id())
    } else {
        util.runtime().sprite_target_by_name(&option)
    };

    if let Some(clone) = source.and_then(|source| util.create_clone(source)) {
        util.start_hats("control_start_as_clone", None, Some(clone));
    }
    Reported::Nothing
}

fn delete_this_clone(_: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Reported {
    let target = util.target_id();
    let is_clone = util
        .runtime()
        .target(target)
        .map_or(false, |t| !t.is_original());
    if is_clone {
        util.dispose_target(target);
    }
    Reported::Nothing
}
