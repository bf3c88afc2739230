//! Event blocks: hats and broadcasts

use crate::engine::{primitive, BlockArgs, BlockPackage, BlockUtility, HatInfo, Primitive, Reported, ThreadId};
use crate::value::Value;
use std::collections::BTreeMap;

const BROADCAST_RECEIVED: &str = "event_whenbroadcastreceived";

pub struct Event;

impl BlockPackage for Event {
    fn primitives(&self) -> Vec<(&'static str, Primitive)> {
        vec![
            ("event_whengreaterthan", primitive(when_greater_than)),
            ("event_broadcast", primitive(broadcast)),
            ("event_broadcastandwait", primitive(broadcast_and_wait)),
        ]
    }

    fn hats(&self) -> Vec<(&'static str, HatInfo)> {
        vec![
            ("event_whenflagclicked", HatInfo::restarting()),
            ("event_whenkeypressed", HatInfo::default()),
            (BROADCAST_RECEIVED, HatInfo::restarting()),
            ("event_whengreaterthan", HatInfo::edge_activated()),
        ]
    }
}

/// Predicate of `event_whengreaterthan`. Sensors come from IO devices; an
/// unregistered device never fires.
fn when_greater_than(args: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Reported {
    let value = args.number("VALUE");
    let reading = match args.string("WHENGREATERTHANMENU").to_lowercase().as_str() {
        "timer" => util.io_query("clock", "projectTimer", &[]),
        "loudness" => util.io_query("audio", "loudness", &[]),
        _ => None,
    };
    Reported::from(reading.map_or(false, |r| r.to_number() > value))
}

/// Name of the broadcast message, from the menu input or the field
fn broadcast_match_fields(args: &BlockArgs) -> Option<BTreeMap<String, String>> {
    let name = args
        .get("BROADCAST_INPUT")
        .or_else(|| args.get("BROADCAST_OPTION"))
        .map(Value::to_string)?;
    Some(BTreeMap::from([("BROADCAST_OPTION".to_string(), name)]))
}

fn broadcast(args: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Reported {
    if let Some(fields) = broadcast_match_fields(args) {
        util.start_hats(BROADCAST_RECEIVED, Some(&fields), None);
    }
    Reported::Nothing
}

fn broadcast_and_wait(args: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Reported {
    let started = util
        .stack_frame()
        .and_then(|frame| frame.triggered_threads.clone());

    let started: Vec<ThreadId> = match started {
        Some(started) => started,
        None => {
            let Some(fields) = broadcast_match_fields(args) else {
                return Reported::Nothing;
            };
            let started = util.start_hats(BROADCAST_RECEIVED, Some(&fields), None);
            if let Some(frame) = util.stack_frame() {
                frame.triggered_threads = Some(started.clone());
            }
            if started.is_empty() {
                return Reported::Nothing;
            }
            started
        }
    };

    // threads still in the pool (even finished ones) count as running
    let waiting = started.iter().any(|id| util.is_active_thread(*id));
    if waiting {
        if started.iter().all(|id| util.is_waiting_thread(*id)) {
            util.yield_tick();
        } else {
            util.yield_thread();
        }
    }
    Reported::Nothing
}
