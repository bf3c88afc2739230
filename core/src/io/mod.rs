//! IO devices reachable from primitives through `io_query`

pub mod clock;

pub use clock::ClockDevice;

use crate::value::Value;

/// An external device primitives can query by function name
///
/// Unknown functions return `None`, the same as an unknown device.
pub trait IoDevice {
    fn query(&mut self, func: &str, args: &[Value]) -> Option<Value>;
}
