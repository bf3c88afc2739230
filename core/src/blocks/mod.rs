//! Built-in block packages
//!
//! Each package registers its primitives and hat metadata with the
//! runtime's [`Registry`]. Everything here is also reachable by hosts that
//! want to build a registry of their own.

pub mod control;
pub mod event;
pub mod operators;
pub mod procedures;

pub use control::Control;
pub use event::Event;
pub use operators::Operators;
pub use procedures::Procedures;

use crate::engine::Registry;

/// Register every built-in package
pub fn register_default_packages(registry: &mut Registry) {
    registry.register_package(&Control::default());
    registry.register_package(&Event);
    registry.register_package(&Operators);
    registry.register_package(&Procedures);
}

#[cfg(test)]
mod tests;
