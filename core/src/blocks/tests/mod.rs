//! Tests for the built-in block packages
//!
//! Scripts are built per test and run through a real runtime.

mod control_tests;
mod procedures_tests;
