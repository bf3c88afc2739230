//! Tests for the execution engine
//!
//! Organized by component

pub(crate) mod helpers;
mod thread_tests;
