pub mod blocks;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod io;
pub mod project;
pub mod value;

// Re-export main types
pub use engine::{Runtime, RuntimeEvent, RuntimeOptions, Sequencer, Thread, ThreadId, ThreadStatus};
pub use error::EngineError;
pub use value::Value;
