//! Block execution engine
//!
//! Scripts are stored per target in [`Blocks`] containers owned by the
//! [`Runtime`]. Each frame the runtime settles promises, fires
//! edge-activated hats and hands the thread pool to a [`Sequencer`], which
//! steps threads through [`execute`](execute::execute) until the frame's
//! work budget is spent.

pub mod block_utility;
pub mod blocks;
pub mod cache;
pub(crate) mod execute;
pub mod primitives;
pub mod promise;
pub mod runtime;
pub mod sequencer;
pub mod target;
pub mod thread;
pub mod timer;

pub use block_utility::BlockUtility;
pub use blocks::{Block, BlockChange, BlockId, BlockMove, BlockScope, Blocks, Field, Input, Mutation, Opcode};
pub use primitives::{primitive, BlockArgs, BlockPackage, HatInfo, Primitive, Registry, Reported};
pub use promise::{promise, Promise, Resolver, Settlement};
pub use runtime::{Runtime, RuntimeEvent, RuntimeOptions, MAX_CLONES, WARP_TIME};
pub use sequencer::Sequencer;
pub use target::{Target, TargetId, TargetKind};
pub use thread::{Frame, Thread, ThreadId, ThreadOptions, ThreadStatus};
pub use timer::{Clock, Timer};

#[cfg(test)]
pub(crate) mod tests;
