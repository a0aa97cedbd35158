//! Graph execution engine.
//!
//! The engine turns a validated [`WorkflowDefinition`] into an
//! [`ExecutionGraph`] and drives it to completion:
//!
//! 1. **Compile**: [`Engine::compile`] builds the petgraph structure, picks
//!    the entry point, and verifies acyclicity.
//! 2. **Run**: [`Engine::run`] seeds state from schema defaults and the
//!    caller input, executes nodes in dependency order, and merges each
//!    node's partial update into the state.
//! 3. **Stream**: [`Engine::stream`] produces the same execution as a lazy
//!    event sequence with cooperative cancellation at node boundaries.
//!
//! Checkpoints are recorded per execution id into a bounded
//! [`CheckpointStore`].
//!
//! [`WorkflowDefinition`]: crate::definition::WorkflowDefinition

mod checkpoint;
mod config;
mod executor;
mod graph;
mod state;
mod stream;

pub use checkpoint::{Checkpoint, CheckpointKind, CheckpointStore, ExecutionId};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use executor::{Engine, RunOptions, RunOutcome};
pub use graph::ExecutionGraph;
pub use state::ExecutionState;
pub use stream::{EventStream, ExecutionEvent};
