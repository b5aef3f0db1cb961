// src/engine/mod.rs

//! Watch engine.
//!
//! - [`core`] holds [`WatchRouter`], the pure debounce/coalesce state machine.
//! - [`runtime`] is the async shell: it receives [`RuntimeEvent`]s, sleeps
//!   until the next debounce deadline, starts isolated runs and fires the
//!   reload notifier when a `reload = true` binding completes.

pub mod core;
pub mod runtime;

use crate::pipeline::RunResult;

pub use core::{BindingId, BindingState, WatchRouter};
pub use runtime::Runtime;

/// Capacity of the runtime event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events flowing into the runtime from the watcher, finished runs and the
/// signal handler.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A path changed. Relative to the project root, forward slashes.
    PathChanged { path: String },
    /// A run started for `binding` completed.
    RunFinished { binding: BindingId, result: RunResult },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}
