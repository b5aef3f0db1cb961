// src/pipeline/mod.rs

//! Composition of tasks into pipelines.
//!
//! - [`runnable`] defines the `Runnable` capability, `ExecContext` and
//!   `RunResult`.
//! - [`composer`] implements sequential / parallel pipelines.
//! - [`isolate`] keeps a failing or panicking run from unwinding past its
//!   caller.
//! - [`registry`] resolves names to runnables and rejects cyclic
//!   compositions.
//! - [`graph`] holds the cycle check shared by the registry and config
//!   validation.

pub mod composer;
pub mod graph;
pub mod isolate;
pub mod registry;
pub mod runnable;

pub use composer::Pipeline;
pub use isolate::{IsolatedRun, run_isolated, spawn_isolated};
pub use registry::{PipelineDef, Registry};
pub use runnable::{ExecContext, RunFuture, RunResult, Runnable, RunnableKind};
