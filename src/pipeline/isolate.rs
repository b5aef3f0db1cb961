// src/pipeline/isolate.rs

//! Failure isolation.
//!
//! Every member of a pipeline and every watch-triggered run is spawned as its
//! own Tokio task. A panic anywhere below that point ends only that task; the
//! join error is logged and turned into a failed [`RunResult`], so neither the
//! parent pipeline nor the watch loop ever unwinds.

use std::any::Any;
use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};
use tracing::error;

use crate::errors::RunFailure;

use super::{ExecContext, RunResult, Runnable};

/// A run spawned under isolation. Join it to get its result.
#[derive(Debug)]
pub struct IsolatedRun {
    name: String,
    handle: JoinHandle<RunResult>,
}

impl IsolatedRun {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn join(self) -> RunResult {
        match self.handle.await {
            Ok(result) => result,
            Err(err) => from_join_error(&self.name, err),
        }
    }
}

/// Start `runnable` on its own Tokio task.
pub fn spawn_isolated(runnable: Arc<dyn Runnable>, ctx: ExecContext) -> IsolatedRun {
    let name = runnable.name().to_string();
    let handle = tokio::spawn(async move { runnable.run(&ctx).await });
    IsolatedRun { name, handle }
}

/// Run `runnable` isolated and wait for it.
pub async fn run_isolated(runnable: Arc<dyn Runnable>, ctx: ExecContext) -> RunResult {
    spawn_isolated(runnable, ctx).join().await
}

/// Failed result for a run whose task panicked or was cancelled.
pub fn from_join_error(name: &str, err: JoinError) -> RunResult {
    let message = if err.is_panic() {
        format!("panicked: {}", panic_message(err.into_panic()))
    } else {
        "cancelled before completion".to_string()
    };
    aborted(name, message)
}

/// Failed result for a run that could not complete.
pub fn aborted(name: &str, message: impl Into<String>) -> RunResult {
    let message = message.into();
    error!(run = %name, %message, "run aborted");
    RunResult::failure(
        name,
        0,
        0,
        RunFailure::Aborted {
            name: name.to_string(),
            message,
        },
    )
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
