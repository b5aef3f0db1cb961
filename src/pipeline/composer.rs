// src/pipeline/composer.rs

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::types::ExecutionMode;

use super::isolate::{run_isolated, spawn_isolated};
use super::{ExecContext, RunFuture, RunResult, Runnable, RunnableKind};

/// A named group of tasks and/or nested pipelines.
///
/// - `Sequential`: members run strictly in order. A failed member is logged
///   and the next one still runs; the aggregate still reports the failure.
/// - `Parallel`: all members start at once and the pipeline waits for every
///   one of them. A failed member never cancels its siblings.
///
/// Concurrency is bounded by the worker pool in [`ExecContext`], which only
/// leaf tasks draw from, so nesting cannot starve itself.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    mode: ExecutionMode,
    members: Vec<Arc<dyn Runnable>>,
}

impl Pipeline {
    pub fn new(
        name: impl Into<String>,
        mode: ExecutionMode,
        members: Vec<Arc<dyn Runnable>>,
    ) -> Self {
        Self {
            name: name.into(),
            mode,
            members,
        }
    }

    pub fn sequential(name: impl Into<String>, members: Vec<Arc<dyn Runnable>>) -> Self {
        Self::new(name, ExecutionMode::Sequential, members)
    }

    pub fn parallel(name: impl Into<String>, members: Vec<Arc<dyn Runnable>>) -> Self {
        Self::new(name, ExecutionMode::Parallel, members)
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn members(&self) -> &[Arc<dyn Runnable>] {
        &self.members
    }

    async fn run_sequential(&self, ctx: &ExecContext) -> Vec<RunResult> {
        let mut results = Vec::with_capacity(self.members.len());

        for member in &self.members {
            let result = run_isolated(Arc::clone(member), ctx.clone()).await;
            if !result.succeeded {
                warn!(
                    pipeline = %self.name,
                    member = %result.name,
                    "member failed; continuing with the next member"
                );
            }
            results.push(result);
        }

        results
    }

    async fn run_parallel(&self, ctx: &ExecContext) -> Vec<RunResult> {
        // Fan out first, then join in member order.
        let runs: Vec<_> = self
            .members
            .iter()
            .map(|member| spawn_isolated(Arc::clone(member), ctx.clone()))
            .collect();

        let mut results = Vec::with_capacity(runs.len());
        for run in runs {
            let result = run.join().await;
            if !result.succeeded {
                warn!(pipeline = %self.name, member = %result.name, "parallel member failed");
            }
            results.push(result);
        }

        results
    }
}

impl Runnable for Pipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> RunnableKind {
        RunnableKind::Pipeline
    }

    fn run<'a>(&'a self, ctx: &'a ExecContext) -> RunFuture<'a> {
        Box::pin(async move {
            let started = Instant::now();
            debug!(
                pipeline = %self.name,
                mode = %self.mode,
                members = self.members.len(),
                "pipeline started"
            );

            let results = match self.mode {
                ExecutionMode::Sequential => self.run_sequential(ctx).await,
                ExecutionMode::Parallel => self.run_parallel(ctx).await,
            };

            let result = RunResult::aggregate(&self.name, results);
            info!(
                pipeline = %self.name,
                succeeded = result.succeeded,
                files = result.files_processed,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "pipeline finished"
            );
            result
        })
    }
}
