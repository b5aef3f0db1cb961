// src/pipeline/runnable.rs

//! The capability shared by tasks and pipelines, the context they run in and
//! the result they report.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

use crate::errors::RunFailure;
use crate::fs::FileSystem;
use crate::task::cache::ChangeCache;

/// Boxed future returned by [`Runnable::run`].
pub type RunFuture<'a> = Pin<Box<dyn Future<Output = RunResult> + Send + 'a>>;

/// Anything that can be run as a unit of a build: a [`Task`](crate::task::Task)
/// or a [`Pipeline`](super::Pipeline).
///
/// `run` never fails: every problem is folded into the returned [`RunResult`].
pub trait Runnable: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn kind(&self) -> RunnableKind;

    fn run<'a>(&'a self, ctx: &'a ExecContext) -> RunFuture<'a>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnableKind {
    Task,
    Pipeline,
}

/// Shared state every run executes against.
///
/// Cloning is cheap; all clones share the same worker pool and change cache.
#[derive(Debug, Clone)]
pub struct ExecContext {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    workers: Arc<Semaphore>,
    changes: Arc<Mutex<ChangeCache>>,
}

impl ExecContext {
    /// `workers` bounds how many leaf tasks process files at the same time.
    /// It is clamped to at least 1.
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>, workers: usize) -> Self {
        Self {
            fs,
            root: root.into(),
            workers: Arc::new(Semaphore::new(workers.max(1))),
            changes: Arc::new(Mutex::new(ChangeCache::new())),
        }
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    /// Project root every glob and output path is relative to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Wait for a free worker slot. The slot is released when the permit drops.
    pub async fn acquire_worker(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        Arc::clone(&self.workers).acquire_owned().await
    }

    pub fn available_workers(&self) -> usize {
        self.workers.available_permits()
    }

    pub fn change_cache(&self) -> &Mutex<ChangeCache> {
        &self.changes
    }
}

/// Outcome of running a task or pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub name: String,
    pub succeeded: bool,
    /// Files that went through every step (and were written, if the task has
    /// an output).
    pub files_processed: usize,
    pub files_failed: usize,
    /// First failure encountered, if any.
    pub error: Option<RunFailure>,
    /// Per-member results of a pipeline, in member order. Empty for tasks.
    pub members: Vec<RunResult>,
}

impl RunResult {
    pub fn success(name: impl Into<String>, files_processed: usize) -> Self {
        Self {
            name: name.into(),
            succeeded: true,
            files_processed,
            files_failed: 0,
            error: None,
            members: Vec::new(),
        }
    }

    pub fn failure(
        name: impl Into<String>,
        files_processed: usize,
        files_failed: usize,
        error: RunFailure,
    ) -> Self {
        Self {
            name: name.into(),
            succeeded: false,
            files_processed,
            files_failed,
            error: Some(error),
            members: Vec::new(),
        }
    }

    /// Combine member results: failed if any member failed, counts summed,
    /// first member error kept.
    pub fn aggregate(name: impl Into<String>, members: Vec<RunResult>) -> Self {
        let succeeded = members.iter().all(|m| m.succeeded);
        let files_processed = members.iter().map(|m| m.files_processed).sum();
        let files_failed = members.iter().map(|m| m.files_failed).sum();
        let error = members.iter().find_map(|m| m.error.clone());

        Self {
            name: name.into(),
            succeeded,
            files_processed,
            files_failed,
            error,
            members,
        }
    }

    /// Depth-first search for a result by name (including `self`).
    pub fn find(&self, name: &str) -> Option<&RunResult> {
        if self.name == name {
            return Some(self);
        }
        self.members.iter().find_map(|m| m.find(name))
    }

    /// Leaf results (tasks, or members without children) that failed.
    pub fn failed_leaves(&self) -> Vec<&RunResult> {
        if self.members.is_empty() {
            return if self.succeeded { Vec::new() } else { vec![self] };
        }
        self.members.iter().flat_map(|m| m.failed_leaves()).collect()
    }
}
