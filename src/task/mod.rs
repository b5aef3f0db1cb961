// src/task/mod.rs

//! Tasks: read the files matching a glob, run them through an ordered list of
//! transform steps, write the results.
//!
//! - [`source`] compiles the `src` glob and walks the filesystem.
//! - [`steps`] holds the [`Transform`] trait and the built-in steps.
//! - [`cache`] backs `changed = true` tasks.
//!
//! A file that fails a step is logged and counted, and the task moves on to
//! the next file. The task as a whole then reports `succeeded = false`.

pub mod cache;
pub mod source;
pub mod steps;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::errors::RunFailure;
use crate::pipeline::isolate;
use crate::pipeline::{ExecContext, RunFuture, RunResult, Runnable, RunnableKind};

pub use source::SourcePattern;
pub use steps::{Asset, CommandStep, ForbidStep, RenameStep, StepEnv, Transform};

use cache::content_hash;

/// A named build step: `src` glob -> steps -> `dest`.
#[derive(Debug, Clone)]
pub struct Task {
    name: String,
    source: SourcePattern,
    steps: Vec<Arc<dyn Transform>>,
    dest: Option<PathBuf>,
    bundle: Option<String>,
    only_changed: bool,
}

impl Task {
    pub fn new(name: impl Into<String>, source: SourcePattern) -> Self {
        Self {
            name: name.into(),
            source,
            steps: Vec::new(),
            dest: None,
            bundle: None,
            only_changed: false,
        }
    }

    /// Output directory, relative to the project root.
    pub fn with_dest(mut self, dest: impl Into<PathBuf>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    pub fn with_step(mut self, step: Arc<dyn Transform>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_steps(mut self, steps: impl IntoIterator<Item = Arc<dyn Transform>>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Concatenate every transformed file into `dest/<file_name>`.
    pub fn with_bundle(mut self, file_name: impl Into<String>) -> Self {
        self.bundle = Some(file_name.into());
        self
    }

    /// Skip files whose contents this task already processed successfully.
    pub fn only_changed(mut self, enabled: bool) -> Self {
        self.only_changed = enabled;
        self
    }

    pub fn source(&self) -> &SourcePattern {
        &self.source
    }

    pub fn dest(&self) -> Option<&Path> {
        self.dest.as_deref()
    }

    pub fn steps(&self) -> &[Arc<dyn Transform>] {
        &self.steps
    }

    pub fn bundle(&self) -> Option<&str> {
        self.bundle.as_deref()
    }

    /// Process every matching file. Blocking; callers run it off the async
    /// executor, on a thread where `runtime.block_on` is allowed.
    pub fn process(&self, ctx: &ExecContext, runtime: Handle) -> RunResult {
        let env = StepEnv::new(ctx.root(), runtime);
        let base_dir = ctx.root().join(self.source.base());

        if !ctx.fs().is_dir(&base_dir) {
            let failure = RunFailure::Filesystem {
                task: self.name.clone(),
                message: format!("source directory {:?} does not exist", base_dir),
            };
            error!(task = %self.name, dir = ?base_dir, "source directory missing");
            return RunResult::failure(&self.name, 0, 0, failure);
        }

        let files = match self.source.collect(ctx.fs(), ctx.root()) {
            Ok(files) => files,
            Err(err) => {
                error!(task = %self.name, error = %err, "failed to list source files");
                let failure = RunFailure::Filesystem {
                    task: self.name.clone(),
                    message: format!("{err:#}"),
                };
                return RunResult::failure(&self.name, 0, 0, failure);
            }
        };

        if files.is_empty() {
            debug!(task = %self.name, pattern = %self.source.pattern(), "no files matched");
            return RunResult::success(&self.name, 0);
        }

        let mut processed = 0;
        let mut skipped = 0;
        let mut failed = 0;
        let mut first_error: Option<RunFailure> = None;
        let mut bundled: Vec<Asset> = Vec::new();

        for path in &files {
            match self.process_file(ctx, &env, &base_dir, path) {
                Ok(FileOutcome::Processed(asset)) => {
                    processed += 1;
                    if self.bundle.is_some() {
                        bundled.push(asset);
                    }
                }
                Ok(FileOutcome::Unchanged) => skipped += 1,
                Err(failure) => {
                    error!(
                        task = %self.name,
                        file = %path.display(),
                        error = %failure,
                        "file failed; continuing with remaining files"
                    );
                    failed += 1;
                    first_error.get_or_insert(failure);
                }
            }
        }

        if let Some(bundle) = &self.bundle {
            if let Err(failure) = self.write_bundle(ctx, bundle, &bundled) {
                error!(task = %self.name, bundle = %bundle, error = %failure, "bundle write failed");
                first_error.get_or_insert(failure);
            }
        }

        if skipped > 0 {
            debug!(task = %self.name, skipped, "unchanged files skipped");
        }

        match first_error {
            None => RunResult::success(&self.name, processed),
            Some(failure) => RunResult::failure(&self.name, processed, failed, failure),
        }
    }

    fn process_file(
        &self,
        ctx: &ExecContext,
        env: &StepEnv,
        base_dir: &Path,
        path: &Path,
    ) -> Result<FileOutcome, RunFailure> {
        let contents = ctx.fs().read(path).map_err(|err| self.fs_failure(&err))?;

        let hash = if self.only_changed {
            let hash = content_hash(&contents);
            if self.cache_says_unchanged(ctx, path, &hash) {
                return Ok(FileOutcome::Unchanged);
            }
            Some(hash)
        } else {
            None
        };

        let rel = path.strip_prefix(base_dir).unwrap_or(path);
        let mut asset = Asset::new(path, rel, contents);

        for step in &self.steps {
            asset = step.apply(asset, env)?;
        }

        if self.bundle.is_none() {
            if let Some(dest) = &self.dest {
                let out = ctx.root().join(dest).join(&asset.rel_path);
                ctx.fs()
                    .write(&out, &asset.contents)
                    .map_err(|err| self.fs_failure(&err))?;
                debug!(task = %self.name, file = %path.display(), out = %out.display(), "wrote output");
            }
        }

        if let Some(hash) = hash {
            match ctx.change_cache().lock() {
                Ok(mut cache) => cache.record(&self.name, path, hash),
                Err(_) => warn!(task = %self.name, "change cache mutex poisoned; not recording"),
            }
        }

        Ok(FileOutcome::Processed(asset))
    }

    fn cache_says_unchanged(&self, ctx: &ExecContext, path: &Path, hash: &str) -> bool {
        match ctx.change_cache().lock() {
            Ok(cache) => cache.is_unchanged(&self.name, path, hash),
            Err(_) => {
                warn!(task = %self.name, "change cache mutex poisoned; processing anyway");
                false
            }
        }
    }

    fn write_bundle(
        &self,
        ctx: &ExecContext,
        bundle: &str,
        assets: &[Asset],
    ) -> Result<(), RunFailure> {
        let Some(dest) = &self.dest else {
            return Ok(());
        };

        let mut out = Vec::new();
        for (i, asset) in assets.iter().enumerate() {
            if i > 0 {
                out.push(b'\n');
            }
            out.extend_from_slice(&asset.contents);
        }

        let path = ctx.root().join(dest).join(bundle);
        ctx.fs()
            .write(&path, &out)
            .map_err(|err| self.fs_failure(&err))?;
        debug!(task = %self.name, out = %path.display(), files = assets.len(), "wrote bundle");
        Ok(())
    }

    fn fs_failure(&self, err: &anyhow::Error) -> RunFailure {
        RunFailure::Filesystem {
            task: self.name.clone(),
            message: format!("{err:#}"),
        }
    }
}

enum FileOutcome {
    Processed(Asset),
    Unchanged,
}

impl Runnable for Task {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> RunnableKind {
        RunnableKind::Task
    }

    fn run<'a>(&'a self, ctx: &'a ExecContext) -> RunFuture<'a> {
        Box::pin(async move {
            let permit = match ctx.acquire_worker().await {
                Ok(permit) => permit,
                Err(err) => return isolate::aborted(&self.name, err.to_string()),
            };

            let started = Instant::now();
            info!(task = %self.name, pattern = %self.source.pattern(), "task started");

            let task = self.clone();
            let blocking_ctx = ctx.clone();
            let runtime = Handle::current();
            let joined = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                task.process(&blocking_ctx, runtime)
            })
            .await;

            let result = match joined {
                Ok(result) => result,
                Err(err) => isolate::from_join_error(&self.name, err),
            };

            let elapsed_ms = started.elapsed().as_millis() as u64;
            if result.succeeded {
                info!(
                    task = %self.name,
                    files = result.files_processed,
                    elapsed_ms,
                    "task finished"
                );
            } else {
                warn!(
                    task = %self.name,
                    files = result.files_processed,
                    failed = result.files_failed,
                    elapsed_ms,
                    "task finished with errors"
                );
            }

            result
        })
    }
}
