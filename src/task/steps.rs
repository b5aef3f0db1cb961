// src/task/steps.rs

//! Transform steps.
//!
//! A step is an opaque `(file, content) -> content` function. The heavy
//! lifting (Sass, autoprefixer, imagemin, terser, ...) lives in external tools
//! reached through [`CommandStep`]; the other built-ins cover the plumbing a
//! gulp pipeline does in-process.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::runtime::Handle;
use tracing::warn;

use crate::config::StepConfig;
use crate::errors::TransformError;

/// Environment variable carrying the source path to command steps.
pub const FILE_ENV_VAR: &str = "PIPEWATCH_FILE";

/// One file flowing through a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Where the file was read from.
    pub source: PathBuf,
    /// Output path relative to the task's `dest` (initially relative to the
    /// glob base). Steps may rename it.
    pub rel_path: PathBuf,
    pub contents: Vec<u8>,
}

impl Asset {
    pub fn new(source: impl Into<PathBuf>, rel_path: impl Into<PathBuf>, contents: Vec<u8>) -> Self {
        Self {
            source: source.into(),
            rel_path: rel_path.into(),
            contents,
        }
    }

    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.contents)
    }
}

/// What a step may rely on besides the file itself.
///
/// Steps run on a blocking thread; `block_on` drives async work (child
/// processes) on the runtime that owns the task.
#[derive(Debug, Clone)]
pub struct StepEnv {
    root: PathBuf,
    runtime: Handle,
}

impl StepEnv {
    pub fn new(root: impl Into<PathBuf>, runtime: Handle) -> Self {
        Self {
            root: root.into(),
            runtime,
        }
    }

    /// Project root; external commands run with it as working directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Must not be called from inside an async context.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

/// An opaque transform applied to every file of a task, in declared order.
pub trait Transform: Send + Sync + fmt::Debug {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    fn apply(&self, asset: Asset, env: &StepEnv) -> std::result::Result<Asset, TransformError>;
}

/// Pipe the file through an external shell command (stdin -> stdout).
#[derive(Debug, Clone)]
pub struct CommandStep {
    label: String,
    cmd: String,
    timeout: Option<Duration>,
}

impl CommandStep {
    pub fn new(cmd: impl Into<String>) -> Self {
        let cmd = cmd.into();
        let label = cmd
            .split_whitespace()
            .next()
            .unwrap_or("command")
            .to_string();
        Self {
            label,
            cmd,
            timeout: None,
        }
    }

    /// Kill the command if it has not exited after `limit`.
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    fn shell(&self, workdir: &Path) -> Command {
        let mut c = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };
        c.current_dir(workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        c
    }

    async fn pipe(
        &self,
        source: &Path,
        input: Vec<u8>,
        workdir: &Path,
    ) -> std::result::Result<Vec<u8>, String> {
        let mut child = self
            .shell(workdir)
            .env(FILE_ENV_VAR, source)
            .spawn()
            .map_err(|e| format!("spawning `{}` in {}: {e}", self.cmd, workdir.display()))?;

        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // Commands that ignore stdin close it early; that is fine.
                let _ = stdin.write_all(&input).await;
            }
        };
        let run = async move {
            let (output, ()) = tokio::join!(child.wait_with_output(), feed);
            output
        };

        let output = match self.timeout {
            // Dropping `run` drops the child, which kills it.
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
                format!("`{}` killed after {}ms without exiting", self.cmd, limit.as_millis())
            })?,
            None => run.await,
        }
        .map_err(|e| format!("waiting for `{}`: {e}", self.cmd))?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "`{}` exited with code {code}: {}",
                self.cmd,
                stderr.trim()
            ));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            warn!(step = %self.label, file = %source.display(), "{}", stderr.trim_end());
        }

        Ok(output.stdout)
    }
}

impl Transform for CommandStep {
    fn name(&self) -> &str {
        &self.label
    }

    fn apply(&self, mut asset: Asset, env: &StepEnv) -> std::result::Result<Asset, TransformError> {
        let input = std::mem::take(&mut asset.contents);
        match env.block_on(self.pipe(&asset.source, input, env.root())) {
            Ok(stdout) => {
                asset.contents = stdout;
                Ok(asset)
            }
            Err(message) => Err(TransformError::new(&self.label, &asset.source, message)),
        }
    }
}

/// Replace the output file extension (e.g. `.scss` -> `.css`).
#[derive(Debug, Clone)]
pub struct RenameStep {
    ext: String,
}

impl RenameStep {
    pub fn new(ext: impl Into<String>) -> Self {
        let ext = ext.into();
        Self {
            ext: ext.trim_start_matches('.').to_string(),
        }
    }
}

impl Transform for RenameStep {
    fn name(&self) -> &str {
        "rename"
    }

    fn apply(&self, mut asset: Asset, _env: &StepEnv) -> std::result::Result<Asset, TransformError> {
        asset.rel_path.set_extension(&self.ext);
        Ok(asset)
    }
}

/// Lint step: fail the file when its content matches a regex.
#[derive(Debug, Clone)]
pub struct ForbidStep {
    pattern: Regex,
    message: Option<String>,
}

impl ForbidStep {
    pub fn new(pattern: &str, message: Option<String>) -> Result<Self> {
        let pattern =
            Regex::new(pattern).with_context(|| format!("invalid forbid pattern: {pattern}"))?;
        Ok(Self { pattern, message })
    }
}

impl Transform for ForbidStep {
    fn name(&self) -> &str {
        "forbid"
    }

    fn apply(&self, asset: Asset, _env: &StepEnv) -> std::result::Result<Asset, TransformError> {
        let found = {
            let text = asset.text();
            self.pattern.find(&text).map(|m| {
                let line = text[..m.start()].matches('\n').count() + 1;
                (line, m.as_str().to_string())
            })
        };

        match found {
            None => Ok(asset),
            Some((line, matched)) => {
                let reason = match &self.message {
                    Some(msg) => msg.clone(),
                    None => format!("forbidden pattern `{}` matched `{matched}`", self.pattern),
                };
                Err(TransformError::new(
                    "forbid",
                    &asset.source,
                    format!("line {line}: {reason}"),
                ))
            }
        }
    }
}

/// Build a step from its `[task.<name>].steps` entry.
pub fn build_step(config: &StepConfig) -> Result<Arc<dyn Transform>> {
    let step: Arc<dyn Transform> = match config {
        StepConfig::Command { cmd, timeout_ms } => {
            if cmd.trim().is_empty() {
                bail!("command step has an empty `cmd`");
            }
            let step = CommandStep::new(cmd.clone());
            match timeout_ms {
                Some(0) => bail!("command step `{cmd}` has a zero `timeout_ms`"),
                Some(ms) => Arc::new(step.with_timeout(Duration::from_millis(*ms))),
                None => Arc::new(step),
            }
        }
        StepConfig::Rename { ext } => {
            if ext.trim_start_matches('.').is_empty() {
                bail!("rename step has an empty `ext`");
            }
            Arc::new(RenameStep::new(ext.clone()))
        }
        StepConfig::Forbid { pattern, message } => {
            Arc::new(ForbidStep::new(pattern, message.clone())?)
        }
    };
    Ok(step)
}
