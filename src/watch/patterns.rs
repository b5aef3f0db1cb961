// src/watch/patterns.rs

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::config::ConfigFile;
use crate::errors::PipewatchError;
use crate::pipeline::{Registry, Runnable};

/// Strip the leading `./` that gulp-style patterns usually carry.
///
/// Globs are always evaluated against root-relative paths such as
/// `"src/sass/main.scss"`, which never start with `./`.
pub fn normalize_pattern(pattern: &str) -> &str {
    let mut p = pattern.trim();
    while let Some(rest) = p.strip_prefix("./") {
        p = rest;
    }
    p
}

/// Build a GlobSet from simple string patterns.
///
/// `*` and `?` do not cross `/`; use `**` for recursive matches.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(normalize_pattern(pat))
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Compiled include/exclude globs over root-relative paths.
#[derive(Clone)]
pub struct PathMatcher {
    patterns: Vec<String>,
    include: GlobSet,
    exclude: Option<GlobSet>,
}

impl fmt::Debug for PathMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathMatcher")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl PathMatcher {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let include_set = build_globset(include)?;
        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude)?)
        };

        Ok(Self {
            patterns: include.to_vec(),
            include: include_set,
            exclude: exclude_set,
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns true if `rel_path` (relative to the project root, forward
    /// slashes) is included and not excluded.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include.is_match(rel_path) {
            return false;
        }
        match &self.exclude {
            Some(exclude) => !exclude.is_match(rel_path),
            None => true,
        }
    }
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Falls back to comparing canonical paths, since watcher backends on some
/// platforms report a different absolute prefix for the same directory
/// (symlinked temp dirs on macOS, for instance).
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let to_string = |rel: &Path| rel.to_string_lossy().replace('\\', "/");

    if let Ok(rel) = path.strip_prefix(root) {
        return Some(to_string(rel));
    }

    let root_canon = root.canonicalize().ok()?;
    let path_canon = path.canonicalize().ok()?;
    path_canon
        .strip_prefix(&root_canon)
        .ok()
        .map(|rel| to_string(rel))
}

/// A rule mapping a filesystem pattern to the target that must re-run.
///
/// Bindings are created once at startup and handed to the
/// [`WatchRouter`](crate::engine::WatchRouter), which owns them from then on.
#[derive(Clone)]
pub struct WatchBinding {
    label: String,
    matcher: PathMatcher,
    target: Option<Arc<dyn Runnable>>,
    debounce: Duration,
    reload: bool,
}

impl fmt::Debug for WatchBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchBinding")
            .field("label", &self.label)
            .field("patterns", &self.matcher.patterns())
            .field("target", &self.target.as_ref().map(|t| t.name()))
            .field("debounce", &self.debounce)
            .field("reload", &self.reload)
            .finish()
    }
}

impl WatchBinding {
    pub fn new(
        matcher: PathMatcher,
        target: Option<Arc<dyn Runnable>>,
        debounce: Duration,
        reload: bool,
    ) -> Self {
        let pattern = matcher.patterns().join(", ");
        let label = match &target {
            Some(t) => format!("{pattern} -> {}", t.name()),
            None => format!("{pattern} -> reload"),
        };

        Self {
            label,
            matcher,
            target,
            debounce,
            reload,
        }
    }

    /// Human readable `pattern -> target` description used in logs.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        self.matcher.matches(rel_path)
    }

    pub fn target(&self) -> Option<&Arc<dyn Runnable>> {
        self.target.as_ref()
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Whether a completed run should fire the reload notifier.
    pub fn reload(&self) -> bool {
        self.reload
    }
}

/// Build every `[[watch]]` binding, resolving targets through `registry`.
pub fn build_bindings(
    cfg: &ConfigFile,
    registry: &Registry,
) -> std::result::Result<Vec<WatchBinding>, PipewatchError> {
    let default_debounce = cfg.config().debounce_ms;
    let mut bindings = Vec::with_capacity(cfg.watches().len());

    for watch in cfg.watches() {
        let matcher = PathMatcher::new(std::slice::from_ref(&watch.pattern), &watch.exclude)
            .with_context(|| format!("building watch binding for {}", watch.pattern))?;

        let target = match &watch.run {
            Some(name) => Some(registry.resolve(name)?),
            None => None,
        };

        let debounce = Duration::from_millis(watch.debounce_ms.unwrap_or(default_debounce));
        bindings.push(WatchBinding::new(matcher, target, debounce, watch.reload));
    }

    Ok(bindings)
}
