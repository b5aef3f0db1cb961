// src/task/source.rs

//! Source globs for tasks: which files a task reads, and the base directory
//! their output paths are relative to.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::fs::FileSystem;
use crate::watch::patterns::{PathMatcher, normalize_pattern, relative_path};

const GLOB_META: [char; 4] = ['*', '?', '[', '{'];

/// Directory prefix of a glob: every segment before the first one containing
/// a wildcard. A wildcard-free pattern names a file, so its base is the parent.
///
/// `src/sass/**/*.scss` -> `src/sass`, `src/index.html` -> `src`,
/// `**/*.html` -> `` (the project root).
pub fn glob_base(pattern: &str) -> PathBuf {
    let segments: Vec<&str> = normalize_pattern(pattern).split('/').collect();
    let mut base = PathBuf::new();

    for (i, seg) in segments.iter().enumerate() {
        if seg.contains(GLOB_META) || i + 1 == segments.len() {
            break;
        }
        if !seg.is_empty() && *seg != "." {
            base.push(seg);
        }
    }

    base
}

/// A task's compiled `src` glob plus optional excludes.
#[derive(Debug, Clone)]
pub struct SourcePattern {
    pattern: String,
    base: PathBuf,
    matcher: PathMatcher,
}

impl SourcePattern {
    pub fn new(pattern: &str, exclude: &[String]) -> Result<Self> {
        let matcher = PathMatcher::new(&[pattern.to_string()], exclude)?;
        Ok(Self {
            pattern: pattern.to_string(),
            base: glob_base(pattern),
            matcher,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Glob base relative to the project root.
    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        self.matcher.matches(rel_path)
    }

    /// Collect every file under the glob base that matches, sorted by path.
    ///
    /// An empty result is not an error. The caller is expected to have
    /// checked that the base directory exists.
    pub fn collect(&self, fs: &dyn FileSystem, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut stack = vec![root.join(&self.base)];

        while let Some(dir) = stack.pop() {
            for path in fs.read_dir(&dir)? {
                if fs.is_dir(&path) {
                    stack.push(path);
                } else if fs.is_file(&path) {
                    if let Some(rel) = relative_path(root, &path) {
                        if self.matcher.matches(&rel) {
                            files.push(path);
                        }
                    }
                }
            }
        }

        files.sort();
        Ok(files)
    }
}
