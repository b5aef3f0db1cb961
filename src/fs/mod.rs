// src/fs/mod.rs

//! Filesystem seam for tasks.
//!
//! Source listing, reads and output writes all go through [`FileSystem`];
//! tests swap in [`mock::MockFileSystem`] and assert on what a run wrote.

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod mock;

pub trait FileSystem: Send + Sync + Debug {
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write an output file. Missing parent directories under `dest` are
    /// created first.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    fn is_file(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Direct children of `path`, as full paths, in no particular order.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Disk-backed [`FileSystem`].
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).with_context(|| format!("reading source {}", path.display()))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating output dir {}", parent.display()))?;
        }
        fs::write(path, contents).with_context(|| format!("writing output {}", path.display()))
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        fs::read_dir(path)
            .with_context(|| format!("listing {}", path.display()))?
            .map(|entry| {
                entry
                    .map(|e| e.path())
                    .with_context(|| format!("listing {}", path.display()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_creates_nested_output_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("dist/css/parts/nav.css");

        RealFileSystem.write(&out, b"nav{}").unwrap();

        assert!(RealFileSystem.is_file(&out));
        assert_eq!(RealFileSystem.read(&out).unwrap(), b"nav{}");
    }

    #[test]
    fn read_dir_returns_full_paths() {
        let dir = tempfile::tempdir().unwrap();
        RealFileSystem.write(&dir.path().join("a.js"), b"").unwrap();
        RealFileSystem.write(&dir.path().join("lib/b.js"), b"").unwrap();

        let mut entries = RealFileSystem.read_dir(dir.path()).unwrap();
        entries.sort();
        assert_eq!(entries, vec![dir.path().join("a.js"), dir.path().join("lib")]);
    }

    #[test]
    fn missing_source_names_the_path() {
        let err = RealFileSystem.read(Path::new("/definitely/not/here.scss")).unwrap_err();
        assert!(format!("{err:#}").contains("/definitely/not/here.scss"));
    }
}
