// src/task/cache.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use blake3::Hasher;
use tracing::debug;

/// Hex blake3 digest of a file's contents.
pub fn content_hash(contents: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(contents);
    hasher.finalize().to_hex().to_string()
}

/// In-memory record of the source contents each `changed = true` task last
/// processed successfully, keyed by task name and source path.
///
/// Lives for the whole process, so a watch session only re-processes files
/// whose bytes actually differ from the previous run.
#[derive(Debug, Default)]
pub struct ChangeCache {
    hashes: HashMap<(String, PathBuf), String>,
}

impl ChangeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_unchanged(&self, task: &str, path: &Path, hash: &str) -> bool {
        self.hashes
            .get(&(task.to_string(), path.to_path_buf()))
            .is_some_and(|previous| previous == hash)
    }

    pub fn record(&mut self, task: &str, path: &Path, hash: String) {
        debug!(task, file = ?path, "recording processed content hash");
        self.hashes.insert((task.to_string(), path.to_path_buf()), hash);
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
