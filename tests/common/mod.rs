#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use pipewatch::fs::FileSystem;
use pipewatch::fs::mock::MockFileSystem;
use pipewatch::pipeline::ExecContext;

pub use pipewatch_test_utils::{builders, init_tracing, runnables, transforms, with_timeout};

pub const ROOT: &str = "/site";

/// Execution context over an in-memory filesystem rooted at `/site`.
pub fn mock_ctx(fs: &MockFileSystem, workers: usize) -> ExecContext {
    let fs: Arc<dyn FileSystem> = Arc::new(fs.clone());
    ExecContext::new(fs, ROOT, workers)
}

/// `/site/<rel>`
pub fn site(rel: &str) -> std::path::PathBuf {
    Path::new(ROOT).join(rel)
}

/// The small stylesheet/script tree most tests build on.
pub fn site_fs() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file(site("src/sass/main.scss"), "body { color: red }");
    fs.add_file(site("src/sass/parts/nav.scss"), "nav { margin: 0 }");
    fs.add_file(site("src/js/app.js"), "let app = 1;");
    fs.add_file(site("src/js/util.js"), "let util = 2;");
    fs.add_file(site("index.html"), "<html><body>hi</body></html>");
    fs
}
