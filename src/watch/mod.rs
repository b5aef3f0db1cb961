// src/watch/mod.rs

//! File watching.
//!
//! This module is responsible for:
//! - Compiling `[[watch]]` patterns into [`WatchBinding`]s.
//! - Wiring up a cross-platform filesystem watcher (`notify`) that turns
//!   changes into root-relative paths for the router.
//!
//! It does not decide what runs; that is the engine's job.

pub mod patterns;
pub mod watcher;

pub use patterns::{PathMatcher, WatchBinding, build_bindings, relative_path};
pub use watcher::{WatcherHandle, spawn_watcher};
