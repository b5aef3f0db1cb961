// src/errors.rs

//! Crate-wide error types.
//!
//! [`PipewatchError`] covers everything that is fatal at startup (bad config,
//! broken pipeline composition). Run-time problems never surface as
//! `PipewatchError`; they are captured as a [`RunFailure`] inside a
//! [`RunResult`](crate::pipeline::RunResult).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipewatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid pipeline registration: a cycle or an unresolvable reference.
    #[error("Pipeline composition error: {0}")]
    Composition(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// An opaque transform step failed on a specific file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("step '{step}' failed on {}: {message}", file.display())]
pub struct TransformError {
    pub step: String,
    pub file: PathBuf,
    pub message: String,
}

impl TransformError {
    pub fn new(
        step: impl Into<String>,
        file: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            step: step.into(),
            file: file.into(),
            message: message.into(),
        }
    }
}

/// Why a task or pipeline run did not succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunFailure {
    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("filesystem error in task '{task}': {message}")]
    Filesystem { task: String, message: String },

    /// The run panicked or its worker was lost before it reported back.
    #[error("'{name}' aborted: {message}")]
    Aborted { name: String, message: String },
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PipewatchError>;
