//! Deterministic in-process steps for task tests.

use pipewatch::errors::TransformError;
use pipewatch::task::{Asset, StepEnv, Transform};

/// ASCII-uppercases the file.
#[derive(Debug, Clone, Default)]
pub struct Uppercase;

impl Transform for Uppercase {
    fn name(&self) -> &str {
        "uppercase"
    }

    fn apply(&self, mut asset: Asset, _env: &StepEnv) -> Result<Asset, TransformError> {
        asset.contents.make_ascii_uppercase();
        Ok(asset)
    }
}

/// Fails every file whose content contains `needle`.
#[derive(Debug, Clone)]
pub struct FailOn {
    needle: String,
}

impl FailOn {
    pub fn new(needle: &str) -> Self {
        Self {
            needle: needle.to_string(),
        }
    }
}

impl Transform for FailOn {
    fn name(&self) -> &str {
        "fail-on"
    }

    fn apply(&self, asset: Asset, _env: &StepEnv) -> Result<Asset, TransformError> {
        if asset.text().contains(&self.needle) {
            return Err(TransformError::new(
                "fail-on",
                &asset.source,
                format!("found `{}`", self.needle),
            ));
        }
        Ok(asset)
    }
}

/// Panics on every file whose content contains `needle`.
#[derive(Debug, Clone)]
pub struct PanicOn {
    needle: String,
}

impl PanicOn {
    pub fn new(needle: &str) -> Self {
        Self {
            needle: needle.to_string(),
        }
    }
}

impl Transform for PanicOn {
    fn name(&self) -> &str {
        "panic-on"
    }

    fn apply(&self, asset: Asset, _env: &StepEnv) -> Result<Asset, TransformError> {
        if asset.text().contains(&self.needle) {
            panic!("panic-on step hit `{}`", self.needle);
        }
        Ok(asset)
    }
}
