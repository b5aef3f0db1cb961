// src/pipeline/registry.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use tracing::debug;

use crate::config::ConfigFile;
use crate::errors::{PipewatchError, Result};
use crate::task::steps::build_step;
use crate::task::{SourcePattern, Task};
use crate::types::{ExecutionMode, TargetName};

use super::graph::ensure_acyclic;
use super::{Pipeline, Runnable};

/// A pipeline as registered: members by name, resolved lazily.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDef {
    pub mode: ExecutionMode,
    pub members: Vec<TargetName>,
}

/// Name -> task / pipeline registry.
///
/// Tasks and pipelines share one namespace. Pipelines may reference members
/// that are registered later, but a registration that would make any pipeline
/// contain itself is rejected on the spot.
#[derive(Debug, Default)]
pub struct Registry {
    tasks: BTreeMap<TargetName, Arc<Task>>,
    pipelines: BTreeMap<TargetName, PipelineDef>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every task and pipeline from a validated config.
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let mut registry = Self::new();

        for (name, tc) in cfg.tasks() {
            let source = SourcePattern::new(&tc.src, &tc.exclude)
                .with_context(|| format!("compiling src for task '{name}'"))?;

            let mut steps = Vec::with_capacity(tc.steps.len());
            for step in &tc.steps {
                steps.push(
                    build_step(step).with_context(|| format!("building steps for task '{name}'"))?,
                );
            }

            let mut task = Task::new(name.clone(), source)
                .with_steps(steps)
                .only_changed(tc.changed);
            if let Some(dest) = &tc.dest {
                task = task.with_dest(dest);
            }
            if let Some(bundle) = &tc.bundle {
                task = task.with_bundle(bundle.clone());
            }

            registry.register_task(task)?;
        }

        for (name, pc) in cfg.pipelines() {
            registry.register_pipeline(name.clone(), pc.mode, pc.members.clone())?;
        }

        registry.check_references()?;
        Ok(registry)
    }

    pub fn register_task(&mut self, task: Task) -> Result<()> {
        let name = task.name().to_string();
        self.ensure_free(&name)?;
        debug!(task = %name, "registered task");
        self.tasks.insert(name, Arc::new(task));
        Ok(())
    }

    pub fn register_pipeline(
        &mut self,
        name: impl Into<TargetName>,
        mode: ExecutionMode,
        members: Vec<TargetName>,
    ) -> Result<()> {
        let name = name.into();
        self.ensure_free(&name)?;

        self.pipelines
            .insert(name.clone(), PipelineDef { mode, members });

        if let Err(err) = ensure_acyclic(&self.member_map()) {
            self.pipelines.remove(&name);
            return Err(err);
        }

        debug!(pipeline = %name, %mode, "registered pipeline");
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name) || self.pipelines.contains_key(name)
    }

    pub fn task(&self, name: &str) -> Option<&Arc<Task>> {
        self.tasks.get(name)
    }

    pub fn pipeline(&self, name: &str) -> Option<&PipelineDef> {
        self.pipelines.get(name)
    }

    /// All registered names, tasks first, each group sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks
            .keys()
            .chain(self.pipelines.keys())
            .map(|s| s.as_str())
    }

    /// Fail if any pipeline names a member that is not registered.
    pub fn check_references(&self) -> Result<()> {
        for (name, def) in &self.pipelines {
            for member in &def.members {
                if !self.contains(member) {
                    return Err(PipewatchError::Composition(format!(
                        "pipeline '{name}' references unknown member '{member}'"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Build the runnable for `name`, recursively resolving pipeline members.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Runnable>> {
        if let Some(task) = self.tasks.get(name) {
            let runnable: Arc<dyn Runnable> = task.clone();
            return Ok(runnable);
        }

        let def = self.pipelines.get(name).ok_or_else(|| {
            PipewatchError::Composition(format!("unknown task or pipeline '{name}'"))
        })?;

        let members = def
            .members
            .iter()
            .map(|member| self.resolve(member))
            .collect::<Result<Vec<_>>>()?;

        Ok(Arc::new(Pipeline::new(name, def.mode, members)))
    }

    fn ensure_free(&self, name: &str) -> Result<()> {
        if self.contains(name) {
            return Err(PipewatchError::Composition(format!(
                "'{name}' is already registered"
            )));
        }
        Ok(())
    }

    fn member_map(&self) -> BTreeMap<String, Vec<String>> {
        self.pipelines
            .iter()
            .map(|(name, def)| (name.clone(), def.members.clone()))
            .collect()
    }
}
