#![allow(dead_code)]

use std::collections::BTreeMap;

use pipewatch::config::{
    ConfigFile, ConfigSection, DefaultSection, PipelineConfig, RawConfigFile, ServerSection,
    StepConfig, TaskConfig, WatchConfig,
};
use pipewatch::errors::Result;
use pipewatch::types::ExecutionMode;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                default: DefaultSection::default(),
                server: ServerSection::default(),
                task: BTreeMap::new(),
                pipeline: BTreeMap::new(),
                watch: Vec::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_pipeline(mut self, name: &str, mode: ExecutionMode, members: &[&str]) -> Self {
        self.config.pipeline.insert(
            name.to_string(),
            PipelineConfig {
                mode,
                members: members.iter().map(|m| m.to_string()).collect(),
            },
        );
        self
    }

    pub fn with_watch(mut self, watch: WatchConfig) -> Self {
        self.config.watch.push(watch);
        self
    }

    pub fn with_default_run(mut self, targets: &[&str]) -> Self {
        self.config.default.run = targets.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.config.workers = Some(workers);
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.config.debounce_ms = ms;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(src: &str) -> Self {
        Self {
            task: TaskConfig {
                src: src.to_string(),
                exclude: Vec::new(),
                dest: None,
                steps: Vec::new(),
                bundle: None,
                changed: false,
            },
        }
    }

    pub fn dest(mut self, dest: &str) -> Self {
        self.task.dest = Some(dest.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.task.exclude.push(pattern.to_string());
        self
    }

    pub fn command(mut self, cmd: &str) -> Self {
        self.task.steps.push(StepConfig::Command {
            cmd: cmd.to_string(),
            timeout_ms: None,
        });
        self
    }

    pub fn rename(mut self, ext: &str) -> Self {
        self.task.steps.push(StepConfig::Rename {
            ext: ext.to_string(),
        });
        self
    }

    pub fn forbid(mut self, pattern: &str) -> Self {
        self.task.steps.push(StepConfig::Forbid {
            pattern: pattern.to_string(),
            message: None,
        });
        self
    }

    pub fn bundle(mut self, file_name: &str) -> Self {
        self.task.bundle = Some(file_name.to_string());
        self
    }

    pub fn changed(mut self, val: bool) -> Self {
        self.task.changed = val;
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Builder for a `[[watch]]` entry.
pub struct WatchConfigBuilder {
    watch: WatchConfig,
}

impl WatchConfigBuilder {
    pub fn new(pattern: &str) -> Self {
        Self {
            watch: WatchConfig {
                pattern: pattern.to_string(),
                exclude: Vec::new(),
                run: None,
                debounce_ms: None,
                reload: false,
            },
        }
    }

    pub fn run(mut self, target: &str) -> Self {
        self.watch.run = Some(target.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.watch.exclude.push(pattern.to_string());
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.watch.debounce_ms = Some(ms);
        self
    }

    pub fn reload(mut self) -> Self {
        self.watch.reload = true;
        self
    }

    pub fn build(self) -> WatchConfig {
        self.watch
    }
}
