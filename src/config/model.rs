// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::ExecutionMode;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// workers = 4
/// debounce_ms = 200
///
/// [task.compile]
/// src = "./src/sass/**/*.scss"
/// dest = "./src/css"
/// steps = [
///   { kind = "command", cmd = "sass --stdin --style=expanded" },
///   { kind = "rename", ext = "css" },
/// ]
///
/// [pipeline.styles]
/// mode = "sequential"
/// members = ["compile", "minify"]
///
/// [[watch]]
/// pattern = "./src/sass/**/*.scss"
/// run = "styles"
/// reload = true
/// ```
///
/// All sections except `[task.*]` are optional and have defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub default: DefaultSection,

    #[serde(default)]
    pub server: ServerSection,

    /// Keys are task names.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    /// Keys are pipeline names.
    #[serde(default)]
    pub pipeline: BTreeMap<String, PipelineConfig>,

    #[serde(default)]
    pub watch: Vec<WatchConfig>,
}

/// A validated configuration. Only obtainable through
/// `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    default: DefaultSection,
    server: ServerSection,
    task: BTreeMap<String, TaskConfig>,
    pipeline: BTreeMap<String, PipelineConfig>,
    watch: Vec<WatchConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            default: raw.default,
            server: raw.server,
            task: raw.task,
            pipeline: raw.pipeline,
            watch: raw.watch,
        }
    }

    pub fn config(&self) -> &ConfigSection {
        &self.config
    }

    pub fn default_section(&self) -> &DefaultSection {
        &self.default
    }

    pub fn server(&self) -> &ServerSection {
        &self.server
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }

    pub fn pipelines(&self) -> &BTreeMap<String, PipelineConfig> {
        &self.pipeline
    }

    pub fn watches(&self) -> &[WatchConfig] {
        &self.watch
    }
}

/// `[config]` section: global runtime behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Maximum number of tasks processing files at once.
    ///
    /// `None` means "number of available CPUs".
    #[serde(default)]
    pub workers: Option<usize>,

    /// Default debounce window for `[[watch]]` bindings.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Paths the watcher never routes (build output, dependencies, VCS).
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
}

fn default_debounce_ms() -> u64 {
    200
}

fn default_ignore() -> Vec<String> {
    vec![
        "node_modules/**".to_string(),
        ".git/**".to_string(),
        "target/**".to_string(),
    ]
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            workers: None,
            debounce_ms: default_debounce_ms(),
            ignore: default_ignore(),
        }
    }
}

impl ConfigSection {
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }
}

/// `[default]` section: what the default target builds before watching.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultSection {
    #[serde(default)]
    pub run: Vec<String>,

    #[serde(default = "default_build_mode")]
    pub mode: ExecutionMode,
}

fn default_build_mode() -> ExecutionMode {
    ExecutionMode::Parallel
}

impl Default for DefaultSection {
    fn default() -> Self {
        Self {
            run: Vec::new(),
            mode: default_build_mode(),
        }
    }
}

/// `[server]` section: the live-reload development server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory served, relative to the project root.
    #[serde(default = "default_server_root")]
    pub root: String,

    /// Page logged as the entry URL.
    #[serde(default = "default_start_path")]
    pub start_path: String,

    /// Listen on all interfaces instead of loopback only.
    #[serde(default)]
    pub open_externally: bool,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_server_root() -> String {
    ".".to_string()
}

fn default_start_path() -> String {
    "index.html".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            root: default_server_root(),
            start_path: default_start_path(),
            open_externally: false,
            port: default_port(),
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Source glob, relative to the project root.
    pub src: String,

    #[serde(default)]
    pub exclude: Vec<String>,

    /// Output directory. Tasks without one only check their input.
    #[serde(default)]
    pub dest: Option<String>,

    #[serde(default)]
    pub steps: Vec<StepConfig>,

    /// Concatenate all outputs into this file inside `dest`.
    #[serde(default)]
    pub bundle: Option<String>,

    /// Skip files whose contents were already processed in this session.
    #[serde(default)]
    pub changed: bool,
}

/// One entry of `steps = [...]`, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StepConfig {
    /// `{ kind = "command", cmd = "sass --stdin", timeout_ms = 30000 }`
    ///
    /// Runs in the project root. Without `timeout_ms` the command may run
    /// for as long as it likes.
    Command {
        cmd: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    /// `{ kind = "rename", ext = "css" }`
    Rename { ext: String },
    /// `{ kind = "forbid", pattern = "console\\.log", message = "..." }`
    Forbid {
        pattern: String,
        #[serde(default)]
        message: Option<String>,
    },
}

/// `[pipeline.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub mode: ExecutionMode,

    pub members: Vec<String>,
}

/// `[[watch]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    pub pattern: String,

    #[serde(default)]
    pub exclude: Vec<String>,

    /// Task or pipeline to run on change.
    #[serde(default)]
    pub run: Option<String>,

    /// Overrides `[config].debounce_ms` for this binding.
    #[serde(default)]
    pub debounce_ms: Option<u64>,

    /// Fire a live reload once the run has completed.
    #[serde(default)]
    pub reload: bool,
}
