// src/config/validate.rs

use std::collections::BTreeMap;

use crate::cli::DEFAULT_TARGET;
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{PipewatchError, Result};
use crate::pipeline::graph::ensure_acyclic;
use crate::task::SourcePattern;
use crate::task::steps::build_step;
use crate::watch::patterns::build_globset;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::PipewatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_names(cfg)?;
    validate_tasks(cfg)?;
    validate_pipelines(cfg)?;
    validate_watches(cfg)?;
    validate_default(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(PipewatchError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.workers == Some(0) {
        return Err(PipewatchError::ConfigError(
            "[config].workers must be >= 1 (got 0)".to_string(),
        ));
    }

    build_globset(&cfg.config.ignore)
        .map_err(|e| PipewatchError::ConfigError(format!("[config].ignore: {e:#}")))?;

    Ok(())
}

fn validate_names(cfg: &RawConfigFile) -> Result<()> {
    for name in cfg.task.keys().chain(cfg.pipeline.keys()) {
        if name == DEFAULT_TARGET {
            return Err(PipewatchError::ConfigError(format!(
                "'{DEFAULT_TARGET}' is reserved; use the [default] section instead"
            )));
        }
    }

    for name in cfg.pipeline.keys() {
        if cfg.task.contains_key(name) {
            return Err(PipewatchError::ConfigError(format!(
                "'{name}' is defined both as a task and as a pipeline"
            )));
        }
    }
    Ok(())
}

fn validate_tasks(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        SourcePattern::new(&task.src, &task.exclude).map_err(|e| {
            PipewatchError::ConfigError(format!("task '{name}' has an invalid glob: {e:#}"))
        })?;

        for step in &task.steps {
            build_step(step).map_err(|e| {
                PipewatchError::ConfigError(format!("task '{name}' has an invalid step: {e:#}"))
            })?;
        }

        if task.bundle.is_some() {
            if task.dest.is_none() {
                return Err(PipewatchError::ConfigError(format!(
                    "task '{name}' sets `bundle` but has no `dest`"
                )));
            }
            if task.changed {
                return Err(PipewatchError::ConfigError(format!(
                    "task '{name}' cannot combine `bundle` with `changed = true`"
                )));
            }
        }
    }
    Ok(())
}

fn validate_pipelines(cfg: &RawConfigFile) -> Result<()> {
    let mut graph: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (name, pipeline) in cfg.pipeline.iter() {
        if pipeline.members.is_empty() {
            return Err(PipewatchError::ConfigError(format!(
                "pipeline '{name}' has no members"
            )));
        }
        for member in &pipeline.members {
            if !is_known_target(cfg, member) {
                return Err(PipewatchError::Composition(format!(
                    "pipeline '{name}' references unknown target '{member}'"
                )));
            }
        }
        graph.insert(name.clone(), pipeline.members.clone());
    }

    ensure_acyclic(&graph)
}

fn validate_watches(cfg: &RawConfigFile) -> Result<()> {
    for watch in &cfg.watch {
        let mut globs = vec![watch.pattern.clone()];
        globs.extend(watch.exclude.iter().cloned());
        build_globset(&globs).map_err(|e| {
            PipewatchError::ConfigError(format!("watch '{}': {e:#}", watch.pattern))
        })?;

        match &watch.run {
            Some(target) if !is_known_target(cfg, target) => {
                return Err(PipewatchError::Composition(format!(
                    "watch '{}' runs unknown target '{target}'",
                    watch.pattern
                )));
            }
            None if !watch.reload => {
                return Err(PipewatchError::ConfigError(format!(
                    "watch '{}' needs `run`, `reload = true`, or both",
                    watch.pattern
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_default(cfg: &RawConfigFile) -> Result<()> {
    for target in &cfg.default.run {
        if !is_known_target(cfg, target) {
            return Err(PipewatchError::Composition(format!(
                "[default].run references unknown target '{target}'"
            )));
        }
    }
    Ok(())
}

fn is_known_target(cfg: &RawConfigFile, name: &str) -> bool {
    cfg.task.contains_key(name) || cfg.pipeline.contains_key(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_str;
    use crate::types::ExecutionMode;

    fn validate(toml: &str) -> Result<ConfigFile> {
        ConfigFile::try_from(parse_str(toml)?)
    }

    const BASE: &str = r#"
        [task.compile]
        src = "./src/sass/**/*.scss"
        dest = "./src/css"

        [task.minify]
        src = "./src/css/*.css"
        dest = "./dist/css"
    "#;

    #[test]
    fn defaults_are_applied() {
        let cfg = validate(BASE).unwrap();
        assert_eq!(cfg.config().debounce_ms, 200);
        assert!(cfg.config().workers.is_none());
        assert!(cfg.server().enabled);
        assert_eq!(cfg.server().port, 3000);
        assert!(cfg.default_section().run.is_empty());
    }

    #[test]
    fn empty_config_is_rejected() {
        let err = validate("").unwrap_err();
        assert!(matches!(err, PipewatchError::ConfigError(_)));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let toml = format!("[config]\nworkers = 0\n{BASE}");
        assert!(matches!(
            validate(&toml).unwrap_err(),
            PipewatchError::ConfigError(_)
        ));
    }

    #[test]
    fn pipeline_with_unknown_member_is_a_composition_error() {
        let toml = format!("{BASE}\n[pipeline.styles]\nmembers = [\"compile\", \"nope\"]\n");
        assert!(matches!(
            validate(&toml).unwrap_err(),
            PipewatchError::Composition(_)
        ));
    }

    #[test]
    fn pipeline_cycle_is_a_composition_error() {
        let toml = format!(
            "{BASE}\n[pipeline.a]\nmembers = [\"compile\", \"b\"]\n[pipeline.b]\nmembers = [\"a\"]\n"
        );
        assert!(matches!(
            validate(&toml).unwrap_err(),
            PipewatchError::Composition(_)
        ));
    }

    #[test]
    fn name_shared_by_task_and_pipeline_is_rejected() {
        let toml = format!("{BASE}\n[pipeline.compile]\nmembers = [\"minify\"]\n");
        assert!(matches!(
            validate(&toml).unwrap_err(),
            PipewatchError::ConfigError(_)
        ));
    }

    #[test]
    fn watch_without_run_or_reload_is_rejected() {
        let toml = format!("{BASE}\n[[watch]]\npattern = \"**/*.html\"\n");
        assert!(matches!(
            validate(&toml).unwrap_err(),
            PipewatchError::ConfigError(_)
        ));
    }

    #[test]
    fn bundle_requires_dest() {
        let toml = r#"
            [task.concat]
            src = "src/js/*.js"
            bundle = "app.js"
        "#;
        assert!(matches!(
            validate(toml).unwrap_err(),
            PipewatchError::ConfigError(_)
        ));
    }

    #[test]
    fn unknown_step_kind_fails_to_parse() {
        let toml = r#"
            [task.compile]
            src = "src/**/*.scss"
            steps = [{ kind = "teleport" }]
        "#;
        assert!(matches!(
            validate(toml).unwrap_err(),
            PipewatchError::TomlError(_)
        ));
    }

    #[test]
    fn pipeline_mode_accepts_series() {
        let toml = format!(
            "{BASE}\n[pipeline.styles]\nmode = \"series\"\nmembers = [\"compile\", \"minify\"]\n"
        );
        let cfg = validate(&toml).unwrap();
        assert_eq!(cfg.pipelines()["styles"].mode, ExecutionMode::Sequential);
    }

    #[test]
    fn zero_command_timeout_is_rejected() {
        let toml = r#"
            [task.imagemin]
            src = "src/image/**/*"
            dest = "dist/image"
            steps = [{ kind = "command", cmd = "imagemin", timeout_ms = 0 }]
        "#;
        assert!(matches!(
            validate(toml).unwrap_err(),
            PipewatchError::ConfigError(_)
        ));
    }
}
