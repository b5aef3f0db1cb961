// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod reload;
pub mod task;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, DEFAULT_TARGET};
use crate::config::{ConfigFile, load_and_validate};
use crate::engine::{EVENT_CHANNEL_CAPACITY, Runtime, RuntimeEvent, WatchRouter};
use crate::fs::RealFileSystem;
use crate::pipeline::{ExecContext, Pipeline, Registry, RunResult, Runnable, run_isolated};
use crate::reload::{DevServer, ReloadNotifier, ServerConfig};
use crate::watch::{PathMatcher, build_bindings, spawn_watcher};

/// High-level entry point used by `main.rs`.
///
/// - A named target runs once; any failed task makes this return an error.
/// - The `default` target runs the `[default]` build once, then watches the
///   project (and serves it) until Ctrl-C.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let registry = Registry::from_config(&cfg)?;

    if args.dry_run {
        print_dry_run(&cfg, &registry);
        return Ok(());
    }

    let root = config_root_dir(&config_path);
    let ctx = ExecContext::new(
        Arc::new(RealFileSystem),
        root.clone(),
        cfg.config().effective_workers(),
    );

    if args.target != DEFAULT_TARGET {
        let target = registry.resolve(&args.target)?;
        let result = run_isolated(target, ctx).await;
        print_summary(&result);
        if !result.succeeded {
            return Err(anyhow!("target '{}' failed", args.target));
        }
        return Ok(());
    }

    run_default(&cfg, &registry, ctx, root, !args.no_server).await
}

/// Build once, then watch forever.
async fn run_default(
    cfg: &ConfigFile,
    registry: &Registry,
    ctx: ExecContext,
    root: PathBuf,
    with_server: bool,
) -> Result<()> {
    let router = WatchRouter::new(build_bindings(cfg, registry)?);

    if let Some(build) = default_build(cfg, registry)? {
        let result = run_isolated(build, ctx.clone()).await;
        print_summary(&result);
        if !result.succeeded {
            warn!("initial build failed; watching anyway");
        }
    }

    let notifier = ReloadNotifier::new();
    let server = if with_server && cfg.server().enabled {
        let config = ServerConfig::from_section(cfg.server(), &root);
        Some(DevServer::init(config, notifier.clone())?)
    } else {
        None
    };
    let server_handle = server.as_ref().map(DevServer::handle);

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(EVENT_CHANNEL_CAPACITY);

    let ignore = PathMatcher::new(&cfg.config().ignore, &[])?;
    let _watcher_handle = spawn_watcher(root, ignore, rt_tx.clone())?;

    // Ctrl-C -> graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let runtime = Runtime::new(router, ctx, notifier, rt_tx, rt_rx);

    let watching = async {
        let result = runtime.run().await;
        if let Some(handle) = server_handle {
            handle.stop(true).await;
        }
        result
    };
    let serving = async {
        match server {
            Some(server) => server.serve().await,
            None => Ok(()),
        }
    };

    let (watch_result, serve_result) = tokio::join!(watching, serving);
    watch_result?;
    serve_result?;
    Ok(())
}

/// The runnable behind `[default].run`: nothing, a single target, or an
/// implicit pipeline named `default` over several.
pub fn default_build(cfg: &ConfigFile, registry: &Registry) -> Result<Option<Arc<dyn Runnable>>> {
    let section = cfg.default_section();
    match section.run.as_slice() {
        [] => Ok(None),
        [single] => Ok(Some(registry.resolve(single)?)),
        many => {
            let mut members = Vec::with_capacity(many.len());
            for name in many {
                members.push(registry.resolve(name)?);
            }
            let pipeline: Arc<dyn Runnable> =
                Arc::new(Pipeline::new(DEFAULT_TARGET, section.mode, members));
            Ok(Some(pipeline))
        }
    }
}

/// Figure out the project root.
///
/// - If the config path has a non-empty parent (e.g. "site/Pipewatch.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Pipewatch.toml" (parent = ""),
///   we fall back to the current working directory "."
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Print a run result tree to stdout.
pub fn print_summary(result: &RunResult) {
    print!("{}", format_summary(result));
    if result.succeeded {
        info!(target_name = %result.name, files = result.files_processed, "build succeeded");
    } else {
        warn!(target_name = %result.name, failed = result.files_failed, "build failed");
    }
}

/// Indented one-line-per-result rendering used by [`print_summary`].
pub fn format_summary(result: &RunResult) -> String {
    let mut out = String::new();
    write_summary(&mut out, result, 0);
    out
}

fn write_summary(out: &mut String, result: &RunResult, depth: usize) {
    let status = if result.succeeded { "ok" } else { "FAILED" };
    out.push_str(&"  ".repeat(depth));
    out.push_str(&format!(
        "{status:<6} {} ({} files",
        result.name, result.files_processed
    ));
    if result.files_failed > 0 {
        out.push_str(&format!(", {} failed", result.files_failed));
    }
    out.push(')');
    if result.members.is_empty() {
        if let Some(err) = &result.error {
            out.push_str(&format!(": {err}"));
        }
    }
    out.push('\n');

    for member in &result.members {
        write_summary(out, member, depth + 1);
    }
}

/// Print tasks, pipelines and watch bindings without running anything.
fn print_dry_run(cfg: &ConfigFile, registry: &Registry) {
    println!("pipewatch dry-run");
    println!("  config.workers = {}", cfg.config().effective_workers());
    println!("  config.debounce_ms = {}", cfg.config().debounce_ms);
    println!();

    println!("tasks ({}):", cfg.tasks().len());
    for (name, task) in cfg.tasks() {
        println!("  - {name}");
        println!("      src: {}", task.src);
        if !task.exclude.is_empty() {
            println!("      exclude: {:?}", task.exclude);
        }
        if let Some(dest) = &task.dest {
            println!("      dest: {dest}");
        }
        for step in &task.steps {
            println!("      step: {step:?}");
        }
        if let Some(bundle) = &task.bundle {
            println!("      bundle: {bundle}");
        }
        if task.changed {
            println!("      changed: true");
        }
    }

    println!("pipelines ({}):", cfg.pipelines().len());
    for (name, pipeline) in cfg.pipelines() {
        println!("  - {name} ({}): {:?}", pipeline.mode, pipeline.members);
    }

    println!("watch ({}):", cfg.watches().len());
    for watch in cfg.watches() {
        let run = watch.run.as_deref().unwrap_or("-");
        println!(
            "  - {} -> {run}{}",
            watch.pattern,
            if watch.reload { " (reload)" } else { "" }
        );
    }

    if !cfg.default_section().run.is_empty() {
        println!(
            "default ({}): {:?}",
            cfg.default_section().mode,
            cfg.default_section().run
        );
    }

    debug!(targets = registry.names().count(), "dry-run complete (no execution)");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TransformError;

    #[test]
    fn bare_file_name_uses_current_dir() {
        let root = config_root_dir(Path::new("Pipewatch.toml"));
        assert_eq!(root, std::env::current_dir().unwrap());
        assert_eq!(
            config_root_dir(Path::new("site/Pipewatch.toml")),
            PathBuf::from("site")
        );
    }

    #[test]
    fn summary_lists_members_and_leaf_errors() {
        let failed = RunResult::failure(
            "minify",
            0,
            1,
            TransformError::new("cleancss", "/site/src/css/a.css", "bad").into(),
        );
        let result = RunResult::aggregate("styles", vec![RunResult::success("compile", 2), failed]);

        let text = format_summary(&result);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("FAILED styles (2 files, 1 failed)"));
        assert!(lines[1].starts_with("  ok     compile (2 files)"));
        assert!(lines[2].contains("step 'cleancss' failed"));
    }
}
