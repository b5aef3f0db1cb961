// tests/end_to_end.rs

mod common;
use crate::common::builders::{ConfigFileBuilder, TaskConfigBuilder, WatchConfigBuilder};
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::mpsc;

use pipewatch::cli::CliArgs;
use pipewatch::config::ConfigFile;
use pipewatch::engine::{EVENT_CHANNEL_CAPACITY, Runtime, RuntimeEvent, WatchRouter};
use pipewatch::fs::RealFileSystem;
use pipewatch::pipeline::{ExecContext, Registry, Runnable, RunnableKind, run_isolated};
use pipewatch::reload::ReloadNotifier;
use pipewatch::types::ExecutionMode;
use pipewatch::watch::{PathMatcher, build_bindings, spawn_watcher};

type TestResult = Result<(), Box<dyn Error>>;

fn write(root: &Path, rel: &str, contents: &str) -> std::io::Result<()> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}

fn styles_config() -> ConfigFile {
    ConfigFileBuilder::new()
        .workers(2)
        .with_task(
            "compile",
            TaskConfigBuilder::new("./src/sass/**/*.scss")
                .dest("./src/css")
                .rename("css")
                .build(),
        )
        .with_task(
            "minify",
            TaskConfigBuilder::new("./src/css/*.css")
                .dest("./dist/css")
                .forbid("!important")
                .build(),
        )
        .with_pipeline("styles", ExecutionMode::Sequential, &["compile", "minify"])
        .with_watch(
            WatchConfigBuilder::new("./src/sass/**/*.scss")
                .run("styles")
                .debounce_ms(30)
                .reload()
                .build(),
        )
        .build()
}

#[tokio::test]
async fn stylesheet_change_rebuilds_styles_then_reloads_once() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let root = dir.path().to_path_buf();
    write(&root, "src/sass/main.scss", "body { color: red }")?;

    let cfg = styles_config();
    let registry = Registry::from_config(&cfg)?;
    let router = WatchRouter::new(build_bindings(&cfg, &registry)?);
    let ctx = ExecContext::new(Arc::new(RealFileSystem), root.clone(), 2);

    let notifier = ReloadNotifier::new();
    let mut reloads = notifier.subscribe();
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let handle = tokio::spawn(Runtime::new(router, ctx, notifier, tx.clone(), rx).run());

    tx.send(RuntimeEvent::PathChanged {
        path: "src/sass/main.scss".to_string(),
    })
    .await?;
    with_timeout(reloads.recv()).await?;

    // minify only sees compile's output if it ran after compile.
    assert_eq!(
        fs::read_to_string(root.join("dist/css/main.css"))?,
        "body { color: red }"
    );

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(matches!(reloads.try_recv(), Err(TryRecvError::Empty)));

    tx.send(RuntimeEvent::ShutdownRequested).await?;
    handle.await??;
    Ok(())
}

#[tokio::test]
async fn failing_member_does_not_block_the_rest_of_the_pipeline() -> TestResult {
    let dir = TempDir::new()?;
    let root = dir.path();
    write(root, "src/sass/main.scss", "a { color: red !important }")?;
    write(root, "src/css/legacy.css", "b { margin: 0 }")?;

    let cfg = styles_config();
    let registry = Registry::from_config(&cfg)?;
    let ctx = ExecContext::new(Arc::new(RealFileSystem), root, 2);

    let result = run_isolated(registry.resolve("styles")?, ctx).await;

    assert!(!result.succeeded);
    assert!(result.find("compile").unwrap().succeeded);
    let minify = result.find("minify").unwrap();
    assert_eq!(minify.files_processed, 1);
    assert_eq!(minify.files_failed, 1);
    assert!(root.join("dist/css/legacy.css").exists());
    assert!(!root.join("dist/css/main.css").exists());
    Ok(())
}

#[tokio::test]
async fn watcher_reports_root_relative_paths_and_skips_ignored() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let root = dir.path().to_path_buf();
    fs::create_dir_all(root.join("src/sass"))?;
    fs::create_dir_all(root.join("node_modules"))?;

    let ignore = PathMatcher::new(&["node_modules/**".to_string()], &[])?;
    let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let _watcher = spawn_watcher(&root, ignore, tx)?;

    // Give the backend a moment to register.
    tokio::time::sleep(Duration::from_millis(100)).await;
    write(&root, "node_modules/dep.js", "ignored")?;
    write(&root, "src/sass/main.scss", "body {}")?;

    let seen = with_timeout(async {
        loop {
            match rx.recv().await {
                Some(RuntimeEvent::PathChanged { path }) if path.starts_with("src/sass/") => {
                    return path;
                }
                Some(RuntimeEvent::PathChanged { path }) => {
                    assert!(!path.starts_with("node_modules/"), "ignored path routed: {path}");
                }
                Some(_) => {}
                None => panic!("watcher channel closed"),
            }
        }
    })
    .await;

    assert!(seen == "src/sass" || seen == "src/sass/main.scss", "{seen}");
    Ok(())
}

#[tokio::test]
async fn default_build_wraps_several_targets_in_one_pipeline() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_task("js", TaskConfigBuilder::new("src/js/*.js").dest("dist/js").build())
        .with_task("minify", TaskConfigBuilder::new("src/css/*.css").dest("dist/css").build())
        .with_default_run(&["js", "minify"])
        .build();
    let registry = Registry::from_config(&cfg)?;

    let build = pipewatch::default_build(&cfg, &registry)?.expect("default build");
    assert_eq!(build.name(), "default");
    assert_eq!(build.kind(), RunnableKind::Pipeline);
    Ok(())
}

fn cli(config: &Path, target: &str) -> CliArgs {
    CliArgs {
        target: target.to_string(),
        config: config.display().to_string(),
        log_level: None,
        dry_run: false,
        no_server: true,
    }
}

#[tokio::test]
async fn one_shot_target_exit_status_follows_task_outcome() -> TestResult {
    let dir = TempDir::new()?;
    let root = dir.path();
    let config = root.join("Pipewatch.toml");
    fs::write(
        &config,
        r#"
[task.js]
src = "./src/js/*.js"
dest = "./dist/js"

[task.lint]
src = "./src/js/*.js"
steps = [{ kind = "forbid", pattern = "debugger" }]
"#,
    )?;
    write(root, "src/js/app.js", "debugger;")?;

    pipewatch::run(cli(&config, "js")).await?;
    assert!(root.join("dist/js/app.js").exists());

    let err = pipewatch::run(cli(&config, "lint")).await.unwrap_err();
    assert!(err.to_string().contains("lint"));

    assert!(pipewatch::run(cli(&config, "nope")).await.is_err());
    Ok(())
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn command_steps_run_in_the_config_directory() -> TestResult {
    let dir = TempDir::new()?;
    let root = dir.path().canonicalize()?;
    let config = root.join("Pipewatch.toml");
    fs::write(
        &config,
        r#"
[task.compile]
src = "./src/sass/main.scss"
dest = "./src/css"
steps = [
  { kind = "command", cmd = "cat src/sass/_variables.scss -", timeout_ms = 10000 },
  { kind = "rename", ext = "css" },
]

[task.where]
src = "./src/sass/main.scss"
dest = "./out"
steps = [{ kind = "command", cmd = "pwd -P" }]
"#,
    )?;
    write(&root, "src/sass/_variables.scss", "$red: #f00;\n")?;
    write(&root, "src/sass/main.scss", "body { color: $red }")?;

    pipewatch::run(cli(&config, "compile")).await?;
    assert_eq!(
        fs::read_to_string(root.join("src/css/main.css"))?,
        "$red: #f00;\nbody { color: $red }"
    );

    pipewatch::run(cli(&config, "where")).await?;
    assert_eq!(
        fs::read_to_string(root.join("out/main.scss"))?.trim(),
        root.to_string_lossy()
    );
    Ok(())
}
