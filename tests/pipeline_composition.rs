// tests/pipeline_composition.rs

mod common;
use crate::common::builders::{ConfigFileBuilder, TaskConfigBuilder};
use crate::common::runnables::{EventLog, FakeRunnable};
use crate::common::transforms::FailOn;
use crate::common::{init_tracing, mock_ctx, site, site_fs};

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use pipewatch::errors::PipewatchError;
use pipewatch::pipeline::{Pipeline, Registry, Runnable, RunnableKind, run_isolated};
use pipewatch::task::{SourcePattern, Task};
use pipewatch::types::ExecutionMode;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test(start_paused = true)]
async fn sequential_runs_next_member_after_a_failure() -> TestResult {
    init_tracing();
    let log = EventLog::new();
    let a = FakeRunnable::new("a", &log).with_delay(Duration::from_millis(50)).failing();
    let b = FakeRunnable::new("b", &log).with_delay(Duration::from_millis(10));

    let pipeline = Pipeline::sequential("ab", vec![a.clone().arc(), b.clone().arc()]);
    let result = pipeline.run(&mock_ctx(&site_fs(), 4)).await;

    assert_eq!(log.entries(), vec!["start:a", "end:a", "start:b", "end:b"]);
    assert!(!result.succeeded);
    assert!(!result.find("a").unwrap().succeeded);
    assert!(result.find("b").unwrap().succeeded);
    assert_eq!(b.runs(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn parallel_members_overlap_and_all_complete() -> TestResult {
    let log = EventLog::new();
    let a = FakeRunnable::new("a", &log).with_delay(Duration::from_millis(100)).failing();
    let b = FakeRunnable::new("b", &log).with_delay(Duration::from_millis(30));

    let pipeline = Pipeline::parallel("ab", vec![a.arc(), b.arc()]);
    let result = pipeline.run(&mock_ctx(&site_fs(), 4)).await;

    // b finished while a was still running.
    assert!(log.position("end:b").unwrap() < log.position("end:a").unwrap());
    assert!(log.position("start:b").unwrap() < log.position("end:a").unwrap());

    assert!(!result.succeeded);
    // Member results keep declaration order.
    let names: Vec<&str> = result.members.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert!(result.members[1].succeeded);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn panicking_member_does_not_take_down_siblings() -> TestResult {
    init_tracing();
    let log = EventLog::new();
    let boom = FakeRunnable::new("boom", &log).panicking();
    let ok = FakeRunnable::new("ok", &log).with_delay(Duration::from_millis(20));

    for pipeline in [
        Pipeline::parallel("p", vec![boom.clone().arc(), ok.clone().arc()]),
        Pipeline::sequential("s", vec![boom.clone().arc(), ok.clone().arc()]),
    ] {
        let result = pipeline.run(&mock_ctx(&site_fs(), 2)).await;
        assert!(!result.succeeded);
        assert!(result.find("ok").unwrap().succeeded);
    }
    assert_eq!(ok.runs(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn nested_failure_propagates_to_the_outer_aggregate() -> TestResult {
    let log = EventLog::new();
    let inner = Pipeline::parallel(
        "inner",
        vec![
            FakeRunnable::new("x", &log).arc(),
            FakeRunnable::new("y", &log).failing().arc(),
        ],
    );
    let inner: Arc<dyn Runnable> = Arc::new(inner);
    let outer = Pipeline::sequential("outer", vec![FakeRunnable::new("first", &log).arc(), inner]);

    let result = outer.run(&mock_ctx(&site_fs(), 2)).await;

    assert!(!result.succeeded);
    let failed: Vec<&str> = result.failed_leaves().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(failed, vec!["y"]);
    assert_eq!(result.files_processed, 2);
    Ok(())
}

#[tokio::test]
async fn parallel_failure_keeps_sibling_output() -> TestResult {
    let fs = site_fs();
    let ctx = mock_ctx(&fs, 2);

    let compile = Task::new("compile", SourcePattern::new("src/sass/**/*.scss", &[])?)
        .with_dest("src/css");
    let js = Task::new("js", SourcePattern::new("src/js/*.js", &[])?)
        .with_dest("dist/js")
        .with_step(Arc::new(FailOn::new("util")));

    let members: Vec<Arc<dyn Runnable>> = vec![Arc::new(js), Arc::new(compile)];
    let pipeline: Arc<dyn Runnable> = Arc::new(Pipeline::parallel("build", members));
    let result = run_isolated(pipeline, ctx).await;

    assert!(!result.succeeded);
    assert!(result.find("compile").unwrap().succeeded);
    assert_eq!(
        fs.contents(site("src/css/main.scss")).as_deref(),
        Some("body { color: red }")
    );
    assert!(fs.contents(site("dist/js/app.js")).is_some());
    Ok(())
}

#[test]
fn registering_a_self_containing_pipeline_fails() -> TestResult {
    let mut registry = Registry::new();
    registry.register_task(Task::new("compile", SourcePattern::new("src/**/*.scss", &[])?))?;
    registry.register_pipeline(
        "a",
        ExecutionMode::Sequential,
        vec!["compile".into(), "b".into()],
    )?;

    let err = registry
        .register_pipeline("b", ExecutionMode::Parallel, vec!["a".into()])
        .unwrap_err();
    assert!(matches!(err, PipewatchError::Composition(_)));

    // The rejected registration left nothing behind.
    assert!(!registry.contains("b"));
    assert!(registry.resolve("a").is_err());
    Ok(())
}

#[test]
fn direct_self_reference_fails() -> TestResult {
    let mut registry = Registry::new();
    let err = registry
        .register_pipeline("loop", ExecutionMode::Sequential, vec!["loop".into()])
        .unwrap_err();
    assert!(matches!(err, PipewatchError::Composition(_)));
    Ok(())
}

#[test]
fn registry_resolves_nested_pipelines_from_config() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_task(
            "compile",
            TaskConfigBuilder::new("src/sass/**/*.scss")
                .dest("src/css")
                .rename("css")
                .build(),
        )
        .with_task(
            "minify",
            TaskConfigBuilder::new("src/css/*.css").dest("dist/css").build(),
        )
        .with_task("js", TaskConfigBuilder::new("src/js/*.js").dest("dist/js").build())
        .with_pipeline("styles", ExecutionMode::Sequential, &["compile", "minify"])
        .with_pipeline("all", ExecutionMode::Parallel, &["styles", "js"])
        .build();

    let registry = Registry::from_config(&cfg)?;
    let all = registry.resolve("all")?;
    assert_eq!(all.kind(), RunnableKind::Pipeline);
    assert_eq!(registry.resolve("minify")?.kind(), RunnableKind::Task);
    assert!(matches!(
        registry.resolve("missing").unwrap_err(),
        PipewatchError::Composition(_)
    ));
    Ok(())
}

#[test]
fn config_with_mutually_nested_pipelines_is_rejected() {
    let err = ConfigFileBuilder::new()
        .with_task("compile", TaskConfigBuilder::new("src/sass/**/*.scss").build())
        .with_pipeline("styles", ExecutionMode::Sequential, &["compile", "all"])
        .with_pipeline("all", ExecutionMode::Parallel, &["styles"])
        .try_build()
        .unwrap_err();
    assert!(matches!(err, PipewatchError::Composition(_)), "{err}");
}
