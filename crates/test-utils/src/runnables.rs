//! Fake runnables that record what ran and when.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pipewatch::errors::TransformError;
use pipewatch::pipeline::{ExecContext, RunFuture, RunResult, Runnable, RunnableKind};

/// Shared, ordered log of `start:<name>` / `end:<name>` entries.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.as_str() == entry)
            .count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries.lock().unwrap().iter().position(|e| e == entry)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behaviour {
    Succeed,
    Fail,
    Panic,
}

/// A leaf runnable that sleeps (on the Tokio clock) instead of doing work.
#[derive(Debug, Clone)]
pub struct FakeRunnable {
    name: String,
    delay: Duration,
    behaviour: Behaviour,
    runs: Arc<AtomicUsize>,
    log: EventLog,
}

impl FakeRunnable {
    pub fn new(name: &str, log: &EventLog) -> Self {
        Self {
            name: name.to_string(),
            delay: Duration::ZERO,
            behaviour: Behaviour::Succeed,
            runs: Arc::new(AtomicUsize::new(0)),
            log: log.clone(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.behaviour = Behaviour::Fail;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.behaviour = Behaviour::Panic;
        self
    }

    /// Completed or started runs so far. Shared between clones.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn arc(self) -> Arc<dyn Runnable> {
        Arc::new(self)
    }
}

impl Runnable for FakeRunnable {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> RunnableKind {
        RunnableKind::Task
    }

    fn run<'a>(&'a self, _ctx: &'a ExecContext) -> RunFuture<'a> {
        Box::pin(async move {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.log.push(format!("start:{}", self.name));

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            match self.behaviour {
                Behaviour::Panic => panic!("fake runnable '{}' panicked", self.name),
                Behaviour::Fail => {
                    self.log.push(format!("end:{}", self.name));
                    RunResult::failure(
                        &self.name,
                        0,
                        1,
                        TransformError::new("fake", &self.name, "configured to fail").into(),
                    )
                }
                Behaviour::Succeed => {
                    self.log.push(format!("end:{}", self.name));
                    RunResult::success(&self.name, 1)
                }
            }
        })
    }
}
