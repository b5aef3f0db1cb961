// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::pipeline::{ExecContext, RunResult, run_isolated};
use crate::reload::ReloadNotifier;

use super::core::{BindingId, WatchRouter};
use super::RuntimeEvent;

/// Drives the [`WatchRouter`] in response to [`RuntimeEvent`]s and debounce
/// deadlines, and runs binding targets under failure isolation.
///
/// Runs execute on their own Tokio tasks and report back through the same
/// event channel, so the loop never blocks on a build.
pub struct Runtime {
    router: WatchRouter,
    ctx: ExecContext,
    notifier: ReloadNotifier,
    event_tx: mpsc::Sender<RuntimeEvent>,
    event_rx: mpsc::Receiver<RuntimeEvent>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// `event_tx` must feed `event_rx`; the runtime uses it to report
    /// finished runs to itself.
    pub fn new(
        router: WatchRouter,
        ctx: ExecContext,
        notifier: ReloadNotifier,
        event_tx: mpsc::Sender<RuntimeEvent>,
        event_rx: mpsc::Receiver<RuntimeEvent>,
    ) -> Self {
        Self {
            router,
            ctx,
            notifier,
            event_tx,
            event_rx,
        }
    }

    /// Main event loop. Returns after `ShutdownRequested`.
    pub async fn run(mut self) -> Result<()> {
        info!(bindings = self.router.len(), "watching for changes");

        loop {
            let deadline = self.router.next_deadline();

            tokio::select! {
                maybe_event = self.event_rx.recv() => {
                    let Some(event) = maybe_event else {
                        info!("runtime event channel closed; exiting");
                        break;
                    };
                    if !self.handle_event(event) {
                        break;
                    }
                }
                _ = wait_until(deadline) => {
                    self.start_due(Instant::now());
                }
            }
        }

        info!("runtime exiting");
        Ok(())
    }

    /// Returns `false` when the loop should stop.
    fn handle_event(&mut self, event: RuntimeEvent) -> bool {
        match event {
            RuntimeEvent::PathChanged { path } => {
                let matched = self.router.on_filesystem_event(&path, Instant::now());
                if !matched.is_empty() {
                    debug!(%path, ?matched, "change routed");
                }
                true
            }
            RuntimeEvent::RunFinished { binding, result } => {
                self.finish_run(binding, result);
                true
            }
            RuntimeEvent::ShutdownRequested => {
                info!("shutdown requested");
                false
            }
        }
    }

    fn start_due(&mut self, now: Instant) {
        for id in self.router.take_due(now) {
            self.start_run(id);
        }
    }

    fn finish_run(&mut self, id: BindingId, result: RunResult) {
        let Some(binding) = self.router.binding(id) else {
            warn!(binding = %id, "run finished for unknown binding");
            return;
        };

        if result.succeeded {
            info!(
                binding = %binding.label(),
                files = result.files_processed,
                "rebuild finished"
            );
        } else {
            warn!(
                binding = %binding.label(),
                failed = result.files_failed,
                "rebuild finished with errors"
            );
        }

        if binding.reload() {
            self.notifier.notify();
        }

        if self.router.on_run_finished(id) {
            self.start_run(id);
        }
    }

    fn start_run(&self, id: BindingId) {
        let Some(binding) = self.router.binding(id) else {
            return;
        };

        let label = binding.label().to_string();
        let target = binding.target().cloned();
        let ctx = self.ctx.clone();
        let tx = self.event_tx.clone();

        debug!(binding = %label, "starting run");
        tokio::spawn(async move {
            let result = match target {
                Some(target) => run_isolated(target, ctx).await,
                None => RunResult::success(label, 0),
            };
            if tx
                .send(RuntimeEvent::RunFinished { binding: id, result })
                .await
                .is_err()
            {
                debug!(binding = %id, "runtime gone before run finished");
            }
        });
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
