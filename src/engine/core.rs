// src/engine/core.rs

//! Pure watch-router state machine.
//!
//! [`WatchRouter`] owns every [`WatchBinding`] in an arena indexed by
//! [`BindingId`] and tracks, per binding, a debounce deadline and whether a
//! run is in flight. It performs no IO and spawns nothing: the async shell
//! (`engine::runtime::Runtime`) feeds it paths and clock readings and starts
//! the runs it hands back.
//!
//! Per binding:
//!
//! ```text
//!            event                 deadline            run finished
//!   Idle ----------> Debouncing -------------> Running ------------> Idle
//!                    ^   | event (re-arm)       |   ^
//!                    +---+                event |   | run finished
//!                                               v   | (follow-up starts)
//!                                       RunningWithFollowUp
//! ```

use std::fmt;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::watch::WatchBinding;

/// Index of a binding inside a [`WatchRouter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub usize);

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Observable state of one binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    Idle,
    /// Waiting for the debounce window to elapse.
    Debouncing,
    Running,
    /// Running, and at least one matching event arrived since it started.
    RunningWithFollowUp,
}

#[derive(Debug)]
struct BindingSlot {
    binding: WatchBinding,
    deadline: Option<Instant>,
    running: bool,
    rerun_pending: bool,
}

impl BindingSlot {
    fn state(&self) -> BindingState {
        match (self.running, self.rerun_pending, self.deadline) {
            (true, true, _) => BindingState::RunningWithFollowUp,
            (true, false, _) => BindingState::Running,
            (false, _, Some(_)) => BindingState::Debouncing,
            (false, _, None) => BindingState::Idle,
        }
    }
}

/// Routes filesystem changes to bindings and decides when each binding runs.
#[derive(Debug, Default)]
pub struct WatchRouter {
    slots: Vec<BindingSlot>,
}

impl WatchRouter {
    pub fn new(bindings: Vec<WatchBinding>) -> Self {
        let slots = bindings
            .into_iter()
            .map(|binding| BindingSlot {
                binding,
                deadline: None,
                running: false,
                rerun_pending: false,
            })
            .collect();
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn binding(&self, id: BindingId) -> Option<&WatchBinding> {
        self.slots.get(id.0).map(|slot| &slot.binding)
    }

    pub fn state(&self, id: BindingId) -> Option<BindingState> {
        self.slots.get(id.0).map(BindingSlot::state)
    }

    pub fn ids(&self) -> impl Iterator<Item = BindingId> + '_ {
        (0..self.slots.len()).map(BindingId)
    }

    /// No binding is debouncing or running.
    pub fn is_idle(&self) -> bool {
        self.slots
            .iter()
            .all(|slot| slot.state() == BindingState::Idle)
    }

    /// Record a change of `rel_path` observed at `now`.
    ///
    /// Every matching binding that is not running (re)arms its deadline to
    /// `now + debounce`. A matching binding that is running only remembers
    /// that a follow-up run is owed. Returns the matched bindings.
    pub fn on_filesystem_event(&mut self, rel_path: &str, now: Instant) -> Vec<BindingId> {
        let mut matched = Vec::new();

        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if !slot.binding.matches(rel_path) {
                continue;
            }
            let id = BindingId(idx);
            matched.push(id);

            if slot.running {
                slot.rerun_pending = true;
                trace!(binding = %id, path = rel_path, "change during run; follow-up owed");
            } else {
                slot.deadline = Some(now + slot.binding.debounce());
                trace!(binding = %id, path = rel_path, "debounce armed");
            }
        }

        if matched.is_empty() {
            trace!(path = rel_path, "no binding matched");
        }
        matched
    }

    /// Earliest pending debounce deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots.iter().filter_map(|slot| slot.deadline).min()
    }

    /// Bindings whose window elapsed at `now`. They are marked running; the
    /// caller must start them and report back through
    /// [`on_run_finished`](Self::on_run_finished).
    pub fn take_due(&mut self, now: Instant) -> Vec<BindingId> {
        let mut due = Vec::new();
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            match slot.deadline {
                Some(deadline) if deadline <= now => {
                    slot.deadline = None;
                    slot.running = true;
                    due.push(BindingId(idx));
                }
                _ => {}
            }
        }
        if !due.is_empty() {
            debug!(?due, "debounce elapsed");
        }
        due
    }

    /// A run of `id` completed.
    ///
    /// Returns `true` when events arrived during the run: the binding stays
    /// running and the caller must start exactly one follow-up run.
    pub fn on_run_finished(&mut self, id: BindingId) -> bool {
        let Some(slot) = self.slots.get_mut(id.0) else {
            return false;
        };

        if slot.rerun_pending {
            slot.rerun_pending = false;
            slot.running = true;
            debug!(binding = %id, "starting coalesced follow-up run");
            true
        } else {
            slot.running = false;
            false
        }
    }
}
