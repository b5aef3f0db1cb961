// src/reload/mod.rs

//! Live reload.
//!
//! [`ReloadNotifier`] is the process-wide broadcast the engine fires after a
//! `reload = true` binding completes. [`server::DevServer`] is one listener:
//! it forwards every signal to connected browsers.

pub mod server;

use tokio::sync::broadcast;
use tracing::debug;

pub use server::{DevServer, ServerConfig};

/// Buffered signals per listener before slow listeners start lagging.
const CHANNEL_CAPACITY: usize = 16;

/// "Reload now". Carries no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadSignal;

/// Fire-and-forget broadcast of [`ReloadSignal`]s.
///
/// Cloning shares the underlying channel.
#[derive(Debug, Clone)]
pub struct ReloadNotifier {
    tx: broadcast::Sender<ReloadSignal>,
}

impl Default for ReloadNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadNotifier {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadSignal> {
        self.tx.subscribe()
    }

    /// Tell every listener to reload. Returns how many were reached; `0`
    /// when nobody is listening. Never blocks.
    pub fn notify(&self) -> usize {
        let reached = self.tx.send(ReloadSignal).unwrap_or(0);
        debug!(listeners = reached, "reload signal sent");
        reached
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
