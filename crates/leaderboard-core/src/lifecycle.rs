//! Process lifecycle shared by the consumer, snapshot writer, and query server.
//!
//! Phases only move forward:
//!
//! ```text
//! Running -> Draining -> Finalizing -> Stopped
//! ```
//!
//! - `Running`: all components active.
//! - `Draining`: the consumer stops pulling, queries answer 503.
//! - `Finalizing`: the snapshot writer takes the final snapshot.
//! - `Stopped`: every component has exited.
//!
//! The current phase lives in a [`watch`] channel so tasks can both poll it
//! and await a transition.

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::info;

/// Lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Normal operation.
    Running,
    /// Shutdown requested; no new work is accepted.
    Draining,
    /// Final snapshot in progress.
    Finalizing,
    /// Shut down.
    Stopped,
}

impl Phase {
    /// Lowercase name used in logs and the stats endpoint.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Finalizing => "finalizing",
            Self::Stopped => "stopped",
        }
    }
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared lifecycle state.
#[derive(Debug)]
pub struct Lifecycle {
    phase: watch::Sender<Phase>,
    started_at: DateTime<Utc>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Start in [`Phase::Running`].
    pub fn new() -> Self {
        let (phase, _) = watch::channel(Phase::Running);
        Self {
            phase,
            started_at: Utc::now(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Whether new work (stream records, queries) is accepted.
    pub fn is_accepting(&self) -> bool {
        self.phase() == Phase::Running
    }

    /// Wall-clock start time.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Move to `next` if it lies ahead of the current phase.
    ///
    /// Returns `false` when the transition would go backwards or stay put.
    pub fn advance(&self, next: Phase) -> bool {
        self.phase.send_if_modified(|current| {
            if next <= *current {
                return false;
            }
            info!(from = %current, to = %next, "lifecycle phase change");
            *current = next;
            true
        })
    }

    /// Enter [`Phase::Draining`].
    pub fn begin_drain(&self) -> bool {
        self.advance(Phase::Draining)
    }

    /// Enter [`Phase::Finalizing`].
    pub fn begin_finalize(&self) -> bool {
        self.advance(Phase::Finalizing)
    }

    /// Enter [`Phase::Stopped`].
    pub fn mark_stopped(&self) -> bool {
        self.advance(Phase::Stopped)
    }

    /// Resolve once the phase is at or beyond `target`.
    pub async fn reached(&self, target: Phase) {
        let mut rx = self.phase.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|phase| *phase >= target).await;
    }

    /// Receiver for phase changes.
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn phases_only_move_forward() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.is_accepting());
        assert!(lifecycle.begin_finalize());
        assert!(!lifecycle.begin_drain());
        assert_eq!(lifecycle.phase(), Phase::Finalizing);
        assert!(!lifecycle.is_accepting());
        assert!(lifecycle.mark_stopped());
        assert!(!lifecycle.mark_stopped());
    }

    #[tokio::test]
    async fn reached_wakes_on_transition() {
        let lifecycle = Arc::new(Lifecycle::new());
        let waiter = {
            let lifecycle = Arc::clone(&lifecycle);
            tokio::spawn(async move { lifecycle.reached(Phase::Draining).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!waiter.is_finished());
        lifecycle.begin_drain();
        let joined = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        assert!(matches!(joined, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn reached_returns_immediately_when_past_target() {
        let lifecycle = Lifecycle::new();
        lifecycle.mark_stopped();
        lifecycle.reached(Phase::Draining).await;
    }
}
