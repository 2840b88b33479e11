//! Cancellable deadline timers for Duskfall.
//!
//! Phase limits and warnings are one-shot deadlines. Each scheduled timer is
//! a small Tokio task that sleeps until its deadline and then delivers a
//! caller-chosen message into an unbounded channel. The owner (a game actor)
//! reads that channel inside its `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         Some(fire) = timer_rx.recv() => { game.on_timer(fire); }
//!     }
//! }
//! ```
//!
//! # Cancellation is best effort
//!
//! [`TimerService::cancel`] aborts the sleeping task, but a timer that fired
//! an instant earlier may already have queued its message. Receivers must
//! treat every delivered message as possibly stale and re-validate it
//! against their own state before acting on it.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// TimerId
// ---------------------------------------------------------------------------

/// Handle for one scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TimerService
// ---------------------------------------------------------------------------

struct Pending {
    handle: JoinHandle<()>,
    deadline: Instant,
}

/// Schedules one-shot timers that deliver `M` when they expire.
///
/// One service per game actor. Dropping the service aborts every timer that
/// has not fired yet.
pub struct TimerService<M: Send + 'static> {
    sender: mpsc::UnboundedSender<M>,
    pending: HashMap<TimerId, Pending>,
    next_id: u64,
}

impl<M: Send + 'static> TimerService<M> {
    /// Creates a service that delivers into `sender`.
    pub fn new(sender: mpsc::UnboundedSender<M>) -> Self {
        Self {
            sender,
            pending: HashMap::new(),
            next_id: 1,
        }
    }

    /// Creates a service together with the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<M>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Schedules `message` to be delivered after `delay`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule(&mut self, delay: Duration, message: M) -> TimerId {
        self.prune();

        let id = TimerId(self.next_id);
        self.next_id += 1;

        let deadline = Instant::now() + delay;
        let sender = self.sender.clone();
        let handle = tokio::spawn(async move {
            time::sleep_until(deadline).await;
            // The owner may be gone; nothing to do then.
            let _ = sender.send(message);
        });

        trace!(%id, delay_ms = delay.as_millis() as u64, "timer scheduled");
        self.pending.insert(id, Pending { handle, deadline });
        id
    }

    /// Cancels a timer.
    ///
    /// Returns `true` if the timer was still pending. A `true` result does
    /// not guarantee the message was never delivered; see the crate docs.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let Some(pending) = self.pending.remove(&id) else {
            return false;
        };
        if pending.handle.is_finished() {
            trace!(%id, "cancel after fire");
            return false;
        }
        pending.handle.abort();
        debug!(%id, "timer cancelled");
        true
    }

    /// Cancels every pending timer. Returns how many were still pending.
    pub fn cancel_all(&mut self) -> usize {
        let ids: Vec<TimerId> = self.pending.keys().copied().collect();
        ids.into_iter().filter(|id| self.cancel(*id)).count()
    }

    /// When a pending timer will fire, or `None` if it is unknown or done.
    pub fn deadline(&self, id: TimerId) -> Option<Instant> {
        self.pending
            .get(&id)
            .filter(|p| !p.handle.is_finished())
            .map(|p| p.deadline)
    }

    /// Time left until a pending timer fires.
    pub fn remaining(&self, id: TimerId) -> Option<Duration> {
        self.deadline(id)
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Number of timers that have not fired or been cancelled.
    pub fn pending(&self) -> usize {
        self.pending
            .values()
            .filter(|p| !p.handle.is_finished())
            .count()
    }

    /// Forgets timers whose tasks have completed.
    fn prune(&mut self) {
        self.pending.retain(|_, p| !p.handle.is_finished());
    }
}

impl<M: Send + 'static> Drop for TimerService<M> {
    fn drop(&mut self) {
        for pending in self.pending.values() {
            pending.handle.abort();
        }
    }
}
