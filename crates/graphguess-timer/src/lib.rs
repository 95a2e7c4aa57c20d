//! Cancellable one-shot timers for room actors.
//!
//! A [`Timer`] owns at most one pending deadline. When the deadline passes,
//! a message built from the arm-time [`TimerToken`] is pushed into the
//! owner's mailbox. The owner then asks [`Timer::accept`] whether the token
//! is still the live one: re-arming or cancelling bumps the generation, so
//! a fire that was already queued when the timer was cancelled is
//! recognised as stale and ignored.
//!
//! ```ignore
//! let token = round_timer.arm(Duration::from_secs(180), &alarm_tx, |token| Alarm {
//!     kind: AlarmKind::RoundTimeout,
//!     token,
//! });
//!
//! // inside the actor's select loop
//! Some(alarm) = alarm_rx.recv() => {
//!     if round_timer.accept(alarm.token) {
//!         /* end the round */
//!     }
//! }
//! ```

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// Deadline used when `now + after` does not fit in an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Identifies one arming of a [`Timer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken {
    generation: u64,
}

impl TimerToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Counters for a single timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerMetrics {
    pub armed: u64,
    /// Pending deadlines dropped by `cancel` or by re-arming.
    pub cancelled: u64,
    /// Fires accepted by the owner.
    pub fired: u64,
    /// Fires rejected because the timer had moved on.
    pub stale: u64,
}

/// A one-shot, re-armable timer.
///
/// Arming spawns a sleeping task on the current tokio runtime, so it must be
/// called from within one.
#[derive(Debug)]
pub struct Timer {
    name: &'static str,
    generation: u64,
    armed: bool,
    deadline: Option<Instant>,
    task: Option<JoinHandle<()>>,
    metrics: TimerMetrics,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            generation: 0,
            armed: false,
            deadline: None,
            task: None,
            metrics: TimerMetrics::default(),
        }
    }

    /// Schedules `make(token)` to be sent into `mailbox` after `after`.
    ///
    /// Any pending deadline is cancelled first. The spawned task holds only
    /// a weak handle to the mailbox, so a pending timer never keeps a closed
    /// actor alive.
    pub fn arm<T, F>(&mut self, after: Duration, mailbox: &mpsc::Sender<T>, make: F) -> TimerToken
    where
        T: Send + 'static,
        F: FnOnce(TimerToken) -> T + Send + 'static,
    {
        self.cancel();
        self.generation += 1;
        let token = TimerToken {
            generation: self.generation,
        };
        let now = Instant::now();
        let deadline = now.checked_add(after).unwrap_or_else(|| {
            warn!(
                timer = self.name,
                after_secs = after.as_secs(),
                "timer delay overflows, capping"
            );
            now + FAR_FUTURE
        });
        let weak = mailbox.downgrade();
        let name = self.name;

        self.task = Some(tokio::spawn(async move {
            time::sleep_until(deadline).await;
            match weak.upgrade() {
                Some(tx) => {
                    trace!(timer = name, generation = token.generation, "timer fired");
                    let _ = tx.send(make(token)).await;
                }
                None => trace!(timer = name, "timer fired after owner went away"),
            }
        }));
        self.armed = true;
        self.deadline = Some(deadline);
        self.metrics.armed += 1;

        debug!(
            timer = self.name,
            generation = self.generation,
            after_ms = after.as_millis() as u64,
            "timer armed"
        );
        token
    }

    /// Drops the pending deadline, if any. Calling it on an idle timer is a
    /// no-op.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if self.armed {
            self.armed = false;
            self.deadline = None;
            self.generation += 1;
            self.metrics.cancelled += 1;
            debug!(timer = self.name, "timer cancelled");
        }
    }

    /// Claims a fire. Returns `true` exactly once for the current arming and
    /// `false` for anything cancelled or superseded.
    pub fn accept(&mut self, token: TimerToken) -> bool {
        if self.armed && token.generation == self.generation {
            self.armed = false;
            self.deadline = None;
            self.task = None;
            self.metrics.fired += 1;
            true
        } else {
            self.metrics.stale += 1;
            debug!(
                timer = self.name,
                generation = token.generation,
                current = self.generation,
                "ignoring stale timer fire"
            );
            false
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Time left until the pending deadline, or `None` when idle.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn metrics(&self) -> &TimerMetrics {
        &self.metrics
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
