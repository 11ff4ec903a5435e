//! Attempt countdown.
//!
//! The deadline is only tracked while an attempt view is open; recording and
//! submitting do not re-check it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

/// Seconds left in an attempt. Before the attempt starts the full duration is
/// available; afterwards elapsed time is subtracted, floored at zero.
pub fn remaining_seconds(
    duration_minutes: i32,
    started_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> i64 {
    let total = i64::from(duration_minutes.max(0)) * 60;
    match started_at {
        None => total,
        Some(started) => {
            let elapsed = (now - started).num_seconds().max(0);
            (total - elapsed).max(0)
        }
    }
}

/// A running countdown. Ticks once per second and calls its expiry callback
/// once when it reaches zero. Dropping the handle stops the countdown.
pub struct AttemptTimer {
    remaining: watch::Receiver<i64>,
    fired: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl AttemptTimer {
    pub fn start<F, Fut>(initial_seconds: i64, on_expire: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let initial = initial_seconds.max(0);
        let (tx, rx) = watch::channel(initial);
        let fired = Arc::new(AtomicBool::new(false));
        let fired_flag = fired.clone();

        let task = tokio::spawn(async move {
            let mut remaining = initial;
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            while remaining > 0 {
                ticker.tick().await;
                remaining -= 1;
                let _ = tx.send(remaining);
            }
            if !fired_flag.swap(true, Ordering::SeqCst) {
                // Detached so that closing the view cannot cut a submit short.
                tokio::spawn(on_expire());
            }
        });

        Self {
            remaining: rx,
            fired,
            task,
        }
    }

    pub fn remaining(&self) -> i64 {
        *self.remaining.borrow()
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for AttemptTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Countdowns of the attempt views currently open, keyed by assignment.
#[derive(Clone, Default)]
pub struct TimerRegistry {
    timers: Arc<Mutex<HashMap<Uuid, AttemptTimer>>>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, AttemptTimer>> {
        self.timers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Starts a countdown for `assignment_id` unless one is already running.
    /// A finished countdown is replaced, so reopening a view whose auto-submit
    /// failed tries again. Until then such an attempt stays `in_progress`.
    /// Returns `true` when a new countdown was started.
    pub fn ensure_started<F, Fut>(&self, assignment_id: Uuid, initial_seconds: i64, on_expire: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut timers = self.lock();
        if let Some(existing) = timers.get(&assignment_id) {
            if existing.is_running() {
                return false;
            }
        }
        timers.insert(assignment_id, AttemptTimer::start(initial_seconds, on_expire));
        true
    }

    /// Seconds left on a running countdown. Finished countdowns are dropped.
    pub fn remaining(&self, assignment_id: Uuid) -> Option<i64> {
        let mut timers = self.lock();
        prune_finished(&mut timers);
        timers.get(&assignment_id).map(AttemptTimer::remaining)
    }

    pub fn is_running(&self, assignment_id: Uuid) -> bool {
        let mut timers = self.lock();
        prune_finished(&mut timers);
        timers.contains_key(&assignment_id)
    }

    pub fn len(&self) -> usize {
        let mut timers = self.lock();
        prune_finished(&mut timers);
        timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops and forgets the countdown. Returns whether one existed.
    pub fn cancel(&self, assignment_id: Uuid) -> bool {
        let removed = self.lock().remove(&assignment_id);
        match removed {
            Some(timer) => {
                timer.cancel();
                true
            }
            None => false,
        }
    }
}

fn prune_finished(timers: &mut HashMap<Uuid, AttemptTimer>) {
    timers.retain(|_, timer| timer.is_running());
}
