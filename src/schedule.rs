//! Cancellable timers and event subscriptions.
//!
//! Every timer or listener is a spawned tokio task paired with a
//! [`CancellationToken`]. The [`Scheduler`] counts how many are still armed so
//! teardown can be verified: once a [`Task`] is cancelled it never fires again
//! and no longer counts.

use crate::session::SessionEvent;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Spawns timers and subscriptions and tracks how many are armed.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    armed: Arc<AtomicUsize>,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of timers/subscriptions that can still fire.
    #[must_use]
    pub fn armed(&self) -> usize {
        self.armed.load(Ordering::SeqCst)
    }

    fn arm(&self) -> Arc<Armed> {
        self.armed.fetch_add(1, Ordering::SeqCst);
        Arc::new(Armed {
            flag: AtomicBool::new(true),
            counter: self.armed.clone(),
        })
    }

    /// Run `f` once after `delay`.
    pub fn after<F>(&self, delay: Duration, f: F) -> Task
    where
        F: FnOnce() + Send + 'static,
    {
        let token = CancellationToken::new();
        let armed = self.arm();

        let task_token = token.clone();
        let task_armed = armed.clone();
        let join = tokio::spawn(async move {
            tokio::select! {
                biased;
                () = task_token.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    // A one-shot is spent once it fires; losing the race to
                    // cancel means it must not fire at all.
                    if task_armed.disarm() {
                        f();
                    }
                }
            }
        });

        Task { token, armed, join }
    }

    /// Run `f` every `period`, first firing one period from now.
    pub fn every<F>(&self, period: Duration, mut f: F) -> Task
    where
        F: FnMut() + Send + 'static,
    {
        let token = CancellationToken::new();
        let armed = self.arm();

        let task_token = token.clone();
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        if task_token.is_cancelled() {
                            break;
                        }
                        f();
                    }
                }
            }
        });

        Task { token, armed, join }
    }

    /// Call `f` for every event published on `events` until cancelled or the
    /// sender side goes away.
    pub fn subscribe<F>(&self, mut events: broadcast::Receiver<SessionEvent>, mut f: F) -> Task
    where
        F: FnMut(&SessionEvent) + Send + 'static,
    {
        let token = CancellationToken::new();
        let armed = self.arm();

        let task_token = token.clone();
        let task_armed = armed.clone();
        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = task_token.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(event) => {
                            if task_token.is_cancelled() {
                                break;
                            }
                            f(&event);
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "Event subscriber lagged");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            task_armed.disarm();
        });

        Task { token, armed, join }
    }
}

#[derive(Debug)]
struct Armed {
    flag: AtomicBool,
    counter: Arc<AtomicUsize>,
}

impl Armed {
    /// Returns true only for the first caller.
    fn disarm(&self) -> bool {
        let was_armed = self.flag.swap(false, Ordering::SeqCst);
        if was_armed {
            self.counter.fetch_sub(1, Ordering::SeqCst);
        }
        was_armed
    }

    fn is_armed(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Handle to one scheduled timer or subscription. Cancelled on drop.
#[derive(Debug)]
pub struct Task {
    token: CancellationToken,
    armed: Arc<Armed>,
    join: JoinHandle<()>,
}

impl Task {
    /// Cancel synchronously. Safe to call any number of times.
    ///
    /// Once this returns the task never starts another callback. On a
    /// multi-threaded runtime a callback already running on another worker
    /// is not interrupted and may finish its current command; session
    /// handles reject commands once ended, which bounds that window.
    pub fn cancel(&self) {
        self.token.cancel();
        self.join.abort();
        self.armed.disarm();
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed.is_armed()
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        self.cancel();
    }
}
