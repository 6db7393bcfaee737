//! Scripted behaviors attached to a live session.
//!
//! A [`Behavior`] is stateless configuration; attaching it to a session yields
//! a [`BehaviorHandle`] that owns every timer and subscription it created.
//! Detaching the handle cancels all of them.

pub mod builtin;

use crate::credential::Secret;
use crate::schedule::{Scheduler, Task};
use crate::session::{ControlState, Navigator, SessionError, SessionEvent, SessionHandle};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Error)]
pub enum BehaviorError {
    #[error("Session position is unknown")]
    UnknownPosition,

    #[error("Session command failed: {0}")]
    Session(#[from] SessionError),

    #[error("Failed to detach {name}: {source}")]
    Detach {
        name: &'static str,
        #[source]
        source: SessionError,
    },
}

/// What a behavior sees of the session it attaches to.
#[derive(Clone)]
pub struct SessionContext {
    pub seq: u64,
    pub username: String,
    pub handle: Arc<dyn SessionHandle>,
    pub navigator: Arc<dyn Navigator>,
    pub scheduler: Scheduler,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionContext {
    pub fn new(
        seq: u64,
        handle: Arc<dyn SessionHandle>,
        navigator: Arc<dyn Navigator>,
        scheduler: Scheduler,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            seq,
            username: handle.username().to_string(),
            handle,
            navigator,
            scheduler,
            events,
        }
    }

    /// Subscribe to the session's non-terminal events (chat, death, goals).
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("seq", &self.seq)
            .field("username", &self.username)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

pub trait Behavior: Send + Sync {
    fn name(&self) -> &'static str;

    /// Start the behavior on a session. Everything it schedules must be
    /// registered on the returned handle.
    fn attach(&self, ctx: &SessionContext) -> Result<BehaviorHandle, BehaviorError>;
}

type Release = Box<dyn FnOnce() -> Result<(), SessionError> + Send>;

/// Live instance of a behavior on one session.
pub struct BehaviorHandle {
    name: &'static str,
    tasks: Vec<Task>,
    release: Option<Release>,
    detached: bool,
}

impl BehaviorHandle {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            tasks: Vec::new(),
            release: None,
            detached: false,
        }
    }

    #[must_use]
    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    /// Run `release` once on detach, e.g. to let go of a held control.
    /// A [`SessionError::Closed`] from it is ignored.
    #[must_use]
    pub fn on_detach<F>(mut self, release: F) -> Self
    where
        F: FnOnce() -> Result<(), SessionError> + Send + 'static,
    {
        self.release = Some(Box::new(release));
        self
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Timers and subscriptions of this handle that can still fire.
    #[must_use]
    pub fn armed(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_armed()).count()
    }

    /// Cancel every task and run the release hook. Idempotent.
    ///
    /// Tasks are always cancelled, even when the release hook fails.
    pub fn detach(&mut self) -> Result<(), BehaviorError> {
        if self.detached {
            return Ok(());
        }
        self.detached = true;

        for task in self.tasks.drain(..) {
            task.cancel();
        }

        match self.release.take().map(|release| release()) {
            None | Some(Ok(()) | Err(SessionError::Closed)) => Ok(()),
            Some(Err(source)) => Err(BehaviorError::Detach {
                name: self.name,
                source,
            }),
        }
    }
}

impl Drop for BehaviorHandle {
    fn drop(&mut self) {
        let _ = self.detach();
    }
}

impl fmt::Debug for BehaviorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorHandle")
            .field("name", &self.name)
            .field("tasks", &self.tasks.len())
            .field("detached", &self.detached)
            .finish()
    }
}

/// How scripted chat messages are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    /// Every message once, in order, right after joining.
    Once,
    /// One message per interval, wrapping around the list.
    Repeat { interval: Duration },
}

/// Closed set of configurable behaviors.
#[derive(Debug, Clone, PartialEq)]
pub enum BehaviorDescriptor {
    AutoAuth {
        password: Secret,
        delay: Duration,
    },
    ScriptedChat {
        messages: Vec<String>,
        mode: ChatMode,
    },
    GoalSeek {
        x: i32,
        y: i32,
        z: i32,
    },
    HoldControl {
        control: ControlState,
    },
    PeriodicStrike {
        interval: Duration,
        attack_mobs: bool,
    },
    LookRotation {
        interval: Duration,
        step: f32,
    },
    CirclePatrol {
        radius: f64,
        interval: Duration,
    },
    ChatLog,
}

impl BehaviorDescriptor {
    #[must_use]
    pub fn into_behavior(self) -> Arc<dyn Behavior> {
        use builtin::{
            AutoAuth, ChatLog, CirclePatrol, GoalSeek, HoldControl, LookRotation,
            PeriodicStrike, ScriptedChat,
        };

        match self {
            Self::AutoAuth { password, delay } => Arc::new(AutoAuth::new(password, delay)),
            Self::ScriptedChat { messages, mode } => Arc::new(ScriptedChat::new(messages, mode)),
            Self::GoalSeek { x, y, z } => Arc::new(GoalSeek::new(x, y, z)),
            Self::HoldControl { control } => Arc::new(HoldControl::new(control)),
            Self::PeriodicStrike {
                interval,
                attack_mobs,
            } => Arc::new(PeriodicStrike::new(interval, attack_mobs)),
            Self::LookRotation { interval, step } => Arc::new(LookRotation::new(interval, step)),
            Self::CirclePatrol { radius, interval } => {
                Arc::new(CirclePatrol::new(radius, interval))
            }
            Self::ChatLog => Arc::new(ChatLog),
        }
    }
}
