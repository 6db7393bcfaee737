//! The session controller: one session at a time, forever.
//!
//! ```text
//! Idle -> Connecting -> Ready -> Active -> Terminating -> Idle(next)
//! ```
//!
//! Every session gets a fresh set of behavior handles and a forced-rotation
//! timer. All of them are cancelled in `Terminating`, before the ring advances
//! and before the next `Connecting` begins.

use super::{
    Connection, Connector, ServerAddress, Session, SessionEvent, SessionHandle, Termination,
};
use crate::behavior::{Behavior, BehaviorDescriptor, SessionContext};
use crate::config::Config;
use crate::credential::CredentialRing;
use crate::schedule::Scheduler;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const EVENT_BUS_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Ready,
    Active,
    Terminating,
}

impl SessionState {
    /// State after `event` arrives. Idle and Terminating are left only by the
    /// controller itself.
    #[must_use]
    pub fn next(self, event: &SessionEvent) -> Self {
        match (self, event) {
            (Self::Idle | Self::Terminating, _) => self,
            (Self::Connecting, SessionEvent::Joined) => Self::Ready,
            (
                Self::Connecting | Self::Ready | Self::Active,
                SessionEvent::Ended { .. } | SessionEvent::Kicked { .. } | SessionEvent::Error { .. },
            ) => Self::Terminating,
            (Self::Connecting | Self::Ready | Self::Active, _) => self,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Active => "active",
            Self::Terminating => "terminating",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub address: ServerAddress,
    /// Back-off between a session ending and the next connect.
    pub reconnect_delay: Duration,
    /// Forced rotation after this long, even if the server never disconnects.
    pub max_session_lifetime: Duration,
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            address: config.server_address(),
            reconnect_delay: config.reconnect_delay(),
            max_session_lifetime: config.max_session_lifetime(),
        }
    }
}

/// Snapshot published on every transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerStatus {
    pub state: SessionState,
    /// Sequence number of the current or most recent session.
    pub seq: u64,
    pub username: Option<String>,
    /// Ring cursor: the credential the next session will use.
    pub cursor: usize,
    /// Behavior handles attached to the current session.
    pub attached: usize,
    /// Completed rotations since start.
    pub rotations: u64,
}

/// Outcome of one session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub seq: u64,
    pub username: String,
    pub started_at: DateTime<Utc>,
    pub termination: Termination,
    pub attached: usize,
    pub detach_failures: usize,
}

pub struct SessionController {
    settings: ControllerSettings,
    ring: CredentialRing,
    connector: Arc<dyn Connector>,
    behaviors: Vec<Arc<dyn Behavior>>,
    scheduler: Scheduler,
    seq: u64,
    status: watch::Sender<ControllerStatus>,
}

impl SessionController {
    pub fn new(
        settings: ControllerSettings,
        ring: CredentialRing,
        connector: Arc<dyn Connector>,
        behaviors: Vec<Arc<dyn Behavior>>,
    ) -> Self {
        let (status, _) = watch::channel(ControllerStatus {
            cursor: ring.cursor(),
            ..ControllerStatus::default()
        });
        Self {
            settings,
            ring,
            connector,
            behaviors,
            scheduler: Scheduler::new(),
            seq: 0,
            status,
        }
    }

    /// Controller for everything `config` enables, opening sessions through
    /// `connector`.
    pub fn from_config(config: &Config, connector: Arc<dyn Connector>) -> crate::Result<Self> {
        let ring = config.credential_ring()?;
        let behaviors = config
            .behavior_descriptors()
            .into_iter()
            .map(BehaviorDescriptor::into_behavior)
            .collect();
        Ok(Self::new(
            ControllerSettings::from_config(config),
            ring,
            connector,
            behaviors,
        ))
    }

    /// Follow state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ControllerStatus> {
        self.status.subscribe()
    }

    /// Scheduler shared by every session's timers; `armed()` is zero between
    /// sessions.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn ring(&self) -> &CredentialRing {
        &self.ring
    }

    /// Run sessions back to back until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            credentials = self.ring.len(),
            behaviors = self.behaviors.len(),
            address = %self.settings.address,
            "Session controller started"
        );

        while !shutdown.is_cancelled() {
            let report = self.run_once(&shutdown).await;
            debug!(seq = report.seq, termination = %report.termination, "Session finished");
            if shutdown.is_cancelled() {
                break;
            }

            let delay = self.settings.reconnect_delay;
            info!(
                next = %self.ring.current().username,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Reconnecting after back-off"
            );
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        info!("Session controller stopped");
    }

    /// One full cycle: connect, wait for join, attach, wait for the end,
    /// tear down, rotate. Never fails; every problem ends up classified.
    pub async fn run_once(&mut self, shutdown: &CancellationToken) -> SessionReport {
        self.seq += 1;
        let mut session = Session::new(self.seq, self.ring.current().clone());

        self.transition(&mut session, SessionState::Connecting);
        info!(
            username = %session.username(),
            seq = session.seq,
            session = %session.id,
            auth = session.credential.auth.as_str(),
            address = %self.settings.address,
            "Connecting"
        );

        let termination = match self
            .connector
            .open(&self.settings.address, &session.credential)
            .await
        {
            Ok(connection) => self.drive(&mut session, connection, shutdown).await,
            Err(e) => Termination::Errored {
                message: e.to_string(),
            },
        };

        self.transition(&mut session, SessionState::Terminating);
        let attached = session.behaviors.len();
        let detach_failures = self.teardown(&mut session);
        termination.log(session.username());

        let from = session.username().to_string();
        self.ring.advance();
        info!(
            from = %from,
            to = %self.ring.current().username,
            cursor = self.ring.cursor(),
            "Rotating credential"
        );
        self.status.send_modify(|s| {
            s.rotations += 1;
            s.cursor = self.ring.cursor();
        });
        self.transition(&mut session, SessionState::Idle);

        SessionReport {
            seq: session.seq,
            username: from,
            started_at: session.started_at,
            termination,
            attached,
            detach_failures,
        }
    }

    async fn drive(
        &mut self,
        session: &mut Session,
        connection: Connection,
        shutdown: &CancellationToken,
    ) -> Termination {
        let Connection {
            handle,
            navigator,
            mut events,
        } = connection;
        session.handle = Some(handle.clone());

        // Connecting: no timeout; a server that never signals join stalls here.
        loop {
            let event = tokio::select! {
                () = shutdown.cancelled() => return Termination::ended("shutdown"),
                event = events.recv() => event,
            };
            let Some(event) = event else {
                return Termination::ended("connection closed");
            };
            match session.state.next(&event) {
                SessionState::Ready => break,
                SessionState::Terminating => {
                    return Termination::from_event(&event)
                        .unwrap_or_else(|| Termination::ended("connection closed"));
                }
                _ => debug!(username = %session.username(), ?event, "Event before join ignored"),
            }
        }

        self.transition(session, SessionState::Ready);
        info!(username = %session.username(), seq = session.seq, "{} joined the server", session.username());

        let (bus, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        let ctx = SessionContext::new(
            session.seq,
            handle.clone(),
            navigator,
            self.scheduler.clone(),
            bus.clone(),
        );
        self.attach_all(session, &ctx);

        let (rotate_tx, mut rotate_rx) = mpsc::unbounded_channel();
        session.rotation_timer = Some(self.scheduler.after(
            self.settings.max_session_lifetime,
            move || {
                let _ = rotate_tx.send(());
            },
        ));
        self.transition(session, SessionState::Active);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => return Termination::ended("shutdown"),
                Some(()) = rotate_rx.recv() => {
                    info!(username = %session.username(), "{} disconnecting for auto-reconnect cycle.", session.username());
                    handle.end("max session lifetime reached");
                    return Termination::ended("max session lifetime reached");
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        return Termination::ended("connection closed");
                    };
                    if let Some(termination) = Termination::from_event(&event) {
                        return termination;
                    }
                    if event == SessionEvent::Died {
                        log_death(handle.as_ref());
                    }
                    // Err only means no behavior is listening.
                    let _ = bus.send(event);
                }
            }
        }
    }

    /// Attach every configured behavior in order. Failures are logged and
    /// skipped so one broken behavior cannot block the session.
    fn attach_all(&self, session: &mut Session, ctx: &SessionContext) {
        for behavior in &self.behaviors {
            match behavior.attach(ctx) {
                Ok(handle) => {
                    debug!(username = %session.username(), behavior = behavior.name(), "Behavior attached");
                    session.behaviors.push(handle);
                }
                Err(e) => warn!(
                    username = %session.username(),
                    behavior = behavior.name(),
                    "Failed to attach behavior: {e}"
                ),
            }
        }
        info!(
            username = %session.username(),
            attached = session.behaviors.len(),
            configured = self.behaviors.len(),
            "Behaviors attached"
        );
        let attached = session.behaviors.len();
        self.status.send_modify(|s| s.attached = attached);
    }

    /// Cancel the rotation timer, detach every behavior and release the
    /// handle. Best-effort: returns how many detaches reported an error.
    fn teardown(&self, session: &mut Session) -> usize {
        if let Some(timer) = session.rotation_timer.take() {
            timer.cancel();
        }

        let username = session.credential.username.as_str();
        let mut failures = 0;
        for mut behavior in session.behaviors.drain(..) {
            if let Err(e) = behavior.detach() {
                failures += 1;
                warn!(username = %username, "Detach failed: {e}");
            }
        }

        if let Some(handle) = session.handle.take() {
            handle.end("session teardown");
        }

        self.status.send_modify(|s| s.attached = 0);
        debug!(
            username = %session.username(),
            armed = self.scheduler.armed(),
            "Session torn down"
        );
        failures
    }

    fn transition(&self, session: &mut Session, state: SessionState) {
        debug!(
            username = %session.username(),
            from = session.state.as_str(),
            to = state.as_str(),
            "Session state"
        );
        session.state = state;
        let seq = session.seq;
        let username = session.username().to_string();
        self.status.send_modify(|s| {
            s.state = state;
            s.seq = seq;
            s.username = Some(username);
        });
    }
}

fn log_death(handle: &dyn SessionHandle) {
    let position = handle
        .position()
        .map_or_else(|| "an unknown position".to_string(), |p| p.to_string());
    warn!(
        username = handle.username(),
        "Bot has died and was respawned at {position}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{BehaviorError, BehaviorHandle, ChatMode};
    use crate::credential::{AuthMode, Credential, Secret};
    use crate::session::{ControlState, LoopbackConnector, SessionError};
    use std::sync::Mutex;

    fn settings() -> ControllerSettings {
        ControllerSettings {
            address: ServerAddress {
                host: "localhost".into(),
                port: 25565,
                version: None,
            },
            reconnect_delay: Duration::from_secs(5),
            max_session_lifetime: Duration::from_secs(6 * 60 * 60),
        }
    }

    fn ring(names: &[&str]) -> CredentialRing {
        CredentialRing::new(
            names
                .iter()
                .map(|n| Credential::new(*n, Secret::default(), AuthMode::Offline))
                .collect(),
        )
        .unwrap()
    }

    type Log = Arc<Mutex<Vec<String>>>;

    /// Records attach/detach per username.
    struct Probe {
        log: Log,
    }

    impl Behavior for Probe {
        fn name(&self) -> &'static str {
            "probe"
        }

        fn attach(&self, ctx: &SessionContext) -> Result<BehaviorHandle, BehaviorError> {
            self.log.lock().unwrap().push(format!("attach {}", ctx.username));
            let log = self.log.clone();
            let username = ctx.username.clone();
            Ok(BehaviorHandle::new(self.name())
                .with_task(ctx.scheduler.every(Duration::from_secs(1), || {}))
                .on_detach(move || {
                    log.lock().unwrap().push(format!("detach {username}"));
                    Ok(())
                }))
        }
    }

    struct Broken;

    impl Behavior for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn attach(&self, _: &SessionContext) -> Result<BehaviorHandle, BehaviorError> {
            Err(BehaviorError::UnknownPosition)
        }
    }

    /// Release hook fails with a protocol error.
    struct FailingRelease;

    impl Behavior for FailingRelease {
        fn name(&self) -> &'static str {
            "failing-release"
        }

        fn attach(&self, ctx: &SessionContext) -> Result<BehaviorHandle, BehaviorError> {
            Ok(BehaviorHandle::new(self.name())
                .with_task(ctx.scheduler.every(Duration::from_secs(1), || {}))
                .on_detach(|| Err(SessionError::Protocol("release rejected".into()))))
        }
    }

    fn all_behaviors() -> Vec<Arc<dyn Behavior>> {
        vec![
            BehaviorDescriptor::AutoAuth {
                password: Secret::new("pw"),
                delay: Duration::from_millis(500),
            },
            BehaviorDescriptor::ScriptedChat {
                messages: vec!["a".into(), "b".into()],
                mode: ChatMode::Repeat {
                    interval: Duration::from_secs(60),
                },
            },
            BehaviorDescriptor::GoalSeek { x: 5, y: 64, z: 5 },
            BehaviorDescriptor::HoldControl {
                control: ControlState::Sneak,
            },
            BehaviorDescriptor::HoldControl {
                control: ControlState::Jump,
            },
            BehaviorDescriptor::PeriodicStrike {
                interval: Duration::from_millis(800),
                attack_mobs: true,
            },
            BehaviorDescriptor::LookRotation {
                interval: Duration::from_millis(100),
                step: 1.0,
            },
            BehaviorDescriptor::CirclePatrol {
                radius: 2.0,
                interval: Duration::from_secs(1),
            },
            BehaviorDescriptor::ChatLog,
        ]
        .into_iter()
        .map(BehaviorDescriptor::into_behavior)
        .collect()
    }

    async fn wait_for_state(rx: &mut watch::Receiver<ControllerStatus>, state: SessionState) {
        rx.wait_for(|s| s.state == state).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_from_config() {
        let config = Config::from_toml(
            r#"
[account]
usernames = ["alpha", "beta"]

[utils]
auto-reconnect-delay = 2000

[utils.anti-afk]
sneak = true
jump = true
"#,
        )
        .unwrap();
        let connector = Arc::new(LoopbackConnector::new().end_after_join());
        let mut controller = SessionController::from_config(&config, connector).unwrap();
        assert_eq!(controller.ring().len(), 2);

        let report = controller.run_once(&CancellationToken::new()).await;
        assert_eq!(report.username, "alpha");
        assert_eq!(report.attached, 2);

        let mut empty = Config::default();
        empty.account.pool_size = 0;
        let err = SessionController::from_config(&empty, Arc::new(LoopbackConnector::new()))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            crate::Error::Config(crate::config::ConfigError::EmptyPool)
        ));
    }

    #[test]
    fn test_state_transitions() {
        use SessionState::*;
        let joined = SessionEvent::Joined;
        let ended = SessionEvent::Ended { reason: "x".into() };
        let kicked = SessionEvent::Kicked { reason: "x".into() };
        let error = SessionEvent::Error { message: "x".into() };

        assert_eq!(Connecting.next(&joined), Ready);
        assert_eq!(Connecting.next(&ended), Terminating);
        assert_eq!(Connecting.next(&SessionEvent::Died), Connecting);
        assert_eq!(Active.next(&kicked), Terminating);
        assert_eq!(Active.next(&error), Terminating);
        assert_eq!(Active.next(&SessionEvent::Died), Active);
        assert_eq!(Active.next(&SessionEvent::GoalReached), Active);
        assert_eq!(Idle.next(&joined), Idle);
        assert_eq!(Terminating.next(&joined), Terminating);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_once_attaches_all_and_leaves_nothing_armed() {
        let connector = Arc::new(LoopbackConnector::new().end_after_join());
        let behaviors = all_behaviors();
        let configured = behaviors.len();
        let mut controller =
            SessionController::new(settings(), ring(&["a", "b"]), connector.clone(), behaviors);

        let report = controller.run_once(&CancellationToken::new()).await;

        assert_eq!(report.username, "a");
        assert_eq!(report.attached, configured);
        assert_eq!(report.detach_failures, 0);
        assert_eq!(report.termination.kind(), "ended");
        assert_eq!(controller.scheduler().armed(), 0);
        assert_eq!(controller.ring().cursor(), 1);
        assert_eq!(controller.subscribe().borrow().state, SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_session_counts_enabled_behaviors() {
        let connector = Arc::new(LoopbackConnector::new());
        let behaviors = all_behaviors();
        let configured = behaviors.len();
        let controller =
            SessionController::new(settings(), ring(&["a"]), connector.clone(), behaviors);
        let scheduler = controller.scheduler().clone();
        let mut status = controller.subscribe();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(controller.run(shutdown.clone()));

        wait_for_state(&mut status, SessionState::Active).await;
        assert_eq!(status.borrow().attached, configured);
        assert!(scheduler.armed() > 0);

        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(scheduler.armed(), 0);
        assert!(connector.latest().unwrap().is_ended());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_attach_does_not_block_session() {
        let log: Log = Arc::default();
        let behaviors: Vec<Arc<dyn Behavior>> = vec![
            Arc::new(Broken),
            Arc::new(Probe { log: log.clone() }),
        ];
        let connector = Arc::new(LoopbackConnector::new().end_after_join());
        let mut controller =
            SessionController::new(settings(), ring(&["a"]), connector, behaviors);

        let report = controller.run_once(&CancellationToken::new()).await;
        assert_eq!(report.attached, 1);
        assert_eq!(*log.lock().unwrap(), ["attach a", "detach a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_detach_does_not_stop_teardown() {
        let log: Log = Arc::default();
        let behaviors: Vec<Arc<dyn Behavior>> = vec![
            Arc::new(FailingRelease),
            Arc::new(Probe { log: log.clone() }),
        ];
        let connector = Arc::new(LoopbackConnector::new().end_after_join());
        let mut controller =
            SessionController::new(settings(), ring(&["a", "b"]), connector.clone(), behaviors);

        let report = controller.run_once(&CancellationToken::new()).await;
        assert_eq!(report.attached, 2);
        assert_eq!(report.detach_failures, 1);
        assert_eq!(*log.lock().unwrap(), ["attach a", "detach a"]);
        assert_eq!(controller.scheduler().armed(), 0);
        assert!(connector.latest().unwrap().is_ended());

        let report = controller.run_once(&CancellationToken::new()).await;
        assert_eq!(report.username, "b");
        assert_eq!(connector.opened(), ["a", "b"]);
        assert_eq!(controller.scheduler().armed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_alternates_credentials_one_cycle_per_backoff() {
        let log: Log = Arc::default();
        let connector = Arc::new(LoopbackConnector::new().end_after_join());
        let controller = SessionController::new(
            settings(),
            ring(&["first", "second"]),
            connector.clone(),
            vec![Arc::new(Probe { log: log.clone() })],
        );
        let scheduler = controller.scheduler().clone();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(controller.run(shutdown.clone()));

        // Sessions open at t=0s, 5s and 10s.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(*log.lock().unwrap(), ["attach first", "detach first"]);
        assert_eq!(connector.opened(), ["first"]);
        assert_eq!(scheduler.armed(), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(
            *log.lock().unwrap(),
            [
                "attach first",
                "detach first",
                "attach second",
                "detach second"
            ]
        );

        tokio::time::sleep(Duration::from_secs(5)).await;
        shutdown.cancel();
        task.await.unwrap();

        assert_eq!(connector.opened(), ["first", "second", "first"]);
        assert_eq!(
            *log.lock().unwrap(),
            [
                "attach first",
                "detach first",
                "attach second",
                "detach second",
                "attach first",
                "detach first"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_death_does_not_rotate() {
        let connector = Arc::new(LoopbackConnector::new());
        let controller =
            SessionController::new(settings(), ring(&["a", "b"]), connector.clone(), Vec::new());
        let mut status = controller.subscribe();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(controller.run(shutdown.clone()));

        wait_for_state(&mut status, SessionState::Active).await;
        let handle = connector.latest().unwrap();
        handle.emit(SessionEvent::Died);
        tokio::time::sleep(Duration::from_secs(1)).await;

        {
            let s = status.borrow();
            assert_eq!(s.state, SessionState::Active);
            assert_eq!(s.cursor, 0);
            assert_eq!(s.rotations, 0);
        }
        assert_eq!(connector.opened(), ["a"]);
        assert!(!handle.is_ended());

        handle.emit(SessionEvent::Kicked {
            reason: r#"{"text":"Banned"}"#.into(),
        });
        wait_for_state(&mut status, SessionState::Idle).await;
        assert_eq!(status.borrow().cursor, 1);
        assert_eq!(status.borrow().rotations, 1);

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_rotation_without_disconnect() {
        let log: Log = Arc::default();
        let mut settings = settings();
        settings.max_session_lifetime = Duration::from_secs(60);
        let connector = Arc::new(LoopbackConnector::new());
        let controller = SessionController::new(
            settings,
            ring(&["a", "b"]),
            connector.clone(),
            vec![Arc::new(Probe { log: log.clone() })],
        );
        let status = controller.subscribe();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(controller.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(connector.opened(), ["a"]);
        assert_eq!(status.borrow().rotations, 0);

        // Rotation at 60s, next connect after the 5s back-off.
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(connector.opened(), ["a", "b"]);
        assert_eq!(status.borrow().rotations, 1);
        assert_eq!(
            connector.sessions()[0].end_reason().as_deref(),
            Some("max session lifetime reached")
        );
        assert_eq!(
            *log.lock().unwrap(),
            ["attach a", "detach a", "attach b"]
        );

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_rotates_and_retries() {
        let connector = Arc::new(LoopbackConnector::new().fail_open());
        let mut controller =
            SessionController::new(settings(), ring(&["a", "b"]), connector.clone(), Vec::new());

        let report = controller.run_once(&CancellationToken::new()).await;
        assert_eq!(report.termination.kind(), "errored");
        assert_eq!(report.attached, 0);
        assert_eq!(controller.ring().cursor(), 1);

        let report = controller.run_once(&CancellationToken::new()).await;
        assert_eq!(report.username, "b");
        assert_eq!(connector.opened(), ["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_kick_reason_reported() {
        let connector = Arc::new(LoopbackConnector::new());
        let mut controller =
            SessionController::new(settings(), ring(&["a"]), connector.clone(), Vec::new());
        let mut status = controller.subscribe();
        let shutdown = CancellationToken::new();

        let run = controller.run_once(&shutdown);
        let inject = async {
            wait_for_state(&mut status, SessionState::Active).await;
            connector.latest().unwrap().emit(SessionEvent::Kicked {
                reason: r#"{"extra":[{"text":"§eSlow down"}]}"#.into(),
            });
        };
        let (report, ()) = tokio::join!(run, inject);

        assert_eq!(
            report.termination,
            Termination::Kicked {
                reason: "Slow down".into()
            }
        );
        // Single-credential ring reconnects with the same identity.
        assert_eq!(controller.ring().current().username, "a");
    }
}
