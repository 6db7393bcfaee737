//! In-memory connector.
//!
//! Stands in for a network client: every opened session joins immediately,
//! records the commands it receives, walks straight onto navigation goals and
//! can have arbitrary events injected. The binary runs on it when no protocol
//! client is configured, and tests use it as their session double.

use super::{
    Connection, Connector, ControlState, Entity, EntityId, Goal, Navigator, ServerAddress,
    SessionError, SessionEvent, SessionHandle, Vec3,
};
use crate::credential::Credential;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

/// A command a loopback session received.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Chat(String),
    Control(ControlState, bool),
    Attack(EntityId),
    SwingArm,
    Look { yaw: f32, pitch: f32 },
    Goal(Goal),
    End(String),
}

#[derive(Debug, Clone)]
struct Script {
    spawn: Vec3,
    entities: Vec<Entity>,
    end_after_join: bool,
    fail_open: bool,
}

#[derive(Default)]
struct ConnectorState {
    opened: Vec<String>,
    sessions: Vec<Arc<LoopbackHandle>>,
}

pub struct LoopbackConnector {
    script: Script,
    state: Mutex<ConnectorState>,
}

impl Default for LoopbackConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackConnector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            script: Script {
                spawn: Vec3::new(0.0, 64.0, 0.0),
                entities: Vec::new(),
                end_after_join: false,
                fail_open: false,
            },
            state: Mutex::new(ConnectorState::default()),
        }
    }

    /// Sessions start at `spawn`.
    #[must_use]
    pub fn with_spawn(mut self, spawn: Vec3) -> Self {
        self.script.spawn = spawn;
        self
    }

    /// Entities visible to every session.
    #[must_use]
    pub fn with_entities(mut self, entities: Vec<Entity>) -> Self {
        self.script.entities = entities;
        self
    }

    /// Every session reports `ended` right after it joins. The handle itself
    /// stays usable until the controller ends it.
    #[must_use]
    pub fn end_after_join(mut self) -> Self {
        self.script.end_after_join = true;
        self
    }

    /// Every `open` fails with a connection error.
    #[must_use]
    pub fn fail_open(mut self) -> Self {
        self.script.fail_open = true;
        self
    }

    /// Usernames of every `open` call, in order.
    #[must_use]
    pub fn opened(&self) -> Vec<String> {
        lock(&self.state).opened.clone()
    }

    #[must_use]
    pub fn sessions(&self) -> Vec<Arc<LoopbackHandle>> {
        lock(&self.state).sessions.clone()
    }

    #[must_use]
    pub fn latest(&self) -> Option<Arc<LoopbackHandle>> {
        lock(&self.state).sessions.last().cloned()
    }
}

#[async_trait]
impl Connector for LoopbackConnector {
    async fn open(
        &self,
        address: &ServerAddress,
        credential: &Credential,
    ) -> Result<Connection, SessionError> {
        lock(&self.state).opened.push(credential.username.clone());

        if self.script.fail_open {
            return Err(SessionError::Connect(format!(
                "{address} refused the connection"
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Arc::new(LoopbackHandle {
            username: credential.username.clone(),
            events: tx,
            world: Mutex::new(World {
                position: self.script.spawn,
                yaw: 0.0,
                pitch: 0.0,
                entities: self.script.entities.clone(),
                commands: Vec::new(),
                ended: false,
            }),
        });
        lock(&self.state).sessions.push(handle.clone());

        debug!(username = %credential.username, %address, "Loopback session opened");
        handle.emit(SessionEvent::Joined);
        if self.script.end_after_join {
            handle.emit(SessionEvent::Ended {
                reason: "loopback script".into(),
            });
        }

        Ok(Connection {
            handle: handle.clone(),
            navigator: handle,
            events: rx,
        })
    }
}

struct World {
    position: Vec3,
    yaw: f32,
    pitch: f32,
    entities: Vec<Entity>,
    commands: Vec<Command>,
    ended: bool,
}

pub struct LoopbackHandle {
    username: String,
    events: mpsc::UnboundedSender<SessionEvent>,
    world: Mutex<World>,
}

impl LoopbackHandle {
    /// Inject an event as if the server had sent it.
    pub fn emit(&self, event: SessionEvent) {
        // Nobody listening once the controller has moved on.
        let _ = self.events.send(event);
    }

    #[must_use]
    pub fn commands(&self) -> Vec<Command> {
        lock(&self.world)
            .commands
            .iter()
            .filter(|c| !matches!(c, Command::End(_)))
            .cloned()
            .collect()
    }

    /// Chat lines sent so far.
    #[must_use]
    pub fn chat_lines(&self) -> Vec<String> {
        lock(&self.world)
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::Chat(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        lock(&self.world).ended
    }

    /// Reason passed to the first `end` call.
    #[must_use]
    pub fn end_reason(&self) -> Option<String> {
        lock(&self.world).commands.iter().find_map(|c| match c {
            Command::End(reason) => Some(reason.clone()),
            _ => None,
        })
    }

    pub fn set_entities(&self, entities: Vec<Entity>) {
        lock(&self.world).entities = entities;
    }

    fn record(&self, command: Command) -> Result<(), SessionError> {
        let mut world = lock(&self.world);
        if world.ended {
            return Err(SessionError::Closed);
        }
        debug!(username = %self.username, ?command, "Loopback command");
        world.commands.push(command);
        Ok(())
    }
}

impl SessionHandle for LoopbackHandle {
    fn username(&self) -> &str {
        &self.username
    }

    fn send_chat(&self, text: &str) -> Result<(), SessionError> {
        self.record(Command::Chat(text.to_string()))
    }

    fn set_control_state(&self, control: ControlState, active: bool) -> Result<(), SessionError> {
        self.record(Command::Control(control, active))
    }

    fn attack(&self, entity: EntityId) -> Result<(), SessionError> {
        self.record(Command::Attack(entity))
    }

    fn swing_arm(&self) -> Result<(), SessionError> {
        self.record(Command::SwingArm)
    }

    fn look(&self, yaw: f32, pitch: f32) -> Result<(), SessionError> {
        self.record(Command::Look { yaw, pitch })?;
        let mut world = lock(&self.world);
        world.yaw = yaw;
        world.pitch = pitch;
        Ok(())
    }

    fn position(&self) -> Option<Vec3> {
        let world = lock(&self.world);
        (!world.ended).then_some(world.position)
    }

    fn orientation(&self) -> Option<(f32, f32)> {
        let world = lock(&self.world);
        (!world.ended).then_some((world.yaw, world.pitch))
    }

    fn nearest_entity(&self, predicate: &dyn Fn(&Entity) -> bool) -> Option<Entity> {
        let world = lock(&self.world);
        if world.ended {
            return None;
        }
        let mut best: Option<(f64, &Entity)> = None;
        for entity in world.entities.iter().filter(|e| predicate(e)) {
            let distance = entity.position.distance_squared(&world.position);
            // Strictly closer only, so the first of equals wins.
            if best.is_none_or(|(d, _)| distance < d) {
                best = Some((distance, entity));
            }
        }
        best.map(|(_, e)| e.clone())
    }

    fn end(&self, reason: &str) {
        {
            let mut world = lock(&self.world);
            if world.ended {
                return;
            }
            world.ended = true;
            world.commands.push(Command::End(reason.to_string()));
        }
        self.emit(SessionEvent::Ended {
            reason: reason.to_string(),
        });
    }
}

impl Navigator for LoopbackHandle {
    fn set_goal(&self, goal: Goal) -> Result<(), SessionError> {
        self.record(Command::Goal(goal))?;
        {
            let mut world = lock(&self.world);
            let arrived = match goal {
                Goal::Block { x, y, z } => Vec3::new(f64::from(x), f64::from(y), f64::from(z)),
                Goal::Xz { x, z } => Vec3::new(x, world.position.y, z),
            };
            world.position = arrived;
        }
        self.emit(SessionEvent::GoalReached);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
