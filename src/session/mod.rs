//! Session lifecycle: the capabilities a game client exposes, the controller
//! that drives one session at a time, and how sessions end.

mod controller;
mod loopback;
mod termination;

pub use controller::{
    ControllerSettings, ControllerStatus, SessionController, SessionReport, SessionState,
};
pub use loopback::{Command, LoopbackConnector, LoopbackHandle};
pub use termination::{Termination, UNKNOWN_REASON, kick_reason, strip_formatting};

use crate::behavior::BehaviorHandle;
use crate::credential::Credential;
use crate::schedule::Task;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Session is closed")]
    Closed,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Remote server a session connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
    /// Protocol version string; `None` lets the client negotiate.
    pub version: Option<String>,
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn distance_squared(&self, other: &Vec3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// Movement target handed to the [`Navigator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Goal {
    /// Stand exactly on this block.
    Block { x: i32, y: i32, z: i32 },
    /// Reach this column, any height.
    Xz { x: f64, z: f64 },
}

/// Persistent movement controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlState {
    Sneak,
    Jump,
}

impl ControlState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sneak => "sneak",
            Self::Jump => "jump",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(pub u32);

/// Coarse entity classification as reported by the world model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Hostile,
    Mob,
    Animal,
    Passive,
    Ambient,
    WaterCreature,
    /// Dropped items and other inanimate objects.
    Item,
    Player,
    /// Environmental markers such as lightning.
    Global,
    /// Experience orbs.
    Orb,
    Other,
}

impl EntityKind {
    /// Whether the periodic strike may target this kind.
    #[must_use]
    pub fn is_strike_target(self) -> bool {
        !matches!(
            self,
            Self::Item | Self::Player | Self::Global | Self::Orb | Self::Other
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    pub position: Vec3,
}

/// Everything a session handle reports back to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Joined,
    Ended { reason: String },
    /// Raw kick payload; may be a JSON text component or garbage.
    Kicked { reason: String },
    Error { message: String },
    Chat { sender: String, text: String },
    Died,
    GoalReached,
}

/// One live connection to the remote server.
///
/// Commands on a closed handle return [`SessionError::Closed`]; they never
/// panic, so behaviors can be torn down after the connection is gone.
pub trait SessionHandle: Send + Sync {
    fn username(&self) -> &str;
    fn send_chat(&self, text: &str) -> Result<(), SessionError>;
    fn set_control_state(&self, control: ControlState, active: bool) -> Result<(), SessionError>;
    fn attack(&self, entity: EntityId) -> Result<(), SessionError>;
    fn swing_arm(&self) -> Result<(), SessionError>;
    fn look(&self, yaw: f32, pitch: f32) -> Result<(), SessionError>;
    fn position(&self) -> Option<Vec3>;
    /// Current `(yaw, pitch)` in radians.
    fn orientation(&self) -> Option<(f32, f32)>;
    /// Closest entity accepted by `predicate`; ties go to the first found.
    fn nearest_entity(&self, predicate: &dyn Fn(&Entity) -> bool) -> Option<Entity>;
    /// Close the connection. Idempotent.
    fn end(&self, reason: &str);
}

/// Path planner bound to a session. Emits [`SessionEvent::GoalReached`].
pub trait Navigator: Send + Sync {
    fn set_goal(&self, goal: Goal) -> Result<(), SessionError>;
}

/// A freshly opened session: its handle, navigator and event stream.
pub struct Connection {
    pub handle: Arc<dyn SessionHandle>,
    pub navigator: Arc<dyn Navigator>,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

/// Opens sessions against a remote server.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(
        &self,
        address: &ServerAddress,
        credential: &Credential,
    ) -> Result<Connection, SessionError>;
}

/// One connection attempt, owned by the controller.
pub struct Session {
    pub id: String,
    pub seq: u64,
    pub credential: Credential,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub behaviors: Vec<BehaviorHandle>,
    pub rotation_timer: Option<Task>,
    pub handle: Option<Arc<dyn SessionHandle>>,
}

impl Session {
    pub fn new(seq: u64, credential: Credential) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            seq,
            credential,
            state: SessionState::Idle,
            started_at: Utc::now(),
            behaviors: Vec::new(),
            rotation_timer: None,
            handle: None,
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.credential.username
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strike_target_exclusions() {
        for kind in [
            EntityKind::Item,
            EntityKind::Player,
            EntityKind::Global,
            EntityKind::Orb,
            EntityKind::Other,
        ] {
            assert!(!kind.is_strike_target(), "{kind:?} should be excluded");
        }
        for kind in [EntityKind::Hostile, EntityKind::Mob, EntityKind::Animal] {
            assert!(kind.is_strike_target(), "{kind:?} should be targetable");
        }
    }

    #[test]
    fn test_vec3_display() {
        assert_eq!(Vec3::new(1.0, 64.5, -3.25).to_string(), "(1.00, 64.50, -3.25)");
    }

    #[test]
    fn test_server_address_display() {
        let addr = ServerAddress {
            host: "play.example.net".into(),
            port: 25565,
            version: None,
        };
        assert_eq!(addr.to_string(), "play.example.net:25565");
    }
}
