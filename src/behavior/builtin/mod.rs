mod anti_idle;
mod auth;
mod chat;
mod chat_log;
mod goal;
mod patrol;

pub use anti_idle::{HoldControl, LookRotation, PeriodicStrike};
pub use auth::AutoAuth;
pub use chat::ScriptedChat;
pub use chat_log::ChatLog;
pub use goal::GoalSeek;
pub use patrol::{CirclePatrol, patrol_points};
