//! Why a session ended.

use super::SessionEvent;
use std::fmt;
use tracing::{error, info, warn};

pub const UNKNOWN_REASON: &str = "Unknown reason";

/// Classified end of a session. Used for logging only; every variant rotates
/// to the next credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Ended { reason: String },
    Kicked { reason: String },
    Errored { message: String },
}

impl Termination {
    /// Classify a session event. Returns `None` for events that do not end
    /// the session (chat, death, goal reached, joined).
    #[must_use]
    pub fn from_event(event: &SessionEvent) -> Option<Self> {
        match event {
            SessionEvent::Ended { reason } => Some(Self::Ended {
                reason: reason.clone(),
            }),
            SessionEvent::Kicked { reason } => Some(Self::Kicked {
                reason: kick_reason(reason),
            }),
            SessionEvent::Error { message } => Some(Self::Errored {
                message: message.clone(),
            }),
            SessionEvent::Joined
            | SessionEvent::Chat { .. }
            | SessionEvent::Died
            | SessionEvent::GoalReached => None,
        }
    }

    pub(crate) fn ended(reason: impl Into<String>) -> Self {
        Self::Ended {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ended { .. } => "ended",
            Self::Kicked { .. } => "kicked",
            Self::Errored { .. } => "errored",
        }
    }

    pub(crate) fn log(&self, username: &str) {
        match self {
            Self::Ended { reason } => info!(username, reason = %reason, "Session ended"),
            Self::Kicked { reason } => {
                warn!(username, "Bot was kicked from the server. Reason: {reason}");
            }
            Self::Errored { message } => error!(username, "An error occurred: {message}"),
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ended { reason } => write!(f, "ended: {reason}"),
            Self::Kicked { reason } => write!(f, "kicked: {reason}"),
            Self::Errored { message } => write!(f, "error: {message}"),
        }
    }
}

/// Extract a readable kick reason from a raw payload.
///
/// The payload is usually a JSON text component. The text comes from the
/// top-level `text` field, else from the first `extra` entry's `text`.
/// Formatting codes are stripped. Anything unparseable or empty yields
/// [`UNKNOWN_REASON`]; this never fails.
#[must_use]
pub fn kick_reason(payload: &str) -> String {
    let text = match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(json) => extract_text(&json).unwrap_or_default(),
        Err(e) => {
            warn!("Failed to parse kick reason: {e}");
            String::new()
        }
    };

    let text = strip_formatting(&text);
    if text.is_empty() {
        UNKNOWN_REASON.to_string()
    } else {
        text
    }
}

fn extract_text(json: &serde_json::Value) -> Option<String> {
    // A bare JSON string is already the text.
    if let Some(s) = json.as_str() {
        return Some(s.to_string());
    }

    let non_empty = |v: &serde_json::Value| {
        v.get("text")
            .and_then(|t| t.as_str())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    };

    non_empty(json).or_else(|| {
        json.get("extra")
            .and_then(|e| e.as_array())
            .and_then(|e| e.first())
            .and_then(non_empty)
    })
}

/// Remove `§x` color/formatting codes.
#[must_use]
pub fn strip_formatting(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '§' {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kick_reason_top_level_text() {
        assert_eq!(kick_reason(r#"{"text":"Banned"}"#), "Banned");
    }

    #[test]
    fn test_kick_reason_first_extra() {
        assert_eq!(kick_reason(r#"{"extra":[{"text":"Slow down"}]}"#), "Slow down");
    }

    #[test]
    fn test_kick_reason_empty_text_falls_back_to_extra() {
        assert_eq!(
            kick_reason(r#"{"text":"","extra":[{"text":"Server restarting"},{"text":"x"}]}"#),
            "Server restarting"
        );
    }

    #[test]
    fn test_kick_reason_not_json() {
        assert_eq!(kick_reason("not-json"), UNKNOWN_REASON);
    }

    #[test]
    fn test_kick_reason_no_text_anywhere() {
        assert_eq!(kick_reason(r#"{"translate":"multiplayer.disconnect"}"#), UNKNOWN_REASON);
        assert_eq!(kick_reason(r#"{"extra":[]}"#), UNKNOWN_REASON);
        assert_eq!(kick_reason("42"), UNKNOWN_REASON);
    }

    #[test]
    fn test_kick_reason_strips_formatting() {
        assert_eq!(
            kick_reason(r#"{"text":"§cYou are §lbanned§r!"}"#),
            "You are banned!"
        );
        assert_eq!(kick_reason(r#"{"text":"§c§l"}"#), UNKNOWN_REASON);
    }

    #[test]
    fn test_kick_reason_plain_json_string() {
        assert_eq!(kick_reason(r#""Timed out""#), "Timed out");
    }

    #[test]
    fn test_strip_formatting_trailing_marker() {
        assert_eq!(strip_formatting("abc§"), "abc");
        assert_eq!(strip_formatting("no codes"), "no codes");
    }

    #[test]
    fn test_from_event_classification() {
        assert_eq!(
            Termination::from_event(&SessionEvent::Kicked {
                reason: r#"{"text":"Banned"}"#.into()
            }),
            Some(Termination::Kicked {
                reason: "Banned".into()
            })
        );
        assert_eq!(
            Termination::from_event(&SessionEvent::Error {
                message: "ECONNRESET".into()
            })
            .map(|t| t.kind()),
            Some("errored")
        );
        assert_eq!(
            Termination::from_event(&SessionEvent::Ended {
                reason: "socketClosed".into()
            })
            .map(|t| t.kind()),
            Some("ended")
        );
        assert_eq!(Termination::from_event(&SessionEvent::Died), None);
        assert_eq!(
            Termination::from_event(&SessionEvent::Chat {
                sender: "a".into(),
                text: "b".into()
            }),
            None
        );
    }
}
