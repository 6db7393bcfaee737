use crate::behavior::{Behavior, BehaviorError, BehaviorHandle, ChatMode, SessionContext};
use std::sync::Arc;
use tracing::{info, warn};

/// Sends configured chat messages, either once or on a loop.
pub struct ScriptedChat {
    messages: Arc<[String]>,
    mode: ChatMode,
}

impl ScriptedChat {
    pub fn new(messages: Vec<String>, mode: ChatMode) -> Self {
        Self {
            messages: messages.into(),
            mode,
        }
    }
}

impl Behavior for ScriptedChat {
    fn name(&self) -> &'static str {
        "chat-messages"
    }

    fn attach(&self, ctx: &SessionContext) -> Result<BehaviorHandle, BehaviorError> {
        info!(username = %ctx.username, "Started chat-messages module");
        let attached = BehaviorHandle::new(self.name());

        match self.mode {
            ChatMode::Once => {
                for message in self.messages.iter() {
                    ctx.handle.send_chat(message)?;
                }
                Ok(attached)
            }
            ChatMode::Repeat { interval } => {
                if self.messages.is_empty() {
                    return Ok(attached);
                }
                let handle = ctx.handle.clone();
                let messages = self.messages.clone();
                // Per attach, so every session starts from the first message.
                let mut next = 0;
                let task = ctx.scheduler.every(interval, move || {
                    if let Err(e) = handle.send_chat(&messages[next]) {
                        warn!(username = handle.username(), "Chat message failed: {e}");
                    }
                    next = (next + 1) % messages.len();
                });
                Ok(attached.with_task(task))
            }
        }
    }
}
