use crate::behavior::{Behavior, BehaviorError, BehaviorHandle, SessionContext};
use crate::session::SessionEvent;
use tracing::info;

/// Mirrors every chat line into the log.
pub struct ChatLog;

impl Behavior for ChatLog {
    fn name(&self) -> &'static str {
        "chat-log"
    }

    fn attach(&self, ctx: &SessionContext) -> Result<BehaviorHandle, BehaviorError> {
        let username = ctx.username.clone();
        let task = ctx.scheduler.subscribe(ctx.events(), move |event| {
            if let SessionEvent::Chat { sender, text } = event {
                info!(username = %username, "<{sender}> {text}");
            }
        });
        Ok(BehaviorHandle::new(self.name()).with_task(task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::test_support::harness;
    use crate::session::LoopbackConnector;

    #[tokio::test]
    async fn test_subscription_released_on_detach() {
        let h = harness(LoopbackConnector::new()).await;
        let mut attached = ChatLog.attach(&h.ctx).unwrap();
        assert_eq!(h.ctx.scheduler.armed(), 1);

        h.events
            .send(SessionEvent::Chat {
                sender: "Steve".into(),
                text: "hi".into(),
            })
            .unwrap();
        tokio::task::yield_now().await;

        attached.detach().unwrap();
        assert_eq!(h.ctx.scheduler.armed(), 0);
    }
}
