use crate::behavior::{Behavior, BehaviorError, BehaviorHandle, SessionContext};
use crate::session::{Goal, SessionEvent};
use tracing::info;

/// Walks to a fixed block once per session.
pub struct GoalSeek {
    x: i32,
    y: i32,
    z: i32,
}

impl GoalSeek {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl Behavior for GoalSeek {
    fn name(&self) -> &'static str {
        "position"
    }

    fn attach(&self, ctx: &SessionContext) -> Result<BehaviorHandle, BehaviorError> {
        let (x, y, z) = (self.x, self.y, self.z);

        // Subscribe first so a navigator that arrives instantly is still seen.
        let handle = ctx.handle.clone();
        let arrivals = ctx.scheduler.subscribe(ctx.events(), move |event| {
            if matches!(event, SessionEvent::GoalReached) {
                let position = handle
                    .position()
                    .map_or_else(|| "unknown position".to_string(), |p| p.to_string());
                info!(username = handle.username(), "Bot arrived at target location. {position}");
            }
        });

        info!(username = %ctx.username, "Starting moving to target location ({x}, {y}, {z})");
        ctx.navigator.set_goal(Goal::Block { x, y, z })?;

        Ok(BehaviorHandle::new(self.name()).with_task(arrivals))
    }
}
