use crate::behavior::{Behavior, BehaviorError, BehaviorHandle, SessionContext};
use crate::session::{Goal, Vec3};
use std::time::Duration;
use tracing::debug;

/// The four cardinal points around `center` at `radius`, in patrol order.
#[must_use]
pub fn patrol_points(center: Vec3, radius: f64) -> [Goal; 4] {
    let Vec3 { x, z, .. } = center;
    [
        Goal::Xz { x: x + radius, z },
        Goal::Xz { x, z: z + radius },
        Goal::Xz { x: x - radius, z },
        Goal::Xz { x, z: z - radius },
    ]
}

/// Walks a square around the spot where the session started.
pub struct CirclePatrol {
    radius: f64,
    interval: Duration,
}

impl CirclePatrol {
    pub fn new(radius: f64, interval: Duration) -> Self {
        Self { radius, interval }
    }
}

impl Behavior for CirclePatrol {
    fn name(&self) -> &'static str {
        "circle-walk"
    }

    fn attach(&self, ctx: &SessionContext) -> Result<BehaviorHandle, BehaviorError> {
        let center = ctx.handle.position().ok_or(BehaviorError::UnknownPosition)?;
        let points = patrol_points(center, self.radius);

        let navigator = ctx.navigator.clone();
        let username = ctx.username.clone();
        let mut next = 0;
        let task = ctx.scheduler.every(self.interval, move || {
            if let Err(e) = navigator.set_goal(points[next]) {
                debug!(username = %username, "Patrol goal failed: {e}");
            }
            next = (next + 1) % points.len();
        });

        Ok(BehaviorHandle::new(self.name()).with_task(task))
    }
}
