//! Anti-idle behaviors: held controls, periodic strikes and slow rotation.

use crate::behavior::{Behavior, BehaviorError, BehaviorHandle, SessionContext};
use crate::session::ControlState;
use std::time::Duration;
use tracing::debug;

/// Holds a movement control (sneak or jump) for the whole session.
pub struct HoldControl {
    control: ControlState,
}

impl HoldControl {
    pub fn new(control: ControlState) -> Self {
        Self { control }
    }
}

impl Behavior for HoldControl {
    fn name(&self) -> &'static str {
        self.control.as_str()
    }

    fn attach(&self, ctx: &SessionContext) -> Result<BehaviorHandle, BehaviorError> {
        let control = self.control;
        ctx.handle.set_control_state(control, true)?;

        let handle = ctx.handle.clone();
        Ok(BehaviorHandle::new(self.name())
            .on_detach(move || handle.set_control_state(control, false)))
    }
}

/// Hits the nearest mob, or swings at the air, on a fixed delay.
pub struct PeriodicStrike {
    interval: Duration,
    attack_mobs: bool,
}

impl PeriodicStrike {
    pub fn new(interval: Duration, attack_mobs: bool) -> Self {
        Self {
            interval,
            attack_mobs,
        }
    }
}

impl Behavior for PeriodicStrike {
    fn name(&self) -> &'static str {
        "hit"
    }

    fn attach(&self, ctx: &SessionContext) -> Result<BehaviorHandle, BehaviorError> {
        let handle = ctx.handle.clone();
        let attack_mobs = self.attack_mobs;

        let task = ctx.scheduler.every(self.interval, move || {
            if attack_mobs
                && let Some(target) = handle.nearest_entity(&|e| e.kind.is_strike_target())
            {
                if let Err(e) = handle.attack(target.id) {
                    debug!(username = handle.username(), "Attack failed: {e}");
                }
                return;
            }
            if let Err(e) = handle.swing_arm() {
                debug!(username = handle.username(), "Arm swing failed: {e}");
            }
        });

        Ok(BehaviorHandle::new(self.name()).with_task(task))
    }
}

/// Turns the head by a fixed yaw step on every tick; pitch is untouched.
pub struct LookRotation {
    interval: Duration,
    step: f32,
}

impl LookRotation {
    pub fn new(interval: Duration, step: f32) -> Self {
        Self { interval, step }
    }
}

impl Behavior for LookRotation {
    fn name(&self) -> &'static str {
        "rotate"
    }

    fn attach(&self, ctx: &SessionContext) -> Result<BehaviorHandle, BehaviorError> {
        let handle = ctx.handle.clone();
        let step = self.step;

        let task = ctx.scheduler.every(self.interval, move || {
            let Some((yaw, pitch)) = handle.orientation() else {
                return;
            };
            if let Err(e) = handle.look(yaw + step, pitch) {
                debug!(username = handle.username(), "Look failed: {e}");
            }
        });

        Ok(BehaviorHandle::new(self.name()).with_task(task))
    }
}
