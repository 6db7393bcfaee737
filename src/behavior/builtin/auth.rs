use crate::behavior::{Behavior, BehaviorError, BehaviorHandle, SessionContext};
use crate::credential::Secret;
use std::time::Duration;
use tracing::{info, warn};

/// Registers and logs in through chat commands shortly after joining.
pub struct AutoAuth {
    password: Secret,
    delay: Duration,
}

impl AutoAuth {
    pub fn new(password: Secret, delay: Duration) -> Self {
        Self { password, delay }
    }
}

impl Behavior for AutoAuth {
    fn name(&self) -> &'static str {
        "auto-auth"
    }

    fn attach(&self, ctx: &SessionContext) -> Result<BehaviorHandle, BehaviorError> {
        info!(username = %ctx.username, "Started auto-auth module");

        let handle = ctx.handle.clone();
        let password = self.password.clone();
        let task = ctx.scheduler.after(self.delay, move || {
            let pw = password.expose();
            let commands = [format!("/register {pw} {pw}"), format!("/login {pw}")];
            for command in &commands {
                if let Err(e) = handle.send_chat(command) {
                    warn!(username = handle.username(), "Auto-auth command failed: {e}");
                    return;
                }
            }
            info!(username = handle.username(), "Authentication commands executed");
        });

        Ok(BehaviorHandle::new(self.name()).with_task(task))
    }
}
