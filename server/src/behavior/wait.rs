use super::state::AttackState;
use super::{Node, Status, TickContext};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Recovery pause recorded in the shared attack state.
///
/// The first call opens a wait window and reports `Running`; attacks sharing
/// the state refuse to fire while it is open. Once the window has passed the
/// wait succeeds, clearing the waiting flag and the attack latch.
pub struct Wait {
    duration: Duration,
    state: Arc<Mutex<AttackState>>,
    started: bool,
}

impl Wait {
    pub fn new(duration: Duration, state: Arc<Mutex<AttackState>>) -> Self {
        Self {
            duration,
            state,
            started: false,
        }
    }
}

impl Node for Wait {
    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Status {
        let mut state = self.state.lock();

        // Another wait or a new attack may have replaced the window this
        // node opened; an open window is adopted, a vanished one reopened.
        if self.started && state.wait_until.is_none() {
            self.started = false;
        }

        if !self.started {
            if !state.is_waiting_at(ctx.now) {
                state.begin_wait(ctx.now + self.duration);
            }
            self.started = true;
            return Status::Running;
        }

        match state.wait_until {
            Some(until) if ctx.now > until => {
                state.finish_wait();
                self.started = false;
                Status::Success
            }
            _ => Status::Running,
        }
    }
}
