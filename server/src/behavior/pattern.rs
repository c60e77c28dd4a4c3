use super::state::{Pattern, PatternState};
use super::{Node, Status, TickContext};
use log::debug;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;

/// Root-level arbiter between the combat and chase macro-behaviors.
///
/// Picks chase with `chase_probability` and combat otherwise, unless the
/// last pattern has already repeated `max_repeat` times, in which case the
/// other one is forced. Only a `Success` or `Running` result counts as
/// having run a pattern.
pub struct PatternTracker {
    state: Arc<Mutex<PatternState>>,
    combat: Box<dyn Node>,
    chase: Box<dyn Node>,
    chase_probability: f32,
}

impl PatternTracker {
    pub fn new(
        state: Arc<Mutex<PatternState>>,
        combat: Box<dyn Node>,
        chase: Box<dyn Node>,
        chase_probability: f32,
    ) -> Self {
        Self {
            state,
            combat,
            chase,
            chase_probability,
        }
    }
}

impl Node for PatternTracker {
    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Status {
        let forced = self.state.lock().forced_switch();
        let pattern = match forced {
            Some(pattern) => {
                debug!("Monster {}: forcing switch to {}", ctx.monster.id, pattern);
                pattern
            }
            None if ctx.rng.gen::<f32>() < self.chase_probability => Pattern::Chase,
            None => Pattern::Combat,
        };

        let result = match pattern {
            Pattern::Combat => self.combat.execute(ctx),
            Pattern::Chase => self.chase.execute(ctx),
        };

        if result != Status::Failure {
            self.state.lock().record(pattern);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::testing::{Harness, Scripted};

    fn tracker(
        max_repeat: u32,
        chase_probability: f32,
        combat: Scripted,
        chase: Scripted,
    ) -> (PatternTracker, Arc<Mutex<PatternState>>) {
        let state = Arc::new(Mutex::new(PatternState::new(max_repeat)));
        let node = PatternTracker::new(
            Arc::clone(&state),
            Box::new(combat),
            Box::new(chase),
            chase_probability,
        );
        (node, state)
    }

    #[test]
    fn test_forces_other_pattern_after_max_repeat() {
        let mut h = Harness::at_origin();
        let combat = Scripted::always(Status::Success);
        let combat_calls = combat.counter();
        let chase = Scripted::always(Status::Running);
        let chase_calls = chase.counter();

        // Combat is always drawn unless forced.
        let (mut node, state) = tracker(2, 0.0, combat, chase);

        h.run(&mut node);
        h.run(&mut node);
        assert_eq!(*combat_calls.lock(), 2);
        assert_eq!(*chase_calls.lock(), 0);

        assert_eq!(h.run(&mut node), Status::Running);
        assert_eq!(*chase_calls.lock(), 1);
        let snapshot = state.lock().clone();
        assert_eq!(snapshot.last_pattern, Some(Pattern::Chase));
        assert_eq!(snapshot.pattern_count, 1);
    }

    #[test]
    fn test_forced_switch_back_to_combat() {
        let mut h = Harness::at_origin();
        let combat = Scripted::always(Status::Success);
        let combat_calls = combat.counter();
        let chase = Scripted::always(Status::Success);

        // Chase is always drawn unless forced.
        let (mut node, _state) = tracker(3, 1.0, combat, chase);
        for _ in 0..3 {
            h.run(&mut node);
        }
        assert_eq!(*combat_calls.lock(), 0);

        h.run(&mut node);
        assert_eq!(*combat_calls.lock(), 1);
    }

    #[test]
    fn test_failure_does_not_count() {
        let mut h = Harness::at_origin();
        let combat = Scripted::always(Status::Failure);
        let chase = Scripted::always(Status::Success);
        let (mut node, state) = tracker(2, 0.0, combat, chase);

        for _ in 0..5 {
            assert_eq!(h.run(&mut node), Status::Failure);
        }
        let snapshot = state.lock().clone();
        assert_eq!(snapshot.last_pattern, None);
        assert_eq!(snapshot.pattern_count, 0);
    }

    #[test]
    fn test_forced_pattern_failure_keeps_forcing() {
        let mut h = Harness::at_origin();
        let combat = Scripted::always(Status::Success);
        let chase = Scripted::then(&[Status::Failure], Status::Success);
        let chase_calls = chase.counter();
        let (mut node, state) = tracker(1, 0.0, combat, chase);

        h.run(&mut node);
        assert_eq!(h.run(&mut node), Status::Failure);
        assert_eq!(state.lock().last_pattern, Some(Pattern::Combat));

        assert_eq!(h.run(&mut node), Status::Success);
        assert_eq!(*chase_calls.lock(), 2);
        assert_eq!(state.lock().last_pattern, Some(Pattern::Chase));
    }
}
