use super::state::{Action, ActionState, Turn, TurnState};
use super::{Node, Status, TickContext};
use crate::geometry::{angle_diff_degrees, bearing, Point};
use log::debug;
use parking_lot::Mutex;
use shared::GameMessage;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Below this distance the chase stops moving to avoid jitter.
const CHASE_DEAD_ZONE: f32 = 0.1;

/// Settles the monster's animated turn. A finished turn is committed unless
/// the heading changed while it played, in which case it is dropped.
///
/// Returns true while the turn is still in progress.
fn settle_turn(turn: &Mutex<TurnState>, actions: &ActionState, ctx: &mut TickContext<'_>) -> bool {
    let mut turn = turn.lock();
    if turn.in_progress(ctx.now) {
        return true;
    }
    if let Some(done) = turn.take_finished(ctx.now) {
        if ctx.monster.rotation == done.from {
            ctx.monster.rotation = done.heading;
        } else {
            debug!(
                "Monster {}: heading changed during turn, dropping it",
                ctx.monster.id
            );
        }
        actions.release_reservation(Action::Rotate);
    }
    false
}

/// Turns the monster to face its target with a client-side animation.
///
/// Small corrections (inside the view cone or under `min_angle`) succeed
/// without moving. Larger ones broadcast one rotate message carrying the
/// animation length, `base_duration` plus one second per full 90 degrees,
/// and report `Running` until that time has passed. The finished turn is
/// committed before the bearing to the current target is evaluated again,
/// so a turn revisited late starts over towards wherever the target is now.
pub struct RotateToTarget {
    actions: Arc<ActionState>,
    turn: Arc<Mutex<TurnState>>,
    base_duration: f32,
    min_angle: f32,
    view_angle: f32,
}

impl RotateToTarget {
    pub fn new(
        actions: Arc<ActionState>,
        turn: Arc<Mutex<TurnState>>,
        base_duration: f32,
        min_angle: f32,
        view_angle: f32,
    ) -> Self {
        Self {
            actions,
            turn,
            base_duration,
            min_angle,
            view_angle,
        }
    }

    pub fn is_turning(&self) -> bool {
        self.turn.lock().is_pending()
    }
}

impl Node for RotateToTarget {
    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Status {
        if settle_turn(&self.turn, &self.actions, ctx) {
            return Status::Running;
        }

        let Some(_slot) = self.actions.acquire(Action::Rotate, ctx.now) else {
            return Status::Failure;
        };
        let Some(target) = ctx.monster.target.clone() else {
            return Status::Failure;
        };

        let heading = bearing(ctx.monster.x, ctx.monster.z, &target);
        let diff = angle_diff_degrees(ctx.monster.rotation, heading);
        if diff <= self.view_angle / 2.0 || diff < self.min_angle {
            return Status::Success;
        }

        let duration = self.base_duration + (diff / 90.0).floor();
        debug!(
            "Monster {}: turning {:.1} degrees over {:.1}s",
            ctx.monster.id, diff, duration
        );
        ctx.events.broadcast(GameMessage::MonsterRotate {
            monster_id: ctx.monster.id,
            rotation: heading,
            duration,
        });

        let done_at = ctx.now + Duration::from_secs_f32(duration);
        self.actions.reserve(Action::Rotate, done_at);
        self.turn.lock().begin(Turn {
            from: ctx.monster.rotation,
            heading,
            done_at,
        });
        Status::Running
    }
}

/// Holds a monster's whole tree while an animated turn plays out.
///
/// Nothing below runs until the turn is over; the first tick after it
/// commits the heading and then evaluates the child from scratch.
pub struct HoldDuringTurn {
    actions: Arc<ActionState>,
    turn: Arc<Mutex<TurnState>>,
    child: Box<dyn Node>,
}

impl HoldDuringTurn {
    pub fn new(actions: Arc<ActionState>, turn: Arc<Mutex<TurnState>>, child: Box<dyn Node>) -> Self {
        Self {
            actions,
            turn,
            child,
        }
    }
}

impl Node for HoldDuringTurn {
    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Status {
        if settle_turn(&self.turn, &self.actions, ctx) {
            return Status::Running;
        }
        self.child.execute(ctx)
    }
}

/// Snaps the monster to face its target immediately.
pub struct RotateWithoutAnimation {
    duration_marker: f32,
}

impl RotateWithoutAnimation {
    /// `duration_marker` is the duration field sent with the rotate message.
    pub fn new(duration_marker: f32) -> Self {
        Self { duration_marker }
    }
}

impl Node for RotateWithoutAnimation {
    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Status {
        let Some(target) = ctx.monster.target.clone() else {
            return Status::Failure;
        };

        let heading = bearing(ctx.monster.x, ctx.monster.z, &target);
        ctx.monster.rotation = heading;
        ctx.events.broadcast(GameMessage::MonsterRotate {
            monster_id: ctx.monster.id,
            rotation: heading,
            duration: self.duration_marker,
        });
        Status::Success
    }
}

/// Tuning for [`Chase`].
#[derive(Debug, Clone, Copy)]
pub struct ChaseParams {
    pub base_speed: f32,
    pub acceleration: f32,
    pub max_speed: f32,
    pub pulse: Duration,
}

/// Moves towards the target in bounded pulses.
///
/// Each pulse lasts `pulse` regardless of distance covered: the speed ramps
/// from `base_speed` by `acceleration` per second up to `max_speed`, and the
/// node reports `Running` until the pulse is over, then `Success` once.
pub struct Chase {
    actions: Arc<ActionState>,
    params: ChaseParams,
    started_at: Option<Instant>,
    last_update: Option<Instant>,
}

impl Chase {
    pub fn new(actions: Arc<ActionState>, params: ChaseParams) -> Self {
        Self {
            actions,
            params,
            started_at: None,
            last_update: None,
        }
    }
}

impl Node for Chase {
    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Status {
        let Some(_slot) = self.actions.acquire(Action::Chase, ctx.now) else {
            return Status::Failure;
        };
        if ctx.monster.is_dead() {
            return Status::Failure;
        }
        let Some(target) = ctx.monster.target.clone() else {
            return Status::Failure;
        };

        let started = *self.started_at.get_or_insert(ctx.now);
        let elapsed = ctx.now.saturating_duration_since(started);
        if elapsed >= self.params.pulse {
            self.started_at = None;
            self.last_update = None;
            return Status::Success;
        }

        let speed = (self.params.base_speed + elapsed.as_secs_f32() * self.params.acceleration)
            .min(self.params.max_speed);
        let dt = self
            .last_update
            .map_or(Duration::ZERO, |last| ctx.now.saturating_duration_since(last))
            .as_secs_f32();
        self.last_update = Some(ctx.now);

        step_towards(ctx, &target, speed * dt);
        Status::Running
    }
}

fn step_towards(ctx: &mut TickContext<'_>, target: &Point, step: f32) {
    let dx = target.x - ctx.monster.x;
    let dz = target.z - ctx.monster.z;
    let dist = (dx * dx + dz * dz).sqrt();
    if dist < CHASE_DEAD_ZONE || step <= 0.0 {
        return;
    }

    let step = step.min(dist);
    let x = ctx.monster.x + dx / dist * step;
    let z = ctx.monster.z + dz / dist * step;
    ctx.monster.set_position(x, z);
    ctx.events.broadcast(GameMessage::MoveMonster {
        monster_id: ctx.monster.id,
        x,
        z,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::testing::{Harness, Scripted};
    use crate::geometry::distance;
    use assert_approx_eq::assert_approx_eq;
    use std::f32::consts::PI;

    fn chase_params() -> ChaseParams {
        ChaseParams {
            base_speed: 2.0,
            acceleration: 1.1,
            max_speed: 7.0,
            pulse: Duration::from_secs(2),
        }
    }

    fn rotate_node(actions: &Arc<ActionState>) -> RotateToTarget {
        RotateToTarget::new(
            Arc::clone(actions),
            Arc::new(Mutex::new(TurnState::default())),
            3.0,
            10.0,
            90.0,
        )
    }

    #[test]
    fn test_rotate_small_angle_succeeds_without_message() {
        let mut h = Harness::at_origin();
        h.monster.set_target(Some(Point::new(10.0, 1.0)));
        let mut rotate = rotate_node(&Arc::new(ActionState::new()));

        assert_eq!(h.run(&mut rotate), Status::Success);
        assert!(h.events.messages().is_empty());
        assert_eq!(h.monster.rotation, 0.0);
    }

    #[test]
    fn test_rotate_large_angle_completes_after_duration() {
        let mut h = Harness::at_origin();
        // Directly behind: 180 degrees, so 3 + 2 seconds.
        h.monster.set_target(Some(Point::new(-10.0, 0.0)));
        let actions = Arc::new(ActionState::new());
        let mut rotate = rotate_node(&actions);

        assert_eq!(h.run(&mut rotate), Status::Running);
        assert!(rotate.is_turning());
        let messages = h.events.messages();
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            GameMessage::MonsterRotate {
                monster_id,
                rotation,
                duration,
            } => {
                assert_eq!(*monster_id, 1);
                assert_approx_eq!(rotation.abs(), PI, 0.0001);
                assert_approx_eq!(*duration, 5.0, 0.0001);
            }
            other => panic!("Unexpected message {:?}", other),
        }

        // The slot is free between ticks but other actions are held off.
        assert_eq!(actions.current(), None);
        assert!(actions.acquire(Action::Chase, h.now).is_none());

        h.advance(Duration::from_millis(4900));
        assert_eq!(h.run(&mut rotate), Status::Running);
        assert_eq!(h.monster.rotation, 0.0);

        h.advance(Duration::from_millis(100));
        assert_eq!(h.run(&mut rotate), Status::Success);
        assert_approx_eq!(h.monster.rotation.abs(), PI, 0.0001);
        assert_eq!(h.events.messages().len(), 1);
        assert!(actions.acquire(Action::Chase, h.now).is_some());
    }

    #[test]
    fn test_rotate_revisited_late_turns_towards_moved_target() {
        let mut h = Harness::at_origin();
        h.monster.set_target(Some(Point::new(-10.0, 0.0)));
        let actions = Arc::new(ActionState::new());
        let mut rotate = rotate_node(&actions);
        assert_eq!(h.run(&mut rotate), Status::Running);

        // The node is not revisited until long after the turn ended, and the
        // target has moved 135 degrees away from the committed heading.
        h.advance(Duration::from_secs(30));
        h.monster.set_target(Some(Point::new(10.0, 10.0)));
        h.events.clear();

        assert_eq!(h.run(&mut rotate), Status::Running);
        assert_approx_eq!(h.monster.rotation.abs(), PI, 0.0001);
        match h.events.messages().as_slice() {
            [GameMessage::MonsterRotate {
                rotation, duration, ..
            }] => {
                assert_approx_eq!(*rotation, PI / 4.0, 0.0001);
                assert_approx_eq!(*duration, 4.0, 0.0001);
            }
            other => panic!("Unexpected messages {:?}", other),
        }
        assert_eq!(actions.reservation(h.now), Some(Action::Rotate));

        h.advance(Duration::from_secs(4));
        assert_eq!(h.run(&mut rotate), Status::Success);
        assert_approx_eq!(h.monster.rotation, PI / 4.0, 0.0001);
    }

    #[test]
    fn test_rotate_drops_turn_when_heading_changed() {
        let mut h = Harness::at_origin();
        h.monster.set_target(Some(Point::new(-10.0, 0.0)));
        let mut rotate = rotate_node(&Arc::new(ActionState::new()));
        assert_eq!(h.run(&mut rotate), Status::Running);

        h.monster.rotation = 1.0;
        h.advance(Duration::from_secs(30));
        h.events.clear();

        // The stale heading is not applied; a fresh turn starts from 1.0.
        assert_eq!(h.run(&mut rotate), Status::Running);
        assert_eq!(h.monster.rotation, 1.0);
        assert!(matches!(
            h.events.messages().as_slice(),
            [GameMessage::MonsterRotate { duration, .. }] if *duration == 4.0
        ));
    }

    #[test]
    fn test_hold_during_turn_pauses_child_then_commits() {
        let mut h = Harness::at_origin();
        h.monster.set_target(Some(Point::new(-10.0, 0.0)));
        let actions = Arc::new(ActionState::new());
        let turn = Arc::new(Mutex::new(TurnState::default()));
        let child = Scripted::always(Status::Success);
        let calls = child.counter();
        let mut gate = HoldDuringTurn::new(Arc::clone(&actions), Arc::clone(&turn), Box::new(child));
        let mut rotate = RotateToTarget::new(Arc::clone(&actions), Arc::clone(&turn), 3.0, 10.0, 90.0);

        assert_eq!(h.run(&mut gate), Status::Success);
        assert_eq!(h.run(&mut rotate), Status::Running);

        for _ in 0..49 {
            h.advance(Duration::from_millis(100));
            assert_eq!(h.run(&mut gate), Status::Running);
        }
        assert_eq!(*calls.lock(), 1);
        assert_eq!(h.monster.rotation, 0.0);

        h.advance(Duration::from_millis(100));
        assert_eq!(h.run(&mut gate), Status::Success);
        assert_eq!(*calls.lock(), 2);
        assert_approx_eq!(h.monster.rotation.abs(), PI, 0.0001);
        assert!(!rotate.is_turning());
        assert_eq!(actions.reservation(h.now), None);
    }

    #[test]
    fn test_rotate_fails_when_slot_held() {
        let mut h = Harness::at_origin();
        h.monster.set_target(Some(Point::new(-10.0, 0.0)));
        let actions = Arc::new(ActionState::new());
        assert!(actions.set_action(Action::Chase));
        let mut rotate = rotate_node(&actions);

        assert_eq!(h.run(&mut rotate), Status::Failure);
        assert_eq!(actions.current(), Some(Action::Chase));
        assert!(h.events.messages().is_empty());
    }

    #[test]
    fn test_rotate_without_target_fails() {
        let mut h = Harness::at_origin();
        let actions = Arc::new(ActionState::new());
        let mut rotate = rotate_node(&actions);
        assert_eq!(h.run(&mut rotate), Status::Failure);
        assert_eq!(actions.current(), None);
    }

    #[test]
    fn test_rotate_without_animation_is_instant() {
        let mut h = Harness::at_origin();
        h.monster.set_target(Some(Point::new(0.0, 5.0)));
        let mut rotate = RotateWithoutAnimation::new(2.0);

        assert_eq!(h.run(&mut rotate), Status::Success);
        assert_approx_eq!(h.monster.rotation, PI / 2.0, 0.0001);
        assert_eq!(
            h.events.messages(),
            vec![GameMessage::MonsterRotate {
                monster_id: 1,
                rotation: h.monster.rotation,
                duration: 2.0,
            }]
        );
    }

    #[test]
    fn test_chase_moves_towards_target_then_succeeds_once() {
        let mut h = Harness::at_origin();
        let target = Point::owned_by(100.0, 50.0, "p");
        h.monster.set_target(Some(target.clone()));
        let mut chase = Chase::new(Arc::new(ActionState::new()), chase_params());

        assert_eq!(h.run(&mut chase), Status::Running);

        let mut last_dist = h.monster.position().distance_to(&target);
        for _ in 0..19 {
            h.advance(Duration::from_millis(100));
            assert_eq!(h.run(&mut chase), Status::Running);
            let dist = h.monster.position().distance_to(&target);
            assert!(dist < last_dist, "{} !< {}", dist, last_dist);
            last_dist = dist;
        }

        // Monster stays on the line towards the target.
        assert_approx_eq!(h.monster.z / h.monster.x, 0.5, 0.0001);

        h.advance(Duration::from_millis(100));
        assert_eq!(h.run(&mut chase), Status::Success);

        // A new pulse starts on the next call.
        h.advance(Duration::from_millis(100));
        assert_eq!(h.run(&mut chase), Status::Running);
    }

    #[test]
    fn test_chase_speed_is_capped() {
        let mut h = Harness::at_origin();
        h.monster.set_target(Some(Point::new(1000.0, 0.0)));
        let mut chase = Chase::new(
            Arc::new(ActionState::new()),
            ChaseParams {
                base_speed: 2.0,
                acceleration: 100.0,
                max_speed: 7.0,
                pulse: Duration::from_secs(10),
            },
        );

        h.run(&mut chase);
        h.advance(Duration::from_secs(1));
        h.run(&mut chase);
        assert_approx_eq!(h.monster.x, 7.0, 0.001);
    }

    #[test]
    fn test_chase_never_overshoots() {
        let mut h = Harness::at_origin();
        h.monster.set_target(Some(Point::new(0.5, 0.0)));
        let mut chase = Chase::new(Arc::new(ActionState::new()), chase_params());

        h.run(&mut chase);
        h.advance(Duration::from_secs(1));
        h.run(&mut chase);
        assert_approx_eq!(h.monster.x, 0.5, 0.0001);

        // Inside the dead zone nothing moves and nothing is sent.
        h.events.clear();
        h.monster.set_position(0.45, 0.0);
        h.advance(Duration::from_millis(100));
        assert_eq!(h.run(&mut chase), Status::Running);
        assert_eq!(h.monster.x, 0.45);
        assert!(h.events.messages().is_empty());
        assert!(distance(h.monster.x, h.monster.z, 0.5, 0.0) < CHASE_DEAD_ZONE);
    }

    #[test]
    fn test_chase_needs_slot_and_target() {
        let mut h = Harness::at_origin();
        let actions = Arc::new(ActionState::new());
        let mut chase = Chase::new(Arc::clone(&actions), chase_params());
        assert_eq!(h.run(&mut chase), Status::Failure);

        h.monster.set_target(Some(Point::new(10.0, 0.0)));
        actions.set_action(Action::Rotate);
        assert_eq!(h.run(&mut chase), Status::Failure);
        assert_eq!(actions.current(), Some(Action::Rotate));

        actions.clear_action();
        assert_eq!(h.run(&mut chase), Status::Running);
        assert_eq!(actions.current(), None);
    }
}
