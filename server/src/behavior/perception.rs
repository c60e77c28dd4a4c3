use super::{Node, Status, TickContext};
use crate::geometry::{angle_diff_degrees, bearing, Point};
use log::debug;
use std::time::{Duration, Instant};

fn within_interval(last: Option<Instant>, now: Instant, interval: Duration) -> bool {
    matches!(last, Some(at) if now.saturating_duration_since(at) < interval)
}

/// Angle in degrees between the monster's facing and its target.
fn facing_error(ctx: &TickContext<'_>, target: &Point) -> f32 {
    let desired = bearing(ctx.monster.x, ctx.monster.z, target);
    angle_diff_degrees(ctx.monster.rotation, desired)
}

/// Picks the first listed player as target and checks it is within range.
///
/// Re-checks at most once per `check_interval` and reports `Running` in
/// between. The monster keeps the target only while it is in range.
pub struct DetectPlayer {
    range: f32,
    check_interval: Duration,
    last_check: Option<Instant>,
}

impl DetectPlayer {
    pub fn new(range: f32, check_interval: Duration) -> Self {
        Self {
            range,
            check_interval,
            last_check: None,
        }
    }
}

impl Node for DetectPlayer {
    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Status {
        if within_interval(self.last_check, ctx.now, self.check_interval) {
            return Status::Running;
        }
        self.last_check = Some(ctx.now);

        let Some(target) = ctx.players.list_points().into_iter().next() else {
            ctx.monster.set_target(None);
            return Status::Failure;
        };

        let dist = ctx.monster.position().distance_to(&target);
        if dist <= self.range {
            ctx.monster.set_target(Some(target));
            Status::Success
        } else {
            debug!(
                "Monster {}: target {:?} at {:.1} beyond range {:.1}",
                ctx.monster.id, target.owner_id, dist, self.range
            );
            ctx.monster.set_target(None);
            Status::Failure
        }
    }
}

/// Checks the target lies within the monster's view cone.
///
/// Between re-checks it assumes the target is still in sight.
pub struct InSightCheck {
    view_angle: f32,
    check_interval: Duration,
    last_check: Option<Instant>,
}

impl InSightCheck {
    pub fn new(view_angle: f32, check_interval: Duration) -> Self {
        Self {
            view_angle,
            check_interval,
            last_check: None,
        }
    }
}

impl Node for InSightCheck {
    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Status {
        if within_interval(self.last_check, ctx.now, self.check_interval) {
            return Status::Success;
        }
        self.last_check = Some(ctx.now);

        let Some(target) = ctx.monster.target.clone() else {
            return Status::Failure;
        };

        if facing_error(ctx, &target) <= self.view_angle / 2.0 {
            Status::Success
        } else {
            Status::Failure
        }
    }
}

/// Succeeds when the target is far enough off-axis that the monster should
/// turn with an animation before chasing; fails for small corrections.
pub struct RotationCheckBeforeChase {
    threshold: f32,
}

impl RotationCheckBeforeChase {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl Node for RotationCheckBeforeChase {
    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Status {
        let Some(target) = ctx.monster.target.clone() else {
            return Status::Failure;
        };

        if facing_error(ctx, &target) > self.threshold {
            Status::Success
        } else {
            Status::Failure
        }
    }
}
