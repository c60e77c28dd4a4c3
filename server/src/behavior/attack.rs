use super::state::{Action, ActionState, AttackState};
use super::{Node, Status, TickContext};
use crate::geometry::Point;
use log::debug;
use parking_lot::Mutex;
use rand::Rng;
use shared::{AttackKind, GameMessage, StrikePosition, METEOR_STRIKE_COUNT};
use std::f32::consts::TAU;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct AttackParams {
    pub range: f32,
    pub damage: i32,
    pub cooldown: Duration,
}

/// Checks shared by every attack kind, in order: an open recovery wait or
/// an attack of another kind refuses, an unfinished cooldown holds, and a
/// dead monster or a missing or distant target refuses.
fn check_attack(
    state: &mut AttackState,
    kind: AttackKind,
    params: &AttackParams,
    ctx: &TickContext<'_>,
) -> Result<Point, Status> {
    state.expire_wait(ctx.now);
    if state.is_waiting {
        return Err(Status::Failure);
    }
    if state.blocked_by_other(kind) {
        return Err(Status::Failure);
    }
    if !state.cooldown_elapsed(params.cooldown, ctx.now) {
        return Err(Status::Running);
    }
    if ctx.monster.is_dead() {
        return Err(Status::Failure);
    }
    let target = ctx.monster.target.clone().ok_or(Status::Failure)?;
    if ctx.monster.position().distance_to(&target) > params.range {
        return Err(Status::Failure);
    }
    Ok(target)
}

fn attack_message(ctx: &TickContext<'_>, target: &Point, kind: AttackKind, damage: i32) -> GameMessage {
    GameMessage::MonsterAttack {
        monster_id: ctx.monster.id,
        target_player_id: target.owner_id.clone().unwrap_or_default(),
        attack_type: kind,
        damage: damage as f32,
    }
}

/// Melee or ranged attack on the monster's current target.
///
/// Firing latches the shared attack slot to this kind; only the recovery
/// [`Wait`](super::Wait) that follows in the tree releases it.
pub struct Attack {
    kind: AttackKind,
    params: AttackParams,
    actions: Arc<ActionState>,
    state: Arc<Mutex<AttackState>>,
}

impl Attack {
    pub fn melee(
        params: AttackParams,
        actions: Arc<ActionState>,
        state: Arc<Mutex<AttackState>>,
    ) -> Self {
        Self {
            kind: AttackKind::Melee,
            params,
            actions,
            state,
        }
    }

    pub fn ranged(
        params: AttackParams,
        actions: Arc<ActionState>,
        state: Arc<Mutex<AttackState>>,
    ) -> Self {
        Self {
            kind: AttackKind::Ranged,
            params,
            actions,
            state,
        }
    }
}

impl Node for Attack {
    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Status {
        let Some(_slot) = self.actions.acquire(Action::Attack(self.kind), ctx.now) else {
            return Status::Failure;
        };

        let mut state = self.state.lock();
        let target = match check_attack(&mut state, self.kind, &self.params, ctx) {
            Ok(target) => target,
            Err(status) => return status,
        };

        state.record_attack(self.kind, ctx.now);
        debug!(
            "Monster {}: {:?} attack on {:?}",
            ctx.monster.id, self.kind, target.owner_id
        );

        if self.kind == AttackKind::Ranged {
            ctx.events.broadcast(GameMessage::MonsterProjectile {
                monster_id: ctx.monster.id,
                projectile_id: 1,
                start_x: ctx.monster.x,
                start_z: ctx.monster.z,
                target_x: target.x,
                target_z: target.z,
            });
        }
        ctx.events
            .broadcast(attack_message(ctx, &target, self.kind, self.params.damage));

        Status::Success
    }
}

/// Area attack: strikes points scattered uniformly (by radius and angle)
/// over a disk around the monster, then announces the attack.
pub struct MeteorAttack {
    params: AttackParams,
    strike_radius: f32,
    actions: Arc<ActionState>,
    state: Arc<Mutex<AttackState>>,
}

impl MeteorAttack {
    pub fn new(
        params: AttackParams,
        strike_radius: f32,
        actions: Arc<ActionState>,
        state: Arc<Mutex<AttackState>>,
    ) -> Self {
        Self {
            params,
            strike_radius,
            actions,
            state,
        }
    }
}

impl Node for MeteorAttack {
    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Status {
        let kind = AttackKind::Meteor;
        let Some(_slot) = self.actions.acquire(Action::Attack(kind), ctx.now) else {
            return Status::Failure;
        };

        let mut state = self.state.lock();
        let target = match check_attack(&mut state, kind, &self.params, ctx) {
            Ok(target) => target,
            Err(status) => return status,
        };

        let (cx, cz) = (ctx.monster.x, ctx.monster.z);
        let positions: Vec<StrikePosition> = (0..METEOR_STRIKE_COUNT)
            .map(|_| {
                let r = ctx.rng.gen::<f32>() * self.strike_radius;
                let theta = ctx.rng.gen::<f32>() * TAU;
                StrikePosition {
                    x: cx + r * theta.cos(),
                    z: cz + r * theta.sin(),
                }
            })
            .collect();

        ctx.events.broadcast(GameMessage::MeteorStrike {
            monster_id: ctx.monster.id,
            positions,
        });
        ctx.events
            .broadcast(attack_message(ctx, &target, kind, self.params.damage));

        state.record_attack(kind, ctx.now);
        Status::Success
    }
}
