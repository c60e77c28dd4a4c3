//! Behavior tree engine driving monster AI.
//!
//! Every node exposes a single [`Node::execute`] call returning a
//! three-valued [`Status`]. Composite nodes own their children; leaf nodes
//! reach the monster, the player list and the broadcast fan-out through the
//! [`TickContext`] handed down for the duration of one tick.
//!
//! Several branches of one tree compete for a monster's single action slot
//! and attack cycle. They coordinate through the records in [`state`], so a
//! tree can be re-evaluated every tick without duplicating effects.
//!
//! ## Modules
//!
//! - `composite`: sequence, selector, random and mutually exclusive selector
//! - `pattern`: the combat/chase macro-behavior arbiter
//! - `wait`: recovery waits tied to the shared attack state
//! - `perception`: player detection and facing predicates
//! - `movement`: rotation and chase actions, and the gate holding a tree
//!   while an animated turn plays out
//! - `attack`: melee, ranged and meteor attacks
//! - `tree`: assembly of the canonical monster tree

pub mod attack;
pub mod composite;
pub mod movement;
pub mod pattern;
pub mod perception;
pub mod state;
pub mod tree;
pub mod wait;

use crate::geometry::Point;
use crate::monster_manager::MonsterBody;
use rand::rngs::StdRng;
use shared::GameMessage;
use std::time::Instant;

pub use attack::{Attack, MeteorAttack};
pub use composite::{MutuallyExclusiveSelector, Random, Selector, Sequence};
pub use movement::{Chase, HoldDuringTurn, RotateToTarget, RotateWithoutAnimation};
pub use pattern::PatternTracker;
pub use perception::{DetectPlayer, InSightCheck, RotationCheckBeforeChase};
pub use state::{
    Action, ActionState, AttackState, MonsterStates, Pattern, PatternState, Turn, TurnState,
};
pub use tree::build_monster_tree;
pub use wait::Wait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure,
    Running,
}

/// Read access to the current player positions.
pub trait PlayerSource: Send + Sync {
    /// Positions of all players, tagged with their ids. The order is
    /// stable; the first entry is the default target.
    fn list_points(&self) -> Vec<Point>;
}

/// Best-effort fan-out of a game event to every connected player.
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, message: GameMessage);
}

impl PlayerSource for Vec<Point> {
    fn list_points(&self) -> Vec<Point> {
        self.clone()
    }
}

/// Everything a node may touch during one tick of one monster.
pub struct TickContext<'a> {
    pub now: Instant,
    pub monster: &'a mut MonsterBody,
    pub players: &'a dyn PlayerSource,
    pub events: &'a dyn Broadcaster,
    pub rng: &'a mut StdRng,
}

pub trait Node: Send + Sync {
    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Status;
}

impl Node for Box<dyn Node> {
    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Status {
        (**self).execute(ctx)
    }
}
