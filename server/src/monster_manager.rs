//! Monster registry and per-monster simulation state
//!
//! A [`Monster`] pairs its physical state ([`MonsterBody`]) with the
//! behavior tree that drives it and the shared records the tree coordinates
//! through. All three are created together at spawn and live exactly as
//! long as the monster.
//!
//! The [`MonsterManager`] owns every monster, hands out ids and advances
//! all of them once per game tick.

use crate::behavior::{build_monster_tree, Broadcaster, MonsterStates, Node, PlayerSource, TickContext};
use crate::config::AiConfig;
use crate::geometry::{bearing, Point};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{GameMessage, Vec3};
use std::collections::BTreeMap;
use std::time::Instant;

/// Position, facing, health and target of a monster
///
/// Health is kept within `0..=max_health` by every mutation.
#[derive(Debug, Clone)]
pub struct MonsterBody {
    pub id: i32,
    pub x: f32,
    pub z: f32,
    /// Facing in radians
    pub rotation: f32,
    health: i32,
    max_health: i32,
    pub target: Option<Point>,
    path: Vec<Point>,
    path_index: usize,
}

impl MonsterBody {
    pub fn new(id: i32, x: f32, z: f32, max_health: i32) -> Self {
        let max_health = max_health.max(0);
        Self {
            id,
            x,
            z,
            rotation: 0.0,
            health: max_health,
            max_health,
            target: None,
            path: Vec::new(),
            path_index: 0,
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.z)
    }

    pub fn set_position(&mut self, x: f32, z: f32) {
        self.x = x;
        self.z = z;
    }

    pub fn set_target(&mut self, target: Option<Point>) {
        self.target = target;
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn max_health(&self) -> i32 {
        self.max_health
    }

    /// Sets health, clamped to `0..=max_health`.
    pub fn set_health(&mut self, health: i32) {
        self.health = health.clamp(0, self.max_health);
    }

    pub fn is_dead(&self) -> bool {
        self.health == 0
    }

    /// Replaces the waypoint path and restarts it from the first point.
    pub fn set_path(&mut self, path: Vec<Point>) {
        self.path = path;
        self.path_index = 0;
    }

    pub fn path(&self) -> &[Point] {
        &self.path
    }

    pub fn path_index(&self) -> usize {
        self.path_index
    }

    /// The waypoint currently being approached.
    pub fn current_waypoint(&self) -> Option<&Point> {
        self.path.get(self.path_index)
    }

    /// Moves on to the next waypoint; returns false once the path is done.
    pub fn advance_waypoint(&mut self) -> bool {
        if self.path_index < self.path.len() {
            self.path_index += 1;
        }
        self.path_index < self.path.len()
    }
}

/// Where and how a player's hit landed, relayed to clients for effects
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub point: Vec3,
    pub normal: Vec3,
    pub effect_type: i32,
}

/// A monster together with the behavior tree that drives it
pub struct Monster {
    pub body: MonsterBody,
    behavior: Box<dyn Node>,
    states: MonsterStates,
}

impl Monster {
    pub fn new(body: MonsterBody, config: &AiConfig) -> Self {
        let states = MonsterStates::new(config.pattern_max_repeat);
        let behavior = build_monster_tree(config, &states);
        Self {
            body,
            behavior,
            states,
        }
    }

    pub fn id(&self) -> i32 {
        self.body.id
    }

    pub fn states(&self) -> &MonsterStates {
        &self.states
    }

    /// Runs the behavior tree once. Dead monsters do nothing.
    pub fn update(
        &mut self,
        now: Instant,
        players: &dyn PlayerSource,
        events: &dyn Broadcaster,
        rng: &mut StdRng,
    ) {
        if self.body.is_dead() {
            return;
        }

        let mut ctx = TickContext {
            now,
            monster: &mut self.body,
            players,
            events,
            rng,
        };
        let status = self.behavior.execute(&mut ctx);
        debug!("Monster {} tick: {:?}", self.body.id, status);
    }

    /// Applies damage from a player hit and announces it. Negative damage
    /// heals; health stays within bounds either way.
    pub fn take_damage(&mut self, damage: i32, hit: Hit, events: &dyn Broadcaster) {
        self.body
            .set_health(self.body.health().saturating_sub(damage));

        events.broadcast(GameMessage::MonsterDamage {
            monster_id: self.body.id,
            damage: damage as f32,
            current_hp: self.body.health(),
        });
        events.broadcast(GameMessage::MonsterHitEffect {
            monster_id: self.body.id,
            hit_point: hit.point,
            hit_normal: hit.normal,
            hit_effect_type: hit.effect_type,
        });

        if self.body.is_dead() {
            info!("Monster {} died", self.body.id);
        }
    }

    fn spawn_message(&self) -> GameMessage {
        GameMessage::SpawnMonster {
            monster_id: self.body.id,
            x: self.body.x,
            z: self.body.z,
            rotation_y: self.body.rotation,
        }
    }
}

/// Owns every monster in the world
///
/// Monster ids are assigned sequentially starting at 1 and never reused.
/// Iteration order is by id, so monsters tick in spawn order.
pub struct MonsterManager {
    monsters: BTreeMap<i32, Monster>,
    next_monster_id: i32,
    config: AiConfig,
    rng: StdRng,
}

impl MonsterManager {
    pub fn new(config: AiConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Uses a fixed random source, for reproducible simulations.
    pub fn with_rng(config: AiConfig, rng: StdRng) -> Self {
        Self {
            monsters: BTreeMap::new(),
            next_monster_id: 1,
            config,
            rng,
        }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// Creates a monster facing the first listed player, if any, and
    /// announces it to every player. Returns the new monster's id.
    pub fn spawn_monster(
        &mut self,
        x: f32,
        z: f32,
        max_health: i32,
        players: &dyn PlayerSource,
        events: &dyn Broadcaster,
    ) -> i32 {
        let monster_id = self.next_monster_id;
        self.next_monster_id += 1;

        let mut body = MonsterBody::new(monster_id, x, z, max_health);
        if let Some(first) = players.list_points().first() {
            body.rotation = bearing(x, z, first);
        }

        let monster = Monster::new(body, &self.config);
        info!(
            "Monster {} spawned at ({:.1}, {:.1}) with {} hp",
            monster_id, x, z, max_health
        );
        events.broadcast(monster.spawn_message());
        self.monsters.insert(monster_id, monster);
        monster_id
    }

    pub fn get_monster(&self, monster_id: i32) -> Option<&Monster> {
        self.monsters.get(&monster_id)
    }

    pub fn get_monster_mut(&mut self, monster_id: i32) -> Option<&mut Monster> {
        self.monsters.get_mut(&monster_id)
    }

    /// `SpawnMonster` messages for every monster, to bring a newly joined
    /// player up to date.
    pub fn spawn_messages(&self) -> Vec<GameMessage> {
        self.monsters.values().map(Monster::spawn_message).collect()
    }

    /// Advances every monster by one tick.
    pub fn update_all(&mut self, now: Instant, players: &dyn PlayerSource, events: &dyn Broadcaster) {
        for monster in self.monsters.values_mut() {
            monster.update(now, players, events, &mut self.rng);
        }
    }

    pub fn len(&self) -> usize {
        self.monsters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monsters.is_empty()
    }
}
