//! World state shared between connections and the monster tick
//!
//! Lock order: whenever both registries are needed, `players` is taken
//! before `monsters`.

use crate::config::AiConfig;
use crate::monster_manager::MonsterManager;
use crate::player_manager::PlayerManager;
use log::debug;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::{interval, MissedTickBehavior};

/// Handle to both registries; cheap to clone.
#[derive(Clone)]
pub struct World {
    pub players: Arc<RwLock<PlayerManager>>,
    pub monsters: Arc<RwLock<MonsterManager>>,
}

impl World {
    pub fn new(config: AiConfig) -> Self {
        Self::from_monsters(MonsterManager::new(config))
    }

    pub fn with_rng(config: AiConfig, rng: StdRng) -> Self {
        Self::from_monsters(MonsterManager::with_rng(config, rng))
    }

    fn from_monsters(monsters: MonsterManager) -> Self {
        Self {
            players: Arc::new(RwLock::new(PlayerManager::new())),
            monsters: Arc::new(RwLock::new(monsters)),
        }
    }

    /// Spawns a monster announced to all current players.
    pub async fn spawn_monster(&self, x: f32, z: f32, max_health: i32) -> i32 {
        let players = self.players.read().await;
        let mut monsters = self.monsters.write().await;
        monsters.spawn_monster(x, z, max_health, &*players, &*players)
    }

    /// Spawns a monster at the configured spawn point.
    pub async fn spawn_default_monster(&self) -> i32 {
        let (x, z, max_health) = {
            let monsters = self.monsters.read().await;
            let config = monsters.config();
            (config.spawn_x, config.spawn_z, config.max_health)
        };
        self.spawn_monster(x, z, max_health).await
    }

    /// Runs every monster's behavior tree once.
    pub async fn tick(&self, now: Instant) {
        let players = self.players.read().await;
        let mut monsters = self.monsters.write().await;
        monsters.update_all(now, &*players, &*players);
    }
}

/// Drives the monster AI at a fixed period until the task is dropped.
///
/// Late ticks are skipped rather than bunched up.
pub async fn run_game_loop(world: World, tick_duration: Duration) {
    let mut tick_interval = interval(tick_duration);
    tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Skip the first tick since it fires immediately
    tick_interval.tick().await;

    let mut tick: u64 = 0;
    loop {
        tick_interval.tick().await;
        tick += 1;

        let started = Instant::now();
        world.tick(started).await;

        if tick % 100 == 0 {
            let (player_count, monster_count) = {
                let players = world.players.read().await;
                let monsters = world.monsters.read().await;
                (players.len(), monsters.len())
            };
            debug!(
                "Tick {}: {} players, {} monsters, {:?} per tick",
                tick,
                player_count,
                monster_count,
                started.elapsed()
            );
        }
    }
}
