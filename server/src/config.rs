//! Runtime configuration for the server and the monster AI
//!
//! [`ServerConfig`] carries the networking and tick parameters chosen on the
//! command line. [`AiConfig`] holds every tunable of the behavior tree; its
//! defaults reproduce the stock monster and any subset of fields can be
//! overridden from a JSON file.

use crate::behavior::attack::AttackParams;
use crate::behavior::movement::ChaseParams;
use serde::{Deserialize, Serialize};
use shared::MAX_FRAME_LEN;
use std::path::Path;
use std::time::Duration;

/// Range, damage and timing of one attack kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    pub range: f32,
    pub damage: i32,
    pub cooldown_ms: u64,
    /// Recovery wait after the attack fires
    pub wait_ms: u64,
}

impl AttackConfig {
    fn new(range: f32, damage: i32, cooldown_ms: u64, wait_ms: u64) -> Self {
        Self {
            range,
            damage,
            cooldown_ms,
            wait_ms,
        }
    }

    pub fn params(&self) -> AttackParams {
        AttackParams {
            range: self.range,
            damage: self.damage,
            cooldown: Duration::from_millis(self.cooldown_ms),
        }
    }

    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self::new(4.0, 10, 4_000, 5_000)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeteorConfig {
    pub attack: AttackConfig,
    pub strike_radius: f32,
}

impl Default for MeteorConfig {
    fn default() -> Self {
        Self {
            attack: AttackConfig::new(40.0, 15, 10_000, 5_000),
            strike_radius: 40.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaseConfig {
    pub base_speed: f32,
    /// Speed gained per second of chasing
    pub acceleration: f32,
    pub max_speed: f32,
    /// Length of one chase pulse
    pub pulse_ms: u64,
    pub wait_ms: u64,
}

impl ChaseConfig {
    pub fn params(&self) -> ChaseParams {
        ChaseParams {
            base_speed: self.base_speed,
            acceleration: self.acceleration,
            max_speed: self.max_speed,
            pulse: Duration::from_millis(self.pulse_ms),
        }
    }

    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }
}

impl Default for ChaseConfig {
    fn default() -> Self {
        Self {
            base_speed: 2.0,
            acceleration: 1.1,
            max_speed: 7.0,
            pulse_ms: 2_000,
            wait_ms: 10_000,
        }
    }
}

/// Angles are in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotateConfig {
    pub base_duration_secs: f32,
    pub min_angle: f32,
    pub view_angle: f32,
    /// Above this the chase pattern turns with an animation first
    pub large_angle_threshold: f32,
    /// Duration value sent with instant rotations
    pub instant_marker: f32,
}

impl Default for RotateConfig {
    fn default() -> Self {
        Self {
            base_duration_secs: 3.0,
            min_angle: 10.0,
            view_angle: 90.0,
            large_angle_threshold: 25.0,
            instant_marker: 2.0,
        }
    }
}

/// Tunables of the monster behavior tree and of spawned monsters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub detection_range: f32,
    pub detection_interval_ms: u64,
    pub melee: AttackConfig,
    pub ranged: AttackConfig,
    pub meteor: MeteorConfig,
    pub chase: ChaseConfig,
    pub rotate: RotateConfig,
    /// Pause between ranged and meteor picks
    pub selector_cooldown_ms: u64,
    pub pattern_max_repeat: u32,
    pub chase_probability: f32,
    pub spawn_x: f32,
    pub spawn_z: f32,
    pub max_health: i32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            detection_range: 50.0,
            detection_interval_ms: 500,
            melee: AttackConfig::new(4.0, 10, 4_000, 5_000),
            ranged: AttackConfig::new(30.0, 8, 10_000, 5_000),
            meteor: MeteorConfig::default(),
            chase: ChaseConfig::default(),
            rotate: RotateConfig::default(),
            selector_cooldown_ms: 5_000,
            pattern_max_repeat: 2,
            chase_probability: 0.25,
            spawn_x: 10.0,
            spawn_z: 10.0,
            max_health: 100,
        }
    }
}

impl AiConfig {
    /// Reads overrides from a JSON file; absent fields keep their defaults.
    pub fn from_file(
        path: impl AsRef<Path>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn detection_interval(&self) -> Duration {
        Duration::from_millis(self.detection_interval_ms)
    }

    pub fn selector_cooldown(&self) -> Duration {
        Duration::from_millis(self.selector_cooldown_ms)
    }
}

/// Server-wide settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the TCP listener binds to
    pub address: String,
    /// Period of the monster tick
    pub tick_duration: Duration,
    /// Outbound messages buffered per connection before new ones are dropped
    pub queue_depth: usize,
    /// Largest accepted frame payload in bytes
    pub max_frame_len: usize,
    pub ai: AiConfig,
}

impl ServerConfig {
    pub fn new(address: impl Into<String>, tick_rate: u32) -> Self {
        Self {
            address: address.into(),
            tick_duration: Duration::from_secs_f64(1.0 / f64::from(tick_rate.max(1))),
            ..Self::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:9090".to_string(),
            tick_duration: Duration::from_millis(100),
            queue_depth: 256,
            max_frame_len: MAX_FRAME_LEN,
            ai: AiConfig::default(),
        }
    }
}
