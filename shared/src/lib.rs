//! Wire protocol shared by the game server and its clients.
//!
//! Every message travels as a frame: a 4-byte little-endian payload length
//! followed by the bincode encoding of a [`GameMessage`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size of the length prefix in front of every frame.
pub const FRAME_HEADER_LEN: usize = 4;
/// Largest payload accepted from a peer.
pub const MAX_FRAME_LEN: usize = 64 * 1024;
/// Number of strike points carried by a meteor attack.
pub const METEOR_STRIKE_COUNT: usize = 5;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttackKind {
    Melee,
    Ranged,
    Meteor,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct StrikePosition {
    pub x: f32,
    pub z: f32,
}

/// Value carried by an animator parameter relay.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum AnimatorParam {
    Int(i32),
    Float(f32),
    Bool(bool),
    Trigger,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum GameMessage {
    // Client -> server
    Login {
        player_id: String,
        player_template: i32,
    },
    Logout {
        player_id: String,
    },
    PlayerPosition {
        player_id: String,
        position: Vec3,
        rotation_y: f32,
    },
    HitMonster {
        monster_id: i32,
        damage: i32,
        hit_point: Vec3,
        hit_normal: Vec3,
        hit_effect_type: i32,
    },
    PlayerDamage {
        player_id: String,
        damage: f32,
    },
    PlayerAnimator {
        player_id: String,
        anim_id: String,
        param: AnimatorParam,
    },
    ApplyRootMotion {
        player_id: String,
        enabled: bool,
    },

    // Server -> client
    SpawnMyPlayer {
        position: Vec3,
        rotation_y: f32,
        player_template: i32,
    },
    SpawnOtherPlayer {
        player_id: String,
        position: Vec3,
        rotation_y: f32,
        player_template: i32,
    },
    SpawnMonster {
        monster_id: i32,
        x: f32,
        z: f32,
        rotation_y: f32,
    },
    MoveMonster {
        monster_id: i32,
        x: f32,
        z: f32,
    },
    MonsterRotate {
        monster_id: i32,
        rotation: f32,
        duration: f32,
    },
    MonsterAttack {
        monster_id: i32,
        target_player_id: String,
        attack_type: AttackKind,
        damage: f32,
    },
    MonsterProjectile {
        monster_id: i32,
        projectile_id: i32,
        start_x: f32,
        start_z: f32,
        target_x: f32,
        target_z: f32,
    },
    MeteorStrike {
        monster_id: i32,
        positions: Vec<StrikePosition>,
    },
    MonsterDamage {
        monster_id: i32,
        damage: f32,
        current_hp: i32,
    },
    MonsterHitEffect {
        monster_id: i32,
        hit_point: Vec3,
        hit_normal: Vec3,
        hit_effect_type: i32,
    },
}

impl GameMessage {
    /// Id of the monster this message is about, if any.
    pub fn monster_id(&self) -> Option<i32> {
        match self {
            GameMessage::SpawnMonster { monster_id, .. }
            | GameMessage::MoveMonster { monster_id, .. }
            | GameMessage::MonsterRotate { monster_id, .. }
            | GameMessage::MonsterAttack { monster_id, .. }
            | GameMessage::MonsterProjectile { monster_id, .. }
            | GameMessage::MeteorStrike { monster_id, .. }
            | GameMessage::MonsterDamage { monster_id, .. }
            | GameMessage::MonsterHitEffect { monster_id, .. }
            | GameMessage::HitMonster { monster_id, .. } => Some(*monster_id),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame payload of {0} bytes exceeds the frame size limit")]
    TooLarge(usize),
    #[error("malformed message: {0}")]
    Decode(#[from] bincode::Error),
}

/// Serializes a message and prepends its length prefix.
pub fn encode_frame(message: &GameMessage) -> Result<Vec<u8>, FrameError> {
    let payload = bincode::serialize(message)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(payload.len()));
    }

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

pub fn decode_payload(payload: &[u8]) -> Result<GameMessage, FrameError> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(payload.len()));
    }
    Ok(bincode::deserialize(payload)?)
}

/// Decodes the first complete frame in `buf`.
///
/// Returns `Ok(None)` when more bytes are needed, otherwise the message and
/// the number of bytes it consumed.
pub fn decode_frame(buf: &[u8]) -> Result<Option<(GameMessage, usize)>, FrameError> {
    if buf.len() < FRAME_HEADER_LEN {
        return Ok(None);
    }

    let mut header = [0u8; FRAME_HEADER_LEN];
    header.copy_from_slice(&buf[..FRAME_HEADER_LEN]);
    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(len));
    }

    let end = FRAME_HEADER_LEN + len;
    if buf.len() < end {
        return Ok(None);
    }

    let message = decode_payload(&buf[FRAME_HEADER_LEN..end])?;
    Ok(Some((message, end)))
}
