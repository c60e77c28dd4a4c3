//! Connected player registry and message fan-out
//!
//! Each logged-in player owns the sending half of its connection's outbound
//! queue. Every send is a non-blocking `try_send`: a player whose queue is
//! full or closed misses the message instead of stalling the sender, which
//! is usually the game tick.
//!
//! Players are kept in join order. The first player in that order is the
//! default target of every monster.

use crate::behavior::{Broadcaster, PlayerSource};
use crate::geometry::Point;
use log::{info, warn};
use shared::{GameMessage, Vec3};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// A logged-in player and the queue feeding its connection
#[derive(Debug)]
pub struct Player {
    /// Name chosen by the client at login
    pub id: String,
    /// Client-side character template
    pub template: i32,
    pub position: Vec3,
    pub rotation_y: f32,
    sender: mpsc::Sender<GameMessage>,
}

impl Player {
    pub fn new(id: impl Into<String>, template: i32, sender: mpsc::Sender<GameMessage>) -> Self {
        Self {
            id: id.into(),
            template,
            position: Vec3::default(),
            rotation_y: 0.0,
            sender,
        }
    }

    /// Queues a message for this player's connection.
    ///
    /// Returns false if the message was dropped.
    pub fn send(&self, message: GameMessage) -> bool {
        match self.sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Outbound queue full for player {}, dropping message", self.id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Connection of player {} is closed, dropping message", self.id);
                false
            }
        }
    }

    pub fn point(&self) -> Point {
        Point::owned_by(self.position.x, self.position.z, self.id.clone())
    }

    fn spawn_other_message(&self) -> GameMessage {
        GameMessage::SpawnOtherPlayer {
            player_id: self.id.clone(),
            position: self.position,
            rotation_y: self.rotation_y,
            player_template: self.template,
        }
    }
}

/// Manages every logged-in player
#[derive(Debug, Default)]
pub struct PlayerManager {
    /// Players in join order
    players: Vec<Player>,
}

impl PlayerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a player and brings everyone up to date
    ///
    /// The new player receives its own spawn, then `monster_spawns`, then one
    /// spawn per player already present. Everyone else learns about the new
    /// player. Logging in again under a taken id replaces the old entry; the
    /// others see a logout for it before the new spawn.
    pub fn add_player(
        &mut self,
        id: &str,
        template: i32,
        sender: mpsc::Sender<GameMessage>,
        monster_spawns: Vec<GameMessage>,
    ) {
        if self.index_of(id).is_some() {
            warn!("Player {} logged in again, replacing previous session", id);
            self.remove_player(id);
        }

        let player = Player::new(id, template, sender);
        player.send(GameMessage::SpawnMyPlayer {
            position: player.position,
            rotation_y: player.rotation_y,
            player_template: player.template,
        });

        self.broadcast(player.spawn_other_message());

        for spawn in monster_spawns {
            player.send(spawn);
        }
        for other in &self.players {
            player.send(other.spawn_other_message());
        }

        info!("Player {} joined ({} online)", id, self.players.len() + 1);
        self.players.push(player);
    }

    /// Stores a reported position and relays it to everyone else.
    ///
    /// Returns false for an unknown player.
    pub fn move_player(&mut self, id: &str, position: Vec3, rotation_y: f32) -> bool {
        let Some(player) = self.players.iter_mut().find(|p| p.id == id) else {
            warn!("Position update for unknown player {}", id);
            return false;
        };
        player.position = position;
        player.rotation_y = rotation_y;

        self.broadcast_except(
            id,
            GameMessage::PlayerPosition {
                player_id: id.to_string(),
                position,
                rotation_y,
            },
        );
        true
    }

    /// Removes a player and announces the logout to the remaining players.
    ///
    /// Returns false for an unknown player.
    pub fn remove_player(&mut self, id: &str) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        self.players.remove(index);
        info!("Player {} left ({} online)", id, self.players.len());

        self.broadcast(GameMessage::Logout {
            player_id: id.to_string(),
        });
        true
    }

    /// Removes `id` only if it is still bound to the connection behind
    /// `sender`; a stale connection must not log out a newer session.
    pub fn remove_connection(&mut self, id: &str, sender: &mpsc::Sender<GameMessage>) -> bool {
        match self.get_player(id) {
            Some(player) if player.sender.same_channel(sender) => self.remove_player(id),
            _ => false,
        }
    }

    pub fn get_player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Sends to every player except `exclude`.
    pub fn broadcast_except(&self, exclude: &str, message: GameMessage) {
        for player in self.players.iter().filter(|p| p.id != exclude) {
            player.send(message.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }
}

impl PlayerSource for PlayerManager {
    fn list_points(&self) -> Vec<Point> {
        self.players.iter().map(Player::point).collect()
    }
}

impl Broadcaster for PlayerManager {
    fn broadcast(&self, message: GameMessage) {
        for player in &self.players {
            player.send(message.clone());
        }
    }
}
