//! # Monster AI Server Library
//!
//! This library provides the authoritative server for a small real-time
//! multiplayer game. It tracks connected players, runs the AI of every
//! monster on a fixed tick, and broadcasts the resulting events to all
//! clients, which animate them.
//!
//! ## Core Responsibilities
//!
//! ### Monster AI
//! Each monster is driven by its own behavior tree, evaluated once per
//! tick. Behaviors such as melee, ranged and meteor attacks, chasing and
//! turning compete for a single action slot per monster and coordinate
//! cooldowns and recovery waits through shared per-monster records.
//!
//! ### Player Management
//! Handles the lifecycle of logged-in players:
//! - Login with spawn replay of existing players and monsters
//! - Position updates relayed to the other players
//! - Animator and damage relays
//! - Logout on request or when the connection drops
//!
//! ### Event Broadcasting
//! Monster decisions leave the server as intent messages (move, rotate,
//! attack, projectile, meteor strike, damage). Delivery is best effort: a
//! client whose outbound queue is full misses messages rather than
//! stalling the tick.
//!
//! ## Architecture Design
//!
//! ### Tick-Driven Simulation
//! A single game loop runs every monster's tree in turn at a fixed period.
//! No node ever blocks; timed actions such as animated turns and recovery
//! waits store a deadline and report `Running` until it passes.
//!
//! ### TCP-Based Communication
//! Clients connect over TCP. Every message is a bincode-encoded
//! [`shared::GameMessage`] behind a 4-byte little-endian length prefix.
//! Each connection has a reader task and a writer task fed by a bounded
//! queue.
//!
//! ## Module Organization
//!
//! ### Behavior Module (`behavior`)
//! The behavior tree engine: node contract, composites, perception,
//! movement and attack leaves, and assembly of the standard monster tree.
//!
//! ### Monster Manager Module (`monster_manager`)
//! Monster bodies, health and damage handling, id assignment and the
//! per-tick update of all monsters.
//!
//! ### Player Manager Module (`player_manager`)
//! The player registry, spawn replay on login and message fan-out.
//!
//! ### Game Module (`game`)
//! The shared world handle and the fixed-rate tick loop.
//!
//! ### Network Module (`network`)
//! Listener, per-connection tasks, framing and client message dispatch.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     // Listen on port 9090 and tick the AI at 10Hz
//!     let server = Server::bind(ServerConfig::new("127.0.0.1:9090", 10)).await?;
//!
//!     // One monster at the configured spawn point
//!     server.world().spawn_default_monster().await;
//!
//!     server.run().await
//! }
//! ```

pub mod behavior;
pub mod config;
pub mod game;
pub mod geometry;
pub mod monster_manager;
pub mod network;
pub mod player_manager;
