//! Server network layer handling TCP connections and message dispatch

use crate::behavior::Broadcaster;
use crate::config::ServerConfig;
use crate::game::{run_game_loop, World};
use crate::monster_manager::Hit;
use log::{debug, error, info, warn};
use shared::{decode_payload, encode_frame, FrameError, GameMessage, FRAME_HEADER_LEN};
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Reads one length-prefixed frame payload.
///
/// Returns `Ok(None)` when the peer closes the stream between frames.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_frame_len: usize,
) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error + Send + Sync>> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(header) as usize;
    if len > max_frame_len {
        return Err(FrameError::TooLarge(len).into());
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Encodes and writes one message as a frame.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &GameMessage,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let frame = encode_frame(message)?;
    writer.write_all(&frame).await?;
    Ok(())
}

/// Accepts player connections and runs the monster tick alongside them
pub struct Server {
    listener: TcpListener,
    world: World,
    config: ServerConfig,
}

impl Server {
    /// Binds the listener. Monsters can be spawned through [`Server::world`]
    /// before the server starts running.
    pub async fn bind(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(&config.address).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            world: World::new(config.ai.clone()),
            config,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn world(&self) -> World {
        self.world.clone()
    }

    /// Main server loop: accepts connections until the game loop stops.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut game_handle = tokio::spawn(run_game_loop(
            self.world.clone(),
            self.config.tick_duration,
        ));

        info!(
            "Server started successfully ({:?} per tick)",
            self.config.tick_duration
        );

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.spawn_connection(stream, addr),
                        Err(e) => error!("Failed to accept connection: {}", e),
                    }
                },

                result = &mut game_handle => {
                    error!("Game loop stopped");
                    result?;
                    return Ok(());
                },
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let world = self.world.clone();
        let queue_depth = self.config.queue_depth;
        let max_frame_len = self.config.max_frame_len;

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, addr, world, queue_depth, max_frame_len).await {
                error!("Connection {} failed: {}", addr, e);
            }
        });
    }
}

/// Serves one client until it disconnects.
///
/// Outbound messages flow through a bounded queue drained by a dedicated
/// writer task, so slow clients never hold up the tick.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    world: World,
    queue_depth: usize,
    max_frame_len: usize,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Client connected from {}", addr);
    stream.set_nodelay(true)?;
    let (mut reader, mut writer) = stream.into_split();

    let (sender, mut outbound) = mpsc::channel::<GameMessage>(queue_depth);
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            if let Err(e) = write_message(&mut writer, &message).await {
                warn!("Failed to send to {}: {}", addr, e);
                break;
            }
        }
    });

    let mut connection = Connection::new(addr, sender);
    let result = connection.serve(&mut reader, &world, max_frame_len).await;

    connection.close(&world).await;
    writer_task.abort();
    info!("Client {} disconnected", addr);
    result
}

/// Per-connection session state
pub struct Connection {
    addr: SocketAddr,
    sender: mpsc::Sender<GameMessage>,
    player_id: Option<String>,
}

impl Connection {
    pub fn new(addr: SocketAddr, sender: mpsc::Sender<GameMessage>) -> Self {
        Self {
            addr,
            sender,
            player_id: None,
        }
    }

    /// The player logged in over this connection, if any.
    pub fn player_id(&self) -> Option<&str> {
        self.player_id.as_deref()
    }

    async fn serve<R: AsyncRead + Unpin>(
        &mut self,
        reader: &mut R,
        world: &World,
        max_frame_len: usize,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        while let Some(payload) = read_frame(reader, max_frame_len).await? {
            match decode_payload(&payload) {
                Ok(message) => self.process_message(world, message).await,
                Err(e) => warn!("Dropping malformed message from {}: {}", self.addr, e),
            }
        }
        Ok(())
    }

    /// Applies one client message to the world.
    pub async fn process_message(&mut self, world: &World, message: GameMessage) {
        debug!("Message from {}: {:?}", self.addr, message);

        match message {
            GameMessage::Login {
                player_id,
                player_template,
            } => {
                let mut players = world.players.write().await;
                let spawns = world.monsters.read().await.spawn_messages();
                players.add_player(&player_id, player_template, self.sender.clone(), spawns);
                self.player_id = Some(player_id);
            }

            GameMessage::Logout { player_id } => {
                world.players.write().await.remove_player(&player_id);
                if self.player_id.as_deref() == Some(player_id.as_str()) {
                    self.player_id = None;
                }
            }

            GameMessage::PlayerPosition {
                player_id,
                position,
                rotation_y,
            } => {
                world
                    .players
                    .write()
                    .await
                    .move_player(&player_id, position, rotation_y);
            }

            GameMessage::HitMonster {
                monster_id,
                damage,
                hit_point,
                hit_normal,
                hit_effect_type,
            } => {
                let players = world.players.read().await;
                let mut monsters = world.monsters.write().await;
                match monsters.get_monster_mut(monster_id) {
                    Some(monster) => monster.take_damage(
                        damage,
                        Hit {
                            point: hit_point,
                            normal: hit_normal,
                            effect_type: hit_effect_type,
                        },
                        &*players,
                    ),
                    None => warn!("Hit on unknown monster {} from {}", monster_id, self.addr),
                }
            }

            message @ GameMessage::PlayerDamage { .. } => {
                world.players.read().await.broadcast(message);
            }

            GameMessage::PlayerAnimator {
                player_id,
                anim_id,
                param,
            } => {
                let relay = GameMessage::PlayerAnimator {
                    player_id: player_id.clone(),
                    anim_id,
                    param,
                };
                world.players.read().await.broadcast_except(&player_id, relay);
            }

            GameMessage::ApplyRootMotion { player_id, enabled } => {
                let relay = GameMessage::ApplyRootMotion {
                    player_id: player_id.clone(),
                    enabled,
                };
                world.players.read().await.broadcast_except(&player_id, relay);
            }

            other => {
                warn!(
                    "Ignoring server-only message from {}: {:?}",
                    self.addr, other
                );
            }
        }
    }

    /// Logs out the connection's player, if it still owns that session.
    pub async fn close(&mut self, world: &World) {
        if let Some(player_id) = self.player_id.take() {
            world
                .players
                .write()
                .await
                .remove_connection(&player_id, &self.sender);
        }
    }
}
