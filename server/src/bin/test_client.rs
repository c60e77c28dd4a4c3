//! Headless bot for exercising a running server.
//!
//! Logs in, walks a circle around the monster spawn point reporting its
//! position, and logs every message the server sends back.

use clap::Parser;
use log::{info, warn};
use server::network::{read_frame, write_message};
use shared::{decode_payload, GameMessage, Vec3, MAX_FRAME_LEN};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address
    #[clap(short, long, default_value = "127.0.0.1:9090")]
    server: String,
    /// Player name used at login
    #[clap(short, long, default_value = "bot")]
    name: String,
    /// Radius of the walked circle
    #[clap(short, long, default_value = "8.0")]
    radius: f32,
    /// Position updates per second
    #[clap(short, long, default_value = "5")]
    update_rate: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();
    let args = Args::parse();

    let stream = TcpStream::connect(&args.server).await?;
    info!("Connected to {}", args.server);
    let (mut reader, mut writer) = stream.into_split();

    write_message(
        &mut writer,
        &GameMessage::Login {
            player_id: args.name.clone(),
            player_template: 0,
        },
    )
    .await?;

    let receiver = tokio::spawn(async move {
        loop {
            match read_frame(&mut reader, MAX_FRAME_LEN).await {
                Ok(Some(payload)) => match decode_payload(&payload) {
                    Ok(message) => info!("<- {:?}", message),
                    Err(e) => warn!("Undecodable message: {}", e),
                },
                Ok(None) => {
                    info!("Server closed the connection");
                    break;
                }
                Err(e) => {
                    warn!("Receive failed: {}", e);
                    break;
                }
            }
        }
    });

    let period = Duration::from_secs_f32(1.0 / args.update_rate.max(1) as f32);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut angle: f32 = 0.0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                angle += 0.1;
                let position = Vec3::new(
                    10.0 + args.radius * angle.cos(),
                    0.0,
                    10.0 + args.radius * angle.sin(),
                );
                let message = GameMessage::PlayerPosition {
                    player_id: args.name.clone(),
                    position,
                    rotation_y: angle,
                };
                if let Err(e) = write_message(&mut writer, &message).await {
                    warn!("Send failed: {}", e);
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                write_message(&mut writer, &GameMessage::Logout { player_id: args.name.clone() }).await?;
                info!("Logged out");
                break;
            }
        }
    }

    receiver.abort();
    Ok(())
}
