use clap::Parser;
use log::{error, info};
use server::config::{AiConfig, ServerConfig};
use server::network::Server;
use std::path::PathBuf;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "9090")]
    port: u16,
    /// Monster AI ticks per second
    #[clap(short, long, default_value = "10")]
    tick_rate: u32,
    /// Number of monsters spawned at startup
    #[clap(short, long, default_value = "1")]
    monsters: u32,
    /// JSON file overriding AI tunables
    #[clap(long)]
    ai_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();
    let args = Args::parse();

    let mut config = ServerConfig::new(format!("{}:{}", args.host, args.port), args.tick_rate);
    if let Some(path) = &args.ai_config {
        config.ai = AiConfig::from_file(path)?;
        info!("Loaded AI configuration from {}", path.display());
    }

    let server = Server::bind(config).await?;
    let world = server.world();
    for _ in 0..args.monsters {
        world.spawn_default_monster().await;
    }

    tokio::select! {
        result = server.run() => {
            if let Err(e) = &result {
                error!("Server error: {}", e);
            }
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    }
}
