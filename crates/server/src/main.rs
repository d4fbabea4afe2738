use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use tankfront::ServerConfig;
use tankfront::server::GameServer;

#[derive(Parser)]
#[command(name = "tankfront-server")]
#[command(about = "Dedicated tankfront game server")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: IpAddr,

    #[arg(short, long, default_value_t = tankfront::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value_t = 10)]
    max_peers: usize,

    #[arg(short, long, default_value_t = 20, help = "State broadcasts per second")]
    tick_rate: u32,

    #[arg(long, default_value_t = 0.0, help = "Battlefield scroll speed in units per second")]
    scroll_speed: f32,

    #[arg(long, default_value_t = 3, help = "One in N enemy explosions drops a pickup")]
    pickup_odds: u32,

    #[arg(long, help = "JSON file the shared score is kept in")]
    score_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig {
        bind_address: args.bind,
        port: args.port,
        max_peers: args.max_peers,
        tick_rate: args.tick_rate,
        scroll_speed: args.scroll_speed,
        pickup_drop_odds: args.pickup_odds,
        score_path: args.score_file,
        ..ServerConfig::default()
    };

    let mut server = GameServer::bind(config)
        .with_context(|| format!("could not start server on {}:{}", args.bind, args.port))?;
    log::info!(
        "Server started on {} (score {})",
        server.local_addr(),
        server.score()
    );
    server.run();
    Ok(())
}
