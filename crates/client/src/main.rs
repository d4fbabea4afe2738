use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;

use tankfront::client::{InputBinding, KeyMap, SessionState};
use tankfront::{
    ClientConfig, ClientSession, HeadlessScene, ServerConfig, SessionEvent, SessionMode,
};

const FRAME: Duration = Duration::from_micros(16_667);

#[derive(Parser)]
#[command(name = "tankfront-client")]
#[command(about = "Headless tankfront client")]
struct Args {
    #[arg(short, long, help = "Server address to join (e.g., 127.0.0.1:5000)")]
    server: Option<SocketAddr>,

    #[arg(long, conflicts_with = "server", help = "Host a game in this process")]
    host: bool,

    #[arg(short, long, default_value_t = tankfront::DEFAULT_PORT)]
    port: u16,

    #[arg(long, help = "Ask for a second local tank once spawned")]
    coop: bool,

    #[arg(long, help = "JSON key map for the first local tank")]
    keymap: Option<PathBuf>,

    #[arg(long, help = "Stop after this many seconds")]
    seconds: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mode = match (args.host, args.server) {
        (true, _) => SessionMode::Host(ServerConfig {
            port: args.port,
            ..ServerConfig::default()
        }),
        (false, Some(addr)) => SessionMode::Join(addr),
        (false, None) => SessionMode::Join(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            args.port,
        )),
    };

    let mut session = ClientSession::connect(mode, ClientConfig::default());
    if let Some(path) = &args.keymap {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("could not read key map {}", path.display()))?;
        let primary = KeyMap::from_json(&json).context("invalid key map")?;
        session = session.with_bindings(vec![
            Box::new(primary) as Box<dyn InputBinding>,
            Box::new(KeyMap::secondary()),
        ]);
    }

    let mut scene = HeadlessScene::new();
    let deadline = args.seconds.map(|s| Instant::now() + Duration::from_secs(s));
    let mut coop_requested = !args.coop;
    let mut last_frame = Instant::now();

    loop {
        let now = Instant::now();
        let dt = now.duration_since(last_frame).as_secs_f32();
        last_frame = now;

        for event in session.update(dt, &mut scene) {
            match event {
                SessionEvent::Broadcast(text) => log::info!("[broadcast] {}", text),
                SessionEvent::PickupSpawned { kind, position } => {
                    log::info!("Pickup {:?} at ({:.0}, {:.0})", kind, position.x, position.y);
                }
                SessionEvent::MissionSuccess => log::info!("Mission successful"),
                SessionEvent::GameOver => log::info!("Mission failed"),
                SessionEvent::ConnectionLost => log::warn!("Connection lost"),
                SessionEvent::Failed(reason) => log::error!("{}", reason),
                SessionEvent::ReturnToMenu => {
                    if session.state() == SessionState::Failed {
                        bail!("could not join a game");
                    }
                    return Ok(());
                }
            }
        }

        if !coop_requested && session.local_entities().len() == 1 {
            coop_requested = session.request_coop_partner();
        }

        if deadline.is_some_and(|d| now >= d) {
            log::info!(
                "Leaving with {} tanks in view, {} local",
                scene.len(),
                session.local_entities().len()
            );
            return Ok(());
        }

        thread::sleep(FRAME.saturating_sub(now.elapsed()));
    }
}
