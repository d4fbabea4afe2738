mod config;
mod events;
mod game_server;
mod handle;
mod peer;
mod score;
mod spawn;
mod world;

pub use config::{ConfigError, ServerConfig};
pub use events::{DisconnectReason, ServerEvent};
pub use game_server::{
    ALLY_DISCONNECTED_NOTICE, GameServer, ListenState, NEW_PLAYER_NOTICE, ServerStats,
};
pub use handle::ServerHandle;
pub use peer::{Peer, PeerId, PeerRegistry};
pub use score::{FileScoreStore, MemoryScoreStore, ScoreError, ScoreStore};
pub use spawn::{DEFAULT_SPAWN_POINTS, SpawnTable};
pub use world::{Battlefield, EntityRecord, ServerWorld};
