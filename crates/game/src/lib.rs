pub mod action;
pub mod client;
pub mod net;
pub mod server;
pub mod timestep;

pub use action::{ActionSet, EntityId, GameAction, PickupKind, PlayerAction};
pub use client::{ClientConfig, ClientSession, HeadlessScene, Scene, SessionEvent, SessionMode};
pub use net::{ClientMessage, DEFAULT_PORT, EntityState, EntityTransform, ServerMessage};
pub use server::{GameServer, ServerConfig, ServerEvent, ServerHandle};
pub use timestep::FixedTimestep;
