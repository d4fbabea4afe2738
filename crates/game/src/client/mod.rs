mod command;
mod config;
mod headless;
mod player;
pub mod reconcile;
mod scene;
mod session;

pub use command::{Category, Command, CommandKind, CommandQueue};
pub use config::ClientConfig;
pub use headless::{DEFAULT_HITPOINTS, HeadlessEntity, HeadlessScene};
pub use player::{InputBinding, InputEvent, Key, KeyMap, MissionStatus, Player};
pub use scene::{EntityView, Scene};
pub use session::{ClientSession, SessionEvent, SessionMode, SessionState};
