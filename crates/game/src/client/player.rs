use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::action::{ActionSet, EntityId, PlayerAction};
use crate::net::ClientMessage;

use super::command::{Command, CommandKind, CommandQueue};

const TURN_SPEED: f32 = 2.5;
const MOVE_SPEED: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Space,
    Enter,
    Escape,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    KeyPressed(Key),
    KeyReleased(Key),
}

impl InputEvent {
    pub fn key(&self) -> Key {
        match self {
            InputEvent::KeyPressed(key) | InputEvent::KeyReleased(key) => *key,
        }
    }
}

/// Source of local input for one player.
pub trait InputBinding: Send {
    fn action_for(&self, key: Key) -> Option<PlayerAction>;

    /// Tracks device state from the event stream.
    fn observe(&mut self, event: &InputEvent);

    /// Realtime actions whose keys are currently held.
    fn held_actions(&self) -> ActionSet;

    /// Forgets every held key.
    fn release_all(&mut self);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "KeyMapFile", into = "KeyMapFile")]
pub struct KeyMap {
    bindings: HashMap<Key, PlayerAction>,
    held: HashSet<Key>,
}

/// On-disk form; JSON object keys cannot hold `Key::Char`, so bindings are pairs.
#[derive(Serialize, Deserialize)]
struct KeyMapFile {
    bindings: Vec<(Key, PlayerAction)>,
}

impl From<KeyMapFile> for KeyMap {
    fn from(file: KeyMapFile) -> Self {
        Self::new(file.bindings.into_iter().collect())
    }
}

impl From<KeyMap> for KeyMapFile {
    fn from(map: KeyMap) -> Self {
        Self {
            bindings: map.bindings.into_iter().collect(),
        }
    }
}

impl KeyMap {
    pub fn new(bindings: HashMap<Key, PlayerAction>) -> Self {
        Self {
            bindings,
            held: HashSet::new(),
        }
    }

    pub fn primary() -> Self {
        Self::new(HashMap::from([
            (Key::Left, PlayerAction::TurnLeft),
            (Key::Right, PlayerAction::TurnRight),
            (Key::Up, PlayerAction::MoveUp),
            (Key::Down, PlayerAction::MoveDown),
            (Key::Space, PlayerAction::Fire),
            (Key::Char('m'), PlayerAction::LaunchMissile),
        ]))
    }

    pub fn secondary() -> Self {
        Self::new(HashMap::from([
            (Key::Char('a'), PlayerAction::TurnLeft),
            (Key::Char('d'), PlayerAction::TurnRight),
            (Key::Char('w'), PlayerAction::MoveUp),
            (Key::Char('s'), PlayerAction::MoveDown),
            (Key::Char('f'), PlayerAction::Fire),
            (Key::Char('r'), PlayerAction::LaunchMissile),
        ]))
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl InputBinding for KeyMap {
    fn action_for(&self, key: Key) -> Option<PlayerAction> {
        self.bindings.get(&key).copied()
    }

    fn observe(&mut self, event: &InputEvent) {
        match event {
            InputEvent::KeyPressed(key) => {
                self.held.insert(*key);
            }
            InputEvent::KeyReleased(key) => {
                self.held.remove(key);
            }
        }
    }

    fn held_actions(&self) -> ActionSet {
        let mut actions = ActionSet::default();
        for action in self.held.iter().filter_map(|key| self.action_for(*key)) {
            if action.is_realtime() {
                actions.set_action(action, true);
            }
        }
        actions
    }

    fn release_all(&mut self) {
        self.held.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissionStatus {
    #[default]
    Running,
    Success,
    Failure,
}

/// Binds one tank to either a local input source or, for remote tanks, the
/// realtime state mirrored from the server.
///
/// Input from a local binding goes over the wire when `networked` is set and
/// straight into the command queue otherwise.
pub struct Player {
    id: EntityId,
    binding: Option<Box<dyn InputBinding>>,
    proxies: ActionSet,
}

impl Player {
    pub fn local(id: EntityId, binding: Box<dyn InputBinding>) -> Self {
        Self {
            id,
            binding: Some(binding),
            proxies: ActionSet::default(),
        }
    }

    pub fn remote(id: EntityId) -> Self {
        Self {
            id,
            binding: None,
            proxies: ActionSet::default(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn is_local(&self) -> bool {
        self.binding.is_some()
    }

    pub fn command_for(&self, action: PlayerAction) -> Command {
        let kind = match action {
            PlayerAction::TurnLeft => CommandKind::Rotate(-TURN_SPEED),
            PlayerAction::TurnRight => CommandKind::Rotate(TURN_SPEED),
            PlayerAction::MoveUp => CommandKind::Move(MOVE_SPEED),
            PlayerAction::MoveDown => CommandKind::Move(-MOVE_SPEED),
            PlayerAction::Fire => CommandKind::Fire,
            PlayerAction::LaunchMissile => CommandKind::LaunchMissile,
        };
        Command::for_tank(self.id, kind)
    }

    /// Handles one key event. Returns the message to send, if any.
    pub fn handle_event(
        &mut self,
        event: &InputEvent,
        networked: bool,
        commands: &mut CommandQueue,
    ) -> Option<ClientMessage> {
        let binding = self.binding.as_mut()?;
        binding.observe(event);
        let action = binding.action_for(event.key())?;

        match (action.is_realtime(), event, networked) {
            (false, InputEvent::KeyPressed(_), true) => Some(ClientMessage::PlayerEvent {
                id: self.id,
                action,
            }),
            (false, InputEvent::KeyPressed(_), false) => {
                commands.push(self.command_for(action));
                None
            }
            (true, _, true) => Some(ClientMessage::PlayerRealtimeChange {
                id: self.id,
                action,
                enabled: matches!(event, InputEvent::KeyPressed(_)),
            }),
            _ => None,
        }
    }

    /// Held keys of a local player drive its tank directly, networked or not.
    pub fn handle_realtime_input(&self, commands: &mut CommandQueue) {
        let Some(binding) = &self.binding else {
            return;
        };
        for action in binding.held_actions().actions() {
            commands.push(self.command_for(action));
        }
    }

    /// Remote tanks replay the realtime state mirrored from the server.
    pub fn handle_realtime_network_input(&self, commands: &mut CommandQueue) {
        if self.is_local() {
            return;
        }
        for action in self.proxies.actions().filter(|a| a.is_realtime()) {
            commands.push(self.command_for(action));
        }
    }

    pub fn handle_network_event(&self, action: PlayerAction, commands: &mut CommandQueue) {
        commands.push(self.command_for(action));
    }

    pub fn handle_network_realtime_change(&mut self, action: PlayerAction, enabled: bool) {
        self.proxies.set_action(action, enabled);
    }

    pub fn is_realtime_action_active(&self, action: PlayerAction) -> bool {
        self.proxies.is_active(action)
    }

    /// Drops held keys and returns the messages releasing every realtime action.
    /// Pressing a key again after focus returns re-enables it on the wire.
    pub fn disable_all_realtime_actions(&mut self) -> Vec<ClientMessage> {
        if let Some(binding) = self.binding.as_mut() {
            binding.release_all();
        }
        PlayerAction::ALL
            .into_iter()
            .filter(|action| action.is_realtime())
            .map(|action| ClientMessage::PlayerRealtimeChange {
                id: self.id,
                action,
                enabled: false,
            })
            .collect()
    }
}
