use std::collections::{BTreeMap, VecDeque};
use std::net::SocketAddr;

use glam::Vec2;

use crate::action::{EntityId, PickupKind};
use crate::net::{ClientMessage, EntityState, MessageStream, SendError, ServerMessage};
use crate::server::{ServerConfig, ServerHandle};
use crate::timestep::FixedTimestep;

use super::command::CommandQueue;
use super::config::ClientConfig;
use super::player::{InputBinding, InputEvent, KeyMap, MissionStatus, Player};
use super::reconcile;
use super::scene::Scene;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

#[derive(Debug, Clone)]
pub enum SessionMode {
    /// Start a server in this process and join it.
    Host(ServerConfig),
    Join(SocketAddr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Broadcast(String),
    MissionSuccess,
    GameOver,
    PickupSpawned { kind: PickupKind, position: Vec2 },
    ConnectionLost,
    Failed(String),
    ReturnToMenu,
}

/// Client side of a networked game. Everything runs from `update`, called once
/// per frame: one inbound message is handled per call and nothing blocks.
pub struct ClientSession {
    config: ClientConfig,
    state: SessionState,
    stream: Option<MessageStream>,
    server: Option<ServerHandle>,
    players: BTreeMap<EntityId, Player>,
    local_entities: Vec<EntityId>,
    bindings: VecDeque<Box<dyn InputBinding>>,
    commands: CommandQueue,
    position_updates: FixedTimestep,
    time_since_last_packet: f32,
    time_since_failure: f32,
    returned_to_menu: bool,
    broadcasts: VecDeque<(String, f32)>,
    pending_events: Vec<SessionEvent>,
    mission: MissionStatus,
    game_started: bool,
    focused: bool,
}

impl ClientSession {
    pub fn connect(mode: SessionMode, config: ClientConfig) -> Self {
        let mut session = Self {
            state: SessionState::Connecting,
            stream: None,
            server: None,
            players: BTreeMap::new(),
            local_entities: Vec::new(),
            bindings: VecDeque::from([
                Box::new(KeyMap::primary()) as Box<dyn InputBinding>,
                Box::new(KeyMap::secondary()),
            ]),
            commands: CommandQueue::new(),
            position_updates: FixedTimestep::new(config.position_update_rate),
            time_since_last_packet: 0.0,
            time_since_failure: 0.0,
            returned_to_menu: false,
            broadcasts: VecDeque::new(),
            pending_events: Vec::new(),
            mission: MissionStatus::Running,
            game_started: false,
            focused: true,
            config,
        };

        let addr = match mode {
            SessionMode::Host(server_config) => match ServerHandle::spawn(server_config) {
                Ok(handle) => {
                    let port = handle.local_addr().port();
                    let addr = SocketAddr::new(session.config.host_address, port);
                    session.server = Some(handle);
                    addr
                }
                Err(e) => {
                    session.fail(format!("Could not start server: {}", e));
                    return session;
                }
            },
            SessionMode::Join(addr) => addr,
        };

        log::info!("Connecting to {}", addr);
        match MessageStream::connect(
            addr,
            session.config.connect_timeout,
            session.config.stream_limits,
        ) {
            Ok(stream) => {
                log::info!("Connected to {}", addr);
                session.stream = Some(stream);
                session.state = SessionState::Connected;
            }
            Err(e) => session.fail(format!("Could not connect to {}: {}", addr, e)),
        }

        session
    }

    /// Replaces the key maps handed to this client's own tanks, in spawn order.
    pub fn with_bindings(mut self, bindings: Vec<Box<dyn InputBinding>>) -> Self {
        self.bindings = bindings.into();
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    pub fn is_host(&self) -> bool {
        self.server.is_some()
    }

    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref().map(MessageStream::peer_addr)
    }

    pub fn local_entities(&self) -> &[EntityId] {
        &self.local_entities
    }

    pub fn player(&self, id: EntityId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_ids(&self) -> Vec<EntityId> {
        self.players.keys().copied().collect()
    }

    pub fn mission_status(&self) -> MissionStatus {
        self.mission
    }

    pub fn current_broadcast(&self) -> Option<&str> {
        self.broadcasts.front().map(|(text, _)| text.as_str())
    }

    pub fn update<S: Scene + ?Sized>(&mut self, dt: f32, scene: &mut S) -> Vec<SessionEvent> {
        match self.state {
            SessionState::Connected => self.update_connected(dt, scene),
            SessionState::Failed | SessionState::Disconnected => {
                self.time_since_failure += dt;
                if !self.returned_to_menu
                    && self.time_since_failure >= self.config.failure_grace.as_secs_f32()
                {
                    self.returned_to_menu = true;
                    self.pending_events.push(SessionEvent::ReturnToMenu);
                }
            }
            SessionState::Connecting => {}
        }

        std::mem::take(&mut self.pending_events)
    }

    fn update_connected<S: Scene + ?Sized>(&mut self, dt: f32, scene: &mut S) {
        self.track_players(scene);

        for player in self.players.values() {
            if self.focused {
                player.handle_realtime_input(&mut self.commands);
            }
            player.handle_realtime_network_input(&mut self.commands);
        }
        self.flush_commands(scene);

        match self.stream.as_mut().and_then(|s| s.receive::<ServerMessage>()) {
            Some(Ok(message)) => {
                self.time_since_last_packet = 0.0;
                self.handle_message(message, scene);
            }
            Some(Err(e)) => {
                self.time_since_last_packet = 0.0;
                log::warn!("Dropped malformed message from server: {}", e);
            }
            None => {
                self.time_since_last_packet += dt;
                if self.time_since_last_packet >= self.config.server_timeout.as_secs_f32() {
                    log::warn!("Lost connection to server");
                    self.state = SessionState::Disconnected;
                    self.time_since_failure = 0.0;
                    self.pending_events.push(SessionEvent::ConnectionLost);
                    return;
                }
            }
        }

        self.expire_broadcasts(dt);

        while let Some((action, position)) = scene.poll_game_action() {
            self.send(&ClientMessage::GameEvent { action, position });
        }

        if self.position_updates.advance(dt) > 0 {
            let states: Vec<EntityState> = self
                .local_entities
                .iter()
                .filter_map(|id| {
                    scene.query_entity(*id).map(|view| EntityState {
                        id: *id,
                        position: view.position,
                        hitpoints: view.hitpoints,
                        rotation: view.rotation,
                    })
                })
                .collect();
            self.send(&ClientMessage::PositionUpdate(states));
        }

        if let Some(stream) = self.stream.as_mut() {
            stream.flush();
        }
    }

    /// Forwards a key event to every local player.
    pub fn handle_event<S: Scene + ?Sized>(&mut self, event: &InputEvent, scene: &mut S) {
        let networked = self.is_connected();
        let mut outgoing = Vec::new();
        for player in self.players.values_mut() {
            if let Some(message) = player.handle_event(event, networked, &mut self.commands) {
                outgoing.push(message);
            }
        }
        for message in outgoing {
            self.send(&message);
        }
        self.flush_commands(scene);
    }

    /// Losing focus releases every held key of the local tanks.
    pub fn set_focus(&mut self, focused: bool) {
        if self.focused && !focused {
            let mut releases = Vec::new();
            for id in &self.local_entities {
                if let Some(player) = self.players.get_mut(id) {
                    releases.extend(player.disable_all_realtime_actions());
                }
            }
            if self.is_connected() {
                for message in releases {
                    self.send(&message);
                }
            }
        }
        self.focused = focused;
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Asks the server for a second locally controlled tank.
    pub fn request_coop_partner(&mut self) -> bool {
        if !self.is_connected() || self.local_entities.len() != 1 {
            return false;
        }
        self.send(&ClientMessage::RequestCoopPartner);
        true
    }

    fn handle_message<S: Scene + ?Sized>(&mut self, message: ServerMessage, scene: &mut S) {
        match message {
            ServerMessage::BroadcastMessage(text) => {
                log::info!("Server: {}", text);
                self.broadcasts
                    .push_back((text.clone(), self.config.broadcast_display.as_secs_f32()));
                self.pending_events.push(SessionEvent::Broadcast(text));
            }
            ServerMessage::SpawnSelf { id, position } => {
                self.add_local_player(id, position, scene);
                self.game_started = true;
            }
            ServerMessage::AcceptCoopPartner { id, position } => {
                self.add_local_player(id, position, scene);
            }
            ServerMessage::PlayerConnect { id, position } => {
                scene.spawn_entity(id, position);
                self.players.insert(id, Player::remote(id));
            }
            ServerMessage::PlayerDisconnect { id } => {
                scene.remove_entity(id);
                self.players.remove(&id);
                self.local_entities.retain(|local| *local != id);
            }
            ServerMessage::InitialState {
                world_height,
                scroll,
                entities,
            } => {
                scene.set_world_height(world_height);
                scene.set_scroll(scroll);
                for entity in entities {
                    scene.spawn_entity(entity.id, entity.position);
                    scene.set_transform(entity.id, entity.position, entity.rotation);
                    scene.set_hitpoints(entity.id, entity.hitpoints);
                    self.players
                        .entry(entity.id)
                        .or_insert_with(|| Player::remote(entity.id));
                }
            }
            ServerMessage::PlayerEvent { id, action } => {
                if let Some(player) = self.players.get(&id) {
                    player.handle_network_event(action, &mut self.commands);
                }
                self.flush_commands(scene);
            }
            ServerMessage::PlayerRealtimeChange {
                id,
                action,
                enabled,
            } => {
                if let Some(player) = self.players.get_mut(&id) {
                    player.handle_network_realtime_change(action, enabled);
                }
            }
            ServerMessage::SpawnPickup { kind, position } => {
                scene.create_pickup(kind, position);
                self.pending_events
                    .push(SessionEvent::PickupSpawned { kind, position });
            }
            ServerMessage::UpdateClientState { scroll, entities } => {
                scene.set_scroll(scroll);
                reconcile::apply_snapshot(
                    scene,
                    &entities,
                    &self.local_entities,
                    self.config.smoothing,
                );
            }
            ServerMessage::MissionSuccess => {
                if self.mission == MissionStatus::Running {
                    log::info!("Mission success");
                    self.mission = MissionStatus::Success;
                    self.pending_events.push(SessionEvent::MissionSuccess);
                }
            }
        }
    }

    fn add_local_player<S: Scene + ?Sized>(&mut self, id: EntityId, position: Vec2, scene: &mut S) {
        scene.spawn_entity(id, position);
        let binding = self
            .bindings
            .pop_front()
            .unwrap_or_else(|| Box::new(KeyMap::primary()) as Box<dyn InputBinding>);
        self.players.insert(id, Player::local(id, binding));
        if !self.local_entities.contains(&id) {
            self.local_entities.push(id);
        }
    }

    /// Drops players whose tanks are gone and detects the loss of every local tank.
    fn track_players<S: Scene + ?Sized>(&mut self, scene: &S) {
        self.players
            .retain(|id, _| scene.query_entity(*id).is_some());

        let any_local_alive = self
            .local_entities
            .iter()
            .any(|id| scene.query_entity(*id).is_some());
        if self.game_started && !any_local_alive && self.mission == MissionStatus::Running {
            log::info!("All local tanks destroyed");
            self.mission = MissionStatus::Failure;
            self.pending_events.push(SessionEvent::GameOver);
        }
    }

    fn flush_commands<S: Scene + ?Sized>(&mut self, scene: &mut S) {
        while let Some(command) = self.commands.pop() {
            scene.apply_command(&command);
        }
    }

    fn expire_broadcasts(&mut self, dt: f32) {
        if let Some((_, remaining)) = self.broadcasts.front_mut() {
            *remaining -= dt;
            if *remaining <= 0.0 {
                self.broadcasts.pop_front();
            }
        }
    }

    fn send(&mut self, message: &ClientMessage) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        match stream.send(message) {
            Ok(()) | Err(SendError::Closed) => {}
            Err(e) => log::warn!("Dropped message to server: {}", e),
        }
    }

    fn fail(&mut self, reason: String) {
        log::error!("{}", reason);
        self.state = SessionState::Failed;
        self.time_since_failure = 0.0;
        self.pending_events.push(SessionEvent::Failed(reason));
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        if self.is_connected() && !self.is_host() {
            self.send(&ClientMessage::Quit);
            if let Some(stream) = self.stream.as_mut() {
                stream.flush();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::PlayerAction;
    use crate::client::{HeadlessScene, Key};
    use crate::net::{FrameBuffer, WireMessage};
    use std::io::Read;
    use std::net::{IpAddr, Ipv4Addr, TcpListener, TcpStream};
    use std::thread;
    use std::time::{Duration, Instant};

    fn loopback_server_config() -> ServerConfig {
        ServerConfig {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            ..ServerConfig::default()
        }
    }

    /// A session joined to a bare listener, with the accepted server side.
    fn connected_pair() -> (ClientSession, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let session = ClientSession::connect(SessionMode::Join(addr), ClientConfig::default());
        let (server_side, _) = listener.accept().unwrap();
        server_side
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        (session, server_side)
    }

    fn read_messages(stream: &mut TcpStream, wanted: usize, wait: Duration) -> Vec<ClientMessage> {
        let deadline = Instant::now() + wait;
        let mut frames = FrameBuffer::default();
        let mut messages = Vec::new();
        let mut chunk = [0u8; 4096];
        while messages.len() < wanted && Instant::now() < deadline {
            if let Ok(n) = stream.read(&mut chunk) {
                frames.extend(&chunk[..n]);
            }
            while let Some(frame) = frames.next_frame() {
                messages.push(ClientMessage::from_bytes(&frame.unwrap()).unwrap());
            }
        }
        messages
    }

    fn pump_until(
        session: &mut ClientSession,
        scene: &mut HeadlessScene,
        events: &mut Vec<SessionEvent>,
        done: impl Fn(&ClientSession, &HeadlessScene) -> bool,
    ) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            events.extend(session.update(1.0 / 60.0, scene));
            if done(session, scene) {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn unreachable_server_fails_then_returns_to_menu() {
        let addr = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();

        let mut session = ClientSession::connect(SessionMode::Join(addr), ClientConfig::default());
        let mut scene = HeadlessScene::new();
        assert_eq!(session.state(), SessionState::Failed);

        let first = session.update(1.0, &mut scene);
        assert!(matches!(first.as_slice(), [SessionEvent::Failed(_)]));

        let mut returned = 0;
        for _ in 0..8 {
            returned += session
                .update(1.0, &mut scene)
                .iter()
                .filter(|e| **e == SessionEvent::ReturnToMenu)
                .count();
        }
        assert_eq!(returned, 1);
    }

    #[test]
    fn hosting_spawns_a_local_tank() {
        let mut session = ClientSession::connect(
            SessionMode::Host(loopback_server_config()),
            ClientConfig::default(),
        );
        assert!(session.is_host());
        assert!(session.is_connected());

        let mut scene = HeadlessScene::new();
        let mut events = Vec::new();
        assert!(pump_until(&mut session, &mut scene, &mut events, |s, _| {
            !s.local_entities().is_empty()
        }));

        let id = session.local_entities()[0];
        assert!(scene.entity(id).is_some());
        assert!(session.player(id).is_some_and(Player::is_local));
        assert_eq!(session.mission_status(), MissionStatus::Running);
        assert_eq!(scene.world_height(), ServerConfig::default().world_height);
    }

    #[test]
    fn losing_every_local_tank_is_game_over() {
        let mut session = ClientSession::connect(
            SessionMode::Host(loopback_server_config()),
            ClientConfig::default(),
        );
        let mut scene = HeadlessScene::new();
        let mut events = Vec::new();
        assert!(pump_until(&mut session, &mut scene, &mut events, |s, _| {
            !s.local_entities().is_empty()
        }));

        let id = session.local_entities()[0];
        scene.remove_entity(id);
        events.extend(session.update(1.0 / 60.0, &mut scene));
        events.extend(session.update(1.0 / 60.0, &mut scene));

        assert_eq!(
            events.iter().filter(|e| **e == SessionEvent::GameOver).count(),
            1
        );
        assert_eq!(session.mission_status(), MissionStatus::Failure);
        assert!(session.player(id).is_none());
    }

    #[test]
    fn coop_request_needs_exactly_one_local_tank() {
        let addr = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let mut session = ClientSession::connect(SessionMode::Join(addr), ClientConfig::default());
        assert!(!session.request_coop_partner());
    }

    #[test]
    fn broadcasts_are_shown_one_after_another() {
        let (mut session, _server_side) = connected_pair();
        let mut scene = HeadlessScene::new();
        for text in ["New player!", "An ally has disconnected."] {
            session.handle_message(ServerMessage::BroadcastMessage(text.to_string()), &mut scene);
        }
        assert_eq!(session.current_broadcast(), Some("New player!"));

        session.expire_broadcasts(2.4);
        assert_eq!(session.current_broadcast(), Some("New player!"));

        session.expire_broadcasts(0.2);
        assert_eq!(
            session.current_broadcast(),
            Some("An ally has disconnected.")
        );

        session.expire_broadcasts(2.5);
        assert_eq!(session.current_broadcast(), None);
    }

    #[test]
    fn losing_focus_releases_realtime_actions_of_every_local_tank() {
        let (mut session, mut server_side) = connected_pair();
        let mut scene = HeadlessScene::new();
        session.handle_message(
            ServerMessage::SpawnSelf {
                id: 1,
                position: Vec2::ZERO,
            },
            &mut scene,
        );
        session.handle_message(
            ServerMessage::AcceptCoopPartner {
                id: 2,
                position: Vec2::ZERO,
            },
            &mut scene,
        );

        session.handle_event(&InputEvent::KeyPressed(Key::Up), &mut scene);
        let pressed = read_messages(&mut server_side, 1, Duration::from_secs(2));
        assert_eq!(
            pressed,
            vec![ClientMessage::PlayerRealtimeChange {
                id: 1,
                action: PlayerAction::MoveUp,
                enabled: true,
            }]
        );

        session.set_focus(false);
        assert!(!session.is_focused());
        let releases = read_messages(&mut server_side, 10, Duration::from_secs(2));
        assert_eq!(releases.len(), 10);
        for id in [1, 2] {
            let released: Vec<PlayerAction> = releases
                .iter()
                .filter_map(|m| match m {
                    ClientMessage::PlayerRealtimeChange {
                        id: target,
                        action,
                        enabled: false,
                    } if *target == id => Some(*action),
                    _ => None,
                })
                .collect();
            let expected: Vec<PlayerAction> = PlayerAction::ALL
                .into_iter()
                .filter(|a| a.is_realtime())
                .collect();
            assert_eq!(released, expected);
        }

        // The held key was forgotten, so pressing it again is reported.
        session.set_focus(true);
        session.handle_event(&InputEvent::KeyPressed(Key::Up), &mut scene);
        let pressed_again = read_messages(&mut server_side, 1, Duration::from_secs(2));
        assert_eq!(pressed_again, pressed);
    }

    #[test]
    fn losing_focus_sends_nothing_when_not_connected() {
        let (mut session, mut server_side) = connected_pair();
        let mut scene = HeadlessScene::new();
        session.handle_message(
            ServerMessage::SpawnSelf {
                id: 1,
                position: Vec2::ZERO,
            },
            &mut scene,
        );
        session.state = SessionState::Disconnected;

        session.set_focus(false);
        assert!(read_messages(&mut server_side, 1, Duration::from_millis(200)).is_empty());
    }
}
