use std::collections::VecDeque;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::action::{EntityId, GameAction, PickupKind, PlayerAction};
use crate::net::{ClientMessage, EntityState, MessageStream, NetworkStats, ServerMessage};
use crate::timestep::FixedTimestep;

use super::config::ServerConfig;
use super::events::{DisconnectReason, ServerEvent};
use super::peer::{PeerId, PeerRegistry};
use super::score::{FileScoreStore, MemoryScoreStore, ScoreStore};
use super::spawn::SpawnTable;
use super::world::ServerWorld;

pub const NEW_PLAYER_NOTICE: &str = "New player!";
pub const ALLY_DISCONNECTED_NOTICE: &str = "An ally has disconnected.";

const MAX_PENDING_EVENTS: usize = 256;
const ENEMY_EXPLODE_SCORE: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenState {
    NotListening,
    Listening,
}

#[derive(Debug, Clone)]
pub struct ServerStats {
    pub peer_count: usize,
    pub max_peers: usize,
    pub entity_count: usize,
    pub listening: bool,
    pub score: i64,
    pub network: NetworkStats,
}

pub struct GameServer {
    config: ServerConfig,
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    peers: PeerRegistry,
    world: ServerWorld,
    spawns: SpawnTable,
    step: FixedTimestep,
    tick: FixedTimestep,
    last_update: Instant,
    rng: StdRng,
    score: Box<dyn ScoreStore>,
    mission_complete: bool,
    relisten_pending: bool,
    running: Arc<AtomicBool>,
    pending_events: VecDeque<ServerEvent>,
}

impl GameServer {
    pub fn bind(config: ServerConfig) -> io::Result<Self> {
        config
            .validate()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let listener = TcpListener::bind(config.bind_addr())?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let score: Box<dyn ScoreStore> = match &config.score_path {
            Some(path) => match FileScoreStore::open(path) {
                Ok(store) => Box::new(store),
                Err(e) => {
                    log::warn!(
                        "Score file {} unusable, keeping score in memory: {}",
                        path.display(),
                        e
                    );
                    Box::new(MemoryScoreStore::default())
                }
            },
            None => Box::new(MemoryScoreStore::default()),
        };

        Ok(Self {
            listener: Some(listener),
            local_addr,
            peers: PeerRegistry::new(),
            world: ServerWorld::new(
                config.world_height,
                config.battlefield_size,
                config.scroll_speed,
            ),
            spawns: SpawnTable::new(config.spawn_points.clone()),
            step: FixedTimestep::new(config.step_rate),
            tick: FixedTimestep::new(config.tick_rate),
            last_update: Instant::now(),
            rng: StdRng::from_entropy(),
            score,
            mission_complete: false,
            relisten_pending: false,
            running: Arc::new(AtomicBool::new(true)),
            pending_events: VecDeque::new(),
            config,
        })
    }

    pub fn with_score_store(mut self, store: Box<dyn ScoreStore>) -> Self {
        self.score = store;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn world(&self) -> &ServerWorld {
        &self.world
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn score(&self) -> i64 {
        self.score.load()
    }

    pub fn listen_state(&self) -> ListenState {
        if self.listener.is_some() {
            ListenState::Listening
        } else {
            ListenState::NotListening
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listen_state() == ListenState::Listening
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ServerEvent> + '_ {
        self.pending_events.drain(..)
    }

    pub fn stats(&self) -> ServerStats {
        let mut network = NetworkStats::default();
        for peer in self.peers.iter() {
            network.merge(peer.stream.stats());
        }

        ServerStats {
            peer_count: self.peers.len(),
            max_peers: self.config.max_peers,
            entity_count: self.world.len(),
            listening: self.is_listening(),
            score: self.score.load(),
            network,
        }
    }

    /// Opens or closes the listening socket. Reopening binds the address the
    /// server originally got, so an ephemeral port stays stable.
    pub fn set_listening(&mut self, enable: bool) -> io::Result<()> {
        match (enable, self.listener.is_some()) {
            (true, false) => {
                let listener = TcpListener::bind(self.local_addr)?;
                listener.set_nonblocking(true)?;
                self.listener = Some(listener);
                log::info!("Listening on {}", self.local_addr);
            }
            (false, true) => {
                self.listener = None;
                self.relisten_pending = false;
                log::info!("Stopped listening, {} peers connected", self.peers.len());
            }
            _ => return Ok(()),
        }
        self.push_event(ServerEvent::ListeningChanged { listening: enable });
        Ok(())
    }

    pub fn run(&mut self) {
        log::info!("Server loop started on {}", self.local_addr);
        self.last_update = Instant::now();

        while self.running.load(Ordering::SeqCst) {
            self.update();
            for event in self.pending_events.drain(..) {
                log::info!("{}", event);
            }
            std::thread::sleep(self.config.idle_sleep);
        }

        self.persist_score();
        log::info!("Server loop stopped");
    }

    /// Runs one loop iteration using the wall-clock time since the previous call.
    pub fn update(&mut self) {
        let now = Instant::now();
        let delta = now.saturating_duration_since(self.last_update).as_secs_f32();
        self.last_update = now;
        self.update_at(now, delta);
    }

    pub(crate) fn update_at(&mut self, now: Instant, delta: f32) {
        self.drain_inbound(now);
        self.detect_timeouts(now);
        self.sweep_disconnected();
        self.accept_pending(now);

        for _ in 0..self.step.advance(delta) {
            self.world.step(self.step.interval());
        }

        for _ in 0..self.tick.advance(delta) {
            self.broadcast_tick();
        }

        self.peers.flush_all();
    }

    fn drain_inbound(&mut self, now: Instant) {
        for id in self.peers.ids() {
            let mut messages = Vec::new();
            if let Some(peer) = self.peers.get_mut(id).filter(|peer| peer.ready) {
                while let Some(result) = peer.stream.receive::<ClientMessage>() {
                    peer.touch(now);
                    match result {
                        Ok(message) => messages.push(message),
                        Err(e) => log::warn!("Dropped malformed message from {}: {}", id, e),
                    }
                }
            }

            for message in messages {
                self.handle_message(id, message);
            }
        }
    }

    fn detect_timeouts(&mut self, now: Instant) {
        let timeout = self.config.client_timeout;
        for id in self.peers.ids() {
            if let Some(peer) = self.peers.get_mut(id) {
                if !peer.timed_out && peer.is_silent_for(timeout, now) {
                    log::info!("{} silent for {:?}, timing out", id, timeout);
                    peer.timed_out = true;
                }
            }
        }
    }

    fn sweep_disconnected(&mut self) {
        let timed_out = self.peers.timed_out();
        if timed_out.is_empty() {
            return;
        }

        let was_full = self.peers.len() >= self.config.max_peers;

        for id in timed_out {
            let Some(peer) = self.peers.remove(id) else {
                continue;
            };

            for entity in &peer.entities {
                self.world.remove(*entity);
                self.peers
                    .broadcast(&ServerMessage::PlayerDisconnect { id: *entity });
            }

            let reason = if peer.stream.is_closed() || peer.quit {
                DisconnectReason::Quit
            } else {
                DisconnectReason::Timeout
            };
            self.push_event(ServerEvent::PeerDisconnected {
                peer: id,
                reason,
                entities: peer.entities,
            });
        }

        self.peers.broadcast(&ServerMessage::BroadcastMessage(
            ALLY_DISCONNECTED_NOTICE.to_string(),
        ));

        if was_full && self.peers.len() < self.config.max_peers {
            if let Err(e) = self.set_listening(true) {
                log::error!("Failed to reopen listener on {}: {}", self.local_addr, e);
                self.relisten_pending = true;
            }
        }

        self.persist_score();
    }

    fn accept_pending(&mut self, now: Instant) {
        if self.relisten_pending {
            match self.set_listening(true) {
                Ok(()) => self.relisten_pending = false,
                Err(e) => {
                    log::debug!("Listener still unavailable: {}", e);
                    return;
                }
            }
        }

        let Some(listener) = &self.listener else {
            return;
        };

        match listener.accept() {
            Ok((stream, addr)) => self.accept_peer(stream, addr, now),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => log::warn!("Accept failed: {}", e),
        }
    }

    fn accept_peer(&mut self, stream: TcpStream, addr: SocketAddr, now: Instant) {
        let stream = match MessageStream::new(stream, self.config.stream_limits()) {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("Rejected connection from {}: {}", addr, e);
                return;
            }
        };

        let (spawn_index, position) = self.spawns.next_point();
        let entity = self.world.spawn(position, self.config.spawn_hitpoints);

        self.peers
            .broadcast(&ServerMessage::BroadcastMessage(NEW_PLAYER_NOTICE.to_string()));

        let existing: Vec<EntityId> = self
            .peers
            .ready()
            .flat_map(|peer| peer.entities.iter().copied())
            .collect();
        let initial_state = ServerMessage::InitialState {
            world_height: self.world.world_height(),
            scroll: self.world.scroll_offset(),
            entities: self.world.states_of(&existing),
        };

        let id = self.peers.insert(stream);
        if let Some(peer) = self.peers.get_mut(id) {
            peer.send(&initial_state);
        }

        self.peers
            .broadcast(&ServerMessage::PlayerConnect { id: entity, position });

        if let Some(peer) = self.peers.get_mut(id) {
            peer.entities.push(entity);
            peer.send(&ServerMessage::SpawnSelf { id: entity, position });
            peer.ready = true;
            peer.touch(now);
        }

        self.push_event(ServerEvent::PeerConnected {
            peer: id,
            addr,
            entity,
            spawn_index,
        });

        if self.peers.len() >= self.config.max_peers {
            // Closing cannot fail.
            let _ = self.set_listening(false);
        }
    }

    fn handle_message(&mut self, from: PeerId, message: ClientMessage) {
        match message {
            ClientMessage::PlayerEvent { id, action } => {
                if self.sender_owns(from, id) {
                    self.peers
                        .broadcast(&ServerMessage::PlayerEvent { id, action });
                }
            }
            ClientMessage::PlayerRealtimeChange {
                id,
                action,
                enabled,
            } => {
                if self.sender_owns(from, id) {
                    self.handle_realtime_change(id, action, enabled);
                }
            }
            ClientMessage::RequestCoopPartner => self.handle_coop_request(from),
            ClientMessage::PositionUpdate(states) => self.handle_position_update(from, &states),
            ClientMessage::GameEvent { action, position } => {
                self.handle_game_event(from, action, position)
            }
            ClientMessage::Quit => {
                if let Some(peer) = self.peers.get_mut(from) {
                    log::info!("{} quit", from);
                    peer.quit = true;
                    peer.timed_out = true;
                }
            }
        }
    }

    fn sender_owns(&self, from: PeerId, id: EntityId) -> bool {
        let owns = self.peers.get(from).is_some_and(|peer| peer.owns(id));
        if !owns {
            log::debug!("{} sent input for entity {} it does not own", from, id);
        }
        owns
    }

    fn handle_realtime_change(&mut self, id: EntityId, action: PlayerAction, enabled: bool) {
        self.world.set_action(id, action, enabled);
        self.peers.broadcast(&ServerMessage::PlayerRealtimeChange {
            id,
            action,
            enabled,
        });
    }

    fn handle_coop_request(&mut self, from: PeerId) {
        let position = self.world.battlefield().center();
        let entity = self.world.spawn(position, self.config.spawn_hitpoints);

        if let Some(peer) = self.peers.get_mut(from) {
            peer.entities.push(entity);
            peer.send(&ServerMessage::AcceptCoopPartner {
                id: entity,
                position,
            });
        }
        self.peers.broadcast_except(
            Some(from),
            &ServerMessage::PlayerConnect {
                id: entity,
                position,
            },
        );
        self.push_event(ServerEvent::CoopPartnerJoined { peer: from, entity });
    }

    fn handle_position_update(&mut self, from: PeerId, states: &[EntityState]) {
        let Some(peer) = self.peers.get(from) else {
            return;
        };

        for state in states {
            if !peer.owns(state.id) {
                log::debug!("{} reported entity {} it does not own", from, state.id);
                continue;
            }
            self.world.apply_state(state);
        }
    }

    /// Only the authority peer's explosions count, so a kill reported by every
    /// client is scored and rolled for loot once.
    fn handle_game_event(&mut self, from: PeerId, action: GameAction, position: Vec2) {
        match action {
            GameAction::EnemyExplode => {
                if self.peers.authority() != Some(from) {
                    return;
                }

                self.score.add(ENEMY_EXPLODE_SCORE);

                if self.rng.gen_range(0..self.config.pickup_drop_odds) == 0 {
                    let kind = PickupKind::ALL[self.rng.gen_range(0..PickupKind::ALL.len())];
                    self.peers
                        .broadcast(&ServerMessage::SpawnPickup { kind, position });
                    self.push_event(ServerEvent::PickupSpawned { kind, position });
                }
            }
        }
    }

    fn broadcast_tick(&mut self) {
        self.peers.broadcast(&ServerMessage::UpdateClientState {
            scroll: self.world.scroll_offset(),
            entities: self.world.transforms(),
        });

        if !self.mission_complete && self.world.all_reached(self.config.finish_line_y) {
            self.mission_complete = true;
            self.peers.broadcast(&ServerMessage::MissionSuccess);
            self.push_event(ServerEvent::MissionSuccess);
        }

        for entity in self.world.prune_destroyed() {
            if let Some(owner) = self.peers.owner_of(entity) {
                if let Some(peer) = self.peers.get_mut(owner) {
                    peer.entities.retain(|id| *id != entity);
                }
            }
            log::debug!("Entity {} destroyed", entity);
        }
    }

    fn push_event(&mut self, event: ServerEvent) {
        if self.pending_events.len() >= MAX_PENDING_EVENTS {
            self.pending_events.pop_front();
        }
        self.pending_events.push_back(event);
    }

    fn persist_score(&mut self) {
        if let Err(e) = self.score.persist() {
            log::warn!("Failed to persist score: {}", e);
        }
    }
}

impl Drop for GameServer {
    fn drop(&mut self) {
        self.persist_score();
    }
}
