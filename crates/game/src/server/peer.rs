use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use crate::action::EntityId;
use crate::net::{MessageStream, SendError, WireMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(u32);

impl PeerId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

#[derive(Debug)]
pub struct Peer {
    pub id: PeerId,
    pub stream: MessageStream,
    pub ready: bool,
    pub timed_out: bool,
    pub quit: bool,
    pub last_packet_time: Instant,
    pub entities: Vec<EntityId>,
}

impl Peer {
    fn new(id: PeerId, stream: MessageStream) -> Self {
        Self {
            id,
            stream,
            ready: false,
            timed_out: false,
            quit: false,
            last_packet_time: Instant::now(),
            entities: Vec::new(),
        }
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_packet_time = self.last_packet_time.max(now);
    }

    pub fn is_silent_for(&self, timeout: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_packet_time) >= timeout
    }

    pub fn owns(&self, id: EntityId) -> bool {
        self.entities.contains(&id)
    }

    pub fn send<M: WireMessage>(&mut self, message: &M) {
        match self.stream.send(message) {
            Ok(()) => {}
            Err(SendError::Closed) => {}
            Err(e) => log::warn!("Dropped message to {}: {}", self.id, e),
        }
    }
}

/// Peer arena addressed by stable ids; iteration follows join order.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: HashMap<PeerId, Peer>,
    order: Vec<PeerId>,
    next_peer_id: u32,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self {
            peers: HashMap::new(),
            order: Vec::new(),
            next_peer_id: 1,
        }
    }

    pub fn insert(&mut self, stream: MessageStream) -> PeerId {
        let id = PeerId(self.next_peer_id);
        self.next_peer_id += 1;
        self.peers.insert(id, Peer::new(id, stream));
        self.order.push(id);
        id
    }

    pub fn remove(&mut self, id: PeerId) -> Option<Peer> {
        let peer = self.peers.remove(&id)?;
        self.order.retain(|other| *other != id);
        Some(peer)
    }

    pub fn get(&self, id: PeerId) -> Option<&Peer> {
        self.peers.get(&id)
    }

    pub fn get_mut(&mut self, id: PeerId) -> Option<&mut Peer> {
        self.peers.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Snapshot of ids in join order, safe to hold while peers are mutated.
    pub fn ids(&self) -> Vec<PeerId> {
        self.order.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.order.iter().filter_map(|id| self.peers.get(id))
    }

    pub fn ready(&self) -> impl Iterator<Item = &Peer> {
        self.iter().filter(|peer| peer.ready)
    }

    /// The oldest ready peer. Its game events are the only ones that can drop pickups.
    pub fn authority(&self) -> Option<PeerId> {
        self.ready().next().map(|peer| peer.id)
    }

    pub fn owner_of(&self, entity: EntityId) -> Option<PeerId> {
        self.iter()
            .find(|peer| peer.owns(entity))
            .map(|peer| peer.id)
    }

    pub fn timed_out(&self) -> Vec<PeerId> {
        self.iter()
            .filter(|peer| peer.timed_out)
            .map(|peer| peer.id)
            .collect()
    }

    pub fn broadcast<M: WireMessage>(&mut self, message: &M) {
        self.broadcast_except(None, message);
    }

    pub fn broadcast_except<M: WireMessage>(&mut self, skip: Option<PeerId>, message: &M) {
        for id in &self.order {
            if Some(*id) == skip {
                continue;
            }
            if let Some(peer) = self.peers.get_mut(id).filter(|peer| peer.ready) {
                peer.send(message);
            }
        }
    }

    pub fn flush_all(&mut self) {
        for peer in self.peers.values_mut() {
            peer.stream.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{TcpListener, TcpStream};

    use super::*;
    use crate::net::StreamLimits;

    fn stream(listener: &TcpListener) -> (MessageStream, TcpStream) {
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (accepted, _) = listener.accept().unwrap();
        (
            MessageStream::new(accepted, StreamLimits::default()).unwrap(),
            client,
        )
    }

    #[test]
    fn ids_are_stable_across_removal() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut registry = PeerRegistry::new();
        let mut clients = Vec::new();

        let mut ids = Vec::new();
        for _ in 0..3 {
            let (s, c) = stream(&listener);
            clients.push(c);
            ids.push(registry.insert(s));
        }

        registry.remove(ids[1]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids(), vec![ids[0], ids[2]]);
        assert!(registry.get(ids[2]).is_some());

        let (s, c) = stream(&listener);
        clients.push(c);
        let fourth = registry.insert(s);
        assert!(fourth.raw() > ids[2].raw());
    }

    #[test]
    fn authority_is_oldest_ready_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut registry = PeerRegistry::new();
        let (s1, _c1) = stream(&listener);
        let (s2, _c2) = stream(&listener);
        let first = registry.insert(s1);
        let second = registry.insert(s2);

        assert_eq!(registry.authority(), None);
        registry.get_mut(second).unwrap().ready = true;
        assert_eq!(registry.authority(), Some(second));
        registry.get_mut(first).unwrap().ready = true;
        assert_eq!(registry.authority(), Some(first));

        registry.remove(first);
        assert_eq!(registry.authority(), Some(second));
    }

    #[test]
    fn silence_is_measured_from_last_packet() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut registry = PeerRegistry::new();
        let (s, _c) = stream(&listener);
        let id = registry.insert(s);
        let peer = registry.get_mut(id).unwrap();

        let later = peer.last_packet_time + Duration::from_secs(3);
        assert!(peer.is_silent_for(Duration::from_secs(3), later));
        assert!(!peer.is_silent_for(Duration::from_secs(4), later));

        peer.entities.push(7);
        assert!(peer.owns(7));
        assert_eq!(registry.owner_of(7), Some(id));
    }
}
