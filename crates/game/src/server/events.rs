use std::fmt;
use std::net::SocketAddr;

use glam::Vec2;

use crate::action::{EntityId, PickupKind};

use super::peer::PeerId;

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    PeerConnected {
        peer: PeerId,
        addr: SocketAddr,
        entity: EntityId,
        spawn_index: usize,
    },
    PeerDisconnected {
        peer: PeerId,
        reason: DisconnectReason,
        entities: Vec<EntityId>,
    },
    ListeningChanged {
        listening: bool,
    },
    CoopPartnerJoined {
        peer: PeerId,
        entity: EntityId,
    },
    PickupSpawned {
        kind: PickupKind,
        position: Vec2,
    },
    MissionSuccess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Quit,
    Timeout,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Quit => "quit",
            DisconnectReason::Timeout => "timed out",
        }
    }
}

impl fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerEvent::PeerConnected {
                peer,
                addr,
                entity,
                spawn_index,
            } => write!(
                f,
                "{} connected from {} (entity {}, spawn {})",
                peer, addr, entity, spawn_index
            ),
            ServerEvent::PeerDisconnected {
                peer,
                reason,
                entities,
            } => write!(f, "{} {} (entities {:?})", peer, reason.as_str(), entities),
            ServerEvent::ListeningChanged { listening: true } => write!(f, "Listening enabled"),
            ServerEvent::ListeningChanged { listening: false } => {
                write!(f, "Listening disabled, server full")
            }
            ServerEvent::CoopPartnerJoined { peer, entity } => {
                write!(f, "{} added coop partner {}", peer, entity)
            }
            ServerEvent::PickupSpawned { kind, position } => {
                write!(f, "Spawned {:?} pickup at ({}, {})", kind, position.x, position.y)
            }
            ServerEvent::MissionSuccess => write!(f, "Mission success"),
        }
    }
}
