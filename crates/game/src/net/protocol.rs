use glam::Vec2;

use crate::action::{EntityId, GameAction, PickupKind, PlayerAction};

use super::codec::{PacketReader, PacketWriter, ProtocolError};

pub const DEFAULT_PORT: u16 = 5000;

const ENTITY_STATE_SIZE: usize = 20;
const ENTITY_TRANSFORM_SIZE: usize = 16;

/// A message that travels as one frame: an `i32` opcode followed by its payload.
pub trait WireMessage: Sized {
    fn opcode(&self) -> i32;
    fn encode_payload(&self, writer: &mut PacketWriter);
    fn decode_payload(opcode: i32, reader: &mut PacketReader<'_>) -> Result<Self, ProtocolError>;

    fn to_bytes(&self) -> Vec<u8> {
        let mut writer = PacketWriter::new();
        writer.write_i32(self.opcode());
        self.encode_payload(&mut writer);
        writer.into_bytes()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = PacketReader::new(bytes);
        let opcode = reader.read_i32()?;
        let message = Self::decode_payload(opcode, &mut reader)?;
        reader.finish()?;
        Ok(message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityState {
    pub id: EntityId,
    pub position: Vec2,
    pub hitpoints: i32,
    pub rotation: f32,
}

impl EntityState {
    fn encode(&self, writer: &mut PacketWriter) {
        writer
            .write_i32(self.id)
            .write_vec2(self.position)
            .write_i32(self.hitpoints)
            .write_f32(self.rotation);
    }

    fn decode(reader: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            id: reader.read_i32()?,
            position: reader.read_vec2()?,
            hitpoints: reader.read_i32()?,
            rotation: reader.read_f32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityTransform {
    pub id: EntityId,
    pub position: Vec2,
    pub rotation: f32,
}

impl EntityTransform {
    fn encode(&self, writer: &mut PacketWriter) {
        writer
            .write_i32(self.id)
            .write_vec2(self.position)
            .write_f32(self.rotation);
    }

    fn decode(reader: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            id: reader.read_i32()?,
            position: reader.read_vec2()?,
            rotation: reader.read_f32()?,
        })
    }
}

fn encode_states(writer: &mut PacketWriter, states: &[EntityState]) {
    writer.write_count(states.len());
    for state in states {
        state.encode(writer);
    }
}

fn decode_states(reader: &mut PacketReader<'_>) -> Result<Vec<EntityState>, ProtocolError> {
    let count = reader.read_count(ENTITY_STATE_SIZE)?;
    (0..count).map(|_| EntityState::decode(reader)).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    PlayerEvent {
        id: EntityId,
        action: PlayerAction,
    },
    PlayerRealtimeChange {
        id: EntityId,
        action: PlayerAction,
        enabled: bool,
    },
    RequestCoopPartner,
    PositionUpdate(Vec<EntityState>),
    GameEvent {
        action: GameAction,
        position: Vec2,
    },
    Quit,
}

impl WireMessage for ClientMessage {
    fn opcode(&self) -> i32 {
        match self {
            ClientMessage::PlayerEvent { .. } => 0,
            ClientMessage::PlayerRealtimeChange { .. } => 1,
            ClientMessage::RequestCoopPartner => 2,
            ClientMessage::PositionUpdate(_) => 3,
            ClientMessage::GameEvent { .. } => 4,
            ClientMessage::Quit => 5,
        }
    }

    fn encode_payload(&self, writer: &mut PacketWriter) {
        match self {
            ClientMessage::PlayerEvent { id, action } => {
                writer.write_i32(*id).write_i32(action.to_wire());
            }
            ClientMessage::PlayerRealtimeChange {
                id,
                action,
                enabled,
            } => {
                writer
                    .write_i32(*id)
                    .write_i32(action.to_wire())
                    .write_bool(*enabled);
            }
            ClientMessage::PositionUpdate(states) => encode_states(writer, states),
            ClientMessage::GameEvent { action, position } => {
                writer.write_i32(action.to_wire()).write_vec2(*position);
            }
            ClientMessage::RequestCoopPartner | ClientMessage::Quit => {}
        }
    }

    fn decode_payload(opcode: i32, reader: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
        let message = match opcode {
            0 => ClientMessage::PlayerEvent {
                id: reader.read_i32()?,
                action: PlayerAction::from_wire(reader.read_i32()?)?,
            },
            1 => ClientMessage::PlayerRealtimeChange {
                id: reader.read_i32()?,
                action: PlayerAction::from_wire(reader.read_i32()?)?,
                enabled: reader.read_bool()?,
            },
            2 => ClientMessage::RequestCoopPartner,
            3 => ClientMessage::PositionUpdate(decode_states(reader)?),
            4 => ClientMessage::GameEvent {
                action: GameAction::from_wire(reader.read_i32()?)?,
                position: reader.read_vec2()?,
            },
            5 => ClientMessage::Quit,
            other => return Err(ProtocolError::UnknownOpcode(other)),
        };
        Ok(message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    BroadcastMessage(String),
    SpawnSelf {
        id: EntityId,
        position: Vec2,
    },
    InitialState {
        world_height: f32,
        scroll: f32,
        entities: Vec<EntityState>,
    },
    PlayerEvent {
        id: EntityId,
        action: PlayerAction,
    },
    PlayerRealtimeChange {
        id: EntityId,
        action: PlayerAction,
        enabled: bool,
    },
    PlayerConnect {
        id: EntityId,
        position: Vec2,
    },
    PlayerDisconnect {
        id: EntityId,
    },
    AcceptCoopPartner {
        id: EntityId,
        position: Vec2,
    },
    SpawnPickup {
        kind: PickupKind,
        position: Vec2,
    },
    UpdateClientState {
        scroll: f32,
        entities: Vec<EntityTransform>,
    },
    MissionSuccess,
}

impl WireMessage for ServerMessage {
    fn opcode(&self) -> i32 {
        match self {
            ServerMessage::BroadcastMessage(_) => 0,
            ServerMessage::SpawnSelf { .. } => 1,
            ServerMessage::InitialState { .. } => 2,
            ServerMessage::PlayerEvent { .. } => 3,
            ServerMessage::PlayerRealtimeChange { .. } => 4,
            ServerMessage::PlayerConnect { .. } => 5,
            ServerMessage::PlayerDisconnect { .. } => 6,
            ServerMessage::AcceptCoopPartner { .. } => 7,
            ServerMessage::SpawnPickup { .. } => 8,
            ServerMessage::UpdateClientState { .. } => 9,
            ServerMessage::MissionSuccess => 10,
        }
    }

    fn encode_payload(&self, writer: &mut PacketWriter) {
        match self {
            ServerMessage::BroadcastMessage(text) => {
                writer.write_str(text);
            }
            ServerMessage::SpawnSelf { id, position }
            | ServerMessage::PlayerConnect { id, position }
            | ServerMessage::AcceptCoopPartner { id, position } => {
                writer.write_i32(*id).write_vec2(*position);
            }
            ServerMessage::InitialState {
                world_height,
                scroll,
                entities,
            } => {
                writer.write_f32(*world_height).write_f32(*scroll);
                encode_states(writer, entities);
            }
            ServerMessage::PlayerEvent { id, action } => {
                writer.write_i32(*id).write_i32(action.to_wire());
            }
            ServerMessage::PlayerRealtimeChange {
                id,
                action,
                enabled,
            } => {
                writer
                    .write_i32(*id)
                    .write_i32(action.to_wire())
                    .write_bool(*enabled);
            }
            ServerMessage::PlayerDisconnect { id } => {
                writer.write_i32(*id);
            }
            ServerMessage::SpawnPickup { kind, position } => {
                writer.write_i32(kind.to_wire()).write_vec2(*position);
            }
            ServerMessage::UpdateClientState { scroll, entities } => {
                writer.write_f32(*scroll).write_count(entities.len());
                for entity in entities {
                    entity.encode(writer);
                }
            }
            ServerMessage::MissionSuccess => {}
        }
    }

    fn decode_payload(opcode: i32, reader: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
        let message = match opcode {
            0 => ServerMessage::BroadcastMessage(reader.read_string()?),
            1 => ServerMessage::SpawnSelf {
                id: reader.read_i32()?,
                position: reader.read_vec2()?,
            },
            2 => ServerMessage::InitialState {
                world_height: reader.read_f32()?,
                scroll: reader.read_f32()?,
                entities: decode_states(reader)?,
            },
            3 => ServerMessage::PlayerEvent {
                id: reader.read_i32()?,
                action: PlayerAction::from_wire(reader.read_i32()?)?,
            },
            4 => ServerMessage::PlayerRealtimeChange {
                id: reader.read_i32()?,
                action: PlayerAction::from_wire(reader.read_i32()?)?,
                enabled: reader.read_bool()?,
            },
            5 => ServerMessage::PlayerConnect {
                id: reader.read_i32()?,
                position: reader.read_vec2()?,
            },
            6 => ServerMessage::PlayerDisconnect {
                id: reader.read_i32()?,
            },
            7 => ServerMessage::AcceptCoopPartner {
                id: reader.read_i32()?,
                position: reader.read_vec2()?,
            },
            8 => ServerMessage::SpawnPickup {
                kind: PickupKind::from_wire(reader.read_i32()?)?,
                position: reader.read_vec2()?,
            },
            9 => {
                let scroll = reader.read_f32()?;
                let count = reader.read_count(ENTITY_TRANSFORM_SIZE)?;
                let entities = (0..count)
                    .map(|_| EntityTransform::decode(reader))
                    .collect::<Result<_, _>>()?;
                ServerMessage::UpdateClientState { scroll, entities }
            }
            10 => ServerMessage::MissionSuccess,
            other => return Err(ProtocolError::UnknownOpcode(other)),
        };
        Ok(message)
    }
}
