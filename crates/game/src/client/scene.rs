use glam::Vec2;

use crate::action::{EntityId, GameAction, PickupKind};

use super::command::Command;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityView {
    pub position: Vec2,
    pub rotation: f32,
    pub hitpoints: i32,
}

/// The local game world as seen by the network session: entity lifecycle,
/// transforms, command dispatch and the outgoing game-action feed.
pub trait Scene {
    fn spawn_entity(&mut self, id: EntityId, position: Vec2);
    fn remove_entity(&mut self, id: EntityId);
    fn query_entity(&self, id: EntityId) -> Option<EntityView>;
    fn set_transform(&mut self, id: EntityId, position: Vec2, rotation: f32);
    fn set_hitpoints(&mut self, id: EntityId, hitpoints: i32);
    fn apply_command(&mut self, command: &Command);
    fn create_pickup(&mut self, kind: PickupKind, position: Vec2);
    fn set_world_height(&mut self, height: f32);
    fn set_scroll(&mut self, offset: f32);

    /// Next game action raised by local gameplay, if any.
    fn poll_game_action(&mut self) -> Option<(GameAction, Vec2)>;
}
