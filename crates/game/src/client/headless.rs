use std::collections::{BTreeMap, VecDeque};

use glam::Vec2;

use crate::action::{EntityId, GameAction, PickupKind};

use super::command::{Category, Command, CommandKind};
use super::scene::{EntityView, Scene};

pub const DEFAULT_HITPOINTS: i32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessEntity {
    pub position: Vec2,
    pub rotation: f32,
    pub hitpoints: i32,
    pub shots_fired: u32,
    pub missiles_launched: u32,
}

/// A scene with no rendering: plain entity records, used by the headless
/// client and by tests.
#[derive(Debug, Default)]
pub struct HeadlessScene {
    entities: BTreeMap<EntityId, HeadlessEntity>,
    pickups: Vec<(PickupKind, Vec2)>,
    game_actions: VecDeque<(GameAction, Vec2)>,
    world_height: f32,
    scroll: f32,
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(&self, id: EntityId) -> Option<&HeadlessEntity> {
        self.entities.get(&id)
    }

    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn pickups(&self) -> &[(PickupKind, Vec2)] {
        &self.pickups
    }

    pub fn world_height(&self) -> f32 {
        self.world_height
    }

    pub fn scroll(&self) -> f32 {
        self.scroll
    }

    /// Queues a game action for the session to forward.
    pub fn queue_game_action(&mut self, action: GameAction, position: Vec2) {
        self.game_actions.push_back((action, position));
    }

    pub fn damage(&mut self, id: EntityId, amount: i32) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.hitpoints -= amount;
        }
    }
}

impl Scene for HeadlessScene {
    fn spawn_entity(&mut self, id: EntityId, position: Vec2) {
        self.entities.insert(
            id,
            HeadlessEntity {
                position,
                rotation: 0.0,
                hitpoints: DEFAULT_HITPOINTS,
                shots_fired: 0,
                missiles_launched: 0,
            },
        );
    }

    fn remove_entity(&mut self, id: EntityId) {
        self.entities.remove(&id);
    }

    fn query_entity(&self, id: EntityId) -> Option<EntityView> {
        self.entities.get(&id).map(|entity| EntityView {
            position: entity.position,
            rotation: entity.rotation,
            hitpoints: entity.hitpoints,
        })
    }

    fn set_transform(&mut self, id: EntityId, position: Vec2, rotation: f32) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.position = position;
            entity.rotation = rotation;
        }
    }

    fn set_hitpoints(&mut self, id: EntityId, hitpoints: i32) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.hitpoints = hitpoints;
        }
    }

    fn apply_command(&mut self, command: &Command) {
        for (id, entity) in self.entities.iter_mut() {
            if !command.applies_to(Category::PLAYER, *id) {
                continue;
            }
            match command.kind {
                CommandKind::Rotate(degrees) => entity.rotation += degrees,
                CommandKind::Move(_) => {
                    entity.position += command.kind.displacement(entity.rotation)
                }
                CommandKind::Fire => entity.shots_fired += 1,
                CommandKind::LaunchMissile => entity.missiles_launched += 1,
            }
        }
    }

    fn create_pickup(&mut self, kind: PickupKind, position: Vec2) {
        self.pickups.push((kind, position));
    }

    fn set_world_height(&mut self, height: f32) {
        self.world_height = height;
    }

    fn set_scroll(&mut self, offset: f32) {
        self.scroll = offset;
    }

    fn poll_game_action(&mut self) -> Option<(GameAction, Vec2)> {
        self.game_actions.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_only_reach_their_target() {
        let mut scene = HeadlessScene::new();
        scene.spawn_entity(1, Vec2::ZERO);
        scene.spawn_entity(2, Vec2::ZERO);

        scene.apply_command(&Command::for_tank(2, CommandKind::Fire));
        scene.apply_command(&Command::for_tank(2, CommandKind::Move(1.5)));

        assert_eq!(scene.entity(1).unwrap().shots_fired, 0);
        assert_eq!(scene.entity(2).unwrap().shots_fired, 1);
        assert_eq!(scene.entity(2).unwrap().position, Vec2::new(0.0, 1.5));
    }

    #[test]
    fn game_actions_drain_in_order() {
        let mut scene = HeadlessScene::new();
        scene.queue_game_action(GameAction::EnemyExplode, Vec2::new(1.0, 2.0));
        scene.queue_game_action(GameAction::EnemyExplode, Vec2::new(3.0, 4.0));

        assert_eq!(
            scene.poll_game_action(),
            Some((GameAction::EnemyExplode, Vec2::new(1.0, 2.0)))
        );
        assert_eq!(
            scene.poll_game_action(),
            Some((GameAction::EnemyExplode, Vec2::new(3.0, 4.0)))
        );
        assert_eq!(scene.poll_game_action(), None);
    }
}
