use std::collections::BTreeMap;

use glam::Vec2;

use crate::action::{ActionSet, EntityId, PlayerAction};
use crate::net::{EntityState, EntityTransform};

#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub id: EntityId,
    pub position: Vec2,
    pub rotation: f32,
    pub hitpoints: i32,
    pub actions: ActionSet,
}

impl EntityRecord {
    pub fn state(&self) -> EntityState {
        EntityState {
            id: self.id,
            position: self.position,
            hitpoints: self.hitpoints,
            rotation: self.rotation,
        }
    }

    pub fn transform(&self) -> EntityTransform {
        EntityTransform {
            id: self.id,
            position: self.position,
            rotation: self.rotation,
        }
    }
}

/// Visible slice of the world, anchored at the bottom of the level and moved by scrolling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Battlefield {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Battlefield {
    pub fn center(&self) -> Vec2 {
        self.origin + self.size * 0.5
    }

    pub fn scroll_offset(&self) -> f32 {
        self.origin.y + self.size.y
    }
}

/// Authoritative entity table. Ids are handed out from 1 upward and never reused.
#[derive(Debug)]
pub struct ServerWorld {
    entities: BTreeMap<EntityId, EntityRecord>,
    next_entity_id: EntityId,
    world_height: f32,
    battlefield: Battlefield,
    scroll_speed: f32,
}

impl ServerWorld {
    pub fn new(world_height: f32, battlefield_size: Vec2, scroll_speed: f32) -> Self {
        Self {
            entities: BTreeMap::new(),
            next_entity_id: 1,
            world_height,
            battlefield: Battlefield {
                origin: Vec2::new(0.0, world_height - battlefield_size.y),
                size: battlefield_size,
            },
            scroll_speed,
        }
    }

    pub fn world_height(&self) -> f32 {
        self.world_height
    }

    pub fn battlefield(&self) -> Battlefield {
        self.battlefield
    }

    pub fn scroll_offset(&self) -> f32 {
        self.battlefield.scroll_offset()
    }

    pub fn spawn(&mut self, position: Vec2, hitpoints: i32) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        self.entities.insert(
            id,
            EntityRecord {
                id,
                position,
                rotation: 0.0,
                hitpoints,
                actions: ActionSet::default(),
            },
        );
        id
    }

    pub fn get(&self, id: EntityId) -> Option<&EntityRecord> {
        self.entities.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn remove(&mut self, id: EntityId) -> Option<EntityRecord> {
        self.entities.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Overwrites position, hitpoints and rotation of an existing entity.
    /// Unknown ids are ignored.
    pub fn apply_state(&mut self, state: &EntityState) -> bool {
        match self.entities.get_mut(&state.id) {
            Some(record) => {
                record.position = state.position;
                record.hitpoints = state.hitpoints;
                record.rotation = state.rotation;
                true
            }
            None => false,
        }
    }

    pub fn set_action(&mut self, id: EntityId, action: PlayerAction, enabled: bool) -> bool {
        match self.entities.get_mut(&id) {
            Some(record) => {
                record.actions.set_action(action, enabled);
                true
            }
            None => false,
        }
    }

    pub fn step(&mut self, dt: f32) {
        self.battlefield.origin.y += self.scroll_speed * dt;
    }

    /// True when the table is non-empty and every entity is at or above `finish_line_y`.
    pub fn all_reached(&self, finish_line_y: f32) -> bool {
        !self.entities.is_empty()
            && self
                .entities
                .values()
                .all(|record| record.position.y <= finish_line_y)
    }

    pub fn prune_destroyed(&mut self) -> Vec<EntityId> {
        let destroyed: Vec<EntityId> = self
            .entities
            .values()
            .filter(|record| record.hitpoints <= 0)
            .map(|record| record.id)
            .collect();
        for id in &destroyed {
            self.entities.remove(id);
        }
        destroyed
    }

    pub fn states_of(&self, ids: &[EntityId]) -> Vec<EntityState> {
        ids.iter()
            .filter_map(|id| self.entities.get(id))
            .map(EntityRecord::state)
            .collect()
    }

    pub fn transforms(&self) -> Vec<EntityTransform> {
        self.entities.values().map(EntityRecord::transform).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> ServerWorld {
        ServerWorld::new(768.0, Vec2::new(1024.0, 768.0), 0.0)
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let mut world = world();
        assert_eq!(world.spawn(Vec2::ZERO, 100), 1);
        assert_eq!(world.spawn(Vec2::ZERO, 100), 2);
        world.remove(2);
        assert_eq!(world.spawn(Vec2::ZERO, 100), 3);
    }

    #[test]
    fn scroll_offset_is_bottom_of_battlefield() {
        let mut world = ServerWorld::new(2000.0, Vec2::new(1024.0, 768.0), -40.0);
        assert_eq!(world.scroll_offset(), 2000.0);
        assert_eq!(world.battlefield().center(), Vec2::new(512.0, 1616.0));

        world.step(0.5);
        assert_eq!(world.scroll_offset(), 1980.0);
    }

    #[test]
    fn apply_state_ignores_unknown_ids() {
        let mut world = world();
        let id = world.spawn(Vec2::new(1.0, 1.0), 100);
        let state = EntityState {
            id,
            position: Vec2::new(5.0, 6.0),
            hitpoints: 40,
            rotation: 90.0,
        };
        assert!(world.apply_state(&state));
        assert_eq!(world.get(id).unwrap().state(), state);

        assert!(!world.apply_state(&EntityState { id: 99, ..state }));
        assert!(!world.contains(99));
    }

    #[test]
    fn prune_removes_only_destroyed() {
        let mut world = world();
        let alive = world.spawn(Vec2::ZERO, 1);
        let dead = world.spawn(Vec2::ZERO, 0);
        let overkill = world.spawn(Vec2::ZERO, -20);

        assert_eq!(world.prune_destroyed(), vec![dead, overkill]);
        assert!(world.contains(alive));
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn finish_line_requires_every_entity() {
        let mut world = world();
        assert!(!world.all_reached(0.0));

        let a = world.spawn(Vec2::new(0.0, -5.0), 100);
        let b = world.spawn(Vec2::new(0.0, 10.0), 100);
        assert!(!world.all_reached(0.0));

        world.remove(b);
        assert!(world.all_reached(0.0));
        world.set_action(a, PlayerAction::MoveUp, true);
        assert!(world.get(a).unwrap().actions.is_active(PlayerAction::MoveUp));
    }
}
