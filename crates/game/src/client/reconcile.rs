use glam::Vec2;

use crate::action::EntityId;
use crate::net::EntityTransform;

use super::scene::Scene;

pub const DEFAULT_SMOOTHING: f32 = 0.1;

/// Moves `current` a fixed fraction of the way to `target`.
pub fn interpolate(current: Vec2, target: Vec2, smoothing: f32) -> Vec2 {
    current + (target - current) * smoothing
}

/// Blends remote entities toward a server snapshot. Entities in `local` are
/// simulated here and left alone; ids missing from the scene are skipped.
/// Returns how many entities were updated.
pub fn apply_snapshot<S: Scene + ?Sized>(
    scene: &mut S,
    entities: &[EntityTransform],
    local: &[EntityId],
    smoothing: f32,
) -> usize {
    let mut updated = 0;
    for entity in entities {
        if local.contains(&entity.id) {
            continue;
        }
        let Some(view) = scene.query_entity(entity.id) else {
            continue;
        };

        let position = interpolate(view.position, entity.position, smoothing);
        scene.set_transform(entity.id, position, entity.rotation);
        updated += 1;
    }
    updated
}
