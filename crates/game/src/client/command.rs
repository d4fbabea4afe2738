use std::collections::VecDeque;

use bitflags::bitflags;
use glam::Vec2;

use crate::action::EntityId;

bitflags! {
    /// Scene node categories used to address commands.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Category: u16 {
        const SCENE_AIR_LAYER   = 1 << 0;
        const PLAYER            = 1 << 1;
        const ALLIED_TANK       = 1 << 2;
        const ENEMY_TANK        = 1 << 3;
        const PICKUP            = 1 << 4;
        const ALLIED_PROJECTILE = 1 << 5;
        const ENEMY_PROJECTILE  = 1 << 6;
        const PARTICLE_SYSTEM   = 1 << 7;
        const SOUND_EFFECT      = 1 << 8;
        const NETWORK           = 1 << 9;
        const COLLIDABLE        = 1 << 10;
        const HOST_PROJECTILE   = 1 << 11;
        const HOST_TANK         = 1 << 12;

        const TANK = Self::PLAYER.bits()
            | Self::ALLIED_TANK.bits()
            | Self::ENEMY_TANK.bits()
            | Self::HOST_TANK.bits();
        const PROJECTILE = Self::ALLIED_PROJECTILE.bits()
            | Self::ENEMY_PROJECTILE.bits()
            | Self::HOST_PROJECTILE.bits();
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandKind {
    /// Turn by this many degrees.
    Rotate(f32),
    /// Move along the current heading; negative reverses.
    Move(f32),
    Fire,
    LaunchMissile,
}

impl CommandKind {
    /// World displacement of a `Move` for a node facing `rotation` degrees.
    pub fn displacement(&self, rotation: f32) -> Vec2 {
        match self {
            CommandKind::Move(speed) => {
                let radians = rotation.to_radians();
                Vec2::new(-radians.sin(), radians.cos()) * *speed
            }
            _ => Vec2::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Command {
    pub category: Category,
    pub target: Option<EntityId>,
    pub kind: CommandKind,
}

impl Command {
    pub fn for_tank(target: EntityId, kind: CommandKind) -> Self {
        Self {
            category: Category::PLAYER,
            target: Some(target),
            kind,
        }
    }

    pub fn applies_to(&self, category: Category, id: EntityId) -> bool {
        self.category.intersects(category) && self.target.is_none_or(|target| target == id)
    }
}

#[derive(Debug, Default)]
pub struct CommandQueue {
    commands: VecDeque<Command>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push_back(command);
    }

    pub fn pop(&mut self) -> Option<Command> {
        self.commands.pop_front()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
