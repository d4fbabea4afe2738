use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::net::ProtocolError;

pub type EntityId = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerAction {
    TurnLeft,
    TurnRight,
    MoveUp,
    MoveDown,
    Fire,
    LaunchMissile,
}

impl PlayerAction {
    pub const ALL: [PlayerAction; 6] = [
        PlayerAction::TurnLeft,
        PlayerAction::TurnRight,
        PlayerAction::MoveUp,
        PlayerAction::MoveDown,
        PlayerAction::Fire,
        PlayerAction::LaunchMissile,
    ];

    /// Held inputs that are mirrored as on/off state rather than sent as one-shot events.
    pub fn is_realtime(self) -> bool {
        !matches!(self, PlayerAction::LaunchMissile)
    }

    pub fn to_wire(self) -> i32 {
        self as i32
    }

    pub fn from_wire(value: i32) -> Result<Self, ProtocolError> {
        usize::try_from(value)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .ok_or(ProtocolError::InvalidValue {
                kind: "player action",
                value,
            })
    }

    fn flag(self) -> ActionSet {
        match self {
            PlayerAction::TurnLeft => ActionSet::TURN_LEFT,
            PlayerAction::TurnRight => ActionSet::TURN_RIGHT,
            PlayerAction::MoveUp => ActionSet::MOVE_UP,
            PlayerAction::MoveDown => ActionSet::MOVE_DOWN,
            PlayerAction::Fire => ActionSet::FIRE,
            PlayerAction::LaunchMissile => ActionSet::LAUNCH_MISSILE,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ActionSet: u8 {
        const TURN_LEFT      = 1 << 0;
        const TURN_RIGHT     = 1 << 1;
        const MOVE_UP        = 1 << 2;
        const MOVE_DOWN      = 1 << 3;
        const FIRE           = 1 << 4;
        const LAUNCH_MISSILE = 1 << 5;
    }
}

impl ActionSet {
    pub fn set_action(&mut self, action: PlayerAction, enabled: bool) {
        self.set(action.flag(), enabled);
    }

    pub fn is_active(&self, action: PlayerAction) -> bool {
        self.contains(action.flag())
    }

    pub fn actions(&self) -> impl Iterator<Item = PlayerAction> + '_ {
        PlayerAction::ALL
            .into_iter()
            .filter(|action| self.is_active(*action))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameAction {
    EnemyExplode,
}

impl GameAction {
    pub fn to_wire(self) -> i32 {
        self as i32
    }

    pub fn from_wire(value: i32) -> Result<Self, ProtocolError> {
        match value {
            0 => Ok(GameAction::EnemyExplode),
            _ => Err(ProtocolError::InvalidValue {
                kind: "game action",
                value,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PickupKind {
    HeavyGun,
    GatlingGun,
    TeslaGun,
    Nuke,
    HealthRefill,
    MissileRefill,
    FireSpread,
    FireRate,
}

impl PickupKind {
    pub const ALL: [PickupKind; 8] = [
        PickupKind::HeavyGun,
        PickupKind::GatlingGun,
        PickupKind::TeslaGun,
        PickupKind::Nuke,
        PickupKind::HealthRefill,
        PickupKind::MissileRefill,
        PickupKind::FireSpread,
        PickupKind::FireRate,
    ];

    pub fn to_wire(self) -> i32 {
        self as i32
    }

    pub fn from_wire(value: i32) -> Result<Self, ProtocolError> {
        usize::try_from(value)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .ok_or(ProtocolError::InvalidValue {
                kind: "pickup",
                value,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realtime_actions() {
        let realtime: Vec<_> = PlayerAction::ALL
            .into_iter()
            .filter(|a| a.is_realtime())
            .collect();
        assert_eq!(realtime.len(), 5);
        assert!(!PlayerAction::LaunchMissile.is_realtime());
    }

    #[test]
    fn wire_values_match_declaration_order() {
        for (index, action) in PlayerAction::ALL.into_iter().enumerate() {
            assert_eq!(action.to_wire(), index as i32);
            assert_eq!(PlayerAction::from_wire(index as i32), Ok(action));
        }
        assert!(PlayerAction::from_wire(6).is_err());
        assert!(PlayerAction::from_wire(-1).is_err());
        assert_eq!(PickupKind::from_wire(7), Ok(PickupKind::FireRate));
        assert!(PickupKind::from_wire(8).is_err());
        assert!(GameAction::from_wire(1).is_err());
    }

    #[test]
    fn action_set_toggles() {
        let mut set = ActionSet::default();
        set.set_action(PlayerAction::MoveUp, true);
        set.set_action(PlayerAction::Fire, true);
        assert!(set.is_active(PlayerAction::MoveUp));
        assert_eq!(
            set.actions().collect::<Vec<_>>(),
            vec![PlayerAction::MoveUp, PlayerAction::Fire]
        );

        set.set_action(PlayerAction::MoveUp, false);
        assert!(!set.is_active(PlayerAction::MoveUp));
    }
}
