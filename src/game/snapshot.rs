//! Outbound state snapshots: per-tick MOVE and sparse STATUS

use super::player::PlayerState;
use super::PeerId;
use crate::config::tuning::GameConfig;

/// Visible status bits carried in MOVE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusFlags(u32);

impl StatusFlags {
    pub const NONE: Self = Self(0);
    pub const RELOAD: Self = Self(1);
    pub const GUARD: Self = Self(2);
    pub const INVISIBLE: Self = Self(4);
    pub const THE_WORLD: Self = Self(8);
    pub const POISON: Self = Self(16);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn set(&mut self, other: Self, on: bool) {
        if on {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }
}

/// Full per-tick state of a player, pushed by its owner
#[derive(Debug, Clone, PartialEq)]
pub struct MoveState {
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub hp: i32,
    pub reload_timer: u32,
    pub guard_cooldown: u32,
    pub flags: StatusFlags,
}

/// Derived stats a mirror cannot recompute on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub id: PeerId,
    pub max_hp: i32,
    pub size: i32,
    pub reload_duration: u32,
    pub max_guard_cooldown: u32,
}

/// Builds snapshots of the local player for network transmission
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    last_status: Option<StatusUpdate>,
    force: bool,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a STATUS on the next check (round start, power-up pick)
    pub fn force_next(&mut self) {
        self.force = true;
    }

    pub fn build_move(&self, player: &PlayerState) -> MoveState {
        MoveState {
            x: player.x,
            y: player.y,
            angle: player.angle,
            hp: player.hp,
            reload_timer: player.weapon.reload_timer,
            guard_cooldown: player.guard_cooldown,
            flags: player.status_flags(),
        }
    }

    /// A STATUS message if the derived stats changed since the last one sent
    pub fn status_if_changed(
        &mut self,
        player: &PlayerState,
        config: &GameConfig,
    ) -> Option<StatusUpdate> {
        let status = StatusUpdate {
            id: player.id,
            max_hp: player.max_hp,
            size: player.size,
            reload_duration: player.weapon.stats().reload_duration,
            max_guard_cooldown: player.guard_cooldown_cap(config),
        };

        if !self.force && self.last_status.as_ref() == Some(&status) {
            return None;
        }
        self.force = false;
        self.last_status = Some(status.clone());
        Some(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::effects::find;

    #[test]
    fn test_status_sent_only_on_change() {
        let config = GameConfig::default();
        let mut player = PlayerState::new(1, 200.0, 200.0, &config);
        let mut builder = SnapshotBuilder::new();

        let first = builder.status_if_changed(&player, &config).unwrap();
        assert_eq!(first.max_hp, 100);
        assert!(builder.status_if_changed(&player, &config).is_none());

        player.apply_power_up(find("Big Boy").unwrap(), &config);
        let changed = builder.status_if_changed(&player, &config).unwrap();
        assert_eq!(changed.max_hp, 150);
        assert_eq!(changed.size, 30);

        builder.force_next();
        assert!(builder.status_if_changed(&player, &config).is_some());
    }

    #[test]
    fn test_move_flags_reflect_state() {
        let config = GameConfig::default();
        let mut player = PlayerState::new(1, 200.0, 200.0, &config);
        player.is_guarding = true;
        player.poison_timer = 10;
        let state = SnapshotBuilder::new().build_move(&player);
        assert!(state.flags.contains(StatusFlags::GUARD));
        assert!(state.flags.contains(StatusFlags::POISON));
        assert!(!state.flags.contains(StatusFlags::RELOAD));
        assert_eq!(state.flags.bits(), 18);
    }
}
