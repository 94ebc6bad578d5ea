//! Player state: position, health, status timers, guard and skills

use rand::Rng;

use super::combat::ShotSpec;
use super::effects::{Ability, Effect, PowerUp, StatOp};
use super::physics::{ObstacleSet, PhysicsSystem};
use super::snapshot::{MoveState, StatusFlags, StatusUpdate};
use super::weapon::{BulletIds, FireOutcome, Muzzle, Weapon};
use super::{InputSnapshot, PeerId};
use crate::config::tuning::{GameConfig, PlayerTuning};

/// Guard-linked skills
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Skills {
    pub tactical_reload: bool,
    pub exclusive_defense: bool,
    pub invisibility: bool,
    pub emergency_guard: bool,
    pub teleport: bool,
    pub self_regen: bool,
    pub the_world: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Passives {
    pub thirst: bool,
    pub delay: bool,
    pub confidence: bool,
    pub build_up: bool,
}

/// Side effects of a player action that reach beyond the player itself
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Shot(ShotSpec),
    /// Erase every bullet within `radius` of the point
    TheWorld { x: f64, y: f64, radius: f64 },
}

/// Player stats derived from the acquired effects
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerStats {
    pub max_hp: i32,
    pub size: i32,
    pub speed: f64,
}

impl PlayerStats {
    pub fn fold(base: &PlayerTuning, effects: &[Effect]) -> Self {
        let mut stats = Self {
            max_hp: base.max_hp,
            size: base.size,
            speed: base.speed,
        };
        for op in effects.iter().flat_map(|e| e.ops.iter()) {
            match *op {
                StatOp::MaxHpMul(m) => stats.max_hp = (f64::from(stats.max_hp) * m) as i32,
                StatOp::SizeMul(m) => stats.size = (f64::from(stats.size) * m) as i32,
                StatOp::MoveSpeedMul(m) => stats.speed *= m,
                _ => {}
            }
        }
        stats.max_hp = stats.max_hp.max(1);
        stats.size = stats.size.max(1);
        stats
    }
}

/// Values a mirror learns from STATUS and keeps for display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportedStats {
    pub reload_duration: u32,
    pub max_guard_cooldown: u32,
}

#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: PeerId,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub hp: i32,
    pub max_hp: i32,
    pub size: i32,
    pub speed: f64,

    pub poison_timer: u32,
    pub poison_stacks: u32,
    pub cold_timer: u32,
    pub thirst_timer: u32,
    pub confidence_timer: u32,

    pub is_guarding: bool,
    pub guard_timer: u32,
    pub guard_cooldown: u32,

    pub skills: Skills,
    pub passives: Passives,

    /// Damage received under the delay passive, bled into hp over time
    pub delay_buffer: i32,
    pub invisible_timer: u32,
    /// Frames until the exclusive defense second guard pulse
    pub exclusive_defense_timer: u32,
    /// The World fired this frame
    pub the_world_flash: bool,

    /// Acquired power-up names, in pick order
    pub abilities: Vec<String>,
    pub weapon: Weapon,
    pub reported: ReportedStats,
}

impl PlayerState {
    pub fn new(id: PeerId, x: f64, y: f64, config: &GameConfig) -> Self {
        let base = &config.player;
        Self {
            id,
            x,
            y,
            angle: 0.0,
            hp: base.max_hp,
            max_hp: base.max_hp,
            size: base.size,
            speed: base.speed,
            poison_timer: 0,
            poison_stacks: 0,
            cold_timer: 0,
            thirst_timer: 0,
            confidence_timer: 0,
            is_guarding: false,
            guard_timer: 0,
            guard_cooldown: 0,
            skills: Skills::default(),
            passives: Passives::default(),
            delay_buffer: 0,
            invisible_timer: 0,
            exclusive_defense_timer: 0,
            the_world_flash: false,
            abilities: Vec::new(),
            weapon: Weapon::new(),
            reported: ReportedStats::default(),
        }
    }

    pub fn is_dead(&self) -> bool {
        self.hp <= 0
    }

    /// Take a catalog power-up: weapon effect, unlocked ability, derived stats
    pub fn apply_power_up(&mut self, power_up: &PowerUp, config: &GameConfig) {
        self.weapon.add_effect(power_up.effect);
        if let Some(ability) = power_up.effect.grants {
            self.unlock(ability);
        }
        self.recompute_stats(config);
        self.abilities.push(power_up.name.to_string());
    }

    fn unlock(&mut self, ability: Ability) {
        match ability {
            Ability::TacticalReload => self.skills.tactical_reload = true,
            Ability::ExclusiveDefense => self.skills.exclusive_defense = true,
            Ability::Invisibility => self.skills.invisibility = true,
            Ability::EmergencyGuard => self.skills.emergency_guard = true,
            Ability::Teleport => self.skills.teleport = true,
            Ability::SelfRegen => self.skills.self_regen = true,
            Ability::TheWorld => self.skills.the_world = true,
            Ability::Thirst => self.passives.thirst = true,
            Ability::Delay => self.passives.delay = true,
            Ability::Confidence => self.passives.confidence = true,
            Ability::BuildUp => self.passives.build_up = true,
        }
    }

    /// Refold max hp, size and speed from the weapon's effect list
    pub fn recompute_stats(&mut self, config: &GameConfig) {
        let stats = PlayerStats::fold(&config.player, self.weapon.effects());
        self.max_hp = stats.max_hp;
        self.size = stats.size;
        self.speed = stats.speed;
        self.hp = self.max_hp;
    }

    /// Start-of-round reset: full health, cleared timers, full magazine
    pub fn reset_for_round(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
        self.hp = self.max_hp;
        self.poison_timer = 0;
        self.poison_stacks = 0;
        self.cold_timer = 0;
        self.thirst_timer = 0;
        self.confidence_timer = 0;
        self.is_guarding = false;
        self.guard_timer = 0;
        self.guard_cooldown = 0;
        self.delay_buffer = 0;
        self.invisible_timer = 0;
        self.exclusive_defense_timer = 0;
        self.the_world_flash = false;
        self.weapon.reset();
    }

    pub fn heal(&mut self, amount: i32) {
        if amount > 0 {
            self.hp = (self.hp + amount).min(self.max_hp);
        }
    }

    /// Clear one-frame flags before any action of the new frame
    pub fn begin_frame(&mut self) {
        self.the_world_flash = false;
    }

    /// Timers, movement and aim for one frame
    pub fn update(
        &mut self,
        input: &InputSnapshot,
        frame: u64,
        walls: &ObstacleSet,
        config: &GameConfig,
    ) {
        let tuning = &config.player;

        if self.guard_timer > 0 {
            self.guard_timer -= 1;
            if self.guard_timer == 0 {
                self.is_guarding = false;
            }
        }
        self.guard_cooldown = self.guard_cooldown.saturating_sub(1);

        if self.exclusive_defense_timer > 0 {
            self.exclusive_defense_timer -= 1;
            if self.exclusive_defense_timer == 0 {
                self.is_guarding = true;
                self.guard_timer = config.guard.duration;
            }
        }

        self.invisible_timer = self.invisible_timer.saturating_sub(1);

        if self.delay_buffer > 0 && frame % tuning.delay_bleed_frames == 0 {
            let bleed = (self.delay_buffer / 10 + 1).min(self.delay_buffer);
            self.hp -= bleed;
            self.delay_buffer -= bleed;
        }

        if self.poison_timer > 0 {
            if frame % tuning.poison_tick_frames == 0 {
                self.hp -= self.poison_stacks as i32;
            }
            self.poison_timer -= 1;
            if self.poison_timer == 0 {
                self.poison_stacks = 0;
            }
        }

        self.cold_timer = self.cold_timer.saturating_sub(1);
        self.thirst_timer = self.thirst_timer.saturating_sub(1);

        if self.confidence_timer > 0 {
            self.confidence_timer -= 1;
            if self.confidence_timer == 0 && self.hp > 0 {
                let div = tuning.confidence_hp_mult.max(1);
                self.hp = (self.hp + div - 1) / div;
            }
        }

        let speed = self.effective_speed(tuning);
        let mut dx = 0.0;
        let mut dy = 0.0;
        if input.left {
            dx -= speed;
        }
        if input.right {
            dx += speed;
        }
        if input.up {
            dy -= speed;
        }
        if input.down {
            dy += speed;
        }
        let (nx, ny) = PhysicsSystem::step_axes(
            self.x,
            self.y,
            dx,
            dy,
            f64::from(self.size),
            walls,
            &config.arena,
        );
        self.x = nx;
        self.y = ny;

        self.angle = (input.pointer_y - self.y).atan2(input.pointer_x - self.x);
    }

    pub fn effective_speed(&self, tuning: &PlayerTuning) -> f64 {
        let mut speed = self.speed;
        if self.cold_timer > 0 {
            speed *= tuning.cold_speed_mult;
        }
        if self.thirst_timer > 0 {
            speed *= tuning.thirst_speed_mult;
        }
        speed
    }

    /// Guard on a press edge. Returns false when on cooldown or already guarding.
    pub fn try_guard(
        &mut self,
        walls: &ObstacleSet,
        config: &GameConfig,
        events: &mut Vec<PlayerEvent>,
    ) -> bool {
        if self.guard_cooldown > 0 || self.is_guarding {
            return false;
        }
        self.activate_guard(walls, config, events);
        true
    }

    /// Guard ignoring the cooldown gate (emergency skill). An active guard is
    /// never re-entered.
    pub fn force_guard(
        &mut self,
        walls: &ObstacleSet,
        config: &GameConfig,
        events: &mut Vec<PlayerEvent>,
    ) {
        if self.is_guarding {
            return;
        }
        self.activate_guard(walls, config, events);
    }

    fn activate_guard(
        &mut self,
        walls: &ObstacleSet,
        config: &GameConfig,
        events: &mut Vec<PlayerEvent>,
    ) {
        let skills = &config.skills;
        self.is_guarding = true;
        self.guard_timer = config.guard.duration;

        if self.skills.tactical_reload {
            self.weapon.refill();
        }
        if self.skills.exclusive_defense {
            self.exclusive_defense_timer = skills.exclusive_defense_delay;
        }
        if self.skills.invisibility {
            self.invisible_timer = skills.invisibility_frames;
        }
        if self.skills.teleport {
            self.teleport(walls, config);
        }
        if self.skills.self_regen {
            self.heal((f64::from(self.max_hp) * skills.regen_rate) as i32);
        }
        if self.skills.the_world {
            self.the_world_flash = true;
            events.push(PlayerEvent::TheWorld {
                x: self.x,
                y: self.y,
                radius: skills.the_world_range,
            });
        }

        self.guard_cooldown = self.guard_cooldown_cap(config);
    }

    /// Base guard cooldown plus the penalty of every enabled guard-linked skill
    pub fn guard_cooldown_cap(&self, config: &GameConfig) -> u32 {
        let skills = &config.skills;
        let mut cap = config.guard.cooldown;
        if self.skills.tactical_reload {
            cap += skills.tactical_reload_cd;
        }
        if self.skills.exclusive_defense {
            cap += skills.exclusive_defense_cd;
        }
        if self.skills.invisibility {
            cap += skills.invisibility_cd;
        }
        if self.skills.teleport {
            cap += skills.teleport_cd;
        }
        if self.skills.self_regen {
            cap += skills.regen_cd;
        }
        if self.skills.the_world {
            cap += skills.the_world_cd;
        }
        cap
    }

    fn teleport(&mut self, walls: &ObstacleSet, config: &GameConfig) {
        let distance = config.skills.teleport_distance;
        let size = f64::from(self.size);
        let (tx, ty) = PhysicsSystem::clamp_to_arena(
            self.x + self.angle.cos() * distance,
            self.y + self.angle.sin() * distance,
            size,
            &config.arena,
        );
        if !walls.intersects_circle(tx, ty, size) {
            self.x = tx;
            self.y = ty;
        }
    }

    /// Fire on a press edge
    pub fn try_fire<R: Rng + ?Sized>(
        &mut self,
        walls: &ObstacleSet,
        config: &GameConfig,
        ids: &mut BulletIds,
        rng: &mut R,
        events: &mut Vec<PlayerEvent>,
    ) {
        match self.weapon.try_fire() {
            FireOutcome::Blocked => {}
            FireOutcome::Empty => {
                if self.weapon.ammo <= 0 && self.skills.emergency_guard {
                    self.force_guard(walls, config, events);
                }
            }
            FireOutcome::Fired { emptied } => {
                self.emit_wave(config, ids, rng, events);
                if emptied && self.skills.emergency_guard {
                    self.force_guard(walls, config, events);
                }
            }
        }
    }

    /// Advance the weapon one frame, emitting a queued burst wave when due
    pub fn tick_weapon<R: Rng + ?Sized>(
        &mut self,
        config: &GameConfig,
        ids: &mut BulletIds,
        rng: &mut R,
        events: &mut Vec<PlayerEvent>,
    ) {
        if self.weapon.tick(config.bullets.burst_interval) {
            self.emit_wave(config, ids, rng, events);
        }
    }

    fn emit_wave<R: Rng + ?Sized>(
        &self,
        config: &GameConfig,
        ids: &mut BulletIds,
        rng: &mut R,
        events: &mut Vec<PlayerEvent>,
    ) {
        let muzzle = Muzzle {
            owner: self.id,
            x: self.x,
            y: self.y,
            angle: self.angle,
        };
        let mut shots = Vec::new();
        self.weapon
            .emit_wave(muzzle, &config.bullets, ids, rng, &mut shots);
        events.extend(shots.into_iter().map(PlayerEvent::Shot));
    }

    /// One of this player's bullets was confirmed as a hit by its victim
    pub fn on_hit_confirmed(&mut self, config: &GameConfig) {
        let tuning = &config.player;
        if self.passives.thirst {
            self.thirst_timer = tuning.thirst_duration;
        }
        if self.passives.confidence {
            if self.confidence_timer == 0 {
                self.hp = (self.hp * tuning.confidence_hp_mult).min(self.max_hp);
            }
            self.confidence_timer = tuning.confidence_duration;
        }
    }

    pub fn status_flags(&self) -> StatusFlags {
        let mut flags = StatusFlags::NONE;
        flags.set(StatusFlags::RELOAD, self.weapon.reloading);
        flags.set(StatusFlags::GUARD, self.is_guarding);
        flags.set(StatusFlags::INVISIBLE, self.invisible_timer > 0);
        flags.set(StatusFlags::THE_WORLD, self.the_world_flash);
        flags.set(StatusFlags::POISON, self.poison_timer > 0);
        flags
    }

    /// Overwrite a mirror from its owner's MOVE
    pub fn apply_move(&mut self, state: &MoveState, config: &GameConfig) {
        self.x = state.x;
        self.y = state.y;
        self.angle = state.angle;
        self.hp = state.hp;
        self.weapon.reload_timer = state.reload_timer;
        self.weapon.reloading = state.flags.contains(StatusFlags::RELOAD);
        self.guard_cooldown = state.guard_cooldown;
        self.is_guarding = state.flags.contains(StatusFlags::GUARD);
        self.the_world_flash = state.flags.contains(StatusFlags::THE_WORLD);
        self.poison_timer = u32::from(state.flags.contains(StatusFlags::POISON));

        if !state.flags.contains(StatusFlags::INVISIBLE) {
            self.invisible_timer = 0;
        } else if self.invisible_timer == 0 {
            self.invisible_timer = config.skills.invisibility_frames;
        }
    }

    /// Overwrite a mirror's derived stats from its owner's STATUS
    pub fn apply_status(&mut self, status: &StatusUpdate) {
        self.max_hp = status.max_hp;
        self.size = status.size;
        self.reported = ReportedStats {
            reload_duration: status.reload_duration,
            max_guard_cooldown: status.max_guard_cooldown,
        };
    }

    /// Tick cosmetic timers on a mirror
    pub fn tick_mirror(&mut self) {
        self.invisible_timer = self.invisible_timer.saturating_sub(1);
    }
}
