//! Gameplay tuning loaded once at startup and shared immutably

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::game::map::MIN_ARENA_SPAN;

/// Which obstacle layout the host generates each countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MapLayout {
    #[default]
    Fortress,
    Plain,
    Corridor,
    Random,
}

/// Arena rectangle in world coordinates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Extra clearance kept between a player and any wall or edge
    pub collision_buffer: f64,
    /// Distance of spawn points from their corner
    pub spawn_inset: f64,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            x: 50.0,
            y: 130.0,
            width: 960.0,
            height: 540.0,
            collision_buffer: 2.0,
            spawn_inset: 50.0,
        }
    }
}

impl ArenaConfig {
    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    pub max_hp: i32,
    pub speed: f64,
    pub size: i32,
    pub poison_duration: u32,
    pub poison_tick_frames: u64,
    pub cold_duration: u32,
    pub cold_speed_mult: f64,
    pub thirst_duration: u32,
    pub thirst_speed_mult: f64,
    pub confidence_duration: u32,
    pub confidence_hp_mult: i32,
    pub delay_bleed_frames: u64,
    /// Damage multiplier applied to incoming hits with the build up passive
    pub build_up_damage_taken: f64,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            max_hp: 100,
            speed: 4.0,
            size: 15,
            poison_duration: 120,
            poison_tick_frames: 30,
            cold_duration: 180,
            cold_speed_mult: 0.5,
            thirst_duration: 180,
            thirst_speed_mult: 1.3,
            confidence_duration: 180,
            confidence_hp_mult: 3,
            delay_bleed_frames: 20,
            build_up_damage_taken: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardTuning {
    pub duration: u32,
    pub cooldown: u32,
    pub damage_cut_rate: f64,
}

impl Default for GuardTuning {
    fn default() -> Self {
        Self {
            duration: 60,
            cooldown: 300,
            damage_cut_rate: 0.1,
        }
    }
}

/// Guard-linked skill payloads and the cooldown each adds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillTuning {
    pub tactical_reload_cd: u32,
    pub exclusive_defense_delay: u32,
    pub exclusive_defense_cd: u32,
    pub invisibility_frames: u32,
    pub invisibility_cd: u32,
    pub teleport_distance: f64,
    pub teleport_cd: u32,
    pub regen_rate: f64,
    pub regen_cd: u32,
    pub the_world_range: f64,
    pub the_world_cd: u32,
}

impl Default for SkillTuning {
    fn default() -> Self {
        Self {
            tactical_reload_cd: 120,
            exclusive_defense_delay: 120,
            exclusive_defense_cd: 120,
            invisibility_frames: 30,
            invisibility_cd: 300,
            teleport_distance: 150.0,
            teleport_cd: 120,
            regen_rate: 0.3,
            regen_cd: 120,
            the_world_range: 200.0,
            the_world_cd: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BulletTuning {
    pub pool_capacity: usize,
    /// Frames after spawn during which GHOST bullets ignore walls
    pub ghost_grace: u32,
    /// Frames after spawn during which a bullet cannot hit its owner
    pub self_hit_grace: u32,
    pub burst_interval: u32,
    /// Bounce budget for BOUNCE bullets that carry no extra bounces
    pub default_max_bounces: u32,
    pub fan_step: f64,
    pub jitter_angle: f64,
}

impl Default for BulletTuning {
    fn default() -> Self {
        Self {
            pool_capacity: 1000,
            ghost_grace: 20,
            self_hit_grace: 10,
            burst_interval: 5,
            default_max_bounces: 2,
            fan_step: 0.2,
            jitter_angle: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchRules {
    pub fps: u32,
    pub max_wins: u32,
    pub countdown_frames: u32,
    pub offer_count: usize,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            fps: 60,
            max_wins: 5,
            countdown_frames: 90,
            offer_count: 3,
        }
    }
}

/// Complete gameplay tuning
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub arena: ArenaConfig,
    pub player: PlayerTuning,
    pub guard: GuardTuning,
    pub skills: SkillTuning,
    pub bullets: BulletTuning,
    pub rules: MatchRules,
    pub map_layout: MapLayout,
}

impl GameConfig {
    /// Parse tuning from a JSON file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.arena.width <= MIN_ARENA_SPAN || self.arena.height <= MIN_ARENA_SPAN {
            return Err(ConfigError::Invalid(format!(
                "arena width and height must exceed {MIN_ARENA_SPAN}"
            )));
        }
        if self.player.max_hp <= 0 || self.player.size <= 0 {
            return Err(ConfigError::Invalid("player max_hp and size must be positive".into()));
        }
        if self.rules.fps == 0 {
            return Err(ConfigError::Invalid("fps must be positive".into()));
        }
        if self.rules.max_wins == 0 {
            return Err(ConfigError::Invalid("max_wins must be positive".into()));
        }
        if self.bullets.pool_capacity == 0 {
            return Err(ConfigError::Invalid("bullet pool capacity must be positive".into()));
        }
        if self.player.poison_tick_frames == 0 || self.player.delay_bleed_frames == 0 {
            return Err(ConfigError::Invalid("status tick periods must be positive".into()));
        }
        Ok(())
    }
}
