//! Weapon state: ammo, reload, fire cadence, burst waves and pellet fans

use rand::Rng;

use super::combat::{BulletId, ShotSpec};
use super::effects::{BulletFlags, Effect, StatOp};
use super::PeerId;
use crate::config::tuning::BulletTuning;

/// Derived weapon stats. Always the fold of the acquired effects over [`WeaponStats::BASE`].
#[derive(Debug, Clone, PartialEq)]
pub struct WeaponStats {
    pub max_ammo: i32,
    pub reload_duration: u32,
    pub damage: i32,
    pub bullet_speed: f64,
    pub bullet_size: i32,
    pub fire_interval: u32,
    pub waves_per_shot: u32,
    pub pellets_per_wave: u32,
    /// Total fan width in radians, 0 for the default fixed step
    pub spread_angle: f64,
    pub speed_jitter: bool,
    pub extra_bounces: u32,
    pub bullet_lifetime: u32,
    /// Travel distance cap, resolved into `bullet_lifetime` after folding
    pub range: Option<f64>,
    pub flags: BulletFlags,
}

impl WeaponStats {
    pub const BASE: Self = Self {
        max_ammo: 5,
        reload_duration: 60,
        damage: 15,
        bullet_speed: 10.0,
        bullet_size: 8,
        fire_interval: 10,
        waves_per_shot: 1,
        pellets_per_wave: 1,
        spread_angle: 0.0,
        speed_jitter: false,
        extra_bounces: 0,
        bullet_lifetime: 600,
        range: None,
        flags: BulletFlags::NONE,
    };

    pub fn fold(effects: &[Effect]) -> Self {
        let mut stats = Self::BASE;
        for effect in effects {
            for op in effect.ops {
                stats.apply(*op);
            }
            stats.flags |= effect.flags;
        }

        stats.max_ammo = stats.max_ammo.max(1);
        if let Some(range) = stats.range {
            if stats.bullet_speed > 0.0 {
                let lifetime = (range / stats.bullet_speed).ceil() as u32;
                stats.bullet_lifetime = stats.bullet_lifetime.min(lifetime.max(1));
            }
        }
        stats
    }

    fn apply(&mut self, op: StatOp) {
        match op {
            StatOp::DamageMul(m) => self.damage = (self.damage as f64 * m) as i32,
            StatOp::BulletSpeedMul(m) => self.bullet_speed *= m,
            StatOp::ReloadMul(m) => self.reload_duration = (self.reload_duration as f64 * m) as u32,
            StatOp::FireIntervalAdd(n) => self.fire_interval += n,
            StatOp::PelletsAdd(n) => self.pellets_per_wave += n,
            StatOp::WavesAdd(n) => self.waves_per_shot += n,
            StatOp::BouncesAdd(n) => self.extra_bounces += n,
            StatOp::AmmoAdd(n) => self.max_ammo += n,
            StatOp::SpeedJitter => self.speed_jitter = true,
            StatOp::Spread(angle) => self.spread_angle = angle,
            StatOp::Range(r) => self.range = Some(self.range.map_or(r, |cur| cur.min(r))),
            StatOp::MaxHpMul(_) | StatOp::SizeMul(_) | StatOp::MoveSpeedMul(_) => {}
        }
    }
}

/// Result of a fire attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// Fire interval still running
    Blocked,
    /// Nothing to fire; a reload is running or was just started
    Empty,
    /// One ammo consumed; `emptied` when that was the last round
    Fired { emptied: bool },
}

/// Generates bullet ids unique across peers: owner in the high half, sequence in the low half
#[derive(Debug, Clone, Default)]
pub struct BulletIds {
    owner: PeerId,
    next: u32,
}

impl BulletIds {
    pub fn new(owner: PeerId) -> Self {
        Self { owner, next: 0 }
    }

    pub fn next_id(&mut self) -> BulletId {
        self.next = self.next.wrapping_add(1);
        (u64::from(self.owner) << 32) | u64::from(self.next)
    }

    pub fn owner_of(id: BulletId) -> PeerId {
        (id >> 32) as PeerId
    }
}

/// Where and how a wave leaves the barrel
#[derive(Debug, Clone, Copy)]
pub struct Muzzle {
    pub owner: PeerId,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
}

#[derive(Debug, Clone)]
pub struct Weapon {
    stats: WeaponStats,
    effects: Vec<Effect>,
    pub ammo: i32,
    pub reloading: bool,
    pub reload_timer: u32,
    pub fire_timer: u32,
    queued_waves: u32,
    wave_timer: u32,
}

impl Default for Weapon {
    fn default() -> Self {
        Self::new()
    }
}

impl Weapon {
    pub fn new() -> Self {
        let stats = WeaponStats::BASE;
        Self {
            ammo: stats.max_ammo,
            stats,
            effects: Vec::new(),
            reloading: false,
            reload_timer: 0,
            fire_timer: 0,
            queued_waves: 0,
            wave_timer: 0,
        }
    }

    pub fn stats(&self) -> &WeaponStats {
        &self.stats
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn add_effect(&mut self, effect: Effect) {
        self.effects.push(effect);
        self.recompute();
    }

    /// Rebuild stats from scratch and refill the magazine
    pub fn recompute(&mut self) {
        self.stats = WeaponStats::fold(&self.effects);
        self.refill();
    }

    pub fn refill(&mut self) {
        self.ammo = self.stats.max_ammo;
        self.reloading = false;
        self.reload_timer = 0;
    }

    /// Round reset: full magazine, no pending fire or bursts
    pub fn reset(&mut self) {
        self.refill();
        self.fire_timer = 0;
        self.queued_waves = 0;
        self.wave_timer = 0;
    }

    pub fn start_reload(&mut self) {
        if !self.reloading && self.ammo < self.stats.max_ammo {
            self.reloading = true;
            self.reload_timer = 0;
        }
    }

    /// Advance timers by one frame. Returns true when a queued burst wave is due.
    pub fn tick(&mut self, burst_interval: u32) -> bool {
        if self.fire_timer > 0 {
            self.fire_timer -= 1;
        }

        if self.reloading {
            self.reload_timer += 1;
            if self.reload_timer >= self.stats.reload_duration {
                self.refill();
            }
        }

        if self.queued_waves > 0 {
            self.wave_timer += 1;
            if self.wave_timer >= burst_interval {
                self.wave_timer = 0;
                self.queued_waves -= 1;
                return true;
            }
        }
        false
    }

    pub fn try_fire(&mut self) -> FireOutcome {
        if self.fire_timer > 0 {
            return FireOutcome::Blocked;
        }
        if self.reloading || self.ammo <= 0 {
            self.start_reload();
            return FireOutcome::Empty;
        }

        self.ammo -= 1;
        self.fire_timer = self.stats.fire_interval;
        self.queued_waves = self.stats.waves_per_shot.saturating_sub(1);
        self.wave_timer = 0;

        let emptied = self.ammo <= 0;
        if emptied {
            self.start_reload();
        }
        FireOutcome::Fired { emptied }
    }

    /// Build one wave of pellets leaving `muzzle`
    pub fn emit_wave<R: Rng + ?Sized>(
        &self,
        muzzle: Muzzle,
        tuning: &BulletTuning,
        ids: &mut BulletIds,
        rng: &mut R,
        out: &mut Vec<ShotSpec>,
    ) {
        let s = &self.stats;
        let n = s.pellets_per_wave.max(1);

        for i in 0..n {
            let mut angle = muzzle.angle;
            let mut speed = s.bullet_speed;

            if n > 1 {
                if s.speed_jitter {
                    let span = if s.spread_angle > 0.0 {
                        s.spread_angle
                    } else {
                        tuning.jitter_angle
                    };
                    angle += (rng.gen::<f64>() - 0.5) * span;
                    speed *= rng.gen_range(0.98..1.02);
                } else {
                    let step = if s.spread_angle > 0.0 {
                        s.spread_angle / (n - 1) as f64
                    } else {
                        tuning.fan_step
                    };
                    angle += (i as f64 - (n - 1) as f64 / 2.0) * step;
                }
            }

            out.push(ShotSpec {
                id: ids.next_id(),
                x: muzzle.x,
                y: muzzle.y,
                angle,
                speed,
                damage: s.damage,
                size: s.bullet_size,
                flags: s.flags,
                owner: muzzle.owner,
                extra_bounces: s.extra_bounces,
                max_life: s.bullet_lifetime,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::effects::find;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn effect(name: &str) -> Effect {
        find(name).unwrap().effect
    }

    #[test]
    fn test_base_stats() {
        let w = Weapon::new();
        assert_eq!(w.ammo, 5);
        assert_eq!(w.stats().reload_duration, 60);
        assert_eq!(w.stats().damage, 15);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let mut w = Weapon::new();
        w.add_effect(effect("Rising"));
        w.add_effect(effect("Impact"));
        w.add_effect(effect("Quick"));
        let first = w.stats().clone();
        w.recompute();
        w.recompute();
        assert_eq!(*w.stats(), first);
    }

    #[test]
    fn test_integer_stats_truncate_per_step() {
        let mut w = Weapon::new();
        // 15 * 0.8 = 12, then 12 * 2 = 24
        w.add_effect(effect("Rising"));
        assert_eq!(w.stats().damage, 12);
        w.add_effect(effect("Impact"));
        assert_eq!(w.stats().damage, 24);
        // 60 * 1.5 = 90
        assert_eq!(w.stats().reload_duration, 90);
        assert_eq!(w.stats().fire_interval, 70);
        assert!((w.stats().bullet_speed - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_ammo_floor_is_one() {
        let mut w = Weapon::new();
        w.add_effect(effect("3 in 1"));
        w.add_effect(effect("3 in 1"));
        w.add_effect(effect("3 in 1"));
        assert_eq!(w.stats().max_ammo, 1);
        assert_eq!(w.ammo, 1);
    }

    #[test]
    fn test_shotgun_lifetime_follows_final_speed() {
        let mut w = Weapon::new();
        w.add_effect(effect("Shotgun"));
        assert_eq!(w.stats().bullet_lifetime, 15);
        w.add_effect(effect("Rising"));
        // 150 / 20 = 7.5 -> 8
        assert_eq!(w.stats().bullet_lifetime, 8);
        assert_eq!(w.stats().pellets_per_wave, 21);
    }

    #[test]
    fn test_flags_accumulate() {
        let mut w = Weapon::new();
        w.add_effect(effect("Hill"));
        w.add_effect(effect("Poison"));
        assert_eq!(w.stats().flags, BulletFlags::LIFESTEAL | BulletFlags::POISON);
    }

    #[test]
    fn test_fire_consumes_ammo_and_reloads_when_empty() {
        let mut w = Weapon::new();
        for _ in 0..4 {
            assert_eq!(w.try_fire(), FireOutcome::Fired { emptied: false });
            w.fire_timer = 0;
        }
        assert_eq!(w.try_fire(), FireOutcome::Fired { emptied: true });
        assert!(w.reloading);
        w.fire_timer = 0;
        assert_eq!(w.try_fire(), FireOutcome::Empty);

        for _ in 0..60 {
            w.tick(5);
        }
        assert!(!w.reloading);
        assert_eq!(w.ammo, 5);
    }

    #[test]
    fn test_fire_interval_blocks() {
        let mut w = Weapon::new();
        assert!(matches!(w.try_fire(), FireOutcome::Fired { .. }));
        assert_eq!(w.try_fire(), FireOutcome::Blocked);
        for _ in 0..10 {
            w.tick(5);
        }
        assert!(matches!(w.try_fire(), FireOutcome::Fired { .. }));
    }

    #[test]
    fn test_burst_waves_every_interval() {
        let mut w = Weapon::new();
        w.add_effect(effect("Reel Gun"));
        assert!(matches!(w.try_fire(), FireOutcome::Fired { .. }));
        let due: Vec<bool> = (0..10).map(|_| w.tick(5)).collect();
        let frames: Vec<usize> = due
            .iter()
            .enumerate()
            .filter(|(_, d)| **d)
            .map(|(i, _)| i + 1)
            .collect();
        assert_eq!(frames, vec![5, 10]);
    }

    #[test]
    fn test_fan_is_symmetric() {
        let mut w = Weapon::new();
        w.add_effect(effect("Danmaku"));
        let mut ids = BulletIds::new(3);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut out = Vec::new();
        let muzzle = Muzzle {
            owner: 3,
            x: 0.0,
            y: 0.0,
            angle: 0.0,
        };
        w.emit_wave(muzzle, &BulletTuning::default(), &mut ids, &mut rng, &mut out);
        assert_eq!(out.len(), 5);
        assert!((out[0].angle + 0.4).abs() < 1e-9);
        assert!(out[2].angle.abs() < 1e-9);
        assert!((out[4].angle - 0.4).abs() < 1e-9);
        assert!(out.iter().all(|s| BulletIds::owner_of(s.id) == 3));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let mut w = Weapon::new();
        w.add_effect(effect("Shower"));
        let mut ids = BulletIds::new(1);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut out = Vec::new();
        let muzzle = Muzzle {
            owner: 1,
            x: 0.0,
            y: 0.0,
            angle: 1.0,
        };
        w.emit_wave(muzzle, &BulletTuning::default(), &mut ids, &mut rng, &mut out);
        assert_eq!(out.len(), 15);
        for shot in &out {
            assert!((shot.angle - 1.0).abs() <= 0.5);
            assert!(shot.speed >= 9.8 && shot.speed <= 10.2);
        }
    }
}
