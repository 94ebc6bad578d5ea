//! Combat system - bullet pool, collision, damage pipeline

use std::f64::consts::PI;

use tracing::debug;

use super::effects::BulletFlags;
use super::physics::ObstacleSet;
use super::player::PlayerState;
use super::PeerId;
use crate::config::tuning::{BulletTuning, GameConfig};

pub type BulletId = u64;

/// Spawn parameters for one projectile, exactly as carried by SHOT
#[derive(Debug, Clone, PartialEq)]
pub struct ShotSpec {
    pub id: BulletId,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub speed: f64,
    pub damage: i32,
    pub size: i32,
    pub flags: BulletFlags,
    pub owner: PeerId,
    pub extra_bounces: u32,
    pub max_life: u32,
}

/// One pool slot
#[derive(Debug, Clone, Default)]
pub struct Bullet {
    pub id: BulletId,
    pub owner: PeerId,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub speed: f64,
    pub damage: i32,
    pub radius: f64,
    pub flags: BulletFlags,
    pub bounce_count: u32,
    pub max_bounces: u32,
    pub life_timer: u32,
    pub max_life: u32,
    pub active: bool,
}

impl Bullet {
    fn activate(&mut self, shot: &ShotSpec, tuning: &BulletTuning) {
        let mut flags = shot.flags;
        let max_bounces = if shot.extra_bounces > 0 {
            flags |= BulletFlags::BOUNCE;
            shot.extra_bounces
        } else if flags.contains(BulletFlags::BOUNCE) {
            tuning.default_max_bounces
        } else {
            0
        };

        *self = Self {
            id: shot.id,
            owner: shot.owner,
            x: shot.x,
            y: shot.y,
            angle: shot.angle,
            speed: shot.speed,
            damage: shot.damage,
            radius: f64::from(shot.size),
            flags,
            bounce_count: 0,
            max_bounces,
            life_timer: 0,
            max_life: shot.max_life,
            active: true,
        };
    }

    fn can_bounce(&self) -> bool {
        self.flags.contains(BulletFlags::BOUNCE) && self.bounce_count < self.max_bounces
    }
}

/// Outcomes the local peer must announce
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CombatEvent {
    /// A bullet struck the local player
    Hit { bullet_id: BulletId, owner: PeerId },
    /// Lifesteal instruction for the bullet's owner
    Heal { target: PeerId, amount: i32 },
    /// Local player hp reached 0
    Dead { player_id: PeerId },
}

/// How an incoming hit lands after reductions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageRoute {
    Immediate(i32),
    Deferred(i32),
}

/// Combat rules that operate on player state
pub struct CombatSystem;

impl CombatSystem {
    /// raw -> passive reduction -> guard cut (floor 1) -> delay routing
    pub fn resolve_damage(raw: i32, target: &PlayerState, config: &GameConfig) -> DamageRoute {
        let mut dmg = raw;
        if target.passives.build_up {
            dmg = (f64::from(dmg) * config.player.build_up_damage_taken) as i32;
        }
        if target.is_guarding {
            dmg = ((f64::from(dmg) * config.guard.damage_cut_rate) as i32).max(1);
        }
        if target.passives.delay {
            DamageRoute::Deferred(dmg)
        } else {
            DamageRoute::Immediate(dmg)
        }
    }

    /// Apply a bullet hit to `target`, pushing the announcements it produces
    pub fn apply_hit(
        target: &mut PlayerState,
        bullet: &Bullet,
        config: &GameConfig,
        events: &mut Vec<CombatEvent>,
    ) {
        match Self::resolve_damage(bullet.damage, target, config) {
            DamageRoute::Immediate(dmg) => target.hp -= dmg,
            DamageRoute::Deferred(dmg) => target.delay_buffer += dmg,
        }

        events.push(CombatEvent::Hit {
            bullet_id: bullet.id,
            owner: bullet.owner,
        });

        if bullet.flags.contains(BulletFlags::POISON) {
            target.poison_timer = config.player.poison_duration;
            target.poison_stacks += 1;
        }
        if bullet.flags.contains(BulletFlags::COLD) {
            target.cold_timer = config.player.cold_duration;
        }
        if bullet.flags.contains(BulletFlags::LIFESTEAL) {
            events.push(CombatEvent::Heal {
                target: bullet.owner,
                amount: bullet.damage / 2,
            });
        }

        if target.hp <= 0 {
            target.hp = 0;
            events.push(CombatEvent::Dead {
                player_id: target.id,
            });
        }
    }
}

/// Fixed-capacity projectile store
#[derive(Debug, Clone)]
pub struct BulletPool {
    slots: Vec<Bullet>,
}

impl BulletPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Bullet::default(); capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|b| b.active).count()
    }

    pub fn active(&self) -> impl Iterator<Item = &Bullet> {
        self.slots.iter().filter(|b| b.active)
    }

    pub fn get(&self, id: BulletId) -> Option<&Bullet> {
        self.slots.iter().find(|b| b.active && b.id == id)
    }

    /// Activate the first free slot. Returns false when the spawn was dropped.
    pub fn allocate(&mut self, shot: &ShotSpec, tuning: &BulletTuning) -> bool {
        if self.get(shot.id).is_some() {
            debug!(bullet_id = shot.id, "Duplicate spawn ignored");
            return false;
        }
        match self.slots.iter_mut().find(|b| !b.active) {
            Some(slot) => {
                slot.activate(shot, tuning);
                true
            }
            None => {
                debug!(bullet_id = shot.id, "Bullet pool exhausted, spawn dropped");
                false
            }
        }
    }

    /// Deactivate a bullet by id. Unknown or already-inactive ids are a no-op.
    pub fn deactivate_id(&mut self, id: BulletId) -> bool {
        match self.slots.iter_mut().find(|b| b.active && b.id == id) {
            Some(bullet) => {
                bullet.active = false;
                true
            }
            None => false,
        }
    }

    /// Deactivate every bullet within `radius` of a point
    pub fn clear_within(&mut self, x: f64, y: f64, radius: f64) -> usize {
        let r_sq = radius * radius;
        let mut cleared = 0;
        for bullet in self.slots.iter_mut().filter(|b| b.active) {
            if (bullet.x - x).powi(2) + (bullet.y - y).powi(2) <= r_sq {
                bullet.active = false;
                cleared += 1;
            }
        }
        cleared
    }

    pub fn clear(&mut self) {
        for bullet in &mut self.slots {
            bullet.active = false;
        }
    }

    /// Advance every active bullet one frame.
    ///
    /// Hits are only tested against `local`: every peer resolves damage for its
    /// own player and announces the outcome.
    pub fn step(
        &mut self,
        mut local: Option<&mut PlayerState>,
        walls: &ObstacleSet,
        config: &GameConfig,
        events: &mut Vec<CombatEvent>,
    ) {
        let arena = &config.arena;
        let tuning = &config.bullets;

        for bullet in self.slots.iter_mut().filter(|b| b.active) {
            bullet.x += bullet.angle.cos() * bullet.speed;
            bullet.y += bullet.angle.sin() * bullet.speed;
            bullet.life_timer += 1;
            if bullet.life_timer >= bullet.max_life {
                bullet.active = false;
                continue;
            }

            if bullet.x < arena.left() || bullet.x > arena.right() {
                if bullet.can_bounce() {
                    bullet.angle = PI - bullet.angle;
                    bullet.x = bullet.x.clamp(arena.left(), arena.right());
                    bullet.bounce_count += 1;
                } else {
                    bullet.active = false;
                    continue;
                }
            }
            if bullet.y < arena.top() || bullet.y > arena.bottom() {
                if bullet.can_bounce() {
                    bullet.angle = -bullet.angle;
                    bullet.y = bullet.y.clamp(arena.top(), arena.bottom());
                    bullet.bounce_count += 1;
                } else {
                    bullet.active = false;
                    continue;
                }
            }

            let phasing = bullet.flags.contains(BulletFlags::GHOST)
                && bullet.life_timer <= tuning.ghost_grace;
            if !phasing {
                if let Some(wall) = walls.first_contact(bullet.x, bullet.y, bullet.radius) {
                    if bullet.can_bounce() {
                        bullet.angle = wall.reflect(bullet.x, bullet.y, bullet.angle);
                        bullet.bounce_count += 1;
                    } else {
                        bullet.active = false;
                        continue;
                    }
                }
            }

            let Some(player) = local.as_deref_mut() else {
                continue;
            };
            if player.hp <= 0 {
                continue;
            }
            if bullet.owner == player.id && bullet.life_timer <= tuning.self_hit_grace {
                continue;
            }
            let half = f64::from(player.size);
            if (bullet.x - player.x).abs() < half && (bullet.y - player.y).abs() < half {
                bullet.active = false;
                CombatSystem::apply_hit(player, bullet, config, events);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::physics::Obstacle;
    use std::f64::consts::FRAC_PI_2;

    fn shot(id: BulletId, x: f64, y: f64, angle: f64) -> ShotSpec {
        ShotSpec {
            id,
            x,
            y,
            angle,
            speed: 10.0,
            damage: 20,
            size: 8,
            flags: BulletFlags::NONE,
            owner: 7,
            extra_bounces: 0,
            max_life: 600,
        }
    }

    fn player_at(id: PeerId, x: f64, y: f64) -> PlayerState {
        PlayerState::new(id, x, y, &GameConfig::default())
    }

    #[test]
    fn test_allocate_drops_duplicates_and_overflow() {
        let tuning = BulletTuning::default();
        let mut pool = BulletPool::new(2);
        assert!(pool.allocate(&shot(1, 500.0, 400.0, 0.0), &tuning));
        assert!(!pool.allocate(&shot(1, 500.0, 400.0, 0.0), &tuning));
        assert!(pool.allocate(&shot(2, 500.0, 400.0, 0.0), &tuning));
        assert!(!pool.allocate(&shot(3, 500.0, 400.0, 0.0), &tuning));
        assert_eq!(pool.active_count(), 2);
    }

    #[test]
    fn test_bounce_budget_from_extra_bounces() {
        let tuning = BulletTuning::default();
        let mut pool = BulletPool::new(4);
        let mut s = shot(1, 500.0, 400.0, 0.0);
        s.extra_bounces = 3;
        pool.allocate(&s, &tuning);
        let b = pool.get(1).unwrap();
        assert!(b.flags.contains(BulletFlags::BOUNCE));
        assert_eq!(b.max_bounces, 3);

        let mut s = shot(2, 500.0, 400.0, 0.0);
        s.flags = BulletFlags::BOUNCE;
        pool.allocate(&s, &tuning);
        assert_eq!(pool.get(2).unwrap().max_bounces, 2);
    }

    #[test]
    fn test_wall_face_reflection_scenario() {
        let config = GameConfig::default();
        let walls = ObstacleSet::new(vec![Obstacle::new(0.0, 90.0, 200.0, 90.0)]);
        let mut pool = BulletPool::new(4);
        let mut s = shot(1, 100.0, 82.0, FRAC_PI_2);
        s.flags = BulletFlags::BOUNCE;
        pool.allocate(&s, &config.bullets);

        // Shrink the arena check out of the way: the wall sits above the default arena.
        let mut config = config;
        config.arena.y = 0.0;

        let mut events = Vec::new();
        pool.step(None, &walls, &config, &mut events);
        let b = pool.get(1).unwrap();
        assert!((b.y - 92.0).abs() < 1e-9);
        assert!((b.angle + FRAC_PI_2).abs() < 1e-9);
        assert_eq!(b.bounce_count, 1);
    }

    #[test]
    fn test_bounce_budget_is_exact() {
        let mut config = GameConfig::default();
        config.arena.x = 0.0;
        config.arena.y = 0.0;
        config.arena.width = 100.0;
        config.arena.height = 1000.0;
        let walls = ObstacleSet::default();

        for budget in 0..4u32 {
            let mut pool = BulletPool::new(1);
            let mut s = shot(1, 50.0, 500.0, 0.0);
            s.extra_bounces = budget;
            s.flags = if budget == 0 {
                BulletFlags::NONE
            } else {
                BulletFlags::BOUNCE
            };
            pool.allocate(&s, &config.bullets);

            let mut contacts = 0;
            let mut last_count = 0;
            let mut events = Vec::new();
            for _ in 0..200 {
                pool.step(None, &walls, &config, &mut events);
                match pool.get(1) {
                    Some(b) => {
                        if b.bounce_count != last_count {
                            contacts += 1;
                            last_count = b.bounce_count;
                        }
                    }
                    None => {
                        contacts += 1;
                        break;
                    }
                }
            }
            assert_eq!(contacts, budget + 1, "budget {budget}");
        }
    }

    /// Steps until the bullet is gone, returning that step and its last bounce count
    fn run_until_removed(
        pool: &mut BulletPool,
        walls: &ObstacleSet,
        config: &GameConfig,
    ) -> (u32, u32) {
        let mut events = Vec::new();
        let mut bounces = 0;
        for step in 1..=200 {
            pool.step(None, walls, config, &mut events);
            match pool.get(1) {
                Some(b) => bounces = b.bounce_count,
                None => return (step, bounces),
            }
        }
        panic!("bullet never removed");
    }

    #[test]
    fn test_walls_share_the_bounce_budget() {
        let config = GameConfig::default();
        let first = Obstacle::new(500.0, 300.0, 500.0, 500.0);
        let second = Obstacle::new(300.0, 300.0, 300.0, 500.0);

        let mut s = shot(1, 470.0, 400.0, 0.0);
        s.flags = BulletFlags::BOUNCE;
        s.extra_bounces = 1;

        // wall then wall: reflected at x=500 on step 3, removed at x=300
        let walls = ObstacleSet::new(vec![first, second]);
        let mut pool = BulletPool::new(1);
        pool.allocate(&s, &config.bullets);
        assert_eq!(run_until_removed(&mut pool, &walls, &config), (23, 1));

        // wall then arena edge: removed once x drops below the left edge
        let walls = ObstacleSet::new(vec![first]);
        let mut pool = BulletPool::new(1);
        pool.allocate(&s, &config.bullets);
        assert_eq!(run_until_removed(&mut pool, &walls, &config), (49, 1));

        // arena edge then wall
        let walls = ObstacleSet::new(vec![Obstacle::new(200.0, 300.0, 200.0, 500.0)]);
        let mut s = shot(1, 70.0, 400.0, PI);
        s.flags = BulletFlags::BOUNCE;
        s.extra_bounces = 1;
        let mut pool = BulletPool::new(1);
        pool.allocate(&s, &config.bullets);
        assert_eq!(run_until_removed(&mut pool, &walls, &config), (18, 1));
    }

    #[test]
    fn test_lifetime_expiry() {
        let config = GameConfig::default();
        let mut pool = BulletPool::new(1);
        let mut s = shot(1, 300.0, 400.0, 0.0);
        s.speed = 0.0;
        s.max_life = 3;
        pool.allocate(&s, &config.bullets);
        let walls = ObstacleSet::default();
        let mut events = Vec::new();
        pool.step(None, &walls, &config, &mut events);
        pool.step(None, &walls, &config, &mut events);
        assert_eq!(pool.active_count(), 1);
        pool.step(None, &walls, &config, &mut events);
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_ghost_passes_walls_during_grace() {
        let config = GameConfig::default();
        let walls = ObstacleSet::new(vec![Obstacle::new(310.0, 300.0, 310.0, 500.0)]);
        let mut pool = BulletPool::new(1);
        let mut s = shot(1, 300.0, 400.0, 0.0);
        s.flags = BulletFlags::GHOST;
        pool.allocate(&s, &config.bullets);
        let mut events = Vec::new();
        pool.step(None, &walls, &config, &mut events);
        assert_eq!(pool.active_count(), 1);

        let mut pool = BulletPool::new(1);
        pool.allocate(&shot(1, 300.0, 400.0, 0.0), &config.bullets);
        pool.step(None, &walls, &config, &mut events);
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_guard_cut_without_delay() {
        let config = GameConfig::default();
        let mut target = player_at(2, 500.0, 400.0);
        target.is_guarding = true;
        assert_eq!(
            CombatSystem::resolve_damage(20, &target, &config),
            DamageRoute::Immediate(2)
        );
        assert_eq!(
            CombatSystem::resolve_damage(5, &target, &config),
            DamageRoute::Immediate(1)
        );
    }

    #[test]
    fn test_build_up_then_guard_then_delay() {
        let config = GameConfig::default();
        let mut target = player_at(2, 500.0, 400.0);
        target.passives.build_up = true;
        // 20 * 0.7 = 14
        assert_eq!(
            CombatSystem::resolve_damage(20, &target, &config),
            DamageRoute::Immediate(14)
        );
        target.is_guarding = true;
        target.passives.delay = true;
        // 14 * 0.1 = 1
        assert_eq!(
            CombatSystem::resolve_damage(20, &target, &config),
            DamageRoute::Deferred(1)
        );
    }

    #[test]
    fn test_lifesteal_poison_scenario() {
        let config = GameConfig::default();
        let mut pool = BulletPool::new(4);
        let mut s = shot(42, 490.0, 400.0, 0.0);
        s.flags = BulletFlags::LIFESTEAL | BulletFlags::POISON;
        pool.allocate(&s, &config.bullets);

        let mut target = player_at(2, 500.0, 400.0);
        target.poison_stacks = 2;
        target.poison_timer = 5;

        let mut events = Vec::new();
        pool.step(Some(&mut target), &ObstacleSet::default(), &config, &mut events);

        assert_eq!(target.hp, 80);
        assert_eq!(target.poison_stacks, 3);
        assert_eq!(target.poison_timer, config.player.poison_duration);
        assert_eq!(pool.active_count(), 0);
        assert_eq!(
            events,
            vec![
                CombatEvent::Hit { bullet_id: 42, owner: 7 },
                CombatEvent::Heal { target: 7, amount: 10 },
            ]
        );
    }

    #[test]
    fn test_owner_is_immune_during_grace() {
        let config = GameConfig::default();
        let mut pool = BulletPool::new(1);
        let mut s = shot(1, 500.0, 400.0, 0.0);
        s.speed = 0.0;
        pool.allocate(&s, &config.bullets);
        let mut me = player_at(7, 500.0, 400.0);
        let mut events = Vec::new();
        for _ in 0..10 {
            pool.step(Some(&mut me), &ObstacleSet::default(), &config, &mut events);
        }
        assert!(events.is_empty());
        pool.step(Some(&mut me), &ObstacleSet::default(), &config, &mut events);
        assert_eq!(events.len(), 1);
        assert_eq!(me.hp, 80);
    }

    #[test]
    fn test_lethal_hit_emits_dead_once() {
        let config = GameConfig::default();
        let mut pool = BulletPool::new(4);
        let mut a = shot(1, 490.0, 400.0, 0.0);
        a.damage = 150;
        let mut b = shot(2, 490.0, 400.0, 0.0);
        b.damage = 150;
        pool.allocate(&a, &config.bullets);
        pool.allocate(&b, &config.bullets);
        let mut target = player_at(2, 500.0, 400.0);
        let mut events = Vec::new();
        pool.step(Some(&mut target), &ObstacleSet::default(), &config, &mut events);
        assert_eq!(target.hp, 0);
        let deaths = events
            .iter()
            .filter(|e| matches!(e, CombatEvent::Dead { .. }))
            .count();
        assert_eq!(deaths, 1);
    }

    #[test]
    fn test_clear_within_radius() {
        let config = GameConfig::default();
        let mut pool = BulletPool::new(4);
        pool.allocate(&shot(1, 100.0, 100.0, 0.0), &config.bullets);
        pool.allocate(&shot(2, 150.0, 100.0, 0.0), &config.bullets);
        pool.allocate(&shot(3, 400.0, 100.0, 0.0), &config.bullets);
        assert_eq!(pool.clear_within(100.0, 100.0, 200.0), 2);
        assert!(pool.get(3).is_some());
        assert!(pool.deactivate_id(3));
        assert!(!pool.deactivate_id(3));
    }
}
