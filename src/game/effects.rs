//! Power-up catalog
//!
//! Every power-up is a plain data record: an ordered list of stat operations,
//! optional bullet flags, and an optional granted skill or passive. Weapon and
//! player stats are always recomputed by folding the acquired effects over
//! base values, so nothing here holds state.

use std::f64::consts::FRAC_PI_4;
use std::ops::{BitOr, BitOrAssign};

use rand::seq::SliceRandom;
use rand::Rng;

/// Bullet behavior flags carried on the wire as an integer bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BulletFlags(u32);

impl BulletFlags {
    pub const NONE: Self = Self(0);
    /// Heals the owner for half the damage dealt
    pub const LIFESTEAL: Self = Self(1);
    pub const BOUNCE: Self = Self(2);
    pub const POISON: Self = Self(4);
    pub const COLD: Self = Self(8);
    /// Passes through walls for a short grace window after spawn
    pub const GHOST: Self = Self(16);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for BulletFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for BulletFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// A single stat transform. Integer stats truncate at every multiplicative step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatOp {
    DamageMul(f64),
    BulletSpeedMul(f64),
    ReloadMul(f64),
    FireIntervalAdd(u32),
    PelletsAdd(u32),
    WavesAdd(u32),
    BouncesAdd(u32),
    AmmoAdd(i32),
    /// Pellets get independent random angles and speeds
    SpeedJitter,
    Spread(f64),
    /// Caps bullet travel distance; lifetime is derived from the final speed
    Range(f64),
    MaxHpMul(f64),
    SizeMul(f64),
    MoveSpeedMul(f64),
}

/// Skills and passives a power-up can unlock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ability {
    TacticalReload,
    ExclusiveDefense,
    Invisibility,
    EmergencyGuard,
    Teleport,
    SelfRegen,
    TheWorld,
    Thirst,
    Delay,
    Confidence,
    BuildUp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Effect {
    pub ops: &'static [StatOp],
    pub flags: BulletFlags,
    pub grants: Option<Ability>,
}

impl Effect {
    const fn stats(ops: &'static [StatOp]) -> Self {
        Self {
            ops,
            flags: BulletFlags::NONE,
            grants: None,
        }
    }

    const fn flagged(ops: &'static [StatOp], flags: BulletFlags) -> Self {
        Self {
            ops,
            flags,
            grants: None,
        }
    }

    const fn granting(ops: &'static [StatOp], ability: Ability) -> Self {
        Self {
            ops,
            flags: BulletFlags::NONE,
            grants: Some(ability),
        }
    }
}

/// A catalog entry offered to the round loser
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerUp {
    pub name: &'static str,
    pub description: &'static str,
    pub merit: &'static str,
    pub demerit: &'static str,
    pub effect: Effect,
}

use StatOp::*;

static CATALOG: [PowerUp; 29] = [
    // Weapon effects
    PowerUp {
        name: "Hill",
        description: "Lifesteal rounds",
        merit: "Heal on hit",
        demerit: "Damage 60%",
        effect: Effect::flagged(&[DamageMul(0.6)], BulletFlags::LIFESTEAL),
    },
    PowerUp {
        name: "Rising",
        description: "High velocity rounds",
        merit: "Bullet speed x2",
        demerit: "Damage 80%",
        effect: Effect::stats(&[BulletSpeedMul(2.0), DamageMul(0.8)]),
    },
    PowerUp {
        name: "Impact",
        description: "Heavy cannon",
        merit: "Damage and bullet speed x2",
        demerit: "Longer fire interval, reload x1.5",
        effect: Effect::stats(&[
            DamageMul(2.0),
            BulletSpeedMul(2.0),
            ReloadMul(1.5),
            FireIntervalAdd(60),
        ]),
    },
    PowerUp {
        name: "Danmaku",
        description: "Bullet curtain",
        merit: "Fires a fan of 5",
        demerit: "Reload x1.3",
        effect: Effect::stats(&[PelletsAdd(4), ReloadMul(1.3)]),
    },
    PowerUp {
        name: "Reel Gun",
        description: "Three round burst",
        merit: "3 waves per shot",
        demerit: "Reload x1.3",
        effect: Effect::stats(&[WavesAdd(2), ReloadMul(1.3)]),
    },
    PowerUp {
        name: "Shower",
        description: "Scatter spray",
        merit: "15 pellets with random speed",
        demerit: "Damage 30%, reload x1.5",
        effect: Effect::stats(&[PelletsAdd(14), SpeedJitter, ReloadMul(1.5), DamageMul(0.3)]),
    },
    PowerUp {
        name: "Reflect",
        description: "Ricochet rounds",
        merit: "Bounces +2, damage x1.1",
        demerit: "Reload x1.2",
        effect: Effect::flagged(
            &[BouncesAdd(2), DamageMul(1.1), ReloadMul(1.2)],
            BulletFlags::BOUNCE,
        ),
    },
    PowerUp {
        name: "No Control",
        description: "Runaway ricochet",
        merit: "Bounces +5, bullet speed x1.2",
        demerit: "Reload x1.3",
        effect: Effect::flagged(
            &[BouncesAdd(5), BulletSpeedMul(1.2), ReloadMul(1.3)],
            BulletFlags::BOUNCE,
        ),
    },
    PowerUp {
        name: "Idaten",
        description: "Swift runner",
        merit: "Move and bullet speed x1.5",
        demerit: "Half HP, damage 60%",
        effect: Effect::stats(&[
            BulletSpeedMul(1.5),
            DamageMul(0.6),
            MaxHpMul(0.5),
            MoveSpeedMul(1.5),
        ]),
    },
    PowerUp {
        name: "Cold",
        description: "Freezing rounds",
        merit: "Slows the target to 50%",
        demerit: "Reload x1.5",
        effect: Effect::flagged(&[ReloadMul(1.5)], BulletFlags::COLD),
    },
    PowerUp {
        name: "3 in 1",
        description: "Trinity",
        merit: "Damage and bullet speed x2",
        demerit: "Ammo -2, reload x1.5",
        effect: Effect::stats(&[DamageMul(2.0), BulletSpeedMul(2.0), AmmoAdd(-2), ReloadMul(1.5)]),
    },
    PowerUp {
        name: "Poison",
        description: "Toxic rounds",
        merit: "Stacks poison on hit",
        demerit: "Reload x1.25",
        effect: Effect::flagged(&[ReloadMul(1.25)], BulletFlags::POISON),
    },
    PowerUp {
        name: "Ghost",
        description: "Phasing rounds",
        merit: "Briefly passes through walls",
        demerit: "Reload x1.25",
        effect: Effect::flagged(&[ReloadMul(1.25)], BulletFlags::GHOST),
    },
    PowerUp {
        name: "Quick",
        description: "Quick reload",
        merit: "Reload time halved",
        demerit: "None",
        effect: Effect::stats(&[ReloadMul(0.5)]),
    },
    // Body changes
    PowerUp {
        name: "Big Boy",
        description: "Giant",
        merit: "HP x1.5",
        demerit: "Hitbox x2",
        effect: Effect::stats(&[MaxHpMul(1.5), SizeMul(2.0)]),
    },
    PowerUp {
        name: "Small Boy",
        description: "Miniature",
        merit: "Smaller hitbox, speed x1.3",
        demerit: "Half HP",
        effect: Effect::stats(&[MaxHpMul(0.5), SizeMul(0.5), MoveSpeedMul(1.3)]),
    },
    // Guard-linked skills
    PowerUp {
        name: "Tac. Reload",
        description: "Tactical reload",
        merit: "Guard refills ammo",
        demerit: "Guard cooldown +2s",
        effect: Effect::granting(&[], Ability::TacticalReload),
    },
    PowerUp {
        name: "Exc. Defense",
        description: "Exclusive defense",
        merit: "Guard repeats after 2s, HP x1.3",
        demerit: "Guard cooldown +2s",
        effect: Effect::granting(&[MaxHpMul(1.3)], Ability::ExclusiveDefense),
    },
    PowerUp {
        name: "Invisible",
        description: "Cloak",
        merit: "Invisible after guarding",
        demerit: "Guard cooldown +5s",
        effect: Effect::granting(&[], Ability::Invisibility),
    },
    PowerUp {
        name: "Emergency",
        description: "Emergency guard",
        merit: "Guards automatically when empty",
        demerit: "None",
        effect: Effect::granting(&[], Ability::EmergencyGuard),
    },
    PowerUp {
        name: "Teleport",
        description: "Blink",
        merit: "Guard warps along the aim",
        demerit: "Guard cooldown +2s",
        effect: Effect::granting(&[], Ability::Teleport),
    },
    // Passives
    PowerUp {
        name: "Thirst",
        description: "Bloodthirst",
        merit: "Speed up after landing a hit",
        demerit: "None",
        effect: Effect::granting(&[], Ability::Thirst),
    },
    PowerUp {
        name: "Delay",
        description: "Delayed damage",
        merit: "Damage is taken gradually",
        demerit: "None",
        effect: Effect::granting(&[], Ability::Delay),
    },
    PowerUp {
        name: "Confidence",
        description: "Overconfidence",
        merit: "HP x3 after landing a hit",
        demerit: "HP drops to 1/3 when it ends",
        effect: Effect::granting(&[], Ability::Confidence),
    },
    PowerUp {
        name: "Big Capacity",
        description: "Extended magazine",
        merit: "Ammo +3, reload x0.9",
        demerit: "None",
        effect: Effect::stats(&[AmmoAdd(3), ReloadMul(0.9)]),
    },
    PowerUp {
        name: "Shotgun",
        description: "Shotgun",
        merit: "20 extra pellets, damage x1.1",
        demerit: "Short range",
        effect: Effect::stats(&[PelletsAdd(20), DamageMul(1.1), Spread(FRAC_PI_4), Range(150.0)]),
    },
    PowerUp {
        name: "Self Regen",
        description: "Regeneration",
        merit: "Guard heals 30% HP",
        demerit: "Guard cooldown +2s",
        effect: Effect::granting(&[], Ability::SelfRegen),
    },
    PowerUp {
        name: "Build Up",
        description: "Bulk up",
        merit: "Damage x1.3, damage taken -30%",
        demerit: "Move speed -30%",
        effect: Effect::granting(&[DamageMul(1.3), MoveSpeedMul(0.7)], Ability::BuildUp),
    },
    PowerUp {
        name: "The World",
        description: "\"The World\"",
        merit: "Guard erases nearby bullets",
        demerit: "Guard cooldown +5s",
        effect: Effect::granting(&[], Ability::TheWorld),
    },
];

pub fn catalog() -> &'static [PowerUp] {
    &CATALOG
}

/// Look up a catalog entry by its display name
pub fn find(name: &str) -> Option<&'static PowerUp> {
    CATALOG.iter().find(|p| p.name == name)
}

/// Draw `count` distinct entries for a round-loser offer
pub fn sample_offers<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<&'static PowerUp> {
    CATALOG.choose_multiple(rng, count).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_names_are_unique() {
        let names: HashSet<_> = catalog().iter().map(|p| p.name).collect();
        assert_eq!(names.len(), catalog().len());
    }

    #[test]
    fn test_offers_are_distinct() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..50 {
            let offers = sample_offers(&mut rng, 3);
            assert_eq!(offers.len(), 3);
            let names: HashSet<_> = offers.iter().map(|p| p.name).collect();
            assert_eq!(names.len(), 3);
        }
    }

    #[test]
    fn test_find_by_name_with_spaces() {
        let p = find("Tac. Reload").unwrap();
        assert_eq!(p.effect.grants, Some(Ability::TacticalReload));
        assert!(find("Nope").is_none());
    }

    #[test]
    fn test_flags_contain() {
        let flags = BulletFlags::LIFESTEAL | BulletFlags::POISON;
        assert_eq!(flags.bits(), 5);
        assert!(flags.contains(BulletFlags::POISON));
        assert!(!flags.contains(BulletFlags::BOUNCE));
    }
}
