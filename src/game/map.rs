//! Round geometry generation. Only the host runs this.

use rand::Rng;

use super::physics::Obstacle;
use crate::config::tuning::{ArenaConfig, MapLayout};

const FORTRESS_CROSS: f64 = 120.0;
const FORTRESS_CORNER_MARGIN: f64 = 80.0;
const FORTRESS_CORNER_SIZE: f64 = 60.0;

const PLAIN_ARM: f64 = 150.0;
const PLAIN_GAP: f64 = 30.0;

const CORRIDOR_GAP: f64 = 100.0;

const RANDOM_SEGMENTS: usize = 8;
const RANDOM_MARGIN: f64 = 100.0;
const RANDOM_MIN_LEN: f64 = 50.0;
const RANDOM_MAX_LEN: f64 = 150.0;

/// Smallest arena width or height that leaves room inside the random layout margins
pub const MIN_ARENA_SPAN: f64 = RANDOM_MARGIN * 2.0;

pub struct MapGenerator;

impl MapGenerator {
    pub fn generate<R: Rng + ?Sized>(
        layout: MapLayout,
        arena: &ArenaConfig,
        rng: &mut R,
    ) -> Vec<Obstacle> {
        match layout {
            MapLayout::Fortress => Self::fortress(arena),
            MapLayout::Plain => Self::plain(arena),
            MapLayout::Corridor => Self::corridor(arena),
            MapLayout::Random => Self::random(arena, rng),
        }
    }

    /// Large center cross with an L-shaped wall in each corner
    fn fortress(arena: &ArenaConfig) -> Vec<Obstacle> {
        let (cx, cy) = arena.center();
        let mut walls = vec![
            Obstacle::new(cx - FORTRESS_CROSS, cy, cx + FORTRESS_CROSS, cy),
            Obstacle::new(cx, cy - FORTRESS_CROSS, cx, cy + FORTRESS_CROSS),
        ];

        let m = FORTRESS_CORNER_MARGIN;
        let corners = [
            (arena.left() + m, arena.top() + m, 1.0, 1.0),
            (arena.right() - m, arena.top() + m, -1.0, 1.0),
            (arena.left() + m, arena.bottom() - m, 1.0, -1.0),
            (arena.right() - m, arena.bottom() - m, -1.0, -1.0),
        ];
        for (x, y, dx, dy) in corners {
            walls.push(Obstacle::new(x, y, x + FORTRESS_CORNER_SIZE * dx, y));
            walls.push(Obstacle::new(x, y, x, y + FORTRESS_CORNER_SIZE * dy));
        }
        walls
    }

    /// Center cross with a gap in the middle plus two side screens
    fn plain(arena: &ArenaConfig) -> Vec<Obstacle> {
        let (cx, cy) = arena.center();
        vec![
            Obstacle::new(cx - PLAIN_ARM, cy, cx - PLAIN_GAP, cy),
            Obstacle::new(cx + PLAIN_GAP, cy, cx + PLAIN_ARM, cy),
            Obstacle::new(cx, cy - PLAIN_ARM, cx, cy - PLAIN_GAP),
            Obstacle::new(cx, cy + PLAIN_GAP, cx, cy + PLAIN_ARM),
            Obstacle::new(
                arena.left() + 100.0,
                arena.top() + 100.0,
                arena.left() + 200.0,
                arena.top() + 100.0,
            ),
            Obstacle::new(
                arena.right() - 200.0,
                arena.bottom() - 100.0,
                arena.right() - 100.0,
                arena.bottom() - 100.0,
            ),
        ]
    }

    /// Three split horizontal rows and two short vertical screens
    fn corridor(arena: &ArenaConfig) -> Vec<Obstacle> {
        let (cx, _) = arena.center();
        let mut walls = Vec::with_capacity(8);
        for i in 1..=3 {
            let y = arena.top() + (arena.height / 4.0) * f64::from(i);
            walls.push(Obstacle::new(arena.left() + 50.0, y, cx - CORRIDOR_GAP / 2.0, y));
            walls.push(Obstacle::new(cx + CORRIDOR_GAP / 2.0, y, arena.right() - 50.0, y));
        }
        walls.push(Obstacle::new(cx, arena.top() + 50.0, cx, arena.top() + 150.0));
        walls.push(Obstacle::new(cx, arena.bottom() - 150.0, cx, arena.bottom() - 50.0));
        walls
    }

    /// Axis-aligned segments scattered away from the edges
    fn random<R: Rng + ?Sized>(arena: &ArenaConfig, rng: &mut R) -> Vec<Obstacle> {
        // non-empty even for an arena that skipped validation
        let span_x = (arena.width - MIN_ARENA_SPAN).max(1.0);
        let span_y = (arena.height - MIN_ARENA_SPAN).max(1.0);

        (0..RANDOM_SEGMENTS)
            .map(|_| {
                let x1 = arena.left() + RANDOM_MARGIN + rng.gen_range(0.0..span_x).floor();
                let y1 = arena.top() + RANDOM_MARGIN + rng.gen_range(0.0..span_y).floor();
                let length = rng.gen_range(RANDOM_MIN_LEN..RANDOM_MAX_LEN).floor();
                let (mut x2, mut y2) = if rng.gen_bool(0.5) {
                    (x1 + length, y1)
                } else {
                    (x1, y1 + length)
                };
                if x2 > arena.right() {
                    x2 = arena.right() - 10.0;
                }
                if y2 > arena.bottom() {
                    y2 = arena.bottom() - 10.0;
                }
                Obstacle::new(x1, y1, x2, y2)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_fortress_layout() {
        let arena = ArenaConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let walls = MapGenerator::generate(MapLayout::Fortress, &arena, &mut rng);
        assert_eq!(walls.len(), 10);
        assert_eq!(walls[0], Obstacle::new(410.0, 400.0, 650.0, 400.0));
        assert_eq!(walls[2], Obstacle::new(130.0, 210.0, 190.0, 210.0));
    }

    #[test]
    fn test_fixed_layouts_have_expected_counts() {
        let arena = ArenaConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(MapGenerator::generate(MapLayout::Plain, &arena, &mut rng).len(), 6);
        assert_eq!(MapGenerator::generate(MapLayout::Corridor, &arena, &mut rng).len(), 8);
    }

    #[test]
    fn test_random_layout_is_seeded_and_inside_arena() {
        let arena = ArenaConfig::default();
        let seeded = || ChaCha8Rng::seed_from_u64(11);
        let a = MapGenerator::generate(MapLayout::Random, &arena, &mut seeded());
        let b = MapGenerator::generate(MapLayout::Random, &arena, &mut seeded());
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        for wall in &a {
            assert!(wall.is_horizontal() || (wall.x1 - wall.x2).abs() < 1.0);
            assert!(wall.x2 <= arena.right() && wall.y2 <= arena.bottom());
            assert!(wall.x1 >= arena.left() + 100.0 && wall.y1 >= arena.top() + 100.0);
        }
    }

    #[test]
    fn test_random_layout_on_minimum_arena() {
        let arena = ArenaConfig {
            width: MIN_ARENA_SPAN,
            height: MIN_ARENA_SPAN,
            ..ArenaConfig::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let walls = MapGenerator::generate(MapLayout::Random, &arena, &mut rng);
        assert_eq!(walls.len(), 8);
        for wall in &walls {
            assert_eq!(wall.x1, arena.left() + 100.0);
            assert_eq!(wall.y1, arena.top() + 100.0);
        }
    }
}
