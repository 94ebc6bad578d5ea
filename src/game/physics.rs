//! Wall geometry and movement constraints

use std::f64::consts::PI;

use crate::config::tuning::ArenaConfig;

/// An immutable wall segment, fixed for one round
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Obstacle {
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn is_horizontal(&self) -> bool {
        (self.y1 - self.y2).abs() < 1.0
    }

    /// Shortest distance from a point to this segment
    pub fn distance_to(&self, px: f64, py: f64) -> f64 {
        let dx = self.x2 - self.x1;
        let dy = self.y2 - self.y1;
        let len_sq = dx * dx + dy * dy;

        let t = if len_sq <= f64::EPSILON {
            0.0
        } else {
            (((px - self.x1) * dx + (py - self.y1) * dy) / len_sq).clamp(0.0, 1.0)
        };

        let cx = self.x1 + t * dx;
        let cy = self.y1 + t * dy;
        ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
    }

    fn spans_x(&self, x: f64) -> bool {
        x >= self.x1.min(self.x2) && x <= self.x1.max(self.x2)
    }

    fn spans_y(&self, y: f64) -> bool {
        y >= self.y1.min(self.y2) && y <= self.y1.max(self.y2)
    }

    /// Reflect `angle` off this wall for a contact at (x, y).
    ///
    /// A contact within the wall's long axis is a face hit; anything past the
    /// ends is a corner hit and reflects along the other axis.
    pub fn reflect(&self, x: f64, y: f64, angle: f64) -> f64 {
        if self.is_horizontal() {
            if self.spans_x(x) {
                -angle
            } else {
                PI - angle
            }
        } else if self.spans_y(y) {
            PI - angle
        } else {
            -angle
        }
    }
}

/// The static wall set for the current round
#[derive(Debug, Clone, Default)]
pub struct ObstacleSet {
    walls: Vec<Obstacle>,
}

impl ObstacleSet {
    pub fn new(walls: Vec<Obstacle>) -> Self {
        Self { walls }
    }

    pub fn replace(&mut self, walls: Vec<Obstacle>) {
        self.walls = walls;
    }

    pub fn clear(&mut self) {
        self.walls.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Obstacle> {
        self.walls.iter()
    }

    pub fn as_slice(&self) -> &[Obstacle] {
        &self.walls
    }

    pub fn len(&self) -> usize {
        self.walls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.walls.is_empty()
    }

    /// First wall closer than `radius` to the point, in insertion order
    pub fn first_contact(&self, x: f64, y: f64, radius: f64) -> Option<&Obstacle> {
        self.walls.iter().find(|w| w.distance_to(x, y) < radius)
    }

    pub fn intersects_circle(&self, x: f64, y: f64, radius: f64) -> bool {
        self.first_contact(x, y, radius).is_some()
    }
}

/// Movement rules shared by every player
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Whether a body of `size` may stand at (x, y)
    pub fn position_blocked(
        x: f64,
        y: f64,
        size: f64,
        walls: &ObstacleSet,
        arena: &ArenaConfig,
    ) -> bool {
        let clearance = size + arena.collision_buffer;
        if x < arena.left() + clearance
            || x > arena.right() - clearance
            || y < arena.top() + clearance
            || y > arena.bottom() - clearance
        {
            return true;
        }
        walls.intersects_circle(x, y, clearance)
    }

    /// Move along X then Y independently. A blocked axis keeps its old value.
    pub fn step_axes(
        x: f64,
        y: f64,
        dx: f64,
        dy: f64,
        size: f64,
        walls: &ObstacleSet,
        arena: &ArenaConfig,
    ) -> (f64, f64) {
        let mut nx = x;
        let mut ny = y;

        if dx != 0.0 && !Self::position_blocked(x + dx, y, size, walls, arena) {
            nx = x + dx;
        }
        if dy != 0.0 && !Self::position_blocked(nx, y + dy, size, walls, arena) {
            ny = y + dy;
        }
        (nx, ny)
    }

    /// Clamp a point into the arena, inset by `inset` on every side
    pub fn clamp_to_arena(x: f64, y: f64, inset: f64, arena: &ArenaConfig) -> (f64, f64) {
        (
            x.clamp(arena.left() + inset, arena.right() - inset),
            y.clamp(arena.top() + inset, arena.bottom() - inset),
        )
    }
}
