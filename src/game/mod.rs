//! Game simulation modules

pub mod autopilot;
pub mod combat;
pub mod effects;
pub mod map;
pub mod r#match;
pub mod physics;
pub mod player;
pub mod snapshot;
pub mod weapon;

pub use r#match::{MatchCoordinator, MatchOutcome, MatchPhase};

/// Relay-assigned connection id
pub type PeerId = u32;

/// Input state for a single tick.
///
/// Button fields are levels; the coordinator derives press edges by comparing
/// against the previous tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSnapshot {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub pointer_x: f64,
    pub pointer_y: f64,
    pub fire: bool,
    pub guard: bool,
    /// Index into the presented power-ups while selecting
    pub pick: Option<usize>,
    /// Leave the game over screen
    pub acknowledge: bool,
    /// Ask to take part in the next match
    pub join: bool,
}
