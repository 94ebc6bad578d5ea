//! Input sources for the simulation

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{InputSnapshot, MatchCoordinator, MatchPhase};

/// Supplies one input snapshot per tick
pub trait InputSource: Send {
    fn sample(&mut self, view: &MatchCoordinator) -> InputSnapshot;
}

/// Headless driver: strafes, aims at the opponent, fires, takes the first offer
pub struct Autopilot {
    frame: u64,
    rng: ChaCha8Rng,
    strafe: (bool, bool, bool, bool),
    strafe_frames: u64,
    fire_period: u64,
}

impl Autopilot {
    pub fn new(seed: u64) -> Self {
        Self {
            frame: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            strafe: (false, false, false, false),
            strafe_frames: 45,
            fire_period: 20,
        }
    }

    fn pick_strafe(&mut self) {
        let horizontal = self.rng.gen_range(0..3);
        let vertical = self.rng.gen_range(0..3);
        self.strafe = (vertical == 1, vertical == 2, horizontal == 1, horizontal == 2);
    }
}

impl InputSource for Autopilot {
    fn sample(&mut self, view: &MatchCoordinator) -> InputSnapshot {
        self.frame += 1;
        let mut input = InputSnapshot::default();

        match view.phase() {
            MatchPhase::Waiting => input.join = view.my_id().is_some(),
            MatchPhase::RoundEndSelect => {
                if !view.presented().is_empty() {
                    input.pick = Some(0);
                }
            }
            MatchPhase::GameOver => input.acknowledge = true,
            MatchPhase::Playing => {
                if self.frame % self.strafe_frames == 1 {
                    self.pick_strafe();
                }
                (input.up, input.down, input.left, input.right) = self.strafe;

                if let Some(target) = view.opponent() {
                    input.pointer_x = target.x;
                    input.pointer_y = target.y;
                    input.fire = self.frame % self.fire_period < self.fire_period / 2;
                }
                if let Some(me) = view.local_player() {
                    input.guard = me.hp * 3 < me.max_hp;
                }
            }
            MatchPhase::Countdown | MatchPhase::RoundEndWait => {}
        }
        input
    }
}
