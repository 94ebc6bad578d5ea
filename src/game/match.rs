//! Match coordinator: per-tick ordering and the round/match state machine
//!
//! Each peer runs one coordinator. It is the sole writer of the local player
//! and of the bullets that player fires; every other entity is a mirror fed by
//! inbound commands. All outbound traffic is queued and drained by the
//! network driver once per tick.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use super::combat::{BulletPool, CombatEvent};
use super::effects::{self, PowerUp};
use super::map::MapGenerator;
use super::physics::ObstacleSet;
use super::player::{PlayerEvent, PlayerState};
use super::snapshot::SnapshotBuilder;
use super::weapon::BulletIds;
use super::{InputSnapshot, PeerId};
use crate::config::tuning::GameConfig;
use crate::net::protocol::Command;

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Waiting for two participants
    Waiting,
    /// Pre-round countdown
    Countdown,
    Playing,
    /// This peer lost the round and is picking a power-up
    RoundEndSelect,
    /// Waiting for both peers to signal ready
    RoundEndWait,
    GameOver,
}

/// How the match ended for this peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Victory,
    Defeat,
    /// The opponent left mid-match
    Forfeit,
}

pub struct MatchCoordinator {
    config: Arc<GameConfig>,
    game_id: u32,
    my_id: Option<PeerId>,
    phase: MatchPhase,
    /// Whether this peer asked to join the current match
    joined: bool,
    participants: BTreeSet<PeerId>,
    connected: BTreeSet<PeerId>,
    players: HashMap<PeerId, PlayerState>,
    bullets: BulletPool,
    walls: ObstacleSet,
    my_wins: u32,
    enemy_wins: u32,
    outcome: Option<MatchOutcome>,
    presented: Vec<&'static PowerUp>,
    countdown: u32,
    local_ready: bool,
    remote_ready: bool,
    frame: u64,
    rng: ChaCha8Rng,
    bullet_ids: BulletIds,
    prev_input: InputSnapshot,
    snapshot_builder: SnapshotBuilder,
    outbox: Vec<Command>,
}

impl MatchCoordinator {
    pub fn new(config: Arc<GameConfig>, game_id: u32, seed: u64) -> Self {
        let capacity = config.bullets.pool_capacity;
        Self {
            config,
            game_id,
            my_id: None,
            phase: MatchPhase::Waiting,
            joined: false,
            participants: BTreeSet::new(),
            connected: BTreeSet::new(),
            players: HashMap::new(),
            bullets: BulletPool::new(capacity),
            walls: ObstacleSet::default(),
            my_wins: 0,
            enemy_wins: 0,
            outcome: None,
            presented: Vec::new(),
            countdown: 0,
            local_ready: false,
            remote_ready: false,
            frame: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            bullet_ids: BulletIds::default(),
            prev_input: InputSnapshot::default(),
            snapshot_builder: SnapshotBuilder::new(),
            outbox: Vec::new(),
        }
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn my_id(&self) -> Option<PeerId> {
        self.my_id
    }

    pub fn score(&self) -> (u32, u32) {
        (self.my_wins, self.enemy_wins)
    }

    pub fn outcome(&self) -> Option<MatchOutcome> {
        self.outcome
    }

    pub fn presented(&self) -> &[&'static PowerUp] {
        &self.presented
    }

    pub fn participants(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.participants.iter().copied()
    }

    pub fn connected(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.connected.iter().copied()
    }

    pub fn player(&self, id: PeerId) -> Option<&PlayerState> {
        self.players.get(&id)
    }

    pub fn local_player(&self) -> Option<&PlayerState> {
        self.my_id.and_then(|id| self.players.get(&id))
    }

    /// The first participant that is not this peer
    pub fn opponent(&self) -> Option<&PlayerState> {
        self.participants
            .iter()
            .find(|id| Some(**id) != self.my_id)
            .and_then(|id| self.players.get(id))
    }

    pub fn bullets(&self) -> &BulletPool {
        &self.bullets
    }

    pub fn walls(&self) -> &ObstacleSet {
        &self.walls
    }

    /// Lowest participant id, recomputed on every call
    pub fn host_id(&self) -> Option<PeerId> {
        self.participants.iter().next().copied()
    }

    pub fn is_host(&self) -> bool {
        self.my_id.is_some() && self.host_id() == self.my_id
    }

    /// Take every command queued since the last drain
    pub fn drain_outbound(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.outbox)
    }

    /// Apply one inbound command
    pub fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Start { assigned_id } => self.handle_start(assigned_id),
            Command::Users(ids) => {
                self.connected = ids.into_iter().collect();
            }
            Command::Enter { id } => {
                info!(peer_id = id, "Peer connected to relay");
                self.connected.insert(id);
            }
            Command::Leave { id } => self.handle_leave(id),
            Command::Join { game_id, player_id } => self.handle_join(game_id, player_id),
            Command::Move { state, sender } => {
                if Some(sender) == self.my_id {
                    return;
                }
                let config = self.config.clone();
                self.mirror(sender).apply_move(&state, &config);
            }
            Command::Status(status) => {
                if Some(status.id) == self.my_id {
                    return;
                }
                self.mirror(status.id).apply_status(&status);
            }
            Command::Shot(shot) => {
                if self.phase == MatchPhase::Playing && Some(shot.owner) != self.my_id {
                    self.bullets.allocate(&shot, &self.config.bullets);
                }
            }
            Command::BulletHit { bullet_id } => {
                self.bullets.deactivate_id(bullet_id);
                if self.phase == MatchPhase::Playing
                    && Some(BulletIds::owner_of(bullet_id)) == self.my_id
                {
                    let config = self.config.clone();
                    if let Some(me) = self.local_player_mut() {
                        me.on_hit_confirmed(&config);
                    }
                }
            }
            Command::Heal { target, amount } => {
                if let Some(player) = self.players.get_mut(&target) {
                    player.heal(amount);
                }
            }
            Command::Dead { player_id } => self.resolve_round(player_id),
            Command::MapData(walls) => {
                debug!(walls = walls.len(), "Map received");
                self.walls.replace(walls);
                if self.phase != MatchPhase::Playing {
                    self.reset_positions();
                }
            }
            Command::NextRoundReady { player_id } => {
                if Some(player_id) != self.my_id {
                    self.remote_ready = true;
                    self.maybe_start_countdown();
                }
            }
            Command::Ability { name, sender } => {
                if Some(sender) == self.my_id {
                    return;
                }
                if effects::find(&name).is_none() {
                    warn!(peer_id = sender, ability = %name, "Unknown ability announced");
                }
                self.mirror(sender).abilities.push(name);
            }
        }
    }

    fn handle_start(&mut self, id: PeerId) {
        info!(peer_id = id, "Assigned relay id");
        self.my_id = Some(id);
        self.bullet_ids = BulletIds::new(id);
        self.connected.insert(id);
        let config = self.config.clone();
        self.players
            .entry(id)
            .or_insert_with(|| PlayerState::new(id, 0.0, 0.0, &config));
    }

    fn handle_leave(&mut self, id: PeerId) {
        info!(peer_id = id, "Peer left relay");
        self.connected.remove(&id);
        if Some(id) == self.my_id || !self.participants.remove(&id) {
            return;
        }
        self.players.remove(&id);

        let in_match = matches!(
            self.phase,
            MatchPhase::Countdown
                | MatchPhase::Playing
                | MatchPhase::RoundEndSelect
                | MatchPhase::RoundEndWait
        );
        if in_match && self.joined {
            info!(peer_id = id, "Opponent left mid-match, winning by forfeit");
            self.bullets.clear();
            self.outcome = Some(MatchOutcome::Forfeit);
            self.phase = MatchPhase::GameOver;
        }
    }

    fn handle_join(&mut self, game_id: u32, player_id: PeerId) {
        if game_id != self.game_id {
            debug!(peer_id = player_id, game_id, "Join for another game ignored");
            return;
        }
        if Some(player_id) == self.my_id {
            return;
        }

        let newcomer = self.participants.insert(player_id);
        self.mirror(player_id);
        if newcomer {
            info!(peer_id = player_id, "Participant joined");
        }

        if self.joined && newcomer {
            // A peer that joined before this one connected never saw our JOIN.
            if let Some(me) = self.my_id {
                self.outbox.push(Command::Join {
                    game_id: self.game_id,
                    player_id: me,
                });
            }
        }

        if self.joined && self.phase == MatchPhase::Waiting && self.participants.len() >= 2 {
            self.start_match();
        }
    }

    /// Ask to take part in the next match
    pub fn join(&mut self) {
        let Some(me) = self.my_id else {
            warn!("Cannot join before the relay assigned an id");
            return;
        };
        if self.joined {
            return;
        }
        self.joined = true;
        self.participants.insert(me);
        self.outbox.push(Command::Join {
            game_id: self.game_id,
            player_id: me,
        });
        info!(peer_id = me, game_id = self.game_id, "Joined match");

        if self.phase == MatchPhase::Waiting && self.participants.len() >= 2 {
            self.start_match();
        }
    }

    /// Pick one of the presented power-ups. Returns false if not selecting or out of range.
    pub fn select_power_up(&mut self, index: usize) -> bool {
        if self.phase != MatchPhase::RoundEndSelect {
            return false;
        }
        let Some(power_up) = self.presented.get(index).copied() else {
            return false;
        };
        let Some(me) = self.my_id else {
            return false;
        };

        let config = self.config.clone();
        if let Some(player) = self.players.get_mut(&me) {
            player.apply_power_up(power_up, &config);
        }
        info!(peer_id = me, power_up = power_up.name, "Power-up selected");

        self.presented.clear();
        self.outbox.push(Command::Ability {
            name: power_up.name.to_string(),
            sender: me,
        });
        self.snapshot_builder.force_next();
        self.push_status();
        self.signal_ready();
        true
    }

    /// Leave the game over screen and reset to waiting
    pub fn acknowledge_game_over(&mut self) {
        if self.phase != MatchPhase::GameOver {
            return;
        }
        self.phase = MatchPhase::Waiting;
        self.joined = false;
        self.participants.clear();
        self.my_wins = 0;
        self.enemy_wins = 0;
        self.outcome = None;
        self.presented.clear();
        self.local_ready = false;
        self.remote_ready = false;
        self.bullets.clear();
        self.walls.clear();

        let me = self.my_id;
        self.players.retain(|id, _| Some(*id) == me);
        if let Some(id) = me {
            self.players
                .insert(id, PlayerState::new(id, 0.0, 0.0, &self.config));
        }
        self.snapshot_builder.force_next();
        info!("Match torn down, back to waiting");
    }

    /// Our own relay connection closed
    pub fn on_disconnect(&mut self) {
        warn!("Relay connection lost");
        self.connected.clear();
        self.bullets.clear();
    }

    /// Advance the simulation one frame
    pub fn tick(&mut self, input: &InputSnapshot) {
        self.frame += 1;

        match self.phase {
            MatchPhase::Waiting => {
                if input.join && !self.joined {
                    self.join();
                }
            }
            MatchPhase::Countdown => {
                self.countdown = self.countdown.saturating_sub(1);
                if self.countdown == 0 {
                    self.phase = MatchPhase::Playing;
                    info!(frame = self.frame, "Round started");
                }
            }
            MatchPhase::Playing => self.simulate(input),
            MatchPhase::RoundEndSelect => {
                if let Some(index) = input.pick {
                    self.select_power_up(index);
                }
            }
            MatchPhase::RoundEndWait => {}
            MatchPhase::GameOver => {
                if input.acknowledge {
                    self.acknowledge_game_over();
                }
            }
        }

        if self.phase != MatchPhase::Waiting {
            self.push_status();
        }
        self.prev_input = input.clone();
    }

    fn simulate(&mut self, input: &InputSnapshot) {
        let Some(me) = self.my_id else {
            return;
        };
        let config = self.config.clone();
        let guard_pressed = input.guard && !self.prev_input.guard;
        let fire_pressed = input.fire && !self.prev_input.fire;

        let Self {
            players,
            bullets,
            walls,
            bullet_ids,
            rng,
            outbox,
            snapshot_builder,
            frame,
            ..
        } = self;

        let mut actions = Vec::new();
        let mut combat = Vec::new();
        let mut died = false;

        if let Some(player) = players.get_mut(&me) {
            player.begin_frame();
            if guard_pressed {
                player.try_guard(walls, &config, &mut actions);
            }
            player.update(input, *frame, walls, &config);
            player.tick_weapon(&config, bullet_ids, rng, &mut actions);
            if fire_pressed {
                player.try_fire(walls, &config, bullet_ids, rng, &mut actions);
            }
        }

        for action in actions {
            match action {
                PlayerEvent::Shot(shot) => {
                    bullets.allocate(&shot, &config.bullets);
                    outbox.push(Command::Shot(shot));
                }
                PlayerEvent::TheWorld { x, y, radius } => {
                    let cleared = bullets.clear_within(x, y, radius);
                    debug!(peer_id = me, cleared, "The World cleared bullets");
                }
            }
        }

        bullets.step(players.get_mut(&me), walls, &config, &mut combat);

        for event in combat {
            match event {
                CombatEvent::Hit { bullet_id, .. } => {
                    outbox.push(Command::BulletHit { bullet_id });
                }
                CombatEvent::Heal { target, amount } => {
                    if let Some(owner) = players.get_mut(&target) {
                        owner.heal(amount);
                    }
                    outbox.push(Command::Heal { target, amount });
                }
                CombatEvent::Dead { .. } => died = true,
            }
        }

        for (id, player) in players.iter_mut() {
            if *id != me {
                player.tick_mirror();
            }
        }

        if let Some(player) = players.get_mut(&me) {
            if player.hp <= 0 {
                player.hp = 0;
                died = true;
            }
            outbox.push(Command::Move {
                state: snapshot_builder.build_move(player),
                sender: me,
            });
        }

        if died {
            self.outbox.push(Command::Dead { player_id: me });
            self.resolve_round(me);
        }
    }

    /// First DEAD for a participant during play decides the round
    fn resolve_round(&mut self, dead_id: PeerId) {
        if self.phase != MatchPhase::Playing {
            return;
        }
        if !self.participants.contains(&dead_id) {
            debug!(peer_id = dead_id, "Death of a non-participant ignored");
            return;
        }

        let won = Some(dead_id) != self.my_id;
        if let Some(player) = self.players.get_mut(&dead_id) {
            player.hp = 0;
        }
        if won {
            self.my_wins += 1;
        } else {
            self.enemy_wins += 1;
        }
        self.bullets.clear();
        info!(
            dead = dead_id,
            my_wins = self.my_wins,
            enemy_wins = self.enemy_wins,
            "Round over"
        );

        let max_wins = self.config.rules.max_wins;
        if self.my_wins >= max_wins || self.enemy_wins >= max_wins {
            let outcome = if self.my_wins >= max_wins {
                MatchOutcome::Victory
            } else {
                MatchOutcome::Defeat
            };
            info!(?outcome, "Match over");
            self.outcome = Some(outcome);
            self.phase = MatchPhase::GameOver;
        } else if won {
            self.phase = MatchPhase::RoundEndWait;
            self.signal_ready();
        } else {
            self.presented = effects::sample_offers(&mut self.rng, self.config.rules.offer_count);
            self.phase = MatchPhase::RoundEndSelect;
        }
    }

    fn signal_ready(&mut self) {
        let Some(me) = self.my_id else {
            return;
        };
        self.phase = MatchPhase::RoundEndWait;
        self.local_ready = true;
        self.outbox.push(Command::NextRoundReady { player_id: me });
        self.maybe_start_countdown();
    }

    fn maybe_start_countdown(&mut self) {
        if self.phase == MatchPhase::RoundEndWait && self.local_ready && self.remote_ready {
            self.start_countdown();
        }
    }

    fn start_match(&mut self) {
        info!(
            participants = ?self.participants,
            host = ?self.host_id(),
            "Match starting"
        );
        self.my_wins = 0;
        self.enemy_wins = 0;
        self.outcome = None;
        self.start_countdown();
    }

    fn start_countdown(&mut self) {
        self.local_ready = false;
        self.remote_ready = false;
        self.bullets.clear();

        if self.is_host() {
            let walls =
                MapGenerator::generate(self.config.map_layout, &self.config.arena, &mut self.rng);
            self.outbox.push(Command::MapData(walls.clone()));
            self.walls.replace(walls);
        }
        self.reset_positions();

        self.countdown = self.config.rules.countdown_frames;
        self.phase = MatchPhase::Countdown;
        self.snapshot_builder.force_next();
        debug!(is_host = self.is_host(), "Countdown started");
    }

    /// Lowest participant spawns top-left, the other bottom-right
    fn reset_positions(&mut self) {
        let arena = &self.config.arena;
        let inset = arena.spawn_inset;
        let top_left = (arena.left() + inset, arena.top() + inset);
        let bottom_right = (arena.right() - inset, arena.bottom() - inset);
        let host = self.host_id();

        for id in &self.participants {
            if let Some(player) = self.players.get_mut(id) {
                let (x, y) = if Some(*id) == host {
                    top_left
                } else {
                    bottom_right
                };
                player.reset_for_round(x, y);
            }
        }
    }

    fn push_status(&mut self) {
        let Some(me) = self.my_id else {
            return;
        };
        if let Some(player) = self.players.get(&me) {
            if let Some(status) = self.snapshot_builder.status_if_changed(player, &self.config) {
                self.outbox.push(Command::Status(status));
            }
        }
    }

    fn local_player_mut(&mut self) -> Option<&mut PlayerState> {
        let id = self.my_id?;
        self.players.get_mut(&id)
    }

    fn mirror(&mut self, id: PeerId) -> &mut PlayerState {
        let config = &self.config;
        self.players
            .entry(id)
            .or_insert_with(|| PlayerState::new(id, 0.0, 0.0, config))
    }
}
