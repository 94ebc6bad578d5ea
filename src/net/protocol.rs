//! Relay wire protocol
//!
//! One command per line, space-separated ASCII tokens. The relay appends the
//! sender's id as the last token of every line it forwards, so parsers read
//! the fields they need and ignore any trailing tokens.

use std::fmt;
use std::str::FromStr;

use crate::game::combat::{BulletId, ShotSpec};
use crate::game::effects::BulletFlags;
use crate::game::physics::Obstacle;
use crate::game::snapshot::{MoveState, StatusFlags, StatusUpdate};
use crate::game::PeerId;

/// Protocol parse errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Empty line")]
    Empty,

    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("{command}: missing field {field}")]
    MissingField {
        command: &'static str,
        field: &'static str,
    },

    #[error("{command}: invalid value {value:?} for {field}")]
    InvalidValue {
        command: &'static str,
        field: &'static str,
        value: String,
    },
}

/// Every message that crosses the relay
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Join { game_id: u32, player_id: PeerId },
    /// Relay to a new connection: its assigned id
    Start { assigned_id: PeerId },
    /// `sender` is filled from the relay-appended token; it is not encoded
    Move { state: MoveState, sender: PeerId },
    Status(StatusUpdate),
    Shot(ShotSpec),
    BulletHit { bullet_id: BulletId },
    Heal { target: PeerId, amount: i32 },
    Dead { player_id: PeerId },
    MapData(Vec<Obstacle>),
    NextRoundReady { player_id: PeerId },
    /// `sender` is filled from the relay-appended token; it is not encoded
    Ability { name: String, sender: PeerId },
    Enter { id: PeerId },
    Leave { id: PeerId },
    Users(Vec<PeerId>),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Join { .. } => "JOIN",
            Command::Start { .. } => "START",
            Command::Move { .. } => "MOVE",
            Command::Status(_) => "STATUS",
            Command::Shot(_) => "SHOT",
            Command::BulletHit { .. } => "BULLET_HIT",
            Command::Heal { .. } => "HEAL",
            Command::Dead { .. } => "DEAD",
            Command::MapData(_) => "MAP_DATA",
            Command::NextRoundReady { .. } => "NEXT_ROUND_READY",
            Command::Ability { .. } => "ABILITY",
            Command::Enter { .. } => "ENTER",
            Command::Leave { .. } => "LEAVE",
            Command::Users(_) => "USERS",
        }
    }
}

struct Fields<'a> {
    command: &'static str,
    tokens: Vec<&'a str>,
    pos: usize,
}

impl<'a> Fields<'a> {
    fn new(command: &'static str, tokens: Vec<&'a str>) -> Self {
        Self {
            command,
            tokens,
            pos: 0,
        }
    }

    fn next<T: FromStr>(&mut self, field: &'static str) -> Result<T, ProtocolError> {
        let raw = self
            .tokens
            .get(self.pos)
            .ok_or(ProtocolError::MissingField {
                command: self.command,
                field,
            })?;
        self.pos += 1;
        raw.parse().map_err(|_| ProtocolError::InvalidValue {
            command: self.command,
            field,
            value: raw.to_string(),
        })
    }

    /// The relay-appended sender id: always the last token
    fn sender(&self) -> Result<PeerId, ProtocolError> {
        let raw = self
            .tokens
            .last()
            .filter(|_| self.tokens.len() > self.pos)
            .ok_or(ProtocolError::MissingField {
                command: self.command,
                field: "sender",
            })?;
        raw.parse().map_err(|_| ProtocolError::InvalidValue {
            command: self.command,
            field: "sender",
            value: raw.to_string(),
        })
    }

    fn remaining(&self) -> &[&'a str] {
        &self.tokens[self.pos.min(self.tokens.len())..]
    }
}

/// Parse one received line
pub fn parse_line(line: &str) -> Result<Command, ProtocolError> {
    let mut parts = line.split_whitespace();
    let head = parts.next().ok_or(ProtocolError::Empty)?;
    let tokens: Vec<&str> = parts.collect();

    let cmd = match head {
        "JOIN" => {
            let mut f = Fields::new("JOIN", tokens);
            Command::Join {
                game_id: f.next("gameId")?,
                player_id: f.next("playerId")?,
            }
        }
        "START" => {
            let mut f = Fields::new("START", tokens);
            Command::Start {
                assigned_id: f.next("assignedId")?,
            }
        }
        "MOVE" => {
            let mut f = Fields::new("MOVE", tokens);
            let state = MoveState {
                x: f.next("x")?,
                y: f.next("y")?,
                angle: f.next("angle")?,
                hp: f.next("hp")?,
                reload_timer: f.next("reloadTimer")?,
                guard_cooldown: f.next("guardCooldownTimer")?,
                flags: StatusFlags::from_bits(f.next("statusFlags")?),
            };
            Command::Move {
                state,
                sender: f.sender()?,
            }
        }
        "STATUS" => {
            let mut f = Fields::new("STATUS", tokens);
            Command::Status(StatusUpdate {
                id: f.next("id")?,
                max_hp: f.next("maxHp")?,
                size: f.next("size")?,
                reload_duration: f.next("reloadDuration")?,
                max_guard_cooldown: f.next("maxGuardCooldown")?,
            })
        }
        "SHOT" => {
            let mut f = Fields::new("SHOT", tokens);
            Command::Shot(ShotSpec {
                id: f.next("bulletId")?,
                x: f.next("x")?,
                y: f.next("y")?,
                angle: f.next("angle")?,
                speed: f.next("speed")?,
                damage: f.next("damage")?,
                size: f.next("size")?,
                flags: BulletFlags::from_bits(f.next("flags")?),
                owner: f.next("ownerId")?,
                extra_bounces: f.next("extraBounces")?,
                max_life: f.next("maxLife")?,
            })
        }
        "BULLET_HIT" => {
            let mut f = Fields::new("BULLET_HIT", tokens);
            Command::BulletHit {
                bullet_id: f.next("bulletId")?,
            }
        }
        "HEAL" => {
            let mut f = Fields::new("HEAL", tokens);
            Command::Heal {
                target: f.next("targetId")?,
                amount: f.next("amount")?,
            }
        }
        "DEAD" => {
            let mut f = Fields::new("DEAD", tokens);
            Command::Dead {
                player_id: f.next("playerId")?,
            }
        }
        "MAP_DATA" => {
            let mut f = Fields::new("MAP_DATA", tokens);
            let mut walls = Vec::with_capacity(f.remaining().len() / 4);
            while f.remaining().len() >= 4 {
                walls.push(Obstacle::new(
                    f.next("x1")?,
                    f.next("y1")?,
                    f.next("x2")?,
                    f.next("y2")?,
                ));
            }
            Command::MapData(walls)
        }
        "NEXT_ROUND_READY" => {
            let mut f = Fields::new("NEXT_ROUND_READY", tokens);
            Command::NextRoundReady {
                player_id: f.next("playerId")?,
            }
        }
        "ABILITY" => {
            let f = Fields::new("ABILITY", tokens);
            let sender = f.sender()?;
            let name_tokens = &f.tokens[..f.tokens.len() - 1];
            if name_tokens.is_empty() {
                return Err(ProtocolError::MissingField {
                    command: "ABILITY",
                    field: "name",
                });
            }
            Command::Ability {
                name: name_tokens.join(" "),
                sender,
            }
        }
        "ENTER" => {
            let mut f = Fields::new("ENTER", tokens);
            Command::Enter { id: f.next("id")? }
        }
        "LEAVE" => {
            let mut f = Fields::new("LEAVE", tokens);
            Command::Leave { id: f.next("id")? }
        }
        "USERS" => {
            let mut f = Fields::new("USERS", tokens);
            let mut ids = Vec::new();
            while !f.remaining().is_empty() {
                ids.push(f.next("id")?);
            }
            Command::Users(ids)
        }
        other => return Err(ProtocolError::Unknown(other.to_string())),
    };
    Ok(cmd)
}

impl fmt::Display for Command {
    /// Encode as a line without the trailing newline, as a peer or the relay sends it
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        match self {
            Command::Join { game_id, player_id } => write!(f, " {game_id} {player_id}"),
            Command::Start { assigned_id } => write!(f, " {assigned_id}"),
            Command::Move { state, .. } => write!(
                f,
                " {} {} {} {} {} {} {}",
                state.x,
                state.y,
                state.angle,
                state.hp,
                state.reload_timer,
                state.guard_cooldown,
                state.flags.bits()
            ),
            Command::Status(s) => write!(
                f,
                " {} {} {} {} {}",
                s.id, s.max_hp, s.size, s.reload_duration, s.max_guard_cooldown
            ),
            Command::Shot(s) => write!(
                f,
                " {} {} {} {} {} {} {} {} {} {} {}",
                s.id,
                s.x,
                s.y,
                s.angle,
                s.speed,
                s.damage,
                s.size,
                s.flags.bits(),
                s.owner,
                s.extra_bounces,
                s.max_life
            ),
            Command::BulletHit { bullet_id } => write!(f, " {bullet_id}"),
            Command::Heal { target, amount } => write!(f, " {target} {amount}"),
            Command::Dead { player_id } => write!(f, " {player_id}"),
            Command::MapData(walls) => {
                for w in walls {
                    write!(f, " {} {} {} {}", w.x1, w.y1, w.x2, w.y2)?;
                }
                Ok(())
            }
            Command::NextRoundReady { player_id } => write!(f, " {player_id}"),
            Command::Ability { name, .. } => write!(f, " {name}"),
            Command::Enter { id } => write!(f, " {id}"),
            Command::Leave { id } => write!(f, " {id}"),
            Command::Users(ids) => {
                for id in ids {
                    write!(f, " {id}")?;
                }
                Ok(())
            }
        }
    }
}

/// Append the relay's sender tag to a line a peer sent
pub fn tag_with_sender(line: &str, sender: PeerId) -> String {
    format!("{} {}", line.trim_end(), sender)
}
