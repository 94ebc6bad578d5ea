//! Two-peer arena duel: simulation, relay protocol and relay server

pub mod config;
pub mod game;
pub mod net;
pub mod util;
