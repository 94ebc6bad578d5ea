//! Relay wire protocol, relay server and peer driver

pub mod peer;
pub mod protocol;
pub mod relay;
