//! Austerity — a networked multi-player card-and-token game service.
//!
//! The library hosts everything the binaries share: the wire codec
//! ([`protocol`]), the card/deck model ([`cards`]), the authoritative
//! game-state engine ([`game`]), configuration-file parsing ([`config`]),
//! the verbosity-gated [`logger`], and the server runtime ([`server`]).

pub mod cards;
pub mod config;
pub mod game;
pub mod logger;
pub mod protocol;
pub mod server;
