//! The server runtime: acceptors feed connection handlers, handlers feed
//! lobbies or the reconnect rendezvous, full lobbies become game tasks.

pub mod acceptor;
pub mod conn;
pub mod handler;
pub mod lifecycle;
pub mod lobby;
pub mod reconnect;
pub mod scores;
pub mod turn;

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cards::Deck;
use crate::game::GameCore;
use crate::logger::Logger;
use crate::protocol::seat_letter;

use self::lobby::Lobby;
use self::reconnect::Rendezvous;

//
// SHARED SERVER STATE
//

/// Everything a task needs, passed explicitly everywhere. One `Server`
/// value owns all games for the lifetime of the process.
pub struct Server {
    pub key: String,
    pub deck: Deck,
    /// Disconnect grace window in seconds; 0 means no grace.
    pub timeout: u64,
    pub log: Logger,
    pub registry: Mutex<Registry>,
    /// Flipped to `true` exactly once, on SIGTERM. Every game task holds a
    /// receiver and folds the flip into an `eog` ending.
    pub shutdown: watch::Sender<bool>,
}

impl Server {
    pub fn new(key: String, deck: Deck, timeout: u64, verbosity: u8) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            key,
            deck,
            timeout,
            log: Logger::new(verbosity),
            registry: Mutex::new(Registry::default()),
            shutdown,
        })
    }
}

/// The lobby table and the game table, guarded together: lookup-or-create,
/// join, and fill-triggered game creation all happen under one lock.
#[derive(Default)]
pub struct Registry {
    pub lobbies: HashMap<String, Lobby>,
    pub games: Vec<Arc<GameHandle>>,
    pub tasks: Vec<JoinHandle<()>>,
}

/// The shared face of one game: named, counted, with its state behind a
/// mutex (written only by the game task) and its reconnect rendezvous.
pub struct GameHandle {
    pub name: String,
    pub counter: u32,
    pub core: Mutex<GameCore>,
    pub rendezvous: Rendezvous,
}

impl GameHandle {
    pub fn is_finished(&self) -> bool {
        self.rendezvous.is_finished()
    }

    /// Mark the game finished; true for whichever caller got there first.
    pub fn finish(&self) -> bool {
        self.rendezvous.finish()
    }
}

//
// DISPLAY EVENTS
//
// Every loggable occurrence is a variant of one of two enums: `Event` for
// server-wide happenings, `GameEvent` for lines that belong to a single
// game and are emitted through a `Logger::game` scope (which supplies the
// `[game name.counter]` tag). Implementing `Display` means the logger
// receives a rich, human-readable message while paying nothing for
// variants below the current verbosity level.

pub enum Event {
    Listening { port: u16 },
    ClientAccepted { addr: SocketAddr, port: u16 },
    AuthFailed { addr: SocketAddr },
    LobbyJoined { game: String, player: String, have: usize, need: usize },
    ReconnectRejected { reason: &'static str },
    ScoresServed { addr: SocketAddr },
    AcceptError { reason: String },
    Reloading,
    ReloadFailed { reason: String },
    ShuttingDown,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Listening { port } =>
                write!(f, "Listening on port {port}"),
            Event::ClientAccepted { addr, port } =>
                write!(f, "Accepted {addr} on port {port}"),
            Event::AuthFailed { addr } =>
                write!(f, "Rejected {addr}: bad key"),
            Event::LobbyJoined { game, player, have, need } =>
                write!(f, "[lobby {game}] {player} joined ({have}/{need})"),
            Event::ReconnectRejected { reason } =>
                write!(f, "Reconnect rejected: {reason}"),
            Event::ScoresServed { addr } =>
                write!(f, "Scoreboard served to {addr}"),
            Event::AcceptError { reason } =>
                write!(f, "Accept error: {reason}"),
            Event::Reloading =>
                write!(f, "SIGINT: closing listeners and re-reading statfile"),
            Event::ReloadFailed { reason } =>
                write!(f, "Statfile reload failed, keeping previous entries: {reason}"),
            Event::ShuttingDown =>
                write!(f, "SIGTERM: finishing all games"),
        }
    }
}

pub enum GameEvent {
    Started { players: usize },
    Ended { outcome: &'static str },
    TurnMsg { seat: usize, raw: String },
    Strike { seat: usize },
    SeatLost { seat: usize },
    SeatResumed { seat: usize },
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameEvent::Started { players } =>
                write!(f, "Started with {players} players"),
            GameEvent::Ended { outcome } =>
                write!(f, "Ended: {outcome}"),
            GameEvent::TurnMsg { seat, raw } =>
                write!(f, "{} → {raw}", seat_letter(*seat)),
            GameEvent::Strike { seat } =>
                write!(f, "{} sent a bad message", seat_letter(*seat)),
            GameEvent::SeatLost { seat } =>
                write!(f, "{} disconnected, holding seat", seat_letter(*seat)),
            GameEvent::SeatResumed { seat } =>
                write!(f, "{} reconnected", seat_letter(*seat)),
        }
    }
}
