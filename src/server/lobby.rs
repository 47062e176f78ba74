//! Named-lobby matchmaking. The first joiner's port config sets the
//! lobby's target size and play parameters; filling the lobby turns it
//! into a game and starts the game task.

use std::sync::{Arc, Mutex};

use crate::config::PortConfig;
use crate::game::GameCore;

use super::conn::Conn;
use super::reconnect::Rendezvous;
use super::turn::run_game;
use super::{Event, GameHandle, Server};

struct Member {
    name: String,
    conn: Conn,
}

/// An open registration slot for one game name. At most one open lobby
/// per name exists at any time.
pub struct Lobby {
    pub config: PortConfig,
    members: Vec<Member>,
}

/// Join (or create) the open lobby for `game_name`. The whole
/// lookup-or-create / join / fill-triggered start runs under the registry
/// lock, so a lobby cannot fill twice.
pub fn join(
    server: &Arc<Server>,
    game_name: String,
    player_name: String,
    conn: Conn,
    port_config: PortConfig,
) {
    let mut registry = server.registry.lock().unwrap();

    let lobby = registry
        .lobbies
        .entry(game_name.clone())
        .or_insert_with(|| Lobby { config: port_config, members: Vec::new() });
    lobby.members.push(Member { name: player_name.clone(), conn });
    let have = lobby.members.len();
    let need = lobby.config.players;
    server.log.verbose(Event::LobbyJoined {
        game: game_name.clone(),
        player: player_name,
        have,
        need,
    });
    if have < need {
        return;
    }

    // Full: the lobby becomes a game. Seating is alphabetical by name;
    // the stable sort keeps join order for duplicates.
    let Some(lobby) = registry.lobbies.remove(&game_name) else {
        return;
    };
    let mut members = lobby.members;
    members.sort_by(|a, b| a.name.cmp(&b.name));

    let counter = registry.games.iter().filter(|g| g.name == game_name).count() as u32 + 1;
    let (names, conns): (Vec<_>, Vec<_>) =
        members.into_iter().map(|m| (m.name, m.conn)).unzip();
    let core = GameCore::new(&server.deck, names, lobby.config.game_config());

    let handle = Arc::new(GameHandle {
        name: game_name,
        counter,
        core: Mutex::new(core),
        rendezvous: Rendezvous::new(),
    });
    registry.games.push(Arc::clone(&handle));

    let task = tokio::spawn(run_game(
        Arc::clone(server),
        handle,
        conns,
        server.shutdown.subscribe(),
    ));
    registry.tasks.push(task);
}
