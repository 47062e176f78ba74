//! The per-game task: prompt each seat in order, validate its action,
//! mutate the game state, broadcast the public announcement, and detect
//! every way a game can end.

use std::sync::Arc;

use tokio::sync::watch;

use crate::game::BOARD_SIZE;
use crate::logger::GameLog;
use crate::protocol::{ClientMsg, ReconnectId, ServerMsg};

use super::conn::Conn;
use super::reconnect::RejoinOutcome;
use super::{GameEvent, GameHandle, Server};

/// Bad messages allowed per turn before the game ends with `invalid`.
const STRIKES: u32 = 2;

enum GameEnd {
    Natural,
    Disco(usize),
    Invalid(usize),
    Shutdown,
}

enum TurnOutcome {
    Played,
    Disco,
    Invalid,
    Shutdown,
}

/// Run one game to completion. Owns the player connections for the whole
/// game; dropping them on return closes the sockets.
pub async fn run_game(
    server: Arc<Server>,
    handle: Arc<GameHandle>,
    mut conns: Vec<Conn>,
    mut shutdown: watch::Receiver<bool>,
) {
    let seats = conns.len();
    let glog = server.log.game(&handle.name, handle.counter);
    glog.verbose(GameEvent::Started { players: seats });

    // Identity and set-up for every seat, then the opening board.
    let tokens = handle.core.lock().unwrap().config().tokens;
    for (seat, conn) in conns.iter_mut().enumerate() {
        let rid = ReconnectId {
            name: handle.name.clone(),
            counter: handle.counter,
            seat,
        };
        let _ = conn.send(&ServerMsg::Rid(rid)).await;
        let _ = conn.send(&ServerMsg::PlayInfo { seat, count: seats }).await;
        let _ = conn.send(&ServerMsg::Tokens(tokens)).await;
    }
    for _ in 0..BOARD_SIZE {
        let card = handle.core.lock().unwrap().reveal();
        match card {
            Some(card) => broadcast(&mut conns, &ServerMsg::NewCard(card)).await,
            None => break,
        }
    }

    let end = if *shutdown.borrow() {
        GameEnd::Shutdown
    } else {
        play(&server, &handle, &mut conns, &mut shutdown, &glog).await
    };

    let (farewell, outcome) = match end {
        GameEnd::Natural => (ServerMsg::Eog, "eog"),
        GameEnd::Shutdown => (ServerMsg::Eog, "shutdown"),
        GameEnd::Disco(seat) => (ServerMsg::Disco { seat }, "disconnect"),
        GameEnd::Invalid(seat) => (ServerMsg::Invalid { seat }, "invalid"),
    };
    broadcast(&mut conns, &farewell).await;
    handle.finish();
    glog.verbose(GameEvent::Ended { outcome });
}

/// Iterate seats modulo the player count until something ends the game.
async fn play(
    server: &Arc<Server>,
    handle: &Arc<GameHandle>,
    conns: &mut Vec<Conn>,
    shutdown: &mut watch::Receiver<bool>,
    glog: &GameLog<'_>,
) -> GameEnd {
    let seats = conns.len();
    let mut seat = 0;
    let mut last_round = false;
    loop {
        match take_turn(server, handle, conns, shutdown, seat, glog).await {
            TurnOutcome::Played => {}
            TurnOutcome::Disco => return GameEnd::Disco(seat),
            TurnOutcome::Invalid => return GameEnd::Invalid(seat),
            TurnOutcome::Shutdown => return GameEnd::Shutdown,
        }

        {
            let core = handle.core.lock().unwrap();
            // A purchase that left the board empty ends the game at the
            // end of this seat's turn; reaching the win threshold only
            // ends it once the round completes.
            if core.board().is_empty() {
                return GameEnd::Natural;
            }
            if core.is_game_over() {
                last_round = true;
            }
        }
        if last_round && seat == seats - 1 {
            return GameEnd::Natural;
        }
        seat = (seat + 1) % seats;
    }
}

/// One seat's turn: prompt, read, validate, apply. A first bad message is
/// re-prompted; a second ends the game. EOF surrenders the seat to the
/// reconnect rendezvous.
async fn take_turn(
    server: &Arc<Server>,
    handle: &Arc<GameHandle>,
    conns: &mut Vec<Conn>,
    shutdown: &mut watch::Receiver<bool>,
    seat: usize,
    glog: &GameLog<'_>,
) -> TurnOutcome {
    let mut strikes = 0;
    loop {
        let _ = conns[seat].send(&ServerMsg::DoWhat).await;

        let line = tokio::select! {
            line = conns[seat].recv() => line,
            _ = shutdown.changed() => return TurnOutcome::Shutdown,
        };

        let Some(line) = line else {
            glog.verbose(GameEvent::SeatLost { seat });
            let rejoin = tokio::select! {
                outcome = handle.rendezvous.await_rejoin(seat, server.timeout) => outcome,
                _ = shutdown.changed() => return TurnOutcome::Shutdown,
            };
            match rejoin {
                RejoinOutcome::Rejoined(conn) => {
                    conns[seat] = conn;
                    strikes = 0;
                    continue;
                }
                RejoinOutcome::TimedOut => return TurnOutcome::Disco,
                RejoinOutcome::Finished => return TurnOutcome::Shutdown,
            }
        };

        glog.verbose(GameEvent::TurnMsg { seat, raw: line.clone() });

        if apply_action(handle, conns, seat, &line).await {
            return TurnOutcome::Played;
        }
        glog.verbose(GameEvent::Strike { seat });
        strikes += 1;
        if strikes >= STRIKES {
            return TurnOutcome::Invalid;
        }
    }
}

/// Validate and apply one action line. Returns false for anything that is
/// not a legal `purchase`/`take`/`wild` right now.
async fn apply_action(
    handle: &Arc<GameHandle>,
    conns: &mut Vec<Conn>,
    seat: usize,
    line: &str,
) -> bool {
    match ClientMsg::parse(line) {
        Some(ClientMsg::Take(take)) => {
            {
                let mut core = handle.core.lock().unwrap();
                if !core.can_take_tokens() || !core.is_valid_take(take) {
                    return false;
                }
                core.take_tokens(seat, take);
            }
            broadcast(conns, &ServerMsg::Took { seat, take }).await;
            true
        }
        Some(ClientMsg::Wild) => {
            handle.core.lock().unwrap().take_wild(seat);
            broadcast(conns, &ServerMsg::WildTaken { seat }).await;
            true
        }
        Some(ClientMsg::Purchase { index, pay }) => {
            let revealed = {
                let mut core = handle.core.lock().unwrap();
                if !core.is_valid_purchase(seat, index, pay) {
                    return false;
                }
                core.purchase(seat, index, pay);
                core.reveal()
            };
            broadcast(conns, &ServerMsg::Purchased { seat, index, pay }).await;
            if let Some(card) = revealed {
                broadcast(conns, &ServerMsg::NewCard(card)).await;
            }
            true
        }
        // Auth, rid and scores lines have no business inside a game.
        Some(_) | None => false,
    }
}

async fn broadcast(conns: &mut [Conn], msg: &ServerMsg) {
    for conn in conns.iter_mut() {
        let _ = conn.send(msg).await;
    }
}
