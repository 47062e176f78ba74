//! The per-game reconnect rendezvous.
//!
//! When the turn loop reads EOF from a seat it parks that seat here and
//! waits out the grace window. A `reconnect`-authenticated handler waits
//! for its claimed seat to become pending, sends the catchup snapshot on
//! its fresh socket, then hands the socket over and wakes the game task.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{Instant, timeout, timeout_at};

use crate::protocol::{ClientMsg, ServerMsg};

use super::conn::Conn;
use super::{Event, GameEvent, GameHandle, Server};

/// How often the waiting handler re-checks the pending seat in case a
/// notification slipped past between its check and its wait.
const RECHECK: Duration = Duration::from_millis(50);

#[derive(Default)]
struct RzState {
    /// The seat the game task is currently holding open, if any.
    pending: Option<usize>,
    /// The replacement connection, set by the handler, taken by the game
    /// task.
    handoff: Option<Conn>,
    finished: bool,
}

pub enum RejoinOutcome {
    Rejoined(Conn),
    TimedOut,
    Finished,
}

pub struct Rendezvous {
    state: Mutex<RzState>,
    /// Game task → handler: pending seat changed.
    pending_set: Notify,
    /// Handler → game task: handoff stored.
    rejoined: Notify,
}

impl Default for Rendezvous {
    fn default() -> Self {
        Self::new()
    }
}

impl Rendezvous {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RzState::default()),
            pending_set: Notify::new(),
            rejoined: Notify::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().unwrap().finished
    }

    /// Mark the game finished and wake every waiter, on both sides.
    /// Returns true for the first caller only, so a game terminates via
    /// exactly one code path.
    pub fn finish(&self) -> bool {
        let first = {
            let mut st = self.state.lock().unwrap();
            let first = !st.finished;
            st.finished = true;
            first
        };
        self.pending_set.notify_waiters();
        self.rejoined.notify_waiters();
        first
    }

    /// Game-task side: surrender `seat` and wait for a replacement socket
    /// until the grace window closes.
    pub async fn await_rejoin(&self, seat: usize, grace_secs: u64) -> RejoinOutcome {
        if grace_secs == 0 {
            return RejoinOutcome::TimedOut;
        }
        {
            let mut st = self.state.lock().unwrap();
            if st.finished {
                return RejoinOutcome::Finished;
            }
            st.pending = Some(seat);
            st.handoff = None;
        }
        self.pending_set.notify_waiters();

        let deadline = Instant::now() + Duration::from_secs(grace_secs);
        loop {
            let notified = self.rejoined.notified();
            {
                let mut st = self.state.lock().unwrap();
                if let Some(conn) = st.handoff.take() {
                    st.pending = None;
                    return RejoinOutcome::Rejoined(conn);
                }
                if st.finished {
                    st.pending = None;
                    return RejoinOutcome::Finished;
                }
            }
            if timeout_at(deadline, notified).await.is_err() {
                let mut st = self.state.lock().unwrap();
                st.pending = None;
                // A handoff that raced the deadline still wins the seat.
                if let Some(conn) = st.handoff.take() {
                    return RejoinOutcome::Rejoined(conn);
                }
                return if st.finished {
                    RejoinOutcome::Finished
                } else {
                    RejoinOutcome::TimedOut
                };
            }
        }
    }

    /// Handler side: block until `seat` is the pending seat. False means
    /// the game finished first.
    async fn wait_for_pending(&self, seat: usize) -> bool {
        loop {
            let notified = self.pending_set.notified();
            {
                let st = self.state.lock().unwrap();
                if st.pending == Some(seat) {
                    return true;
                }
                if st.finished {
                    return false;
                }
            }
            let _ = timeout(RECHECK, notified).await;
        }
    }

    /// Handler side: install the replacement connection and wake the game
    /// task.
    fn complete(&self, conn: Conn) {
        self.state.lock().unwrap().handoff = Some(conn);
        self.rejoined.notify_waiters();
    }
}

//
// INCOMING SIDE
//

/// Serve one `reconnect`-authenticated client: read its claimed slot,
/// rendezvous with the owning game task, catch the client up, hand over
/// the socket.
pub async fn handle_reconnect(server: Arc<Server>, mut conn: Conn) {
    let Some(line) = conn.recv().await else {
        return;
    };
    let Some(ClientMsg::Rid(rid)) = ClientMsg::parse(&line) else {
        server.log.verbose(Event::ReconnectRejected { reason: "bad rid syntax" });
        let _ = conn.send(&ServerMsg::No).await;
        return;
    };

    let handle = {
        let registry = server.registry.lock().unwrap();
        registry
            .games
            .iter()
            .find(|g| g.name == rid.name && g.counter == rid.counter)
            .cloned()
    };
    let Some(handle) = handle else {
        server.log.verbose(Event::ReconnectRejected { reason: "unknown game" });
        let _ = conn.send(&ServerMsg::No).await;
        return;
    };

    let seats = handle.core.lock().unwrap().players().len();
    if rid.seat >= seats || handle.is_finished() {
        server.log.verbose(Event::ReconnectRejected { reason: "no such seat" });
        let _ = conn.send(&ServerMsg::No).await;
        return;
    }

    if !handle.rendezvous.wait_for_pending(rid.seat).await {
        server.log.verbose(Event::ReconnectRejected { reason: "game finished" });
        let _ = conn.send(&ServerMsg::No).await;
        return;
    }

    // The game task is parked on the rendezvous, so the state we snapshot
    // here is exactly what the resumed turn will see.
    let catchup = {
        let core = handle.core.lock().unwrap();
        let mut msgs = vec![
            ServerMsg::Yes,
            ServerMsg::PlayInfo { seat: rid.seat, count: seats },
            ServerMsg::Tokens(core.config().tokens),
        ];
        for card in core.board() {
            msgs.push(ServerMsg::NewCard(*card));
        }
        for (seat, player) in core.players().iter().enumerate() {
            msgs.push(ServerMsg::PlayerInfo {
                seat,
                score: player.score,
                discounts: player.discounts,
                wallet: player.wallet,
            });
        }
        msgs
    };
    for msg in &catchup {
        let _ = conn.send(msg).await;
    }

    server.log
        .game(&handle.name, handle.counter)
        .verbose(GameEvent::SeatResumed { seat: rid.seat });
    handle.rendezvous.complete(conn);
}
