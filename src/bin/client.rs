use std::fmt;
use std::fs;
use std::io::{self, Write as _};
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, error::ErrorKind};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;

use austerity::cards::{COLOURS, Card, REAL_COLOURS, WILD};
use austerity::config::parse_keyfile;
use austerity::game::{TAKE_SIZE, minimal_payment};
use austerity::logger::Logger;
use austerity::protocol::{
    ClientMsg, ReconnectId, ServerMsg, parse_num, seat_letter, valid_name,
};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name    = "client",
    version,
    about   = "Austerity — terminal player client",
    long_about = "Joins a named game on a running server and plays interactively.\n\
                  Commands (type when it is your turn):\n  \
                    purchase <card#>\n  \
                    take <P> <B> <Y> <R>\n  \
                    wild"
)]
struct Args {
    /// File holding the shared authentication key
    keyfile: PathBuf,

    /// Server port to connect to
    port: String,

    /// Game name to join, or the literal word "reconnect"
    game: String,

    /// Player name (or, when reconnecting, the reconnect id)
    name: String,

    /// Increase output verbosity (-v verbose, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

// ── CLIENT EVENTS (operational logging to stderr) ─────────────────────────────

enum ClientEvent<'a> {
    Connecting { addr: &'a str },
    Connected { addr: &'a str },
    Sending { line: &'a str },
    Received { raw: &'a str },
}

impl fmt::Display for ClientEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientEvent::Connecting { addr } => write!(f, "Connecting to {addr}…"),
            ClientEvent::Connected { addr }  => write!(f, "Connected to {addr}"),
            ClientEvent::Sending { line }    => write!(f, "→ {line}"),
            ClientEvent::Received { raw }    => write!(f, "← {raw}"),
        }
    }
}

// ── GAME MIRROR ───────────────────────────────────────────────────────────────
//
// The client replays every broadcast onto its own copy of the game so it
// can render the board, price purchases, and name the winners at the end.

#[derive(Default, Clone)]
struct PlayerView {
    score: u32,
    discounts: [u32; REAL_COLOURS],
    wallet: [u32; COLOURS],
}

struct Mirror {
    seat: usize,
    board: Vec<Card>,
    initial_tokens: u32,
    piles: [u32; REAL_COLOURS],
    players: Vec<PlayerView>,
}

impl Mirror {
    fn new() -> Self {
        Self {
            seat: 0,
            board: Vec::new(),
            initial_tokens: 0,
            piles: [0; REAL_COLOURS],
            players: Vec::new(),
        }
    }

    fn start(&mut self, seat: usize, count: usize) {
        self.seat = seat;
        self.board.clear();
        self.players = vec![PlayerView::default(); count];
    }

    fn me(&self) -> &PlayerView {
        &self.players[self.seat]
    }

    /// Fold one state-bearing broadcast into the mirror. False means the
    /// message referenced state we do not have: the mirror is out of
    /// sync and the connection cannot be trusted.
    fn apply(&mut self, msg: &ServerMsg) -> bool {
        match msg {
            ServerMsg::Tokens(n) => {
                // `tokens` carries the configured pile size, not the
                // current one; after a reconnect the `player` snapshots
                // that follow bring the piles back in line.
                self.initial_tokens = *n;
                self.piles = [*n; REAL_COLOURS];
            }
            ServerMsg::NewCard(card) => {
                self.board.push(*card);
            }
            ServerMsg::Took { seat, take } => {
                let Some(player) = self.players.get_mut(*seat) else {
                    return false;
                };
                for k in 0..REAL_COLOURS {
                    player.wallet[k] += take[k];
                    if self.piles[k] < take[k] {
                        return false;
                    }
                    self.piles[k] -= take[k];
                }
            }
            ServerMsg::WildTaken { seat } => {
                let Some(player) = self.players.get_mut(*seat) else {
                    return false;
                };
                player.wallet[WILD] += 1;
            }
            ServerMsg::Purchased { seat, index, pay } => {
                if *index >= self.board.len() || *seat >= self.players.len() {
                    return false;
                }
                let card = self.board.remove(*index);
                let player = &mut self.players[*seat];
                for k in 0..COLOURS {
                    if player.wallet[k] < pay[k] {
                        return false;
                    }
                    player.wallet[k] -= pay[k];
                }
                for k in 0..REAL_COLOURS {
                    self.piles[k] += pay[k];
                }
                player.score += card.value;
                player.discounts[card.discount.index()] += 1;
            }
            ServerMsg::PlayerInfo { seat, score, discounts, wallet } => {
                let Some(player) = self.players.get_mut(*seat) else {
                    return false;
                };
                player.score = *score;
                player.discounts = *discounts;
                player.wallet = *wallet;
                if !self.reconcile_piles() {
                    return false;
                }
            }
            _ => {}
        }
        true
    }

    /// Catchup snapshots replace wallets wholesale, so the piles follow
    /// from conservation: what was minted minus what players now hold.
    /// False means the wallets claim more real tokens than ever existed.
    fn reconcile_piles(&mut self) -> bool {
        for k in 0..REAL_COLOURS {
            let held: u32 = self.players.iter().map(|p| p.wallet[k]).sum();
            match self.initial_tokens.checked_sub(held) {
                Some(left) => self.piles[k] = left,
                None => return false,
            }
        }
        true
    }

    /// Letters of every player holding the top score, comma-separated.
    fn winners(&self) -> String {
        let best = self.players.iter().map(|p| p.score).max().unwrap_or(0);
        let letters: Vec<String> = self
            .players
            .iter()
            .enumerate()
            .filter(|(_, p)| p.score == best)
            .map(|(seat, _)| seat_letter(seat).to_string())
            .collect();
        letters.join(",")
    }
}

/// The per-turn board summary written to the diagnostic stream.
impl fmt::Display for Mirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Piles  P={} B={} Y={} R={}",
            self.piles[0], self.piles[1], self.piles[2], self.piles[3]
        )?;
        if self.board.is_empty() {
            writeln!(f, "  (board is empty)")?;
        }
        for (i, card) in self.board.iter().enumerate() {
            writeln!(f, "  #{i}  {card}")?;
        }
        for (seat, player) in self.players.iter().enumerate() {
            let marker = if seat == self.seat { '*' } else { ' ' };
            writeln!(
                f,
                " {marker}{}  score={}  d={},{},{},{}  t={},{},{},{},{}",
                seat_letter(seat),
                player.score,
                player.discounts[0], player.discounts[1],
                player.discounts[2], player.discounts[3],
                player.wallet[0], player.wallet[1], player.wallet[2],
                player.wallet[3], player.wallet[4],
            )?;
        }
        Ok(())
    }
}

// ── USER INPUT ────────────────────────────────────────────────────────────────

enum Cmd {
    Purchase { index: usize },
    Take([u32; REAL_COLOURS]),
    Wild,
}

impl Cmd {
    /// Parse a line typed by the player (case-insensitive keyword).
    fn parse(raw: &str) -> Result<Self, String> {
        let mut t = raw.split_whitespace();
        match t.next().unwrap_or("").to_ascii_lowercase().as_str() {
            "purchase" | "buy" => {
                let index = t
                    .next()
                    .ok_or("missing card number")?
                    .parse::<usize>()
                    .map_err(|_| "card number must be a whole number".to_string())?;
                if t.next().is_some() {
                    return Err("too many arguments".into());
                }
                Ok(Self::Purchase { index })
            }
            "take" => {
                let mut take = [0u32; REAL_COLOURS];
                for slot in take.iter_mut() {
                    *slot = t
                        .next()
                        .ok_or("take needs four counts: <P> <B> <Y> <R>")?
                        .parse()
                        .map_err(|_| "counts must be 0 or 1".to_string())?;
                }
                if t.next().is_some() {
                    return Err("too many arguments".into());
                }
                Ok(Self::Take(take))
            }
            "wild" => Ok(Self::Wild),
            "" => Err("empty input".into()),
            kw => Err(format!("unknown command '{kw}'")),
        }
    }

    /// Check the command against the mirror and price it into a wire
    /// message. The server is still the referee; this only catches moves
    /// that would burn a strike for nothing.
    fn to_wire(&self, mirror: &Mirror) -> Result<ClientMsg, String> {
        match self {
            Cmd::Purchase { index } => {
                let card = mirror
                    .board
                    .get(*index)
                    .ok_or_else(|| format!("no card #{index} on the board"))?;
                let me = mirror.me();
                let pay = minimal_payment(&me.wallet, &me.discounts, card);
                if pay[WILD] > me.wallet[WILD] {
                    return Err("you cannot afford that card".into());
                }
                Ok(ClientMsg::Purchase { index: *index, pay })
            }
            Cmd::Take(take) => {
                if take.iter().any(|&n| n > 1)
                    || take.iter().sum::<u32>() != TAKE_SIZE
                {
                    return Err("take exactly three different colours".into());
                }
                for k in 0..REAL_COLOURS {
                    if take[k] == 1 && mirror.piles[k] == 0 {
                        return Err("one of those piles is empty".into());
                    }
                }
                Ok(ClientMsg::Take(*take))
            }
            Cmd::Wild => Ok(ClientMsg::Wild),
        }
    }
}

// ── PROMPT ────────────────────────────────────────────────────────────────────

fn print_prompt(seat: usize) {
    print!("{}> ", seat_letter(seat));
    io::stdout().flush().ok();
}

fn print_help() {
    println!("  Commands:");
    println!("    purchase <card#>      — buy a board card (payment is computed)");
    println!("    take <P> <B> <Y> <R>  — take three single tokens (e.g. take 1 1 1 0)");
    println!("    wild                  — take one wild token");
    println!("    board                 — reprint the board");
}

// ── EXIT PATHS ────────────────────────────────────────────────────────────────
//
//   0 normal end of game, 1 wrong args, 2 bad keyfile, 3 bad name,
//   5 connection failed, 6 bad auth, 7 bad reconnect id,
//   8 communication error, 9 ended by disconnect, 10 ended by misbehaviour.

fn fatal(code: i32, msg: impl fmt::Display) -> ! {
    eprintln!("{msg}");
    process::exit(code);
}

fn parse_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            process::exit(0);
        }
        Err(_) => fatal(1, "Usage: client keyfile port game name"),
    }
}

async fn send_line(writer: &mut OwnedWriteHalf, log: &Logger, line: &str) {
    log.verbose(ClientEvent::Sending { line });
    let framed = format!("{line}\n");
    if writer.write_all(framed.as_bytes()).await.is_err() {
        fatal(8, "failed to write to server");
    }
}

// ── ENTRY POINT ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let args = parse_args();
    let log = Logger::new(args.verbose);

    let key = match fs::read_to_string(&args.keyfile) {
        Ok(contents) => match parse_keyfile(&contents) {
            Ok(key) => key,
            Err(e) => fatal(2, e),
        },
        Err(e) => fatal(2, format_args!("cannot read keyfile: {e}")),
    };

    let Some(port) = parse_num(&args.port).filter(|&p| p <= u16::MAX as u32) else {
        fatal(1, "Usage: client keyfile port game name");
    };

    let reconnecting = args.game == "reconnect";
    let rid: Option<ReconnectId> = if reconnecting {
        match args.name.parse() {
            Ok(rid) => Some(rid),
            Err(()) => fatal(7, "malformed reconnect id"),
        }
    } else {
        if !valid_name(&args.game) || !valid_name(&args.name) {
            fatal(3, "names must be non-empty, without commas or newlines");
        }
        None
    };

    let addr = format!("127.0.0.1:{port}");
    log.info(ClientEvent::Connecting { addr: &addr });
    let stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(e) => fatal(5, format_args!("failed to connect to {addr}: {e}")),
    };
    log.info(ClientEvent::Connected { addr: &addr });

    let (reader, mut writer) = stream.into_split();
    let mut server_lines = BufReader::new(reader).lines();

    // ── Handshake ─────────────────────────────────────────────────────────
    let auth = if reconnecting {
        ClientMsg::Reconnect(key)
    } else {
        ClientMsg::Play(key)
    };
    send_line(&mut writer, &log, &auth.to_string()).await;
    match server_lines.next_line().await {
        Ok(Some(reply)) if reply == "yes" => {}
        Ok(Some(_)) => fatal(6, "server rejected the key"),
        _ => fatal(8, "server closed during authentication"),
    }

    if let Some(rid) = rid {
        send_line(&mut writer, &log, &ClientMsg::Rid(rid).to_string()).await;
        match server_lines.next_line().await {
            Ok(Some(reply)) if reply == "yes" => {}
            Ok(Some(reply)) if reply == "no" => fatal(7, "server rejected the reconnect id"),
            _ => fatal(8, "server closed during reconnection"),
        }
    } else {
        send_line(&mut writer, &log, &args.game).await;
        send_line(&mut writer, &log, &args.name).await;
        println!("Waiting for the lobby to fill…");
    }

    // ── Play ──────────────────────────────────────────────────────────────
    let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();
    let mut mirror = Mirror::new();
    let mut my_turn = false;

    loop {
        tokio::select! {
            result = server_lines.next_line() => {
                let raw = match result {
                    Ok(Some(line)) => line,
                    _ => fatal(8, "server connection lost"),
                };
                log.trace(ClientEvent::Received { raw: &raw });
                let Some(msg) = ServerMsg::parse(&raw) else {
                    fatal(8, format_args!("unintelligible server message: {raw:?}"));
                };
                handle_server_msg(&msg, &mut mirror, &mut my_turn);
            }

            result = stdin_lines.next_line(), if my_turn => {
                let raw = match result {
                    Ok(Some(line)) => line,
                    _ => fatal(8, "input closed"),
                };
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    print_prompt(mirror.seat);
                    continue;
                }
                match trimmed.to_ascii_lowercase().as_str() {
                    "help" | "?" => {
                        print_help();
                        print_prompt(mirror.seat);
                        continue;
                    }
                    "board" => {
                        eprint!("{mirror}");
                        print_prompt(mirror.seat);
                        continue;
                    }
                    _ => {}
                }
                match Cmd::parse(trimmed).and_then(|cmd| cmd.to_wire(&mirror)) {
                    Ok(wire) => {
                        send_line(&mut writer, &log, &wire.to_string()).await;
                        my_turn = false;
                    }
                    Err(reason) => {
                        println!("  ? {reason}");
                        print_prompt(mirror.seat);
                    }
                }
            }
        }
    }
}

fn handle_server_msg(msg: &ServerMsg, mirror: &mut Mirror, my_turn: &mut bool) {
    match msg {
        ServerMsg::Rid(rid) => {
            // Keep this visible: it is the ticket back in after a drop.
            eprintln!("reconnect id: {rid}");
        }
        ServerMsg::PlayInfo { seat, count } => {
            mirror.start(*seat, *count);
            println!("Game on!  You are player {} of {count}.", seat_letter(*seat));
            print_help();
        }
        ServerMsg::DoWhat => {
            *my_turn = true;
            eprint!("{mirror}");
            print_prompt(mirror.seat);
        }
        ServerMsg::Eog => {
            println!("Game over. Winners are {}", mirror.winners());
            process::exit(0);
        }
        ServerMsg::Disco { seat } => {
            println!("Game over: player {} disconnected.", seat_letter(*seat));
            process::exit(9);
        }
        ServerMsg::Invalid { seat } => {
            println!("Game over: player {} misbehaved.", seat_letter(*seat));
            process::exit(10);
        }
        ServerMsg::Purchased { seat, index, .. } => {
            // Announce before apply so the card is still on the mirror.
            if let Some(card) = mirror.board.get(*index) {
                println!("Player {} bought #{index} ({card}).", seat_letter(*seat));
            }
            if !mirror.apply(msg) {
                fatal(8, "lost sync with server");
            }
        }
        ServerMsg::Took { seat, take } => {
            println!(
                "Player {} took {},{},{},{}.",
                seat_letter(*seat), take[0], take[1], take[2], take[3]
            );
            if !mirror.apply(msg) {
                fatal(8, "lost sync with server");
            }
        }
        ServerMsg::WildTaken { seat } => {
            println!("Player {} took a wild token.", seat_letter(*seat));
            if !mirror.apply(msg) {
                fatal(8, "lost sync with server");
            }
        }
        ServerMsg::Tokens(_) | ServerMsg::NewCard(_) | ServerMsg::PlayerInfo { .. } => {
            if !mirror.apply(msg) {
                fatal(8, "lost sync with server");
            }
        }
        ServerMsg::Yes | ServerMsg::No => {
            fatal(8, "unexpected handshake message mid-game");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(seat: usize, wallet: [u32; COLOURS]) -> ServerMsg {
        ServerMsg::PlayerInfo { seat, score: 0, discounts: [0; REAL_COLOURS], wallet }
    }

    #[test]
    fn reconnect_catchup_rebuilds_piles_from_wallets() {
        let mut mirror = Mirror::new();
        mirror.start(0, 2);
        assert!(mirror.apply(&ServerMsg::Tokens(3)));
        // Seat 0 holds a purple, a brown, a yellow and a wild; seat 1
        // holds a purple and a red.
        assert!(mirror.apply(&snapshot(0, [1, 1, 1, 0, 1])));
        assert!(mirror.apply(&snapshot(1, [1, 0, 0, 1, 0])));
        assert_eq!(mirror.piles, [1, 2, 2, 2]);
    }

    #[test]
    fn catchup_claiming_unminted_tokens_is_out_of_sync() {
        let mut mirror = Mirror::new();
        mirror.start(0, 2);
        assert!(mirror.apply(&ServerMsg::Tokens(3)));
        assert!(!mirror.apply(&snapshot(0, [4, 0, 0, 0, 0])));
    }

    #[test]
    fn live_broadcasts_still_move_piles_incrementally() {
        let mut mirror = Mirror::new();
        mirror.start(1, 2);
        assert!(mirror.apply(&ServerMsg::Tokens(2)));
        assert!(mirror.apply(&ServerMsg::Took { seat: 0, take: [1, 1, 1, 0] }));
        assert_eq!(mirror.piles, [1, 1, 1, 2]);
        assert_eq!(mirror.players[0].wallet, [1, 1, 1, 0, 0]);
    }
}
