use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{ArgAction, Parser, error::ErrorKind};

use austerity::cards::Deck;
use austerity::config::{parse_keyfile, parse_statfile};
use austerity::protocol::parse_num;
use austerity::server::Server;
use austerity::server::lifecycle::{self, ServeError};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name    = "server",
    version,
    about   = "Austerity — networked card-and-token game server",
    long_about = "Listens on every statfile port, matches authenticated clients\n\
                  into named lobbies and runs each full lobby as a game.\n\
                  SIGINT re-reads the statfile; SIGTERM shuts down cleanly."
)]
struct Args {
    /// File holding the shared authentication key
    keyfile: PathBuf,

    /// Deck file: one D:V:P,B,Y,R card per line
    deckfile: PathBuf,

    /// Statfile: one port,tokens,points,players entry per line
    statfile: PathBuf,

    /// Reconnect grace window in seconds; 0 disables reconnection
    timeout: String,

    /// Increase output verbosity (-v verbose, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

// ── EXIT PATHS ────────────────────────────────────────────────────────────────
//
// Every start-up failure has its own exit code:
//   1 wrong args, 2 bad keyfile, 3 bad deckfile, 4 bad statfile,
//   5 bad timeout, 6 failed to listen, 10 system error.

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
        Err(_) => fatal(1, "Usage: server keyfile deckfile statfile timeout"),
    }
}

// ── ENTRY POINT ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let args = parse_args();

    let key = match fs::read_to_string(&args.keyfile) {
        Ok(contents) => match parse_keyfile(&contents) {
            Ok(key) => key,
            Err(e) => fatal(2, e),
        },
        Err(e) => fatal(2, format_args!("cannot read keyfile: {e}")),
    };

    let deck = match fs::read_to_string(&args.deckfile) {
        Ok(contents) => match Deck::parse(&contents) {
            Ok(deck) => deck,
            Err(e) => fatal(3, e),
        },
        Err(e) => fatal(3, format_args!("cannot read deckfile: {e}")),
    };

    let entries = match fs::read_to_string(&args.statfile) {
        Ok(contents) => match parse_statfile(&contents) {
            Ok(entries) => entries,
            Err(e) => fatal(4, e),
        },
        Err(e) => fatal(4, format_args!("cannot read statfile: {e}")),
    };

    let Some(timeout) = parse_num(&args.timeout) else {
        fatal(5, "timeout must be a non-negative integer");
    };

    let server = Server::new(key, deck, timeout as u64, args.verbose);
    match lifecycle::run(Arc::clone(&server), &args.statfile, entries).await {
        Ok(()) => {}
        Err(e @ ServeError::Listen(_)) => fatal(6, e),
        Err(e @ ServeError::System(_)) => fatal(10, e),
    }
}
