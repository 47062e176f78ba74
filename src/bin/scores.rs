use std::fmt;
use std::process;

use clap::{ArgAction, Parser, error::ErrorKind};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use austerity::logger::Logger;
use austerity::protocol::parse_num;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name    = "scores",
    version,
    about   = "Austerity — scoreboard client",
    long_about = "Connects to a running server and prints the lifetime\n\
                  scoreboard as CSV on stdout."
)]
struct Args {
    /// Server port to connect to
    port: String,

    /// Increase output verbosity (-v verbose, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

// ── EXIT PATHS ────────────────────────────────────────────────────────────────
//
//   0 normal, 1 wrong args, 3 connection failed, 4 invalid server.

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
        Err(_) => fatal(1, "Usage: scores port"),
    }
}

// ── ENTRY POINT ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let args = parse_args();
    let log = Logger::new(args.verbose);

    let Some(port) = parse_num(&args.port).filter(|&p| p <= u16::MAX as u32) else {
        fatal(1, "Usage: scores port");
    };

    let addr = format!("127.0.0.1:{port}");
    let stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(e) => fatal(3, format_args!("failed to connect to {addr}: {e}")),
    };
    log.verbose(format_args!("connected to {addr}"));

    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    if writer.write_all(b"scores\n").await.is_err() {
        fatal(4, "server closed the connection");
    }

    // The legacy verification token: anything but `yes` is not a server
    // worth listening to.
    match lines.next_line().await {
        Ok(Some(reply)) if reply == "yes" => {}
        _ => fatal(4, "not an austerity server"),
    }

    while let Ok(Some(line)) = lines.next_line().await {
        println!("{line}");
    }
}
