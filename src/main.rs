fn main() {
    println!("Austerity - networked card and token game");
    println!();
    println!("Usage:");
    println!("  Start the server:      cargo run --bin server -- keyfile deckfile statfile timeout");
    println!("  Join a game:           cargo run --bin client -- keyfile port game name");
    println!("  Rejoin after a drop:   cargo run --bin client -- keyfile port reconnect <rid>");
    println!("  Print the scoreboard:  cargo run --bin scores -- port");
    println!();
    println!("The server prints its bound ports on stderr once it is listening.");
}
