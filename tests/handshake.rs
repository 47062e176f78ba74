//! Socket-level runs: the real acceptor pool and connection handler over
//! loopback TCP, from the authentication line to `eog` and the CSV.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::watch;

use austerity::cards::Deck;
use austerity::config::PortConfig;
use austerity::server::Server;
use austerity::server::acceptor::{bind_all, ports_line, run_acceptor};

struct Client {
    lines: tokio::io::Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(port: u16) -> Self {
        let stream = TcpStream::connect(("127.0.0.1", port))
            .await
            .expect("test connect");
        let (reader, writer) = stream.into_split();
        Self { lines: BufReader::new(reader).lines(), writer }
    }

    async fn recv(&mut self) -> Option<String> {
        self.lines.next_line().await.ok().flatten()
    }

    async fn expect(&mut self, want: &str) {
        let got = self.recv().await;
        assert_eq!(got.as_deref(), Some(want));
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("test write");
    }
}

/// Boot a one-port server on an ephemeral port. The returned stop sender
/// keeps the acceptor running for as long as the test holds it.
async fn start_server(
    tokens: u32,
    points: u32,
    players: usize,
) -> (Arc<Server>, u16, watch::Sender<bool>) {
    let deck = Deck::parse(&"P:1:0,0,0,0\nB:0:0,0,0,0\n".repeat(5)).expect("test deck");
    let server = Server::new("secret".to_string(), deck, 0, 0);
    let entries = [PortConfig { port: 0, tokens, points, players }];
    let bound = bind_all(&entries).await.expect("test bind");
    let port = bound[0].config.port;
    let (stop_tx, stop_rx) = watch::channel(false);
    for b in bound {
        tokio::spawn(run_acceptor(
            Arc::clone(&server),
            b.listener,
            b.config,
            stop_rx.clone(),
        ));
    }
    (server, port, stop_tx)
}

#[tokio::test]
async fn ephemeral_ports_are_bound_and_reported_in_order() {
    let entries = [
        PortConfig { port: 0, tokens: 3, points: 1, players: 2 },
        PortConfig { port: 0, tokens: 7, points: 9, players: 4 },
    ];
    let bound = bind_all(&entries).await.expect("bind");
    let (p1, p2) = (bound[0].config.port, bound[1].config.port);
    assert_ne!(p1, 0);
    assert_ne!(p2, 0);
    assert_ne!(p1, p2);
    assert_eq!(ports_line(&bound), format!("{p1} {p2}"));
}

#[tokio::test]
async fn binding_an_occupied_port_fails() {
    let held = bind_all(&[PortConfig { port: 0, tokens: 1, points: 1, players: 2 }])
        .await
        .expect("bind");
    let taken = held[0].config.port;
    let result = bind_all(&[PortConfig { port: taken, tokens: 1, points: 1, players: 2 }]).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn wrong_key_gets_no_and_a_closed_socket() {
    let (_server, port, _stop) = start_server(3, 1, 2).await;
    let mut client = Client::connect(port).await;
    client.send("playwrong").await;
    client.expect("no").await;
    assert_eq!(client.recv().await, None);
}

#[tokio::test]
async fn garbage_handshake_gets_no() {
    let (_server, port, _stop) = start_server(3, 1, 2).await;
    let mut client = Client::connect(port).await;
    client.send("howdy").await;
    client.expect("no").await;
}

#[tokio::test]
async fn fresh_server_serves_an_empty_scoreboard() {
    let (_server, port, _stop) = start_server(3, 1, 2).await;
    let mut client = Client::connect(port).await;
    client.send("scores").await;
    client.expect("yes").await;
    client.expect("Player Name,Total Tokens,Total Points").await;
    assert_eq!(client.recv().await, None);
}

#[tokio::test]
async fn a_whole_game_runs_over_loopback() {
    let (_server, port, _stop) = start_server(3, 1, 2).await;

    let mut a = Client::connect(port).await;
    a.send("playsecret").await;
    a.expect("yes").await;
    a.send("g").await;
    a.send("A").await;

    let mut b = Client::connect(port).await;
    b.send("playsecret").await;
    b.expect("yes").await;
    b.send("g").await;
    b.send("B").await;

    for client in [&mut a, &mut b] {
        let rid = client.recv().await.expect("rid");
        assert!(rid.starts_with("ridg,1,"));
        let playinfo = client.recv().await.expect("playinfo");
        assert!(playinfo.starts_with("playinfo"));
        client.expect("tokens3").await;
        for _ in 0..8 {
            let card = client.recv().await.expect("newcard");
            assert!(card.starts_with("newcard"));
        }
    }

    // One free purchase reaches the threshold; B finishes the round.
    a.expect("dowhat").await;
    a.send("purchase0:0,0,0,0,0").await;
    a.expect("purchasedA:0:0,0,0,0,0").await;
    a.expect("newcardP:1:0,0,0,0").await;
    b.expect("purchasedA:0:0,0,0,0,0").await;
    b.expect("newcardP:1:0,0,0,0").await;
    b.expect("dowhat").await;
    b.send("wild").await;
    a.expect("wildB").await;
    b.expect("wildB").await;
    a.expect("eog").await;
    b.expect("eog").await;

    // The scoreboard reflects the finished game.
    let mut scores = Client::connect(port).await;
    scores.send("scores").await;
    scores.expect("yes").await;
    scores.expect("Player Name,Total Tokens,Total Points").await;
    scores.expect("A,0,1").await;
    scores.expect("B,1,0").await;
    assert_eq!(scores.recv().await, None);
}
