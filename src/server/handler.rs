//! Per-connection handler: read the authentication line, classify the
//! client's intent, dispatch. A socket that survives the handshake is
//! handed onward and stays open; everything else is closed on return.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;

use crate::config::PortConfig;
use crate::protocol::{ClientMsg, ServerMsg, valid_name};

use super::conn::Conn;
use super::{Event, Server, lobby, reconnect, scores};

pub async fn handle_connection(
    server: Arc<Server>,
    stream: TcpStream,
    addr: SocketAddr,
    config: PortConfig,
) {
    let mut conn = Conn::from_stream(stream);
    let Some(line) = conn.recv().await else {
        return;
    };

    match ClientMsg::parse(&line) {
        Some(ClientMsg::Play(key)) if key == server.key => {
            let _ = conn.send(&ServerMsg::Yes).await;
            let Some(game_name) = conn.recv().await else {
                return;
            };
            let Some(player_name) = conn.recv().await else {
                return;
            };
            if !valid_name(&game_name) || !valid_name(&player_name) {
                return;
            }
            lobby::join(&server, game_name, player_name, conn, config);
        }
        Some(ClientMsg::Reconnect(key)) if key == server.key => {
            let _ = conn.send(&ServerMsg::Yes).await;
            reconnect::handle_reconnect(server, conn).await;
        }
        Some(ClientMsg::Scores) => {
            let _ = conn.send(&ServerMsg::Yes).await;
            for line in scores::render(&server).lines() {
                if !conn.send_line(line).await {
                    break;
                }
            }
            server.log.verbose(Event::ScoresServed { addr });
        }
        _ => {
            server.log.verbose(Event::AuthFailed { addr });
            let _ = conn.send(&ServerMsg::No).await;
        }
    }
}
