//! The acceptor pool: one listener per statfile entry, one accept loop
//! per listener, one handler task per accepted socket.

use std::fmt::Write as _;
use std::io;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::config::PortConfig;

use super::{Event, Server, handler};

/// A listener together with its entry, the ephemeral port 0 already
/// replaced by the port the kernel chose.
pub struct BoundPort {
    pub listener: TcpListener,
    pub config: PortConfig,
}

/// Bind every entry in file order. Failing any bind drops the listeners
/// bound so far before reporting.
pub async fn bind_all(entries: &[PortConfig]) -> io::Result<Vec<BoundPort>> {
    let mut bound = Vec::with_capacity(entries.len());
    for entry in entries {
        let listener = TcpListener::bind(("0.0.0.0", entry.port)).await?;
        let mut config = *entry;
        config.port = listener.local_addr()?.port();
        bound.push(BoundPort { listener, config });
    }
    Ok(bound)
}

/// The diagnostic bound-ports line: actual ports, space-separated, in
/// statfile order.
pub fn ports_line(bound: &[BoundPort]) -> String {
    let mut line = String::new();
    for (i, b) in bound.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        let _ = write!(line, "{}", b.config.port);
    }
    line
}

/// Accept until told to stop; each accepted socket gets its own handler
/// task carrying this port's config. Dropping the listener on return
/// closes the listen socket.
pub async fn run_acceptor(
    server: Arc<Server>,
    listener: TcpListener,
    config: PortConfig,
    mut stop: watch::Receiver<bool>,
) {
    server.log.verbose(Event::Listening { port: config.port });
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    server.log.verbose(Event::ClientAccepted { addr, port: config.port });
                    tokio::spawn(handler::handle_connection(
                        Arc::clone(&server),
                        stream,
                        addr,
                        config,
                    ));
                }
                Err(e) => {
                    server.log.warn(Event::AcceptError { reason: e.to_string() });
                }
            },
            _ = stop.changed() => break,
        }
    }
}
