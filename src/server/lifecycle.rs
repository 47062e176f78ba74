//! The top-level controller: bind, listen, and react to signals.
//!
//! SIGINT closes every listen socket and re-reads the statfile before
//! listening again; running games are untouched. SIGTERM ends every live
//! game with `eog` (via the shutdown channel every game task selects on)
//! and joins the game tasks. SIGPIPE is already ignored by the Rust
//! startup code, so a write to a dead peer fails locally instead of
//! killing the process.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;

use crate::config::{PortConfig, parse_statfile};

use super::acceptor::{bind_all, ports_line, run_acceptor};
use super::{Event, Server};

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to listen: {0}")]
    Listen(io::Error),
    #[error("system error: {0}")]
    System(io::Error),
}

/// Serve until SIGTERM. Each pass of the loop is one listen cycle; SIGINT
/// starts the next cycle, SIGTERM leaves the loop and shuts down.
pub async fn run(
    server: Arc<Server>,
    statfile: &Path,
    mut entries: Vec<PortConfig>,
) -> Result<(), ServeError> {
    let mut sigint =
        signal(SignalKind::interrupt()).map_err(ServeError::System)?;
    let mut sigterm =
        signal(SignalKind::terminate()).map_err(ServeError::System)?;

    loop {
        let bound = bind_all(&entries).await.map_err(ServeError::Listen)?;
        // The bound-ports line is part of the external interface, so it
        // bypasses the logger and its level prefix.
        eprintln!("{}", ports_line(&bound));

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut acceptors = Vec::with_capacity(bound.len());
        for b in bound {
            acceptors.push(tokio::spawn(run_acceptor(
                Arc::clone(&server),
                b.listener,
                b.config,
                stop_rx.clone(),
            )));
        }

        let reload = tokio::select! {
            _ = sigint.recv() => true,
            _ = sigterm.recv() => false,
        };
        let _ = stop_tx.send(true);
        for task in acceptors {
            let _ = task.await;
        }
        if !reload {
            break;
        }

        server.log.verbose(Event::Reloading);
        match fs::read_to_string(statfile) {
            Ok(contents) => match parse_statfile(&contents) {
                Ok(fresh) => entries = fresh,
                Err(e) => server.log.warn(Event::ReloadFailed { reason: e.to_string() }),
            },
            Err(e) => server.log.warn(Event::ReloadFailed { reason: e.to_string() }),
        }
    }

    shutdown(&server).await;
    Ok(())
}

/// Finalise every live game: flip the shutdown flag every game task
/// selects on, then join the game tasks. Each task broadcasts `eog`,
/// marks itself finished and wakes its reconnect rendezvous on the way
/// out.
async fn shutdown(server: &Arc<Server>) {
    server.log.verbose(Event::ShuttingDown);
    let _ = server.shutdown.send(true);
    let tasks: Vec<_> = {
        let mut registry = server.registry.lock().unwrap();
        registry.tasks.drain(..).collect()
    };
    for task in tasks {
        let _ = task.await;
    }
}
