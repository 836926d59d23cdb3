//! Test harness for driving a connection from the raw peer side.
//!
//! A [`Peer`] holds the far end of an in-memory duplex stream and speaks
//! frames directly; a [`Recorder`] is a handler that logs every event.

#![allow(dead_code)]

mod counting;
mod peer;
mod recorder;

pub use counting::{CountingStream, WriteStats};
pub use peer::Peer;
pub use recorder::{Event, Recorder};

use std::sync::Arc;

use wsloop::{Config, Connection, Handler, Role};

/// Buffer size of the in-memory stream.
pub const DUPLEX_CAPACITY: usize = 64 * 1024;

/// Spawn a connection with `role` on one end of a duplex stream and return
/// the peer for the other end. The peer masks when `role` is a server.
pub fn spawn<H>(
    role: Role,
    config: Config,
    handler: H,
) -> (
    wsloop::WebSocket,
    Peer,
    tokio::task::JoinHandle<wsloop::Result<()>>,
)
where
    H: Handler + Send + 'static,
{
    let (io, far) = tokio::io::duplex(DUPLEX_CAPACITY);
    let conn = Connection::new(io, role, config, handler);
    let ws = conn.handle();
    let task = tokio::spawn(conn.run());
    let peer = match role {
        Role::Server => Peer::client(far),
        Role::Client => Peer::server(far),
    };
    (ws, peer, task)
}

/// Like [`spawn`], but over a duplex stream of `capacity` bytes whose
/// connection end records write activity.
pub fn spawn_counting<H>(
    role: Role,
    config: Config,
    handler: H,
    capacity: usize,
) -> (
    wsloop::WebSocket,
    Peer,
    tokio::task::JoinHandle<wsloop::Result<()>>,
    Arc<WriteStats>,
)
where
    H: Handler + Send + 'static,
{
    let (io, far) = tokio::io::duplex(capacity);
    let (io, stats) = CountingStream::new(io);
    let conn = Connection::new(io, role, config, handler);
    let ws = conn.handle();
    let task = tokio::spawn(conn.run());
    let peer = match role {
        Role::Server => Peer::client(far),
        Role::Client => Peer::server(far),
    };
    (ws, peer, task, stats)
}

/// Handles and tasks of a client and a server connection joined by a
/// duplex stream.
pub struct Pair {
    pub client: wsloop::WebSocket,
    pub server: wsloop::WebSocket,
    pub client_task: tokio::task::JoinHandle<wsloop::Result<()>>,
    pub server_task: tokio::task::JoinHandle<wsloop::Result<()>>,
}

/// Run a client connection against a server connection, both with `config`.
pub fn connect<C, S>(config: Config, client: C, server: S) -> Pair
where
    C: Handler + Send + 'static,
    S: Handler + Send + 'static,
{
    let (client_io, server_io) = tokio::io::duplex(DUPLEX_CAPACITY);
    let client = Connection::new(client_io, Role::Client, config.clone(), client);
    let server = Connection::new(server_io, Role::Server, config, server);
    Pair {
        client: client.handle(),
        server: server.handle(),
        client_task: tokio::spawn(client.run()),
        server_task: tokio::spawn(server.run()),
    }
}
