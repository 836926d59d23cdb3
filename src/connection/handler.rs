//! Application callbacks.

use crate::connection::WebSocket;
use crate::error::Error;
use crate::message::{Control, Message};

/// Receives connection events.
///
/// Callbacks run on the connection's task and must not block. To write,
/// use the [`WebSocket`] handle passed in; writes are queued and performed
/// after the callback returns.
///
/// For every connection `on_error` is called at most once and `on_close`
/// exactly once, last, provided [`Connection::run`](crate::Connection::run)
/// is driven to completion.
pub trait Handler {
    /// The connection is ready.
    fn on_connect(&mut self, ws: &WebSocket) {
        let _ = ws;
    }

    /// A complete text or binary message arrived.
    fn on_message(&mut self, ws: &WebSocket, message: Message);

    /// A ping, pong or close frame arrived. Pings are answered automatically.
    fn on_control(&mut self, ws: &WebSocket, control: &Control) {
        let _ = (ws, control);
    }

    /// The connection failed: protocol violation, I/O error or close timeout.
    fn on_error(&mut self, ws: &WebSocket, error: &Error) {
        let _ = (ws, error);
    }

    /// The connection is gone and its stream released.
    fn on_close(&mut self) {}
}
