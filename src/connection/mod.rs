//! Connection driver, write queue and close handshake.
//!
//! A [`Connection`] owns one upgraded byte stream and runs on a single
//! task. Applications observe it through a [`Handler`] and write through
//! cloneable [`WebSocket`] handles.
//!
//! ## Connection Lifecycle
//!
//! 1. **Open** - Data flows both ways
//! 2. **ClosingSent / ClosingReceived** - A close frame went out or came in;
//!    the close timer is armed
//! 3. **Closed** - Handshake complete, timed out, or the stream failed
//!
//! ## Example
//!
//! ```rust,ignore
//! use wsloop::{Config, Connection, Role};
//!
//! let stream = tokio::net::TcpStream::connect("example.com:80").await?;
//! // ... HTTP upgrade ...
//! let conn = Connection::new(stream, Role::Client, Config::default(), handler);
//! let ws = conn.handle();
//! tokio::spawn(conn.run());
//!
//! ws.send_text("Hello")?.await?;
//! ws.close(CloseCode::Normal, "done")?;
//! ```

mod fragmenter;
mod role;
mod state;

pub use fragmenter::MessageFragmenter;
pub use role::Role;
pub use state::ConnectionState;

#[cfg(feature = "async-tokio")]
#[allow(clippy::module_inception)]
mod connection;
#[cfg(feature = "async-tokio")]
mod handle;
#[cfg(feature = "async-tokio")]
mod handler;
#[cfg(feature = "async-tokio")]
mod queue;
#[cfg(feature = "async-tokio")]
mod writer;

#[cfg(feature = "async-tokio")]
pub use connection::Connection;
#[cfg(feature = "async-tokio")]
pub use handle::WebSocket;
#[cfg(feature = "async-tokio")]
pub use handler::Handler;
#[cfg(feature = "async-tokio")]
pub use queue::{JobKind, WriteCompletion, WriteJob, WriteQueue};
#[cfg(feature = "async-tokio")]
pub use writer::MessageWriter;
