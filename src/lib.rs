//! # wsloop - WebSocket protocol engine for a single-threaded event loop
//!
//! `wsloop` runs the RFC 6455 protocol over a byte stream that has already
//! completed the HTTP upgrade. One task per connection owns the stream; the
//! application sees events through a [`Handler`] and writes through
//! [`WebSocket`] handles.
//!
//! ## Features
//!
//! - **Incremental frame parsing** that validates each header before the
//!   payload is read
//! - **Streaming UTF-8 validation** across text fragments
//! - **Ordered write queue** where pongs overtake data but frames never
//!   interleave
//! - **Close handshake** with status codes and a timeout
//! - **Streamed messages** written chunk by chunk without interleaving
//! - **Resource limits** for frame size, message size and fragment count
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wsloop::{Config, Connection, Handler, Message, Role, WebSocket};
//!
//! struct Echo;
//!
//! impl Handler for Echo {
//!     fn on_message(&mut self, ws: &WebSocket, message: Message) {
//!         let _ = ws.send(message);
//!     }
//! }
//!
//! let conn = Connection::new(stream, Role::Server, Config::default(), Echo);
//! conn.run().await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod protocol;

#[cfg(feature = "async-tokio")]
pub mod stream;

pub use config::{Config, Limits};
pub use connection::{ConnectionState, Role};
#[cfg(feature = "async-tokio")]
pub use connection::{Connection, Handler, MessageWriter, WebSocket, WriteCompletion};
pub use error::{Error, ErrorKind, Result};
pub use message::{CloseCode, CloseFrame, Control, Message};
pub use protocol::OpCode;
