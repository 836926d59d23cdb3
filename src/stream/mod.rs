//! Buffered byte stream adapters the connection runs on.
//!
//! A stream is split into a [`StreamReader`], which keeps unconsumed bytes
//! in a `BytesMut` so reads can be cancelled and resumed, and a
//! [`StreamWriter`], which the connection moves into its in-flight write.

mod buffered;

pub use buffered::{ByteStream, StreamReader, StreamWriter, split};
