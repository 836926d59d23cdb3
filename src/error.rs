//! Error types for the WebSocket protocol engine.
//!
//! Every error belongs to one of the classes the engine reacts to
//! differently (see [`ErrorKind`]): protocol violations close the
//! connection with a status code, I/O failures abort it, and an expired
//! close timer forces a hard teardown.

use thiserror::Error;

use crate::message::CloseCode;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The peer violated RFC 6455; the engine closes with a status code.
    Protocol,
    /// The underlying byte stream failed or ended unexpectedly.
    Io,
    /// The close handshake did not complete before the close timer fired.
    Timeout,
    /// The operation was refused or dropped because the connection is closing.
    Closed,
}

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Invalid UTF-8 in a text message or close reason.
    #[error("Invalid UTF-8 in text payload")]
    InvalidUtf8,

    /// Frame size exceeds configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Declared frame size.
        size: u64,
        /// Maximum allowed size.
        max: usize,
    },

    /// Message size exceeds configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Accumulated message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Too many fragments in a single message.
    #[error("Too many fragments: {count} (max: {max})")]
    TooManyFragments {
        /// Actual fragment count.
        count: usize,
        /// Maximum allowed fragments.
        max: usize,
    },

    /// Payload length with the most significant bit set.
    #[error("Payload length {0:#x} exceeds 63 bits")]
    PayloadLengthOverflow(u64),

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Control frame fragmented (RFC violation).
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(u64),

    /// Unmasked client frame (security violation).
    #[error("Client frame must be masked")]
    UnmaskedClientFrame,

    /// Masked server frame (security violation).
    #[error("Server frame must not be masked")]
    MaskedServerFrame,

    /// Reserved bits set without extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Close frame payload of exactly one byte.
    #[error("Close frame payload must be empty or at least 2 bytes")]
    InvalidClosePayload,

    /// Close code that must not appear in a close frame.
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// The peer closed the byte stream without a close handshake.
    #[error("Connection reset by peer")]
    UnexpectedEof,

    /// The close handshake did not complete in time.
    #[error("Close handshake timed out")]
    CloseTimeout,

    /// A queued write was dropped before it reached the stream.
    #[error("Write aborted before transmission")]
    WriteAborted,

    /// Connection has been closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A chunk was written after the last chunk of a streamed message.
    #[error("Streamed message already finished")]
    MessageFinished,
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) | Error::UnexpectedEof => ErrorKind::Io,
            Error::CloseTimeout => ErrorKind::Timeout,
            Error::WriteAborted | Error::ConnectionClosed | Error::MessageFinished => {
                ErrorKind::Closed
            }
            _ => ErrorKind::Protocol,
        }
    }

    /// Status code sent to the peer when this error fails the connection.
    #[must_use]
    pub const fn close_code(&self) -> CloseCode {
        match self {
            Error::InvalidUtf8 => CloseCode::InvalidPayload,
            Error::FrameTooLarge { .. }
            | Error::MessageTooLarge { .. }
            | Error::TooManyFragments { .. } => CloseCode::MessageTooBig,
            Error::Io(_) | Error::UnexpectedEof | Error::CloseTimeout => CloseCode::Abnormal,
            Error::WriteAborted | Error::ConnectionClosed | Error::MessageFinished => {
                CloseCode::Normal
            }
            _ => CloseCode::ProtocolError,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEof
        } else {
            Error::Io(err.to_string())
        }
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}
