use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::connection::queue::{CompletionTx, JobKind, WriteCompletion, resolve};
use crate::connection::{MessageWriter, Role};
use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame, Message};
use crate::protocol::frame::MAX_CONTROL_FRAME_PAYLOAD;
use crate::protocol::{Frame, OpCode};

/// Requests from [`WebSocket`] handles to the connection task.
#[derive(Debug)]
pub(crate) enum Command {
    Send {
        message: Message,
        completion: CompletionTx,
    },
    /// One chunk of a streamed message.
    Chunk {
        stream: u64,
        opcode: OpCode,
        payload: Bytes,
        last: bool,
        completion: Option<CompletionTx>,
    },
    /// Application ping or pong.
    Control {
        kind: JobKind,
        frame: Frame,
        completion: CompletionTx,
    },
    Close {
        frame: Frame,
        completion: CompletionTx,
    },
}

impl Command {
    /// Resolve the command's completion with `Error::ConnectionClosed`.
    pub(crate) fn refuse(self) {
        let completion = match self {
            Command::Send { completion, .. }
            | Command::Control { completion, .. }
            | Command::Close { completion, .. } => Some(completion),
            Command::Chunk { completion, .. } => completion,
        };
        resolve(completion, Err(Error::ConnectionClosed));
    }
}

/// Cloneable write handle to a running [`Connection`](crate::Connection).
///
/// Every write returns a [`WriteCompletion`] that resolves once the frame
/// (or the last frame of a fragmented message) is on the wire. Immediate
/// errors, such as an invalid close code or a connection that has already
/// finished, are returned directly.
#[derive(Debug, Clone)]
pub struct WebSocket {
    commands: mpsc::UnboundedSender<Command>,
    role: Role,
    streams: Arc<AtomicU64>,
}

impl WebSocket {
    pub(crate) fn new(commands: mpsc::UnboundedSender<Command>, role: Role) -> Self {
        Self {
            commands,
            role,
            streams: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Role of the connection this handle writes to.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Queue a text or binary message. Messages larger than
    /// `Config::fragment_size` are sent as several frames.
    ///
    /// # Errors
    ///
    /// `Error::ConnectionClosed` if the connection task has finished.
    pub fn send(&self, message: Message) -> Result<WriteCompletion> {
        self.submit(|completion| Command::Send {
            message,
            completion,
        })
    }

    /// Queue a text message.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub fn send_text(&self, text: impl Into<String>) -> Result<WriteCompletion> {
        self.send(Message::Text(text.into()))
    }

    /// Queue a binary message.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub fn send_binary(&self, data: impl Into<Vec<u8>>) -> Result<WriteCompletion> {
        self.send(Message::Binary(data.into()))
    }

    /// Queue a ping. It is written ahead of pending data frames.
    ///
    /// # Errors
    ///
    /// - `Error::ControlFrameTooLarge` if `payload` exceeds 125 bytes
    /// - `Error::ConnectionClosed` if the connection task has finished
    pub fn ping(&self, payload: impl Into<Bytes>) -> Result<WriteCompletion> {
        self.control(JobKind::Ping, payload.into())
    }

    /// Queue an unsolicited pong, e.g. as a one-way heartbeat. Like a ping
    /// it is written ahead of pending data frames.
    ///
    /// # Errors
    ///
    /// - `Error::ControlFrameTooLarge` if `payload` exceeds 125 bytes
    /// - `Error::ConnectionClosed` if the connection task has finished
    pub fn pong(&self, payload: impl Into<Bytes>) -> Result<WriteCompletion> {
        self.control(JobKind::Pong, payload.into())
    }

    /// Start a text message whose payload is supplied chunk by chunk.
    ///
    /// From the first chunk to the last the message owns the data queue:
    /// messages sent through other handles in the meantime are written
    /// after it. Pings and pongs may still land between its frames.
    pub fn stream_text(&self) -> MessageWriter {
        self.stream(OpCode::Text)
    }

    /// Start a binary message whose payload is supplied chunk by chunk.
    /// See [`stream_text`](Self::stream_text).
    pub fn stream_binary(&self) -> MessageWriter {
        self.stream(OpCode::Binary)
    }

    fn stream(&self, opcode: OpCode) -> MessageWriter {
        let id = self.streams.fetch_add(1, Ordering::Relaxed);
        MessageWriter::new(self.commands.clone(), id, opcode)
    }

    fn control(&self, kind: JobKind, payload: Bytes) -> Result<WriteCompletion> {
        if payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
            return Err(Error::ControlFrameTooLarge(payload.len() as u64));
        }
        let frame = match kind {
            JobKind::Ping => Frame::ping(payload),
            _ => Frame::pong(payload),
        };
        self.submit(|completion| Command::Control {
            kind,
            frame,
            completion,
        })
    }

    /// Start the close handshake. The close frame follows every message
    /// queued before it; afterwards no further writes are accepted.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidCloseCode` for a code that must not be sent
    /// - `Error::ControlFrameTooLarge` if `reason` exceeds 123 bytes
    /// - `Error::ConnectionClosed` if the connection task has finished
    pub fn close(&self, code: CloseCode, reason: impl Into<String>) -> Result<WriteCompletion> {
        let frame = Frame::close(Some(&CloseFrame::new(code, reason)))?;
        self.submit(|completion| Command::Close { frame, completion })
    }

    /// Start the close handshake with an empty close frame.
    ///
    /// # Errors
    ///
    /// `Error::ConnectionClosed` if the connection task has finished.
    pub fn close_without_status(&self) -> Result<WriteCompletion> {
        let frame = Frame::close(None)?;
        self.submit(|completion| Command::Close { frame, completion })
    }

    /// Whether the connection task has finished.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn submit(&self, command: impl FnOnce(CompletionTx) -> Command) -> Result<WriteCompletion> {
        let (tx, completion) = WriteCompletion::channel();
        self.commands
            .send(command(tx))
            .map_err(|_| Error::ConnectionClosed)?;
        Ok(completion)
    }
}
