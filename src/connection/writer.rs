//! Streamed outgoing messages.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::connection::handle::Command;
use crate::connection::queue::WriteCompletion;
use crate::error::{Error, Result};
use crate::protocol::{OpCode, Utf8State, Utf8Validator};

/// Writes one message as a sequence of chunks.
///
/// Created by [`WebSocket::stream_text`](crate::WebSocket::stream_text) or
/// [`WebSocket::stream_binary`](crate::WebSocket::stream_binary). Each chunk
/// becomes one or more frames (chunks larger than `Config::fragment_size`
/// are split further); the chunk written with `last` set carries FIN.
///
/// Text chunks may split a code point, but the bytes written so far must
/// stay valid UTF-8 and the message must end on a complete code point.
///
/// Dropping an unfinished writer ends the message with an empty final
/// frame so that other messages can follow.
#[derive(Debug)]
pub struct MessageWriter {
    commands: mpsc::UnboundedSender<Command>,
    stream: u64,
    opcode: OpCode,
    started: bool,
    finished: bool,
    utf8: Option<Utf8Validator>,
}

impl MessageWriter {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<Command>,
        stream: u64,
        opcode: OpCode,
    ) -> Self {
        Self {
            commands,
            stream,
            opcode,
            started: false,
            finished: false,
            utf8: (opcode == OpCode::Text).then(Utf8Validator::new),
        }
    }

    /// Text or binary.
    #[must_use]
    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    /// Whether the last chunk has been written.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Queue the next chunk; `last` ends the message. The completion
    /// resolves once the chunk's frames are on the wire.
    ///
    /// # Errors
    ///
    /// - `Error::MessageFinished` after the last chunk
    /// - `Error::InvalidUtf8` if a text chunk breaks UTF-8, or the last one
    ///   ends inside a code point. Nothing is queued and the writer stays
    ///   usable.
    /// - `Error::ConnectionClosed` if the connection task has finished
    pub fn write_chunk(
        &mut self,
        chunk: impl Into<Bytes>,
        last: bool,
    ) -> Result<WriteCompletion> {
        if self.finished {
            return Err(Error::MessageFinished);
        }
        let payload = chunk.into();

        if let Some(utf8) = &mut self.utf8 {
            let mut next = utf8.clone();
            match next.feed(&payload) {
                Utf8State::Reject => return Err(Error::InvalidUtf8),
                Utf8State::Incomplete if last => return Err(Error::InvalidUtf8),
                _ => *utf8 = next,
            }
        }

        let opcode = if self.started {
            OpCode::Continuation
        } else {
            self.opcode
        };
        let (tx, completion) = WriteCompletion::channel();
        self.commands
            .send(Command::Chunk {
                stream: self.stream,
                opcode,
                payload,
                last,
                completion: Some(tx),
            })
            .map_err(|_| Error::ConnectionClosed)?;

        self.started = true;
        self.finished = last;
        Ok(completion)
    }

    /// Queue the last chunk.
    ///
    /// # Errors
    ///
    /// See [`write_chunk`](Self::write_chunk).
    pub fn finish(mut self, chunk: impl Into<Bytes>) -> Result<WriteCompletion> {
        self.write_chunk(chunk, true)
    }
}

impl Drop for MessageWriter {
    fn drop(&mut self) {
        if self.started && !self.finished {
            let _ = self.commands.send(Command::Chunk {
                stream: self.stream,
                opcode: OpCode::Continuation,
                payload: Bytes::new(),
                last: true,
                completion: None,
            });
        }
    }
}
