//! Splitting outgoing messages into frames (RFC 6455 Section 5.4).

use bytes::Bytes;

use crate::protocol::{Frame, OpCode};

/// Iterator that produces frames from a message payload.
///
/// The first frame carries the message opcode, the rest are continuations,
/// and only the last has FIN set. Payload slices share the message buffer.
///
/// A chunk of a streamed message is fragmented the same way, with
/// [`with_fin(false)`](Self::with_fin) unless it is the last chunk.
#[derive(Debug, Clone)]
pub struct MessageFragmenter {
    payload: Bytes,
    opcode: OpCode,
    fragment_size: usize,
    is_first: bool,
    fin: bool,
}

impl MessageFragmenter {
    /// Create a fragmenter. A `fragment_size` of zero is treated as one.
    #[inline]
    #[must_use]
    pub fn new(payload: Bytes, opcode: OpCode, fragment_size: usize) -> Self {
        Self {
            payload,
            opcode,
            fragment_size: fragment_size.max(1),
            is_first: true,
            fin: true,
        }
    }

    /// Whether the last frame produced ends the message.
    #[must_use]
    pub fn with_fin(mut self, fin: bool) -> Self {
        self.fin = fin;
        self
    }

    /// Number of frames the whole message needs.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.payload.len().div_ceil(self.fragment_size).max(1)
    }
}

impl Iterator for MessageFragmenter {
    type Item = Frame;

    fn next(&mut self) -> Option<Self::Item> {
        if self.payload.is_empty() && !self.is_first {
            return None;
        }

        let chunk = self
            .payload
            .split_to(self.payload.len().min(self.fragment_size));
        let opcode = if self.is_first {
            self.is_first = false;
            self.opcode
        } else {
            OpCode::Continuation
        };

        Some(Frame::new(self.fin && self.payload.is_empty(), opcode, chunk))
    }
}
