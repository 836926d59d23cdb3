//! Reassembly of fragmented data messages (RFC 6455 Section 5.4).

use bytes::BytesMut;

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::utf8::{Utf8State, Utf8Validator};
use crate::protocol::{Frame, OpCode};

/// Reassembles fragmented WebSocket messages.
///
/// Only data frames are accepted; control frames are handled by the
/// connection and never touch assembler state.
#[derive(Debug)]
pub struct MessageAssembler {
    buffer: BytesMut,
    opcode: Option<OpCode>,
    fragment_count: usize,
    utf8: Option<Utf8Validator>,
    limits: Limits,
}

impl MessageAssembler {
    /// Create an assembler enforcing `limits`.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::new(),
            opcode: None,
            fragment_count: 0,
            utf8: None,
            limits,
        }
    }

    /// Add a data frame to the message being assembled.
    ///
    /// Returns the complete message when the frame has FIN set.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` for a continuation with no message in
    ///   progress, a new message while one is in progress, or a control frame
    /// - `Error::InvalidUtf8` as soon as a text message can no longer be valid
    /// - `Error::MessageTooLarge` / `Error::TooManyFragments` on limit overrun
    pub fn push(&mut self, frame: Frame) -> Result<Option<Message>> {
        match (frame.opcode, self.opcode) {
            (OpCode::Continuation, None) => {
                return Err(Error::ProtocolViolation(
                    "continuation frame without a message in progress".into(),
                ));
            }
            (OpCode::Continuation, Some(_)) => {}
            (OpCode::Text | OpCode::Binary, Some(_)) => {
                return Err(Error::ProtocolViolation(
                    "new data frame while a fragmented message is in progress".into(),
                ));
            }
            (opcode @ (OpCode::Text | OpCode::Binary), None) => {
                self.opcode = Some(opcode);
                self.utf8 = (opcode == OpCode::Text).then(Utf8Validator::new);
            }
            (opcode, _) => {
                return Err(Error::ProtocolViolation(format!(
                    "{opcode} frame passed to the message assembler"
                )));
            }
        }

        self.fragment_count += 1;
        self.limits.check_fragment_count(self.fragment_count)?;

        let size = self
            .buffer
            .len()
            .checked_add(frame.payload.len())
            .unwrap_or(usize::MAX);
        self.limits.check_message_size(size)?;

        if let Some(utf8) = self.utf8.as_mut() {
            match utf8.feed(&frame.payload) {
                Utf8State::Reject => return Err(Error::InvalidUtf8),
                Utf8State::Incomplete if frame.fin => return Err(Error::InvalidUtf8),
                _ => {}
            }
        }

        self.buffer.extend_from_slice(&frame.payload);

        if !frame.fin {
            return Ok(None);
        }

        let payload = self.buffer.split().to_vec();
        let opcode = self.opcode.take();
        self.reset();

        match opcode {
            Some(OpCode::Text) => String::from_utf8(payload)
                .map(|text| Some(Message::Text(text)))
                .map_err(|_| Error::InvalidUtf8),
            _ => Ok(Some(Message::Binary(payload))),
        }
    }

    /// Whether a fragmented message is in progress.
    #[must_use]
    pub const fn is_assembling(&self) -> bool {
        self.opcode.is_some()
    }

    /// Number of fragments received for the message in progress.
    #[must_use]
    pub const fn fragment_count(&self) -> usize {
        self.fragment_count
    }

    /// Discard the message in progress.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.opcode = None;
        self.fragment_count = 0;
        self.utf8 = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assembler() -> MessageAssembler {
        MessageAssembler::new(Limits::default())
    }

    fn small_assembler() -> MessageAssembler {
        MessageAssembler::new(Limits::new(1024, 100, 3))
    }

    #[test]
    fn test_single_frame_message() {
        let mut assembler = assembler();
        let msg = assembler.push(Frame::text("Hello")).unwrap().unwrap();
        assert_eq!(msg, Message::text("Hello"));
        assert_eq!(msg.len(), 5);
        assert!(!assembler.is_assembling());
    }

    #[test]
    fn test_two_fragment_message() {
        let mut assembler = assembler();

        assert!(assembler.push(Frame::new(false, OpCode::Text, "Hel")).unwrap().is_none());
        assert!(assembler.is_assembling());
        assert_eq!(assembler.fragment_count(), 1);

        let msg = assembler
            .push(Frame::new(true, OpCode::Continuation, "lo"))
            .unwrap()
            .unwrap();
        assert_eq!(msg, Message::text("Hello"));
    }

    #[test]
    fn test_many_fragments() {
        let mut assembler = assembler();
        assert!(assembler.push(Frame::new(false, OpCode::Binary, vec![1, 2])).unwrap().is_none());
        assert!(assembler.push(Frame::new(false, OpCode::Continuation, vec![3, 4])).unwrap().is_none());
        assert!(assembler.push(Frame::new(false, OpCode::Continuation, vec![5, 6])).unwrap().is_none());

        let msg = assembler
            .push(Frame::new(true, OpCode::Continuation, vec![7, 8]))
            .unwrap()
            .unwrap();
        assert_eq!(msg, Message::binary(vec![1, 2, 3, 4, 5, 6, 7, 8]));
    }

    #[test]
    fn test_empty_message() {
        let mut assembler = assembler();
        let msg = assembler.push(Frame::binary(Vec::new())).unwrap().unwrap();
        assert!(msg.is_empty());
    }

    #[test]
    fn test_control_frame_rejected() {
        let mut assembler = assembler();
        assert!(assembler.push(Frame::new(false, OpCode::Text, "Hel")).unwrap().is_none());
        assert!(matches!(
            assembler.push(Frame::ping("p")),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_max_message_size_exceeded() {
        let mut assembler = small_assembler();
        assert!(assembler.push(Frame::new(false, OpCode::Binary, vec![0u8; 60])).is_ok());
        assert_eq!(
            assembler.push(Frame::new(true, OpCode::Continuation, vec![0u8; 60])),
            Err(Error::MessageTooLarge { size: 120, max: 100 })
        );
    }

    #[test]
    fn test_max_fragment_count_exceeded() {
        let mut assembler = small_assembler();
        assert!(assembler.push(Frame::new(false, OpCode::Binary, vec![1])).is_ok());
        assert!(assembler.push(Frame::new(false, OpCode::Continuation, vec![2])).is_ok());
        assert!(assembler.push(Frame::new(false, OpCode::Continuation, vec![3])).is_ok());
        assert_eq!(
            assembler.push(Frame::new(true, OpCode::Continuation, vec![4])),
            Err(Error::TooManyFragments { count: 4, max: 3 })
        );
    }

    #[test]
    fn test_continuation_without_start_fails() {
        let mut assembler = assembler();
        assert!(matches!(
            assembler.push(Frame::new(true, OpCode::Continuation, "data")),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_new_message_without_continuation_fails() {
        let mut assembler = assembler();
        assembler.push(Frame::new(false, OpCode::Text, "first")).unwrap();
        assert!(matches!(
            assembler.push(Frame::text("second")),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_utf8_split_across_fragments() {
        let mut assembler = assembler();
        assert!(assembler.push(Frame::new(false, OpCode::Text, vec![0xf0, 0x9f])).is_ok());
        let msg = assembler
            .push(Frame::new(true, OpCode::Continuation, vec![0x8e, 0x89]))
            .unwrap()
            .unwrap();
        assert_eq!(msg.as_text(), Some("🎉"));
    }

    #[test]
    fn test_invalid_utf8_fails_early() {
        let mut assembler = assembler();
        assert_eq!(
            assembler.push(Frame::new(false, OpCode::Text, vec![0x80, 0x81])),
            Err(Error::InvalidUtf8)
        );
    }

    #[test]
    fn test_truncated_utf8_on_final_fragment() {
        let mut assembler = assembler();
        assert_eq!(
            assembler.push(Frame::text(vec![b'a', 0xe2, 0x82])),
            Err(Error::InvalidUtf8)
        );
    }

    #[test]
    fn test_binary_skips_utf8_validation() {
        let mut assembler = assembler();
        let msg = assembler.push(Frame::binary(vec![0x80, 0x81, 0xff])).unwrap().unwrap();
        assert_eq!(msg.as_binary(), Some(&[0x80, 0x81, 0xff][..]));
    }

    #[test]
    fn test_reset() {
        let mut assembler = assembler();
        assembler.push(Frame::new(false, OpCode::Text, "partial")).unwrap();
        assert!(assembler.is_assembling());

        assembler.reset();
        assert!(!assembler.is_assembling());
        assert!(assembler.push(Frame::text("fresh")).unwrap().is_some());
    }
}
