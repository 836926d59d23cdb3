//! WebSocket messages, control events and close codes as defined in RFC 6455.

use crate::protocol::OpCode;

/// WebSocket close status code per RFC 6455 Section 7.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CloseCode {
    /// Normal closure (1000). The connection successfully completed.
    #[default]
    Normal,
    /// Going away (1001). Endpoint is going away (e.g., server shutdown).
    GoingAway,
    /// Protocol error (1002). Endpoint received a malformed frame or protocol violation.
    ProtocolError,
    /// Unsupported data (1003). Endpoint received data type it cannot handle.
    UnsupportedData,
    /// No status received (1005). Reported locally, never sent.
    NoStatus,
    /// Abnormal closure (1006). Reported locally, never sent.
    Abnormal,
    /// Invalid payload (1007). Endpoint received a message with invalid data (e.g., non-UTF-8 in text).
    InvalidPayload,
    /// Policy violation (1008). Endpoint received a message that violates its policy.
    PolicyViolation,
    /// Message too big (1009). Endpoint received a message too large to process.
    MessageTooBig,
    /// Mandatory extension (1010). Client expected server to negotiate an extension.
    MandatoryExtension,
    /// Internal error (1011). Server encountered an unexpected condition.
    InternalError,
    /// Service restart (1012).
    ServiceRestart,
    /// Try again later (1013).
    TryAgainLater,
    /// TLS handshake failure (1015). Reported locally, never sent.
    TlsHandshake,
    /// Any other code (1014, 3000-4999 for applications, or an invalid value received from a peer).
    Other(u16),
}

impl CloseCode {
    /// Create a `CloseCode` from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1005 => CloseCode::NoStatus,
            1006 => CloseCode::Abnormal,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            1012 => CloseCode::ServiceRestart,
            1013 => CloseCode::TryAgainLater,
            1015 => CloseCode::TlsHandshake,
            other => CloseCode::Other(other),
        }
    }

    /// Get the numeric value of this close code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::NoStatus => 1005,
            CloseCode::Abnormal => 1006,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::ServiceRestart => 1012,
            CloseCode::TryAgainLater => 1013,
            CloseCode::TlsHandshake => 1015,
            CloseCode::Other(code) => *code,
        }
    }

    /// Check if this close code may be sent in a Close frame (RFC 6455 Section 7.4.1).
    ///
    /// Sendable codes:
    /// - 1000-1003
    /// - 1007-1014
    /// - 3000-4999: libraries, frameworks and applications
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        let code = self.as_u16();
        matches!(code, 1000..=1003 | 1007..=1014 | 3000..=4999)
    }

    /// Check if this close code is reserved and MUST NOT be sent in a Close frame.
    ///
    /// - 1004: Reserved
    /// - 1005: No Status Received
    /// - 1006: Abnormal Closure
    /// - 1015: TLS Handshake
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        let code = self.as_u16();
        matches!(code, 1004..=1006 | 1015)
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        CloseCode::from_u16(code)
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// Close frame containing status code and optional reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// The close status code.
    pub code: CloseCode,
    /// Human-readable reason for closing (UTF-8, max 123 bytes).
    pub reason: String,
}

impl CloseFrame {
    /// Create a new close frame with the given code and reason.
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// A complete data message, reassembled from one or more frames.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Message {
    /// A text message (UTF-8 encoded).
    Text(String),
    /// A binary message (arbitrary bytes).
    Binary(Vec<u8>),
}

impl Message {
    /// Create a text message.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Message::Text(s.into())
    }

    /// Create a binary message.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Message::Binary(data.into())
    }

    /// Opcode of the first frame of this message.
    #[must_use]
    pub const fn opcode(&self) -> OpCode {
        match self {
            Message::Text(_) => OpCode::Text,
            Message::Binary(_) => OpCode::Binary,
        }
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload().len()
    }

    /// Returns `true` if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the raw payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        match self {
            Message::Text(s) => s.as_bytes(),
            Message::Binary(data) => data,
        }
    }

    /// Consume the message and return its raw payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        match self {
            Message::Text(s) => s.into_bytes(),
            Message::Binary(data) => data,
        }
    }

    /// Returns `true` if this is a text message.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Message::Text(_))
    }

    /// Returns `true` if this is a binary message.
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        matches!(self, Message::Binary(_))
    }

    /// Borrow the text content, if this is a text message.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(s) => Some(s),
            Message::Binary(_) => None,
        }
    }

    /// Borrow the binary content, if this is a binary message.
    #[must_use]
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Message::Binary(data) => Some(data),
            Message::Text(_) => None,
        }
    }
}

/// A control frame observed on the connection.
///
/// Pings are answered by the engine; handlers must not send a pong themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// Ping with its application data.
    Ping(Vec<u8>),
    /// Pong with its application data.
    Pong(Vec<u8>),
    /// Close frame from the peer; `None` if it carried no status code.
    Close(Option<CloseFrame>),
}

impl Control {
    /// Opcode of the frame this event was produced from.
    #[must_use]
    pub const fn opcode(&self) -> OpCode {
        match self {
            Control::Ping(_) => OpCode::Ping,
            Control::Pong(_) => OpCode::Pong,
            Control::Close(_) => OpCode::Close,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_text_creation() {
        let msg = Message::text("hello");
        assert!(matches!(msg, Message::Text(s) if s == "hello"));

        let msg = Message::text(String::from("world"));
        assert!(matches!(msg, Message::Text(s) if s == "world"));
    }

    #[test]
    fn test_message_binary_creation() {
        let msg = Message::binary(vec![1, 2, 3]);
        assert!(matches!(msg, Message::Binary(ref d) if d == &[1, 2, 3]));

        let msg = Message::binary([4, 5, 6]);
        assert!(matches!(msg, Message::Binary(ref d) if d == &[4, 5, 6]));
    }

    #[test]
    fn test_message_opcode_and_len() {
        let msg = Message::text("héllo");
        assert_eq!(msg.opcode(), OpCode::Text);
        assert_eq!(msg.len(), 6);

        let msg = Message::binary(Vec::new());
        assert_eq!(msg.opcode(), OpCode::Binary);
        assert!(msg.is_empty());
    }

    #[test]
    fn test_message_accessors() {
        let msg = Message::text("hello");
        assert_eq!(msg.as_text(), Some("hello"));
        assert_eq!(msg.as_binary(), None);
        assert_eq!(msg.into_payload(), b"hello".to_vec());

        let msg = Message::binary(vec![1, 2, 3]);
        assert_eq!(msg.as_binary(), Some([1, 2, 3].as_slice()));
        assert_eq!(msg.as_text(), None);
    }

    #[test]
    fn test_control_opcode() {
        assert_eq!(Control::Ping(vec![]).opcode(), OpCode::Ping);
        assert_eq!(Control::Pong(vec![]).opcode(), OpCode::Pong);
        assert_eq!(Control::Close(None).opcode(), OpCode::Close);
    }

    #[test]
    fn test_close_code_from_u16() {
        assert_eq!(CloseCode::from_u16(1000), CloseCode::Normal);
        assert_eq!(CloseCode::from_u16(1001), CloseCode::GoingAway);
        assert_eq!(CloseCode::from_u16(1002), CloseCode::ProtocolError);
        assert_eq!(CloseCode::from_u16(1003), CloseCode::UnsupportedData);
        assert_eq!(CloseCode::from_u16(1005), CloseCode::NoStatus);
        assert_eq!(CloseCode::from_u16(1006), CloseCode::Abnormal);
        assert_eq!(CloseCode::from_u16(1007), CloseCode::InvalidPayload);
        assert_eq!(CloseCode::from_u16(1008), CloseCode::PolicyViolation);
        assert_eq!(CloseCode::from_u16(1009), CloseCode::MessageTooBig);
        assert_eq!(CloseCode::from_u16(1010), CloseCode::MandatoryExtension);
        assert_eq!(CloseCode::from_u16(1011), CloseCode::InternalError);
        assert_eq!(CloseCode::from_u16(1012), CloseCode::ServiceRestart);
        assert_eq!(CloseCode::from_u16(1013), CloseCode::TryAgainLater);
        assert_eq!(CloseCode::from_u16(1015), CloseCode::TlsHandshake);
        assert_eq!(CloseCode::from_u16(3000), CloseCode::Other(3000));
        assert_eq!(CloseCode::from_u16(4999), CloseCode::Other(4999));
    }

    #[test]
    fn test_close_code_as_u16_roundtrip() {
        for code in [1000, 1001, 1002, 1003, 1005, 1006, 1007, 1011, 1012, 1015, 3500] {
            assert_eq!(CloseCode::from_u16(code).as_u16(), code);
        }
    }

    #[test]
    fn test_close_code_validity() {
        for code in [1000, 1001, 1002, 1003, 1007, 1011, 1012, 1013, 1014, 3000, 4999] {
            assert!(CloseCode::from_u16(code).is_valid(), "{code} should be sendable");
        }

        for code in [0, 999, 1004, 1005, 1006, 1015, 1016, 2999, 5000] {
            assert!(!CloseCode::from_u16(code).is_valid(), "{code} must not be sent");
        }
    }

    #[test]
    fn test_close_code_reserved() {
        assert!(CloseCode::Other(1004).is_reserved());
        assert!(CloseCode::NoStatus.is_reserved());
        assert!(CloseCode::Abnormal.is_reserved());
        assert!(CloseCode::TlsHandshake.is_reserved());

        assert!(!CloseCode::Normal.is_reserved());
        assert!(!CloseCode::ServiceRestart.is_reserved());
        assert!(!CloseCode::Other(3000).is_reserved());
    }

    #[test]
    fn test_close_code_display() {
        assert_eq!(CloseCode::InvalidPayload.to_string(), "1007");
    }
}
