//! Close frame payloads (RFC 6455 Section 5.5.1).
//!
//! A close payload is empty, or a big-endian status code optionally
//! followed by a UTF-8 reason. A single byte is never valid.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame};
use crate::protocol::frame::MAX_CONTROL_FRAME_PAYLOAD;

/// Longest reason that fits next to the status code in a control frame.
pub const MAX_CLOSE_REASON: usize = MAX_CONTROL_FRAME_PAYLOAD - 2;

/// Parse a received close payload.
///
/// The status code is not checked here; see [`validate_close_code`].
///
/// # Errors
///
/// - [`Error::InvalidClosePayload`] for a one-byte payload
/// - [`Error::InvalidUtf8`] if the reason is not UTF-8
pub fn parse_close_payload(payload: &[u8]) -> Result<Option<CloseFrame>> {
    match payload {
        [] => Ok(None),
        [_] => Err(Error::InvalidClosePayload),
        [hi, lo, reason @ ..] => {
            let code = CloseCode::from_u16(u16::from_be_bytes([*hi, *lo]));
            let reason = std::str::from_utf8(reason)?;
            Ok(Some(CloseFrame::new(code, reason)))
        }
    }
}

/// Check that `code` may appear on the wire.
///
/// # Errors
///
/// Returns [`Error::InvalidCloseCode`] for reserved or unassigned codes.
pub const fn validate_close_code(code: CloseCode) -> Result<()> {
    if code.is_valid() {
        Ok(())
    } else {
        Err(Error::InvalidCloseCode(code.as_u16()))
    }
}

/// Encode a close payload; `None` produces an empty payload.
///
/// # Errors
///
/// - [`Error::InvalidCloseCode`] if the code must not be sent
/// - [`Error::ControlFrameTooLarge`] if the reason exceeds [`MAX_CLOSE_REASON`]
pub fn encode_close_payload(close: Option<&CloseFrame>) -> Result<Bytes> {
    let Some(close) = close else {
        return Ok(Bytes::new());
    };

    validate_close_code(close.code)?;
    let len = 2 + close.reason.len();
    if close.reason.len() > MAX_CLOSE_REASON {
        return Err(Error::ControlFrameTooLarge(len as u64));
    }

    let mut buf = BytesMut::with_capacity(len);
    buf.put_u16(close.code.as_u16());
    buf.put_slice(close.reason.as_bytes());
    Ok(buf.freeze())
}
