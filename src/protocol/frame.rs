//! Frame header codec and the incremental frame parser (RFC 6455 Section 5.2).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |                Masking-key (0 or 4 bytes)                     |
//! +---------------------------------------------------------------+
//! |                     Payload data                              |
//! +---------------------------------------------------------------+
//! ```
//!
//! [`FrameParser`] never assumes a whole frame is buffered. It asks for the
//! exact size of the next field through [`FrameParser::bytes_needed`] and is
//! fed exactly that many bytes: 2 (lead bytes), then 2 or 8 (extended
//! length, if any), then 4 (masking key, if any), then the payload.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::message::CloseFrame;
use crate::protocol::OpCode;
use crate::protocol::close::encode_close_payload;
use crate::protocol::mask::apply_mask_fast;
use crate::protocol::validation::FrameValidator;

/// Maximum payload size for control frames.
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Largest possible header: 2 lead bytes, 8 length bytes, 4 mask bytes.
pub const MAX_HEADER_SIZE: usize = 14;

const LEAD_SIZE: usize = 2;
const MASK_KEY_SIZE: usize = 4;

/// Decoded frame header.
///
/// `mask.is_some()` is the MASK bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Final fragment flag.
    pub fin: bool,
    /// Reserved bit 1. Must be 0, no extension is ever negotiated.
    pub rsv1: bool,
    /// Reserved bit 2.
    pub rsv2: bool,
    /// Reserved bit 3.
    pub rsv3: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Payload length, at most 2^63 - 1.
    pub payload_len: u64,
    /// Masking key.
    pub mask: Option<[u8; 4]>,
}

impl FrameHeader {
    /// Unmasked header with all reserved bits clear.
    #[must_use]
    pub const fn new(fin: bool, opcode: OpCode, payload_len: u64) -> Self {
        Self {
            fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            payload_len,
            mask: None,
        }
    }

    /// Set the masking key.
    #[must_use]
    pub const fn with_mask(mut self, mask: Option<[u8; 4]>) -> Self {
        self.mask = mask;
        self
    }

    /// Whether the MASK bit is set.
    #[inline]
    #[must_use]
    pub const fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    /// Size of this header on the wire.
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        let ext = match self.payload_len {
            0..=125 => 0,
            126..=0xFFFF => 2,
            _ => 8,
        };
        let mask = if self.is_masked() { MASK_KEY_SIZE } else { 0 };
        LEAD_SIZE + ext + mask
    }

    /// Append the header to `dst` using the shortest length encoding.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());

        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= 0x80;
        }
        if self.rsv1 {
            byte0 |= 0x40;
        }
        if self.rsv2 {
            byte0 |= 0x20;
        }
        if self.rsv3 {
            byte0 |= 0x10;
        }
        dst.put_u8(byte0);

        let mask_bit = if self.is_masked() { 0x80 } else { 0 };
        match self.payload_len {
            len @ 0..=125 => dst.put_u8(mask_bit | len as u8),
            len @ 126..=0xFFFF => {
                dst.put_u8(mask_bit | 126);
                dst.put_u16(len as u16);
            }
            len => {
                dst.put_u8(mask_bit | 127);
                dst.put_u64(len);
            }
        }

        if let Some(key) = self.mask {
            dst.put_slice(&key);
        }
    }

    /// Decode a header from the front of `buf`.
    ///
    /// Returns `Ok(None)` if `buf` does not hold the whole header yet,
    /// otherwise the header and its encoded length.
    ///
    /// # Errors
    ///
    /// - [`Error::ReservedOpcode`] for a reserved opcode
    /// - [`Error::PayloadLengthOverflow`] if the 64-bit length has its high bit set
    pub fn decode(buf: &[u8]) -> Result<Option<(Self, usize)>> {
        if buf.len() < LEAD_SIZE {
            return Ok(None);
        }

        let (mut header, ext_len) = decode_lead(buf[0], buf[1])?;
        let mut offset = LEAD_SIZE;

        if ext_len > 0 {
            let Some(ext) = buf.get(offset..offset + ext_len) else {
                return Ok(None);
            };
            header.payload_len = decode_extended_len(ext)?;
            offset += ext_len;
        }

        if header.is_masked() {
            let Some(key) = buf.get(offset..offset + MASK_KEY_SIZE) else {
                return Ok(None);
            };
            header.mask = Some([key[0], key[1], key[2], key[3]]);
            offset += MASK_KEY_SIZE;
        }

        Ok(Some((header, offset)))
    }
}

/// Decode the two lead bytes.
///
/// Returns the header with the 7-bit length and the size of the extended
/// length field that follows (0, 2 or 8). A masked header carries a zeroed
/// placeholder key until the real one is read.
fn decode_lead(byte0: u8, byte1: u8) -> Result<(FrameHeader, usize)> {
    let opcode = OpCode::from_u8(byte0 & 0x0F)?;
    let len7 = byte1 & 0x7F;

    let header = FrameHeader {
        fin: byte0 & 0x80 != 0,
        rsv1: byte0 & 0x40 != 0,
        rsv2: byte0 & 0x20 != 0,
        rsv3: byte0 & 0x10 != 0,
        opcode,
        payload_len: u64::from(len7),
        mask: (byte1 & 0x80 != 0).then_some([0; 4]),
    };

    let ext_len = match len7 {
        126 => 2,
        127 => 8,
        _ => 0,
    };
    Ok((header, ext_len))
}

fn decode_extended_len(ext: &[u8]) -> Result<u64> {
    match *ext {
        [a, b] => Ok(u64::from(u16::from_be_bytes([a, b]))),
        [a, b, c, d, e, f, g, h] => {
            let len = u64::from_be_bytes([a, b, c, d, e, f, g, h]);
            if len >> 63 != 0 {
                Err(Error::PayloadLengthOverflow(len))
            } else {
                Ok(len)
            }
        }
        _ => Err(Error::ProtocolViolation(format!(
            "extended length field of {} bytes",
            ext.len()
        ))),
    }
}

/// A single WebSocket frame with an unmasked payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Application data, never masked.
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin,
            opcode,
            payload: payload.into(),
        }
    }

    /// Final text frame.
    #[must_use]
    pub fn text(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Text, data)
    }

    /// Final binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Binary, data)
    }

    /// Ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Ping, data)
    }

    /// Pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Pong, data)
    }

    /// Close frame; `None` sends no status code.
    ///
    /// # Errors
    ///
    /// See [`encode_close_payload`].
    pub fn close(close: Option<&CloseFrame>) -> Result<Self> {
        Ok(Self::new(true, OpCode::Close, encode_close_payload(close)?))
    }

    /// Payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Header describing this frame on the wire.
    #[must_use]
    pub fn header(&self, mask: Option<[u8; 4]>) -> FrameHeader {
        FrameHeader::new(self.fin, self.opcode, self.payload.len() as u64).with_mask(mask)
    }

    /// Wire representation as a header buffer and a payload buffer, masked
    /// with `mask` if given.
    ///
    /// The payload is shared, not copied, when no mask is applied.
    #[must_use]
    pub fn to_wire(&self, mask: Option<[u8; 4]>) -> (Bytes, Bytes) {
        let header = self.header(mask);
        let mut head = BytesMut::with_capacity(header.encoded_len());
        header.encode(&mut head);

        let body = match mask {
            Some(key) => {
                let mut body = BytesMut::from(self.payload());
                apply_mask_fast(&mut body, key);
                body.freeze()
            }
            None => self.payload.clone(),
        };
        (head.freeze(), body)
    }

    /// Append header and payload to `dst` as one contiguous frame.
    pub fn encode(&self, mask: Option<[u8; 4]>, dst: &mut BytesMut) {
        self.header(mask).encode(dst);
        let start = dst.len();
        dst.extend_from_slice(self.payload());
        if let Some(key) = mask {
            apply_mask_fast(&mut dst[start..], key);
        }
    }

    /// Total wire size.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let mask = masked.then_some([0; 4]);
        self.header(mask).encoded_len() + self.payload.len()
    }

    /// Parse one complete frame from the front of `buf`, unmasking it.
    ///
    /// Returns `Ok(None)` if more bytes are needed, otherwise the frame and
    /// the number of bytes consumed. Performs no role or limit validation.
    ///
    /// # Errors
    ///
    /// See [`FrameHeader::decode`].
    pub fn parse(buf: &[u8]) -> Result<Option<(Self, usize)>> {
        let Some((header, header_len)) = FrameHeader::decode(buf)? else {
            return Ok(None);
        };
        let Ok(payload_len) = usize::try_from(header.payload_len) else {
            return Err(Error::FrameTooLarge {
                size: header.payload_len,
                max: usize::MAX,
            });
        };
        let end = header_len.saturating_add(payload_len);
        let Some(raw) = buf.get(header_len..end) else {
            return Ok(None);
        };

        let mut payload = BytesMut::from(raw);
        if let Some(key) = header.mask {
            apply_mask_fast(&mut payload, key);
        }
        Ok(Some((
            Self::new(header.fin, header.opcode, payload.freeze()),
            end,
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Lead,
    ExtendedLength(usize),
    MaskKey,
    Payload(usize),
}

/// Incremental, validating frame parser.
///
/// The header is checked by the [`FrameValidator`] as soon as the payload
/// length is known, so an oversized or illegal frame is rejected before its
/// payload is requested.
#[derive(Debug, Clone)]
pub struct FrameParser {
    validator: FrameValidator,
    stage: Stage,
    header: FrameHeader,
}

impl FrameParser {
    /// Create a parser awaiting the lead bytes of a frame.
    #[must_use]
    pub fn new(validator: FrameValidator) -> Self {
        Self {
            validator,
            stage: Stage::Lead,
            header: FrameHeader::new(true, OpCode::Continuation, 0),
        }
    }

    /// Exact number of bytes the next [`feed`](Self::feed) call expects.
    /// Never zero.
    #[must_use]
    pub const fn bytes_needed(&self) -> usize {
        match self.stage {
            Stage::Lead => LEAD_SIZE,
            Stage::ExtendedLength(n) | Stage::Payload(n) => n,
            Stage::MaskKey => MASK_KEY_SIZE,
        }
    }

    /// Whether the parser sits between frames.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.stage == Stage::Lead
    }

    /// Header of the frame currently being parsed, once its length is known.
    #[must_use]
    pub fn current_header(&self) -> Option<&FrameHeader> {
        matches!(self.stage, Stage::MaskKey | Stage::Payload(_)).then_some(&self.header)
    }

    /// Consume the next field. `chunk` must hold exactly
    /// [`bytes_needed`](Self::bytes_needed) bytes.
    ///
    /// Returns a frame when its payload is complete.
    ///
    /// # Errors
    ///
    /// Any header or validation error. The parser must not be fed again
    /// afterwards.
    pub fn feed(&mut self, mut chunk: BytesMut) -> Result<Option<Frame>> {
        if chunk.len() != self.bytes_needed() {
            return Err(Error::ProtocolViolation(format!(
                "frame parser fed {} bytes, expected {}",
                chunk.len(),
                self.bytes_needed()
            )));
        }

        match self.stage {
            Stage::Lead => {
                let (header, ext_len) = decode_lead(chunk[0], chunk[1])?;
                self.header = header;
                if ext_len > 0 {
                    self.stage = Stage::ExtendedLength(ext_len);
                    Ok(None)
                } else {
                    self.length_known()
                }
            }
            Stage::ExtendedLength(_) => {
                self.header.payload_len = decode_extended_len(&chunk)?;
                self.length_known()
            }
            Stage::MaskKey => {
                self.header.mask = Some([chunk[0], chunk[1], chunk[2], chunk[3]]);
                self.enter_payload()
            }
            Stage::Payload(_) => {
                if let Some(key) = self.header.mask {
                    apply_mask_fast(&mut chunk, key);
                }
                Ok(Some(self.finish(chunk.freeze())))
            }
        }
    }

    /// Drop any partially parsed frame.
    pub fn reset(&mut self) {
        self.stage = Stage::Lead;
    }

    fn length_known(&mut self) -> Result<Option<Frame>> {
        self.validator.validate_header(&self.header)?;
        if self.header.is_masked() {
            self.stage = Stage::MaskKey;
            Ok(None)
        } else {
            self.enter_payload()
        }
    }

    fn enter_payload(&mut self) -> Result<Option<Frame>> {
        let len = usize::try_from(self.header.payload_len).map_err(|_| Error::FrameTooLarge {
            size: self.header.payload_len,
            max: usize::MAX,
        })?;
        if len == 0 {
            Ok(Some(self.finish(Bytes::new())))
        } else {
            self.stage = Stage::Payload(len);
            Ok(None)
        }
    }

    fn finish(&mut self, payload: Bytes) -> Frame {
        self.stage = Stage::Lead;
        Frame::new(self.header.fin, self.header.opcode, payload)
    }
}
