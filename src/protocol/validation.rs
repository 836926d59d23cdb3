//! Header validation for incoming frames (RFC 6455 Sections 5.1, 5.2, 5.5).
//!
//! Checks run in a fixed order so the reported error is deterministic:
//! masking, reserved bits, control frame rules, then the frame size limit.

use crate::config::Limits;
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::frame::{FrameHeader, MAX_CONTROL_FRAME_PAYLOAD};

/// Frame validator for incoming WebSocket frames.
///
/// Enforces RFC 6455 requirements based on connection role.
#[derive(Debug, Clone)]
pub struct FrameValidator {
    role: Role,
    limits: Limits,
    /// Whether to accept unmasked frames (server-side, non-compliant).
    accept_unmasked_frames: bool,
}

impl FrameValidator {
    /// Create a new frame validator for a connection in `role`.
    #[must_use]
    pub fn new(role: Role, limits: Limits) -> Self {
        Self {
            role,
            limits,
            accept_unmasked_frames: false,
        }
    }

    /// Accept unmasked frames from clients (non-RFC compliant).
    #[must_use]
    pub fn with_accept_unmasked(mut self, accept: bool) -> Self {
        self.accept_unmasked_frames = accept;
        self
    }

    /// Role this validator checks frames for.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Validate a header whose payload length is known.
    ///
    /// # Errors
    ///
    /// - `Error::UnmaskedClientFrame` - server received an unmasked frame
    /// - `Error::MaskedServerFrame` - client received a masked frame
    /// - `Error::ReservedBitsSet` - any RSV bit set
    /// - `Error::FragmentedControlFrame` - control frame with FIN=0
    /// - `Error::ControlFrameTooLarge` - control payload over 125 bytes
    /// - `Error::FrameTooLarge` - payload over `Limits::max_frame_size`
    pub fn validate_header(&self, header: &FrameHeader) -> Result<()> {
        self.validate_masking(header.is_masked())?;

        if header.rsv1 || header.rsv2 || header.rsv3 {
            return Err(Error::ReservedBitsSet);
        }

        if header.opcode.is_control() {
            if !header.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if header.payload_len > MAX_CONTROL_FRAME_PAYLOAD as u64 {
                return Err(Error::ControlFrameTooLarge(header.payload_len));
            }
        }

        self.limits.check_frame_size(header.payload_len)
    }

    fn validate_masking(&self, masked: bool) -> Result<()> {
        match self.role {
            Role::Server if !masked && !self.accept_unmasked_frames => {
                Err(Error::UnmaskedClientFrame)
            }
            Role::Client if masked => Err(Error::MaskedServerFrame),
            _ => Ok(()),
        }
    }
}
