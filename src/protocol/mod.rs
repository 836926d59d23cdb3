//! WebSocket protocol core (RFC 6455), independent of any runtime.

pub mod assembler;
pub mod close;
pub mod frame;
pub mod mask;
pub mod opcode;
pub mod utf8;
pub mod validation;

pub use assembler::MessageAssembler;
pub use close::{encode_close_payload, parse_close_payload, validate_close_code};
pub use frame::{Frame, FrameHeader, FrameParser};
pub use mask::{MaskGenerator, apply_mask, apply_mask_fast, random_mask};
pub use opcode::OpCode;
pub use utf8::{Utf8State, Utf8Validator, validate_utf8};
pub use validation::FrameValidator;
