//! Streaming UTF-8 validation for text messages.
//!
//! Text messages arrive in fragments and a multi-byte code point may be split
//! across any of them. [`Utf8Validator`] keeps the unfinished tail of the
//! previous chunk (at most three bytes) and reports after every chunk whether
//! the bytes seen so far are valid, invalid, or valid but cut mid-sequence.

use crate::error::{Error, Result};

/// Outcome of feeding bytes into a [`Utf8Validator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utf8State {
    /// Everything fed so far is complete, valid UTF-8.
    Accept,
    /// Invalid UTF-8 was seen. Sticky until [`Utf8Validator::reset`].
    Reject,
    /// Valid so far, but the input ends inside a multi-byte sequence.
    Incomplete,
}

/// Incremental UTF-8 validator.
#[derive(Debug, Clone)]
pub struct Utf8Validator {
    /// Bytes of an unfinished code point.
    pending: [u8; 4],
    pending_len: usize,
    /// Total width of the unfinished code point.
    pending_width: usize,
    rejected: bool,
}

impl Default for Utf8Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Utf8Validator {
    /// Create a validator in the initial (accepting) state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: [0; 4],
            pending_len: 0,
            pending_width: 0,
            rejected: false,
        }
    }

    /// Feed the next chunk.
    pub fn feed(&mut self, mut data: &[u8]) -> Utf8State {
        if self.rejected {
            return Utf8State::Reject;
        }

        if self.pending_len > 0 {
            let take = (self.pending_width - self.pending_len).min(data.len());
            self.pending[self.pending_len..self.pending_len + take].copy_from_slice(&data[..take]);
            self.pending_len += take;
            data = &data[take..];

            match std::str::from_utf8(&self.pending[..self.pending_len]) {
                Ok(_) => self.pending_len = 0,
                Err(e) if e.error_len().is_some() => return self.reject(),
                Err(_) if self.pending_len < self.pending_width => return Utf8State::Incomplete,
                Err(_) => return self.reject(),
            }
        }

        match std::str::from_utf8(data) {
            Ok(_) => Utf8State::Accept,
            Err(e) if e.error_len().is_some() => self.reject(),
            Err(e) => {
                let tail = &data[e.valid_up_to()..];
                self.pending_width = sequence_width(tail[0]);
                self.pending[..tail.len()].copy_from_slice(tail);
                self.pending_len = tail.len();
                Utf8State::Incomplete
            }
        }
    }

    /// Current state without feeding anything.
    #[must_use]
    pub const fn state(&self) -> Utf8State {
        if self.rejected {
            Utf8State::Reject
        } else if self.pending_len > 0 {
            Utf8State::Incomplete
        } else {
            Utf8State::Accept
        }
    }

    /// Return to the initial state, discarding any partial code point.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn reject(&mut self) -> Utf8State {
        self.rejected = true;
        self.pending_len = 0;
        Utf8State::Reject
    }
}

/// Width of the sequence introduced by a lead byte that `from_utf8` reported
/// as truncated, so it is always a valid multi-byte lead.
const fn sequence_width(lead: u8) -> usize {
    match lead {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        _ => 4,
    }
}

/// Validate a complete buffer.
///
/// # Errors
///
/// Returns [`Error::InvalidUtf8`] if the data is not valid UTF-8.
pub fn validate_utf8(data: &[u8]) -> Result<&str> {
    std::str::from_utf8(data).map_err(|_| Error::InvalidUtf8)
}
