//! Payload masking (RFC 6455 Section 5.3) and masking-key generation.

/// Byte-by-byte XOR masking: `data[i] ^= mask[i % 4]`.
///
/// Applying the same key twice restores the input.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Word-at-a-time XOR masking, equivalent to [`apply_mask`].
#[inline]
pub fn apply_mask_fast(data: &mut [u8], mask: [u8; 4]) {
    let mask_u32 = u32::from_ne_bytes(mask);
    let mut chunks = data.chunks_exact_mut(4);

    for chunk in &mut chunks {
        let val = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        chunk.copy_from_slice(&(val ^ mask_u32).to_ne_bytes());
    }

    // Chunks are a multiple of four bytes long, so the tail restarts at key index 0.
    for (byte, key) in chunks.into_remainder().iter_mut().zip(mask) {
        *byte ^= key;
    }
}

/// Fill `buf` with bytes from the operating system's entropy source.
///
/// # Errors
///
/// Returns the `getrandom` error if no entropy source is available.
pub fn fill_random(buf: &mut [u8]) -> Result<(), getrandom::Error> {
    getrandom::getrandom(buf)
}

/// Draw a fresh masking key from the operating system.
///
/// # Errors
///
/// Returns the `getrandom` error if no entropy source is available.
pub fn random_mask() -> Result<[u8; 4], getrandom::Error> {
    let mut key = [0u8; 4];
    fill_random(&mut key)?;
    Ok(key)
}

/// Produces one masking key per outbound client frame.
///
/// Keys come from [`random_mask`]. On targets where the OS entropy source
/// fails, keys are derived from a mixed counter seeded from the clock so
/// that framing never stalls.
#[derive(Debug, Clone)]
pub struct MaskGenerator {
    fallback: u32,
}

impl MaskGenerator {
    /// Create a generator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fallback: fallback_seed(),
        }
    }

    /// Next masking key.
    pub fn next_mask(&mut self) -> [u8; 4] {
        match random_mask() {
            Ok(key) => key,
            Err(err) => {
                tracing::trace!(error = %err, "entropy source unavailable, using fallback mask");
                self.next_fallback()
            }
        }
    }

    fn next_fallback(&mut self) -> [u8; 4] {
        self.fallback = self.fallback.wrapping_add(0x9E37_79B9);
        let b = self.fallback.wrapping_mul(0x85EB_CA6B);
        let c = b ^ (b >> 13);
        c.wrapping_mul(0xC2B2_AE35).to_le_bytes()
    }
}

impl Default for MaskGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn fallback_seed() -> u32 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() ^ (d.as_secs() as u32))
        .unwrap_or(0x1234_5678)
}
