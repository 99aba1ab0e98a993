//! QUIC variable-length integers (RFC 9000 §16)
//!
//! The two most significant bits of the first byte select the encoded
//! length (1, 2, 4 or 8 bytes); the remaining bits carry the value in
//! network byte order.

use bytes::{Buf, BufMut};
use thiserror::Error;

/// Largest value a varint can carry (2^62 - 1)
pub const MAX_VALUE: u64 = (1 << 62) - 1;

/// Varint codec errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VarintError {
    /// Input ended in the middle of a varint
    #[error("unexpected end of input: need {needed} bytes, have {have}")]
    UnexpectedEnd {
        /// Bytes required by the length prefix
        needed: usize,
        /// Bytes actually available
        have: usize,
    },

    /// Value does not fit in 62 bits
    #[error("value {0} exceeds varint range")]
    OutOfRange(u64),
}

/// Number of bytes `value` occupies once encoded.
///
/// # Errors
///
/// Returns [`VarintError::OutOfRange`] for values above [`MAX_VALUE`].
pub fn encoded_len(value: u64) -> Result<usize, VarintError> {
    match value {
        0..=0x3F => Ok(1),
        0x40..=0x3FFF => Ok(2),
        0x4000..=0x3FFF_FFFF => Ok(4),
        0x4000_0000..=MAX_VALUE => Ok(8),
        _ => Err(VarintError::OutOfRange(value)),
    }
}

/// Append `value` to `buf` using the shortest encoding.
///
/// # Errors
///
/// Returns [`VarintError::OutOfRange`] for values above [`MAX_VALUE`].
#[allow(clippy::cast_possible_truncation)]
pub fn encode<B: BufMut>(value: u64, buf: &mut B) -> Result<(), VarintError> {
    match encoded_len(value)? {
        1 => buf.put_u8(value as u8),
        2 => buf.put_u16(0x4000 | value as u16),
        4 => buf.put_u32(0x8000_0000 | value as u32),
        _ => buf.put_u64(0xC000_0000_0000_0000 | value),
    }
    Ok(())
}

/// Read one varint from the front of `buf`, advancing it.
///
/// # Errors
///
/// Returns [`VarintError::UnexpectedEnd`] if `buf` is shorter than the
/// length announced by the first byte.
pub fn decode<B: Buf>(buf: &mut B) -> Result<u64, VarintError> {
    if !buf.has_remaining() {
        return Err(VarintError::UnexpectedEnd { needed: 1, have: 0 });
    }

    let needed = 1usize << (buf.chunk()[0] >> 6);
    if buf.remaining() < needed {
        return Err(VarintError::UnexpectedEnd {
            needed,
            have: buf.remaining(),
        });
    }

    let value = match needed {
        1 => u64::from(buf.get_u8()),
        2 => u64::from(buf.get_u16() & 0x3FFF),
        4 => u64::from(buf.get_u32() & 0x3FFF_FFFF),
        _ => buf.get_u64() & MAX_VALUE,
    };
    Ok(value)
}
