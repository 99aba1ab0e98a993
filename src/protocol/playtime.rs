//! TARGET_PLAYTIME object extension
//!
//! Absolute presentation time as signed nanoseconds since the Unix epoch,
//! carried as an 8-byte big-endian two's-complement value under an odd
//! (length-prefixed) extension type. Representable range is roughly the
//! years 1677 to 2262.

use bytes::{BufMut, Bytes, BytesMut};

use super::extension::{ExtensionError, ExtensionHeader, ExtensionHeaders, ExtensionValue};
use super::varint;

/// Extension type code for TARGET_PLAYTIME
pub const TARGET_PLAYTIME: u64 = 0x31;

/// Encoded size of the value field
pub const VALUE_LEN: usize = 8;

/// Encode a stand-alone TARGET_PLAYTIME key-value pair.
///
/// The type is written as a delta from zero, so the output is also a valid
/// extension block body holding just this one header.
#[must_use]
pub fn encode(timestamp_ns: i64) -> Bytes {
    let mut buf = BytesMut::with_capacity(2 + VALUE_LEN);
    // Both varints are below 64, so encoding cannot fail.
    let _ = varint::encode(TARGET_PLAYTIME, &mut buf);
    let _ = varint::encode(VALUE_LEN as u64, &mut buf);
    buf.put_slice(&to_value(timestamp_ns));
    buf.freeze()
}

/// Decode the single TARGET_PLAYTIME from an extension block body.
///
/// # Errors
///
/// - [`ExtensionError::LengthMismatch`] if the value is not exactly 8 bytes
/// - [`ExtensionError::MultipleInstances`] if more than one is present
/// - [`ExtensionError::Missing`] if there is none
/// - [`ExtensionError::Malformed`] / [`ExtensionError::Varint`] for broken blocks
pub fn decode(bytes: &[u8]) -> Result<i64, ExtensionError> {
    let headers = ExtensionHeaders::decode(bytes)?;
    find(&headers)?.ok_or(ExtensionError::Missing)
}

/// Look up TARGET_PLAYTIME in parsed headers, allowing it to be absent.
///
/// # Errors
///
/// Fails on duplicate instances or a value that is not exactly 8 bytes.
pub fn find(headers: &ExtensionHeaders) -> Result<Option<i64>, ExtensionError> {
    let mut instances = headers.get_all(TARGET_PLAYTIME);
    let Some(first) = instances.next() else {
        return Ok(None);
    };

    let extra = instances.count();
    if extra > 0 {
        return Err(ExtensionError::MultipleInstances { count: extra + 1 });
    }

    match &first.value {
        ExtensionValue::Bytes(value) => from_value(value).map(Some),
        // Odd types always decode as bytes; only hand-built headers get here.
        ExtensionValue::Varint(_) => Err(ExtensionError::WrongParity {
            kind: TARGET_PLAYTIME,
            expected: "varint",
        }),
    }
}

/// Convert a timestamp to its 8-byte wire value
#[must_use]
pub fn to_value(timestamp_ns: i64) -> [u8; VALUE_LEN] {
    timestamp_ns.to_be_bytes()
}

/// Convert an 8-byte wire value back to a timestamp
///
/// # Errors
///
/// Returns [`ExtensionError::LengthMismatch`] unless `value` is exactly 8 bytes.
pub fn from_value(value: &[u8]) -> Result<i64, ExtensionError> {
    let raw: [u8; VALUE_LEN] = value
        .try_into()
        .map_err(|_| ExtensionError::LengthMismatch { len: value.len() })?;
    Ok(i64::from_be_bytes(raw))
}

impl ExtensionHeaders {
    /// Set TARGET_PLAYTIME, replacing any existing instance
    pub fn set_target_playtime(&mut self, timestamp_ns: i64) {
        self.remove_all(TARGET_PLAYTIME);
        self.push(ExtensionHeader {
            kind: TARGET_PLAYTIME,
            value: ExtensionValue::Bytes(Bytes::copy_from_slice(&to_value(timestamp_ns))),
        });
    }

    /// Read TARGET_PLAYTIME if present
    ///
    /// # Errors
    ///
    /// See [`find`].
    pub fn target_playtime(&self) -> Result<Option<i64>, ExtensionError> {
        find(self)
    }
}
