//! Generic object extension headers
//!
//! An Object carries a block of key-value pairs. Each pair starts with its
//! type, delta-encoded against the previous pair's type on the same Object.
//! Odd types are followed by a varint length and that many raw bytes; even
//! types are followed by a single varint value.
//!
//! ```text
//! +----------------------+---------------------------------------------+
//! | Extension Length (i) | Type delta (i) | Length (i) | Value (..) ... |
//! +----------------------+---------------------------------------------+
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use super::varint::{self, VarintError};

/// Extension header codec errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtensionError {
    /// TARGET_PLAYTIME value field is not exactly 8 bytes
    #[error("TARGET_PLAYTIME value must be 8 bytes, got {len}")]
    LengthMismatch {
        /// Length found on the wire
        len: usize,
    },

    /// More than one TARGET_PLAYTIME on a single Object
    #[error("TARGET_PLAYTIME appears {count} times on one object")]
    MultipleInstances {
        /// Number of instances found
        count: usize,
    },

    /// TARGET_PLAYTIME required but absent
    #[error("TARGET_PLAYTIME missing")]
    Missing,

    /// Structural error in the extension block
    #[error("malformed extension block: {reason}")]
    Malformed {
        /// What was wrong
        reason: String,
    },

    /// Value kind does not match the parity of the type
    #[error("extension type {kind:#x} does not carry a {expected} value")]
    WrongParity {
        /// Offending type
        kind: u64,
        /// Value kind that was supplied
        expected: &'static str,
    },

    /// Varint error
    #[error("varint error: {0}")]
    Varint(#[from] VarintError),
}

/// Value carried by an extension header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionValue {
    /// Even types: a single varint
    Varint(u64),
    /// Odd types: length-prefixed bytes
    Bytes(Bytes),
}

/// A single extension header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionHeader {
    /// Extension type code
    pub kind: u64,
    /// Extension value
    pub value: ExtensionValue,
}

impl ExtensionHeader {
    /// Whether values of this type are length-prefixed on the wire
    #[must_use]
    pub const fn is_length_prefixed(kind: u64) -> bool {
        kind & 1 == 1
    }

    /// Create an even-typed header carrying a varint
    ///
    /// # Errors
    ///
    /// Returns [`ExtensionError::WrongParity`] if `kind` is odd.
    pub fn varint(kind: u64, value: u64) -> Result<Self, ExtensionError> {
        if Self::is_length_prefixed(kind) {
            return Err(ExtensionError::WrongParity {
                kind,
                expected: "varint",
            });
        }
        Ok(Self {
            kind,
            value: ExtensionValue::Varint(value),
        })
    }

    /// Create an odd-typed header carrying raw bytes
    ///
    /// # Errors
    ///
    /// Returns [`ExtensionError::WrongParity`] if `kind` is even.
    pub fn bytes(kind: u64, value: impl Into<Bytes>) -> Result<Self, ExtensionError> {
        if !Self::is_length_prefixed(kind) {
            return Err(ExtensionError::WrongParity {
                kind,
                expected: "length-prefixed",
            });
        }
        Ok(Self {
            kind,
            value: ExtensionValue::Bytes(value.into()),
        })
    }
}

/// Ordered set of extension headers on one Object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionHeaders {
    headers: Vec<ExtensionHeader>,
}

impl ExtensionHeaders {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, keeping types ascending so they can be delta-encoded.
    ///
    /// Headers of equal type keep their insertion order.
    pub fn push(&mut self, header: ExtensionHeader) {
        let at = self.headers.partition_point(|h| h.kind <= header.kind);
        self.headers.insert(at, header);
    }

    /// Remove every header of `kind`, returning how many were removed
    pub fn remove_all(&mut self, kind: u64) -> usize {
        let before = self.headers.len();
        self.headers.retain(|h| h.kind != kind);
        before - self.headers.len()
    }

    /// Iterate over headers of `kind`
    pub fn get_all(&self, kind: u64) -> impl Iterator<Item = &ExtensionHeader> {
        self.headers.iter().filter(move |h| h.kind == kind)
    }

    /// Iterate over all headers in wire order
    pub fn iter(&self) -> impl Iterator<Item = &ExtensionHeader> {
        self.headers.iter()
    }

    /// Number of headers
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Whether there are no headers
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Encode the key-value pairs (without the outer length)
    ///
    /// # Errors
    ///
    /// Returns an error if a type, length or varint value exceeds the varint range.
    pub fn encode(&self) -> Result<Bytes, ExtensionError> {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Encode the key-value pairs into `buf`
    ///
    /// # Errors
    ///
    /// Returns an error if a type, length or varint value exceeds the varint range.
    pub fn encode_into<B: BufMut>(&self, buf: &mut B) -> Result<(), ExtensionError> {
        let mut previous = 0u64;
        for header in &self.headers {
            varint::encode(header.kind - previous, buf)?;
            previous = header.kind;

            match &header.value {
                ExtensionValue::Varint(value) => varint::encode(*value, buf)?,
                ExtensionValue::Bytes(value) => {
                    varint::encode(value.len() as u64, buf)?;
                    buf.put_slice(value);
                }
            }
        }
        Ok(())
    }

    /// Decode key-value pairs occupying the whole of `data`
    ///
    /// # Errors
    ///
    /// Returns [`ExtensionError::Malformed`] or [`ExtensionError::Varint`] on
    /// truncated or inconsistent input.
    pub fn decode(data: &[u8]) -> Result<Self, ExtensionError> {
        let mut buf = data;
        let mut headers = Vec::new();
        let mut previous = 0u64;

        while buf.has_remaining() {
            let delta = varint::decode(&mut buf)?;
            let kind = previous
                .checked_add(delta)
                .filter(|k| *k <= varint::MAX_VALUE)
                .ok_or_else(|| ExtensionError::Malformed {
                    reason: format!("type delta {delta} overflows after {previous:#x}"),
                })?;
            previous = kind;

            let value = if ExtensionHeader::is_length_prefixed(kind) {
                let len = usize::try_from(varint::decode(&mut buf)?).map_err(|_| {
                    ExtensionError::Malformed {
                        reason: "length does not fit in memory".to_string(),
                    }
                })?;
                if buf.remaining() < len {
                    return Err(ExtensionError::Malformed {
                        reason: format!(
                            "type {kind:#x} announces {len} bytes, {} remain",
                            buf.remaining()
                        ),
                    });
                }
                let value = Bytes::copy_from_slice(&buf[..len]);
                buf.advance(len);
                ExtensionValue::Bytes(value)
            } else {
                ExtensionValue::Varint(varint::decode(&mut buf)?)
            };

            headers.push(ExtensionHeader { kind, value });
        }

        Ok(Self { headers })
    }

    /// Encode with the leading `Extension Headers Length` varint
    ///
    /// # Errors
    ///
    /// See [`ExtensionHeaders::encode`].
    pub fn encode_block(&self) -> Result<Bytes, ExtensionError> {
        let body = self.encode()?;
        let mut buf = BytesMut::with_capacity(body.len() + 8);
        varint::encode(body.len() as u64, &mut buf)?;
        buf.put_slice(&body);
        Ok(buf.freeze())
    }

    /// Decode a block that starts with the `Extension Headers Length` varint,
    /// advancing `buf` past it.
    ///
    /// # Errors
    ///
    /// Returns an error if the announced length exceeds the input or the
    /// pairs inside are malformed.
    pub fn decode_block<B: Buf>(buf: &mut B) -> Result<Self, ExtensionError> {
        let len = usize::try_from(varint::decode(buf)?).map_err(|_| ExtensionError::Malformed {
            reason: "block length does not fit in memory".to_string(),
        })?;
        if buf.remaining() < len {
            return Err(ExtensionError::Malformed {
                reason: format!("block announces {len} bytes, {} remain", buf.remaining()),
            });
        }
        let body = buf.copy_to_bytes(len);
        Self::decode(&body)
    }
}

impl<'a> IntoIterator for &'a ExtensionHeaders {
    type Item = &'a ExtensionHeader;
    type IntoIter = std::slice::Iter<'a, ExtensionHeader>;

    fn into_iter(self) -> Self::IntoIter {
        self.headers.iter()
    }
}
