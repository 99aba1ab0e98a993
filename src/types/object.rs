use std::sync::Arc;

use bytes::Bytes;

use super::track::{GroupId, ObjectId, ObjectKey, TrackName};
use crate::protocol::{ExtensionError, ExtensionHeaders};

/// Smallest addressable unit of a Track
///
/// The extension block is kept exactly as the Original Publisher encoded
/// it; anything downstream reads it through [`Object::extension_headers`]
/// and forwards the original bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    /// Owning track
    pub track: TrackName,
    /// Group within the track
    pub group_id: GroupId,
    /// Object within the group
    pub object_id: ObjectId,
    /// Encoded extension key-value pairs (no outer length prefix)
    extensions: Bytes,
    /// Opaque media payload
    pub payload: Bytes,
}

/// An Object after it entered a relay cache; shared and read-only
pub type CachedObject = Arc<Object>;

impl Object {
    /// Create an Object without extension headers
    #[must_use]
    pub fn new(
        track: impl Into<TrackName>,
        group_id: GroupId,
        object_id: ObjectId,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            track: track.into(),
            group_id,
            object_id,
            extensions: Bytes::new(),
            payload: payload.into(),
        }
    }

    /// Rebuild an Object from bytes received off the wire
    #[must_use]
    pub fn from_parts(
        track: impl Into<TrackName>,
        group_id: GroupId,
        object_id: ObjectId,
        extensions: Bytes,
        payload: Bytes,
    ) -> Self {
        Self {
            track: track.into(),
            group_id,
            object_id,
            extensions,
            payload,
        }
    }

    /// Cache address of this Object
    #[must_use]
    pub fn key(&self) -> ObjectKey {
        ObjectKey {
            track: self.track.clone(),
            group_id: self.group_id,
            object_id: self.object_id,
        }
    }

    /// Encoded extension block exactly as carried on the wire
    #[must_use]
    pub fn extension_bytes(&self) -> &Bytes {
        &self.extensions
    }

    /// Parse the extension block
    ///
    /// # Errors
    ///
    /// Returns an error if the block is malformed.
    pub fn extension_headers(&self) -> Result<ExtensionHeaders, ExtensionError> {
        ExtensionHeaders::decode(&self.extensions)
    }

    /// Replace the extension block. Only the owner of the Object can do this.
    ///
    /// # Errors
    ///
    /// Returns an error if the headers cannot be encoded.
    pub fn set_extension_headers(
        &mut self,
        headers: &ExtensionHeaders,
    ) -> Result<(), ExtensionError> {
        self.extensions = headers.encode()?;
        Ok(())
    }

    /// Read TARGET_PLAYTIME, if present
    ///
    /// # Errors
    ///
    /// Returns an error for malformed blocks, duplicates or a wrong length.
    pub fn target_playtime(&self) -> Result<Option<i64>, ExtensionError> {
        self.extension_headers()?.target_playtime()
    }
}
