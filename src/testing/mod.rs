//! Helpers for tests: Object factories and network simulation

pub mod network_sim;

#[cfg(test)]
mod tests;

use bytes::Bytes;

pub use network_sim::NetworkSimulator;

use crate::protocol::{ExtensionHeader, ExtensionHeaders, ExtensionValue, TARGET_PLAYTIME};
use crate::types::{GroupId, Object, ObjectId, TrackName};

/// An Object with no extension headers
#[must_use]
pub fn plain_object(track: impl Into<TrackName>, group: u64, object: u64) -> Object {
    Object::new(
        track,
        GroupId(group),
        ObjectId(object),
        Bytes::from(format!("g{group}o{object}")),
    )
}

/// An Object carrying a single TARGET_PLAYTIME
#[must_use]
pub fn stamped_object(
    track: impl Into<TrackName>,
    group: u64,
    object: u64,
    target_playtime_ns: i64,
) -> Object {
    let mut headers = ExtensionHeaders::new();
    headers.set_target_playtime(target_playtime_ns);
    with_headers(plain_object(track, group, object), &headers)
}

/// An Object carrying two TARGET_PLAYTIME instances
#[must_use]
pub fn duplicate_playtime_object(
    track: impl Into<TrackName>,
    group: u64,
    object: u64,
    first_ns: i64,
    second_ns: i64,
) -> Object {
    let mut headers = ExtensionHeaders::new();
    for ts in [first_ns, second_ns] {
        headers.push(playtime_header(&ts.to_be_bytes()));
    }
    with_headers(plain_object(track, group, object), &headers)
}

/// An Object whose TARGET_PLAYTIME value is `value.len()` bytes long
#[must_use]
pub fn malformed_playtime_object(
    track: impl Into<TrackName>,
    group: u64,
    object: u64,
    value: &[u8],
) -> Object {
    let mut headers = ExtensionHeaders::new();
    headers.push(playtime_header(value));
    with_headers(plain_object(track, group, object), &headers)
}

fn playtime_header(value: &[u8]) -> ExtensionHeader {
    ExtensionHeader {
        kind: TARGET_PLAYTIME,
        value: ExtensionValue::Bytes(Bytes::copy_from_slice(value)),
    }
}

fn with_headers(object: Object, headers: &ExtensionHeaders) -> Object {
    let encoded = match headers.encode() {
        Ok(bytes) => bytes,
        Err(e) => unreachable!("factory headers always encode: {e}"),
    };
    Object::from_parts(
        object.track,
        object.group_id,
        object.object_id,
        encoded,
        object.payload,
    )
}
