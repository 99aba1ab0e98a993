//! Wire formats
//!
//! QUIC varints, the generic object extension block, and the
//! TARGET_PLAYTIME extension built on top of it.

pub mod extension;
pub mod playtime;
pub mod varint;

#[cfg(test)]
mod tests;

pub use extension::{ExtensionError, ExtensionHeader, ExtensionHeaders, ExtensionValue};
pub use playtime::TARGET_PLAYTIME;
pub use varint::VarintError;
