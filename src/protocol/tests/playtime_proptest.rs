use proptest::prelude::*;

use crate::protocol::extension::{ExtensionError, ExtensionHeaders};
use crate::protocol::playtime;

proptest! {
    #[test]
    fn test_roundtrip_any_timestamp(ts in any::<i64>()) {
        prop_assert_eq!(playtime::decode(&playtime::encode(ts)).unwrap(), ts);
    }

    #[test]
    fn test_wrong_length_always_rejected(
        value in proptest::collection::vec(any::<u8>(), 0..40usize)
            .prop_filter("length must differ from 8", |v| v.len() != 8)
    ) {
        let mut wire = vec![0x31, u8::try_from(value.len()).unwrap()];
        wire.extend_from_slice(&value);

        prop_assert_eq!(
            playtime::decode(&wire),
            Err(ExtensionError::LengthMismatch { len: value.len() })
        );
    }

    #[test]
    fn test_decode_any_bytes_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        let _ = ExtensionHeaders::decode(&bytes);
        let _ = playtime::decode(&bytes);
    }
}
