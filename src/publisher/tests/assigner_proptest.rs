use proptest::prelude::*;

use crate::publisher::TimingAssigner;
use crate::testing::plain_object;
use crate::types::TimingPolicy;

proptest! {
    #[test]
    fn test_per_object_values_never_decrease_within_group(
        captures in proptest::collection::vec(0i64..1_000_000_000_000, 1..64),
        delay in 0i64..1_000_000_000,
    ) {
        let mut assigner = TimingAssigner::new(TimingPolicy::PerObject, delay).unwrap();

        let mut previous = i64::MIN;
        for (i, capture) in captures.iter().enumerate() {
            let mut object = plain_object("audio", 0, i as u64);
            let stamped = assigner.assign(&mut object, *capture).unwrap().unwrap();

            prop_assert!(stamped >= previous);
            prop_assert!(stamped >= capture + delay);
            prop_assert_eq!(object.target_playtime().unwrap(), Some(stamped));
            previous = stamped;
        }
    }
}
