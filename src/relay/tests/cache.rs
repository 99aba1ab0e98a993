use std::sync::Arc;

use bytes::Bytes;

use crate::relay::ObjectCache;
use crate::testing::{plain_object, stamped_object};
use crate::types::{GroupId, Object, ObjectId, TrackName};

#[tokio::test]
async fn test_first_write_wins() {
    let cache = ObjectCache::new(4);
    let first = cache.insert(stamped_object("audio", 0, 0, 10)).await;
    assert!(!first.duplicate);

    let mut second = stamped_object("audio", 0, 0, 20);
    second.payload = Bytes::from_static(b"other");
    let again = cache.insert(second).await;

    assert!(again.duplicate);
    assert!(Arc::ptr_eq(&first.object, &again.object));
    assert_eq!(again.object.target_playtime(), Ok(Some(10)));
}

#[tokio::test]
async fn test_oldest_groups_evicted() {
    let cache = ObjectCache::new(2);
    let track = TrackName::new("video");

    cache.insert(plain_object("video", 1, 0)).await;
    cache.insert(plain_object("video", 1, 1)).await;
    cache.insert(plain_object("video", 2, 0)).await;
    let third = cache.insert(plain_object("video", 3, 0)).await;

    assert_eq!(third.evicted, 2);
    assert_eq!(cache.group_count(&track).await, 2);
    assert!(cache.get(&plain_object("video", 1, 0).key()).await.is_none());
    assert!(cache.get(&plain_object("video", 3, 0).key()).await.is_some());
}

#[tokio::test]
async fn test_objects_in_group_then_object_order() {
    let cache = ObjectCache::new(8);
    for (g, o) in [(2, 1), (1, 5), (2, 0), (1, 0)] {
        cache.insert(plain_object("audio", g, o)).await;
    }

    let order: Vec<(GroupId, ObjectId)> = cache
        .objects(&TrackName::new("audio"))
        .await
        .iter()
        .map(|o| (o.group_id, o.object_id))
        .collect();
    assert_eq!(
        order,
        vec![
            (GroupId(1), ObjectId(0)),
            (GroupId(1), ObjectId(5)),
            (GroupId(2), ObjectId(0)),
            (GroupId(2), ObjectId(1)),
        ]
    );
}

#[tokio::test]
async fn test_tracks_are_independent() {
    let cache = ObjectCache::new(1);
    cache.insert(plain_object("audio", 1, 0)).await;
    cache.insert(plain_object("video", 2, 0)).await;

    assert_eq!(cache.remove_track(&TrackName::new("audio")).await, 1);
    assert_eq!(cache.objects(&TrackName::new("audio")).await.len(), 0);
    assert_eq!(cache.objects(&TrackName::new("video")).await.len(), 1);
}

#[tokio::test]
async fn test_cached_object_is_unchanged() {
    let cache = ObjectCache::new(1);
    let original: Object = stamped_object("audio", 0, 0, 123);
    let bytes = original.extension_bytes().clone();

    let inserted = cache.insert(original.clone()).await;
    assert_eq!(*inserted.object, original);
    assert_eq!(inserted.object.extension_bytes(), &bytes);
}
