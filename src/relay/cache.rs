//! Shared Object cache, written once per Object and read concurrently

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::types::{CachedObject, GroupId, Object, ObjectId, ObjectKey, TrackName};

type Groups = BTreeMap<GroupId, BTreeMap<ObjectId, CachedObject>>;

/// Outcome of [`ObjectCache::insert`]
#[derive(Debug, Clone)]
pub struct CacheInsert {
    /// The cached entry: the new Object, or the one already stored
    pub object: CachedObject,
    /// An Object with the same key was already cached
    pub duplicate: bool,
    /// Objects evicted to stay within the Group limit
    pub evicted: usize,
}

/// Per-track cache of recent Groups
#[derive(Debug)]
pub struct ObjectCache {
    max_groups_per_track: usize,
    tracks: RwLock<HashMap<TrackName, Groups>>,
}

impl ObjectCache {
    /// Create a cache keeping at most `max_groups_per_track` Groups per track
    #[must_use]
    pub fn new(max_groups_per_track: usize) -> Self {
        Self {
            max_groups_per_track: max_groups_per_track.max(1),
            tracks: RwLock::new(HashMap::new()),
        }
    }

    /// Store `object` unless its key is already present
    pub async fn insert(&self, object: Object) -> CacheInsert {
        let mut tracks = self.tracks.write().await;
        let groups = tracks.entry(object.track.clone()).or_default();
        let group = groups.entry(object.group_id).or_default();

        if let Some(existing) = group.get(&object.object_id) {
            return CacheInsert {
                object: Arc::clone(existing),
                duplicate: true,
                evicted: 0,
            };
        }

        let cached = Arc::new(object);
        group.insert(cached.object_id, Arc::clone(&cached));

        let mut evicted = 0;
        while groups.len() > self.max_groups_per_track {
            if let Some((group_id, objects)) = groups.pop_first() {
                tracing::debug!(track = %cached.track, group = %group_id, "Evicting group");
                evicted += objects.len();
            }
        }

        CacheInsert {
            object: cached,
            duplicate: false,
            evicted,
        }
    }

    /// Look up one Object
    pub async fn get(&self, key: &ObjectKey) -> Option<CachedObject> {
        let tracks = self.tracks.read().await;
        tracks
            .get(&key.track)?
            .get(&key.group_id)?
            .get(&key.object_id)
            .map(Arc::clone)
    }

    /// Every cached Object of `track` in (group, object) order
    pub async fn objects(&self, track: &TrackName) -> Vec<CachedObject> {
        let tracks = self.tracks.read().await;
        tracks.get(track).map_or_else(Vec::new, |groups| {
            groups
                .values()
                .flat_map(|objects| objects.values().map(Arc::clone))
                .collect()
        })
    }

    /// Number of Groups cached for `track`
    pub async fn group_count(&self, track: &TrackName) -> usize {
        self.tracks.read().await.get(track).map_or(0, BTreeMap::len)
    }

    /// Drop everything cached for `track`, returning the Object count
    pub async fn remove_track(&self, track: &TrackName) -> usize {
        self.tracks
            .write()
            .await
            .remove(track)
            .map_or(0, |groups| groups.values().map(BTreeMap::len).sum())
    }
}
