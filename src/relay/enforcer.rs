//! Relay invariant enforcement and subscriber fan-out

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, mpsc};

use super::cache::{CacheInsert, ObjectCache};
use super::{RelayConfig, RelayStats};
use crate::error::{PlaytimeError, Result};
use crate::protocol::{ExtensionError, playtime};
use crate::types::{CachedObject, GroupId, Object, ObjectId, TrackName};

/// Identifies one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Result of handing an Object to one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forwarded {
    /// Queued for the subscriber
    Delivered,
    /// Queue full; skipped for this subscriber
    Lagged,
    /// Subscriber is gone (or unknown) and has been pruned
    Closed,
}

#[derive(Debug)]
struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<CachedObject>,
}

/// Receiving end of [`Relay::subscribe`]
///
/// Yields the cached backlog first, then live Objects, without repeating
/// anything that was both replayed and published during subscription.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    track: TrackName,
    backlog: VecDeque<CachedObject>,
    replayed: HashSet<(GroupId, ObjectId)>,
    rx: mpsc::Receiver<CachedObject>,
}

impl Subscription {
    /// Subscription id, for [`Relay::forward`]
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Subscribed track
    #[must_use]
    pub fn track(&self) -> &TrackName {
        &self.track
    }

    /// Next Object, or `None` once the relay closed this subscription
    pub async fn recv(&mut self) -> Option<CachedObject> {
        if let Some(object) = self.backlog.pop_front() {
            return Some(object);
        }
        loop {
            let object = self.rx.recv().await?;
            if !self.is_replayed(&object) {
                return Some(object);
            }
        }
    }

    /// Next Object if one is ready
    pub fn try_recv(&mut self) -> Option<CachedObject> {
        if let Some(object) = self.backlog.pop_front() {
            return Some(object);
        }
        loop {
            let object = self.rx.try_recv().ok()?;
            if !self.is_replayed(&object) {
                return Some(object);
            }
        }
    }

    /// Turn into a plain channel, e.g. for
    /// [`TrackPlayout::run`](crate::consumer::TrackPlayout::run).
    ///
    /// Spawns a forwarding task when a backlog is still pending.
    #[must_use]
    pub fn into_receiver(mut self) -> mpsc::Receiver<CachedObject> {
        if self.backlog.is_empty() && self.replayed.is_empty() {
            return self.rx;
        }
        let (tx, rx) = mpsc::channel(self.backlog.len().max(1));
        tokio::spawn(async move {
            while let Some(object) = self.recv().await {
                if tx.send(object).await.is_err() {
                    break;
                }
            }
        });
        rx
    }

    fn is_replayed(&mut self, object: &CachedObject) -> bool {
        self.replayed.remove(&(object.group_id, object.object_id))
    }
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    duplicates: AtomicU64,
    evicted: AtomicU64,
    rejected: AtomicU64,
    lagged: AtomicU64,
    malformed_tracks: AtomicU64,
}

/// Validating, caching, fan-out relay
#[derive(Debug)]
pub struct Relay {
    config: RelayConfig,
    cache: ObjectCache,
    subscribers: RwLock<HashMap<TrackName, Vec<Subscriber>>>,
    malformed: RwLock<HashSet<TrackName>>,
    next_id: AtomicU64,
    counters: Counters,
}

impl Relay {
    /// Create an empty relay
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        Self {
            cache: ObjectCache::new(config.max_groups_per_track),
            config,
            subscribers: RwLock::new(HashMap::new()),
            malformed: RwLock::new(HashSet::new()),
            next_id: AtomicU64::new(1),
            counters: Counters::default(),
        }
    }

    /// Settings in use
    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// The underlying cache
    #[must_use]
    pub fn cache(&self) -> &ObjectCache {
        &self.cache
    }

    /// Validate TARGET_PLAYTIME and store the Object.
    ///
    /// Duplicate keys return the entry cached first.
    ///
    /// # Errors
    ///
    /// - [`PlaytimeError::ProtocolViolation`] if the extension is duplicated,
    ///   not 8 bytes, undecodable or missing where required. The Track is
    ///   marked malformed and its subscriptions are closed.
    /// - [`PlaytimeError::TrackRejected`] for any Object on a malformed Track.
    pub async fn validate_and_cache(&self, object: Object) -> Result<CachedObject> {
        self.admit(object).await.map(|inserted| inserted.object)
    }

    /// Hand `object` to one subscriber without waiting
    pub async fn forward(&self, subscriber: SubscriberId, object: &CachedObject) -> Forwarded {
        let outcome = {
            let subscribers = self.subscribers.read().await;
            let Some(sub) = subscribers
                .get(&object.track)
                .and_then(|subs| subs.iter().find(|s| s.id == subscriber))
            else {
                return Forwarded::Closed;
            };
            self.try_deliver(sub, object)
        };

        if outcome == Forwarded::Closed {
            self.prune(&object.track, &[subscriber]).await;
        }
        outcome
    }

    /// Validate, cache and forward to every subscriber of the Track
    ///
    /// Returns the cached entry. A duplicate is not forwarded again.
    ///
    /// # Errors
    ///
    /// See [`Relay::validate_and_cache`].
    pub async fn publish(&self, object: Object) -> Result<CachedObject> {
        let inserted = self.admit(object).await?;
        let cached = inserted.object;
        if inserted.duplicate {
            tracing::debug!(object = %cached.key(), "Duplicate object, not forwarding");
            return Ok(cached);
        }

        let mut closed = Vec::new();
        {
            let subscribers = self.subscribers.read().await;
            for sub in subscribers.get(&cached.track).into_iter().flatten() {
                if self.try_deliver(sub, &cached) == Forwarded::Closed {
                    closed.push(sub.id);
                }
            }
        }
        if !closed.is_empty() {
            self.prune(&cached.track, &closed).await;
        }
        Ok(cached)
    }

    /// Subscribe to `track`, replaying its cached Objects first
    ///
    /// # Errors
    ///
    /// Returns [`PlaytimeError::TrackRejected`] for a malformed Track.
    pub async fn subscribe(&self, track: impl Into<TrackName>) -> Result<Subscription> {
        let track = track.into();
        let mut subscribers = self.subscribers.write().await;
        if self.malformed.read().await.contains(&track) {
            return Err(PlaytimeError::TrackRejected { track });
        }

        let backlog: VecDeque<CachedObject> = self.cache.objects(&track).await.into();
        let replayed = backlog
            .iter()
            .map(|o| (o.group_id, o.object_id))
            .collect();

        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.config.subscriber_queue_depth.max(1));
        subscribers
            .entry(track.clone())
            .or_default()
            .push(Subscriber { id, tx });

        tracing::info!(
            track = %track,
            subscriber = %id,
            replay = backlog.len(),
            "New subscription"
        );
        Ok(Subscription {
            id,
            track,
            backlog,
            replayed,
            rx,
        })
    }

    /// Whether `track` has been marked malformed
    pub async fn is_malformed(&self, track: &TrackName) -> bool {
        self.malformed.read().await.contains(track)
    }

    /// Number of live subscriptions on `track`
    pub async fn subscriber_count(&self, track: &TrackName) -> usize {
        self.subscribers.read().await.get(track).map_or(0, Vec::len)
    }

    /// Counter snapshot
    #[must_use]
    pub fn stats(&self) -> RelayStats {
        let c = &self.counters;
        RelayStats {
            accepted: c.accepted.load(Ordering::Relaxed),
            duplicates: c.duplicates.load(Ordering::Relaxed),
            evicted: c.evicted.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            lagged: c.lagged.load(Ordering::Relaxed),
            malformed_tracks: c.malformed_tracks.load(Ordering::Relaxed),
        }
    }

    async fn admit(&self, object: Object) -> Result<CacheInsert> {
        // Held until the insert lands so `mark_malformed` purges after it.
        let malformed = self.malformed.read().await;
        if malformed.contains(&object.track) {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(PlaytimeError::TrackRejected {
                track: object.track,
            });
        }

        if let Err(source) = self.check(&object) {
            drop(malformed);
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            self.mark_malformed(&object.track).await;
            tracing::warn!(object = %object.key(), "Protocol violation: {source}");
            return Err(PlaytimeError::ProtocolViolation {
                track: object.track,
                source,
            });
        }

        let inserted = self.cache.insert(object).await;
        drop(malformed);
        if inserted.duplicate {
            self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.accepted.fetch_add(1, Ordering::Relaxed);
        }
        if inserted.evicted > 0 {
            self.counters
                .evicted
                .fetch_add(inserted.evicted as u64, Ordering::Relaxed);
        }
        Ok(inserted)
    }

    fn check(&self, object: &Object) -> std::result::Result<(), ExtensionError> {
        let headers = object.extension_headers()?;
        let stamp = playtime::find(&headers)?;
        if stamp.is_none() && self.config.requirement.requires_stamp(object.object_id) {
            return Err(ExtensionError::Missing);
        }
        Ok(())
    }

    fn try_deliver(&self, sub: &Subscriber, object: &CachedObject) -> Forwarded {
        match sub.tx.try_send(Arc::clone(object)) {
            Ok(()) => Forwarded::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.lagged.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    subscriber = %sub.id,
                    object = %object.key(),
                    "Subscriber lagging, skipping object"
                );
                Forwarded::Lagged
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Forwarded::Closed,
        }
    }

    async fn prune(&self, track: &TrackName, ids: &[SubscriberId]) {
        let mut subscribers = self.subscribers.write().await;
        if let Some(subs) = subscribers.get_mut(track) {
            subs.retain(|s| !ids.contains(&s.id));
            if subs.is_empty() {
                subscribers.remove(track);
            }
        }
        tracing::debug!(track = %track, pruned = ids.len(), "Pruned closed subscribers");
    }

    async fn mark_malformed(&self, track: &TrackName) {
        if !self.malformed.write().await.insert(track.clone()) {
            return;
        }
        self.counters.malformed_tracks.fetch_add(1, Ordering::Relaxed);

        let closed = self
            .subscribers
            .write()
            .await
            .remove(track)
            .map_or(0, |subs| subs.len());
        let purged = self.cache.remove_track(track).await;
        tracing::warn!(
            track = %track,
            closed_subscriptions = closed,
            purged_objects = purged,
            "Track marked malformed"
        );
    }
}
