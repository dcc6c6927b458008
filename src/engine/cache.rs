use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};
use ulid::Ulid;

use crate::limits::CACHE_EVICT_FRACTION;
use crate::model::*;
use crate::observability;

/// Everything that changes the answer to a query. The broadcast flag is left
/// out on purpose: it only decides side effects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuerySignature {
    pub hotel_id: Ulid,
    pub room_type: Option<RoomType>,
    pub stay: DateSpan,
    pub rooms_needed: u32,
    pub exclude_booking_id: Option<Ulid>,
    pub include_unavailable: bool,
}

impl From<&AvailabilityQuery> for QuerySignature {
    fn from(q: &AvailabilityQuery) -> Self {
        Self {
            hotel_id: q.hotel_id,
            room_type: q.room_type,
            stay: q.stay,
            rooms_needed: q.rooms_needed,
            exclude_booking_id: q.exclude_booking_id,
            include_unavailable: q.include_unavailable,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub invalidations: u64,
}

/// Invalidation token. A result may only be cached if the token taken before
/// its data was read is still current when it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation {
    epoch: u64,
    hotel: u64,
}

struct CacheEntry {
    result: AvailabilityResult,
    written_at: Instant,
    seq: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<QuerySignature, CacheEntry>,
    /// Insertion order. A record is live only while its seq matches the entry's.
    order: VecDeque<(QuerySignature, u64)>,
    next_seq: u64,
    /// Invalidation count per hotel, reset (with an epoch bump) when it outgrows the cap.
    generations: HashMap<Ulid, u64>,
    epoch: u64,
    stats: CacheStats,
}

impl Inner {
    fn compact_order(&mut self) {
        if self.order.len() > 2 * self.entries.len() + 16 {
            let entries = &self.entries;
            self.order
                .retain(|(sig, seq)| entries.get(sig).is_some_and(|e| e.seq == *seq));
        }
    }

    fn generation(&self, hotel_id: Ulid) -> Generation {
        Generation {
            epoch: self.epoch,
            hotel: self.generations.get(&hotel_id).copied().unwrap_or(0),
        }
    }

    fn publish_len(&self) {
        metrics::gauge!(observability::CACHE_ENTRIES).set(self.entries.len() as f64);
    }

    fn evict_oldest(&mut self, count: usize) -> usize {
        let mut evicted = 0;
        while evicted < count {
            let Some((sig, seq)) = self.order.pop_front() else {
                break;
            };
            if self.entries.get(&sig).is_some_and(|e| e.seq == seq) {
                self.entries.remove(&sig);
                evicted += 1;
            }
        }
        evicted
    }
}

/// Bounded, time-boxed memo of availability results owned by one engine.
///
/// Best effort: a poisoned lock drops the contents and behaves as empty.
pub struct ResultCache {
    inner: Mutex<Inner>,
    ttl: Duration,
    max_entries: usize,
}

impl ResultCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("result cache lock poisoned, dropping all entries");
                let mut guard = poisoned.into_inner();
                let stats = guard.stats;
                let epoch = guard.epoch + 1;
                *guard = Inner {
                    stats,
                    epoch,
                    ..Inner::default()
                };
                guard.publish_len();
                self.inner.clear_poison();
                guard
            }
        }
    }

    /// Fresh hit or miss. A stale entry is removed on the way out.
    pub fn get(&self, signature: &QuerySignature) -> Option<AvailabilityResult> {
        let mut inner = self.lock();
        let is_fresh = inner
            .entries
            .get(signature)
            .map(|entry| entry.written_at.elapsed() < self.ttl);
        let fresh = match is_fresh {
            Some(true) => inner.entries.get(signature).map(|entry| entry.result.clone()),
            Some(false) => {
                inner.entries.remove(signature);
                inner.compact_order();
                inner.publish_len();
                None
            }
            None => None,
        };
        if fresh.is_some() {
            inner.stats.hits += 1;
            metrics::counter!(observability::CACHE_HITS_TOTAL).increment(1);
        } else {
            inner.stats.misses += 1;
            metrics::counter!(observability::CACHE_MISSES_TOTAL).increment(1);
        }
        fresh
    }

    /// Token to pass to [`put`](Self::put) for a computation about to read `hotel_id`.
    pub fn generation(&self, hotel_id: Ulid) -> Generation {
        self.lock().generation(hotel_id)
    }

    /// Store a result computed under `observed`. Skipped (returns false) when
    /// the hotel was invalidated after `observed` was taken.
    pub fn put(&self, signature: QuerySignature, result: AvailabilityResult, observed: Generation) -> bool {
        let mut inner = self.lock();
        if inner.generation(signature.hotel_id) != observed {
            debug!(hotel_id = %signature.hotel_id, "hotel invalidated during computation, result not cached");
            return false;
        }
        if !inner.entries.contains_key(&signature) && inner.entries.len() >= self.max_entries {
            let batch = (inner.entries.len() / CACHE_EVICT_FRACTION).max(1);
            let evicted = inner.evict_oldest(batch);
            inner.stats.evictions += evicted as u64;
            metrics::counter!(observability::CACHE_EVICTIONS_TOTAL).increment(evicted as u64);
            debug!(evicted, "result cache full, evicted oldest entries");
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.push_back((signature.clone(), seq));
        inner.entries.insert(
            signature,
            CacheEntry {
                result,
                written_at: Instant::now(),
                seq,
            },
        );
        inner.compact_order();
        inner.publish_len();
        true
    }

    /// Drop every entry of a hotel. Returns how many were removed.
    pub fn invalidate(&self, hotel_id: Ulid) -> usize {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|sig, _| sig.hotel_id != hotel_id);
        inner.order.retain(|(sig, _)| sig.hotel_id != hotel_id);
        let removed = before - inner.entries.len();
        inner.stats.invalidations += 1;
        if !inner.generations.contains_key(&hotel_id) && inner.generations.len() >= self.max_entries {
            inner.generations.clear();
            inner.epoch += 1;
        }
        *inner.generations.entry(hotel_id).or_insert(0) += 1;
        inner.publish_len();
        removed
    }

    /// Drop every entry older than the TTL. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.lock();
        let before = inner.entries.len();
        let ttl = self.ttl;
        inner.entries.retain(|_, e| e.written_at.elapsed() < ttl);
        inner.compact_order();
        let removed = before - inner.entries.len();
        inner.publish_len();
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entry_count: inner.entries.len(),
            ..inner.stats
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const TTL: Duration = Duration::from_secs(300);

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn query(hotel_id: Ulid, rooms_needed: u32) -> AvailabilityQuery {
        AvailabilityQuery {
            hotel_id,
            room_type: Some(RoomType::Double),
            stay: DateSpan::new(d("2030-07-01"), d("2030-07-03")),
            rooms_needed,
            exclude_booking_id: None,
            include_unavailable: false,
            broadcast: false,
        }
    }

    fn result(q: &AvailabilityQuery) -> AvailabilityResult {
        AvailabilityResult {
            available: true,
            rooms_requested: q.rooms_needed,
            rooms_found: q.rooms_needed,
            recommended_rooms: Vec::new(),
            room_types: Vec::new(),
            statistics: Statistics {
                total_rooms: 10,
                total_available: 10,
                total_occupied: 0,
                total_unavailable: 0,
                occupancy_rate: 0.0,
                availability_rate: 100.0,
            },
            query: q.clone(),
            conflicts: 0,
            alternatives: None,
        }
    }

    fn put(cache: &ResultCache, q: &AvailabilityQuery) -> QuerySignature {
        let sig = QuerySignature::from(q);
        assert!(cache.put(sig.clone(), result(q), cache.generation(q.hotel_id)));
        sig
    }

    #[tokio::test(start_paused = true)]
    async fn hit_within_ttl_then_miss_after() {
        let cache = ResultCache::new(TTL, 100);
        let q = query(Ulid::new(), 1);
        let sig = put(&cache, &q);

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get(&sig), Some(result(&q)));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(&sig), None);
        assert!(cache.is_empty(), "stale entry removed on read");

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn broadcast_flag_shares_a_signature() {
        let q = query(Ulid::new(), 2);
        let mut loud = q.clone();
        loud.broadcast = true;
        assert_eq!(QuerySignature::from(&q), QuerySignature::from(&loud));

        let mut listed = q.clone();
        listed.include_unavailable = true;
        assert_ne!(QuerySignature::from(&q), QuerySignature::from(&listed));
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_only_touches_one_hotel() {
        let cache = ResultCache::new(TTL, 100);
        let a = Ulid::new();
        let b = Ulid::new();
        let sig_a1 = put(&cache, &query(a, 1));
        let sig_a2 = put(&cache, &query(a, 2));
        let sig_b = put(&cache, &query(b, 1));

        assert_eq!(cache.invalidate(a), 2);
        assert_eq!(cache.get(&sig_a1), None);
        assert_eq!(cache.get(&sig_a2), None);
        assert!(cache.get(&sig_b).is_some());
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn full_cache_evicts_oldest_fifth() {
        let cache = ResultCache::new(TTL, 10);
        let hotel = Ulid::new();
        let sigs: Vec<QuerySignature> = (1..=10).map(|n| put(&cache, &query(hotel, n))).collect();
        assert_eq!(cache.len(), 10);

        let newest = put(&cache, &query(hotel, 11));
        assert_eq!(cache.len(), 9);
        assert_eq!(cache.stats().evictions, 2);
        assert_eq!(cache.get(&sigs[0]), None);
        assert_eq!(cache.get(&sigs[1]), None);
        assert!(cache.get(&sigs[2]).is_some());
        assert!(cache.get(&newest).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn tiny_cache_still_evicts_one() {
        let cache = ResultCache::new(TTL, 2);
        let hotel = Ulid::new();
        let first = put(&cache, &query(hotel, 1));
        put(&cache, &query(hotel, 2));
        put(&cache, &query(hotel, 3));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&first), None);
    }

    #[tokio::test(start_paused = true)]
    async fn rewriting_a_key_refreshes_its_age_and_order() {
        let cache = ResultCache::new(TTL, 3);
        let hotel = Ulid::new();
        let a = put(&cache, &query(hotel, 1));
        let b = put(&cache, &query(hotel, 2));
        put(&cache, &query(hotel, 3));
        // rewrite `a`: it is now the newest, `b` the oldest
        put(&cache, &query(hotel, 1));
        assert_eq!(cache.len(), 3);
        put(&cache, &query(hotel, 4));
        assert_eq!(cache.get(&b), None);
        assert!(cache.get(&a).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_expired_sweeps_stale_entries() {
        let cache = ResultCache::new(TTL, 100);
        let hotel = Ulid::new();
        put(&cache, &query(hotel, 1));
        tokio::time::advance(Duration::from_secs(200)).await;
        let young = put(&cache, &query(hotel, 2));
        tokio::time::advance(Duration::from_secs(150)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&young).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn result_read_before_invalidation_is_not_cached() {
        let cache = ResultCache::new(TTL, 100);
        let a = query(Ulid::new(), 1);
        let b = query(Ulid::new(), 1);
        let token_a = cache.generation(a.hotel_id);
        let token_b = cache.generation(b.hotel_id);

        cache.invalidate(a.hotel_id);
        assert!(!cache.put(QuerySignature::from(&a), result(&a), token_a));
        assert!(cache.put(QuerySignature::from(&b), result(&b), token_b), "other hotels unaffected");
        assert_eq!(cache.len(), 1);

        put(&cache, &a);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn generation_overflow_rejects_older_tokens() {
        let cache = ResultCache::new(TTL, 2);
        let q = query(Ulid::new(), 1);
        let token = cache.generation(q.hotel_id);
        for _ in 0..3 {
            cache.invalidate(Ulid::new());
        }
        assert!(!cache.put(QuerySignature::from(&q), result(&q), token));
        put(&cache, &q);
    }

    #[tokio::test(start_paused = true)]
    async fn poisoned_lock_clears_and_keeps_working() {
        let cache = ResultCache::new(TTL, 100);
        let q = query(Ulid::new(), 1);
        let sig = put(&cache, &q);
        let token = cache.generation(q.hotel_id);

        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = cache.inner.lock().unwrap();
            panic!("writer died holding the cache lock");
        }));
        assert!(panicked.is_err());
        assert!(cache.inner.is_poisoned());

        assert_eq!(cache.get(&sig), None);
        assert!(!cache.inner.is_poisoned());
        assert!(!cache.put(sig.clone(), result(&q), token), "token from before the reset");
        put(&cache, &q);
        assert_eq!(cache.get(&sig), Some(result(&q)));
    }

    fn gauge_value(rendered: &str, name: &str) -> Option<f64> {
        rendered
            .lines()
            .find_map(|line| line.strip_prefix(name)?.strip_prefix(' ')?.trim().parse().ok())
    }

    #[test]
    fn entries_gauge_follows_stale_removal() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            let cache = ResultCache::new(Duration::ZERO, 10);
            let sig = put(&cache, &query(Ulid::new(), 1));
            assert_eq!(gauge_value(&handle.render(), observability::CACHE_ENTRIES), Some(1.0));
            assert_eq!(cache.get(&sig), None);
        });
        assert_eq!(gauge_value(&handle.render(), observability::CACHE_ENTRIES), Some(0.0));
    }
}
