//! Availability engine: conflict resolution, room classification, allocation,
//! result caching, change detection and inventory alerts for one process.
//!
//! Results are advisory. Between a check and the write that books the
//! recommended rooms, another caller can be told the same rooms are free; the
//! persistence layer must guard the booking write itself (e.g. a conditional
//! insert keyed on room and stay).

mod alerts;
mod allocation;
mod alternatives;
mod cache;
mod changes;
mod classify;
mod conflict;
mod error;
mod queries;
mod validate;

pub use alerts::{evaluate as evaluate_alerts, Alert, Severity};
pub use allocation::{allocate, Allocation};
pub use alternatives::suggest as suggest_alternatives;
pub use cache::{CacheStats, QuerySignature, ResultCache};
pub use changes::{diff as diff_snapshots, AvailabilityChange, AvailabilitySnapshot, ChangeDetector, Impact, SnapshotKey};
pub use classify::{classify, percentage, statistics};
pub use conflict::{classify_overlap, find_conflicts, occupied_rooms, Conflict, ConflictKind};
pub use error::{EngineError, ValidationError};
pub use validate::{parse_request, validate_query};

use std::sync::Arc;

use ulid::Ulid;

use crate::config::EngineConfig;
use crate::model::AvailabilityResult;
use crate::notify::Notice;
use crate::source::{BookingSource, RoomSource};

/// What a check hands back: the result, whether it came from the cache, and
/// the notices the caller should dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailabilityOutcome {
    pub result: AvailabilityResult,
    pub from_cache: bool,
    pub notices: Vec<Notice>,
}

pub struct Engine {
    rooms: Arc<dyn RoomSource>,
    bookings: Arc<dyn BookingSource>,
    cache: ResultCache,
    detector: ChangeDetector,
    config: EngineConfig,
}

impl Engine {
    pub fn new(rooms: Arc<dyn RoomSource>, bookings: Arc<dyn BookingSource>, config: EngineConfig) -> Self {
        Self {
            rooms,
            bookings,
            cache: ResultCache::new(config.cache_ttl, config.cache_max_entries),
            detector: ChangeDetector::new(config.snapshot_max_entries),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Forget every memoized result of a hotel. Call after any booking
    /// create/cancel/check-in or room block/unblock.
    pub fn invalidate(&self, hotel_id: Ulid) -> usize {
        let removed = self.cache.invalidate(hotel_id);
        tracing::debug!(%hotel_id, removed, "invalidated cached availability");
        removed
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn purge_expired(&self) -> usize {
        self.cache.purge_expired()
    }

    pub fn snapshot(&self, key: &SnapshotKey) -> Option<AvailabilitySnapshot> {
        self.detector.snapshot(key)
    }
}
