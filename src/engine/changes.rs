use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

/// Snapshot map key: a hotel plus the room type the query was scoped to
/// (`None` = whole hotel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotKey {
    pub hotel_id: Ulid,
    pub room_type: Option<RoomType>,
}

impl From<&AvailabilityQuery> for SnapshotKey {
    fn from(q: &AvailabilityQuery) -> Self {
        Self {
            hotel_id: q.hotel_id,
            room_type: q.room_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySnapshot {
    pub statistics: Statistics,
    pub available_by_type: BTreeMap<RoomType, u32>,
    pub taken_at: DateTime<Utc>,
}

impl AvailabilitySnapshot {
    pub fn of(result: &AvailabilityResult, taken_at: DateTime<Utc>) -> Self {
        Self {
            statistics: result.statistics,
            available_by_type: result
                .room_types
                .iter()
                .map(|t| (t.room_type, t.available))
                .collect(),
            taken_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl Impact {
    pub fn classify(rooms_added: u32, rooms_removed: u32, occupancy_delta: f64) -> Self {
        let occupancy_swing = occupancy_delta.abs();
        if rooms_removed > HIGH_IMPACT_ROOMS_REMOVED || occupancy_swing > HIGH_IMPACT_OCCUPANCY_DELTA {
            Impact::High
        } else if rooms_removed > MEDIUM_IMPACT_ROOMS_DELTA
            || rooms_added > MEDIUM_IMPACT_ROOMS_DELTA
            || occupancy_swing > MEDIUM_IMPACT_OCCUPANCY_DELTA
        {
            Impact::Medium
        } else {
            Impact::Low
        }
    }
}

/// Difference between two consecutive snapshots of one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityChange {
    pub key: SnapshotKey,
    pub rooms_added: u32,
    pub rooms_removed: u32,
    /// New occupancy rate minus the previous one, in percentage points.
    pub occupancy_delta: f64,
    /// Available-count delta, only for types whose count moved.
    pub type_deltas: BTreeMap<RoomType, i64>,
    pub has_changes: bool,
    pub impact: Impact,
    pub previous: Statistics,
    pub current: Statistics,
    pub previous_taken_at: DateTime<Utc>,
    pub taken_at: DateTime<Utc>,
}

pub fn diff(key: SnapshotKey, previous: &AvailabilitySnapshot, current: &AvailabilitySnapshot) -> AvailabilityChange {
    let available_delta =
        i64::from(current.statistics.total_available) - i64::from(previous.statistics.total_available);
    let rooms_added = available_delta.max(0) as u32;
    let rooms_removed = (-available_delta).max(0) as u32;
    let occupancy_delta =
        ((current.statistics.occupancy_rate - previous.statistics.occupancy_rate) * 100.0).round() / 100.0;

    let mut type_deltas = BTreeMap::new();
    let types = previous.available_by_type.keys().chain(current.available_by_type.keys());
    for &room_type in types {
        let before = previous.available_by_type.get(&room_type).copied().unwrap_or(0);
        let after = current.available_by_type.get(&room_type).copied().unwrap_or(0);
        if before != after {
            type_deltas.insert(room_type, i64::from(after) - i64::from(before));
        }
    }

    let has_changes = available_delta != 0 || occupancy_delta != 0.0 || !type_deltas.is_empty();
    AvailabilityChange {
        key,
        rooms_added,
        rooms_removed,
        occupancy_delta,
        type_deltas,
        has_changes,
        impact: Impact::classify(rooms_added, rooms_removed, occupancy_delta),
        previous: previous.statistics,
        current: current.statistics,
        previous_taken_at: previous.taken_at,
        taken_at: current.taken_at,
    }
}

struct Tracked {
    snapshot: AvailabilitySnapshot,
    seq: u64,
}

#[derive(Default)]
struct Snapshots {
    by_key: HashMap<SnapshotKey, Tracked>,
    /// Observation order. A record is live only while its seq matches the entry's.
    order: VecDeque<(SnapshotKey, u64)>,
    next_seq: u64,
}

impl Snapshots {
    fn evict_least_recent(&mut self) -> Option<SnapshotKey> {
        while let Some((key, seq)) = self.order.pop_front() {
            if self.by_key.get(&key).is_some_and(|t| t.seq == seq) {
                self.by_key.remove(&key);
                return Some(key);
            }
        }
        None
    }

    fn compact_order(&mut self) {
        if self.order.len() > 2 * self.by_key.len() + 16 {
            let by_key = &self.by_key;
            self.order
                .retain(|(key, seq)| by_key.get(key).is_some_and(|t| t.seq == *seq));
        }
    }
}

/// Last fresh snapshot per (hotel, scope), owned by one engine. Holds at most
/// `max_entries` scopes; the least recently observed one goes first.
pub struct ChangeDetector {
    inner: Mutex<Snapshots>,
    max_entries: usize,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_MAX_ENTRIES)
    }
}

impl ChangeDetector {
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Snapshots::default()),
            max_entries: max_entries.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Snapshots> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("snapshot map lock poisoned, forgetting history");
                let mut guard = poisoned.into_inner();
                *guard = Snapshots::default();
                self.inner.clear_poison();
                guard
            }
        }
    }

    /// Record `result` as the latest snapshot of its key and diff it against
    /// the previous one. `None` on first observation.
    pub fn observe(&self, result: &AvailabilityResult, now: DateTime<Utc>) -> Option<AvailabilityChange> {
        let key = SnapshotKey::from(&result.query);
        let current = AvailabilitySnapshot::of(result, now);

        let mut inner = self.lock();
        if !inner.by_key.contains_key(&key)
            && inner.by_key.len() >= self.max_entries
            && let Some(evicted) = inner.evict_least_recent()
        {
            debug!(hotel_id = %evicted.hotel_id, "snapshot map full, dropped least recent scope");
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.push_back((key, seq));
        let previous = inner.by_key.insert(
            key,
            Tracked {
                snapshot: current.clone(),
                seq,
            },
        );
        inner.compact_order();
        drop(inner);

        let previous = previous?.snapshot;
        Some(diff(key, &previous, &current))
    }

    pub fn snapshot(&self, key: &SnapshotKey) -> Option<AvailabilitySnapshot> {
        self.lock().by_key.get(key).map(|t| t.snapshot.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
