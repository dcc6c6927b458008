use std::time::Duration;

/// Freshness window for memoized availability results.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Entry count at which the result cache starts evicting.
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 1000;

/// Change-detector scopes kept before the least recently observed is dropped.
pub const DEFAULT_SNAPSHOT_MAX_ENTRIES: usize = 1000;

/// Share of the cache (oldest first) dropped when it is full.
pub const CACHE_EVICT_FRACTION: usize = 5; // 1/5 = 20%

pub const DEFAULT_MAX_ROOMS_PER_BOOKING: u32 = 10;
pub const MAX_ROOMS_PER_BOOKING_CEILING: u32 = 100;

pub const DEFAULT_MAX_STAY_NIGHTS: i64 = 30;
pub const MAX_STAY_NIGHTS_CEILING: i64 = 365;

pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Longest request line accepted by the line protocol.
pub const MAX_LINE_BYTES: usize = 16 * 1024;

/// Buffered notices per listen channel before slow receivers start lagging.
pub const NOTIFY_CHANNEL_CAPACITY: usize = 256;

// ── Alert thresholds (percentages) ───────────────────────────────

pub const LOW_AVAILABILITY_RATE: f64 = 10.0;
pub const HIGH_DEMAND_OCCUPANCY_RATE: f64 = 85.0;

// ── Change impact thresholds ─────────────────────────────────────

pub const HIGH_IMPACT_ROOMS_REMOVED: u32 = 10;
pub const HIGH_IMPACT_OCCUPANCY_DELTA: f64 = 25.0;
pub const MEDIUM_IMPACT_ROOMS_DELTA: u32 = 5;
pub const MEDIUM_IMPACT_OCCUPANCY_DELTA: f64 = 10.0;
