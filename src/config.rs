use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::limits::*;

/// Knobs the engine itself consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
    pub snapshot_max_entries: usize,
    pub max_rooms_per_booking: u32,
    pub max_stay_nights: i64,
    pub source_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            snapshot_max_entries: DEFAULT_SNAPSHOT_MAX_ENTRIES,
            max_rooms_per_booking: DEFAULT_MAX_ROOMS_PER_BOOKING,
            max_stay_nights: DEFAULT_MAX_STAY_NIGHTS,
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
        }
    }
}

/// Process configuration, read from `ROOMGRID_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub max_connections: usize,
    pub fixture: Option<PathBuf>,
    pub metrics_port: Option<u16>,
    pub sweep_interval: Duration,
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());

        let engine = EngineConfig {
            cache_ttl: parsed("ROOMGRID_CACHE_TTL_SECS")
                .map_or(DEFAULT_CACHE_TTL, Duration::from_secs),
            cache_max_entries: parse_or(&lookup, "ROOMGRID_CACHE_MAX_ENTRIES", DEFAULT_CACHE_MAX_ENTRIES)
                .max(1),
            snapshot_max_entries: parse_or(&lookup, "ROOMGRID_SNAPSHOT_MAX_ENTRIES", DEFAULT_SNAPSHOT_MAX_ENTRIES)
                .max(1),
            max_rooms_per_booking: parse_or(
                &lookup,
                "ROOMGRID_MAX_ROOMS_PER_BOOKING",
                DEFAULT_MAX_ROOMS_PER_BOOKING,
            )
            .clamp(1, MAX_ROOMS_PER_BOOKING_CEILING),
            max_stay_nights: parse_or(&lookup, "ROOMGRID_MAX_STAY_NIGHTS", DEFAULT_MAX_STAY_NIGHTS)
                .clamp(1, MAX_STAY_NIGHTS_CEILING),
            source_timeout: parsed("ROOMGRID_SOURCE_TIMEOUT_MS")
                .map_or(DEFAULT_SOURCE_TIMEOUT, Duration::from_millis),
        };

        Self {
            bind: lookup("ROOMGRID_BIND").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&lookup, "ROOMGRID_PORT", 7410),
            max_connections: parse_or(&lookup, "ROOMGRID_MAX_CONNECTIONS", 256),
            fixture: lookup("ROOMGRID_FIXTURE").map(PathBuf::from),
            metrics_port: lookup("ROOMGRID_METRICS_PORT").and_then(|s| s.parse().ok()),
            sweep_interval: parsed("ROOMGRID_SWEEP_INTERVAL_SECS")
                .filter(|&s| s > 0)
                .map_or(DEFAULT_SWEEP_INTERVAL, Duration::from_secs),
            engine,
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
