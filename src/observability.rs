use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: availability checks. Labels: outcome.
pub const CHECKS_TOTAL: &str = "roomgrid_checks_total";

/// Histogram: check latency in seconds. Labels: outcome.
pub const CHECK_DURATION_SECONDS: &str = "roomgrid_check_duration_seconds";

/// Counter: protocol requests handled. Labels: op, status.
pub const REQUESTS_TOTAL: &str = "roomgrid_requests_total";

// ── Cache ───────────────────────────────────────────────────────

pub const CACHE_HITS_TOTAL: &str = "roomgrid_cache_hits_total";
pub const CACHE_MISSES_TOTAL: &str = "roomgrid_cache_misses_total";
pub const CACHE_EVICTIONS_TOTAL: &str = "roomgrid_cache_evictions_total";

/// Gauge: memoized results currently held.
pub const CACHE_ENTRIES: &str = "roomgrid_cache_entries";

// ── Events ──────────────────────────────────────────────────────

/// Counter: inventory alerts raised. Labels: type.
pub const ALERTS_TOTAL: &str = "roomgrid_alerts_total";

/// Counter: availability change notices. Labels: impact.
pub const CHANGE_NOTICES_TOTAL: &str = "roomgrid_change_notices_total";

/// Counter: notices handed to the gateway. Labels: channel.
pub const NOTICES_DISPATCHED_TOTAL: &str = "roomgrid_notices_dispatched_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "roomgrid_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "roomgrid_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "roomgrid_connections_rejected_total";

/// Install tracing with `RUST_LOG` filtering (default `info`).
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init_metrics(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
