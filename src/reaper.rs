use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::engine::Engine;

/// Background task that periodically drops expired cache entries.
pub async fn run_cache_sweeper(engine: Arc<Engine>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    // first tick fires immediately
    interval.tick().await;
    loop {
        interval.tick().await;
        let purged = engine.purge_expired();
        if purged > 0 {
            debug!(purged, "swept expired availability results");
        }
    }
}
