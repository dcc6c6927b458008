use std::sync::Arc;

use tracing::debug;
use ulid::Ulid;

use crate::engine::{AvailabilityOutcome, CacheStats, Engine, EngineError, Severity};
use crate::model::AvailabilityRequest;
use crate::notify::{Notice, NotifierGateway};
use crate::observability;

/// Runs the engine and dispatches its notices. The engine decides, this
/// layer performs the side effects.
pub struct AvailabilityService {
    engine: Arc<Engine>,
    gateway: Arc<dyn NotifierGateway>,
}

impl AvailabilityService {
    pub fn new(engine: Arc<Engine>, gateway: Arc<dyn NotifierGateway>) -> Self {
        Self { engine, gateway }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub async fn check_availability(
        &self,
        request: &AvailabilityRequest,
    ) -> Result<AvailabilityOutcome, EngineError> {
        let query = self.engine.parse(request)?;
        match self.engine.check(query.clone()).await {
            Ok(outcome) => {
                if query.broadcast {
                    self.dispatch(&outcome.notices);
                }
                Ok(outcome)
            }
            Err(e) => {
                if e.is_data_source() {
                    self.dispatch_admin(&Notice::DataSourceFailure {
                        hotel_id: query.hotel_id,
                        error_kind: e.kind().to_string(),
                        error: e.to_string(),
                        query,
                    });
                }
                Err(e)
            }
        }
    }

    pub fn invalidate(&self, hotel_id: Ulid) -> usize {
        self.engine.invalidate(hotel_id)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.engine.cache_stats()
    }

    /// Hotel notices go to the hotel channel; critical alerts are copied to admins.
    fn dispatch(&self, notices: &[Notice]) {
        for notice in notices {
            debug!(event = notice.event_type(), hotel_id = %notice.hotel_id(), "dispatching notice");
            self.gateway.publish_hotel_event(notice.hotel_id(), notice);
            metrics::counter!(observability::NOTICES_DISPATCHED_TOTAL, "channel" => "hotel").increment(1);
            if matches!(notice, Notice::InventoryAlert { severity: Severity::Critical, .. }) {
                self.dispatch_admin(notice);
            }
        }
    }

    fn dispatch_admin(&self, notice: &Notice) {
        self.gateway.publish_admin_event(notice);
        metrics::counter!(observability::NOTICES_DISPATCHED_TOTAL, "channel" => "admin").increment(1);
    }
}
