use std::time::Instant;

use chrono::Utc;
use tracing::{debug, warn};

use crate::model::*;
use crate::notify::Notice;
use crate::observability;
use crate::source::SourceError;

use super::alerts::evaluate;
use super::allocation::allocate;
use super::alternatives::suggest;
use super::cache::QuerySignature;
use super::classify::{classify, statistics};
use super::conflict::{find_conflicts, occupied_rooms};
use super::validate::{parse_request, validate_query};
use super::{AvailabilityOutcome, Engine, EngineError};

fn source_err(what: &str) -> impl FnOnce(SourceError) -> EngineError + '_ {
    move |e| EngineError::DataSource(format!("{what}: {e}"))
}

/// Per-type breakdown of one roster scope plus the conflicts behind it.
struct Classified {
    breakdown: Vec<RoomTypeAvailability>,
    conflicts: usize,
}

impl Engine {
    /// Validate a raw request and check it.
    pub async fn check_availability(
        &self,
        request: &AvailabilityRequest,
    ) -> Result<AvailabilityOutcome, EngineError> {
        let query = self.parse(request)?;
        self.check(query).await
    }

    /// Turn a raw request into a query against today's date. Rejections are
    /// counted like any other check outcome.
    pub fn parse(&self, request: &AvailabilityRequest) -> Result<AvailabilityQuery, EngineError> {
        parse_request(request, Utc::now().date_naive(), &self.config).map_err(|e| {
            record_check("validation", None);
            e.into()
        })
    }

    /// Check a typed query: cache first, fresh computation on a miss.
    pub async fn check(&self, query: AvailabilityQuery) -> Result<AvailabilityOutcome, EngineError> {
        let started = Instant::now();
        if let Err(e) = validate_query(&query, Utc::now().date_naive(), &self.config) {
            record_check("validation", None);
            return Err(e.into());
        }

        let signature = QuerySignature::from(&query);
        if let Some(mut result) = self.cache.get(&signature) {
            debug!(hotel_id = %query.hotel_id, stay = %query.stay, "availability served from cache");
            // the signature ignores the broadcast flag; report the caller's own query
            result.query = query;
            record_check("cache_hit", Some(started));
            return Ok(AvailabilityOutcome {
                result,
                from_cache: true,
                notices: Vec::new(),
            });
        }

        let generation = self.cache.generation(query.hotel_id);
        let timeout = self.config.source_timeout;
        let result = match tokio::time::timeout(timeout, self.compute(&query)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(hotel_id = %query.hotel_id, stay = %query.stay, "availability check failed: {e}");
                record_check(e.kind(), Some(started));
                return Err(e);
            }
            Err(_) => {
                let e = EngineError::DataSourceTimeout(timeout);
                warn!(hotel_id = %query.hotel_id, stay = %query.stay, "availability check failed: {e}");
                record_check(e.kind(), Some(started));
                return Err(e);
            }
        };

        let notices = if query.broadcast {
            self.broadcast_notices(&result).await
        } else {
            Vec::new()
        };

        debug!(
            hotel_id = %query.hotel_id,
            stay = %query.stay,
            available = result.available,
            found = result.rooms_found,
            total_available = result.statistics.total_available,
            "availability computed"
        );
        self.cache.put(signature, result.clone(), generation);
        record_check("fresh", Some(started));
        Ok(AvailabilityOutcome {
            result,
            from_cache: false,
            notices,
        })
    }

    /// Fetch roster and bookings for one scope and classify them.
    async fn classify_scope(
        &self,
        query: &AvailabilityQuery,
        room_type: Option<RoomType>,
    ) -> Result<Classified, EngineError> {
        // Out-of-order rooms are always fetched so they count toward totals.
        let rooms = self
            .rooms
            .list_rooms(query.hotel_id, room_type, true)
            .await
            .map_err(source_err("list rooms"))?;
        let bookings = self
            .bookings
            .list_overlapping_bookings(query.hotel_id, room_type, query.stay, query.exclude_booking_id)
            .await
            .map_err(source_err("list bookings"))?;

        let conflicts = find_conflicts(&bookings, &query.stay, room_type, query.exclude_booking_id);
        let occupied = occupied_rooms(&conflicts);
        Ok(Classified {
            breakdown: classify(&rooms, &occupied, query.include_unavailable),
            conflicts: conflicts.len(),
        })
    }

    async fn compute(&self, query: &AvailabilityQuery) -> Result<AvailabilityResult, EngineError> {
        let scoped = self.classify_scope(query, query.room_type).await?;
        let stats = statistics(&scoped.breakdown);
        let allocation = allocate(&scoped.breakdown, query.room_type, query.rooms_needed);

        let alternatives = if allocation.satisfiable {
            None
        } else if query.room_type.is_some() {
            let hotel_wide = self.classify_scope(query, None).await?;
            suggest(&hotel_wide.breakdown, query.room_type, query.rooms_needed)
        } else {
            suggest(&scoped.breakdown, None, query.rooms_needed)
        };

        Ok(AvailabilityResult {
            available: allocation.satisfiable,
            rooms_requested: query.rooms_needed,
            rooms_found: allocation.rooms.len() as u32,
            recommended_rooms: allocation.rooms,
            room_types: scoped.breakdown,
            statistics: stats,
            query: query.clone(),
            conflicts: scoped.conflicts,
            alternatives,
        })
    }

    /// Change and alert notices for a fresh result. Best effort: a failing
    /// pending-count lookup skips alerting but never fails the check.
    async fn broadcast_notices(&self, result: &AvailabilityResult) -> Vec<Notice> {
        let query = &result.query;
        let mut notices = Vec::new();

        if let Some(change) = self.detector.observe(result, Utc::now())
            && change.has_changes
        {
            metrics::counter!(observability::CHANGE_NOTICES_TOTAL, "impact" => impact_label(&change))
                .increment(1);
            notices.push(Notice::AvailabilityChanged {
                hotel_id: query.hotel_id,
                change,
            });
        }

        let pending = tokio::time::timeout(
            self.config.source_timeout,
            self.bookings.count_pending(query.hotel_id, query.stay),
        )
        .await;
        let pending = match pending {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                warn!(hotel_id = %query.hotel_id, "pending count failed, skipping alerts: {e}");
                return notices;
            }
            Err(_) => {
                warn!(hotel_id = %query.hotel_id, "pending count timed out, skipping alerts");
                return notices;
            }
        };

        for alert in evaluate(&result.statistics, pending) {
            warn!(hotel_id = %query.hotel_id, severity = ?alert.severity(), "{alert}");
            metrics::counter!(observability::ALERTS_TOTAL, "type" => alert.label()).increment(1);
            notices.push(Notice::inventory_alert(alert, query));
        }
        notices
    }
}

fn impact_label(change: &super::AvailabilityChange) -> &'static str {
    match change.impact {
        super::Impact::Low => "low",
        super::Impact::Medium => "medium",
        super::Impact::High => "high",
    }
}

fn record_check(outcome: &'static str, started: Option<Instant>) {
    metrics::counter!(observability::CHECKS_TOTAL, "outcome" => outcome).increment(1);
    if let Some(started) = started {
        metrics::histogram!(observability::CHECK_DURATION_SECONDS, "outcome" => outcome)
            .record(started.elapsed().as_secs_f64());
    }
}
