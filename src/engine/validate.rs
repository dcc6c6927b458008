use chrono::NaiveDate;
use ulid::Ulid;

use crate::config::EngineConfig;
use crate::model::*;

use super::ValidationError;

fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(raw.to_string()))
}

/// Turn an untrusted request into a typed query, then apply the query rules.
pub fn parse_request(
    req: &AvailabilityRequest,
    today: NaiveDate,
    config: &EngineConfig,
) -> Result<AvailabilityQuery, ValidationError> {
    let hotel_id = Ulid::from_string(req.hotel_id.trim())
        .map_err(|_| ValidationError::InvalidHotelId(req.hotel_id.clone()))?;
    let room_type = req
        .room_type
        .as_deref()
        .map(|raw| raw.parse::<RoomType>().map_err(ValidationError::UnknownRoomType))
        .transpose()?;
    let check_in = parse_date(&req.check_in)?;
    let check_out = parse_date(&req.check_out)?;
    if check_in >= check_out {
        return Err(ValidationError::EmptyStay {
            check_in: check_in.to_string(),
            check_out: check_out.to_string(),
        });
    }
    let exclude_booking_id = req
        .exclude_booking_id
        .as_deref()
        .map(|raw| {
            Ulid::from_string(raw.trim()).map_err(|_| ValidationError::InvalidBookingId(raw.to_string()))
        })
        .transpose()?;

    let query = AvailabilityQuery {
        hotel_id,
        room_type,
        stay: DateSpan::new(check_in, check_out),
        rooms_needed: req.rooms_needed,
        exclude_booking_id,
        include_unavailable: req.include_unavailable,
        broadcast: req.broadcast,
    };
    validate_query(&query, today, config)?;
    Ok(query)
}

/// Rules a typed query must satisfy before any data-source call.
pub fn validate_query(
    query: &AvailabilityQuery,
    today: NaiveDate,
    config: &EngineConfig,
) -> Result<(), ValidationError> {
    let stay = &query.stay;
    if stay.check_in >= stay.check_out {
        return Err(ValidationError::EmptyStay {
            check_in: stay.check_in.to_string(),
            check_out: stay.check_out.to_string(),
        });
    }
    if stay.check_in < today {
        return Err(ValidationError::CheckInInPast(stay.check_in.to_string()));
    }
    if stay.nights() > config.max_stay_nights {
        return Err(ValidationError::StayTooLong {
            nights: stay.nights(),
            max: config.max_stay_nights,
        });
    }
    if query.rooms_needed == 0 || query.rooms_needed > config.max_rooms_per_booking {
        return Err(ValidationError::RoomsNeededOutOfRange {
            got: query.rooms_needed,
            max: config.max_rooms_per_booking,
        });
    }
    Ok(())
}
