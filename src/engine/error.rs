use std::time::Duration;

use thiserror::Error;

/// Rejections raised before any data-source call. Never cached, never broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid hotel id: {0:?}")]
    InvalidHotelId(String),
    #[error("invalid booking id: {0:?}")]
    InvalidBookingId(String),
    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("unknown room type: {0:?}")]
    UnknownRoomType(String),
    #[error("check-in {check_in} must be before check-out {check_out}")]
    EmptyStay { check_in: String, check_out: String },
    #[error("check-in {0} is in the past")]
    CheckInInPast(String),
    #[error("stay of {nights} nights exceeds the limit of {max}")]
    StayTooLong { nights: i64, max: i64 },
    #[error("rooms needed must be between 1 and {max}, got {got}")]
    RoomsNeededOutOfRange { got: u32, max: u32 },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("data source error: {0}")]
    DataSource(String),
    #[error("data source timed out after {}ms", .0.as_millis())]
    DataSourceTimeout(Duration),
}

impl EngineError {
    /// Short label for metrics and wire error kinds.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::DataSource(_) => "data_source",
            EngineError::DataSourceTimeout(_) => "data_source_timeout",
        }
    }

    pub fn is_data_source(&self) -> bool {
        matches!(self, EngineError::DataSource(_) | EngineError::DataSourceTimeout(_))
    }
}
