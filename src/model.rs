use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Half-open stay `[check_in, check_out)`. A guest leaving on the day another
/// arrives does not overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateSpan {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl DateSpan {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        debug_assert!(check_in < check_out, "check-in must be before check-out");
        Self { check_in, check_out }
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    pub fn overlaps(&self, other: &DateSpan) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &DateSpan) -> bool {
        self.check_in <= other.check_in && other.check_out <= self.check_out
    }
}

impl fmt::Display for DateSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.check_in, self.check_out)
    }
}

/// Room categories. Declaration order is the price tier, cheapest first, and is
/// the order the allocator walks when no type is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    Simple,
    Double,
    DoubleComfort,
    Suite,
}

impl RoomType {
    pub const PREFERENCE: [RoomType; 4] = [
        RoomType::Simple,
        RoomType::Double,
        RoomType::DoubleComfort,
        RoomType::Suite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Simple => "simple",
            RoomType::Double => "double",
            RoomType::DoubleComfort => "double_comfort",
            RoomType::Suite => "suite",
        }
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoomType {
    type Err = String;

    /// Accepts `double_comfort`, `DOUBLE_COMFORT`, `DoubleComfort`, `double-comfort`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "simple" => Ok(RoomType::Simple),
            "double" => Ok(RoomType::Double),
            "doublecomfort" => Ok(RoomType::DoubleComfort),
            "suite" => Ok(RoomType::Suite),
            _ => Err(s.to_string()),
        }
    }
}

/// Stored room status. Occupancy is derived from bookings, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    #[default]
    Available,
    Maintenance,
    OutOfService,
}

impl RoomStatus {
    pub fn is_allocatable(&self) -> bool {
        matches!(self, RoomStatus::Available)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: Ulid,
    pub hotel_id: Ulid,
    pub number: String,
    pub room_type: RoomType,
    pub floor: i32,
    /// Nightly base price in minor currency units.
    pub base_price: u64,
    #[serde(default)]
    pub status: RoomStatus,
}

impl Room {
    /// Allocation order: floor, then room number. Numeric room numbers compare
    /// by value so "99" sorts before "101".
    pub fn allocation_order(&self, other: &Room) -> Ordering {
        self.floor
            .cmp(&other.floor)
            .then_with(|| compare_room_numbers(&self.number, &other.number))
            .then_with(|| self.id.cmp(&other.id))
    }
}

fn compare_room_numbers(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    CheckedIn,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn blocks_occupancy(&self) -> bool {
        matches!(
            self,
            BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::CheckedIn
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedRoom {
    pub room_id: Ulid,
    pub room_type: RoomType,
}

/// Read view of a booking; the booking workflow owns the real record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub hotel_id: Ulid,
    pub rooms: Vec<BookedRoom>,
    #[serde(flatten)]
    pub stay: DateSpan,
    pub status: BookingStatus,
}

// ── Queries ──────────────────────────────────────────────────────

fn default_rooms_needed() -> u32 {
    1
}

/// Untrusted availability request as it arrives from a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRequest {
    pub hotel_id: String,
    #[serde(default)]
    pub room_type: Option<String>,
    pub check_in: String,
    pub check_out: String,
    #[serde(default = "default_rooms_needed")]
    pub rooms_needed: u32,
    #[serde(default)]
    pub exclude_booking_id: Option<String>,
    #[serde(default)]
    pub include_unavailable: bool,
    #[serde(default)]
    pub broadcast: bool,
}

/// A validated availability query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    pub hotel_id: Ulid,
    pub room_type: Option<RoomType>,
    #[serde(flatten)]
    pub stay: DateSpan,
    pub rooms_needed: u32,
    pub exclude_booking_id: Option<Ulid>,
    pub include_unavailable: bool,
    pub broadcast: bool,
}

// ── Results ──────────────────────────────────────────────────────

/// Per-type partition of a hotel's rooms for one stay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomTypeAvailability {
    pub room_type: RoomType,
    pub total: u32,
    pub available: u32,
    pub occupied: u32,
    pub unavailable: u32,
    pub available_rooms: Vec<Room>,
    pub occupied_rooms: Vec<Room>,
    /// Listed only when the query asked for unavailable rooms; always counted.
    pub unavailable_rooms: Vec<Room>,
}

impl RoomTypeAvailability {
    pub fn empty(room_type: RoomType) -> Self {
        Self {
            room_type,
            total: 0,
            available: 0,
            occupied: 0,
            unavailable: 0,
            available_rooms: Vec::new(),
            occupied_rooms: Vec::new(),
            unavailable_rooms: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_rooms: u32,
    pub total_available: u32,
    pub total_occupied: u32,
    pub total_unavailable: u32,
    /// Percentage of rooms occupied or out of order.
    pub occupancy_rate: f64,
    /// Percentage of rooms free to allocate.
    pub availability_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alternative {
    DifferentRoomType { room_type: RoomType, available: u32 },
    ReducedQuantity { available: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityResult {
    pub available: bool,
    pub rooms_requested: u32,
    pub rooms_found: u32,
    pub recommended_rooms: Vec<Room>,
    /// Ordered cheapest tier first; only types present in the roster.
    pub room_types: Vec<RoomTypeAvailability>,
    pub statistics: Statistics,
    pub query: AvailabilityQuery,
    /// Blocking (booking, room) pairs overlapping the stay; a booking holding
    /// two rooms counts twice.
    pub conflicts: usize,
    /// `None` means nothing to suggest, as opposed to an empty suggestion list.
    pub alternatives: Option<Vec<Alternative>>,
}

impl AvailabilityResult {
    pub fn breakdown_for(&self, room_type: RoomType) -> Option<&RoomTypeAvailability> {
        self.room_types.iter().find(|t| t.room_type == room_type)
    }
}
