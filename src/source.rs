use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::Ulid;

use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SourceError(pub String);

/// Read access to the hotel room roster.
#[async_trait]
pub trait RoomSource: Send + Sync {
    async fn list_rooms(
        &self,
        hotel_id: Ulid,
        room_type: Option<RoomType>,
        include_unavailable: bool,
    ) -> Result<Vec<Room>, SourceError>;
}

/// Read access to bookings.
#[async_trait]
pub trait BookingSource: Send + Sync {
    /// Bookings of the hotel whose stay overlaps `stay`. Implementations may
    /// return extra rows (any status); the conflict resolver re-filters.
    async fn list_overlapping_bookings(
        &self,
        hotel_id: Ulid,
        room_type: Option<RoomType>,
        stay: DateSpan,
        exclude_booking_id: Option<Ulid>,
    ) -> Result<Vec<Booking>, SourceError>;

    /// Pending bookings of the hotel overlapping `stay`.
    async fn count_pending(&self, hotel_id: Ulid, stay: DateSpan) -> Result<usize, SourceError>;
}

/// On-disk fixture shape: `{ "rooms": [...], "bookings": [...] }`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub rooms: Vec<Room>,
    #[serde(default)]
    pub bookings: Vec<Booking>,
}

/// DashMap-backed rooms and bookings, grouped per hotel.
pub struct InMemorySource {
    rooms: DashMap<Ulid, Room>,
    bookings: DashMap<Ulid, Booking>,
    /// hotel id → room ids
    hotel_rooms: DashMap<Ulid, Vec<Ulid>>,
    /// hotel id → booking ids
    hotel_bookings: DashMap<Ulid, Vec<Ulid>>,
}

impl Default for InMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySource {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            bookings: DashMap::new(),
            hotel_rooms: DashMap::new(),
            hotel_bookings: DashMap::new(),
        }
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        let source = Self::new();
        for room in fixture.rooms {
            source.insert_room(room);
        }
        for booking in fixture.bookings {
            source.upsert_booking(booking);
        }
        source
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let fixture: Fixture = serde_json::from_slice(&bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Self::from_fixture(fixture))
    }

    // ── Rooms ────────────────────────────────────────────────

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn insert_room(&self, room: Room) {
        let (id, hotel_id) = (room.id, room.hotel_id);
        if self.rooms.insert(id, room).is_none() {
            self.hotel_rooms.entry(hotel_id).or_default().push(id);
        }
    }

    /// Returns the hotel the room belongs to, so the caller can invalidate it.
    pub fn set_room_status(&self, room_id: Ulid, status: RoomStatus) -> Option<Ulid> {
        let mut room = self.rooms.get_mut(&room_id)?;
        room.status = status;
        Some(room.hotel_id)
    }

    // ── Bookings ─────────────────────────────────────────────

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    pub fn upsert_booking(&self, booking: Booking) {
        let (id, hotel_id) = (booking.id, booking.hotel_id);
        if self.bookings.insert(id, booking).is_none() {
            self.hotel_bookings.entry(hotel_id).or_default().push(id);
        }
    }

    /// Returns the hotel the booking belongs to, so the caller can invalidate it.
    pub fn set_booking_status(&self, booking_id: Ulid, status: BookingStatus) -> Option<Ulid> {
        let mut booking = self.bookings.get_mut(&booking_id)?;
        booking.status = status;
        Some(booking.hotel_id)
    }

    fn bookings_of(&self, hotel_id: Ulid) -> Vec<Booking> {
        let ids = self
            .hotel_bookings
            .get(&hotel_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        ids.iter()
            .filter_map(|id| self.bookings.get(id).map(|b| b.value().clone()))
            .collect()
    }
}

#[async_trait]
impl RoomSource for InMemorySource {
    async fn list_rooms(
        &self,
        hotel_id: Ulid,
        room_type: Option<RoomType>,
        include_unavailable: bool,
    ) -> Result<Vec<Room>, SourceError> {
        let ids = self
            .hotel_rooms
            .get(&hotel_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| self.rooms.get(id).map(|r| r.value().clone()))
            .filter(|r| room_type.is_none_or(|t| r.room_type == t))
            .filter(|r| include_unavailable || r.status.is_allocatable())
            .collect())
    }
}

#[async_trait]
impl BookingSource for InMemorySource {
    async fn list_overlapping_bookings(
        &self,
        hotel_id: Ulid,
        room_type: Option<RoomType>,
        stay: DateSpan,
        exclude_booking_id: Option<Ulid>,
    ) -> Result<Vec<Booking>, SourceError> {
        Ok(self
            .bookings_of(hotel_id)
            .into_iter()
            .filter(|b| b.stay.overlaps(&stay))
            .filter(|b| exclude_booking_id != Some(b.id))
            .filter(|b| room_type.is_none_or(|t| b.rooms.iter().any(|r| r.room_type == t)))
            .collect())
    }

    async fn count_pending(&self, hotel_id: Ulid, stay: DateSpan) -> Result<usize, SourceError> {
        Ok(self
            .bookings_of(hotel_id)
            .iter()
            .filter(|b| b.status == BookingStatus::Pending && b.stay.overlaps(&stay))
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn room(hotel_id: Ulid, room_type: RoomType, status: RoomStatus) -> Room {
        Room {
            id: Ulid::new(),
            hotel_id,
            number: "101".into(),
            room_type,
            floor: 1,
            base_price: 10_000,
            status,
        }
    }

    fn booking(hotel_id: Ulid, room: &Room, from: &str, to: &str, status: BookingStatus) -> Booking {
        Booking {
            id: Ulid::new(),
            hotel_id,
            rooms: vec![BookedRoom { room_id: room.id, room_type: room.room_type }],
            stay: DateSpan::new(d(from), d(to)),
            status,
        }
    }

    #[tokio::test]
    async fn rooms_filtered_by_hotel_type_and_status() {
        let src = InMemorySource::new();
        let hotel = Ulid::new();
        let other = Ulid::new();
        src.insert_room(room(hotel, RoomType::Double, RoomStatus::Available));
        src.insert_room(room(hotel, RoomType::Suite, RoomStatus::Available));
        src.insert_room(room(hotel, RoomType::Double, RoomStatus::Maintenance));
        src.insert_room(room(other, RoomType::Double, RoomStatus::Available));

        assert_eq!(src.list_rooms(hotel, None, false).await.unwrap().len(), 2);
        assert_eq!(src.list_rooms(hotel, None, true).await.unwrap().len(), 3);
        assert_eq!(
            src.list_rooms(hotel, Some(RoomType::Double), true).await.unwrap().len(),
            2
        );
        assert!(src.list_rooms(Ulid::new(), None, true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reinserting_room_does_not_duplicate_index() {
        let src = InMemorySource::new();
        let hotel = Ulid::new();
        let r = room(hotel, RoomType::Simple, RoomStatus::Available);
        src.insert_room(r.clone());
        src.insert_room(r);
        assert_eq!(src.room_count(), 1);
        assert_eq!(src.list_rooms(hotel, None, true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn overlapping_bookings_respect_half_open_stays() {
        let src = InMemorySource::new();
        let hotel = Ulid::new();
        let r = room(hotel, RoomType::Double, RoomStatus::Available);
        src.insert_room(r.clone());
        let early = booking(hotel, &r, "2030-03-01", "2030-03-05", BookingStatus::Confirmed);
        let late = booking(hotel, &r, "2030-03-10", "2030-03-12", BookingStatus::Confirmed);
        src.upsert_booking(early.clone());
        src.upsert_booking(late);

        let stay = DateSpan::new(d("2030-03-05"), d("2030-03-10"));
        assert!(src.list_overlapping_bookings(hotel, None, stay, None).await.unwrap().is_empty());

        let stay = DateSpan::new(d("2030-03-04"), d("2030-03-06"));
        let hits = src.list_overlapping_bookings(hotel, None, stay, None).await.unwrap();
        assert_eq!(hits, vec![early.clone()]);

        let hits = src
            .list_overlapping_bookings(hotel, None, stay, Some(early.id))
            .await
            .unwrap();
        assert!(hits.is_empty());

        let hits = src
            .list_overlapping_bookings(hotel, Some(RoomType::Suite), stay, None)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn count_pending_only_counts_pending_overlaps() {
        let src = InMemorySource::new();
        let hotel = Ulid::new();
        let r = room(hotel, RoomType::Double, RoomStatus::Available);
        src.upsert_booking(booking(hotel, &r, "2030-03-01", "2030-03-05", BookingStatus::Pending));
        src.upsert_booking(booking(hotel, &r, "2030-03-02", "2030-03-04", BookingStatus::Confirmed));
        src.upsert_booking(booking(hotel, &r, "2030-04-01", "2030-04-05", BookingStatus::Pending));

        let stay = DateSpan::new(d("2030-03-03"), d("2030-03-04"));
        assert_eq!(src.count_pending(hotel, stay).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn status_updates_report_owning_hotel() {
        let src = InMemorySource::new();
        let hotel = Ulid::new();
        let r = room(hotel, RoomType::Double, RoomStatus::Available);
        let b = booking(hotel, &r, "2030-03-01", "2030-03-05", BookingStatus::Pending);
        src.insert_room(r.clone());
        src.upsert_booking(b.clone());

        assert_eq!(src.set_room_status(r.id, RoomStatus::OutOfService), Some(hotel));
        assert_eq!(src.set_booking_status(b.id, BookingStatus::Cancelled), Some(hotel));
        assert_eq!(src.set_room_status(Ulid::new(), RoomStatus::Available), None);
        assert!(src.list_rooms(hotel, None, false).await.unwrap().is_empty());
    }

    #[test]
    fn fixture_loads_from_json() {
        let hotel = Ulid::new();
        let r = room(hotel, RoomType::Suite, RoomStatus::Available);
        let b = booking(hotel, &r, "2030-03-01", "2030-03-05", BookingStatus::Confirmed);
        let fixture = Fixture { rooms: vec![r], bookings: vec![b] };

        let path = std::env::temp_dir().join(format!("roomgrid_fixture_{}.json", Ulid::new()));
        std::fs::write(&path, serde_json::to_vec(&fixture).unwrap()).unwrap();
        let src = InMemorySource::load(&path).unwrap();
        assert_eq!(src.room_count(), 1);
        assert_eq!(src.booking_count(), 1);
        let _ = std::fs::remove_file(&path);
    }
}
