use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::model::*;

/// How an existing stay sits relative to the requested one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Same check-in and check-out.
    Exact,
    /// Existing stay contains the request.
    Covers,
    /// Existing stay lies inside the request.
    Within,
    /// Existing stay starts earlier and ends inside the request.
    StartsBefore,
    /// Existing stay starts inside the request and ends later.
    EndsAfter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub booking_id: Ulid,
    pub room_id: Ulid,
    pub kind: ConflictKind,
}

/// Classify an overlap. `None` when the stays do not overlap.
pub fn classify_overlap(existing: &DateSpan, requested: &DateSpan) -> Option<ConflictKind> {
    if !existing.overlaps(requested) {
        return None;
    }
    let kind = if existing == requested {
        ConflictKind::Exact
    } else if existing.contains_span(requested) {
        ConflictKind::Covers
    } else if requested.contains_span(existing) {
        ConflictKind::Within
    } else if existing.check_in < requested.check_in {
        ConflictKind::StartsBefore
    } else {
        ConflictKind::EndsAfter
    };
    Some(kind)
}

/// Every (booking, room) pair that blocks the requested stay, ordered by room
/// then booking.
pub fn find_conflicts(
    bookings: &[Booking],
    stay: &DateSpan,
    room_type: Option<RoomType>,
    exclude_booking_id: Option<Ulid>,
) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    for booking in bookings {
        if !booking.status.blocks_occupancy() || exclude_booking_id == Some(booking.id) {
            continue;
        }
        let Some(kind) = classify_overlap(&booking.stay, stay) else {
            continue;
        };
        for booked in &booking.rooms {
            if room_type.is_some_and(|t| booked.room_type != t) {
                continue;
            }
            conflicts.push(Conflict {
                booking_id: booking.id,
                room_id: booked.room_id,
                kind,
            });
        }
    }
    conflicts.sort_by_key(|c| (c.room_id, c.booking_id));
    conflicts
}

pub fn occupied_rooms(conflicts: &[Conflict]) -> HashSet<Ulid> {
    conflicts.iter().map(|c| c.room_id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn span(from: &str, to: &str) -> DateSpan {
        DateSpan::new(d(from), d(to))
    }

    fn booking(room_id: Ulid, room_type: RoomType, stay: DateSpan, status: BookingStatus) -> Booking {
        Booking {
            id: Ulid::new(),
            hotel_id: Ulid::nil(),
            rooms: vec![BookedRoom { room_id, room_type }],
            stay,
            status,
        }
    }

    // ── classify_overlap ────────────────────────────────

    #[test]
    fn classify_all_shapes() {
        let req = span("2030-06-10", "2030-06-15");
        assert_eq!(classify_overlap(&req, &req), Some(ConflictKind::Exact));
        assert_eq!(
            classify_overlap(&span("2030-06-01", "2030-06-20"), &req),
            Some(ConflictKind::Covers)
        );
        assert_eq!(
            classify_overlap(&span("2030-06-11", "2030-06-12"), &req),
            Some(ConflictKind::Within)
        );
        assert_eq!(
            classify_overlap(&span("2030-06-08", "2030-06-11"), &req),
            Some(ConflictKind::StartsBefore)
        );
        assert_eq!(
            classify_overlap(&span("2030-06-14", "2030-06-18"), &req),
            Some(ConflictKind::EndsAfter)
        );
    }

    #[test]
    fn same_day_turnover_is_not_a_conflict() {
        let req = span("2030-06-10", "2030-06-15");
        assert_eq!(classify_overlap(&span("2030-06-05", "2030-06-10"), &req), None);
        assert_eq!(classify_overlap(&span("2030-06-15", "2030-06-20"), &req), None);
    }

    // ── find_conflicts ──────────────────────────────────

    #[test]
    fn disjoint_bookings_leave_room_free() {
        let room = Ulid::new();
        let bookings = vec![
            booking(room, RoomType::Double, span("2030-06-01", "2030-06-05"), BookingStatus::Confirmed),
            booking(room, RoomType::Double, span("2030-06-20", "2030-06-25"), BookingStatus::Confirmed),
        ];
        let conflicts = find_conflicts(&bookings, &span("2030-06-05", "2030-06-20"), None, None);
        assert!(conflicts.is_empty());
    }

    #[test]
    fn only_live_statuses_conflict() {
        let room = Ulid::new();
        let stay = span("2030-06-10", "2030-06-12");
        let statuses = [
            (BookingStatus::Pending, true),
            (BookingStatus::Confirmed, true),
            (BookingStatus::CheckedIn, true),
            (BookingStatus::Cancelled, false),
            (BookingStatus::Completed, false),
        ];
        for (status, blocks) in statuses {
            let bookings = vec![booking(room, RoomType::Double, stay, status)];
            let occupied = occupied_rooms(&find_conflicts(&bookings, &stay, None, None));
            assert_eq!(occupied.contains(&room), blocks, "{status:?}");
        }
    }

    #[test]
    fn excluded_booking_is_ignored() {
        let room = Ulid::new();
        let stay = span("2030-06-10", "2030-06-12");
        let mine = booking(room, RoomType::Double, stay, BookingStatus::Confirmed);
        let conflicts = find_conflicts(&[mine.clone()], &stay, None, Some(mine.id));
        assert!(conflicts.is_empty());
    }

    #[test]
    fn room_type_filter_applies_per_booked_room() {
        let double = Ulid::new();
        let suite = Ulid::new();
        let stay = span("2030-06-10", "2030-06-12");
        let b = Booking {
            id: Ulid::new(),
            hotel_id: Ulid::nil(),
            rooms: vec![
                BookedRoom { room_id: double, room_type: RoomType::Double },
                BookedRoom { room_id: suite, room_type: RoomType::Suite },
            ],
            stay,
            status: BookingStatus::Confirmed,
        };
        let conflicts = find_conflicts(&[b.clone()], &stay, Some(RoomType::Suite), None);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].room_id, suite);

        let all = find_conflicts(&[b], &stay, None, None);
        assert_eq!(occupied_rooms(&all).len(), 2);
    }

    #[test]
    fn overlapping_bookings_on_one_room_collapse_to_one_occupied_room() {
        let room = Ulid::new();
        let stay = span("2030-06-10", "2030-06-15");
        let bookings = vec![
            booking(room, RoomType::Simple, span("2030-06-09", "2030-06-11"), BookingStatus::Confirmed),
            booking(room, RoomType::Simple, span("2030-06-14", "2030-06-16"), BookingStatus::Pending),
        ];
        let conflicts = find_conflicts(&bookings, &stay, None, None);
        assert_eq!(conflicts.len(), 2);
        assert!(conflicts.windows(2).all(|w| w[0].booking_id <= w[1].booking_id));
        assert_eq!(occupied_rooms(&conflicts).len(), 1);
    }
}
