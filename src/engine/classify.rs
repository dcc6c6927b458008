use std::collections::{BTreeMap, HashSet};

use ulid::Ulid;

use crate::model::*;

/// Which bucket a room falls into for one stay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    Available,
    Occupied,
    Unavailable,
}

pub fn room_state(room: &Room, occupied: &HashSet<Ulid>) -> RoomState {
    if !room.status.is_allocatable() {
        RoomState::Unavailable
    } else if occupied.contains(&room.id) {
        RoomState::Occupied
    } else {
        RoomState::Available
    }
}

/// Partition the roster per room type. Out-of-order rooms are always counted;
/// `list_unavailable` only decides whether they are listed.
///
/// Room lists are in allocation order and types come back cheapest tier first.
pub fn classify(
    rooms: &[Room],
    occupied: &HashSet<Ulid>,
    list_unavailable: bool,
) -> Vec<RoomTypeAvailability> {
    let mut sorted: Vec<&Room> = rooms.iter().collect();
    sorted.sort_by(|a, b| a.allocation_order(b));

    let mut by_type: BTreeMap<RoomType, RoomTypeAvailability> = BTreeMap::new();
    for room in sorted {
        let entry = by_type
            .entry(room.room_type)
            .or_insert_with(|| RoomTypeAvailability::empty(room.room_type));
        entry.total += 1;
        match room_state(room, occupied) {
            RoomState::Available => {
                entry.available += 1;
                entry.available_rooms.push(room.clone());
            }
            RoomState::Occupied => {
                entry.occupied += 1;
                entry.occupied_rooms.push(room.clone());
            }
            RoomState::Unavailable => {
                entry.unavailable += 1;
                if list_unavailable {
                    entry.unavailable_rooms.push(room.clone());
                }
            }
        }
    }
    by_type.into_values().collect()
}

pub fn statistics(breakdown: &[RoomTypeAvailability]) -> Statistics {
    let total_rooms: u32 = breakdown.iter().map(|t| t.total).sum();
    let total_available: u32 = breakdown.iter().map(|t| t.available).sum();
    let total_occupied: u32 = breakdown.iter().map(|t| t.occupied).sum();
    let total_unavailable: u32 = breakdown.iter().map(|t| t.unavailable).sum();
    Statistics {
        total_rooms,
        total_available,
        total_occupied,
        total_unavailable,
        occupancy_rate: percentage(total_occupied + total_unavailable, total_rooms),
        availability_rate: percentage(total_available, total_rooms),
    }
}

/// `part / whole` as a percentage rounded to two decimals; 0 for an empty whole.
/// Multiplies before dividing so exact ratios stay exact (1 of 10 is 10.0).
pub fn percentage(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let raw = f64::from(part) * 100.0 / f64::from(whole);
    (raw * 100.0).round() / 100.0
}
