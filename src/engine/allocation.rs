use crate::model::*;

#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub satisfiable: bool,
    pub rooms: Vec<Room>,
}

/// Pick `rooms_needed` rooms from a classified breakdown.
///
/// With a requested type only that type is considered and the request is all
/// or nothing. Without one, types are drained cheapest tier first; the rooms
/// taken are still recommended when the total falls short.
///
/// Relies on `available_rooms` already being in allocation order.
pub fn allocate(
    breakdown: &[RoomTypeAvailability],
    room_type: Option<RoomType>,
    rooms_needed: u32,
) -> Allocation {
    let needed = rooms_needed as usize;
    match room_type {
        Some(t) => {
            let available = breakdown
                .iter()
                .find(|b| b.room_type == t)
                .map_or(&[][..], |b| &b.available_rooms[..]);
            if available.len() >= needed {
                Allocation {
                    satisfiable: true,
                    rooms: available[..needed].to_vec(),
                }
            } else {
                Allocation {
                    satisfiable: false,
                    rooms: Vec::new(),
                }
            }
        }
        None => {
            let mut rooms = Vec::with_capacity(needed);
            for t in RoomType::PREFERENCE {
                if rooms.len() >= needed {
                    break;
                }
                if let Some(b) = breakdown.iter().find(|b| b.room_type == t) {
                    let take = (needed - rooms.len()).min(b.available_rooms.len());
                    rooms.extend_from_slice(&b.available_rooms[..take]);
                }
            }
            Allocation {
                satisfiable: rooms.len() >= needed,
                rooms,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::engine::classify::classify;
    use ulid::Ulid;

    fn room(room_type: RoomType, number: &str, floor: i32) -> Room {
        Room {
            id: Ulid::new(),
            hotel_id: Ulid::nil(),
            number: number.into(),
            room_type,
            floor,
            base_price: 10_000,
            status: RoomStatus::Available,
        }
    }

    fn numbers(rooms: &[Room]) -> Vec<&str> {
        rooms.iter().map(|r| r.number.as_str()).collect()
    }

    #[test]
    fn specific_type_takes_lowest_floor_and_number() {
        let rooms = vec![
            room(RoomType::Double, "305", 3),
            room(RoomType::Double, "104", 1),
            room(RoomType::Double, "102", 1),
            room(RoomType::Double, "201", 2),
        ];
        let breakdown = classify(&rooms, &HashSet::new(), false);
        let alloc = allocate(&breakdown, Some(RoomType::Double), 3);
        assert!(alloc.satisfiable);
        assert_eq!(numbers(&alloc.rooms), vec!["102", "104", "201"]);
    }

    #[test]
    fn specific_type_short_is_unsatisfiable() {
        let rooms = vec![room(RoomType::Suite, "501", 5), room(RoomType::Double, "201", 2)];
        let breakdown = classify(&rooms, &HashSet::new(), false);
        let alloc = allocate(&breakdown, Some(RoomType::Suite), 2);
        assert!(!alloc.satisfiable);
        assert!(alloc.rooms.is_empty());
    }

    #[test]
    fn missing_type_is_unsatisfiable() {
        let breakdown = classify(&[room(RoomType::Double, "201", 2)], &HashSet::new(), false);
        assert!(!allocate(&breakdown, Some(RoomType::Simple), 1).satisfiable);
    }

    #[test]
    fn untyped_request_fills_cheapest_tier_first() {
        let rooms = vec![
            room(RoomType::Suite, "501", 5),
            room(RoomType::Double, "202", 2),
            room(RoomType::Simple, "101", 1),
            room(RoomType::Double, "201", 2),
        ];
        let breakdown = classify(&rooms, &HashSet::new(), false);
        let alloc = allocate(&breakdown, None, 3);
        assert!(alloc.satisfiable);
        assert_eq!(numbers(&alloc.rooms), vec!["101", "201", "202"]);
    }

    #[test]
    fn untyped_request_short_keeps_partial_pick() {
        let rooms = vec![room(RoomType::Simple, "101", 1), room(RoomType::Suite, "501", 5)];
        let breakdown = classify(&rooms, &HashSet::new(), false);
        let alloc = allocate(&breakdown, None, 3);
        assert!(!alloc.satisfiable);
        assert_eq!(numbers(&alloc.rooms), vec!["101", "501"]);
    }

    #[test]
    fn occupied_rooms_are_never_picked() {
        let rooms = vec![room(RoomType::Double, "201", 2), room(RoomType::Double, "202", 2)];
        let occupied: HashSet<Ulid> = [rooms[0].id].into_iter().collect();
        let breakdown = classify(&rooms, &occupied, false);
        let alloc = allocate(&breakdown, Some(RoomType::Double), 1);
        assert_eq!(numbers(&alloc.rooms), vec!["202"]);
    }

    #[test]
    fn allocation_is_deterministic() {
        let rooms: Vec<Room> = (0..8)
            .map(|i| room(RoomType::Double, &format!("{}", 200 + (i * 7) % 8), 2))
            .collect();
        let breakdown = classify(&rooms, &HashSet::new(), false);
        let first = allocate(&breakdown, None, 4);
        for _ in 0..5 {
            assert_eq!(allocate(&breakdown, None, 4), first);
        }
        assert_eq!(numbers(&first.rooms), vec!["200", "201", "202", "203"]);
    }
}
