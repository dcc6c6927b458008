use crate::model::*;

/// Suggestions for an unsatisfiable request, computed over the hotel-wide
/// breakdown. Different-type suggestions come first (cheapest tier first),
/// followed by at most one reduced-quantity suggestion.
pub fn suggest(
    hotel_breakdown: &[RoomTypeAvailability],
    requested_type: Option<RoomType>,
    rooms_needed: u32,
) -> Option<Vec<Alternative>> {
    let mut alternatives: Vec<Alternative> = hotel_breakdown
        .iter()
        .filter(|b| Some(b.room_type) != requested_type && b.available >= rooms_needed)
        .map(|b| Alternative::DifferentRoomType {
            room_type: b.room_type,
            available: b.available,
        })
        .collect();

    let total_available: u32 = hotel_breakdown.iter().map(|b| b.available).sum();
    if total_available > 0 && total_available < rooms_needed {
        alternatives.push(Alternative::ReducedQuantity {
            available: total_available,
        });
    }

    if alternatives.is_empty() {
        None
    } else {
        Some(alternatives)
    }
}
